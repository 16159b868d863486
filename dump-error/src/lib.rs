pub mod ext;
pub mod macros;
pub mod stack;
pub mod status_code;
pub mod types;

// Реэкспорт всех типов и функций подмодулей, чтобы снаружи хватало
// `use dump_error::...`.
pub use ext::*;
pub use macros::*;
pub use stack::*;
pub use status_code::*;
pub use types::*;

pub type DumpResult<T> = Result<T, StackError>;
