//! Кодек RESP (REdis Serialization Protocol) для клиента хранилища.
//!
//! - `frame`: тип `RespFrame`.
//! - `decoder`: инкрементальный разбор ответов сервера (и запросов,
//!   они тоже массивы RESP).
//! - `encoder`: кодирование запросов и фреймов.

pub mod decoder;
pub mod encoder;
pub mod frame;

pub use decoder::*;
pub use encoder::*;
pub use frame::*;
