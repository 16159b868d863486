pub mod connection;
pub mod core;

pub use core::*;

pub use connection::*;
