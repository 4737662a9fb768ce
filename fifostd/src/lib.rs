#![cfg_attr(not(test), no_std)]

pub mod cursor;
pub mod mutex;

pub use cursor::Cursor;
pub use mutex::IrqMutex;
