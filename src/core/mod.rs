pub mod buffer;
pub mod class;
pub mod error;
pub mod function;
pub mod value;
