//! Parsers and collectors for the Linux `/proc` virtual filesystem.

pub mod parser;
pub mod system;

pub use system::SystemCollector;
