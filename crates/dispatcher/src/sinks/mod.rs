//! Sink implementations
//!
//! Contains MemorySink, FileSink and LogSink.

mod file;
mod log;
mod memory;

pub use self::file::{FileSink, FileSinkConfig, AGGREGATE_FILE, VIOLATION_FILE};
pub use self::log::LogSink;
pub use self::memory::MemorySink;
