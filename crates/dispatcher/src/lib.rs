//! # Dispatcher
//!
//! Persistence of violation and lane aggregate documents.
//!
//! - `FileSink`: JSON-lines collections on disk
//! - `MemorySink`: in-process store for tests and inspection
//! - `LogSink`: tracing only
//! - `SinkSet`: fan-out to all configured sinks, isolating failing ones

pub mod error;
pub mod metrics;
pub mod sink_set;
pub mod sinks;

pub use contracts::PersistenceSink;
pub use error::DispatcherError;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sink_set::{SinkSet, create_sink, create_sinks};
pub use sinks::{AGGREGATE_FILE, FileSink, FileSinkConfig, LogSink, MemorySink, VIOLATION_FILE};
