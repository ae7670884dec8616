//! Worker timing and capture metrics

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use contracts::PipelineConfig;

/// Producer timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Upper bound on how long the producer waits for the consumer after publishing
    pub handoff_timeout: Duration,

    /// Pause between reconnect attempts
    pub reconnect_delay: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            handoff_timeout: Duration::from_millis(80),
            reconnect_delay: Duration::from_millis(1000),
        }
    }
}

impl From<&PipelineConfig> for WorkerSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            handoff_timeout: config.handoff_timeout(),
            reconnect_delay: config.reconnect_delay(),
        }
    }
}

/// Per-camera capture counters
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Frames read from the source
    pub frames_captured: AtomicU64,

    /// Unread frames replaced by a newer one
    pub frames_overwritten: AtomicU64,

    /// Black frames published while disconnected
    pub placeholders: AtomicU64,

    /// Failed reads on an open source
    pub read_failures: AtomicU64,

    /// Successful reconnects after an interruption
    pub reconnects: AtomicU64,
}

impl IngestionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_captured(&self) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_overwritten(&self) {
        self.frames_overwritten.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_placeholder(&self) {
        self.placeholders.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_read_failure(&self) {
        self.read_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_overwritten: self.frames_overwritten.load(Ordering::Relaxed),
            placeholders: self.placeholders.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_captured: u64,
    pub frames_overwritten: u64,
    pub placeholders: u64,
    pub read_failures: u64,
    pub reconnects: u64,
}
