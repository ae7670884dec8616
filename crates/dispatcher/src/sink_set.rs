//! SinkSet - fan-out of documents to every configured sink

use std::collections::HashSet;
use std::sync::Arc;

use contracts::{
    ContractError, LaneAggregateDocument, PersistenceSink, SinkConfig, SinkType, ViolationDocument,
};
use metrics::counter;
use tracing::{error, info, instrument};

use crate::error::DispatcherError;
use crate::metrics::{MetricsSnapshot, SinkMetrics};
use crate::sinks::{FileSink, LogSink, MemorySink};

struct SinkEntry {
    sink: Arc<dyn PersistenceSink>,
    metrics: SinkMetrics,
}

/// Writes each document to every sink.
///
/// A failing sink is logged and counted but does not fail the write as long
/// as another sink accepted the document.
#[derive(Default)]
pub struct SinkSet {
    entries: Vec<SinkEntry>,
}

impl std::fmt::Debug for SinkSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkSet")
            .field("sinks", &self.entries.iter().map(|e| e.sink.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl SinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink (for tests and embedding)
    pub fn with_sink(mut self, sink: Arc<dyn PersistenceSink>) -> Self {
        self.entries.push(SinkEntry {
            sink,
            metrics: SinkMetrics::new(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.entries
            .iter()
            .map(|e| (e.sink.name().to_string(), e.metrics.snapshot()))
            .collect()
    }

    fn fan_out(
        &self,
        write: impl Fn(&dyn PersistenceSink) -> Result<(), ContractError>,
        on_success: impl Fn(&SinkMetrics),
    ) -> Result<(), ContractError> {
        let mut last_err = None;
        let mut delivered = false;
        for entry in &self.entries {
            let name = entry.sink.name();
            match write(entry.sink.as_ref()) {
                Ok(()) => {
                    on_success(&entry.metrics);
                    delivered = true;
                    counter!("traffic_monitor_sink_writes_total", "sink" => name.to_string(), "status" => "ok")
                        .increment(1);
                }
                Err(e) => {
                    entry.metrics.inc_failure_count();
                    counter!("traffic_monitor_sink_writes_total", "sink" => name.to_string(), "status" => "error")
                        .increment(1);
                    error!(sink = %name, error = %e, "Sink write failed");
                    last_err = Some(e);
                }
            }
        }
        match last_err {
            Some(e) if !delivered => Err(e),
            _ => Ok(()),
        }
    }
}

impl PersistenceSink for SinkSet {
    fn name(&self) -> &str {
        "sink_set"
    }

    fn insert_one(&self, document: &ViolationDocument) -> Result<(), ContractError> {
        self.fan_out(|s| s.insert_one(document), SinkMetrics::inc_violations)
    }

    fn insert_delta(&self, document: &LaneAggregateDocument) -> Result<(), ContractError> {
        self.fan_out(|s| s.insert_delta(document), SinkMetrics::inc_aggregates)
    }

    /// First sink that can read the camera back wins.
    fn last_aggregate(&self, cam_id: &str) -> Result<Option<LaneAggregateDocument>, ContractError> {
        for entry in &self.entries {
            match entry.sink.last_aggregate(cam_id) {
                Ok(Some(doc)) => return Ok(Some(doc)),
                Ok(None) => {}
                Err(e) => error!(sink = %entry.sink.name(), error = %e, "Reading last aggregate failed"),
            }
        }
        Ok(None)
    }

    fn flush(&self) -> Result<(), ContractError> {
        self.fan_out(|s| s.flush(), |_| {})
    }
}

/// Create a sink from configuration
#[instrument(
    name = "dispatcher_create_sink",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
pub fn create_sink(config: &SinkConfig) -> Result<Arc<dyn PersistenceSink>, DispatcherError> {
    let sink: Arc<dyn PersistenceSink> = match config.sink_type {
        SinkType::Log => Arc::new(LogSink::new(&config.name)),
        SinkType::Memory => Arc::new(MemorySink::new(&config.name)),
        SinkType::File => Arc::new(
            FileSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?,
        ),
    };
    Ok(sink)
}

/// Build the fan-out set from sink configs.
///
/// With no sinks configured, documents go to a single `LogSink`.
#[instrument(name = "dispatcher_create_sinks", skip(configs), fields(sink_count = configs.len()))]
pub fn create_sinks(configs: &[SinkConfig]) -> Result<SinkSet, DispatcherError> {
    let mut names = HashSet::new();
    let mut set = SinkSet::new();
    for config in configs {
        if !names.insert(config.name.as_str()) {
            return Err(DispatcherError::DuplicateSink {
                name: config.name.clone(),
            });
        }
        set = set.with_sink(create_sink(config)?);
    }
    if set.is_empty() {
        set = set.with_sink(Arc::new(LogSink::new("log")));
    }
    info!(sinks = set.len(), "Sinks ready");
    Ok(set)
}
