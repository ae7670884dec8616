//! LogSink - logs documents via tracing

use contracts::{ContractError, LaneAggregateDocument, PersistenceSink, ViolationDocument};
use tracing::info;

/// Sink that only logs documents, for dry runs and debugging
#[derive(Debug)]
pub struct LogSink {
    name: String,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl PersistenceSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn insert_one(&self, document: &ViolationDocument) -> Result<(), ContractError> {
        info!(
            sink = %self.name,
            kind = document.kind.as_str(),
            location = %document.location,
            time = %document.time,
            speed = ?document.speed,
            path = %document.path,
            "Violation"
        );
        Ok(())
    }

    fn insert_delta(&self, document: &LaneAggregateDocument) -> Result<(), ContractError> {
        for counts in &document.cam {
            info!(
                sink = %self.name,
                cam_id = %counts.cam_id,
                car = counts.car,
                truck = counts.truck,
                bus = counts.bus,
                trailer = counts.trailer,
                create_time = %document.create_time,
                "Lane aggregate"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ViolationKind;

    #[test]
    fn test_log_sink_write() {
        let sink = LogSink::new("my_logger");
        assert_eq!(sink.name(), "my_logger");
        let doc = ViolationDocument {
            kind: ViolationKind::Motorbike,
            location: "z".into(),
            path: "p".into(),
            time: "t".into(),
            speed: None,
        };
        assert!(sink.insert_one(&doc).is_ok());
        assert!(sink.last_aggregate("0").unwrap().is_none());
    }
}
