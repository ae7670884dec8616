//! PersistenceSink trait - violation store interface
//!
//! Every camera pipeline holds the same `Arc<dyn PersistenceSink>`, so
//! implementations synchronise internally and each call is one atomic write.

use crate::{ContractError, LaneAggregateDocument, ViolationDocument};

/// Append-only document store.
pub trait PersistenceSink: Send + Sync {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Append one violation document.
    fn insert_one(&self, document: &ViolationDocument) -> Result<(), ContractError>;

    /// Append one lane aggregate delta.
    fn insert_delta(&self, document: &LaneAggregateDocument) -> Result<(), ContractError>;

    /// Most recently inserted aggregate that reports `cam_id`, if the sink can read back.
    fn last_aggregate(&self, _cam_id: &str) -> Result<Option<LaneAggregateDocument>, ContractError> {
        Ok(None)
    }

    /// Flush buffered writes (if any)
    fn flush(&self) -> Result<(), ContractError> {
        Ok(())
    }
}
