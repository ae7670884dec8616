//! Lane aggregation: periodic per-camera count deltas.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use contracts::{format_timestamp, CameraCounts, ContractError, LaneAggregateDocument, PersistenceSink};
use tracing::{debug, instrument, warn};
use violation_engine::LaneOccupancy;

/// Turns occupancy windows into delta documents for one camera.
///
/// Each flush writes `|current - previous|` per class, where `previous` is the
/// last flushed window. Before the first flush `previous` is seeded from the
/// sink's latest document for this camera, or zeros.
#[derive(Debug)]
pub struct LaneAggregator {
    cam_id: String,
    interval: Duration,
    window_started: Instant,
    previous: Option<CameraCounts>,
}

impl LaneAggregator {
    pub fn new(cam_id: impl Into<String>, interval: Duration) -> Self {
        Self {
            cam_id: cam_id.into(),
            interval,
            window_started: Instant::now(),
            previous: None,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now.duration_since(self.window_started) >= self.interval
    }

    /// Counts of the last flushed window.
    pub fn previous(&self) -> Option<&CameraCounts> {
        self.previous.as_ref()
    }

    /// Write the delta for `window` and start a new window.
    ///
    /// The window is consumed either way; a failed write loses that delta.
    #[instrument(name = "lane_flush", skip(self, window, sink), fields(cam_id = %self.cam_id))]
    pub fn flush(
        &mut self,
        window: &LaneOccupancy,
        sink: &dyn PersistenceSink,
        now: DateTime<Utc>,
    ) -> Result<LaneAggregateDocument, ContractError> {
        self.window_started = Instant::now();
        let previous = match self.previous.take() {
            Some(previous) => previous,
            None => self.seed(sink),
        };
        let current = CameraCounts::from_map(self.cam_id.clone(), &window.class_counts());
        let document = LaneAggregateDocument {
            create_time: format_timestamp(&now),
            cam: vec![current.delta(&previous)],
        };
        self.previous = Some(current);

        sink.insert_delta(&document)?;
        observability::record_lane_flush(&self.cam_id);
        debug!(cam_id = %self.cam_id, counts = ?document.cam[0], "Lane aggregate flushed");
        Ok(document)
    }

    fn seed(&self, sink: &dyn PersistenceSink) -> CameraCounts {
        let zero = CameraCounts {
            cam_id: self.cam_id.clone(),
            ..Default::default()
        };
        match sink.last_aggregate(&self.cam_id) {
            Ok(Some(doc)) => doc.camera(&self.cam_id).cloned().unwrap_or(zero),
            Ok(None) => zero,
            Err(e) => {
                warn!(cam_id = %self.cam_id, error = %e, "Previous aggregate unavailable, starting from zero");
                zero
            }
        }
    }
}
