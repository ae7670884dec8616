//! Camera consumer: detection, violation rules and lane aggregation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use contracts::{CameraConfig, PersistenceSink};
use detection::DetectionService;
use ingestion::{CaptureSnapshot, Mailbox, Take, WorkerControl};
use observability::MonitorMetricsAggregator;
use tracing::{debug, error, info, instrument, warn};
use violation_engine::{IouTracker, ViolationEngine};

use crate::aggregator::LaneAggregator;
use crate::recorder::ViolationRecorder;

/// Consumer half of a camera pipeline. Owns all per-camera analysis state.
pub struct CameraConsumer {
    camera: Arc<CameraConfig>,
    mailbox: Arc<Mailbox<CaptureSnapshot>>,
    control: Arc<WorkerControl>,
    detector: Box<dyn DetectionService>,
    tracker: IouTracker,
    engine: ViolationEngine,
    recorder: ViolationRecorder,
    sink: Arc<dyn PersistenceSink>,
    aggregator: LaneAggregator,
    poll: Duration,
    stats: MonitorMetricsAggregator,
    last_sequence: u64,
}

impl CameraConsumer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        camera: Arc<CameraConfig>,
        mailbox: Arc<Mailbox<CaptureSnapshot>>,
        control: Arc<WorkerControl>,
        detector: Box<dyn DetectionService>,
        engine: ViolationEngine,
        recorder: ViolationRecorder,
        sink: Arc<dyn PersistenceSink>,
        aggregator: LaneAggregator,
        poll: Duration,
    ) -> Self {
        Self {
            camera,
            mailbox,
            control,
            detector,
            tracker: IouTracker::default(),
            engine,
            recorder,
            sink,
            aggregator,
            poll,
            stats: MonitorMetricsAggregator::new(),
            last_sequence: 0,
        }
    }

    /// Process snapshots until stopped or the mailbox closes.
    ///
    /// Never returns early on a bad frame. The lane window is flushed once
    /// more on exit so counts of the last partial window are not lost.
    #[instrument(
        name = "camera_consumer",
        skip(self),
        fields(camera_id = %self.camera.id, detector = %self.detector.name())
    )]
    pub fn run(mut self) -> MonitorMetricsAggregator {
        info!(camera_id = %self.camera.id, "Consumer started");
        while !self.control.is_stop_requested() {
            match self.mailbox.take_timeout(self.poll) {
                Take::Item(snapshot) => self.handle(snapshot),
                Take::Empty => {}
                Take::Closed => break,
            }
            if self.aggregator.is_due(Instant::now()) {
                self.flush_lanes();
            }
        }
        if !self.engine.occupancy().is_empty() {
            self.flush_lanes();
        }
        info!(camera_id = %self.camera.id, frames = self.last_sequence, "Consumer stopped");
        self.stats
    }

    fn handle(&mut self, snapshot: CaptureSnapshot) {
        let camera_id = self.camera.id.as_str();
        if snapshot.sequence <= self.last_sequence {
            warn!(camera_id, sequence = snapshot.sequence, "Out-of-order snapshot skipped");
            return;
        }
        self.last_sequence = snapshot.sequence;
        self.stats.record_frame(camera_id, snapshot.placeholder);

        let started = Instant::now();
        let result = self.detector.detect(&snapshot.visible);
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let mut detections = match result {
            Ok(detections) => {
                observability::record_detection(camera_id, latency_ms, Ok(()));
                self.stats.record_detection(camera_id, latency_ms, true);
                detections
            }
            Err(e) => {
                observability::record_detection(camera_id, latency_ms, Err(e.reason()));
                self.stats.record_detection(camera_id, latency_ms, false);
                warn!(
                    camera_id,
                    sequence = snapshot.sequence,
                    reason = e.reason(),
                    error = %e,
                    "Detection failed, frame skipped"
                );
                return;
            }
        };

        self.tracker.assign(&mut detections);
        let events = self.engine.process(&snapshot.raw, &detections);
        debug!(
            camera_id,
            sequence = snapshot.sequence,
            detections = detections.len(),
            violations = events.len(),
            "Frame analysed"
        );

        for event in &events {
            self.stats.record_violation(camera_id, event.kind);
            if let Err(e) = self.recorder.record(event, &snapshot.raw) {
                error!(camera_id, kind = event.kind.as_str(), error = %e, "Violation not persisted");
            }
        }
    }

    fn flush_lanes(&mut self) {
        let window = self.engine.take_occupancy();
        match self.aggregator.flush(&window, self.sink.as_ref(), Utc::now()) {
            Ok(_) => self.stats.record_lane_flush(self.camera.id.as_str()),
            Err(e) => error!(camera_id = %self.camera.id, error = %e, "Lane aggregate not persisted"),
        }
    }
}
