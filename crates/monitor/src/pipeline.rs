//! One camera pipeline: a capture thread and an analysis thread joined by a mailbox.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use async_channel::Sender;
use contracts::{
    CameraConfig, CameraEvent, CameraEventKind, DetectorConfig, FrameSource, PersistenceSink,
    PipelineConfig, PreviewCallback, SnapshotConfig, ViolationEngineConfig,
};
use detection::{DetectionService, HttpDetectionClient};
use ingestion::{
    CameraWorker, CaptureSnapshot, IngestionMetrics, Mailbox, MetricsSnapshot, WorkerControl,
    WorkerSettings, WorkerState,
};
use observability::MonitorMetricsAggregator;
use tracing::{error, info, instrument, warn};
use violation_engine::ViolationEngine;

use crate::aggregator::LaneAggregator;
use crate::consumer::CameraConsumer;
use crate::error::{MonitorError, Result};
use crate::recorder::ViolationRecorder;

/// Builds the detection service for a camera.
///
/// Called on the consumer thread, so blocking clients are created and dropped
/// outside any async runtime.
pub type DetectorFactory =
    Arc<dyn Fn(&CameraConfig) -> detection::Result<Box<dyn DetectionService>> + Send + Sync>;

/// Wrap a constructor of a concrete service into a [`DetectorFactory`].
pub fn detector_factory<F, D>(build: F) -> DetectorFactory
where
    F: Fn(&CameraConfig) -> detection::Result<D> + Send + Sync + 'static,
    D: DetectionService + 'static,
{
    Arc::new(move |camera: &CameraConfig| {
        build(camera).map(|service| Box::new(service) as Box<dyn DetectionService>)
    })
}

/// Factory for the HTTP inference client.
pub fn http_detector_factory(config: DetectorConfig) -> DetectorFactory {
    detector_factory(move |_| HttpDetectionClient::new(&config))
}

/// Settings and collaborators shared by every pipeline of a deployment.
#[derive(Clone)]
pub struct PipelineContext {
    pub analysis: ViolationEngineConfig,
    pub pipeline: PipelineConfig,
    pub snapshots: SnapshotConfig,
    pub sink: Arc<dyn PersistenceSink>,
    pub events: Sender<CameraEvent>,
    pub detectors: DetectorFactory,
    pub preview: Option<PreviewCallback>,
}

/// What a pipeline reports after it was joined.
#[derive(Debug)]
pub struct PipelineReport {
    pub camera_id: String,
    /// Error that ended the capture thread, if any
    pub worker_error: Option<String>,
    pub ingestion: MetricsSnapshot,
    pub analysis: MonitorMetricsAggregator,
}

/// Handle to a running camera pipeline.
pub struct CameraPipeline {
    camera: Arc<CameraConfig>,
    control: Arc<WorkerControl>,
    mailbox: Arc<Mailbox<CaptureSnapshot>>,
    metrics: Arc<IngestionMetrics>,
    worker: Option<JoinHandle<ingestion::Result<()>>>,
    consumer: Option<JoinHandle<MonitorMetricsAggregator>>,
}

impl CameraPipeline {
    /// Start the capture and analysis threads for `camera`.
    #[instrument(name = "camera_pipeline_spawn", skip_all, fields(camera_id = %camera.id))]
    pub fn spawn(
        camera: CameraConfig,
        source: Box<dyn FrameSource>,
        ctx: &PipelineContext,
    ) -> Result<Self> {
        let camera = Arc::new(camera);
        let camera_id = camera.id.to_string();
        let control = WorkerControl::new();
        let mailbox = Arc::new(Mailbox::new());
        let metrics = Arc::new(IngestionMetrics::new());

        let consumer = {
            let camera = camera.clone();
            let mailbox = mailbox.clone();
            let control = control.clone();
            let ctx = ctx.clone();
            thread::Builder::new()
                .name(format!("cam-{camera_id}-analysis"))
                .spawn(move || run_consumer(camera, mailbox, control, ctx))
                .map_err(|e| MonitorError::spawn(&camera_id, "analysis", e.to_string()))?
        };

        let mut worker = CameraWorker::new(
            camera.clone(),
            source,
            mailbox.clone(),
            ctx.events.clone(),
            control.clone(),
            WorkerSettings::from(&ctx.pipeline),
        )
        .with_metrics(metrics.clone());
        if let Some(preview) = &ctx.preview {
            worker = worker.with_preview(preview.clone());
        }
        let worker = match thread::Builder::new()
            .name(format!("cam-{camera_id}-capture"))
            .spawn(move || worker.run())
        {
            Ok(handle) => handle,
            Err(e) => {
                control.request_stop();
                mailbox.close();
                let _ = consumer.join();
                return Err(MonitorError::spawn(&camera_id, "capture", e.to_string()));
            }
        };

        info!(camera_id = %camera_id, source = %camera.source, "Camera pipeline started");
        Ok(Self {
            camera,
            control,
            mailbox,
            metrics,
            worker: Some(worker),
            consumer: Some(consumer),
        })
    }

    pub fn camera(&self) -> &CameraConfig {
        &self.camera
    }

    pub fn state(&self) -> WorkerState {
        self.control.state()
    }

    /// Freeze or resume the preview; analysis keeps running.
    pub fn set_paused(&self, paused: bool) {
        self.control.set_paused(paused);
    }

    /// Ask both threads to stop. Does not wait.
    pub fn stop(&self) {
        self.control.request_stop();
        self.mailbox.close();
    }

    /// Both threads have exited.
    pub fn is_finished(&self) -> bool {
        let worker = self.worker.as_ref().is_none_or(JoinHandle::is_finished);
        let consumer = self.consumer.as_ref().is_none_or(JoinHandle::is_finished);
        worker && consumer
    }

    /// Stop and wait for both threads.
    pub fn join(mut self) -> PipelineReport {
        self.stop();
        let camera_id = self.camera.id.to_string();

        let worker_error = match self.worker.take().map(JoinHandle::join) {
            Some(Ok(Ok(()))) | None => None,
            Some(Ok(Err(e))) => Some(e.to_string()),
            Some(Err(_)) => {
                error!(camera_id = %camera_id, "Capture thread panicked");
                Some("capture thread panicked".to_string())
            }
        };
        let analysis = match self.consumer.take().map(JoinHandle::join) {
            Some(Ok(stats)) => stats,
            Some(Err(_)) => {
                error!(camera_id = %camera_id, "Analysis thread panicked");
                MonitorMetricsAggregator::new()
            }
            None => MonitorMetricsAggregator::new(),
        };

        info!(camera_id = %camera_id, "Camera pipeline stopped");
        PipelineReport {
            camera_id,
            worker_error,
            ingestion: self.metrics.snapshot(),
            analysis,
        }
    }
}

impl Drop for CameraPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_consumer(
    camera: Arc<CameraConfig>,
    mailbox: Arc<Mailbox<CaptureSnapshot>>,
    control: Arc<WorkerControl>,
    ctx: PipelineContext,
) -> MonitorMetricsAggregator {
    let detector = match (ctx.detectors)(&camera) {
        Ok(detector) => detector,
        Err(e) => {
            error!(camera_id = %camera.id, error = %e, "Detection service unavailable, camera not analysed");
            let event = CameraEvent::new(camera.id.clone(), CameraEventKind::Error(e.to_string()));
            if ctx.events.try_send(event).is_err() {
                warn!(camera_id = %camera.id, "Camera event not delivered");
            }
            // Without analysis the capture side has nothing to feed.
            control.request_stop();
            mailbox.close();
            return MonitorMetricsAggregator::new();
        }
    };

    let engine = ViolationEngine::new(&camera, ctx.analysis.clone());
    let recorder = ViolationRecorder::new(ctx.sink.clone(), ctx.snapshots.clone());
    let aggregator = LaneAggregator::new(camera.id.as_str(), ctx.pipeline.aggregation_interval());
    CameraConsumer::new(
        camera,
        mailbox,
        control,
        detector,
        engine,
        recorder,
        ctx.sink,
        aggregator,
        ctx.pipeline.consumer_poll(),
    )
    .run()
}
