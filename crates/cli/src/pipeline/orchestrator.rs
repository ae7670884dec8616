//! Monitor orchestrator - wires sinks, cameras and the status channel.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{CameraEvent, CameraEventKind, CameraStatus, DeploymentBlueprint, PersistenceSink};
use monitor::{http_detector_factory, PipelineContext, Supervisor};
use tracing::{error, info, warn};

use super::RunStats;

/// Capacity of the camera status channel
const EVENT_CAPACITY: usize = 1024;
/// How often finished pipelines are collected
const REAP_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub blueprint: DeploymentBlueprint,

    /// Stop after this long (None = until the shutdown signal)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

pub struct Monitor {
    config: MonitorConfig,
}

impl Monitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self { config }
    }

    /// Run every camera until `shutdown` resolves, the timeout elapses or all
    /// pipelines have ended.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<RunStats> {
        let start_time = Instant::now();
        let blueprint = self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        info!("Setting up sinks...");
        let sinks = Arc::new(
            dispatcher::create_sinks(&blueprint.sinks).context("Failed to create sinks")?,
        );
        let sink: Arc<dyn PersistenceSink> = sinks.clone();

        let (events_tx, events_rx) = async_channel::bounded(EVENT_CAPACITY);
        let ctx = PipelineContext {
            analysis: blueprint.analysis.clone(),
            pipeline: blueprint.pipeline.clone(),
            snapshots: blueprint.snapshots.clone(),
            sink: sink.clone(),
            events: events_tx,
            detectors: http_detector_factory(blueprint.detector.clone()),
            preview: None,
        };

        let mut supervisor = Supervisor::new(ctx);
        let cameras_started = supervisor.start_all(&blueprint.cameras);
        if cameras_started == 0 {
            anyhow::bail!("No camera pipeline could be started");
        }

        let mut stats = RunStats {
            cameras_configured: blueprint.cameras.len(),
            cameras_started,
            ..Default::default()
        };

        let timeout = self.config.timeout;
        let deadline = async move {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(deadline);
        tokio::pin!(shutdown);
        let mut reap = tokio::time::interval(REAP_INTERVAL);

        info!(cameras = cameras_started, "Monitor running");
        loop {
            tokio::select! {
                event = events_rx.recv() => match event {
                    Ok(event) => {
                        log_event(&event);
                        stats.record_event(&event);
                    }
                    Err(_) => break,
                },
                _ = reap.tick() => {
                    supervisor.reap_finished();
                    if supervisor.is_empty() {
                        warn!("All camera pipelines have ended");
                        break;
                    }
                }
                _ = &mut deadline => {
                    info!("Run timeout reached");
                    break;
                }
                _ = &mut shutdown => {
                    warn!("Received shutdown signal, stopping cameras...");
                    break;
                }
            }
        }

        info!("Shutting down camera pipelines...");
        let report = tokio::task::spawn_blocking(move || supervisor.shutdown())
            .await
            .context("Shutdown task failed")?;
        while let Ok(event) = events_rx.try_recv() {
            log_event(&event);
            stats.record_event(&event);
        }

        if let Err(e) = sink.flush() {
            error!(error = %e, "Final sink flush failed");
        }

        for pipeline in &report.pipelines {
            if let Some(e) = &pipeline.worker_error {
                stats.failed_cameras.push((pipeline.camera_id.clone(), e.clone()));
            }
            stats.frames_captured += pipeline.ingestion.frames_captured;
            stats.frames_overwritten += pipeline.ingestion.frames_overwritten;
            stats.reconnects += pipeline.ingestion.reconnects;
        }
        stats.metrics = report.metrics;
        stats.sinks = sinks.metrics();
        stats.duration = start_time.elapsed();

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            "Monitor shutdown complete"
        );
        Ok(stats)
    }
}

fn log_event(event: &CameraEvent) {
    match &event.kind {
        CameraEventKind::Status(CameraStatus::Online) => {
            info!(camera_id = %event.camera_id, at = %event.at, "Camera online")
        }
        CameraEventKind::Status(CameraStatus::Offline) => {
            warn!(camera_id = %event.camera_id, at = %event.at, "Camera offline")
        }
        CameraEventKind::Error(message) => {
            error!(camera_id = %event.camera_id, error = %message, "Camera error")
        }
        CameraEventKind::Stopped => info!(camera_id = %event.camera_id, "Camera stopped"),
    }
}
