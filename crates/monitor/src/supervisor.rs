//! Runs one pipeline per camera and tears them down together.

use std::collections::BTreeMap;

use contracts::{CameraConfig, CameraEvent, CameraEventKind, FrameSource};
use ingestion::open_frame_source;
use observability::MonitorMetricsAggregator;
use tracing::{info, instrument, warn};

use crate::error::{MonitorError, Result};
use crate::pipeline::{CameraPipeline, PipelineContext, PipelineReport};

/// Outcome of a supervised run.
#[derive(Debug, Default)]
pub struct SupervisorReport {
    pub pipelines: Vec<PipelineReport>,
    /// Analysis metrics of all pipelines combined
    pub metrics: MonitorMetricsAggregator,
}

/// Owns the camera pipelines of one deployment.
///
/// Pipelines share nothing but the sink and the status channel in the
/// context; starting, stopping or failing one camera never touches another.
pub struct Supervisor {
    ctx: PipelineContext,
    pipelines: BTreeMap<String, CameraPipeline>,
    finished: Vec<PipelineReport>,
}

impl Supervisor {
    pub fn new(ctx: PipelineContext) -> Self {
        Self {
            ctx,
            pipelines: BTreeMap::new(),
            finished: Vec::new(),
        }
    }

    /// Start the pipeline for `camera`, opening its configured source.
    #[instrument(name = "supervisor_start_camera", skip(self, camera), fields(camera_id = %camera.id))]
    pub fn start_camera(&mut self, camera: CameraConfig) -> Result<()> {
        self.ensure_new(&camera)?;
        let source = open_frame_source(&camera.id, &camera.source)?;
        self.start_with_source(camera, source)
    }

    /// Start a pipeline with an already constructed source.
    pub fn start_with_source(
        &mut self,
        camera: CameraConfig,
        source: Box<dyn FrameSource>,
    ) -> Result<()> {
        self.ensure_new(&camera)?;
        let camera_id = camera.id.to_string();
        let pipeline = CameraPipeline::spawn(camera, source, &self.ctx)?;
        self.pipelines.insert(camera_id, pipeline);
        Ok(())
    }

    /// Start every camera; a camera that cannot start is reported on the
    /// status channel and skipped. Returns how many pipelines started.
    pub fn start_all(&mut self, cameras: &[CameraConfig]) -> usize {
        let mut started = 0;
        for camera in cameras {
            match self.start_camera(camera.clone()) {
                Ok(()) => started += 1,
                Err(e) => {
                    warn!(camera_id = %camera.id, error = %e, "Camera not started");
                    let event = CameraEvent::new(camera.id.clone(), CameraEventKind::Error(e.to_string()));
                    let _ = self.ctx.events.try_send(event);
                }
            }
        }
        info!(started, configured = cameras.len(), "Camera pipelines started");
        started
    }

    /// Replace a camera's pipeline, e.g. after its configuration changed.
    pub fn restart_camera(&mut self, camera: CameraConfig) -> Result<Option<PipelineReport>> {
        let previous = self.stop_camera(camera.id.as_str());
        self.start_camera(camera)?;
        Ok(previous)
    }

    pub fn stop_camera(&mut self, camera_id: &str) -> Option<PipelineReport> {
        self.pipelines.remove(camera_id).map(CameraPipeline::join)
    }

    /// Freeze or resume one camera's preview. Returns `false` for unknown cameras.
    pub fn set_paused(&self, camera_id: &str, paused: bool) -> bool {
        match self.pipelines.get(camera_id) {
            Some(pipeline) => {
                pipeline.set_paused(paused);
                true
            }
            None => false,
        }
    }

    pub fn camera_ids(&self) -> Vec<&str> {
        self.pipelines.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Join pipelines whose threads have exited on their own (e.g. a camera
    /// that could not be opened). Returns the camera ids reaped.
    pub fn reap_finished(&mut self) -> Vec<String> {
        let done: Vec<String> = self
            .pipelines
            .iter()
            .filter(|(_, p)| p.is_finished())
            .map(|(id, _)| id.clone())
            .collect();
        for id in &done {
            if let Some(pipeline) = self.pipelines.remove(id) {
                let report = pipeline.join();
                if let Some(e) = &report.worker_error {
                    warn!(camera_id = %id, error = %e, "Camera pipeline ended");
                }
                self.finished.push(report);
            }
        }
        done
    }

    /// Stop every pipeline, then wait for all of them.
    #[instrument(name = "supervisor_shutdown", skip(self), fields(pipelines = self.pipelines.len()))]
    pub fn shutdown(mut self) -> SupervisorReport {
        for pipeline in self.pipelines.values() {
            pipeline.stop();
        }
        let mut report = SupervisorReport {
            pipelines: std::mem::take(&mut self.finished),
            ..Default::default()
        };
        report
            .pipelines
            .extend(std::mem::take(&mut self.pipelines).into_values().map(CameraPipeline::join));
        for pipeline in &report.pipelines {
            report.metrics.merge(&pipeline.analysis);
        }
        info!(pipelines = report.pipelines.len(), "All camera pipelines stopped");
        report
    }

    fn ensure_new(&self, camera: &CameraConfig) -> Result<()> {
        if self.pipelines.contains_key(camera.id.as_str()) {
            return Err(MonitorError::DuplicateCamera {
                camera_id: camera.id.to_string(),
            });
        }
        Ok(())
    }
}
