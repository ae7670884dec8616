//! # Monitor
//!
//! Camera pipelines of the traffic violation monitor.
//!
//! Each camera runs two threads joined by a single-slot mailbox:
//!
//! ```text
//! CameraWorker ──latest capture──▶ Mailbox ──▶ CameraConsumer
//!   (capture, ROI mask,                         detection → IouTracker
//!    reconnect, status events)                  → ViolationEngine
//!                                               → ViolationRecorder ─▶ sink
//!                                               → LaneAggregator ────▶ sink
//! ```
//!
//! The [`Supervisor`] owns one [`CameraPipeline`] per configured camera.

pub mod aggregator;
pub mod consumer;
pub mod error;
pub mod pipeline;
pub mod recorder;
pub mod supervisor;

pub use aggregator::LaneAggregator;
pub use consumer::CameraConsumer;
pub use error::{MonitorError, Result};
pub use pipeline::{
    detector_factory, http_detector_factory, CameraPipeline, DetectorFactory, PipelineContext,
    PipelineReport,
};
pub use recorder::ViolationRecorder;
pub use supervisor::{Supervisor, SupervisorReport};
