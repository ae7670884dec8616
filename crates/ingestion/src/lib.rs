//! # Ingestion
//!
//! Camera-side half of a camera pipeline.
//!
//! Responsibilities:
//! - Open camera sources (synthetic, image-directory replay, OpenCV capture)
//! - Run the capture loop with its reconnect state machine
//! - Mask frames to the camera ROI
//! - Hand the latest capture to the consumer through a single-slot [`Mailbox`]
//! - Report camera status on an explicit event channel
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{open_frame_source, CameraWorker, Mailbox, WorkerControl, WorkerSettings};
//!
//! let source = open_frame_source(&camera.id, &camera.source)?;
//! let mailbox = Arc::new(Mailbox::new());
//! let (events_tx, events_rx) = async_channel::bounded(64);
//! let control = WorkerControl::new();
//! let worker = CameraWorker::new(camera, source, mailbox.clone(), events_tx, control.clone(), settings);
//! std::thread::spawn(move || worker.run());
//! ```

mod config;
mod error;
mod mailbox;
mod overlay;
mod sources;
mod worker;

pub use config::{IngestionMetrics, MetricsSnapshot, WorkerSettings};
pub use error::{IngestionError, Result};
pub use mailbox::{Mailbox, Take};
pub use overlay::{draw_outline, mask_roi};
#[cfg(feature = "opencv-capture")]
pub use sources::OpenCvSource;
pub use sources::{open_frame_source, DirectoryReplaySource, SyntheticFrameSource};
pub use worker::{CameraWorker, CaptureSnapshot, WorkerControl, WorkerState};
