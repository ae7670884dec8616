//! # Detection
//!
//! Client side of the external inference service. A service receives one
//! frame and returns the labelled boxes found on it; track ids are filled
//! when the service runs its own tracker.

mod error;
mod http;
mod response;
mod scripted;

use contracts::{Detection, Frame};

pub use error::{DetectionError, Result};
pub use http::{encode_png, HttpDetectionClient};
pub use response::{parse_response, LabelMap};
pub use scripted::ScriptedDetector;

/// Object detector for a single camera pipeline.
///
/// Implementations are owned by one consumer thread and may block.
pub trait DetectionService: Send {
    fn name(&self) -> &str;

    /// Detect objects on `frame`. The returned detections belong to this frame only.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;
}

impl<T: DetectionService + ?Sized> DetectionService for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        (**self).detect(frame)
    }
}
