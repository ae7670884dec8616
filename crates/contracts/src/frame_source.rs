//! FrameSource trait - camera capture abstraction
//!
//! Decouples the camera worker from the capture backend so synthetic,
//! replayed and OpenCV-backed cameras run through the same state machine.

use std::sync::Arc;

use crate::{ContractError, Frame};

/// Callback receiving frames for a live preview.
///
/// Called from the camera worker thread; must not block.
pub type PreviewCallback = Arc<dyn Fn(&Frame) + Send + Sync>;

/// A camera capture handle.
///
/// Lifecycle mirrors a video-capture object: `open` may be called again
/// after `release` to reconnect.
pub trait FrameSource: Send {
    /// Human readable source description for logs.
    fn describe(&self) -> String;

    /// Open (or reopen) the underlying stream.
    fn open(&mut self) -> Result<(), ContractError>;

    /// Block until the next frame is decoded.
    ///
    /// # Errors
    /// `CaptureRead` when the stream ended or the connection dropped.
    fn read(&mut self) -> Result<Frame, ContractError>;

    /// Release the handle. Idempotent.
    fn release(&mut self);

    fn is_opened(&self) -> bool;
}
