//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the traffic monitor.
//! Business crates depend only on this crate, never on each other upwards.
//!
//! ## Time Model
//! - Every `Frame` carries its capture time as `DateTime<Utc>`
//! - Violation and track timing is derived from capture times, never from wall-clock
//!   time at analysis, so a slow consumer does not distort elapsed durations

mod blueprint;
mod camera;
mod camera_id;
mod detection;
mod engine_config;
mod error;
mod frame;
mod frame_source;
mod sink;
mod violation;

pub use blueprint::*;
pub use camera::*;
pub use camera_id::CameraId;
pub use detection::*;
pub use engine_config::*;
pub use error::*;
pub use frame::Frame;
pub use frame_source::{FrameSource, PreviewCallback};
pub use sink::PersistenceSink;
pub use violation::*;
