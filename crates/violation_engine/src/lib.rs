//! # Violation Engine
//!
//! Turns one camera's stream of tracked detections into violation events and
//! per-lane vehicle counts.
//!
//! ## Rules
//! - **Stopped**: a track that stays within `stop_distance_px` of its first
//!   sighting for longer than `stop_duration_s`
//! - **OverSpeed**: instantaneous pinhole speed inside the speed trap at or
//!   above the limit, on every such frame
//! - **WrongDirection**: every `direction_refresh_frames` frames, a track whose
//!   last three vertical samples run against the configured flow
//! - **Pedestrian** / **Motorbike**: every person or bike detection
//! - **ForeignObject**: a stable set of unexplained contours near the lane
//!   midpoints with no pedestrian in view
//!
//! All elapsed times come from frame capture timestamps.

pub mod anomaly;
pub mod engine;
pub mod foreign_object;
pub mod geometry;
pub mod occupancy;
pub mod track;
pub mod tracker;

pub use anomaly::AnomalyTracker;
pub use engine::ViolationEngine;
pub use foreign_object::ForeignObjectDetector;
pub use geometry::{
    estimate_speed_kmh, lane_boundary_midpoints, lane_split_point, pixel_distance,
    point_in_polygon, GeometryError, LaneGeometry, LaneMidpoints, LaneSide, Point,
};
pub use occupancy::LaneOccupancy;
pub use track::{TrackHistoryEntry, TrackStore};
pub use tracker::IouTracker;
