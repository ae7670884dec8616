//! Violation engine configuration contracts that can be shared across crates.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Expected direction of travel in image coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficFlow {
    /// Vehicles move towards the camera: midpoint y grows over time.
    #[default]
    Approaching,
    /// Vehicles move away from the camera: midpoint y shrinks over time.
    Receding,
}

/// Violation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ViolationEngineConfig {
    /// Maximum displacement (px) from the first sighting for a track to count as stopped
    #[validate(range(exclusive_min = 0.0))]
    pub stop_distance_px: f64,

    /// Seconds a track must stay within `stop_distance_px` before it is reported
    #[validate(range(exclusive_min = 0.0))]
    pub stop_duration_s: f64,

    /// km/h at or above which a track is reported as over-speed
    #[validate(range(exclusive_min = 0.0))]
    pub speed_limit_kmh: f64,

    /// Camera sensor size (mm) for the pinhole speed estimate
    #[validate(range(exclusive_min = 0.0))]
    pub sensor_size_mm: f64,

    /// Lens focal length (mm) for the pinhole speed estimate
    #[validate(range(exclusive_min = 0.0))]
    pub focal_length_mm: f64,

    /// Fraction of the ROI height where the speed trap begins
    #[validate(range(exclusive_min = 0.0, exclusive_max = 1.0))]
    pub goal_ratio: f64,

    /// Frames between wrong-direction evaluations
    #[validate(range(min = 1))]
    pub direction_refresh_frames: u32,

    pub traffic_flow: TrafficFlow,

    /// Tracks unseen for this long are evicted
    #[validate(range(exclusive_min = 0.0))]
    pub track_ttl_s: f64,

    /// Hard cap on tracked ids per camera
    #[validate(range(min = 1))]
    pub max_tracks: usize,

    #[validate(nested)]
    pub foreign_object: ForeignObjectConfig,
}

impl Default for ViolationEngineConfig {
    fn default() -> Self {
        Self {
            stop_distance_px: 40.0,
            stop_duration_s: 5.0,
            speed_limit_kmh: 120.0,
            sensor_size_mm: 24.0,
            focal_length_mm: 50.0,
            goal_ratio: 0.6,
            direction_refresh_frames: 30,
            traffic_flow: TrafficFlow::Approaching,
            track_ttl_s: 30.0,
            max_tracks: 512,
            foreign_object: ForeignObjectConfig::default(),
        }
    }
}

/// Foreign-object contour search parameters
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ForeignObjectConfig {
    pub enabled: bool,

    /// Centroid match distance for frame-to-frame stability
    #[validate(range(exclusive_min = 0.0))]
    pub anomaly_max_distance_px: f64,

    /// Contours need strictly more points than this
    pub min_contour_points: usize,

    /// Contours need strictly fewer points than this
    pub max_contour_points: usize,

    /// Contour start must lie strictly farther than this from a lane midpoint
    pub min_midpoint_distance_px: f64,

    /// Contour start must lie strictly closer than this to a lane midpoint
    pub max_midpoint_distance_px: f64,

    /// Margin added around detection boxes before masking them out
    pub box_margin_px: u32,

    #[validate(range(exclusive_min = 0.0))]
    pub blur_sigma: f32,

    pub canny_low: f32,
    pub canny_high: f32,
}

impl Default for ForeignObjectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            anomaly_max_distance_px: 20.0,
            min_contour_points: 20,
            max_contour_points: 100,
            min_midpoint_distance_px: 60.0,
            max_midpoint_distance_px: 150.0,
            box_margin_px: 10,
            blur_sigma: 1.5,
            canny_low: 50.0,
            canny_high: 120.0,
        }
    }
}
