//! Camera configuration and status events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::CameraId;

/// One camera row of the deployment file.
///
/// Immutable for the lifetime of a pipeline; changing it means tearing the
/// pipeline down and starting a new one.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CameraConfig {
    pub id: CameraId,

    /// Display name, unique across cameras
    #[validate(length(min = 1))]
    pub name: String,

    /// Location written to violation documents
    #[serde(default)]
    pub zone: String,

    /// RTSP URL, device index, video file, `dir://` or `mock://` URI
    #[validate(length(min = 1))]
    pub source: String,

    /// Road region as 4 normalized `[x, y]` corners
    #[validate(custom(function = "validate_roi"))]
    pub roi: Vec<[f64; 2]>,

    /// Informational only. Occupancy is always counted on two sides of the
    /// lane boundary (left and right), whatever this is set to.
    #[serde(default = "default_lane_count")]
    #[validate(range(min = 1))]
    pub lane_count: u32,
}

fn default_lane_count() -> u32 {
    2
}

fn validate_roi(roi: &Vec<[f64; 2]>) -> Result<(), ValidationError> {
    if roi.len() != 4 {
        let mut err = ValidationError::new("roi_corners");
        err.message = Some(format!("roi needs exactly 4 points, got {}", roi.len()).into());
        return Err(err);
    }
    let in_unit = |v: f64| (0.0..=1.0).contains(&v);
    if roi.iter().any(|[x, y]| !in_unit(*x) || !in_unit(*y)) {
        let mut err = ValidationError::new("roi_range");
        err.message = Some("roi coordinates must lie in [0, 1]".into());
        return Err(err);
    }
    Ok(())
}

impl CameraConfig {
    /// ROI corners scaled to pixel coordinates of a `width` x `height` frame.
    ///
    /// Returns `None` when the ROI does not have 4 corners.
    pub fn roi_pixels(&self, width: u32, height: u32) -> Option<[(f64, f64); 4]> {
        if self.roi.len() != 4 {
            return None;
        }
        let (w, h) = (f64::from(width), f64::from(height));
        let mut out = [(0.0, 0.0); 4];
        for (dst, [x, y]) in out.iter_mut().zip(&self.roi) {
            *dst = (x * w, y * h);
        }
        Some(out)
    }
}

/// Connection state of a camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraStatus {
    Online,
    Offline,
}

/// What happened to a camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraEventKind {
    Status(CameraStatus),
    /// The source could not be opened on first attempt; the pipeline will not stream.
    Error(String),
    /// Worker loop exited after a stop request.
    Stopped,
}

/// Status notification sent from a camera worker to whoever supervises it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraEvent {
    pub camera_id: CameraId,
    pub kind: CameraEventKind,
    pub at: DateTime<Utc>,
}

impl CameraEvent {
    pub fn new(camera_id: CameraId, kind: CameraEventKind) -> Self {
        Self {
            camera_id,
            kind,
            at: Utc::now(),
        }
    }

    pub fn status(camera_id: CameraId, status: CameraStatus) -> Self {
        Self::new(camera_id, CameraEventKind::Status(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera(roi: Vec<[f64; 2]>) -> CameraConfig {
        CameraConfig {
            id: "0".into(),
            name: "north".into(),
            zone: "Km 12".into(),
            source: "mock://64x48".into(),
            roi,
            lane_count: 2,
        }
    }

    #[test]
    fn test_roi_scaled_to_pixels() {
        let cam = camera(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.5, 0.5]]);
        let px = cam.roi_pixels(640, 480).unwrap();
        assert_eq!(px[1], (640.0, 0.0));
        assert_eq!(px[3], (320.0, 240.0));
    }

    #[test]
    fn test_validation_rejects_bad_roi() {
        assert!(camera(vec![[0.0, 0.0]; 4]).validate().is_ok());
        assert!(camera(vec![[0.0, 0.0]; 3]).validate().is_err());
        assert!(camera(vec![[0.0, 1.5]; 4]).validate().is_err());
    }
}
