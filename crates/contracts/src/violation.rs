//! Violation events and the documents written to the persistence sink

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{CameraId, VehicleClass};

/// Violation categories. Serialized with the labels operators see in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    #[serde(rename = "Vật thể lạ")]
    ForeignObject,
    #[serde(rename = "Dừng đỗ xe")]
    Stopped,
    #[serde(rename = "Quá tốc độ")]
    OverSpeed,
    #[serde(rename = "Ngược chiều")]
    WrongDirection,
    #[serde(rename = "Người đi bộ")]
    Pedestrian,
    #[serde(rename = "Xe máy")]
    Motorbike,
}

impl ViolationKind {
    /// Stable ASCII name used in metric labels and snapshot file names.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ForeignObject => "foreign_object",
            Self::Stopped => "stopped",
            Self::OverSpeed => "over_speed",
            Self::WrongDirection => "wrong_direction",
            Self::Pedestrian => "pedestrian",
            Self::Motorbike => "motorbike",
        }
    }

    /// Label stored in the `type` field of violation documents.
    pub fn label(self) -> &'static str {
        match self {
            Self::ForeignObject => "Vật thể lạ",
            Self::Stopped => "Dừng đỗ xe",
            Self::OverSpeed => "Quá tốc độ",
            Self::WrongDirection => "Ngược chiều",
            Self::Pedestrian => "Người đi bộ",
            Self::Motorbike => "Xe máy",
        }
    }
}

/// Emitted by the violation engine for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ViolationEvent {
    pub kind: ViolationKind,
    pub camera_id: CameraId,
    /// Zone of the camera that saw it.
    pub location: String,
    pub track_id: Option<u64>,
    /// Capture time of the frame the violation was detected on.
    pub timestamp: DateTime<Utc>,
    /// km/h, only for over-speed.
    pub speed: Option<u32>,
}

/// Format of stored `time` / `create_time` values: naive UTC, millisecond precision.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Stored timestamp, e.g. `2024-05-01T08:30:00.125`. No offset suffix.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.naive_utc().format(TIMESTAMP_FORMAT).to_string()
}

/// Violation document, one per event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationDocument {
    #[serde(rename = "type")]
    pub kind: ViolationKind,
    pub location: String,
    pub path: String,
    pub time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<u32>,
}

impl ViolationDocument {
    pub fn from_event(event: &ViolationEvent, path: impl Into<String>) -> Self {
        Self {
            kind: event.kind,
            location: event.location.clone(),
            path: path.into(),
            time: format_timestamp(&event.timestamp),
            speed: event.speed,
        }
    }
}

/// Per-camera vehicle counts inside a lane aggregate document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct CameraCounts {
    #[serde(rename = "CAM_ID")]
    pub cam_id: String,
    pub car: u64,
    pub truck: u64,
    pub bus: u64,
    pub trailer: u64,
}

impl CameraCounts {
    pub fn from_map(cam_id: impl Into<String>, counts: &BTreeMap<VehicleClass, u64>) -> Self {
        let get = |class| counts.get(&class).copied().unwrap_or(0);
        Self {
            cam_id: cam_id.into(),
            car: get(VehicleClass::Car),
            truck: get(VehicleClass::Truck),
            bus: get(VehicleClass::Bus),
            trailer: get(VehicleClass::Trailer),
        }
    }

    pub fn get(&self, class: VehicleClass) -> u64 {
        match class {
            VehicleClass::Car => self.car,
            VehicleClass::Truck => self.truck,
            VehicleClass::Bus => self.bus,
            VehicleClass::Trailer => self.trailer,
        }
    }

    /// Per-class absolute difference against an earlier flush.
    pub fn delta(&self, previous: &CameraCounts) -> CameraCounts {
        CameraCounts {
            cam_id: self.cam_id.clone(),
            car: self.car.abs_diff(previous.car),
            truck: self.truck.abs_diff(previous.truck),
            bus: self.bus.abs_diff(previous.bus),
            trailer: self.trailer.abs_diff(previous.trailer),
        }
    }
}

/// Periodic lane aggregate document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneAggregateDocument {
    pub create_time: String,
    #[serde(rename = "CAM")]
    pub cam: Vec<CameraCounts>,
}

impl LaneAggregateDocument {
    pub fn camera(&self, cam_id: &str) -> Option<&CameraCounts> {
        self.cam.iter().find(|c| c.cam_id == cam_id)
    }
}
