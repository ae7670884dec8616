//! Detection - one labelled box returned by the inference service

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Object classes the detector can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClass {
    Bus,
    Car,
    Trailer,
    Truck,
    Person,
    Bike,
    /// Lane marking; its presence suppresses wrong-direction alerts.
    Lane,
}

impl ObjectClass {
    /// Vehicle class counted in lane aggregates, if any.
    pub fn vehicle(self) -> Option<VehicleClass> {
        match self {
            Self::Bus => Some(VehicleClass::Bus),
            Self::Car => Some(VehicleClass::Car),
            Self::Trailer => Some(VehicleClass::Trailer),
            Self::Truck => Some(VehicleClass::Truck),
            Self::Person | Self::Bike | Self::Lane => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bus => "bus",
            Self::Car => "car",
            Self::Trailer => "trailer",
            Self::Truck => "truck",
            Self::Person => "person",
            Self::Bike => "bike",
            Self::Lane => "lane",
        }
    }
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bus" => Ok(Self::Bus),
            "car" => Ok(Self::Car),
            "trailer" => Ok(Self::Trailer),
            "truck" => Ok(Self::Truck),
            "person" | "pedestrian" => Ok(Self::Person),
            "bike" | "motorbike" | "motorcycle" => Ok(Self::Bike),
            "lane" => Ok(Self::Lane),
            other => Err(format!("unknown object class '{other}'")),
        }
    }
}

/// Vehicle classes reported in lane aggregate documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleClass {
    Car,
    Truck,
    Bus,
    Trailer,
}

impl VehicleClass {
    pub const ALL: [VehicleClass; 4] = [Self::Car, Self::Truck, Self::Bus, Self::Trailer];
}

/// Axis-aligned box in pixel coordinates, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl BBox {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Build from `[x1, y1, x2, y2]` corners as the detector returns them.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x: x1.min(x2),
            y: y1.min(y2),
            w: (x2 - x1).abs(),
            h: (y2 - y1).abs(),
        }
    }

    /// Center point `(x + w/2, y + h/2)`.
    pub fn midpoint(&self) -> (f64, f64) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn area(&self) -> f64 {
        self.w.max(0.0) * self.h.max(0.0)
    }

    /// Intersection over union, 0 for disjoint boxes.
    pub fn iou(&self, other: &BBox) -> f64 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.w).min(other.x + other.w);
        let y2 = (self.y + self.h).min(other.y + other.h);
        let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// A detection belonging to exactly one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class: ObjectClass,
    pub bbox: BBox,
    /// Stable across frames while tracking holds. `None` until a tracker assigns one.
    pub track_id: Option<u64>,
    pub score: f32,
}

impl Detection {
    pub fn new(class: ObjectClass, bbox: BBox) -> Self {
        Self {
            class,
            bbox,
            track_id: None,
            score: 1.0,
        }
    }

    pub fn with_track(mut self, track_id: u64) -> Self {
        self.track_id = Some(track_id);
        self
    }
}
