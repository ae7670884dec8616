//! Lane geometry and pixel-space math.
//!
//! All coordinates are image pixels with the origin at the top-left corner,
//! so "down the road" towards the camera means increasing `y`.

use nalgebra::Point2;
use thiserror::Error;

pub type Point = Point2<f64>;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GeometryError {
    /// Both points share an x coordinate, the slope is undefined.
    #[error("vertical line at x={x}: slope undefined")]
    VerticalLine { x: f64 },

    /// Both points share a y coordinate, x cannot be solved from y.
    #[error("horizontal line at y={y}: x undefined for other y")]
    HorizontalLine { y: f64 },
}

/// Point on line A-B at `y = max(yA, yB) * ratio`.
///
/// The line is fitted as `y = a*x + b` and solved for x.
///
/// # Errors
/// `VerticalLine` when `A.x == B.x`, `HorizontalLine` when the slope is 0.
pub fn lane_split_point(a: Point, b: Point, ratio: f64) -> Result<Point, GeometryError> {
    let dx = b.x - a.x;
    if dx == 0.0 {
        return Err(GeometryError::VerticalLine { x: a.x });
    }
    let slope = (b.y - a.y) / dx;
    if slope == 0.0 {
        return Err(GeometryError::HorizontalLine { y: a.y });
    }
    let intercept = a.y - slope * a.x;
    let y = a.y.max(b.y) * ratio;
    Ok(Point::new((y - intercept) / slope, y))
}

pub fn midpoint(a: Point, b: Point) -> Point {
    nalgebra::center(&a, &b)
}

pub fn pixel_distance(a: Point, b: Point) -> f64 {
    nalgebra::distance(&a, &b)
}

/// Even-odd ray casting test. Points exactly on an edge may fall either way.
pub fn point_in_polygon(p: Point, polygon: &[Point]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (polygon[i], polygon[j]);
        if (pi.y > p.y) != (pj.y > p.y) {
            let x_cross = (pj.x - pi.x) * (p.y - pi.y) / (pj.y - pi.y) + pi.x;
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Pinhole approximation of speed in km/h.
///
/// `sensor_mm * pixels / (focal_mm * seconds) * 3.6`. Returns `None` when no
/// time has elapsed.
pub fn estimate_speed_kmh(
    pixel_distance: f64,
    elapsed_s: f64,
    sensor_size_mm: f64,
    focal_length_mm: f64,
) -> Option<f64> {
    if elapsed_s <= 0.0 || focal_length_mm <= 0.0 {
        return None;
    }
    Some(sensor_size_mm * pixel_distance / (focal_length_mm * elapsed_s) * 3.6)
}

/// Side of the lane boundary an object is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LaneSide {
    Left,
    Right,
}

/// Reference midpoints of the far (top) and near (bottom) ROI edges.
///
/// The segment between them is the boundary separating the left and right lanes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaneMidpoints {
    pub far: Point,
    pub near: Point,
}

impl LaneMidpoints {
    /// Boundary x at the height of `p`, interpolated along far-near.
    pub fn boundary_x(&self, y: f64) -> f64 {
        let dy = self.near.y - self.far.y;
        if dy == 0.0 {
            return self.far.x;
        }
        self.far.x + (self.near.x - self.far.x) * (y - self.far.y) / dy
    }

    pub fn side_of(&self, p: Point) -> LaneSide {
        if p.x < self.boundary_x(p.y) {
            LaneSide::Left
        } else {
            LaneSide::Right
        }
    }

    pub fn nearest_distance(&self, p: Point) -> f64 {
        pixel_distance(p, self.far).min(pixel_distance(p, self.near))
    }
}

/// Corners of a quadrilateral ordered as top-left, top-right, bottom-right, bottom-left.
fn order_corners(polygon: &[Point; 4]) -> [Point; 4] {
    let mut by_y = *polygon;
    by_y.sort_by(|a, b| a.y.total_cmp(&b.y));
    let (top, bottom) = by_y.split_at(2);
    let (tl, tr) = if top[0].x <= top[1].x {
        (top[0], top[1])
    } else {
        (top[1], top[0])
    };
    let (bl, br) = if bottom[0].x <= bottom[1].x {
        (bottom[0], bottom[1])
    } else {
        (bottom[1], bottom[0])
    };
    [tl, tr, br, bl]
}

/// Midpoints of the far and near edges of a 4-point ROI.
pub fn lane_boundary_midpoints(polygon: &[Point; 4]) -> LaneMidpoints {
    let [tl, tr, br, bl] = order_corners(polygon);
    LaneMidpoints {
        far: midpoint(tl, tr),
        near: midpoint(bl, br),
    }
}

/// Geometry derived once per camera ROI and frame size.
#[derive(Debug, Clone, PartialEq)]
pub struct LaneGeometry {
    /// ROI corners in pixels, top-left, top-right, bottom-right, bottom-left
    pub roi: [Point; 4],
    pub midpoints: LaneMidpoints,
    /// Speed-trap region; `None` when the ROI sides are degenerate
    pub goal: Option<[Point; 4]>,
}

impl LaneGeometry {
    pub fn from_roi(roi: [Point; 4], goal_ratio: f64) -> Self {
        let roi = order_corners(&roi);
        let [tl, tr, br, bl] = roi;
        let goal = match (side_split(tl, bl, goal_ratio), side_split(tr, br, goal_ratio)) {
            (Ok(left), Ok(right)) => Some([left, right, br, bl]),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(error = %e, "ROI side degenerate, speed trap disabled");
                None
            }
        };
        Self {
            roi,
            midpoints: lane_boundary_midpoints(&roi),
            goal,
        }
    }

    pub fn from_pixels(roi: [(f64, f64); 4], goal_ratio: f64) -> Self {
        Self::from_roi(roi.map(|(x, y)| Point::new(x, y)), goal_ratio)
    }

    pub fn in_roi(&self, p: Point) -> bool {
        point_in_polygon(p, &self.roi)
    }

    pub fn in_goal(&self, p: Point) -> bool {
        self.goal.as_ref().is_some_and(|g| point_in_polygon(p, g))
    }

    /// Axis-aligned bounds of the ROI as `(min_x, min_y, max_x, max_y)`.
    pub fn roi_bounds(&self) -> (f64, f64, f64, f64) {
        self.roi.iter().fold(
            (f64::MAX, f64::MAX, f64::MIN, f64::MIN),
            |(x0, y0, x1, y1), p| (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y)),
        )
    }
}

/// Split point on one ROI side. A vertical side keeps its x.
fn side_split(a: Point, b: Point, ratio: f64) -> Result<Point, GeometryError> {
    match lane_split_point(a, b, ratio) {
        Err(GeometryError::VerticalLine { x }) => Ok(Point::new(x, a.y.max(b.y) * ratio)),
        other => other,
    }
}
