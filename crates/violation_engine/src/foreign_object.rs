//! Foreign-object search on the road surface.
//!
//! The search runs on the ROI quadrilateral only. Edges that are not
//! explained by any detection box are traced into contours. Mid-sized contours near the lane reference midpoints become
//! candidates, and the rule fires when the candidate arrangement is stable
//! between consecutive analysed frames while no pedestrian is in view.

use contracts::{BBox, Detection, ForeignObjectConfig, ObjectClass};
use image::{imageops, GrayImage, Luma, RgbImage};
use imageproc::contours::find_contours;
use imageproc::distance_transform::Norm;
use imageproc::drawing::draw_polygon_mut;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::erode;
use imageproc::point::Point as PixelPoint;
use tracing::trace;

use crate::anomaly::AnomalyTracker;
use crate::geometry::{pixel_distance, LaneGeometry, Point};

/// Edges closer than this to the ROI border are dropped.
const BORDER_MARGIN_PX: u8 = 3;

#[derive(Debug, Clone)]
pub struct ForeignObjectDetector {
    config: ForeignObjectConfig,
    tracker: AnomalyTracker,
}

/// Pixel window of the ROI bounding box clipped to the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    left: u32,
    top: u32,
    width: u32,
    height: u32,
}

impl Window {
    fn of(geometry: &LaneGeometry, image_w: u32, image_h: u32) -> Option<Self> {
        let (x0, y0, x1, y1) = geometry.roi_bounds();
        let clamp = |v: f64, max: u32| v.clamp(0.0, f64::from(max)) as u32;
        let left = clamp(x0.floor(), image_w);
        let top = clamp(y0.floor(), image_h);
        let right = clamp(x1.ceil(), image_w);
        let bottom = clamp(y1.ceil(), image_h);
        (right > left && bottom > top).then_some(Self {
            left,
            top,
            width: right - left,
            height: bottom - top,
        })
    }

    /// Filled ROI polygon in window coordinates. `None` for a collapsed polygon.
    fn roi_mask(&self, geometry: &LaneGeometry) -> Option<GrayImage> {
        let poly: Vec<PixelPoint<i32>> = geometry
            .roi
            .iter()
            .map(|p| {
                PixelPoint::new(
                    (p.x - f64::from(self.left)).round() as i32,
                    (p.y - f64::from(self.top)).round() as i32,
                )
            })
            .collect();
        let distinct = poly.windows(2).all(|w| w[0] != w[1]) && poly[0] != poly[poly.len() - 1];
        if !distinct {
            return None;
        }
        let mut mask = GrayImage::new(self.width, self.height);
        draw_polygon_mut(&mut mask, &poly, Luma([255]));
        Some(mask)
    }
}

/// Zero every pixel of `image` where `mask` is zero.
fn apply_mask(image: &mut GrayImage, mask: &GrayImage) {
    for (pixel, m) in image.pixels_mut().zip(mask.pixels()) {
        if m.0[0] == 0 {
            pixel.0[0] = 0;
        }
    }
}

impl ForeignObjectDetector {
    pub fn new(config: ForeignObjectConfig) -> Self {
        let tracker = AnomalyTracker::new(config.anomaly_max_distance_px);
        Self { config, tracker }
    }

    /// Run the rule for one frame. Returns `true` when a foreign object is reported.
    pub fn check(
        &mut self,
        image: &RgbImage,
        geometry: &LaneGeometry,
        detections: &[Detection],
    ) -> bool {
        let candidates = self.candidates(image, geometry, detections);
        let anomalous = self.tracker.update(&candidates);
        let person_present = detections.iter().any(|d| d.class == ObjectClass::Person);
        trace!(
            candidates = candidates.len(),
            anomalous,
            person_present,
            "Foreign object check"
        );
        // Fires on a stable arrangement, not on a change.
        !anomalous && !person_present
    }

    /// Bounding boxes (frame coordinates) of contours that qualify as candidates.
    pub fn candidates(
        &self,
        image: &RgbImage,
        geometry: &LaneGeometry,
        detections: &[Detection],
    ) -> Vec<BBox> {
        let Some(window) = Window::of(geometry, image.width(), image.height()) else {
            return Vec::new();
        };

        let crop =
            imageops::crop_imm(image, window.left, window.top, window.width, window.height)
                .to_image();
        let mut gray = imageops::grayscale(&crop);
        let region = window.roi_mask(geometry);
        if let Some(region) = &region {
            apply_mask(&mut gray, region);
        }
        let mut blurred = gaussian_blur_f32(&gray, self.config.blur_sigma);
        self.mask_detections(&mut blurred, window, detections);

        let mut edges = canny(&blurred, self.config.canny_low, self.config.canny_high);
        if let Some(region) = &region {
            apply_mask(&mut edges, &erode(region, Norm::LInf, BORDER_MARGIN_PX));
        }
        let offset = (f64::from(window.left), f64::from(window.top));

        find_contours::<i32>(&edges)
            .into_iter()
            .filter(|c| {
                c.points.len() > self.config.min_contour_points
                    && c.points.len() < self.config.max_contour_points
            })
            .filter_map(|c| {
                let first = c.points.first()?;
                let start = Point::new(
                    f64::from(first.x) + offset.0,
                    f64::from(first.y) + offset.1,
                );
                if !self.near_midpoint(start, geometry) {
                    return None;
                }
                let (mut x0, mut y0, mut x1, mut y1) = (i32::MAX, i32::MAX, i32::MIN, i32::MIN);
                for p in &c.points {
                    x0 = x0.min(p.x);
                    y0 = y0.min(p.y);
                    x1 = x1.max(p.x);
                    y1 = y1.max(p.y);
                }
                Some(BBox::new(
                    f64::from(x0) + offset.0,
                    f64::from(y0) + offset.1,
                    f64::from(x1 - x0 + 1),
                    f64::from(y1 - y0 + 1),
                ))
            })
            .collect()
    }

    pub fn reset(&mut self) {
        self.tracker.reset();
    }

    fn near_midpoint(&self, p: Point, geometry: &LaneGeometry) -> bool {
        let (lo, hi) = (
            self.config.min_midpoint_distance_px,
            self.config.max_midpoint_distance_px,
        );
        [geometry.midpoints.far, geometry.midpoints.near]
            .into_iter()
            .map(|m| pixel_distance(p, m))
            .any(|d| d > lo && d < hi)
    }

    /// Zero every detection box, grown by the configured margin, inside the crop.
    fn mask_detections(&self, gray: &mut GrayImage, window: Window, detections: &[Detection]) {
        let margin = f64::from(self.config.box_margin_px);
        let (w, h) = (f64::from(window.width), f64::from(window.height));
        for det in detections {
            let b = det.bbox;
            let x0 = (b.x - margin - f64::from(window.left)).clamp(0.0, w) as u32;
            let y0 = (b.y - margin - f64::from(window.top)).clamp(0.0, h) as u32;
            let x1 = (b.x + b.w + margin - f64::from(window.left)).clamp(0.0, w) as u32;
            let y1 = (b.y + b.h + margin - f64::from(window.top)).clamp(0.0, h) as u32;
            for y in y0..y1 {
                for x in x0..x1 {
                    gray.put_pixel(x, y, Luma([0]));
                }
            }
        }
    }
}
