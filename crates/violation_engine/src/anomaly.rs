//! Frame-to-frame centroid comparison used by the foreign-object rule.

use contracts::BBox;

use crate::geometry::{pixel_distance, Point};

/// Compares the centroids of consecutive box sets.
///
/// Only previous-to-current matches are checked: a previous centroid with no
/// current centroid closer than `max_distance` marks the update anomalous.
/// New centroids that appear alongside matched ones do not.
#[derive(Debug, Clone)]
pub struct AnomalyTracker {
    previous: Vec<Point>,
    max_distance: f64,
}

impl AnomalyTracker {
    pub fn new(max_distance: f64) -> Self {
        Self {
            previous: Vec::new(),
            max_distance,
        }
    }

    /// Returns `true` when the arrangement is anomalous.
    ///
    /// - empty input: `true`, stored centroids untouched
    /// - no baseline yet: stores the centroids, `false`
    /// - otherwise: `true` if any stored centroid lost its match; the stored
    ///   centroids are replaced either way
    pub fn update(&mut self, boxes: &[BBox]) -> bool {
        if boxes.is_empty() {
            return true;
        }

        let current: Vec<Point> = boxes
            .iter()
            .map(|b| {
                let (x, y) = b.midpoint();
                Point::new(x, y)
            })
            .collect();

        if self.previous.is_empty() {
            self.previous = current;
            return false;
        }

        let anomalous = self.previous.iter().any(|prev| {
            let closest = current
                .iter()
                .map(|cur| pixel_distance(*prev, *cur))
                .fold(f64::INFINITY, f64::min);
            closest >= self.max_distance
        });

        self.previous = current;
        anomalous
    }

    pub fn reset(&mut self) {
        self.previous.clear();
    }

    pub fn previous(&self) -> &[Point] {
        &self.previous
    }
}
