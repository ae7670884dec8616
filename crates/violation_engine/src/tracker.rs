//! Greedy IoU tracker for detectors that return no track ids.

use contracts::{BBox, Detection, ObjectClass};

#[derive(Debug, Clone)]
struct LocalTrack {
    id: u64,
    class: ObjectClass,
    bbox: BBox,
    misses: u32,
}

/// Assigns stable ids by matching boxes of the same class across frames.
///
/// Matching is greedy on descending IoU. Ids increase monotonically and are
/// never reused.
#[derive(Debug, Clone)]
pub struct IouTracker {
    tracks: Vec<LocalTrack>,
    next_id: u64,
    iou_threshold: f64,
    max_age: u32,
}

impl Default for IouTracker {
    fn default() -> Self {
        Self::new(0.3, 30)
    }
}

impl IouTracker {
    pub fn new(iou_threshold: f64, max_age: u32) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 1,
            iou_threshold,
            max_age,
        }
    }

    /// Fill `track_id` of every detection that has none.
    ///
    /// Detections that already carry an id are left untouched and do not
    /// take part in matching.
    pub fn assign(&mut self, detections: &mut [Detection]) {
        let pending: Vec<usize> = detections
            .iter()
            .enumerate()
            .filter(|(_, d)| d.track_id.is_none() && d.class != ObjectClass::Lane)
            .map(|(i, _)| i)
            .collect();

        let mut pairs: Vec<(f64, usize, usize)> = Vec::new();
        for (ti, track) in self.tracks.iter().enumerate() {
            for &di in &pending {
                let det = &detections[di];
                if det.class != track.class {
                    continue;
                }
                let iou = track.bbox.iou(&det.bbox);
                if iou >= self.iou_threshold {
                    pairs.push((iou, ti, di));
                }
            }
        }
        pairs.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut track_used = vec![false; self.tracks.len()];
        let mut det_used = vec![false; detections.len()];
        for (_, ti, di) in pairs {
            if track_used[ti] || det_used[di] {
                continue;
            }
            track_used[ti] = true;
            det_used[di] = true;
            let track = &mut self.tracks[ti];
            track.bbox = detections[di].bbox;
            track.misses = 0;
            detections[di].track_id = Some(track.id);
        }

        for (track, used) in self.tracks.iter_mut().zip(&track_used) {
            if !used {
                track.misses += 1;
            }
        }
        let max_age = self.max_age;
        self.tracks.retain(|t| t.misses <= max_age);

        for di in pending {
            if det_used[di] {
                continue;
            }
            let id = self.next_id;
            self.next_id += 1;
            detections[di].track_id = Some(id);
            self.tracks.push(LocalTrack {
                id,
                class: detections[di].class,
                bbox: detections[di].bbox,
                misses: 0,
            });
        }
    }

    pub fn active_tracks(&self) -> usize {
        self.tracks.len()
    }
}
