//! Distinct vehicles seen per lane during one aggregation window.

use std::collections::{BTreeMap, HashMap, HashSet};

use contracts::VehicleClass;

use crate::geometry::LaneSide;

/// `(lane, class) -> distinct track ids`. Owned by one camera pipeline.
#[derive(Debug, Clone, Default)]
pub struct LaneOccupancy {
    seen: HashMap<(LaneSide, VehicleClass), HashSet<u64>>,
}

impl LaneOccupancy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the track was not yet counted for this lane and class.
    pub fn record(&mut self, lane: LaneSide, class: VehicleClass, track_id: u64) -> bool {
        self.seen.entry((lane, class)).or_default().insert(track_id)
    }

    pub fn lane_count(&self, lane: LaneSide, class: VehicleClass) -> usize {
        self.seen.get(&(lane, class)).map_or(0, HashSet::len)
    }

    /// Distinct tracks per class across both lanes.
    ///
    /// A track that changed lanes inside the window is counted once.
    pub fn class_counts(&self) -> BTreeMap<VehicleClass, u64> {
        VehicleClass::ALL
            .into_iter()
            .map(|class| {
                let ids: HashSet<u64> = [LaneSide::Left, LaneSide::Right]
                    .into_iter()
                    .filter_map(|lane| self.seen.get(&(lane, class)))
                    .flatten()
                    .copied()
                    .collect();
                (class, ids.len() as u64)
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.values().all(HashSet::is_empty)
    }

    pub fn reset(&mut self) {
        self.seen.clear();
    }
}
