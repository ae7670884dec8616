//! Per-track history with an explicit eviction policy.
//!
//! Entries are keyed by the tracker-assigned id. An entry is dropped once it
//! has not been seen for `ttl`, and the least recently seen entries are
//! dropped whenever the store exceeds `max_tracks`. A track's direction
//! samples are evicted with it.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use contracts::ObjectClass;
use ringbuf::{traits::*, HeapRb};

use crate::geometry::Point;

/// Vertical midpoint samples kept per track for the direction check.
pub const DIRECTION_SAMPLES: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct TrackHistoryEntry {
    pub track_id: u64,
    pub class: ObjectClass,
    pub first_point: Point,
    pub first_time: DateTime<Utc>,
    pub last_point: Point,
    pub last_time: DateTime<Utc>,
}

impl TrackHistoryEntry {
    fn new(track_id: u64, class: ObjectClass, point: Point, time: DateTime<Utc>) -> Self {
        Self {
            track_id,
            class,
            first_point: point,
            first_time: time,
            last_point: point,
            last_time: time,
        }
    }
}

/// Result of recording one sighting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub first_point: Point,
    pub first_time: DateTime<Utc>,
    /// Last sighting before this one, `None` for a new track
    pub previous: Option<(Point, DateTime<Utc>)>,
}

pub fn seconds_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    (later - earlier).num_microseconds().unwrap_or(i64::MAX) as f64 / 1e6
}

pub struct TrackStore {
    entries: HashMap<u64, TrackHistoryEntry>,
    directions: HashMap<u64, HeapRb<f64>>,
    ttl_s: f64,
    max_tracks: usize,
}

impl fmt::Debug for TrackStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackStore")
            .field("tracks", &self.entries.len())
            .field("ttl_s", &self.ttl_s)
            .field("max_tracks", &self.max_tracks)
            .finish()
    }
}

impl TrackStore {
    pub fn new(ttl_s: f64, max_tracks: usize) -> Self {
        Self {
            entries: HashMap::new(),
            directions: HashMap::new(),
            ttl_s,
            max_tracks: max_tracks.max(1),
        }
    }

    /// Record a sighting and return the history as it was before it.
    pub fn observe(
        &mut self,
        track_id: u64,
        class: ObjectClass,
        point: Point,
        time: DateTime<Utc>,
    ) -> Observation {
        match self.entries.entry(track_id) {
            Entry::Vacant(slot) => {
                slot.insert(TrackHistoryEntry::new(track_id, class, point, time));
                Observation {
                    first_point: point,
                    first_time: time,
                    previous: None,
                }
            }
            Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();
                let observation = Observation {
                    first_point: entry.first_point,
                    first_time: entry.first_time,
                    previous: Some((entry.last_point, entry.last_time)),
                };
                entry.class = class;
                entry.last_point = point;
                // Keeps last_time >= first_time even if a source clock steps back
                entry.last_time = time.max(entry.first_time);
                observation
            }
        }
    }

    pub fn get(&self, track_id: u64) -> Option<&TrackHistoryEntry> {
        self.entries.get(&track_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a vertical midpoint sample, dropping the oldest beyond three.
    pub fn push_direction(&mut self, track_id: u64, y: f64) {
        self.directions
            .entry(track_id)
            .or_insert_with(|| HeapRb::new(DIRECTION_SAMPLES))
            .push_overwrite(y);
    }

    /// Take every direction history, leaving all buffers empty.
    pub fn drain_directions(&mut self) -> Vec<(u64, Vec<f64>)> {
        let mut out: Vec<(u64, Vec<f64>)> = self
            .directions
            .iter_mut()
            .map(|(&id, rb)| {
                let samples: Vec<f64> = rb.iter().copied().collect();
                rb.clear();
                (id, samples)
            })
            .collect();
        out.sort_by_key(|(id, _)| *id);
        out
    }

    /// Apply the eviction policy relative to `now`. Returns evicted count.
    pub fn evict(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        let ttl_s = self.ttl_s;
        self.entries
            .retain(|_, e| seconds_between(e.last_time, now) <= ttl_s);

        if self.entries.len() > self.max_tracks {
            let mut by_age: Vec<(DateTime<Utc>, u64)> = self
                .entries
                .values()
                .map(|e| (e.last_time, e.track_id))
                .collect();
            by_age.sort();
            let excess = self.entries.len() - self.max_tracks;
            for (_, id) in by_age.into_iter().take(excess) {
                self.entries.remove(&id);
            }
        }

        let entries = &self.entries;
        self.directions.retain(|id, _| entries.contains_key(id));
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_observe_keeps_first_and_reports_previous() {
        let mut store = TrackStore::new(30.0, 16);
        let first = store.observe(1, ObjectClass::Car, Point::new(10.0, 10.0), t0());
        assert_eq!(first.previous, None);

        let later = t0() + Duration::seconds(2);
        let obs = store.observe(1, ObjectClass::Car, Point::new(20.0, 10.0), later);
        assert_eq!(obs.first_point, Point::new(10.0, 10.0));
        assert_eq!(obs.previous, Some((Point::new(10.0, 10.0), t0())));

        let entry = store.get(1).unwrap();
        assert_eq!(entry.last_point, Point::new(20.0, 10.0));
        assert!(entry.last_time >= entry.first_time);
    }

    #[test]
    fn test_direction_history_is_capped() {
        let mut store = TrackStore::new(30.0, 16);
        store.observe(4, ObjectClass::Car, Point::new(0.0, 0.0), t0());
        for y in [1.0, 2.0, 3.0, 4.0] {
            store.push_direction(4, y);
        }
        let drained = store.drain_directions();
        assert_eq!(drained, vec![(4, vec![2.0, 3.0, 4.0])]);
        assert_eq!(store.drain_directions(), vec![(4, vec![])]);
    }

    #[test]
    fn test_ttl_eviction() {
        let mut store = TrackStore::new(10.0, 16);
        store.observe(1, ObjectClass::Car, Point::new(0.0, 0.0), t0());
        store.push_direction(1, 0.0);
        store.observe(2, ObjectClass::Bus, Point::new(0.0, 0.0), t0() + Duration::seconds(8));

        assert_eq!(store.evict(t0() + Duration::seconds(10)), 0);
        assert_eq!(store.evict(t0() + Duration::seconds(11)), 1);
        assert!(store.get(1).is_none());
        assert!(store.get(2).is_some());
        assert!(store.drain_directions().is_empty());
    }

    #[test]
    fn test_capacity_eviction_drops_least_recent() {
        let mut store = TrackStore::new(3600.0, 2);
        for id in 1..=3 {
            store.observe(
                id,
                ObjectClass::Car,
                Point::new(0.0, 0.0),
                t0() + Duration::seconds(id as i64),
            );
        }
        assert_eq!(store.evict(t0() + Duration::seconds(4)), 1);
        assert!(store.get(1).is_none());
        assert_eq!(store.len(), 2);
    }
}
