//! MemorySink - keeps every document in process

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use contracts::{ContractError, LaneAggregateDocument, PersistenceSink, ViolationDocument};
use tracing::trace;

#[derive(Debug, Default)]
struct Store {
    violations: Vec<ViolationDocument>,
    aggregates: Vec<LaneAggregateDocument>,
}

/// In-process document store for tests, demos and inspection.
#[derive(Debug, Default)]
pub struct MemorySink {
    name: String,
    store: Mutex<Store>,
    changed: Condvar,
}

impl MemorySink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn violations(&self) -> Vec<ViolationDocument> {
        self.lock().violations.clone()
    }

    pub fn aggregates(&self) -> Vec<LaneAggregateDocument> {
        self.lock().aggregates.clone()
    }

    /// Block until at least `count` violation documents exist or `timeout` passes.
    pub fn wait_for_violations(&self, count: usize, timeout: Duration) -> Vec<ViolationDocument> {
        let deadline = Instant::now() + timeout;
        let mut store = self.lock();
        while store.violations.len() < count {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            store = self
                .changed
                .wait_timeout(store, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        store.violations.clone()
    }

    /// Block until at least `count` aggregate documents exist or `timeout` passes.
    pub fn wait_for_aggregates(
        &self,
        count: usize,
        timeout: Duration,
    ) -> Vec<LaneAggregateDocument> {
        let deadline = Instant::now() + timeout;
        let mut store = self.lock();
        while store.aggregates.len() < count {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            store = self
                .changed
                .wait_timeout(store, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        store.aggregates.clone()
    }
}

impl PersistenceSink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    fn insert_one(&self, document: &ViolationDocument) -> Result<(), ContractError> {
        self.lock().violations.push(document.clone());
        self.changed.notify_all();
        trace!(sink = %self.name, kind = ?document.kind, "Violation stored");
        Ok(())
    }

    fn insert_delta(&self, document: &LaneAggregateDocument) -> Result<(), ContractError> {
        self.lock().aggregates.push(document.clone());
        self.changed.notify_all();
        Ok(())
    }

    fn last_aggregate(&self, cam_id: &str) -> Result<Option<LaneAggregateDocument>, ContractError> {
        Ok(self
            .lock()
            .aggregates
            .iter()
            .rev()
            .find(|doc| doc.camera(cam_id).is_some())
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{CameraCounts, ViolationKind};
    use std::sync::Arc;
    use std::thread;

    fn doc(kind: ViolationKind) -> ViolationDocument {
        ViolationDocument {
            kind,
            location: "Km 12".into(),
            path: "p.jpg".into(),
            time: "2024-05-01T08:30:00.000".into(),
            speed: None,
        }
    }

    fn aggregate(cam: &str, car: u64) -> LaneAggregateDocument {
        LaneAggregateDocument {
            create_time: "2024-05-01T08:30:00.000".into(),
            cam: vec![CameraCounts {
                cam_id: cam.into(),
                car,
                ..Default::default()
            }],
        }
    }

    #[test]
    fn test_concurrent_writers() {
        let sink = Arc::new(MemorySink::new("mem"));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let sink = sink.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        sink.insert_one(&doc(ViolationKind::Pedestrian)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(sink.violations().len(), 100);
    }

    #[test]
    fn test_last_aggregate_per_camera() {
        let sink = MemorySink::new("mem");
        sink.insert_delta(&aggregate("0", 3)).unwrap();
        sink.insert_delta(&aggregate("1", 5)).unwrap();
        sink.insert_delta(&aggregate("0", 4)).unwrap();
        let last = sink.last_aggregate("0").unwrap().unwrap();
        assert_eq!(last.camera("0").unwrap().car, 4);
        assert_eq!(sink.last_aggregate("1").unwrap().unwrap().cam[0].car, 5);
        assert!(sink.last_aggregate("9").unwrap().is_none());
    }

    #[test]
    fn test_wait_for_violations_wakes_on_insert() {
        let sink = Arc::new(MemorySink::new("mem"));
        let writer = {
            let sink = sink.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                sink.insert_one(&doc(ViolationKind::Stopped)).unwrap();
            })
        };
        let docs = sink.wait_for_violations(1, Duration::from_secs(5));
        assert_eq!(docs.len(), 1);
        writer.join().unwrap();
        assert_eq!(sink.wait_for_violations(2, Duration::from_millis(10)).len(), 1);
    }
}
