//! Shared builders for the integration tests.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use async_channel::{Receiver, TryRecvError};
use chrono::{DateTime, TimeZone, Utc};
use contracts::{
    BBox, CameraConfig, CameraEvent, CameraId, Detection, ObjectClass, PersistenceSink,
    PipelineConfig, SnapshotConfig, ViolationEngineConfig,
};
use detection::ScriptedDetector;
use monitor::{detector_factory, PipelineContext};
use serde::de::DeserializeOwned;

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
}

/// Camera covering the whole frame.
pub fn camera(id: &str) -> CameraConfig {
    CameraConfig {
        id: CameraId::new(id),
        name: format!("Cam {id}"),
        zone: "Km 0".into(),
        source: "mock://640x480".into(),
        roi: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
        lane_count: 2,
    }
}

/// Car whose box midpoint is `(x, y)`.
pub fn car_at(track: u64, x: f64, y: f64) -> Detection {
    Detection::new(ObjectClass::Car, BBox::new(x - 20.0, y - 15.0, 40.0, 30.0)).with_track(track)
}

/// Pipeline context where every camera gets its own copy of `script`.
///
/// The handoff timeout is long so no frame is overwritten before the
/// consumer takes it.
pub fn context(
    sink: Arc<dyn PersistenceSink>,
    snapshots: Option<&Path>,
    script: Vec<Vec<Detection>>,
) -> (PipelineContext, Receiver<CameraEvent>) {
    let (events, rx) = async_channel::bounded(256);
    let mut analysis = ViolationEngineConfig::default();
    analysis.foreign_object.enabled = false;
    let ctx = PipelineContext {
        analysis,
        pipeline: PipelineConfig {
            handoff_timeout_ms: 5_000,
            consumer_poll_ms: 10,
            reconnect_delay_ms: 50,
            aggregation_interval_s: 3600,
        },
        snapshots: match snapshots {
            Some(dir) => SnapshotConfig {
                enabled: true,
                dir: dir.to_path_buf(),
            },
            None => SnapshotConfig {
                enabled: false,
                dir: "unused".into(),
            },
        },
        sink,
        events,
        detectors: detector_factory(move |_| Ok(ScriptedDetector::new(script.clone()))),
        preview: None,
    };
    (ctx, rx)
}

/// Poll the status channel until `pred` matches or `timeout` elapses.
pub fn wait_for_event(
    rx: &Receiver<CameraEvent>,
    timeout: Duration,
    pred: impl Fn(&CameraEvent) -> bool,
) -> Option<CameraEvent> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        match rx.try_recv() {
            Ok(event) if pred(&event) => return Some(event),
            Ok(_) => {}
            Err(TryRecvError::Empty) => thread::sleep(Duration::from_millis(5)),
            Err(TryRecvError::Closed) => return None,
        }
    }
    None
}

pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}
