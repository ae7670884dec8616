//! Violation recording: still frame on disk plus one document per event.

use std::path::PathBuf;
use std::sync::Arc;

use contracts::{Frame, PersistenceSink, SnapshotConfig, ViolationDocument, ViolationEvent};
use image::ImageFormat;
use tracing::{debug, warn};

use crate::error::{MonitorError, Result};

/// Writes the evidence for each violation event.
#[derive(Clone)]
pub struct ViolationRecorder {
    sink: Arc<dyn PersistenceSink>,
    snapshots: SnapshotConfig,
}

impl ViolationRecorder {
    pub fn new(sink: Arc<dyn PersistenceSink>, snapshots: SnapshotConfig) -> Self {
        Self { sink, snapshots }
    }

    /// `<dir>/<camera_id>/<YYYYmmddTHHMMSS.mmm>_<kind>.jpg`
    pub fn snapshot_path(&self, event: &ViolationEvent) -> PathBuf {
        let stamp = event.timestamp.format("%Y%m%dT%H%M%S%.3f");
        self.snapshots
            .dir
            .join(event.camera_id.as_str())
            .join(format!("{stamp}_{}.jpg", event.kind.as_str()))
    }

    /// Save the still frame (when enabled) and append the violation document.
    ///
    /// A failed still frame is logged and the document is still written. The
    /// sink error is returned so the caller can count it.
    pub fn record(&self, event: &ViolationEvent, frame: &Frame) -> Result<ViolationDocument> {
        let path = self.snapshot_path(event);
        if self.snapshots.enabled {
            if let Err(e) = write_jpeg(&path, frame) {
                warn!(camera_id = %event.camera_id, kind = event.kind.as_str(), error = %e, "Snapshot not saved");
            }
        }
        let document = ViolationDocument::from_event(event, path.to_string_lossy());
        self.sink.insert_one(&document)?;
        debug!(
            camera_id = %event.camera_id,
            kind = event.kind.as_str(),
            track_id = ?event.track_id,
            path = %document.path,
            "Violation recorded"
        );
        Ok(document)
    }
}

fn write_jpeg(path: &std::path::Path, frame: &Frame) -> Result<()> {
    let display = path.display().to_string();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| MonitorError::snapshot(&display, e.to_string()))?;
    }
    frame
        .to_image()?
        .save_with_format(path, ImageFormat::Jpeg)
        .map_err(|e| MonitorError::snapshot(&display, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use contracts::{CameraId, ViolationKind};
    use dispatcher::MemorySink;
    use tempfile::tempdir;

    fn event() -> ViolationEvent {
        ViolationEvent {
            kind: ViolationKind::OverSpeed,
            camera_id: CameraId::new("3"),
            location: "Km 12".into(),
            track_id: Some(4),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap()
                + chrono::Duration::milliseconds(125),
            speed: Some(172),
        }
    }

    #[test]
    fn test_snapshot_and_document() {
        let dir = tempdir().unwrap();
        let sink = Arc::new(MemorySink::new("memory"));
        let recorder = ViolationRecorder::new(
            sink.clone(),
            SnapshotConfig {
                enabled: true,
                dir: dir.path().to_path_buf(),
            },
        );
        let frame = Frame::black(32, 24, event().timestamp);

        let doc = recorder.record(&event(), &frame).unwrap();
        let expected = dir.path().join("3").join("20240501T083000.125_over_speed.jpg");
        assert!(expected.exists());
        assert_eq!(doc.path, expected.to_string_lossy());
        assert_eq!(doc.time, "2024-05-01T08:30:00.125");
        assert_eq!(doc.speed, Some(172));
        assert_eq!(sink.violations(), vec![doc]);
    }

    #[test]
    fn test_disabled_snapshots_still_write_document() {
        let dir = tempdir().unwrap();
        let sink = Arc::new(MemorySink::new("memory"));
        let recorder = ViolationRecorder::new(
            sink.clone(),
            SnapshotConfig {
                enabled: false,
                dir: dir.path().join("snaps"),
            },
        );
        recorder
            .record(&event(), &Frame::black(4, 4, event().timestamp))
            .unwrap();
        assert!(!dir.path().join("snaps").exists());
        assert_eq!(sink.violations().len(), 1);
    }
}
