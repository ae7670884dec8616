//! # Integration Tests
//!
//! Cross-crate and end-to-end tests for the traffic monitor.
//!
//! Covers:
//! - Contract and configuration round trips
//! - Capture worker and mailbox handoff with a live producer
//! - Mock e2e runs: synthetic camera -> scripted detector -> violation
//!   engine -> persistence sinks (no detector service or camera needed)

#[cfg(test)]
mod fixtures;

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{SinkType, TrafficFlow, ViolationKind};

    const DEPLOYMENT: &str = r#"
[detector]
endpoint = "http://127.0.0.1:8090/predictions/VehicleDetection"
labels = ["lane", "car", "truck", "bus", "trailer", "person", "bike"]

[analysis]
speed_limit_kmh = 90.0
traffic_flow = "receding"

[pipeline]
aggregation_interval_s = 60

[[cameras]]
id = "0"
name = "Cam North"
zone = "Km 12+300"
source = "mock://640x480?fps=10"
roi = [[0.2, 0.3], [0.8, 0.3], [0.95, 0.95], [0.05, 0.95]]

[[cameras]]
id = "1"
name = "Cam South"
source = "dir:///var/replay/south"
roi = [[0.1, 0.1], [0.9, 0.1], [0.9, 0.9], [0.1, 0.9]]
lane_count = 3

[[sinks]]
name = "store"
sink_type = "file"
params = { base_path = "./store" }
"#;

    #[test]
    fn test_deployment_survives_toml_and_json_round_trip() {
        let blueprint = ConfigLoader::load_from_str(DEPLOYMENT, ConfigFormat::Toml).unwrap();
        assert_eq!(blueprint.cameras.len(), 2);
        assert_eq!(blueprint.analysis.traffic_flow, TrafficFlow::Receding);
        assert_eq!(blueprint.sinks[0].sink_type, SinkType::File);

        let toml = ConfigLoader::to_toml(&blueprint).unwrap();
        let from_toml = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&blueprint).unwrap();
        let from_json = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();

        for reloaded in [from_toml, from_json] {
            assert_eq!(reloaded.cameras[0].zone, "Km 12+300");
            assert_eq!(reloaded.cameras[1].lane_count, 3);
            assert_eq!(reloaded.cameras[1].roi, blueprint.cameras[1].roi);
            assert_eq!(reloaded.analysis.speed_limit_kmh, 90.0);
            assert_eq!(reloaded.pipeline.aggregation_interval_s, 60);
            assert_eq!(reloaded.sinks[0].params["base_path"], "./store");
        }
    }

    #[test]
    fn test_violation_labels_match_document_type() {
        for kind in [
            ViolationKind::ForeignObject,
            ViolationKind::Stopped,
            ViolationKind::OverSpeed,
            ViolationKind::WrongDirection,
            ViolationKind::Pedestrian,
            ViolationKind::Motorbike,
        ] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.label());
        }
    }
}

#[cfg(test)]
mod handoff_tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use contracts::CameraEventKind;
    use ingestion::{CameraWorker, Mailbox, SyntheticFrameSource, Take, WorkerControl, WorkerSettings};

    use crate::fixtures::camera;

    /// A consumer slower than the camera only ever sees the newest frame.
    #[test]
    fn test_slow_consumer_sees_latest_frames_only() {
        let mailbox = Arc::new(Mailbox::new());
        let control = WorkerControl::new();
        let (events, _rx) = async_channel::unbounded();
        let source = SyntheticFrameSource::new("0".into(), 32, 24, Duration::from_millis(10))
            .with_max_frames(60);
        let worker = CameraWorker::new(
            Arc::new(camera("0")),
            Box::new(source),
            mailbox.clone(),
            events,
            control.clone(),
            WorkerSettings {
                handoff_timeout: Duration::from_millis(1),
                reconnect_delay: Duration::from_millis(50),
            },
        );
        let metrics = worker.metrics();
        let handle = thread::spawn(move || worker.run());

        let mut last_sequence = 0;
        let mut frames_seen = 0u64;
        loop {
            match mailbox.take_timeout(Duration::from_millis(200)) {
                Take::Item(snapshot) => {
                    assert!(snapshot.sequence > last_sequence);
                    last_sequence = snapshot.sequence;
                    if snapshot.placeholder {
                        assert!(snapshot.raw.is_black());
                        break;
                    }
                    frames_seen += 1;
                    thread::sleep(Duration::from_millis(5));
                }
                Take::Empty => {}
                Take::Closed => panic!("mailbox closed before the stream ended"),
            }
        }

        control.request_stop();
        mailbox.close();
        handle.join().unwrap().unwrap();

        // Every captured frame was either analysed or replaced by a newer one
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.frames_captured, 60);
        assert_eq!(snapshot.placeholders, 1);
        assert_eq!(frames_seen + snapshot.frames_overwritten, 60);
    }

    #[test]
    fn test_worker_reports_offline_when_stream_ends() {
        let mailbox = Arc::new(Mailbox::new());
        let control = WorkerControl::new();
        let (events, rx) = async_channel::unbounded();
        let source = SyntheticFrameSource::new("7".into(), 16, 16, Duration::from_millis(10))
            .with_max_frames(3);
        let worker = CameraWorker::new(
            Arc::new(camera("7")),
            Box::new(source),
            mailbox.clone(),
            events,
            control.clone(),
            WorkerSettings {
                handoff_timeout: Duration::from_millis(5),
                reconnect_delay: Duration::from_millis(20),
            },
        );
        let handle = thread::spawn(move || worker.run());

        let offline = crate::fixtures::wait_for_event(&rx, Duration::from_secs(5), |e| {
            e.kind == CameraEventKind::Status(contracts::CameraStatus::Offline)
        });
        assert!(offline.is_some());

        control.request_stop();
        handle.join().unwrap().unwrap();
        assert!(mailbox.is_closed());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::NaiveDateTime;
    use contracts::{
        BBox, CameraEventKind, CameraStatus, Detection, LaneAggregateDocument, ObjectClass,
        PersistenceSink, ViolationDocument, TIMESTAMP_FORMAT,
    };
    use dispatcher::{FileSink, FileSinkConfig, MemorySink, SinkSet, AGGREGATE_FILE, VIOLATION_FILE};
    use ingestion::SyntheticFrameSource;
    use monitor::Supervisor;

    use crate::fixtures::{camera, car_at, context, read_jsonl, start_time, wait_for_event};

    /// Stationary car for 5.4 s of capture time is reported exactly once.
    #[test]
    fn test_e2e_stopped_vehicle() {
        let snapshots = tempfile::tempdir().unwrap();
        let sink = Arc::new(MemorySink::new("memory"));
        let script = vec![vec![car_at(1, 200.0, 200.0)]; 10];
        let (ctx, rx) = context(sink.clone(), Some(snapshots.path()), script);

        let mut supervisor = Supervisor::new(ctx);
        let source = SyntheticFrameSource::new("0".into(), 640, 480, Duration::from_millis(600))
            .with_max_frames(10)
            .starting_at(start_time());
        supervisor.start_with_source(camera("0"), Box::new(source)).unwrap();

        let offline = wait_for_event(&rx, Duration::from_secs(10), |e| {
            e.kind == CameraEventKind::Status(CameraStatus::Offline)
        });
        assert!(offline.is_some(), "camera never went offline");

        sink.wait_for_violations(1, Duration::from_secs(5));
        let report = supervisor.shutdown();

        let violations = sink.violations();
        assert_eq!(violations.len(), 1, "{violations:?}");
        let doc = &violations[0];
        let json = serde_json::to_value(doc).unwrap();
        assert_eq!(json["type"], "Dừng đỗ xe");
        assert_eq!(doc.location, "Km 0");
        assert_eq!(doc.time, "2024-05-01T08:00:05.400");
        assert!(NaiveDateTime::parse_from_str(&doc.time, TIMESTAMP_FORMAT).is_ok());
        assert!(Path::new(&doc.path).is_file());

        let summary = report.metrics.summary();
        assert_eq!(summary.total_violations, 1);
        assert_eq!(report.pipelines.len(), 1);
        assert!(report.pipelines[0].worker_error.is_none());

        // Shutdown flushes the open aggregation window
        let aggregates = sink.aggregates();
        assert_eq!(aggregates.len(), 1);
        assert_eq!(aggregates[0].camera("0").map(|c| c.car), Some(1));
    }

    /// 100 px in 1 s inside the speed trap with the default optics is 172 km/h.
    #[test]
    fn test_e2e_over_speed_persisted_to_file_sink() {
        let store = tempfile::tempdir().unwrap();
        let file = Arc::new(
            FileSink::new(
                "store",
                FileSinkConfig {
                    base_path: store.path().to_path_buf(),
                },
            )
            .unwrap(),
        );
        let memory = Arc::new(MemorySink::new("memory"));
        let sinks = Arc::new(SinkSet::new().with_sink(file).with_sink(memory.clone()));

        let script = vec![vec![car_at(5, 320.0, 300.0)], vec![car_at(5, 320.0, 400.0)]];
        let (ctx, rx) = context(sinks.clone(), None, script);
        let mut supervisor = Supervisor::new(ctx);
        let source = SyntheticFrameSource::new("0".into(), 640, 480, Duration::from_secs(1))
            .with_max_frames(2)
            .starting_at(start_time());
        supervisor.start_with_source(camera("0"), Box::new(source)).unwrap();

        wait_for_event(&rx, Duration::from_secs(10), |e| {
            e.kind == CameraEventKind::Status(CameraStatus::Offline)
        });
        memory.wait_for_violations(1, Duration::from_secs(5));
        supervisor.shutdown();
        sinks.flush().unwrap();

        let docs: Vec<ViolationDocument> = read_jsonl(&store.path().join(VIOLATION_FILE));
        assert_eq!(docs.len(), 1);
        let json = serde_json::to_value(&docs[0]).unwrap();
        assert_eq!(json["type"], "Quá tốc độ");
        assert_eq!(json["speed"], 172);
        assert_eq!(docs[0].time, "2024-05-01T08:00:01.000");
        assert!(docs[0].path.ends_with("_over_speed.jpg"));

        let metrics = sinks.metrics();
        assert!(metrics.iter().all(|(_, m)| m.violations == 1 && m.failure_count == 0));
    }

    /// The first aggregate after a restart is a delta against what is on disk.
    #[test]
    fn test_e2e_aggregate_delta_survives_restart() {
        let store = tempfile::tempdir().unwrap();
        let run = |script: Vec<Vec<Detection>>| -> Vec<LaneAggregateDocument> {
            let sink = Arc::new(
                FileSink::new(
                    "store",
                    FileSinkConfig {
                        base_path: store.path().to_path_buf(),
                    },
                )
                .unwrap(),
            );
            let frames = script.len() as u64;
            let (ctx, rx) = context(sink.clone(), None, script);
            let mut supervisor = Supervisor::new(ctx);
            let source = SyntheticFrameSource::new("0".into(), 640, 480, Duration::from_millis(100))
                .with_max_frames(frames)
                .starting_at(start_time());
            supervisor.start_with_source(camera("0"), Box::new(source)).unwrap();
            wait_for_event(&rx, Duration::from_secs(10), |e| {
                e.kind == CameraEventKind::Status(CameraStatus::Offline)
            });
            // Let the consumer drain the last frame and the placeholder
            std::thread::sleep(Duration::from_millis(200));
            supervisor.shutdown();
            sink.flush().unwrap();
            read_jsonl(&store.path().join(AGGREGATE_FILE))
        };

        let first = run(vec![vec![car_at(1, 100.0, 300.0)]]);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].camera("0").map(|c| c.car), Some(1));

        let second = run(vec![vec![
            car_at(1, 100.0, 300.0),
            car_at(2, 500.0, 300.0),
            car_at(3, 300.0, 420.0),
            car_at(4, 500.0, 420.0),
        ]]);
        assert_eq!(second.len(), 2);
        let delta = second[1].camera("0").unwrap();
        assert_eq!(delta.car, 3);
        assert_eq!(delta.truck, 0);
    }

    #[test]
    fn test_e2e_failed_camera_does_not_affect_others() {
        let sink = Arc::new(MemorySink::new("memory"));
        let pedestrian = Detection::new(ObjectClass::Person, BBox::new(10.0, 10.0, 20.0, 40.0));
        let (ctx, rx) = context(sink.clone(), None, vec![vec![pedestrian]]);
        let mut supervisor = Supervisor::new(ctx);

        let mut healthy = camera("0");
        healthy.source = "mock://64x48?frames=1".into();
        let mut broken = camera("1");
        broken.source = "mock://not-a-size".into();
        assert_eq!(supervisor.start_all(&[healthy, broken]), 1);

        let error = wait_for_event(&rx, Duration::from_secs(5), |e| {
            matches!(e.kind, CameraEventKind::Error(_))
        })
        .unwrap();
        assert_eq!(error.camera_id, "1");

        let violations = sink.wait_for_violations(1, Duration::from_secs(10));
        assert_eq!(violations.len(), 1);
        let json = serde_json::to_value(&violations[0]).unwrap();
        assert_eq!(json["type"], "Người đi bộ");

        let report = supervisor.shutdown();
        assert_eq!(report.pipelines.len(), 1);
        assert_eq!(report.pipelines[0].camera_id, "0");
    }
}
