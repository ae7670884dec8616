//! Mock Pipeline Demo
//!
//! Runs the full camera -> detection -> violation -> sink chain against
//! synthetic cameras and a scripted detector, so neither a camera nor the
//! inference service is needed.
//!
//! Run with: cargo run -p demos --bin mock_pipeline [demos/deployment.toml]
//!
//! With a deployment file, its `mock://` cameras, analysis settings and sinks
//! are used; other cameras are skipped.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::{
    BBox, CameraConfig, CameraEventKind, CameraId, CameraStatus, DeploymentBlueprint, Detection,
    DetectorConfig, ObjectClass, PersistenceSink, SinkConfig, SinkType, SnapshotConfig,
};
use detection::ScriptedDetector;
use dispatcher::{create_sinks, MemorySink};
use monitor::{detector_factory, PipelineContext, Supervisor};
use observability::{LogFormat, ObservabilityConfig};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_with_config(ObservabilityConfig {
        log_format: LogFormat::Pretty,
        metrics_port: None,
        default_log_level: "info".to_string(),
    })?;

    tracing::info!("Starting Mock Pipeline Demo");

    // ==== Stage 1: Deployment (file or built-in) ====
    let mut blueprint = match std::env::args().nth(1) {
        Some(path) => {
            tracing::info!(path = %path, "Loading deployment");
            ConfigLoader::load_from_path(Path::new(&path))?
        }
        None => demo_blueprint(),
    };
    blueprint.cameras.retain(|c| c.source.starts_with("mock://"));
    anyhow::ensure!(!blueprint.cameras.is_empty(), "no mock:// cameras to run");

    // ==== Stage 2: Sinks ====
    let memory = Arc::new(MemorySink::new("demo_memory"));
    let sinks = Arc::new(create_sinks(&blueprint.sinks)?.with_sink(memory.clone()));

    // ==== Stage 3: Pipelines ====
    // Every camera sees a car parked for ~6 s, a pedestrian and a speeding car
    let script = demo_script();
    let (events, events_rx) = async_channel::bounded(256);
    let ctx = PipelineContext {
        analysis: blueprint.analysis.clone(),
        pipeline: blueprint.pipeline.clone(),
        snapshots: blueprint.snapshots.clone(),
        sink: sinks.clone(),
        events,
        detectors: detector_factory(move |_| Ok(ScriptedDetector::new(script.clone()))),
        preview: None,
    };
    let mut supervisor = Supervisor::new(ctx);
    let started = supervisor.start_all(&blueprint.cameras);
    anyhow::ensure!(started > 0, "no camera pipeline could be started");
    tracing::info!(started, "Camera pipelines running");

    // ==== Stage 4: Run until every camera went offline ====
    let mut offline = 0;
    let run = async {
        while let Ok(event) = events_rx.recv().await {
            tracing::info!(camera_id = %event.camera_id, event = ?event.kind, "Camera event");
            if event.kind == CameraEventKind::Status(CameraStatus::Offline) {
                offline += 1;
                if offline >= started {
                    break;
                }
            }
        }
    };
    if tokio::time::timeout(Duration::from_secs(60), run).await.is_err() {
        tracing::warn!("Demo timed out");
    }

    // ==== Stage 5: Cleanup ====
    tracing::info!("Shutting down pipelines...");
    let report = tokio::task::spawn_blocking(move || supervisor.shutdown())
        .await
        .context("supervisor shutdown panicked")?;
    sinks.flush()?;

    println!("{}", report.metrics.summary());
    for doc in memory.violations() {
        println!("{} | {} | {} | {}", doc.time, doc.location, doc.kind.label(), doc.path);
    }
    println!("Lane aggregates written: {}", memory.aggregates().len());

    Ok(())
}

fn demo_blueprint() -> DeploymentBlueprint {
    let camera = |id: &str, zone: &str| CameraConfig {
        id: CameraId::new(id),
        name: format!("Demo camera {id}"),
        zone: zone.to_string(),
        source: "mock://640x480?interval_ms=500&frames=16".to_string(),
        roi: vec![[0.1, 0.1], [0.9, 0.1], [1.0, 1.0], [0.0, 1.0]],
        lane_count: 2,
    };

    let mut blueprint = DeploymentBlueprint {
        version: Default::default(),
        detector: DetectorConfig {
            endpoint: "http://127.0.0.1:8090/predictions/VehicleDetection".to_string(),
            timeout_ms: 2_000,
            labels: ["lane", "car", "truck", "bus", "trailer", "person", "bike"]
                .map(String::from)
                .to_vec(),
        },
        analysis: Default::default(),
        pipeline: Default::default(),
        snapshots: SnapshotConfig {
            enabled: false,
            ..Default::default()
        },
        cameras: vec![camera("0", "Km 12+300"), camera("1", "Km 14+050")],
        sinks: vec![SinkConfig {
            name: "log".to_string(),
            sink_type: SinkType::Log,
            params: Default::default(),
        }],
    };
    blueprint.analysis.foreign_object.enabled = false;
    blueprint.pipeline.handoff_timeout_ms = 2_000;
    blueprint
}

fn demo_script() -> Vec<Vec<Detection>> {
    let car = |track: u64, x: f64, y: f64| {
        Detection::new(ObjectClass::Car, BBox::new(x - 20.0, y - 15.0, 40.0, 30.0)).with_track(track)
    };
    let mut script: Vec<Vec<Detection>> = (0..14).map(|_| vec![car(1, 150.0, 200.0)]).collect();
    script[2].push(Detection::new(ObjectClass::Person, BBox::new(400.0, 150.0, 20.0, 50.0)));
    script[12].push(car(2, 320.0, 320.0));
    script[13].push(car(2, 320.0, 420.0));
    script
}
