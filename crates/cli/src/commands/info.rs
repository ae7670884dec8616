//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::DeploymentBlueprint;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    detector: DetectorInfo,
    cameras: Vec<CameraInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
    pipeline: contracts::PipelineConfig,
    snapshots: contracts::SnapshotConfig,
}

#[derive(Serialize)]
struct DetectorInfo {
    endpoint: String,
    timeout_ms: u64,
    labels: Vec<String>,
}

#[derive(Serialize)]
struct CameraInfo {
    id: String,
    name: String,
    zone: String,
    lane_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    roi: Option<Vec<[f64; 2]>>,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    #[serde(skip_serializing_if = "std::collections::HashMap::is_empty")]
    params: std::collections::HashMap<String, String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn build_config_info(blueprint: &DeploymentBlueprint, args: &InfoArgs) -> ConfigInfo {
    let cameras = blueprint
        .cameras
        .iter()
        .map(|c| CameraInfo {
            id: c.id.to_string(),
            name: c.name.clone(),
            zone: c.zone.clone(),
            lane_count: c.lane_count,
            source: args.cameras.then(|| c.source.clone()),
            roi: args.cameras.then(|| c.roi.clone()),
        })
        .collect();

    let sinks = if args.sinks {
        blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                params: s.params.clone(),
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        detector: DetectorInfo {
            endpoint: blueprint.detector.endpoint.clone(),
            timeout_ms: blueprint.detector.timeout_ms,
            labels: blueprint.detector.labels.clone(),
        },
        cameras,
        sinks,
        pipeline: blueprint.pipeline.clone(),
        snapshots: blueprint.snapshots.clone(),
    }
}

fn print_config_info(blueprint: &DeploymentBlueprint, args: &InfoArgs) {
    println!("=== Traffic Monitor Configuration ===\n");

    println!("Detector");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Endpoint: {}", blueprint.detector.endpoint);
    println!("   ├─ Timeout: {} ms", blueprint.detector.timeout_ms);
    println!("   └─ Labels: {}", blueprint.detector.labels.join(", "));

    println!("\nCameras ({})", blueprint.cameras.len());
    for (i, camera) in blueprint.cameras.iter().enumerate() {
        let is_last = i == blueprint.cameras.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!("   {} {} '{}' @ {}", prefix, camera.id, camera.name, camera.zone);
        if args.cameras {
            println!("   {}  ├─ Source: {}", child_prefix, camera.source);
            println!("   {}  ├─ ROI: {:?}", child_prefix, camera.roi);
        }
        println!("   {}  └─ {} lanes", child_prefix, camera.lane_count);
    }

    let analysis = &blueprint.analysis;
    println!("\nRules");
    println!(
        "   ├─ Stopped: < {} px for > {} s",
        analysis.stop_distance_px, analysis.stop_duration_s
    );
    println!("   ├─ Speed limit: {} km/h", analysis.speed_limit_kmh);
    println!("   ├─ Traffic flow: {:?}", analysis.traffic_flow);
    println!("   └─ Foreign objects: {}", if analysis.foreign_object.enabled { "on" } else { "off" });

    if args.sinks && !blueprint.sinks.is_empty() {
        println!("\nSinks ({})", blueprint.sinks.len());
        for (i, sink) in blueprint.sinks.iter().enumerate() {
            let is_last = i == blueprint.sinks.len() - 1;
            let prefix = if is_last { "└─" } else { "├─" };
            println!("   {} {} ({:?})", prefix, sink.name, sink.sink_type);
        }
    }

    println!();
}
