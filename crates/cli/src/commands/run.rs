//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::info;

use crate::cli::RunArgs;
use crate::pipeline::{Monitor, MonitorConfig};

/// Execute the `run` command
pub async fn run_monitor(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(ref endpoint) = args.detector_endpoint {
        info!(endpoint = %endpoint, "Overriding detector endpoint from CLI");
        blueprint.detector.endpoint = endpoint.clone();
        config_loader::ConfigLoader::validate(&blueprint)
            .context("Configuration invalid after CLI overrides")?;
    }

    info!(
        cameras = blueprint.cameras.len(),
        sinks = blueprint.sinks.len(),
        detector = %blueprint.detector.endpoint,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let config = MonitorConfig {
        blueprint,
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    };

    let stats = Monitor::new(config)
        .run(shutdown_signal())
        .await
        .context("Monitor execution failed")?;

    info!(
        cameras = stats.cameras_started,
        violations = stats.metrics.summary().total_violations,
        duration_secs = stats.duration.as_secs_f64(),
        "Monitor finished"
    );
    stats.print_summary();
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &contracts::DeploymentBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Detector: {} (timeout {} ms)", blueprint.detector.endpoint, blueprint.detector.timeout_ms);
    println!("\nCameras ({}):", blueprint.cameras.len());
    for camera in &blueprint.cameras {
        println!(
            "  - {} '{}' @ {} - {} lanes, source {}",
            camera.id, camera.name, camera.zone, camera.lane_count, camera.source
        );
    }

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    let pipeline = &blueprint.pipeline;
    println!("\nPipeline:");
    println!("  Handoff timeout: {} ms", pipeline.handoff_timeout_ms);
    println!("  Consumer poll: {} ms", pipeline.consumer_poll_ms);
    println!("  Reconnect delay: {} ms", pipeline.reconnect_delay_ms);
    println!("  Aggregation interval: {} s", pipeline.aggregation_interval_s);

    println!();
}
