//! DeploymentBlueprint - Config Loader output
//!
//! Describes a complete deployment: detector endpoint, analysis tuning,
//! pipeline timings, cameras and output routing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

use crate::{CameraConfig, ViolationEngineConfig};

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Full deployment blueprint
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DeploymentBlueprint {
    #[serde(default)]
    pub version: ConfigVersion,

    #[validate(nested)]
    pub detector: DetectorConfig,

    /// Violation rule tuning, shared by every camera
    #[serde(default)]
    #[validate(nested)]
    pub analysis: ViolationEngineConfig,

    #[serde(default)]
    #[validate(nested)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub snapshots: SnapshotConfig,

    #[validate(length(min = 1))]
    #[validate(nested)]
    pub cameras: Vec<CameraConfig>,

    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// Inference service settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DetectorConfig {
    /// Prediction endpoint receiving PNG frames
    #[validate(length(min = 1))]
    pub endpoint: String,

    #[serde(default = "default_detector_timeout_ms")]
    #[validate(range(min = 1))]
    pub timeout_ms: u64,

    /// Class names indexed by the numeric labels the service returns
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,
}

fn default_detector_timeout_ms() -> u64 {
    2000
}

fn default_labels() -> Vec<String> {
    ["lane", "car", "truck", "bus", "trailer", "person", "bike"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl DetectorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Producer/consumer timings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PipelineConfig {
    /// How long the producer waits for the consumer to take a frame
    #[validate(range(min = 1))]
    pub handoff_timeout_ms: u64,

    /// How long the consumer waits for a fresh frame
    #[validate(range(min = 1))]
    pub consumer_poll_ms: u64,

    /// Pause between reconnect attempts
    #[validate(range(min = 1))]
    pub reconnect_delay_ms: u64,

    /// Lane aggregation window
    #[validate(range(min = 1))]
    pub aggregation_interval_s: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            handoff_timeout_ms: 80,
            consumer_poll_ms: 80,
            reconnect_delay_ms: 1000,
            aggregation_interval_s: 60,
        }
    }
}

impl PipelineConfig {
    pub fn handoff_timeout(&self) -> Duration {
        Duration::from_millis(self.handoff_timeout_ms)
    }

    pub fn consumer_poll(&self) -> Duration {
        Duration::from_millis(self.consumer_poll_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn aggregation_interval(&self) -> Duration {
        Duration::from_secs(self.aggregation_interval_s)
    }
}

/// Still-frame capture for violation documents
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub enabled: bool,
    pub dir: PathBuf,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("./violations"),
        }
    }
}

/// Sink output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    pub name: String,

    pub sink_type: SinkType,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Tracing output only
    Log,
    /// JSON-lines collections on disk
    File,
    /// In-process store
    Memory,
}

impl DeploymentBlueprint {
    pub fn camera(&self, id: &str) -> Option<&CameraConfig> {
        self.cameras.iter().find(|c| c.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_blueprint() -> DeploymentBlueprint {
        DeploymentBlueprint {
            version: ConfigVersion::V1,
            detector: DetectorConfig {
                endpoint: "http://127.0.0.1:8090/predict".into(),
                timeout_ms: 500,
                labels: default_labels(),
            },
            analysis: ViolationEngineConfig::default(),
            pipeline: PipelineConfig::default(),
            snapshots: SnapshotConfig::default(),
            cameras: vec![CameraConfig {
                id: "0".into(),
                name: "north".into(),
                zone: "Km 12".into(),
                source: "mock://64x48".into(),
                roi: vec![[0.1, 0.1], [0.9, 0.1], [0.9, 0.9], [0.1, 0.9]],
                lane_count: 2,
            }],
            sinks: vec![],
        }
    }

    #[test]
    fn test_nested_validation() {
        let mut bp = sample_blueprint();
        assert!(bp.validate().is_ok());

        bp.cameras[0].roi.pop();
        assert!(bp.validate().is_err());
    }

    #[test]
    fn test_requires_a_camera() {
        let mut bp = sample_blueprint();
        bp.cameras.clear();
        assert!(bp.validate().is_err());
    }

    #[test]
    fn test_camera_lookup_and_timings() {
        let bp = sample_blueprint();
        assert!(bp.camera("0").is_some());
        assert!(bp.camera("9").is_none());
        assert_eq!(bp.pipeline.handoff_timeout(), Duration::from_millis(80));
        assert_eq!(bp.detector.labels[1], "car");
    }
}
