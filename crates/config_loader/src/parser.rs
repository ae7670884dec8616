//! Configuration parsing
//!
//! TOML is the primary format, JSON is accepted for generated deployments.

use contracts::{ContractError, DeploymentBlueprint};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Infer format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn parse_toml(content: &str) -> Result<DeploymentBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse_json(content: &str) -> Result<DeploymentBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse(content: &str, format: ConfigFormat) -> Result<DeploymentBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::TrafficFlow;

    #[test]
    fn test_parse_toml_applies_defaults() {
        let content = r#"
[detector]
endpoint = "http://127.0.0.1:8090/predict"

[[cameras]]
id = "0"
name = "north"
source = "rtsp://10.0.0.21/stream1"
roi = [[0.1, 0.2], [0.9, 0.2], [0.95, 0.95], [0.05, 0.95]]
"#;
        let bp = parse_toml(content).unwrap();
        assert_eq!(bp.cameras.len(), 1);
        assert_eq!(bp.cameras[0].lane_count, 2);
        assert_eq!(bp.detector.timeout_ms, 2000);
        assert_eq!(bp.analysis.direction_refresh_frames, 30);
        assert_eq!(bp.analysis.traffic_flow, TrafficFlow::Approaching);
        assert_eq!(bp.pipeline.aggregation_interval_s, 60);
        assert!(bp.sinks.is_empty());
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "detector": { "endpoint": "http://localhost:8090/predict", "timeout_ms": 300 },
            "analysis": { "speed_limit_kmh": 90.0 },
            "cameras": [{
                "id": "cam-a",
                "name": "A",
                "zone": "Gate",
                "source": "mock://320x240",
                "roi": [[0, 0], [1, 0], [1, 1], [0, 1]]
            }],
            "sinks": [{ "name": "store", "sink_type": "memory" }]
        }"#;
        let bp = parse_json(content).unwrap();
        assert_eq!(bp.analysis.speed_limit_kmh, 90.0);
        assert_eq!(bp.cameras[0].zone, "Gate");
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let err = parse_toml("cameras = [[[").unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
