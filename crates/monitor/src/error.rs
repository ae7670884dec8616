//! Monitor error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("ingestion error: {0}")]
    Ingestion(#[from] ingestion::IngestionError),

    #[error("detection error: {0}")]
    Detection(#[from] detection::DetectionError),

    #[error(transparent)]
    Contract(#[from] contracts::ContractError),

    /// Still frame could not be written
    #[error("snapshot '{path}' failed: {message}")]
    Snapshot { path: String, message: String },

    /// Pipeline thread could not be started
    #[error("failed to spawn {role} thread for camera '{camera_id}': {message}")]
    Spawn {
        camera_id: String,
        role: &'static str,
        message: String,
    },

    #[error("camera '{camera_id}' is already running")]
    DuplicateCamera { camera_id: String },
}

impl MonitorError {
    pub fn snapshot(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Snapshot {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn spawn(camera_id: impl Into<String>, role: &'static str, message: impl Into<String>) -> Self {
        Self::Spawn {
            camera_id: camera_id.into(),
            role,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
