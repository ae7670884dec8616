//! Ingestion error types

use contracts::ContractError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestionError {
    /// Source URI could not be parsed
    #[error("invalid source uri '{uri}': {message}")]
    InvalidSource { uri: String, message: String },

    /// No capture backend compiled in for this kind of source
    #[error("no capture backend for '{uri}': {message}")]
    UnsupportedSource { uri: String, message: String },

    /// Open/read failure reported by a frame source
    #[error(transparent)]
    Capture(#[from] ContractError),

    /// Worker thread could not be spawned
    #[error("failed to spawn worker for camera {camera_id}: {message}")]
    Spawn { camera_id: String, message: String },
}

impl IngestionError {
    pub fn invalid_source(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSource {
            uri: uri.into(),
            message: message.into(),
        }
    }

    pub fn unsupported_source(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnsupportedSource {
            uri: uri.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestionError>;
