//! Layered error definitions
//!
//! Categorized by source: config / capture / sink

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Capture Errors =====
    /// Camera source could not be opened
    #[error("camera '{camera_id}' open error: {message}")]
    CaptureOpen { camera_id: String, message: String },

    /// Frame read failed on an opened source
    #[error("camera '{camera_id}' read error: {message}")]
    CaptureRead { camera_id: String, message: String },

    /// Frame buffer does not match its declared dimensions
    #[error("invalid frame: {message}")]
    InvalidFrame { message: String },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn capture_open(camera_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CaptureOpen {
            camera_id: camera_id.into(),
            message: message.into(),
        }
    }

    pub fn capture_read(camera_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CaptureRead {
            camera_id: camera_id.into(),
            message: message.into(),
        }
    }

    pub fn invalid_frame(message: impl Into<String>) -> Self {
        Self::InvalidFrame {
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Whether the error leaves the capture handle usable for a retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::CaptureRead { .. } | Self::Io(_))
    }
}
