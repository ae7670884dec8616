//! Detection service errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectionError {
    /// Connection refused, reset or timed out
    #[error("detector transport error: {message}")]
    Transport { message: String, timed_out: bool },

    /// Service answered with a non-success status
    #[error("detector returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body is not the expected JSON shape
    #[error("malformed detector response: {message}")]
    Malformed { message: String },

    /// Frame could not be encoded for upload
    #[error("frame encode error: {message}")]
    Encode { message: String },
}

impl DetectionError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            timed_out: true,
        }
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }

    /// Metric label for the failure.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Transport {
                timed_out: true, ..
            } => "timeout",
            Self::Transport { .. } => "transport",
            Self::Status { .. } => "status",
            Self::Malformed { .. } => "malformed",
            Self::Encode { .. } => "encode",
        }
    }

    /// Whether retrying the same frame later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Malformed { .. } | Self::Encode { .. } => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, DetectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_labels() {
        assert_eq!(DetectionError::timeout("t").reason(), "timeout");
        assert_eq!(DetectionError::transport("x").reason(), "transport");
        assert_eq!(DetectionError::status(503, "").reason(), "status");
        assert_eq!(DetectionError::malformed("m").reason(), "malformed");
    }

    #[test]
    fn test_transient_classification() {
        assert!(DetectionError::status(503, "busy").is_transient());
        assert!(!DetectionError::status(400, "bad").is_transient());
        assert!(!DetectionError::malformed("no bbox").is_transient());
    }
}
