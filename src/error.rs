//! Error types for a3s-log-pipeline

use thiserror::Error;

/// Errors that can occur while routing log events to sinks
///
/// Filtering never fails: a malformed policy is treated as no policy.
/// Only the sink side and construction produce errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Store unreachable, or the store rejected the atomic operation
    #[error("Sink target '{target}' unavailable: {reason}")]
    Unavailable {
        target: String,
        reason: String,
    },

    /// The event could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid construction or registration parameters
    #[error("Configuration error: {0}")]
    Config(String),

    /// The pipeline worker has shut down and no longer accepts events
    #[error("Pipeline closed")]
    Closed,
}

impl PipelineError {
    /// Build an `Unavailable` error for a list key or channel name
    pub fn unavailable(target: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unavailable {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the failure came from the store transport
    ///
    /// Callers use this to decide whether retrying the write makes sense.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_display() {
        let err = PipelineError::unavailable("logs:acme", "connection refused");
        assert_eq!(
            err.to_string(),
            "Sink target 'logs:acme' unavailable: connection refused"
        );
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_serialization_from() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: PipelineError = json_err.into();
        assert!(matches!(err, PipelineError::Serialization(_)));
        assert!(!err.is_unavailable());
    }
}
