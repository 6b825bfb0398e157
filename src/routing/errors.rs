//! Routing error types.
//!
//! Structured logging is the caller's responsibility; these types carry the
//! context needed to build meaningful log entries.

use thiserror::Error;

/// Errors that can occur while selecting or invoking a backend model.
#[derive(Debug, Clone, Error)]
pub enum RoutingError {
    /// No candidate model survived filtering for the request.
    #[error("no model available for request type '{request_type}': {reason}")]
    ModelNotFound {
        request_type: String,
        reason: String,
    },

    /// An outcome or state change was reported for a model that is not registered.
    #[error("unknown model: '{name}'")]
    UnknownModel { name: String },

    /// The backend could not be reached or answered with an error.
    #[error("backend for model '{model}' unavailable: {reason}")]
    BackendUnavailable { model: String, reason: String },

    /// The backend did not answer within the allotted time.
    #[error("model '{model}' timed out after {duration_ms}ms")]
    Timeout { model: String, duration_ms: u64 },

    /// Model configuration is invalid.
    #[error("model config error: {reason}")]
    ConfigError { reason: String },
}

impl RoutingError {
    /// Whether the failure is transient and the request may succeed on retry.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            RoutingError::BackendUnavailable { .. } | RoutingError::Timeout { .. }
        )
    }

    /// Whether the error was raised after a backend had actually been contacted.
    ///
    /// Only these failures count against a model's performance statistics.
    pub fn is_backend_failure(&self) -> bool {
        self.is_retriable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_retriable() {
        let err = RoutingError::Timeout {
            model: "m".into(),
            duration_ms: 30_000,
        };
        assert!(err.is_retriable());
        assert!(err.to_string().contains("30000ms"));
    }

    #[test]
    fn model_not_found_is_not_retriable() {
        let err = RoutingError::ModelNotFound {
            request_type: "chat".into(),
            reason: "no active models".into(),
        };
        assert!(!err.is_retriable());
        assert!(!err.is_backend_failure());
    }
}
