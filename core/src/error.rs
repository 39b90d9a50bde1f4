//! Error types for relevance-bench-core

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;

/// Classification of a run failure
///
/// Every failure a listener observes carries exactly one of these kinds,
/// so callers can tell a deleted judgment apart from a deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A referenced judgment set does not exist (missing or deleted)
    JudgmentNotFound,
    /// The judgment store failed to return a judgment set
    JudgmentStore,
    /// A search request failed
    SearchExecution,
    /// A branch observed the run's cancellation at a checkpoint
    Cancelled,
    /// The run was cancelled before its search branches were dispatched
    Timeout,
    /// The experiment request violates its contract
    InvalidRequest,
    /// Internal invariant violation (e.g. a branch task panicked)
    Internal,
}

impl ErrorKind {
    /// Check if this kind results from cancellation of the run
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ErrorKind::Cancelled | ErrorKind::Timeout)
    }

    /// Check if this kind originates in an external collaborator
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            ErrorKind::JudgmentNotFound | ErrorKind::JudgmentStore | ErrorKind::SearchExecution
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::JudgmentNotFound => "judgment not found",
            ErrorKind::JudgmentStore => "judgment store error",
            ErrorKind::SearchExecution => "search execution error",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Timeout => "timeout",
            ErrorKind::InvalidRequest => "invalid request",
            ErrorKind::Internal => "internal error",
        };
        f.write_str(name)
    }
}

/// Error delivered for a failed experiment run
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ExperimentError {
    /// Failure classification
    pub kind: ErrorKind,
    /// Human-readable detail
    pub message: String,
}

impl ExperimentError {
    /// Create an error of the given kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// A referenced judgment set could not be found
    pub fn judgment_not_found(judgment_id: &str) -> Self {
        Self::new(
            ErrorKind::JudgmentNotFound,
            format!("judgment {judgment_id} does not exist"),
        )
    }

    /// The judgment store failed
    pub fn judgment_store(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::JudgmentStore, message)
    }

    /// A search request failed
    pub fn search_execution(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SearchExecution, message)
    }

    /// A branch was skipped because the run was cancelled
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, message)
    }

    /// The run was cancelled before dispatch
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// The request violates its contract
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    /// A required collaborator was not supplied to a builder
    pub fn missing_config(field: &str) -> Self {
        Self::new(
            ErrorKind::InvalidRequest,
            format!("missing required collaborator: {field}"),
        )
    }

    /// Internal invariant violation
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Check if the run ended because it was cancelled
    pub fn is_cancellation(&self) -> bool {
        self.kind.is_cancellation()
    }
}

impl From<ConfigError> for ExperimentError {
    fn from(err: ConfigError) -> Self {
        Self::invalid_request(err.to_string())
    }
}

/// Result type alias
pub type ExperimentResult<T> = std::result::Result<T, ExperimentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_kind() {
        let err = ExperimentError::judgment_not_found("judgment1");
        assert_eq!(err.kind, ErrorKind::JudgmentNotFound);
        assert_eq!(
            err.to_string(),
            "judgment not found: judgment judgment1 does not exist"
        );
    }

    #[test]
    fn test_cancellation_kinds() {
        assert!(ExperimentError::timeout("late").is_cancellation());
        assert!(ExperimentError::cancelled("skipped").is_cancellation());
        assert!(!ExperimentError::search_execution("boom").is_cancellation());
    }

    #[test]
    fn test_collaborator_kinds() {
        assert!(ErrorKind::JudgmentNotFound.is_collaborator_failure());
        assert!(ErrorKind::SearchExecution.is_collaborator_failure());
        assert!(!ErrorKind::Timeout.is_collaborator_failure());
        assert!(!ErrorKind::InvalidRequest.is_collaborator_failure());
    }

    #[test]
    fn test_missing_config_message() {
        let err = ExperimentError::missing_config("search_engine");
        assert_eq!(err.kind, ErrorKind::InvalidRequest);
        assert!(err.message.contains("search_engine"));
    }

    #[test]
    fn test_from_config_error() {
        let err: ExperimentError = ConfigError::EmptySearchConfigurations.into();
        assert_eq!(err.kind, ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_error_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&ErrorKind::JudgmentNotFound).unwrap(),
            "\"judgment_not_found\""
        );
    }
}
