//! Errors surfaced by pipeline operations.

use crate::ports::StreamError;
use crate::stage::Stage;

/// Failure of a controller operation.
///
/// Every variant is terminal for the operation that raised it. Nothing is
/// committed to storage on any of these paths.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// A generation is already in flight for this session.
    #[error("Generation already in progress. Please wait or cancel first.")]
    Busy,
    /// An upstream stage document the operation needs is missing.
    #[error("{0}")]
    MissingPrerequisite(String),
    /// The generation backend failed or returned an unusable response.
    #[error("Generation failed: {0}")]
    Backend(String),
    /// The in-flight generation was cancelled.
    #[error("Generation cancelled")]
    Cancelled,
    /// An imported issue or file was rejected.
    #[error("{0}")]
    ImportValidation(String),
    /// Reading or writing the specs directory failed.
    #[error("Storage error: {0}")]
    Storage(String),
    /// The operation needs an open spec.
    #[error("No spec is open")]
    NoActiveSpec,
    /// The caller supplied something unusable (empty name, unknown id).
    #[error("{0}")]
    InvalidInput(String),
}

impl PipelineError {
    /// Missing prerequisite: `upstream` must exist before its successor.
    #[must_use]
    pub fn missing_upstream(upstream: Stage) -> Self {
        Self::MissingPrerequisite(format!("Please complete the {upstream} stage first."))
    }
}

impl From<StreamError> for PipelineError {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::Cancelled => Self::Cancelled,
            other => Self::Backend(other.to_string()),
        }
    }
}
