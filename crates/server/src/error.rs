//! Error types for the service entry points.

use thiserror::Error;

/// What a caller of `InsightService` can see. Source failures never
/// surface here; they become placeholders inside the report.
#[derive(Error, Debug)]
pub enum InsightError {
    /// Rejected request, before any source was contacted.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The service could not be assembled from its configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A single-source call (metrics, one platform) failed.
    #[error(transparent)]
    Source(#[from] sources::SourceError),
}

impl InsightError {
    pub fn is_validation(&self) -> bool {
        match self {
            InsightError::Validation(_) => true,
            InsightError::Source(e) => e.is_validation(),
            InsightError::Config(_) => false,
        }
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, InsightError>;
