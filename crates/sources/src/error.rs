//! Error types for the sources crate.

use query_client::RpcError;
use thiserror::Error;

/// Errors a source can raise while fetching.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Caller input was rejected before any I/O.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The source is switched off or lacks credentials.
    #[error("source disabled: {0}")]
    Disabled(String),

    /// Subprocess backend failure, after retries.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// HTTP transport failure or non-success status.
    #[error("http request failed: {0}")]
    Http(String),

    /// The backend answered but could not serve the request.
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// The backend answered with a payload we could not read.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl SourceError {
    pub fn is_validation(&self) -> bool {
        matches!(self, SourceError::Validation(_))
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            SourceError::Rpc(e) => e.is_timeout(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            SourceError::Decode(e.to_string())
        } else if e.is_timeout() {
            SourceError::Http(format!("request timed out: {}", e))
        } else if e.is_connect() {
            SourceError::Http(format!("cannot connect: {}", e))
        } else {
            SourceError::Http(e.to_string())
        }
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, SourceError>;
