//! Error types for the query-client crate.
//!
//! Every failure a subprocess call can hit maps onto one variant here, and
//! each variant knows whether the reliable client may retry it.

use std::time::Duration;
use thiserror::Error;

/// Errors raised while talking to a query-engine subprocess.
#[derive(Error, Debug)]
pub enum RpcError {
    /// The executable could not be launched.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Nothing arrived on stdout within the allotted time.
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// The process is gone or its stdio pipes are closed.
    #[error("channel closed: {0}")]
    ChannelClosed(String),

    /// The process answered with something that is not a JSON-RPC response.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server answered with an explicit `error` object.
    #[error("rpc error {code}: {message}")]
    Application { code: i64, message: String },

    /// Any other I/O failure on the pipes.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RpcError {
    /// Whether the reliable client should make another attempt.
    ///
    /// Application errors are answers from the server, so repeating the
    /// request would only repeat the answer.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, RpcError::Application { .. })
    }

    /// Whether the failure means the process itself is unusable.
    pub fn requires_respawn(&self) -> bool {
        matches!(
            self,
            RpcError::Spawn { .. } | RpcError::ChannelClosed(_) | RpcError::Io(_)
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RpcError::Timeout(_))
    }

    pub(crate) fn closed(reason: impl Into<String>) -> Self {
        RpcError::ChannelClosed(reason.into())
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, RpcError>;
