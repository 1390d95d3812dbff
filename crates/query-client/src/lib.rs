//! # Query Client Crate
//!
//! Talks to query-engine backends that run as child processes speaking
//! line-delimited JSON-RPC 2.0 on stdin/stdout.
//!
//! ## Layers
//!
//! ### ProcessChannel
//! Owns the child and its pipes. Moves lines, drains stderr into the log.
//!
//! ### RpcClient
//! Frames one request, reads its response. Ids start at 1 and strictly
//! increase per client.
//!
//! ### ReliableRpcClient
//! Lazy start, retries, respawn after process death, fixed backoff.
//!
//! ## Example Usage
//!
//! ```ignore
//! use query_client::{params, ProcessSpec, ReliableRpcClient, RetryPolicy};
//! use serde_json::json;
//!
//! let spec = ProcessSpec::new("vertica", "npx")
//!     .arg("mcp-vertica")
//!     .env("VERTICA_HOST", "localhost");
//! let client = ReliableRpcClient::new(spec, RetryPolicy::default());
//!
//! let rows = client
//!     .call("vertica/query", &params([("query", json!("SELECT 1"))]))
//!     .await?;
//! ```

pub mod channel;
pub mod client;
pub mod error;
pub mod metrics;
pub mod protocol;
pub mod reliable;

pub use channel::{ProcessChannel, ProcessSpec};
pub use client::RpcClient;
pub use error::{Result, RpcError};
pub use metrics::{RpcMetrics, RpcMetricsSnapshot};
pub use protocol::{Params, RpcErrorObject, RpcRequest, RpcResponse};
pub use reliable::{params, ReliableRpcClient, RetryPolicy};
