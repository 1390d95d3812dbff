//! Connection health checks for subprocess backends.

use std::sync::Arc;
use std::time::{Duration, Instant};

use query_client::{Params, ReliableRpcClient, params};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};

use crate::analytics::{CATALOG_SEARCH_METHOD, QUERY_METHOD};

/// Outcome of one probe.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub backend: String,
    pub healthy: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Cheap round trip that proves a backend can answer real requests.
pub struct ConnectionProbe {
    client: Arc<ReliableRpcClient>,
    method: &'static str,
    params: Params,
}

impl ConnectionProbe {
    /// `SELECT 1` against a query engine.
    pub fn query_engine(client: Arc<ReliableRpcClient>) -> Self {
        Self {
            client,
            method: QUERY_METHOD,
            params: params([("query", json!("SELECT 1"))]),
        }
    }

    /// Empty one-result search against a metadata catalog.
    pub fn catalog(client: Arc<ReliableRpcClient>) -> Self {
        Self {
            client,
            method: CATALOG_SEARCH_METHOD,
            params: params([("query", json!("")), ("limit", json!(1))]),
        }
    }

    pub fn backend(&self) -> &str {
        self.client.name()
    }

    /// Run the probe within `timeout`, with a single attempt.
    pub async fn check(&self, timeout: Duration) -> ProbeReport {
        let start = Instant::now();
        let outcome = self
            .client
            .execute_with_retry(self.method, &self.params, timeout, 1)
            .await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(_) => {
                info!("{} connection test successful ({}ms)", self.backend(), latency_ms);
                ProbeReport {
                    backend: self.backend().to_string(),
                    healthy: true,
                    latency_ms,
                    error: None,
                }
            }
            Err(e) => {
                error!("{} connection test failed: {}", self.backend(), e);
                ProbeReport {
                    backend: self.backend().to_string(),
                    healthy: false,
                    latency_ms,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
