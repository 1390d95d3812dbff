//! Retry, respawn and backoff around `RpcClient`.
//!
//! ## Algorithm
//! For each attempt up to `max_attempts`:
//! 1. Start the process if it is not alive (lazy init or respawn)
//! 2. Make the call; success returns immediately
//! 3. Application errors return immediately, they are answers
//! 4. On the last attempt the error is returned as terminal
//! 5. If the process is still alive, retry straight away
//! 6. Otherwise stop it fully and sleep `backoff` before respawning
//!
//! Every logical call ends in exactly one outcome, and every branch is
//! recorded in the client's `RpcMetrics`.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{error, info, instrument, warn};

use crate::channel::{ProcessChannel, ProcessSpec};
use crate::client::RpcClient;
use crate::error::Result;
use crate::metrics::{RpcMetrics, RpcMetricsSnapshot};
use crate::protocol::Params;

/// Retry and timing knobs for one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Pause before respawning a dead process.
    pub backoff: Duration,
    /// How long `stop` waits for a clean exit before killing.
    pub stop_grace: Duration,
    /// Warm-up pause after every spawn.
    pub startup_delay: Duration,
    /// Per-attempt timeout used by `call`.
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
            stop_grace: Duration::from_secs(5),
            startup_delay: Duration::from_secs(1),
            call_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_stop_grace(mut self, stop_grace: Duration) -> Self {
        self.stop_grace = stop_grace;
        self
    }

    pub fn with_startup_delay(mut self, startup_delay: Duration) -> Self {
        self.startup_delay = startup_delay;
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }
}

/// Owns one backend process and makes calls against it that survive
/// timeouts, garbage output and process death.
pub struct ReliableRpcClient {
    spec: ProcessSpec,
    rpc: RpcClient,
    policy: RetryPolicy,
}

impl ReliableRpcClient {
    /// Create a client. The process is spawned on first use.
    pub fn new(spec: ProcessSpec, policy: RetryPolicy) -> Self {
        let channel = ProcessChannel::new(spec.name.clone());
        Self {
            spec,
            rpc: RpcClient::new(channel),
            policy,
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn metrics(&self) -> RpcMetricsSnapshot {
        self.rpc.metrics().snapshot()
    }

    pub fn metrics_handle(&self) -> Arc<RpcMetrics> {
        Arc::clone(self.rpc.metrics())
    }

    pub fn last_request_id(&self) -> i64 {
        self.rpc.last_request_id()
    }

    /// Spawn eagerly instead of on the first call.
    pub async fn start(&self) -> Result<()> {
        let mut channel = self.rpc.lock_channel().await;
        self.ensure_started(&mut channel).await
    }

    pub async fn is_alive(&self) -> bool {
        self.rpc.lock_channel().await.is_alive()
    }

    /// `execute_with_retry` with the policy's timeout and attempt count.
    pub async fn call(&self, method: &str, params: &Params) -> Result<Value> {
        self.execute_with_retry(
            method,
            params,
            self.policy.call_timeout,
            self.policy.max_attempts,
        )
        .await
    }

    /// Round trip with no side effects on the backend.
    pub async fn ping(&self) -> Result<Value> {
        self.call("ping", &Params::new()).await
    }

    /// Call `method`, retrying transport failures up to `max_attempts`
    /// times in total.
    ///
    /// # Arguments
    /// * `timeout` - Deadline for each individual attempt
    /// * `max_attempts` - Total attempts, treated as at least 1
    ///
    /// # Returns
    /// The `result` member of the first successful response, or the error
    /// of the final attempt.
    #[instrument(skip(self, params, timeout), fields(backend = %self.spec.name))]
    pub async fn execute_with_retry(
        &self,
        method: &str,
        params: &Params,
        timeout: Duration,
        max_attempts: u32,
    ) -> Result<Value> {
        let max_attempts = max_attempts.max(1);
        let metrics = self.rpc.metrics();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let mut channel = self.rpc.lock_channel().await;

            let outcome = match self.ensure_started(&mut channel).await {
                Ok(()) => self.rpc.call_on(&mut channel, method, params, timeout).await,
                Err(e) => {
                    metrics.record_error();
                    Err(e)
                }
            };

            let err = match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        info!("{} succeeded on attempt {}/{}", method, attempt, max_attempts);
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => e,
            };

            if attempt >= max_attempts {
                metrics.record_exhausted();
                error!(
                    "{} failed after {} attempts: {}",
                    method, max_attempts, err
                );
                return Err(err);
            }

            metrics.record_retry();
            warn!(
                "{} attempt {}/{} failed: {}",
                method, attempt, max_attempts, err
            );

            if channel.is_alive() && !err.requires_respawn() {
                continue;
            }

            // Never reuse a half-alive process.
            channel.stop(self.policy.stop_grace).await;
            drop(channel);
            tokio::time::sleep(self.policy.backoff).await;
        }
    }

    /// Stop the process. The next call respawns it.
    pub async fn shutdown(&self, grace: Duration) {
        self.rpc.lock_channel().await.stop(grace).await;
    }

    async fn ensure_started(&self, channel: &mut ProcessChannel) -> Result<()> {
        if channel.is_alive() {
            return Ok(());
        }
        channel.start(&self.spec).await?;
        self.rpc.metrics().record_spawn();

        if !self.policy.startup_delay.is_zero() {
            tokio::time::sleep(self.policy.startup_delay).await;
        }
        Ok(())
    }
}

/// Convenience for building params inline.
pub fn params<I, K>(entries: I) -> Params
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    entries.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

impl std::fmt::Debug for ReliableRpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReliableRpcClient")
            .field("backend", &self.spec.name)
            .field("command", &self.spec.display())
            .field("policy", &self.policy)
            .finish()
    }
}
