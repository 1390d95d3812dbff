//! Single request/response exchange over a `ProcessChannel`.
//!
//! ## Algorithm
//! 1. Allocate the next request id (starts at 1, strictly increasing)
//! 2. Frame the request as one line and send it
//! 3. Read lines until the matching response arrives or the deadline passes
//! 4. Map an `error` member onto `RpcError::Application`
//!
//! The channel sits behind a mutex held for the whole send+receive pair,
//! so callers sharing one client are serialized.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::debug;

use crate::channel::ProcessChannel;
use crate::error::{Result, RpcError};
use crate::metrics::RpcMetrics;
use crate::protocol::{Params, RpcRequest, RpcResponse};

/// JSON-RPC client bound to one channel instance.
pub struct RpcClient {
    channel: Mutex<ProcessChannel>,
    next_id: AtomicI64,
    metrics: Arc<RpcMetrics>,
}

impl RpcClient {
    pub fn new(channel: ProcessChannel) -> Self {
        Self::with_metrics(channel, Arc::new(RpcMetrics::new()))
    }

    /// Use an externally owned metrics sink.
    pub fn with_metrics(channel: ProcessChannel, metrics: Arc<RpcMetrics>) -> Self {
        Self {
            channel: Mutex::new(channel),
            next_id: AtomicI64::new(1),
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<RpcMetrics> {
        &self.metrics
    }

    /// Id of the most recent request, 0 before the first call.
    pub fn last_request_id(&self) -> i64 {
        self.next_id.load(Ordering::SeqCst) - 1
    }

    /// Call `method` and wait up to `timeout` for its response.
    ///
    /// The channel must already be started.
    pub async fn call(&self, method: &str, params: &Params, timeout: Duration) -> Result<Value> {
        let mut channel = self.channel.lock().await;
        self.call_on(&mut channel, method, params, timeout).await
    }

    /// Exclusive access to the channel, for callers that must start or
    /// stop it around a call without letting another call interleave.
    pub(crate) async fn lock_channel(&self) -> MutexGuard<'_, ProcessChannel> {
        self.channel.lock().await
    }

    /// Same as `call`, on a channel the caller already holds.
    pub(crate) async fn call_on(
        &self,
        channel: &mut ProcessChannel,
        method: &str,
        params: &Params,
        timeout: Duration,
    ) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.metrics.record_request();
        let start = Instant::now();

        let outcome = exchange(channel, id, method, params, timeout).await;
        match &outcome {
            Ok(_) => self.metrics.record_success(start.elapsed()),
            Err(_) => self.metrics.record_error(),
        }
        outcome
    }
}

async fn exchange(
    channel: &mut ProcessChannel,
    id: i64,
    method: &str,
    params: &Params,
    timeout: Duration,
) -> Result<Value> {
    let line = RpcRequest::new(id, method, params).to_line()?;
    debug!(backend = %channel.name(), id, method, "sending request");
    channel.send(&line).await?;

    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(RpcError::Timeout(timeout));
        }

        let line = match channel.receive_line(remaining).await {
            Ok(line) => line,
            Err(RpcError::Timeout(_)) => return Err(RpcError::Timeout(timeout)),
            Err(e) => return Err(e),
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = RpcResponse::parse(&line)?;
        match response.id {
            Some(response_id) if response_id == id => return response.into_result(),
            // Late answer to a request that already timed out.
            Some(response_id) if response_id < id => {
                debug!(
                    backend = %channel.name(),
                    stale_id = response_id,
                    expected = id,
                    "discarding stale response"
                );
            }
            Some(response_id) => {
                return Err(RpcError::Protocol(format!(
                    "response id {} is ahead of request id {}",
                    response_id, id
                )));
            }
            None if response.outcome.is_err() => return response.into_result(),
            None => {
                return Err(RpcError::Protocol("result response without an id".into()));
            }
        }
    }
}
