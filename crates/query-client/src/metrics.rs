//! Per-client call counters.
//!
//! Owned by one client instance and shared by `Arc`, never global.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Atomic counters updated on every branch of a call.
#[derive(Debug, Default)]
pub struct RpcMetrics {
    requests: AtomicU64,
    successes: AtomicU64,
    errors: AtomicU64,
    retries: AtomicU64,
    spawns: AtomicU64,
    exhausted: AtomicU64,
    latency_micros: AtomicU64,
}

impl RpcMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self, latency: Duration) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.latency_micros
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_spawn(&self) {
        self.spawns.fetch_add(1, Ordering::Relaxed);
    }

    /// A logical call gave up after its last attempt.
    pub fn record_exhausted(&self) {
        self.exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RpcMetricsSnapshot {
        RpcMetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            spawns: self.spawns.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            latency_micros: self.latency_micros.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of `RpcMetrics`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RpcMetricsSnapshot {
    pub requests: u64,
    pub successes: u64,
    pub errors: u64,
    pub retries: u64,
    pub spawns: u64,
    pub exhausted: u64,
    pub latency_micros: u64,
}

impl RpcMetricsSnapshot {
    /// Spawns after the first one.
    pub fn respawns(&self) -> u64 {
        self.spawns.saturating_sub(1)
    }

    /// Mean latency of successful calls.
    pub fn avg_latency(&self) -> Duration {
        if self.successes == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(self.latency_micros / self.successes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = RpcMetrics::new();
        metrics.record_spawn();
        metrics.record_spawn();
        metrics.record_request();
        metrics.record_request();
        metrics.record_error();
        metrics.record_retry();
        metrics.record_success(Duration::from_millis(4));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests, 2);
        assert_eq!(snapshot.successes, 1);
        assert_eq!(snapshot.errors, 1);
        assert_eq!(snapshot.retries, 1);
        assert_eq!(snapshot.respawns(), 1);
        assert_eq!(snapshot.avg_latency(), Duration::from_millis(4));
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = RpcMetrics::new().snapshot();
        assert_eq!(snapshot, RpcMetricsSnapshot::default());
        assert_eq!(snapshot.respawns(), 0);
        assert_eq!(snapshot.avg_latency(), Duration::ZERO);
    }
}
