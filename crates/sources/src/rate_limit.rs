//! Per-source outbound rate limiting.
//!
//! ## Algorithm
//! A bucket holds up to `capacity` tokens. Once a full `period` has passed
//! since the last refill, the bucket is topped back up to `capacity` in one
//! step (interval refill, not a smooth drip). Every outbound request takes
//! one token; `acquire` sleeps until the next refill when the bucket is
//! empty.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Shared token bucket. Internally synchronized, share it behind `Arc`.
#[derive(Debug)]
pub struct TokenBucket {
    name: String,
    capacity: u32,
    period: Duration,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: u32,
    last_refill: Instant,
}

impl TokenBucket {
    /// Bucket with `capacity` tokens, refilled every `period`.
    pub fn new(name: impl Into<String>, capacity: u32, period: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            name: name.into(),
            capacity,
            period: period.max(Duration::from_millis(1)),
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Bucket allowing `requests` calls per minute.
    pub fn per_minute(name: impl Into<String>, requests: u32) -> Self {
        Self::new(name, requests, Duration::from_secs(60))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Take a token if one is available right now.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.lock();
        self.refill(&mut state, Instant::now());
        if state.tokens > 0 {
            state.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Take a token, waiting for the next refill if the bucket is empty.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.lock();
                let now = Instant::now();
                self.refill(&mut state, now);
                if state.tokens > 0 {
                    state.tokens -= 1;
                    return;
                }
                (state.last_refill + self.period).saturating_duration_since(now)
            };

            debug!(limiter = %self.name, "rate limit reached, waiting {:?}", wait);
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
        }
    }

    /// Tokens currently available.
    pub fn available(&self) -> u32 {
        let mut state = self.lock();
        self.refill(&mut state, Instant::now());
        state.tokens
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill);
        if elapsed < self.period {
            return;
        }
        let periods = (elapsed.as_nanos() / self.period.as_nanos()) as u32;
        state.tokens = self.capacity;
        state.last_refill += self.period * periods;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BucketState> {
        // Counter state stays consistent even if a holder panicked.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
