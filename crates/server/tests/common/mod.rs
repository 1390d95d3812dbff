//! Test doubles shared by the server integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use query_client::{ProcessSpec, RetryPolicy};
use sources::{FeatureMetrics, FetchCriteria, FetchResult, ResultKind, SourceError, SourceFetcher};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// What a `FakeSource` does when fetched.
#[derive(Clone)]
pub enum Behavior {
    Text(String),
    Metrics(FeatureMetrics),
    Fail(String),
    Panic,
}

/// Source with a scripted answer after an optional delay.
pub struct FakeSource {
    name: String,
    kind: ResultKind,
    behavior: Behavior,
    delay: Duration,
    pub calls: AtomicUsize,
}

impl FakeSource {
    pub fn text(name: &str, text: &str) -> Self {
        Self::new(name, ResultKind::TextAnalysis, Behavior::Text(text.to_string()))
    }

    pub fn metrics(name: &str, metrics: FeatureMetrics) -> Self {
        Self::new(name, ResultKind::Metrics, Behavior::Metrics(metrics))
    }

    pub fn failing(name: &str, kind: ResultKind, message: &str) -> Self {
        Self::new(name, kind, Behavior::Fail(message.to_string()))
    }

    pub fn panicking(name: &str) -> Self {
        Self::new(name, ResultKind::TextAnalysis, Behavior::Panic)
    }

    fn new(name: &str, kind: ResultKind, behavior: Behavior) -> Self {
        Self {
            name: name.to_string(),
            kind,
            behavior,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceFetcher for FakeSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResultKind {
        self.kind
    }

    async fn fetch(&self, criteria: &FetchCriteria) -> sources::Result<FetchResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.behavior {
            Behavior::Text(text) => Ok(FetchResult::TextAnalysis(text.clone())),
            Behavior::Metrics(metrics) => Ok(FetchResult::Metrics(FeatureMetrics {
                feature_id: criteria.feature_id.clone(),
                ..metrics.clone()
            })),
            Behavior::Fail(message) => Err(SourceError::Unavailable(message.clone())),
            Behavior::Panic => panic!("{} exploded", self.name),
        }
    }
}

pub fn shared(source: FakeSource) -> Arc<dyn SourceFetcher> {
    Arc::new(source)
}

pub fn usage(purchases: u64, logins: u64, minutes: f64) -> FeatureMetrics {
    FeatureMetrics {
        feature_id: String::new(),
        purchase_count: purchases,
        login_count: logins,
        avg_session_minutes: minutes,
        dataset_description: None,
    }
}

/// Fast retry settings for scripted backends.
pub fn quick_policy() -> RetryPolicy {
    RetryPolicy::default()
        .with_backoff(Duration::from_millis(10))
        .with_stop_grace(Duration::from_millis(200))
        .with_startup_delay(Duration::ZERO)
        .with_call_timeout(Duration::from_secs(5))
}

/// Shell loop answering every request line with `result`, echoing the id.
pub fn serve_loop(result: &str) -> String {
    format!(
        r#"while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"id":\([0-9]*\).*/\1/p')
  printf '{{"jsonrpc":"2.0","id":%s,"result":{}}}\n' "$id"
done"#,
        result
    )
}

pub fn shell(name: &str, script: String) -> ProcessSpec {
    ProcessSpec::new(name, "sh").arg("-c").arg(script)
}

pub const METRICS_ROWS: &str =
    r#"{"rows":[{"purchase_count":850,"login_count":4200,"avg_session_duration":21.5}]}"#;
