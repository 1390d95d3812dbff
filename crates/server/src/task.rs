//! Fetch tasks and the task boundary.
//!
//! A `FetchTask` is one unit of fan-out work: a stable name, a timeout and
//! a one-shot producer of `FetchResult`. `run_guarded` is the isolation
//! boundary: errors, panics and timeouts all come out as a `SourceReport`,
//! never as an `Err` or an unwinding panic.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::future::BoxFuture;
use sources::{FetchCriteria, FetchResult, ResultKind, SourceFetcher};
use tracing::{debug, warn};

use crate::report::{FailureKind, SourceFailure, SourceReport};

type Producer = Box<dyn FnOnce() -> BoxFuture<'static, sources::Result<FetchResult>> + Send>;

/// One source invocation for one request.
pub struct FetchTask {
    name: String,
    kind: ResultKind,
    timeout: Duration,
    execute: Producer,
}

impl FetchTask {
    /// Task from a closure producing the fetch future.
    ///
    /// # Arguments
    /// * `name` - Key of this task in the report
    /// * `kind` - What the task returns on success, used for placeholders
    /// * `timeout` - Upper bound for the whole fetch, retries included
    /// * `execute` - Called exactly once, on the worker that runs the task
    pub fn new<F>(name: impl Into<String>, kind: ResultKind, timeout: Duration, execute: F) -> Self
    where
        F: FnOnce() -> BoxFuture<'static, sources::Result<FetchResult>> + Send + 'static,
    {
        Self {
            name: name.into(),
            kind,
            timeout,
            execute: Box::new(execute),
        }
    }

    /// Task calling `source.fetch(criteria)`.
    pub fn from_source(
        source: Arc<dyn SourceFetcher>,
        criteria: Arc<FetchCriteria>,
        timeout: Duration,
    ) -> Self {
        let name = source.name().to_string();
        let kind = source.kind();
        Self::new(name, kind, timeout, move || {
            async move { source.fetch(&criteria).await }.boxed()
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ResultKind {
        self.kind
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn rename(&mut self, name: String) {
        self.name = name;
    }

    /// Run the task to a terminal state.
    pub async fn run_guarded(self) -> SourceReport {
        let FetchTask {
            name,
            kind,
            timeout,
            execute,
        } = self;
        let started = Instant::now();

        let guarded = AssertUnwindSafe(async move { execute().await }).catch_unwind();
        let outcome = tokio::time::timeout(timeout, guarded).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(Ok(result))) => {
                debug!(source = %name, "Completed in {}ms", elapsed_ms);
                SourceReport::success(result, elapsed_ms)
            }
            Ok(Ok(Err(e))) => {
                let failure_kind = if e.is_timeout() {
                    FailureKind::Timeout
                } else {
                    FailureKind::Error
                };
                warn!(source = %name, "Failed after {}ms: {}", elapsed_ms, e);
                SourceReport::failure(kind, SourceFailure::new(failure_kind, e.to_string()), elapsed_ms)
            }
            Ok(Err(panic)) => {
                let message = panic_message(panic.as_ref());
                warn!(source = %name, "Panicked: {}", message);
                SourceReport::failure(
                    kind,
                    SourceFailure::new(FailureKind::Panicked, format!("source panicked: {}", message)),
                    elapsed_ms,
                )
            }
            Err(_) => {
                warn!(source = %name, "Timed out after {:?}", timeout);
                SourceReport::failure(
                    kind,
                    SourceFailure::new(
                        FailureKind::Timeout,
                        format!("timed out after {}ms", timeout.as_millis()),
                    ),
                    elapsed_ms,
                )
            }
        }
    }
}

impl std::fmt::Debug for FetchTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchTask")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::SourceOutcome;
    use sources::SourceError;

    fn text_task(name: &str, timeout: Duration, result: sources::Result<FetchResult>) -> FetchTask {
        FetchTask::new(name, ResultKind::TextAnalysis, timeout, move || {
            async move { result }.boxed()
        })
    }

    #[tokio::test]
    async fn test_success() {
        let task = text_task(
            "facebook",
            Duration::from_secs(1),
            Ok(FetchResult::TextAnalysis("fine".into())),
        );
        let report = task.run_guarded().await;
        assert!(report.is_success());
        assert_eq!(report.result().and_then(FetchResult::as_text), Some("fine"));
    }

    #[tokio::test]
    async fn test_error_becomes_placeholder() {
        let task = text_task(
            "instagram",
            Duration::from_secs(1),
            Err(SourceError::Http("instagram returned 500".into())),
        );
        let report = task.run_guarded().await;
        let failure = report.failure_info().expect("failure");
        assert_eq!(failure.kind, FailureKind::Error);
        assert!(failure.message.contains("500"));
        assert_eq!(report.kind, ResultKind::TextAnalysis);
    }

    #[tokio::test]
    async fn test_timeout() {
        let task = FetchTask::new("slow", ResultKind::Metrics, Duration::from_millis(20), || {
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(FetchResult::TextAnalysis("late".into()))
            }
            .boxed()
        });
        let report = task.run_guarded().await;
        assert!(matches!(
            report.outcome,
            SourceOutcome::Failed { ref failure } if failure.kind == FailureKind::Timeout
        ));
        assert_eq!(report.kind, ResultKind::Metrics);
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let task = FetchTask::new("broken", ResultKind::TextAnalysis, Duration::from_secs(1), || {
            async {
                let rows: Vec<String> = Vec::new();
                Ok(FetchResult::TextAnalysis(rows[3].clone()))
            }
            .boxed()
        });
        let report = task.run_guarded().await;
        let failure = report.failure_info().expect("failure");
        assert_eq!(failure.kind, FailureKind::Panicked);
        assert!(failure.message.contains("index out of bounds"));
    }
}
