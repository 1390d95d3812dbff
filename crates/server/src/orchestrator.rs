//! # Orchestrator
//!
//! Fan-out / fan-in over one request's fetch tasks:
//! 1. Dispatch every task to the shared worker pool
//! 2. Join every task to a terminal state (success or recorded failure)
//! 3. Aggregate: pick metrics, collect texts, score, recommend
//!
//! Per request the run moves through `Dispatched -> AllCompleted ->
//! Aggregated`. No task is retried here; retries live inside the sources.
//! `run` cannot fail: whatever the sources do, a complete report comes out.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use scoring::{RecommendationEngine, ScoreCalculator, ScoringContext};
use sources::{FeatureMetrics, FetchResult, ResultKind};
use tokio::task::JoinError;
use tracing::{debug, info, instrument, warn};

use crate::pool::{TaskHandle, WorkerPool};
use crate::report::{
    AggregateReport, FailureKind, SourceFailure, SourceReport, render_social_summary,
};
use crate::task::{FetchTask, panic_message};

/// Progress of one `run`, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Dispatched,
    AllCompleted,
    Aggregated,
}

struct Dispatched {
    name: String,
    kind: ResultKind,
    handle: TaskHandle<SourceReport>,
}

/// Coordinates fetch tasks and turns their results into a report.
pub struct Orchestrator {
    pool: Arc<WorkerPool>,
    calculator: ScoreCalculator,
    engine: RecommendationEngine,
    overall_deadline: Option<Duration>,
}

impl Orchestrator {
    /// Orchestrator with the default calculator, the standard rules and no
    /// overall deadline.
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self {
            pool,
            calculator: ScoreCalculator::default(),
            engine: RecommendationEngine::standard(),
            overall_deadline: None,
        }
    }

    pub fn with_calculator(mut self, calculator: ScoreCalculator) -> Self {
        self.calculator = calculator;
        self
    }

    pub fn with_engine(mut self, engine: RecommendationEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Bound the join phase. Tasks still running at the deadline are
    /// aborted and recorded as timeouts. `None` leaves only the per-task
    /// timeouts.
    pub fn with_overall_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.overall_deadline = deadline;
        self
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub fn overall_deadline(&self) -> Option<Duration> {
        self.overall_deadline
    }

    /// Run every task and aggregate.
    ///
    /// # Arguments
    /// * `feature_id` - Feature the report is about
    /// * `tasks` - One task per source; duplicate names get a `#n` suffix
    ///
    /// # Returns
    /// A report with exactly one `per_source` entry per task.
    #[instrument(skip(self, tasks), fields(tasks = tasks.len()))]
    pub async fn run(&self, feature_id: &str, tasks: Vec<FetchTask>) -> AggregateReport {
        let start_time = Instant::now();
        let deadline = self
            .overall_deadline
            .map(|d| tokio::time::Instant::now() + d);

        let dispatched = self.dispatch(unique_names(tasks)).await;
        self.log_phase(RunPhase::Dispatched, dispatched.len(), start_time);

        let per_source = join_all(dispatched, deadline).await;
        self.log_phase(RunPhase::AllCompleted, per_source.len(), start_time);

        let report = self.aggregate(feature_id, per_source, start_time);
        self.log_phase(RunPhase::Aggregated, report.per_source.len(), start_time);

        info!(
            "Report for {} - score {:.3}, {} of {} sources succeeded",
            feature_id,
            report.health_score,
            report.success_count(),
            report.per_source.len()
        );
        report
    }

    // ========================================================================
    // Phases
    // ========================================================================

    async fn dispatch(&self, tasks: Vec<FetchTask>) -> Vec<Dispatched> {
        let mut dispatched = Vec::with_capacity(tasks.len());
        for task in tasks {
            let name = task.name().to_string();
            let kind = task.kind();
            debug!("Dispatching {}", name);
            let handle = self.pool.submit(task.run_guarded()).await;
            dispatched.push(Dispatched { name, kind, handle });
        }
        dispatched
    }

    /// Build the report from terminal per-source results.
    ///
    /// ## Algorithm
    /// 1. Metrics: the first successful metrics result in key order, else zeros
    /// 2. Texts: every successful text analysis, failures excluded
    /// 3. Score from metrics and texts
    /// 4. Recommendations from score, source-labelled texts and
    ///    zero-metric checks
    fn aggregate(
        &self,
        feature_id: &str,
        per_source: BTreeMap<String, SourceReport>,
        start_time: Instant,
    ) -> AggregateReport {
        let metrics = per_source
            .values()
            .filter_map(SourceReport::result)
            .find_map(FetchResult::as_metrics)
            .cloned()
            .unwrap_or_else(|| {
                warn!("No metrics available for {}, using zeros", feature_id);
                FeatureMetrics::zeroed(feature_id)
            });

        let sections: Vec<(&str, &str)> = per_source
            .iter()
            .filter_map(|(name, report)| {
                report
                    .result()
                    .and_then(FetchResult::as_text)
                    .map(|text| (name.as_str(), text))
            })
            .collect();
        let texts: Vec<&str> = sections.iter().map(|(_, text)| *text).collect();
        // Rules see each text under its source header, like the summary.
        let labelled: Vec<String> = sections
            .iter()
            .map(|(name, text)| format!("{}:\n{}", name.to_uppercase(), text))
            .collect();

        let breakdown = self.calculator.breakdown(Some(&metrics), &texts);
        let social_summary = render_social_summary(&per_source);
        let metrics_summary = metrics.summary();

        let context = ScoringContext::new(breakdown.total, &metrics, &labelled);
        let recommendations = self
            .engine
            .generate(&context, &social_summary, &metrics_summary);

        AggregateReport {
            feature_id: feature_id.to_string(),
            per_source,
            social_summary,
            metrics,
            metrics_summary,
            recommendations,
            health_score: breakdown.total,
            elapsed_ms: start_time.elapsed().as_millis() as u64,
        }
    }

    fn log_phase(&self, phase: RunPhase, count: usize, start_time: Instant) {
        debug!(
            "{:?} ({} sources) after {:?}",
            phase,
            count,
            start_time.elapsed()
        );
    }
}

/// Wait for every dispatched task. Results are keyed by name, so the map
/// does not depend on completion order.
async fn join_all(
    dispatched: Vec<Dispatched>,
    deadline: Option<tokio::time::Instant>,
) -> BTreeMap<String, SourceReport> {
    let mut per_source = BTreeMap::new();

    for Dispatched { name, kind, handle } in dispatched {
        let report = match handle {
            TaskHandle::Completed(report) => report,
            TaskHandle::Spawned(mut join) => {
                let joined = match deadline {
                    Some(deadline) => match tokio::time::timeout_at(deadline, &mut join).await {
                        Ok(joined) => joined,
                        Err(_) => {
                            join.abort();
                            warn!("{} still running at the overall deadline, aborted", name);
                            per_source.insert(
                                name,
                                SourceReport::failure(
                                    kind,
                                    SourceFailure::new(
                                        FailureKind::Timeout,
                                        "overall deadline exceeded",
                                    ),
                                    0,
                                ),
                            );
                            continue;
                        }
                    },
                    None => join.await,
                };
                joined.unwrap_or_else(|e| join_failure(&name, kind, e))
            }
        };
        per_source.insert(name, report);
    }

    per_source
}

fn join_failure(name: &str, kind: ResultKind, e: JoinError) -> SourceReport {
    let failure = if e.is_panic() {
        let message = panic_message(e.into_panic().as_ref());
        SourceFailure::new(FailureKind::Panicked, format!("source panicked: {}", message))
    } else {
        SourceFailure::new(FailureKind::Cancelled, "task cancelled")
    };
    warn!("{} did not complete: {}", name, failure);
    SourceReport::failure(kind, failure, 0)
}

/// Suffix repeated names with `#2`, `#3`, ... so every task keeps its own
/// entry.
fn unique_names(mut tasks: Vec<FetchTask>) -> Vec<FetchTask> {
    let mut seen = HashSet::new();
    for task in &mut tasks {
        if seen.insert(task.name().to_string()) {
            continue;
        }
        let base = task.name().to_string();
        let mut n = 2;
        let mut candidate = format!("{}#{}", base, n);
        while seen.contains(&candidate) {
            n += 1;
            candidate = format!("{}#{}", base, n);
        }
        warn!("Duplicate source name {}, reporting as {}", base, candidate);
        seen.insert(candidate.clone());
        task.rename(candidate);
    }
    tasks
}
