//! Fan-out / fan-in behaviour of the orchestrator.
//!
//! Sources here are in-process fakes; the subprocess scenarios live in
//! `backend_test.rs`.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FakeSource, shared, usage};
use server::{FailureKind, FetchTask, Orchestrator, PoolConfig, SourceOutcome, WorkerPool};
use sources::{FetchCriteria, ResultKind, SourceFetcher};

const TASK_TIMEOUT: Duration = Duration::from_secs(5);

fn orchestrator() -> Orchestrator {
    common::init_tracing();
    Orchestrator::new(Arc::new(WorkerPool::default()))
}

fn tasks(sources: &[Arc<dyn SourceFetcher>]) -> Vec<FetchTask> {
    let criteria = Arc::new(FetchCriteria::new("checkout_v2", "Checkout"));
    sources
        .iter()
        .map(|s| FetchTask::from_source(Arc::clone(s), Arc::clone(&criteria), TASK_TIMEOUT))
        .collect()
}

// ============================================================================
// Isolation
// ============================================================================

#[tokio::test]
async fn test_n_tasks_with_k_failures() {
    let sources = vec![
        shared(FakeSource::metrics("metrics", usage(500, 2500, 15.0))),
        shared(FakeSource::text("facebook", "SUMMARY: users love it")),
        shared(FakeSource::failing("instagram", ResultKind::TextAnalysis, "token expired")),
        shared(FakeSource::text("reddit", "SUMMARY: active discussion")),
        shared(FakeSource::failing("tiktok", ResultKind::TextAnalysis, "quota")),
        shared(FakeSource::text("forum", "SUMMARY: quiet")),
    ];

    let report = orchestrator().run("checkout_v2", tasks(&sources)).await;

    assert_eq!(report.per_source.len(), 6, "One entry per task");
    assert_eq!(report.failures(), vec!["instagram", "tiktok"]);
    assert_eq!(report.success_count(), 4);
    assert_eq!(report.metrics.purchase_count, 500);
    assert!((0.0..=1.0).contains(&report.health_score));
    assert!(
        report
            .social_summary
            .contains("INSTAGRAM:\nInstagram analysis unavailable: source unavailable: token expired")
    );
}

#[tokio::test]
async fn test_total_failure_still_produces_report() {
    let sources = vec![
        shared(FakeSource::failing("metrics", ResultKind::Metrics, "engine down")),
        shared(FakeSource::failing("facebook", ResultKind::TextAnalysis, "rate limited")),
    ];

    let report = orchestrator().run("checkout_v2", tasks(&sources)).await;

    assert_eq!(report.per_source.len(), 2);
    assert_eq!(report.success_count(), 0);
    assert_eq!(report.metrics.purchase_count, 0);
    assert_eq!(report.metrics.feature_id, "checkout_v2");
    assert!((report.health_score - 0.1).abs() < 1e-9, "Neutral sentiment only");
    assert!(report.recommendations[0].starts_with("OVERALL: Feature requires immediate attention."));
    assert!(
        report
            .recommendations
            .contains(&"- Focus on conversion optimization to drive purchases".to_string())
    );
    assert_eq!(
        report.metrics_summary,
        "Purchases: 0, Logins: 0, Avg Session Duration: 0.00 min"
    );
}

#[tokio::test]
async fn test_panicking_source_is_contained() {
    let sources = vec![
        shared(FakeSource::panicking("facebook")),
        shared(FakeSource::text("reddit", "SUMMARY: great")),
    ];

    let report = orchestrator().run("checkout_v2", tasks(&sources)).await;

    let failure = report.per_source["facebook"].failure_info().expect("failure");
    assert_eq!(failure.kind, FailureKind::Panicked);
    assert!(failure.message.contains("facebook exploded"));
    assert!(report.per_source["reddit"].is_success());
}

#[tokio::test]
async fn test_slow_source_times_out_alone() {
    let criteria = Arc::new(FetchCriteria::new("checkout_v2", "Checkout"));
    let slow: Arc<dyn SourceFetcher> =
        shared(FakeSource::text("reddit", "late").with_delay(Duration::from_secs(10)));
    let fast: Arc<dyn SourceFetcher> = shared(FakeSource::text("facebook", "SUMMARY: positive"));

    let report = orchestrator()
        .run(
            "checkout_v2",
            vec![
                FetchTask::from_source(slow, Arc::clone(&criteria), Duration::from_millis(100)),
                FetchTask::from_source(fast, criteria, TASK_TIMEOUT),
            ],
        )
        .await;

    assert_eq!(
        report.per_source["reddit"].failure_info().map(|f| f.kind),
        Some(FailureKind::Timeout)
    );
    assert!(report.per_source["facebook"].is_success());
}

// ============================================================================
// Determinism
// ============================================================================

#[tokio::test]
async fn test_output_independent_of_completion_order() {
    let build = |slow_first: bool| {
        let (a, b) = if slow_first {
            (Duration::from_millis(80), Duration::ZERO)
        } else {
            (Duration::ZERO, Duration::from_millis(80))
        };
        vec![
            shared(FakeSource::text("reddit", "SUMMARY: love it").with_delay(a)),
            shared(FakeSource::metrics("metrics", usage(100, 100, 1.0))),
            shared(FakeSource::text("facebook", "SUMMARY: a bug in export").with_delay(b)),
        ]
    };

    let orchestrator = orchestrator();
    let first = orchestrator.run("checkout_v2", tasks(&build(true))).await;
    let second = orchestrator.run("checkout_v2", tasks(&build(false))).await;

    let keys = |r: &server::AggregateReport| r.per_source.keys().cloned().collect::<Vec<_>>();
    assert_eq!(keys(&first), vec!["facebook", "metrics", "reddit"]);
    assert_eq!(keys(&first), keys(&second));
    assert_eq!(first.social_summary, second.social_summary);
    assert_eq!(first.recommendations, second.recommendations);
    assert_eq!(first.health_score, second.health_score);
}

#[tokio::test]
async fn test_duplicate_names_keep_separate_entries() {
    let sources = vec![
        shared(FakeSource::text("reddit", "one")),
        shared(FakeSource::text("reddit", "two")),
    ];

    let report = orchestrator().run("checkout_v2", tasks(&sources)).await;

    assert_eq!(report.per_source.len(), 2);
    let texts: Vec<_> = ["reddit", "reddit#2"]
        .iter()
        .map(|k| match &report.per_source[*k].outcome {
            SourceOutcome::Success { result } => result.as_text().map(str::to_string),
            SourceOutcome::Failed { .. } => None,
        })
        .collect();
    assert_eq!(texts, vec![Some("one".to_string()), Some("two".to_string())]);
}

// ============================================================================
// Overall deadline and backpressure
// ============================================================================

#[tokio::test]
async fn test_overall_deadline_records_stragglers_as_timeouts() {
    let sources = vec![
        shared(FakeSource::text("reddit", "late").with_delay(Duration::from_secs(10))),
        shared(FakeSource::text("facebook", "SUMMARY: fine")),
    ];
    let orchestrator = orchestrator().with_overall_deadline(Some(Duration::from_millis(150)));

    let started = std::time::Instant::now();
    let report = orchestrator.run("checkout_v2", tasks(&sources)).await;

    assert!(started.elapsed() < Duration::from_secs(5), "Deadline must cut the join short");
    let failure = report.per_source["reddit"].failure_info().expect("failure");
    assert_eq!(failure.kind, FailureKind::Timeout);
    assert!(failure.message.contains("overall deadline"));
    assert!(report.per_source["facebook"].is_success());
}

#[tokio::test]
async fn test_saturated_pool_runs_tasks_on_caller() {
    common::init_tracing();
    let pool = Arc::new(WorkerPool::new(PoolConfig {
        core_size: 1,
        max_size: 1,
        queue_capacity: 0,
    }));
    let orchestrator = Orchestrator::new(Arc::clone(&pool));
    let sources: Vec<Arc<dyn SourceFetcher>> = (0..3)
        .map(|i| {
            shared(
                FakeSource::text(&format!("source{}", i), "ok")
                    .with_delay(Duration::from_millis(50)),
            )
        })
        .collect();

    let report = orchestrator.run("checkout_v2", tasks(&sources)).await;

    assert_eq!(report.success_count(), 3, "Overload must not drop work");
    let stats = pool.stats();
    assert_eq!(stats.submitted, 3);
    assert!(stats.caller_ran >= 1, "Got {:?}", stats);
}

// ============================================================================
// Recommendations
// ============================================================================

#[tokio::test]
async fn test_platform_rules_need_their_own_source_to_qualify() {
    let sources = vec![
        shared(FakeSource::text("facebook", "SUMMARY: mixed feedback, nothing stands out")),
        shared(FakeSource::text("instagram", "SUMMARY: users are positive")),
    ];

    let report = orchestrator().run("checkout_v2", tasks(&sources)).await;

    assert!(
        report
            .recommendations
            .contains(&"- Leverage Instagram's positive sentiment for promotional campaigns".to_string()),
        "Got {:?}",
        report.recommendations
    );
    assert!(
        !report
            .recommendations
            .contains(&"- Increase marketing spend on Facebook based on positive engagement".to_string()),
        "Instagram's positive sentiment must not credit Facebook: {:?}",
        report.recommendations
    );
}
