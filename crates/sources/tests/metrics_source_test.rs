//! Metrics source and connection probes against shell-scripted JSON-RPC
//! backends.

#![cfg(unix)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use query_client::{ProcessSpec, ReliableRpcClient, RetryPolicy};
use sources::{
    ConnectionProbe, FetchCriteria, QueryEngineMetricsSource, ResultKind, SourceError,
    SourceFetcher,
};

/// Answers every request line with `result`, echoing the request id.
fn scripted(name: &str, result: &str) -> ProcessSpec {
    let script = format!(
        r#"while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"id":\([0-9]*\).*/\1/p')
  printf '{{"jsonrpc":"2.0","id":%s,"result":{}}}\n' "$id"
done"#,
        result
    );
    ProcessSpec::new(name, "sh").arg("-c").arg(script)
}

fn policy() -> RetryPolicy {
    RetryPolicy::default()
        .with_backoff(Duration::from_millis(10))
        .with_stop_grace(Duration::from_millis(200))
        .with_startup_delay(Duration::ZERO)
        .with_call_timeout(Duration::from_secs(5))
}

fn engine() -> Arc<ReliableRpcClient> {
    common::init_tracing();
    Arc::new(ReliableRpcClient::new(
        scripted(
            "vertica",
            r#"{"rows":[{"purchase_count":850,"login_count":"4200","avg_session_duration":21.5}]}"#,
        ),
        policy(),
    ))
}

// ============================================================================
// Metrics source
// ============================================================================

#[tokio::test]
async fn test_metrics_from_query_engine() {
    let engine = engine();
    let source = QueryEngineMetricsSource::new(Arc::clone(&engine));

    assert_eq!(source.name(), "metrics");
    assert_eq!(source.kind(), ResultKind::Metrics);

    let result = source
        .fetch(&FetchCriteria::new("checkout_v2", "Checkout"))
        .await
        .expect("metrics fetch should succeed");
    let metrics = result.as_metrics().expect("metrics result");

    assert_eq!(metrics.feature_id, "checkout_v2");
    assert_eq!(metrics.purchase_count, 850);
    assert_eq!(metrics.login_count, 4200);
    assert_eq!(metrics.avg_session_minutes, 21.5);
    assert!(metrics.dataset_description.is_none());
    assert_eq!(engine.metrics().spawns, 1);

    engine.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_catalog_description_enriches_metrics() {
    let catalog = Arc::new(ReliableRpcClient::new(
        scripted("datahub", r#"{"description":"Checkout funnel events"}"#),
        policy(),
    ));
    let source = QueryEngineMetricsSource::new(engine()).with_catalog(catalog);

    let metrics = source.metrics_for("checkout_v2").await.unwrap();
    assert_eq!(
        metrics.dataset_description.as_deref(),
        Some("Checkout funnel events")
    );
}

#[tokio::test]
async fn test_catalog_failure_is_ignored() {
    let catalog = Arc::new(ReliableRpcClient::new(
        ProcessSpec::new("datahub", "sh").arg("-c").arg("exit 1"),
        policy().with_max_attempts(1),
    ));
    let source = QueryEngineMetricsSource::new(engine()).with_catalog(catalog);

    let metrics = source
        .metrics_for("checkout_v2")
        .await
        .expect("catalog errors must not fail the metrics");
    assert_eq!(metrics.purchase_count, 850);
    assert!(metrics.dataset_description.is_none());
}

#[tokio::test]
async fn test_invalid_feature_id_never_reaches_the_engine() {
    let engine = engine();
    let source = QueryEngineMetricsSource::new(Arc::clone(&engine));

    let err = source
        .metrics_for("x'; DROP TABLE feature_analytics; --")
        .await
        .unwrap_err();
    assert!(err.is_validation(), "Got {:?}", err);
    assert_eq!(engine.metrics().spawns, 0);
    assert_eq!(engine.metrics().requests, 0);
}

#[tokio::test]
async fn test_dead_engine_is_rpc_error() {
    let engine = Arc::new(ReliableRpcClient::new(
        ProcessSpec::new("vertica", "sh").arg("-c").arg("exit 3"),
        policy(),
    ));
    let source = QueryEngineMetricsSource::new(Arc::clone(&engine));

    let err = source.metrics_for("checkout_v2").await.unwrap_err();
    assert!(matches!(err, SourceError::Rpc(_)), "Got {:?}", err);
    assert_eq!(engine.metrics().spawns, 3, "One launch per attempt");
}

// ============================================================================
// Probes
// ============================================================================

#[tokio::test]
async fn test_probe_healthy_backend() {
    let engine = engine();
    let report = ConnectionProbe::query_engine(engine)
        .check(Duration::from_secs(5))
        .await;

    assert!(report.healthy);
    assert_eq!(report.backend, "vertica");
    assert!(report.error.is_none());
}

#[tokio::test]
async fn test_probe_silent_backend_times_out() {
    let catalog = Arc::new(ReliableRpcClient::new(
        ProcessSpec::new("datahub", "sh").arg("-c").arg("cat > /dev/null"),
        policy(),
    ));
    let report = ConnectionProbe::catalog(Arc::clone(&catalog))
        .check(Duration::from_millis(200))
        .await;

    assert!(!report.healthy);
    assert!(report.error.is_some());
    assert_eq!(catalog.metrics().requests, 1, "Probes make a single attempt");

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["backend"], "datahub");
    assert_eq!(json["healthy"], false);
}
