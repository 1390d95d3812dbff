//! Internal usage metrics from a query-engine subprocess.
//!
//! ## Algorithm
//! 1. Validate the feature id (it is interpolated into SQL)
//! 2. Run the aggregate query through the reliable client
//! 3. Read `rows[0]`; missing rows or fields become zeros
//! 4. Optionally look the dataset up in the metadata catalog; failures
//!    there are logged and ignored

use std::sync::Arc;

use async_trait::async_trait;
use query_client::{ReliableRpcClient, params};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::traits::SourceFetcher;
use crate::types::{FeatureMetrics, FetchCriteria, FetchResult, ResultKind};
use crate::validation::validate_feature_id;

pub const QUERY_METHOD: &str = "vertica/query";
pub const CATALOG_DATASET_METHOD: &str = "datahub/getDataset";
pub const CATALOG_SEARCH_METHOD: &str = "datahub/search";

const DEFAULT_TABLE: &str = "feature_analytics";
const DEFAULT_LOOKBACK_DAYS: u32 = 30;

/// Metrics source backed by a query-engine process and, optionally, a
/// metadata catalog process.
pub struct QueryEngineMetricsSource {
    name: String,
    engine: Arc<ReliableRpcClient>,
    catalog: Option<Arc<ReliableRpcClient>>,
    table: String,
    lookback_days: u32,
}

impl QueryEngineMetricsSource {
    pub fn new(engine: Arc<ReliableRpcClient>) -> Self {
        Self {
            name: "metrics".to_string(),
            engine,
            catalog: None,
            table: DEFAULT_TABLE.to_string(),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        }
    }

    /// Enrich results from a metadata catalog backend.
    pub fn with_catalog(mut self, catalog: Arc<ReliableRpcClient>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Configure the analytics table (default: feature_analytics)
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Configure the aggregation window (default: 30 days)
    pub fn with_lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = days;
        self
    }

    /// Fetch metrics for one feature id.
    #[instrument(skip(self), fields(source = %self.name))]
    pub async fn metrics_for(&self, feature_id: &str) -> Result<FeatureMetrics> {
        let feature_id = validate_feature_id(feature_id)?;
        let sql = self.metrics_query(feature_id);
        debug!("Executing metrics query: {}", sql);

        let result = self
            .engine
            .call(QUERY_METHOD, &params([("query", json!(sql))]))
            .await?;
        let mut metrics = parse_metrics(&result, feature_id);

        if let Some(catalog) = &self.catalog {
            match self.describe_dataset(catalog, feature_id).await {
                Ok(Some(description)) => metrics.dataset_description = Some(description),
                Ok(None) => debug!("Catalog has no description for {}", feature_id),
                Err(e) => warn!("Catalog enrichment failed for {}: {}", feature_id, e),
            }
        }

        info!("Retrieved metrics for feature {}: {}", feature_id, metrics.summary());
        Ok(metrics)
    }

    /// Aggregate SQL for an already validated feature id.
    pub fn metrics_query(&self, feature_id: &str) -> String {
        format!(
            "SELECT feature_id, \
             COUNT(DISTINCT user_id) as active_users, \
             SUM(CASE WHEN event_type = 'purchase' THEN 1 ELSE 0 END) as purchase_count, \
             SUM(CASE WHEN event_type = 'login' THEN 1 ELSE 0 END) as login_count, \
             AVG(session_duration_minutes) as avg_session_duration \
             FROM {table} \
             WHERE feature_id = '{id}' \
             AND event_timestamp >= CURRENT_DATE - INTERVAL '{days} days' \
             GROUP BY feature_id",
            table = self.table,
            id = feature_id,
            days = self.lookback_days,
        )
    }

    async fn describe_dataset(
        &self,
        catalog: &ReliableRpcClient,
        feature_id: &str,
    ) -> Result<Option<String>> {
        let urn = dataset_urn(&self.table, feature_id);
        let metadata = catalog
            .call(CATALOG_DATASET_METHOD, &params([("urn", json!(urn))]))
            .await?;
        Ok(metadata
            .get("description")
            .and_then(Value::as_str)
            .filter(|d| !d.trim().is_empty())
            .map(str::to_string))
    }
}

#[async_trait]
impl SourceFetcher for QueryEngineMetricsSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResultKind {
        ResultKind::Metrics
    }

    async fn fetch(&self, criteria: &FetchCriteria) -> Result<FetchResult> {
        self.metrics_for(&criteria.feature_id)
            .await
            .map(FetchResult::Metrics)
    }
}

/// Catalog URN of the analytics dataset for one feature.
pub fn dataset_urn(table: &str, feature_id: &str) -> String {
    format!(
        "urn:li:dataset:(urn:li:dataPlatform:vertica,{}.{},PROD)",
        table, feature_id
    )
}

/// Read `rows[0]` of a query result. Absent rows or fields are zeros.
pub fn parse_metrics(result: &Value, feature_id: &str) -> FeatureMetrics {
    let mut metrics = FeatureMetrics::zeroed(feature_id);

    let Some(row) = result
        .get("rows")
        .and_then(Value::as_array)
        .and_then(|rows| rows.first())
    else {
        warn!("No metrics rows for feature {}, using zeros", feature_id);
        return metrics;
    };

    metrics.purchase_count = read_count(row, "purchase_count");
    metrics.login_count = read_count(row, "login_count");
    metrics.avg_session_minutes = row
        .get("avg_session_duration")
        .and_then(read_f64)
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(0.0);
    metrics
}

fn read_count(row: &Value, field: &str) -> u64 {
    row.get(field)
        .and_then(|v| v.as_u64().or_else(|| read_f64(v).map(|f| f.max(0.0) as u64)))
        .unwrap_or(0)
}

/// Numbers may arrive as JSON numbers or as numeric strings.
fn read_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
