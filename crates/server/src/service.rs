//! Service facade: request validation, source wiring and the entry points
//! the presentation layer calls.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use query_client::ReliableRpcClient;
use scoring::{RecommendationEngine, ScoreCalculator};
use serde::{Deserialize, Serialize};
use sources::{
    ConnectionProbe, DigestFeedbackAnalyzer, FeatureMetrics, FeedbackAnalyzer, FetchCriteria,
    FetchResult, GraphCommentFetcher, GraphPlatform, LlmFeedbackAnalyzer, ProbeReport,
    QueryEngineMetricsSource, RedditCommentFetcher, SocialSource, SourceError, SourceFetcher,
    TokenBucket, validate_feature_id,
};
use tracing::{info, warn};

use crate::config::{AppConfig, GraphSourceConfig};
use crate::error::{InsightError, Result};
use crate::orchestrator::Orchestrator;
use crate::pool::{PoolConfig, WorkerPool};
use crate::report::AggregateReport;
use crate::task::FetchTask;

pub const MAX_FEATURE_NAME_CHARS: usize = 200;
pub const MAX_KEYWORDS: usize = 20;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// What to analyze.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub feature_id: String,
    pub feature_name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Reddit thread to read, overriding the configured one.
    #[serde(default)]
    pub thread_url: Option<String>,
    /// Comments per social source; the source default when absent.
    #[serde(default)]
    pub max_results: Option<usize>,
}

impl AnalyzeRequest {
    pub fn new(feature_id: impl Into<String>, feature_name: impl Into<String>) -> Self {
        Self {
            feature_id: feature_id.into(),
            feature_name: feature_name.into(),
            ..Self::default()
        }
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_thread_url(mut self, thread_url: impl Into<String>) -> Self {
        self.thread_url = Some(thread_url.into());
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Validate and normalize into fetch criteria.
    ///
    /// Blank keywords are dropped; a blank thread URL counts as none.
    pub fn criteria(&self) -> Result<FetchCriteria> {
        let feature_id = checked_feature_id(&self.feature_id)?;

        let feature_name = self.feature_name.trim();
        if feature_name.is_empty() {
            return Err(InsightError::Validation("feature name must not be blank".into()));
        }
        if feature_name.chars().count() > MAX_FEATURE_NAME_CHARS {
            return Err(InsightError::Validation(format!(
                "feature name exceeds {} characters",
                MAX_FEATURE_NAME_CHARS
            )));
        }

        let keywords: Vec<&str> = self
            .keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .collect();
        if keywords.len() > MAX_KEYWORDS {
            return Err(InsightError::Validation(format!(
                "at most {} keywords are allowed, got {}",
                MAX_KEYWORDS,
                keywords.len()
            )));
        }

        let mut criteria = FetchCriteria::new(feature_id, feature_name).with_keywords(keywords);
        match self.max_results {
            Some(0) => {
                return Err(InsightError::Validation("max results must be positive".into()));
            }
            Some(n) => criteria = criteria.with_max_results(n),
            None => {}
        }
        if let Some(url) = self.thread_url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            criteria = criteria.with_thread_url(url);
        }
        Ok(criteria)
    }
}

fn checked_feature_id(feature_id: &str) -> Result<&str> {
    validate_feature_id(feature_id).map_err(|e| match e {
        SourceError::Validation(message) => InsightError::Validation(message),
        other => InsightError::Source(other),
    })
}

/// A subprocess backend the service owns.
struct Backend {
    client: Arc<ReliableRpcClient>,
    probe: ConnectionProbe,
    probe_timeout: Duration,
}

/// Entry point for reports, single-source calls and health checks.
pub struct InsightService {
    orchestrator: Orchestrator,
    task_timeout: Duration,
    metrics_source: Option<Arc<dyn SourceFetcher>>,
    sources: Vec<Arc<dyn SourceFetcher>>,
    backends: Vec<Backend>,
}

impl InsightService {
    /// Service without any source.
    pub fn new(orchestrator: Orchestrator, task_timeout: Duration) -> Self {
        Self {
            orchestrator,
            task_timeout,
            metrics_source: None,
            sources: Vec::new(),
            backends: Vec::new(),
        }
    }

    /// Add a social (or any other) source.
    pub fn with_source(mut self, source: Arc<dyn SourceFetcher>) -> Self {
        self.sources.push(source);
        self
    }

    /// Set the source `metrics` answers from. It also takes part in `analyze`.
    pub fn with_metrics_source(mut self, source: Arc<dyn SourceFetcher>) -> Self {
        self.metrics_source = Some(source);
        self
    }

    /// Register a subprocess backend for health checks and shutdown.
    pub fn with_backend(mut self, probe: ConnectionProbe, client: Arc<ReliableRpcClient>) -> Self {
        let probe_timeout = client.policy().call_timeout;
        self.backends.push(Backend {
            client,
            probe,
            probe_timeout,
        });
        self
    }

    /// Assemble the service from configuration.
    ///
    /// ## Algorithm
    /// 1. Worker pool, calculator and rules from `executor` and `scoring`
    /// 2. One analyzer shared by every social source (chat model when an
    ///    endpoint is configured, digest otherwise)
    /// 3. One social source per enabled platform, each with its own limiter
    /// 4. Metrics source over the query engine, enriched from the catalog
    ///    when enabled
    ///
    /// Nothing is spawned or contacted here; backends start on first use.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let executor = &config.executor;
        if executor.max_size < executor.core_size {
            return Err(InsightError::Config(format!(
                "executor.max_size ({}) must not be below executor.core_size ({})",
                executor.max_size, executor.core_size
            )));
        }

        let pool = WorkerPool::new(PoolConfig {
            core_size: executor.core_size,
            max_size: executor.max_size,
            queue_capacity: executor.queue_capacity,
        });
        let orchestrator = Orchestrator::new(Arc::new(pool))
            .with_calculator(ScoreCalculator::new(config.scoring.weights))
            .with_engine(RecommendationEngine::with_standard_rules(
                config.scoring.thresholds,
            ))
            .with_overall_deadline(executor.overall_deadline());
        let mut service = Self::new(orchestrator, executor.task_timeout());

        let http = config.http.settings();
        let analyzer: Arc<dyn FeedbackAnalyzer> = match config.analyzer.llm_config() {
            Some(llm) => {
                info!("Using chat model {} at {}", llm.model, llm.endpoint);
                let limiter = Arc::new(TokenBucket::per_minute(
                    "analyzer",
                    config.analyzer.requests_per_minute,
                ));
                Arc::new(LlmFeedbackAnalyzer::new(llm)?.with_limiter(limiter))
            }
            None => Arc::new(DigestFeedbackAnalyzer),
        };

        for (platform, graph) in [
            (GraphPlatform::Facebook, &config.facebook),
            (GraphPlatform::Instagram, &config.instagram),
        ] {
            if !graph.enabled {
                continue;
            }
            let limiter = Arc::new(TokenBucket::per_minute(
                platform.name(),
                graph.requests_per_minute,
            ));
            let fetcher =
                GraphCommentFetcher::new(platform, graph.graph_config(), &http, limiter)?;
            service = service.with_source(social(Arc::new(fetcher), &analyzer, graph));
        }

        let reddit = &config.reddit;
        if reddit.enabled {
            let limiter = Arc::new(TokenBucket::per_minute("reddit", reddit.requests_per_minute));
            let fetcher = RedditCommentFetcher::new(reddit.reddit_config(), &http, limiter)?;
            let source = SocialSource::new(Arc::new(fetcher), Arc::clone(&analyzer))
                .with_default_keywords(reddit.default_keywords.clone())
                .with_result_cap(reddit.max_comments);
            service = service.with_source(Arc::new(source));
        }

        let engine_config = &config.query_engine;
        if engine_config.enabled {
            let engine = Arc::new(ReliableRpcClient::new(
                engine_config.process_spec(),
                engine_config.retry.policy(),
            ));
            let mut metrics = QueryEngineMetricsSource::new(Arc::clone(&engine))
                .with_table(&engine_config.table)
                .with_lookback_days(engine_config.lookback_days);
            service = service.with_backend(
                ConnectionProbe::query_engine(Arc::clone(&engine)),
                engine,
            );

            if config.catalog.enabled {
                let catalog = Arc::new(ReliableRpcClient::new(
                    config.catalog.process_spec(),
                    config.catalog.retry.policy(),
                ));
                metrics = metrics.with_catalog(Arc::clone(&catalog));
                service =
                    service.with_backend(ConnectionProbe::catalog(Arc::clone(&catalog)), catalog);
            }
            service = service.with_metrics_source(Arc::new(metrics));
        } else if config.catalog.enabled {
            warn!("Catalog is enabled but the query engine is not; catalog ignored");
        }

        info!(
            "Service ready - sources: [{}], backends: {}",
            service.source_names().join(", "),
            service.backends.len()
        );
        Ok(service)
    }

    /// Names of every source `analyze` runs, metrics first.
    pub fn source_names(&self) -> Vec<&str> {
        self.metrics_source
            .iter()
            .chain(self.sources.iter())
            .map(|s| s.name())
            .collect()
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Full report for one feature.
    ///
    /// # Returns
    /// * `Ok(AggregateReport)` - Always, once the request is valid; failed
    ///   sources appear as placeholders inside the report
    /// * `Err(InsightError::Validation)` - The request was rejected
    pub async fn analyze(&self, request: &AnalyzeRequest) -> Result<AggregateReport> {
        let criteria = Arc::new(request.criteria()?);
        info!(
            "Analyzing feature {} ({}) with {} keywords",
            criteria.feature_id,
            criteria.feature_name,
            criteria.keywords.len()
        );

        let tasks: Vec<FetchTask> = self
            .metrics_source
            .iter()
            .chain(self.sources.iter())
            .map(|source| {
                FetchTask::from_source(Arc::clone(source), Arc::clone(&criteria), self.task_timeout)
            })
            .collect();

        Ok(self.orchestrator.run(&criteria.feature_id, tasks).await)
    }

    /// Internal metrics only.
    pub async fn metrics(&self, feature_id: &str) -> Result<FeatureMetrics> {
        let feature_id = checked_feature_id(feature_id)?;
        let Some(source) = &self.metrics_source else {
            return Err(InsightError::Config("query engine is disabled".into()));
        };

        let criteria = FetchCriteria::new(feature_id, feature_id);
        match self.fetch_bounded(source.as_ref(), &criteria).await? {
            FetchResult::Metrics(metrics) => Ok(metrics),
            FetchResult::TextAnalysis(_) => Err(InsightError::Source(SourceError::Decode(
                format!("{} returned text instead of metrics", source.name()),
            ))),
        }
    }

    /// One source by name, outside the orchestrator.
    pub async fn source(&self, name: &str, request: &AnalyzeRequest) -> Result<FetchResult> {
        let criteria = request.criteria()?;
        let source = self
            .metrics_source
            .iter()
            .chain(self.sources.iter())
            .find(|s| s.name() == name)
            .ok_or_else(|| {
                InsightError::Config(format!(
                    "source {} is not enabled (enabled: {})",
                    name,
                    self.source_names().join(", ")
                ))
            })?;
        self.fetch_bounded(source.as_ref(), &criteria).await
    }

    /// Probe every subprocess backend concurrently.
    pub async fn health(&self) -> Vec<ProbeReport> {
        join_all(
            self.backends
                .iter()
                .map(|backend| backend.probe.check(backend.probe_timeout)),
        )
        .await
    }

    /// Stop every backend process.
    pub async fn shutdown(&self) {
        for backend in &self.backends {
            backend.client.shutdown(SHUTDOWN_GRACE).await;
        }
        info!("Stopped {} backends", self.backends.len());
    }

    async fn fetch_bounded(
        &self,
        source: &dyn SourceFetcher,
        criteria: &FetchCriteria,
    ) -> Result<FetchResult> {
        match tokio::time::timeout(self.task_timeout, source.fetch(criteria)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(InsightError::Source(SourceError::Unavailable(format!(
                "{} timed out after {:?}",
                source.name(),
                self.task_timeout
            )))),
        }
    }
}

fn social(
    fetcher: Arc<GraphCommentFetcher>,
    analyzer: &Arc<dyn FeedbackAnalyzer>,
    config: &GraphSourceConfig,
) -> Arc<dyn SourceFetcher> {
    Arc::new(
        SocialSource::new(fetcher, Arc::clone(analyzer))
            .with_default_keywords(config.default_keywords.clone())
            .with_result_cap(config.max_comments),
    )
}
