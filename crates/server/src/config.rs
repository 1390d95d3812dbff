//! Configuration file handling.
//!
//! Settings come from three layers, later ones winning:
//! 1. Built-in defaults
//! 2. An optional TOML file (`feature-pulse.toml`)
//! 3. Environment variables (`PULSE_*` and backend credentials)

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use query_client::{ProcessSpec, RetryPolicy};
use scoring::{HealthThresholds, ScoreWeights};
use serde::{Deserialize, Serialize};
use sources::{GraphConfig, HttpSettings, LlmConfig, RedditConfig};

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "feature-pulse.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Internal metrics backend.
    #[serde(default)]
    pub query_engine: QueryEngineConfig,

    /// Metadata catalog used to describe metric datasets.
    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub facebook: GraphSourceConfig,

    #[serde(default)]
    pub instagram: GraphSourceConfig,

    #[serde(default)]
    pub reddit: RedditSourceConfig,

    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,
}

/// Worker pool and task bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Tasks that start immediately.
    #[serde(default = "default_core_size")]
    pub core_size: usize,

    /// Upper bound on concurrently running tasks once the queue is full.
    #[serde(default = "default_max_size")]
    pub max_size: usize,

    /// Tasks waiting for a core worker.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Bound on one source's fetch, in seconds.
    #[serde(default = "default_task_timeout")]
    pub task_timeout_secs: u64,

    /// Bound on the whole fan-out, in seconds. Unset means none.
    #[serde(default)]
    pub overall_deadline_secs: Option<u64>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            core_size: default_core_size(),
            max_size: default_max_size(),
            queue_capacity: default_queue_capacity(),
            task_timeout_secs: default_task_timeout(),
            overall_deadline_secs: None,
        }
    }
}

fn default_core_size() -> usize {
    3
}

fn default_max_size() -> usize {
    10
}

fn default_queue_capacity() -> usize {
    50
}

fn default_task_timeout() -> u64 {
    180
}

impl ExecutorConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn overall_deadline(&self) -> Option<Duration> {
        self.overall_deadline_secs.map(Duration::from_secs)
    }
}

/// Query-engine subprocess (`npx mcp-vertica` by default).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryEngineConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_command")]
    pub command: String,

    /// First argument to `command`.
    #[serde(default = "default_engine_package")]
    pub package: String,

    #[serde(default = "default_engine_host")]
    pub host: String,

    #[serde(default = "default_engine_port")]
    pub port: u16,

    #[serde(default)]
    pub database: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_table")]
    pub table: String,

    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for QueryEngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: default_command(),
            package: default_engine_package(),
            host: default_engine_host(),
            port: default_engine_port(),
            database: String::new(),
            username: String::new(),
            password: String::new(),
            table: default_table(),
            lookback_days: default_lookback_days(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_command() -> String {
    "npx".to_string()
}

fn default_engine_package() -> String {
    "mcp-vertica".to_string()
}

fn default_engine_host() -> String {
    "localhost".to_string()
}

fn default_engine_port() -> u16 {
    5433
}

fn default_table() -> String {
    "feature_analytics".to_string()
}

fn default_lookback_days() -> u32 {
    30
}

impl QueryEngineConfig {
    /// Launch description; connection settings travel as environment.
    pub fn process_spec(&self) -> ProcessSpec {
        ProcessSpec::new("vertica", &self.command)
            .arg(&self.package)
            .env("VERTICA_HOST", &self.host)
            .env("VERTICA_PORT", self.port.to_string())
            .env("VERTICA_DATABASE", &self.database)
            .env("VERTICA_USERNAME", &self.username)
            .env("VERTICA_PASSWORD", &self.password)
    }
}

/// Metadata catalog subprocess (`npx @acryldata/mcp-server-datahub`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Off unless a GMS URL is configured.
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_command")]
    pub command: String,

    #[serde(default = "default_catalog_package")]
    pub package: String,

    #[serde(default)]
    pub gms_url: String,

    #[serde(default)]
    pub token: String,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: default_command(),
            package: default_catalog_package(),
            gms_url: String::new(),
            token: String::new(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_catalog_package() -> String {
    "@acryldata/mcp-server-datahub".to_string()
}

impl CatalogConfig {
    pub fn process_spec(&self) -> ProcessSpec {
        let spec = ProcessSpec::new("datahub", &self.command)
            .arg(&self.package)
            .env("DATAHUB_GMS_URL", &self.gms_url);
        if self.token.is_empty() {
            spec
        } else {
            spec.env("DATAHUB_TOKEN", &self.token)
        }
    }
}

/// Retry behaviour of one subprocess backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_call_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Wait after spawning before the first request.
    #[serde(default = "default_startup_delay_ms")]
    pub startup_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_call_timeout(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            startup_delay_ms: default_startup_delay_ms(),
        }
    }
}

fn default_call_timeout() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    1000
}

fn default_startup_delay_ms() -> u64 {
    1000
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_call_timeout(Duration::from_secs(self.timeout_secs))
            .with_max_attempts(self.max_attempts)
            .with_backoff(Duration::from_millis(self.backoff_ms))
            .with_startup_delay(Duration::from_millis(self.startup_delay_ms))
    }
}

/// Facebook page or Instagram account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSourceConfig {
    /// Off unless credentials are configured.
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_graph_url")]
    pub api_url: String,

    #[serde(default = "default_graph_version")]
    pub api_version: String,

    /// Page id (Facebook) or business account id (Instagram).
    #[serde(default)]
    pub object_id: String,

    #[serde(default)]
    pub access_token: String,

    #[serde(default = "default_max_comments")]
    pub max_comments: usize,

    #[serde(default = "default_graph_rpm")]
    pub requests_per_minute: u32,

    /// Used when a request brings no keywords.
    #[serde(default)]
    pub default_keywords: Vec<String>,
}

impl Default for GraphSourceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: default_graph_url(),
            api_version: default_graph_version(),
            object_id: String::new(),
            access_token: String::new(),
            max_comments: default_max_comments(),
            requests_per_minute: default_graph_rpm(),
            default_keywords: Vec::new(),
        }
    }
}

fn default_graph_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_graph_version() -> String {
    "v18.0".to_string()
}

fn default_max_comments() -> usize {
    1000
}

fn default_graph_rpm() -> u32 {
    200
}

impl GraphSourceConfig {
    pub fn graph_config(&self) -> GraphConfig {
        GraphConfig {
            api_url: self.api_url.clone(),
            api_version: self.api_version.clone(),
            object_id: self.object_id.clone(),
            access_token: self.access_token.clone(),
        }
    }
}

/// Reddit API credentials and the default thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedditSourceConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_reddit_api_url")]
    pub api_url: String,

    #[serde(default = "default_reddit_auth_url")]
    pub auth_url: String,

    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub user_agent: Option<String>,

    #[serde(default)]
    pub thread_url: Option<String>,

    #[serde(default = "default_max_comments")]
    pub max_comments: usize,

    #[serde(default = "default_reddit_rpm")]
    pub requests_per_minute: u32,

    #[serde(default)]
    pub default_keywords: Vec<String>,
}

impl Default for RedditSourceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: default_reddit_api_url(),
            auth_url: default_reddit_auth_url(),
            client_id: String::new(),
            client_secret: String::new(),
            username: String::new(),
            password: String::new(),
            user_agent: None,
            thread_url: None,
            max_comments: default_max_comments(),
            requests_per_minute: default_reddit_rpm(),
            default_keywords: Vec::new(),
        }
    }
}

fn default_reddit_api_url() -> String {
    "https://oauth.reddit.com".to_string()
}

fn default_reddit_auth_url() -> String {
    "https://www.reddit.com".to_string()
}

fn default_reddit_rpm() -> u32 {
    60
}

impl RedditSourceConfig {
    pub fn reddit_config(&self) -> RedditConfig {
        let defaults = RedditConfig::default();
        RedditConfig {
            api_url: self.api_url.clone(),
            auth_url: self.auth_url.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
            thread_url: self.thread_url.clone(),
        }
    }
}

/// Feedback analyzer. Without an endpoint the offline digest is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Chat endpoint base URL, e.g. `http://localhost:11434`.
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_analyzer_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_analyzer_rpm")]
    pub requests_per_minute: u32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_analyzer_timeout(),
            requests_per_minute: default_analyzer_rpm(),
        }
    }
}

fn default_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_analyzer_timeout() -> u64 {
    120
}

fn default_analyzer_rpm() -> u32 {
    60
}

impl AnalyzerConfig {
    /// Chat model settings, when an endpoint is configured.
    pub fn llm_config(&self) -> Option<LlmConfig> {
        let endpoint = self.endpoint.as_ref().filter(|e| !e.trim().is_empty())?;
        Some(LlmConfig {
            endpoint: endpoint.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            timeout: Duration::from_secs(self.timeout_secs),
            ..LlmConfig::default()
        })
    }
}

/// Outbound HTTP timeouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    30
}

impl HttpConfig {
    pub fn settings(&self) -> HttpSettings {
        HttpSettings {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

/// Score weights and assessment thresholds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub weights: ScoreWeights,

    #[serde(default)]
    pub thresholds: HealthThresholds,
}

impl AppConfig {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load `path` if given, else `feature-pulse.toml` if present, else
    /// defaults; then apply the process environment.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::load(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env_from(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override settings from environment-style variables.
    ///
    /// `lookup` is `std::env::var` in production; tests pass a map.
    /// Supplying credentials for a social source enables it.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("PULSE_CORE_POOL_SIZE").and_then(|v| v.parse().ok()) {
            self.executor.core_size = v;
        }
        if let Some(v) = get("PULSE_MAX_POOL_SIZE").and_then(|v| v.parse().ok()) {
            self.executor.max_size = v;
        }
        if let Some(v) = get("PULSE_QUEUE_CAPACITY").and_then(|v| v.parse().ok()) {
            self.executor.queue_capacity = v;
        }
        if let Some(v) = get("PULSE_OVERALL_DEADLINE_SECS").and_then(|v| v.parse().ok()) {
            self.executor.overall_deadline_secs = Some(v);
        }

        let engine = &mut self.query_engine;
        if let Some(v) = get("VERTICA_HOST") {
            engine.host = v;
        }
        if let Some(v) = get("VERTICA_PORT").and_then(|v| v.parse().ok()) {
            engine.port = v;
        }
        if let Some(v) = get("VERTICA_DATABASE") {
            engine.database = v;
        }
        if let Some(v) = get("VERTICA_USERNAME") {
            engine.username = v;
        }
        if let Some(v) = get("VERTICA_PASSWORD") {
            engine.password = v;
        }

        if let Some(v) = get("DATAHUB_GMS_URL") {
            self.catalog.gms_url = v;
            self.catalog.enabled = true;
        }
        if let Some(v) = get("DATAHUB_TOKEN") {
            self.catalog.token = v;
        }

        if let (Some(page), Some(token)) = (get("FACEBOOK_PAGE_ID"), get("FACEBOOK_ACCESS_TOKEN")) {
            self.facebook.object_id = page;
            self.facebook.access_token = token;
            self.facebook.enabled = true;
        }
        if let (Some(user), Some(token)) = (
            get("INSTAGRAM_USER_ID"),
            get("INSTAGRAM_ACCESS_TOKEN"),
        ) {
            self.instagram.object_id = user;
            self.instagram.access_token = token;
            self.instagram.enabled = true;
        }

        let reddit = &mut self.reddit;
        if let (Some(id), Some(secret)) = (get("REDDIT_CLIENT_ID"), get("REDDIT_CLIENT_SECRET")) {
            reddit.client_id = id;
            reddit.client_secret = secret;
            reddit.enabled = true;
        }
        if let Some(v) = get("REDDIT_USERNAME") {
            reddit.username = v;
        }
        if let Some(v) = get("REDDIT_PASSWORD") {
            reddit.password = v;
        }
        if let Some(v) = get("REDDIT_THREAD_URL") {
            reddit.thread_url = Some(v);
        }

        if let Some(v) = get("PULSE_LLM_ENDPOINT") {
            self.analyzer.endpoint = Some(v);
        }
        if let Some(v) = get("PULSE_LLM_MODEL") {
            self.analyzer.model = v;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> Result<String> {
        toml::to_string_pretty(&AppConfig::default()).context("Failed to render default config")
    }
}
