//! Core types shared by every source.

use serde::{Deserialize, Serialize};

/// Default cap on comments fetched per source.
pub const DEFAULT_MAX_RESULTS: usize = 100;

/// What a caller asks every source for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchCriteria {
    /// Identifier used by the metrics backend (e.g. "checkout_v2").
    pub feature_id: String,

    /// Human-readable name, also the primary search term.
    pub feature_name: String,

    /// Extra search terms.
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Upper bound on items collected per source.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Discussion thread to read, for sources that need one.
    #[serde(default)]
    pub thread_url: Option<String>,
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

impl FetchCriteria {
    pub fn new(feature_id: impl Into<String>, feature_name: impl Into<String>) -> Self {
        Self {
            feature_id: feature_id.into(),
            feature_name: feature_name.into(),
            keywords: Vec::new(),
            max_results: DEFAULT_MAX_RESULTS,
            thread_url: None,
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

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_thread_url(mut self, thread_url: impl Into<String>) -> Self {
        self.thread_url = Some(thread_url.into());
        self
    }

    /// Feature name followed by keywords: lowercased, trimmed, blanks and
    /// duplicates removed, first occurrence order kept.
    pub fn search_terms(&self) -> Vec<String> {
        let mut terms: Vec<String> = Vec::with_capacity(self.keywords.len() + 1);
        for raw in std::iter::once(&self.feature_name).chain(self.keywords.iter()) {
            let term = raw.trim().to_lowercase();
            if !term.is_empty() && !terms.contains(&term) {
                terms.push(term);
            }
        }
        terms
    }

    /// Whether `text` mentions any search term. With no terms everything
    /// matches.
    pub fn matches(&self, text: &str) -> bool {
        matches_terms(text, &self.search_terms())
    }
}

/// Case-insensitive substring match of `text` against pre-lowercased
/// `terms`.
pub fn matches_terms(text: &str, terms: &[String]) -> bool {
    if terms.is_empty() {
        return true;
    }
    let text = text.to_lowercase();
    terms.iter().any(|term| text.contains(term.as_str()))
}

/// `"facebook"` -> `"Facebook"`, for headings and messages.
pub fn display_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Internal usage numbers for one feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMetrics {
    pub feature_id: String,
    pub purchase_count: u64,
    pub login_count: u64,
    pub avg_session_minutes: f64,

    /// Dataset description from the metadata catalog, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_description: Option<String>,
}

impl FeatureMetrics {
    /// Placeholder used when the metrics source failed.
    pub fn zeroed(feature_id: impl Into<String>) -> Self {
        Self {
            feature_id: feature_id.into(),
            purchase_count: 0,
            login_count: 0,
            avg_session_minutes: 0.0,
            dataset_description: None,
        }
    }

    /// One-line summary, e.g. `Purchases: 10, Logins: 20, Avg Session Duration: 3.50 min`.
    pub fn summary(&self) -> String {
        format!(
            "Purchases: {}, Logins: {}, Avg Session Duration: {:.2} min",
            self.purchase_count, self.login_count, self.avg_session_minutes
        )
    }
}

/// Which variant of `FetchResult` a source produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    TextAnalysis,
    Metrics,
}

/// Successful output of one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FetchResult {
    /// Free-text feedback analysis.
    TextAnalysis(String),
    /// Quantitative usage metrics.
    Metrics(FeatureMetrics),
}

impl FetchResult {
    pub fn kind(&self) -> ResultKind {
        match self {
            FetchResult::TextAnalysis(_) => ResultKind::TextAnalysis,
            FetchResult::Metrics(_) => ResultKind::Metrics,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FetchResult::TextAnalysis(text) => Some(text),
            FetchResult::Metrics(_) => None,
        }
    }

    pub fn as_metrics(&self) -> Option<&FeatureMetrics> {
        match self {
            FetchResult::Metrics(metrics) => Some(metrics),
            FetchResult::TextAnalysis(_) => None,
        }
    }
}

/// A user comment collected from a social platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Comment {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            author: None,
            created_at: None,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }
}
