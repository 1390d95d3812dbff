//! Social feedback source: a comment fetcher paired with an analyzer.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use crate::error::Result;
use crate::traits::{CommentFetcher, FeedbackAnalyzer, SourceFetcher};
use crate::types::{FetchCriteria, FetchResult, ResultKind, display_name};

/// Produces `FetchResult::TextAnalysis` for one platform.
pub struct SocialSource {
    name: String,
    fetcher: Arc<dyn CommentFetcher>,
    analyzer: Arc<dyn FeedbackAnalyzer>,
    default_keywords: Vec<String>,
    result_cap: Option<usize>,
}

impl SocialSource {
    /// Source named after the fetcher's platform.
    pub fn new(fetcher: Arc<dyn CommentFetcher>, analyzer: Arc<dyn FeedbackAnalyzer>) -> Self {
        Self {
            name: fetcher.platform().to_string(),
            fetcher,
            analyzer,
            default_keywords: Vec::new(),
            result_cap: None,
        }
    }

    /// Keywords used when a request brings none.
    pub fn with_default_keywords(mut self, keywords: Vec<String>) -> Self {
        self.default_keywords = keywords;
        self
    }

    /// Upper bound on comments per request, whatever the caller asks for.
    pub fn with_result_cap(mut self, cap: usize) -> Self {
        self.result_cap = Some(cap.max(1));
        self
    }
}

#[async_trait]
impl SourceFetcher for SocialSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResultKind {
        ResultKind::TextAnalysis
    }

    #[instrument(skip(self, criteria), fields(source = %self.name, feature = %criteria.feature_name))]
    async fn fetch(&self, criteria: &FetchCriteria) -> Result<FetchResult> {
        if let Some(reason) = self.fetcher.skip_reason(criteria) {
            info!("Skipping {}: {}", self.name, reason);
            return Ok(FetchResult::TextAnalysis(format!(
                "{} analysis skipped: {}",
                display_name(&self.name),
                reason
            )));
        }

        let use_defaults = criteria.keywords.is_empty() && !self.default_keywords.is_empty();
        let over_cap = self.result_cap.is_some_and(|cap| criteria.max_results > cap);

        let adjusted;
        let criteria = if use_defaults || over_cap {
            let mut owned = criteria.clone();
            if use_defaults {
                owned = owned.with_keywords(self.default_keywords.clone());
            }
            if let Some(cap) = self.result_cap.filter(|_| over_cap) {
                owned = owned.with_max_results(cap);
            }
            adjusted = owned;
            &adjusted
        } else {
            criteria
        };

        let comments = self.fetcher.fetch_comments(criteria).await?;
        info!("Collected {} comments, analyzing with {}", comments.len(), self.analyzer.name());

        let analysis = self
            .analyzer
            .analyze(self.fetcher.platform(), criteria, &comments)
            .await?;
        Ok(FetchResult::TextAnalysis(analysis))
    }
}
