//! Core traits for data sources.
//!
//! Every source, whatever its backend, is reached through `SourceFetcher`.
//! Social sources are composed from a `CommentFetcher` and a
//! `FeedbackAnalyzer`.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Comment, FetchCriteria, FetchResult, ResultKind};

/// One data source.
///
/// ## Design Note
/// - `Send + Sync` lets one instance serve concurrent requests
/// - Implementations own their authentication, pagination and rate limiting
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Stable name, used as the key in aggregate reports.
    fn name(&self) -> &str;

    /// Variant of `FetchResult` this source returns on success.
    fn kind(&self) -> ResultKind;

    /// Fetch data for one feature.
    ///
    /// # Arguments
    /// * `criteria` - Feature identity, search terms and result cap
    ///
    /// # Returns
    /// * `Ok(FetchResult)` - The source's output
    /// * `Err` - The source failed; callers decide how to degrade
    async fn fetch(&self, criteria: &FetchCriteria) -> Result<FetchResult>;
}

/// Collects raw comments from one platform.
#[async_trait]
pub trait CommentFetcher: Send + Sync {
    fn platform(&self) -> &str;

    /// Up to `criteria.max_results` comments matching the search terms.
    async fn fetch_comments(&self, criteria: &FetchCriteria) -> Result<Vec<Comment>>;

    /// Why this request should be skipped rather than fetched, if it
    /// lacks something the platform needs.
    fn skip_reason(&self, _criteria: &FetchCriteria) -> Option<String> {
        None
    }
}

/// Turns comments into a text analysis.
#[async_trait]
pub trait FeedbackAnalyzer: Send + Sync {
    fn name(&self) -> &str;

    async fn analyze(
        &self,
        platform: &str,
        criteria: &FetchCriteria,
        comments: &[Comment],
    ) -> Result<String>;
}
