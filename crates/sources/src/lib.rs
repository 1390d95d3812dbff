//! # Sources Crate
//!
//! Data sources for feature health reports. Every source implements
//! `SourceFetcher`, one capability: `fetch(criteria) -> FetchResult`.
//!
//! ## Components
//!
//! ### QueryEngineMetricsSource (internal metrics)
//! Aggregate usage numbers from a query-engine subprocess, optionally
//! enriched from a metadata catalog subprocess.
//!
//! ### SocialSource (user feedback)
//! A `CommentFetcher` (Facebook, Instagram, Reddit) paired with a
//! `FeedbackAnalyzer` (chat model or offline digest).
//!
//! ### TokenBucket
//! Per-platform outbound rate limiting, shared across requests.
//!
//! ## Example Usage
//!
//! ```ignore
//! use sources::{DigestFeedbackAnalyzer, FetchCriteria, SocialSource, SourceFetcher};
//! use std::sync::Arc;
//!
//! let source = SocialSource::new(reddit_fetcher, Arc::new(DigestFeedbackAnalyzer));
//! let criteria = FetchCriteria::new("dark_mode", "Dark Mode").with_keywords(["theme"]);
//! let result = source.fetch(&criteria).await?;
//! ```

pub mod analytics;
pub mod analyzer;
pub mod error;
pub mod graph;
pub mod http;
pub mod probe;
pub mod rate_limit;
pub mod reddit;
pub mod social;
pub mod traits;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use analytics::QueryEngineMetricsSource;
pub use analyzer::{DigestFeedbackAnalyzer, LlmConfig, LlmFeedbackAnalyzer};
pub use error::{Result, SourceError};
pub use graph::{GraphCommentFetcher, GraphConfig, GraphPlatform};
pub use http::HttpSettings;
pub use probe::{ConnectionProbe, ProbeReport};
pub use rate_limit::TokenBucket;
pub use reddit::{RedditCommentFetcher, RedditConfig};
pub use social::SocialSource;
pub use traits::{CommentFetcher, FeedbackAnalyzer, SourceFetcher};
pub use types::{
    Comment, DEFAULT_MAX_RESULTS, FeatureMetrics, FetchCriteria, FetchResult, ResultKind,
    display_name,
};
pub use validation::validate_feature_id;
