//! Comment fetcher for Graph-style social APIs (Facebook pages, Instagram
//! business accounts).
//!
//! ## Algorithm
//! 1. GET `{api}/{version}/{object}/{edge}` with embedded comments
//! 2. Keep comments whose text mentions a search term
//! 3. Follow each item's comment `paging.next`, then the item list's own
//!    `paging.next`, until `max_results` comments are collected
//!
//! Every page costs one token from the platform's bucket.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::error::{Result, SourceError};
use crate::http::{HttpSettings, send_json};
use crate::rate_limit::TokenBucket;
use crate::traits::CommentFetcher;
use crate::types::{Comment, FetchCriteria, matches_terms};

/// Hard stop on pagination, whatever the API keeps returning.
const MAX_PAGES: usize = 50;
const PAGE_SIZE: &str = "100";

/// Which Graph API flavour to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphPlatform {
    Facebook,
    Instagram,
}

impl GraphPlatform {
    pub fn name(&self) -> &'static str {
        match self {
            GraphPlatform::Facebook => "facebook",
            GraphPlatform::Instagram => "instagram",
        }
    }

    fn edge(&self) -> &'static str {
        match self {
            GraphPlatform::Facebook => "posts",
            GraphPlatform::Instagram => "media",
        }
    }

    fn fields(&self) -> &'static str {
        match self {
            GraphPlatform::Facebook => {
                "id,message,created_time,comments{id,message,created_time,from}"
            }
            GraphPlatform::Instagram => {
                "id,caption,timestamp,media_type,comments{id,text,timestamp,from}"
            }
        }
    }
}

/// Connection details for one Graph account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphConfig {
    pub api_url: String,
    /// Path segment such as `v18.0`; empty to omit.
    pub api_version: String,
    /// Page id (Facebook) or user id (Instagram).
    pub object_id: String,
    pub access_token: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            api_url: "https://graph.facebook.com".to_string(),
            api_version: "v18.0".to_string(),
            object_id: String::new(),
            access_token: String::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct Paging {
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(default)]
    comments: Option<Page<GraphComment>>,
}

#[derive(Debug, Deserialize)]
struct GraphComment {
    #[serde(default)]
    id: String,
    #[serde(default, alias = "text")]
    message: Option<String>,
    #[serde(default, alias = "timestamp")]
    created_time: Option<String>,
    #[serde(default)]
    from: Option<Author>,
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Author {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    username: Option<String>,
}

impl GraphComment {
    fn into_comment(self) -> Option<Comment> {
        let text = self.message?;
        let author = self
            .from
            .and_then(|from| from.name.or(from.username))
            .or(self.username);
        Some(Comment {
            id: self.id,
            text,
            author,
            created_at: self.created_time,
        })
    }
}

/// Collects comments from one Facebook page or Instagram account.
pub struct GraphCommentFetcher {
    platform: GraphPlatform,
    config: GraphConfig,
    http: reqwest::Client,
    limiter: Arc<TokenBucket>,
}

impl GraphCommentFetcher {
    pub fn new(
        platform: GraphPlatform,
        config: GraphConfig,
        settings: &HttpSettings,
        limiter: Arc<TokenBucket>,
    ) -> Result<Self> {
        Ok(Self {
            platform,
            config,
            http: settings.build_client()?,
            limiter,
        })
    }

    fn first_page(&self) -> reqwest::RequestBuilder {
        let mut url = self.config.api_url.trim_end_matches('/').to_string();
        for segment in [
            self.config.api_version.as_str(),
            self.config.object_id.as_str(),
            self.platform.edge(),
        ] {
            let segment = segment.trim_matches('/');
            if !segment.is_empty() {
                url.push('/');
                url.push_str(segment);
            }
        }

        self.http.get(url).query(&[
            ("fields", self.platform.fields()),
            ("limit", PAGE_SIZE),
            ("access_token", self.config.access_token.as_str()),
        ])
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        send_json(&self.limiter, request, self.platform.name()).await
    }
}

/// Move matching comments into `out`. Returns true once `out` is full.
fn collect(
    batch: Vec<GraphComment>,
    terms: &[String],
    limit: usize,
    out: &mut Vec<Comment>,
) -> bool {
    for comment in batch.into_iter().filter_map(GraphComment::into_comment) {
        if out.len() >= limit {
            return true;
        }
        if matches_terms(&comment.text, terms) {
            out.push(comment);
        }
    }
    out.len() >= limit
}

#[async_trait]
impl CommentFetcher for GraphCommentFetcher {
    fn platform(&self) -> &str {
        self.platform.name()
    }

    #[instrument(skip(self, criteria), fields(platform = self.platform.name()))]
    async fn fetch_comments(&self, criteria: &FetchCriteria) -> Result<Vec<Comment>> {
        if self.config.access_token.is_empty() || self.config.object_id.is_empty() {
            return Err(SourceError::Disabled(format!(
                "{} credentials are not configured",
                self.platform.name()
            )));
        }

        let terms = criteria.search_terms();
        let limit = criteria.max_results;
        info!(
            "Fetching {} comments for feature '{}' with terms {:?}",
            self.platform.name(),
            criteria.feature_name,
            terms
        );

        let mut comments = Vec::new();
        let mut pages = 0;
        let mut next = Some(self.first_page());

        'items: while let Some(request) = next.take() {
            if pages >= MAX_PAGES || comments.len() >= limit {
                break;
            }
            pages += 1;
            let Page { data, paging } = self.get::<Page<Item>>(request).await?;

            for item in data {
                let Some(embedded) = item.comments else {
                    continue;
                };
                if collect(embedded.data, &terms, limit, &mut comments) {
                    break 'items;
                }

                let mut comment_next = embedded.paging.and_then(|p| p.next);
                while let Some(url) = comment_next.take() {
                    if pages >= MAX_PAGES {
                        break 'items;
                    }
                    pages += 1;
                    let page = self.get::<Page<GraphComment>>(self.http.get(url)).await?;
                    if collect(page.data, &terms, limit, &mut comments) {
                        break 'items;
                    }
                    comment_next = page.paging.and_then(|p| p.next);
                }
            }

            next = paging
                .and_then(|p| p.next)
                .map(|url| self.http.get(url));
        }

        info!(
            "Fetched {} {} comments from {} pages",
            comments.len(),
            self.platform.name(),
            pages
        );
        Ok(comments)
    }
}
