//! Comment fetcher for Reddit threads.
//!
//! ## Algorithm
//! 1. Obtain an OAuth token (password grant) unless a cached one is still
//!    valid; tokens are cached until 60s before they expire
//! 2. Extract the thread id from `/comments/<id>/` in the thread URL
//! 3. GET `{api}/comments/{id}?limit=100&depth=10`
//! 4. Walk the comment listing (element 1 of the response array), keeping
//!    `t1` children that mention a search term, replies included

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use crate::error::{Result, SourceError};
use crate::http::{HttpSettings, send_json};
use crate::rate_limit::TokenBucket;
use crate::traits::CommentFetcher;
use crate::types::{Comment, FetchCriteria, matches_terms};

const TOKEN_SAFETY_MARGIN: Duration = Duration::from_secs(60);
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

/// Credentials and endpoints for the Reddit API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedditConfig {
    /// Authenticated API base, e.g. `https://oauth.reddit.com`.
    pub api_url: String,
    /// Token endpoint base, e.g. `https://www.reddit.com`.
    pub auth_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub user_agent: String,
    /// Thread used when the request does not name one.
    pub thread_url: Option<String>,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            api_url: "https://oauth.reddit.com".to_string(),
            auth_url: "https://www.reddit.com".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            username: String::new(),
            password: String::new(),
            user_agent: concat!("feature-pulse/", env!("CARGO_PKG_VERSION")).to_string(),
            thread_url: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Collects comments from one Reddit thread.
pub struct RedditCommentFetcher {
    config: RedditConfig,
    http: reqwest::Client,
    limiter: Arc<TokenBucket>,
    token: Mutex<Option<CachedToken>>,
}

impl RedditCommentFetcher {
    pub fn new(config: RedditConfig, settings: &HttpSettings, limiter: Arc<TokenBucket>) -> Result<Self> {
        Ok(Self {
            config,
            http: settings.build_client()?,
            limiter,
            token: Mutex::new(None),
        })
    }

    fn thread_url<'a>(&'a self, criteria: &'a FetchCriteria) -> Option<&'a str> {
        criteria
            .thread_url
            .as_deref()
            .or(self.config.thread_url.as_deref())
            .filter(|url| !url.trim().is_empty())
    }

    /// Current token, refreshed when missing or about to expire.
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        info!("Obtaining new Reddit access token");
        let url = format!("{}/api/v1/access_token", self.config.auth_url.trim_end_matches('/'));
        let request = self
            .http
            .post(url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .header(reqwest::header::USER_AGENT, &self.config.user_agent)
            .form(&[
                ("grant_type", "password"),
                ("username", self.config.username.as_str()),
                ("password", self.config.password.as_str()),
            ]);
        let response: TokenResponse = send_json(&self.limiter, request, "reddit token").await?;

        let Some(value) = response.access_token else {
            return Err(SourceError::Unavailable(format!(
                "reddit token request rejected: {}",
                response.error.unwrap_or_else(|| "no access_token".to_string())
            )));
        };

        let lifetime = Duration::from_secs(response.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS));
        *cached = Some(CachedToken {
            value: value.clone(),
            refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_SAFETY_MARGIN),
        });
        Ok(value)
    }
}

#[async_trait]
impl CommentFetcher for RedditCommentFetcher {
    fn platform(&self) -> &str {
        "reddit"
    }

    #[instrument(skip(self, criteria))]
    async fn fetch_comments(&self, criteria: &FetchCriteria) -> Result<Vec<Comment>> {
        if self.config.client_id.is_empty() || self.config.client_secret.is_empty() {
            return Err(SourceError::Disabled(
                "reddit credentials are not configured".to_string(),
            ));
        }
        let Some(thread_url) = self.thread_url(criteria) else {
            return Err(SourceError::Validation("no Reddit thread URL given".to_string()));
        };
        let Some(thread_id) = extract_thread_id(thread_url) else {
            return Err(SourceError::Validation(format!(
                "invalid Reddit thread URL: {}",
                thread_url
            )));
        };

        let token = self.access_token().await?;
        info!(
            "Fetching Reddit comments for feature '{}' from thread {}",
            criteria.feature_name, thread_id
        );

        let url = format!(
            "{}/comments/{}",
            self.config.api_url.trim_end_matches('/'),
            thread_id
        );
        let request = self
            .http
            .get(url)
            .query(&[("limit", "100"), ("depth", "10")])
            .bearer_auth(token)
            .header(reqwest::header::USER_AGENT, &self.config.user_agent);
        let response: Value = send_json(&self.limiter, request, "reddit").await?;

        let listing = response
            .as_array()
            .and_then(|parts| parts.get(1))
            .ok_or_else(|| SourceError::Decode("reddit response has no comment listing".into()))?;

        let terms = criteria.search_terms();
        let mut comments = Vec::new();
        collect_listing(listing, &terms, criteria.max_results, &mut comments);

        info!("Fetched {} Reddit comments", comments.len());
        Ok(comments)
    }

    fn skip_reason(&self, criteria: &FetchCriteria) -> Option<String> {
        self.thread_url(criteria)
            .is_none()
            .then(|| "No thread URL configured".to_string())
    }
}

/// Thread id from `https://www.reddit.com/r/<sub>/comments/<id>/<slug>`.
pub fn extract_thread_id(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("/comments/")?;
    let id = rest.split(['/', '?', '#']).next()?;
    (!id.is_empty()).then_some(id)
}

fn collect_listing(listing: &Value, terms: &[String], limit: usize, out: &mut Vec<Comment>) {
    let Some(children) = listing
        .pointer("/data/children")
        .and_then(Value::as_array)
    else {
        return;
    };

    for child in children {
        if out.len() >= limit {
            return;
        }
        if child.get("kind").and_then(Value::as_str) != Some("t1") {
            continue;
        }
        let Some(data) = child.get("data") else {
            continue;
        };

        if let Some(body) = data.get("body").and_then(Value::as_str) {
            if matches_terms(body, terms) {
                out.push(Comment {
                    id: data.get("id").and_then(Value::as_str).unwrap_or_default().to_string(),
                    text: body.to_string(),
                    author: data.get("author").and_then(Value::as_str).map(str::to_string),
                    created_at: data
                        .get("created_utc")
                        .and_then(Value::as_f64)
                        .map(|ts| (ts as i64).to_string()),
                });
            }
        }

        // An empty `replies` is "", a populated one is a nested listing.
        if let Some(replies) = data.get("replies").filter(|r| r.is_object()) {
            debug!("descending into replies");
            collect_listing(replies, terms, limit, out);
        }
    }
}
