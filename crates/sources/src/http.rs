//! Shared HTTP plumbing for API-backed sources.

use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Result, SourceError};
use crate::rate_limit::TokenBucket;

/// Timeouts applied to every outbound HTTP call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpSettings {
    pub connect_timeout: Duration,
    /// Bound on the whole request, body included.
    pub request_timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl HttpSettings {
    pub fn build_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .build()
            .map_err(SourceError::from)
    }
}

/// Wait for a token, send, check the status, decode the JSON body.
pub(crate) async fn send_json<T: DeserializeOwned>(
    limiter: &TokenBucket,
    request: reqwest::RequestBuilder,
    what: &str,
) -> Result<T> {
    limiter.acquire().await;
    debug!(limiter = %limiter.name(), "sending {} request", what);

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SourceError::Http(format!(
            "{} returned {}: {}",
            what,
            status,
            truncate(&body, 200)
        )));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| SourceError::Decode(format!("{}: {}", what, e)))
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
