//! Feedback analyzers: comments in, analysis text out.
//!
//! `DigestFeedbackAnalyzer` is deterministic and offline.
//! `LlmFeedbackAnalyzer` wraps a chat-completion endpoint (Ollama
//! `/api/chat` wire format); the model does the actual analysis.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, SourceError};
use crate::rate_limit::TokenBucket;
use crate::traits::FeedbackAnalyzer;
use crate::types::{Comment, FetchCriteria, display_name};

const DIGEST_QUOTE_LIMIT: usize = 10;
const QUOTE_MAX_CHARS: usize = 280;

fn no_comments(platform: &str, criteria: &FetchCriteria) -> String {
    format!(
        "SUMMARY: No {} comments mentioning \"{}\" were found.",
        display_name(platform),
        criteria.feature_name
    )
}

fn clip(text: &str, max: usize) -> String {
    let text = text.trim().replace('\n', " ");
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text,
    }
}

/// Counts and quotes comments without any model.
#[derive(Debug, Clone, Default)]
pub struct DigestFeedbackAnalyzer;

#[async_trait]
impl FeedbackAnalyzer for DigestFeedbackAnalyzer {
    fn name(&self) -> &str {
        "digest"
    }

    async fn analyze(
        &self,
        platform: &str,
        criteria: &FetchCriteria,
        comments: &[Comment],
    ) -> Result<String> {
        if comments.is_empty() {
            return Ok(no_comments(platform, criteria));
        }

        let terms = criteria.search_terms();
        let mut themes: Vec<(String, usize)> = terms
            .iter()
            .map(|term| {
                let hits = comments
                    .iter()
                    .filter(|c| c.text.to_lowercase().contains(term.as_str()))
                    .count();
                (term.clone(), hits)
            })
            .filter(|(_, hits)| *hits > 0)
            .collect();
        themes.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let mut out = format!(
            "SUMMARY: {} {} comments about \"{}\".\n",
            comments.len(),
            display_name(platform),
            criteria.feature_name
        );
        if !themes.is_empty() {
            let listed: Vec<String> = themes
                .iter()
                .map(|(term, hits)| format!("{} ({})", term, hits))
                .collect();
            out.push_str(&format!("KEY_THEMES: {}\n", listed.join(", ")));
        }
        out.push_str("COMMENTS:\n");
        for comment in comments.iter().take(DIGEST_QUOTE_LIMIT) {
            let author = comment.author.as_deref().unwrap_or("anonymous");
            out.push_str(&format!(
                "- \"{}\" ({})\n",
                clip(&comment.text, QUOTE_MAX_CHARS),
                author
            ));
        }
        if comments.len() > DIGEST_QUOTE_LIMIT {
            out.push_str(&format!(
                "- ... and {} more\n",
                comments.len() - DIGEST_QUOTE_LIMIT
            ));
        }
        Ok(out.trim_end().to_string())
    }
}

/// Settings for the chat endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
    /// Comments included in one prompt.
    pub max_prompt_comments: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.2:latest".to_string(),
            temperature: 0.2,
            timeout: Duration::from_secs(120),
            max_prompt_comments: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

const SYSTEM_PROMPT: &str = "You analyze user comments about a product feature. \
Identify sentiment, key themes, positive highlights and negative concerns. \
Answer in plain text with the sections SUMMARY, KEY_THEMES, POSITIVE_HIGHLIGHTS \
and NEGATIVE_HIGHLIGHTS.";

/// Prompt/response wrapper around an external chat model.
pub struct LlmFeedbackAnalyzer {
    config: LlmConfig,
    http: reqwest::Client,
    limiter: Option<Arc<TokenBucket>>,
}

impl LlmFeedbackAnalyzer {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            config,
            http,
            limiter: None,
        })
    }

    /// Acquire a token from `limiter` before every chat request.
    pub fn with_limiter(mut self, limiter: Arc<TokenBucket>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// User prompt for one platform's comments.
    pub fn build_prompt(&self, platform: &str, criteria: &FetchCriteria, comments: &[Comment]) -> String {
        let mut prompt = format!(
            "Analyze user feedback from {} about the feature: \"{}\"\n\n",
            display_name(platform),
            criteria.feature_name
        );
        if !criteria.keywords.is_empty() {
            prompt.push_str(&format!(
                "Focus on comments containing these keywords: {}\n\n",
                criteria.keywords.join(", ")
            ));
        }
        prompt.push_str("Provide:\n");
        prompt.push_str("1. SUMMARY: Overall sentiment and key findings\n");
        prompt.push_str("2. KEY_THEMES: Main topics discussed\n");
        prompt.push_str("3. POSITIVE_HIGHLIGHTS: What users appreciate\n");
        prompt.push_str("4. NEGATIVE_HIGHLIGHTS: Concerns and improvement requests\n\n");
        prompt.push_str("=== COMMENTS ===\n");
        for comment in comments.iter().take(self.config.max_prompt_comments) {
            prompt.push_str(&format!("- {}\n", clip(&comment.text, 1000)));
        }
        prompt.push_str("=== END OF COMMENTS ===\n");
        prompt
    }
}

#[async_trait]
impl FeedbackAnalyzer for LlmFeedbackAnalyzer {
    fn name(&self) -> &str {
        "llm"
    }

    async fn analyze(
        &self,
        platform: &str,
        criteria: &FetchCriteria,
        comments: &[Comment],
    ) -> Result<String> {
        if comments.is_empty() {
            return Ok(no_comments(platform, criteria));
        }

        let url = format!("{}/api/chat", self.config.endpoint.trim_end_matches('/'));
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: self.build_prompt(platform, criteria, comments),
                },
            ],
            stream: false,
            options: ChatOptions {
                temperature: self.config.temperature,
            },
        };

        info!(
            "Analyzing {} {} comments with model {}",
            comments.len(),
            platform,
            self.config.model
        );
        if let Some(limiter) = &self.limiter {
            limiter.acquire().await;
        }
        let response = self.http.post(&url).json(&request).send().await.map_err(|e| {
            if e.is_connect() {
                SourceError::Unavailable(format!("cannot reach analyzer at {}", self.config.endpoint))
            } else {
                SourceError::from(e)
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Http(format!("analyzer returned {}: {}", status, body)));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Decode(format!("analyzer response: {}", e)))?;
        debug!("analyzer answered {} chars", chat.message.content.len());

        let text = chat.message.content.trim().to_string();
        if text.is_empty() {
            return Err(SourceError::Unavailable("analyzer returned an empty answer".into()));
        }
        Ok(text)
    }
}
