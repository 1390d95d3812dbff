//! Social fetchers and the chat analyzer against a local HTTP server.

mod common;

use std::sync::Arc;

use common::MockHttp;
use serde_json::json;
use sources::{
    CommentFetcher, DigestFeedbackAnalyzer, FeedbackAnalyzer, FetchCriteria, GraphCommentFetcher,
    GraphConfig, GraphPlatform, HttpSettings, LlmConfig, LlmFeedbackAnalyzer,
    RedditCommentFetcher, RedditConfig, SocialSource, SourceError, SourceFetcher, TokenBucket,
};

fn limiter(name: &str) -> Arc<TokenBucket> {
    Arc::new(TokenBucket::per_minute(name, 100))
}

fn graph_config(base_url: &str) -> GraphConfig {
    GraphConfig {
        api_url: base_url.to_string(),
        api_version: "v18.0".to_string(),
        object_id: "page1".to_string(),
        access_token: "tok".to_string(),
    }
}

/// Two pages of posts; the first post also has a second page of comments.
async fn facebook_server() -> MockHttp {
    MockHttp::start(|base, request| match request.path() {
        "/v18.0/page1/posts" => (
            200,
            json!({
                "data": [
                    {"id": "p1", "comments": {
                        "data": [
                            {"id": "1", "message": "Search is great", "from": {"name": "ann"}},
                            {"id": "2", "message": "unrelated"}
                        ],
                        "paging": {"next": format!("{}/comments-page-2", base)}
                    }},
                    {"id": "p2", "comments": {"data": [{"id": "3", "message": "search is slow"}]}},
                    {"id": "p3"}
                ],
                "paging": {"next": format!("{}/posts-page-2", base)}
            })
            .to_string(),
        ),
        "/comments-page-2" => (
            200,
            json!({"data": [{"id": "4", "message": "search crashes"}]}).to_string(),
        ),
        "/posts-page-2" => (
            200,
            json!({"data": [{"id": "p4", "comments": {"data": [
                {"id": "5", "message": "SEARCH docs are unclear"}
            ]}}]})
            .to_string(),
        ),
        _ => (404, json!({"error": "not found"}).to_string()),
    })
    .await
}

// ============================================================================
// Graph API
// ============================================================================

#[tokio::test]
async fn test_facebook_follows_comment_and_post_paging() {
    let server = facebook_server().await;
    let fetcher = GraphCommentFetcher::new(
        GraphPlatform::Facebook,
        graph_config(&server.base_url),
        &HttpSettings::default(),
        limiter("facebook"),
    )
    .unwrap();

    let comments = fetcher
        .fetch_comments(&FetchCriteria::new("search", "Search"))
        .await
        .expect("fetch should succeed");

    let ids: Vec<_> = comments.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "4", "3", "5"]);
    assert_eq!(comments[0].author.as_deref(), Some("ann"));

    let first = &server.recorded()[0];
    assert_eq!(first.method, "GET");
    assert!(first.target.contains("access_token=tok"));
    assert!(first.target.contains("limit=100"));
    assert_eq!(server.recorded().len(), 3);
}

#[tokio::test]
async fn test_facebook_stops_at_max_results() {
    let server = facebook_server().await;
    let fetcher = GraphCommentFetcher::new(
        GraphPlatform::Facebook,
        graph_config(&server.base_url),
        &HttpSettings::default(),
        limiter("facebook"),
    )
    .unwrap();

    let comments = fetcher
        .fetch_comments(&FetchCriteria::new("search", "Search").with_max_results(2))
        .await
        .unwrap();

    assert_eq!(comments.len(), 2);
    assert_eq!(server.count("/posts-page-2"), 0, "No page fetched past the cap");
}

#[tokio::test]
async fn test_instagram_reads_text_and_username() {
    let server = MockHttp::start(|_, request| match request.path() {
        "/v18.0/page1/media" => (
            200,
            json!({"data": [{"id": "m1", "caption": "new release", "comments": {"data": [
                {"id": "9", "text": "Love the dark mode", "username": "zed", "timestamp": "2024-05-01T10:00:00+0000"}
            ]}}]})
            .to_string(),
        ),
        _ => (404, "{}".to_string()),
    })
    .await;

    let fetcher = GraphCommentFetcher::new(
        GraphPlatform::Instagram,
        graph_config(&server.base_url),
        &HttpSettings::default(),
        limiter("instagram"),
    )
    .unwrap();
    let comments = fetcher
        .fetch_comments(&FetchCriteria::new("dm", "dark mode"))
        .await
        .unwrap();

    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].author.as_deref(), Some("zed"));
    assert_eq!(comments[0].created_at.as_deref(), Some("2024-05-01T10:00:00+0000"));
}

#[tokio::test]
async fn test_graph_error_status_is_http_error() {
    let server = MockHttp::start(|_, _| (500, r#"{"error":"boom"}"#.to_string())).await;
    let fetcher = GraphCommentFetcher::new(
        GraphPlatform::Facebook,
        graph_config(&server.base_url),
        &HttpSettings::default(),
        limiter("facebook"),
    )
    .unwrap();

    let err = fetcher
        .fetch_comments(&FetchCriteria::new("s", "Search"))
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::Http(ref msg) if msg.contains("500")), "Got {:?}", err);
}

#[tokio::test]
async fn test_graph_without_credentials_is_disabled() {
    let fetcher = GraphCommentFetcher::new(
        GraphPlatform::Facebook,
        GraphConfig::default(),
        &HttpSettings::default(),
        limiter("facebook"),
    )
    .unwrap();

    let err = fetcher
        .fetch_comments(&FetchCriteria::new("s", "Search"))
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::Disabled(_)));
}

// ============================================================================
// Reddit
// ============================================================================

fn reddit_config(base_url: &str) -> RedditConfig {
    RedditConfig {
        api_url: base_url.to_string(),
        auth_url: base_url.to_string(),
        client_id: "id".to_string(),
        client_secret: "secret".to_string(),
        username: "bot".to_string(),
        password: "pw".to_string(),
        ..RedditConfig::default()
    }
}

async fn reddit_server() -> MockHttp {
    MockHttp::start(|_, request| match request.path() {
        "/api/v1/access_token" => (
            200,
            json!({"access_token": "abc", "token_type": "bearer", "expires_in": 3600}).to_string(),
        ),
        "/comments/t123" => (
            200,
            json!([
                {"kind": "Listing", "data": {"children": [{"kind": "t3", "data": {"title": "Search"}}]}},
                {"kind": "Listing", "data": {"children": [
                    {"kind": "t1", "data": {"id": "r1", "body": "search is great", "author": "a", "replies": ""}},
                    {"kind": "t1", "data": {"id": "r2", "body": "meh", "author": "b"}}
                ]}}
            ])
            .to_string(),
        ),
        _ => (404, "{}".to_string()),
    })
    .await
}

#[tokio::test]
async fn test_reddit_token_is_cached() {
    let server = reddit_server().await;
    let fetcher = RedditCommentFetcher::new(
        reddit_config(&server.base_url),
        &HttpSettings::default(),
        limiter("reddit"),
    )
    .unwrap();
    let criteria = FetchCriteria::new("s", "Search")
        .with_thread_url("https://www.reddit.com/r/app/comments/t123/search_feedback/");

    for _ in 0..2 {
        let comments = fetcher.fetch_comments(&criteria).await.expect("fetch");
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].id, "r1");
    }

    assert_eq!(server.count("/api/v1/access_token"), 1, "Token fetched once");
    assert_eq!(server.count("/comments/t123"), 2);

    let recorded = server.recorded();
    let token_request = recorded.iter().find(|r| r.path() == "/api/v1/access_token").unwrap();
    assert_eq!(token_request.method, "POST");
    assert!(token_request.header("authorization").unwrap().starts_with("Basic "));
    assert!(token_request.body.contains("grant_type=password"));

    let comments_request = recorded.iter().find(|r| r.path() == "/comments/t123").unwrap();
    assert_eq!(comments_request.header("authorization"), Some("Bearer abc"));
    assert!(comments_request.target.contains("depth=10"));
}

#[tokio::test]
async fn test_reddit_rejected_token_is_unavailable() {
    let server = MockHttp::start(|_, _| (200, json!({"error": "invalid_grant"}).to_string())).await;
    let fetcher = RedditCommentFetcher::new(
        reddit_config(&server.base_url),
        &HttpSettings::default(),
        limiter("reddit"),
    )
    .unwrap();
    let criteria = FetchCriteria::new("s", "Search").with_thread_url("https://reddit.com/r/a/comments/t1/");

    let err = fetcher.fetch_comments(&criteria).await.unwrap_err();
    assert!(matches!(err, SourceError::Unavailable(ref msg) if msg.contains("invalid_grant")));
}

#[tokio::test]
async fn test_reddit_source_without_thread_is_skipped() {
    let server = reddit_server().await;
    let fetcher = RedditCommentFetcher::new(
        reddit_config(&server.base_url),
        &HttpSettings::default(),
        limiter("reddit"),
    )
    .unwrap();
    let source = SocialSource::new(Arc::new(fetcher), Arc::new(DigestFeedbackAnalyzer));

    let result = source.fetch(&FetchCriteria::new("s", "Search")).await.unwrap();
    assert_eq!(
        result.as_text(),
        Some("Reddit analysis skipped: No thread URL configured")
    );
    assert!(server.recorded().is_empty(), "Nothing is fetched when skipped");
}

// ============================================================================
// Chat analyzer
// ============================================================================

#[tokio::test]
async fn test_llm_analyzer_round_trip() {
    let server = MockHttp::start(|_, request| match request.path() {
        "/api/chat" => (
            200,
            json!({
                "model": "test-model",
                "message": {"role": "assistant", "content": "  SUMMARY: users love it  "},
                "done": true
            })
            .to_string(),
        ),
        _ => (404, "{}".to_string()),
    })
    .await;

    let bucket = limiter("llm");
    let analyzer = LlmFeedbackAnalyzer::new(LlmConfig {
        endpoint: server.base_url.clone(),
        model: "test-model".to_string(),
        ..LlmConfig::default()
    })
    .unwrap()
    .with_limiter(bucket.clone());

    let comments = vec![sources::Comment::new("1", "love the search")];
    let text = analyzer
        .analyze("facebook", &FetchCriteria::new("s", "Search"), &comments)
        .await
        .unwrap();
    assert_eq!(text, "SUMMARY: users love it");
    assert_eq!(bucket.available(), 99, "One token per chat request");

    let request = &server.recorded()[0];
    let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(body["model"], "test-model");
    assert_eq!(body["stream"], false);
    assert_eq!(body["messages"][0]["role"], "system");
    assert!(body["messages"][1]["content"].as_str().unwrap().contains("love the search"));
}

#[tokio::test]
async fn test_llm_analyzer_error_status() {
    let server = MockHttp::start(|_, _| (500, "model not loaded".to_string())).await;
    let analyzer = LlmFeedbackAnalyzer::new(LlmConfig {
        endpoint: server.base_url.clone(),
        ..LlmConfig::default()
    })
    .unwrap();

    let comments = vec![sources::Comment::new("1", "x")];
    let err = analyzer
        .analyze("reddit", &FetchCriteria::new("s", "Search"), &comments)
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::Http(_)));
}
