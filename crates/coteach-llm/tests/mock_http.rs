//! Mock HTTP server tests for `OpenAiCompatProvider::complete()`.
//!
//! Uses [`wiremock`] to stand up a local server that emulates an
//! OpenAI-compatible chat completion endpoint.

use std::time::Duration;

use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use coteach_llm::{
    ChatMessage, ChatRequest, OpenAiCompatProvider, Provider, ProviderConfig, ProviderError,
};

fn mock_config(server_url: &str) -> ProviderConfig {
    ProviderConfig::new("mock-provider", server_url, "COTEACH_MOCK_UNUSED_KEY")
}

fn test_request() -> ChatRequest {
    ChatRequest::new("gpt-5-mini", vec![ChatMessage::user("Hello")])
}

fn provider(server: &MockServer) -> OpenAiCompatProvider {
    OpenAiCompatProvider::with_api_key(mock_config(&server.uri()), "sk-mock-key".into())
}

// ── Successful completion ──────────────────────────────────────────────

#[tokio::test]
async fn complete_success_text_response() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "id": "chatcmpl-test-001",
        "object": "chat.completion",
        "model": "gpt-5-mini",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": "Try a calm-down corner."},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 8, "total_tokens": 18}
    });

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer sk-mock-key"))
        .and(header("Content-Type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .expect(1)
        .mount(&server)
        .await;

    let response = provider(&server).complete(&test_request()).await.unwrap();

    assert_eq!(response.id, "chatcmpl-test-001");
    assert_eq!(response.text(), Some("Try a calm-down corner."));
    let usage = response.usage.unwrap();
    assert_eq!(usage.prompt_tokens, 10);
    assert_eq!(usage.completion_tokens, 8);
}

#[tokio::test]
async fn complete_sends_request_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "model": "gpt-5-mini",
            "max_tokens": 200,
            "temperature": 0.3,
            "messages": [
                {"role": "system", "content": "classify"},
                {"role": "user", "content": "Hello"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "x", "model": "gpt-5-mini",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "ok"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = ChatRequest::new(
        "gpt-5-mini",
        vec![ChatMessage::system("classify"), ChatMessage::user("Hello")],
    )
    .with_max_tokens(200)
    .with_temperature(0.3);

    let response = provider(&server).complete(&request).await.unwrap();
    assert_eq!(response.text(), Some("ok"));
    assert!(response.usage.is_none());
}

#[tokio::test]
async fn complete_forwards_custom_headers() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("x-school", "ridgeview"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "x", "model": "m", "choices": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = mock_config(&server.uri());
    config.headers.insert("x-school".into(), "ridgeview".into());
    let provider = OpenAiCompatProvider::with_api_key(config, "sk".into());

    let response = provider.complete(&test_request()).await.unwrap();
    assert!(response.choices.is_empty());
    assert_eq!(response.text(), None);
}

// ── Error mapping ──────────────────────────────────────────────────────

#[tokio::test]
async fn complete_401_returns_auth_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let err = provider(&server).complete(&test_request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::AuthFailed(ref b) if b == "bad key"));
}

#[tokio::test]
async fn complete_429_returns_rate_limited_with_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "2"))
        .mount(&server)
        .await;

    let err = provider(&server).complete(&test_request()).await.unwrap_err();
    match err {
        ProviderError::RateLimited { retry_after_ms } => assert_eq!(retry_after_ms, 2000),
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[tokio::test]
async fn complete_429_quota_exhausted_is_request_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
            "error": {"message": "credits exhausted", "code": "insufficient_quota"}
        })))
        .mount(&server)
        .await;

    let err = provider(&server).complete(&test_request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::RequestFailed(ref m) if m == "credits exhausted"));
}

#[tokio::test]
async fn complete_404_returns_model_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such model"))
        .mount(&server)
        .await;

    let err = provider(&server).complete(&test_request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::ModelNotFound(ref m) if m.contains("gpt-5-mini")));
}

#[tokio::test]
async fn complete_500_returns_request_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = provider(&server).complete(&test_request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::RequestFailed(ref m) if m.contains("500")));
}

#[tokio::test]
async fn complete_malformed_json_returns_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&server)
        .await;

    let err = provider(&server).complete(&test_request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::InvalidResponse(_)));
}

#[tokio::test]
async fn complete_slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(3))
                .set_body_json(serde_json::json!({"id": "x", "model": "m", "choices": []})),
        )
        .mount(&server)
        .await;

    let config = mock_config(&server.uri()).with_timeout_secs(1);
    let provider = OpenAiCompatProvider::with_api_key(config, "sk".into());
    let err = provider.complete(&test_request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::Timeout));
}

#[tokio::test]
async fn complete_missing_api_key_returns_not_configured() {
    let server = MockServer::start().await;
    let config = ProviderConfig::new(
        "mock-provider",
        server.uri(),
        "COTEACH_MOCK_KEY_NEVER_SET_4821",
    );
    let provider = OpenAiCompatProvider::new(config);
    let err = provider.complete(&test_request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::NotConfigured(_)));
}
