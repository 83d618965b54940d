use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use httpmock::{Method::POST, MockServer};
use serde_json::{Value, json};
use talkrelay::{
    api::{AppState, create_router},
    config::Settings,
    llm::{LlmClient, OpenAiClient},
    processing::{FALLBACK_REPLY, PLACEHOLDER_REPLY, SUMMARY_PREFIX},
};
use tempfile::TempDir;
use tower::ServiceExt;

struct TestHarness {
    router: Router,
    _log_dir: TempDir,
}

impl TestHarness {
    fn new(provider: &MockServer, api_key: &str) -> Self {
        let log_dir = tempfile::tempdir().expect("tempdir");
        let settings = Settings {
            openai_api_key: api_key.to_string(),
            openai_base_url: provider.url("/v1"),
            log_file: log_dir.path().join("app.log"),
            log_rotation: "never".into(),
            ..Settings::default()
        };

        let client = OpenAiClient::new(settings.openai_base_url.clone(), Duration::from_secs(5))
            .expect("openai client");
        let llm: Arc<dyn LlmClient> = Arc::new(client);
        llm.initialize(&settings.openai_api_key);

        Self {
            router: create_router(AppState::new(settings, llm)),
            _log_dir: log_dir,
        }
    }

    async fn call(&self, uri: &str, auth: bool, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(Method::POST).uri(uri);
        if auth {
            let token = STANDARD.encode("admin:password123");
            builder = builder.header(header::AUTHORIZATION, format!("Basic {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(uri, false, Some(body)).await
    }

    async fn admin(&self, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.call(uri, true, body).await
    }
}

fn message_payload() -> Value {
    json!({ "room": "r", "sender": "s", "message": "hello", "isGroupChat": false })
}

#[tokio::test]
async fn message_round_trip_through_provider() {
    let provider = MockServer::start_async().await;
    let completion = provider
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("authorization", "Bearer sk-integration")
                .body_contains("정확히 3줄로")
                .body_contains("hello");
            then.status(200).json_body(json!({
                "choices": [
                    { "message": { "role": "assistant", "content": "인사를 건넸습니다." } }
                ]
            }));
        })
        .await;
    let harness = TestHarness::new(&provider, "sk-integration");

    let (status, body) = harness.post("/webhook/message", message_payload()).await;

    completion.assert_async().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let expected = format!("{SUMMARY_PREFIX}인사를 건넸습니다.");
    assert_eq!(body["message"], expected);
    assert_eq!(body["model_used"], "gpt-4o-mini");
}

#[tokio::test]
async fn provider_errors_are_embedded_in_the_reply() {
    let provider = MockServer::start_async().await;
    provider
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(429).json_body(json!({
                "error": { "message": "Rate limit reached for requests" }
            }));
        })
        .await;
    let harness = TestHarness::new(&provider, "sk-integration");

    let (status, body) = harness.post("/webhook/message", message_payload()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let message = body["message"].as_str().expect("message");
    assert!(message.starts_with("요약 처리 중 오류가 발생했습니다"));
    assert!(message.contains("Rate limit reached for requests"));
}

#[tokio::test]
async fn malformed_provider_payload_falls_back() {
    let provider = MockServer::start_async().await;
    provider
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).body("not json");
        })
        .await;
    let harness = TestHarness::new(&provider, "sk-integration");

    let (status, body) = harness.post("/webhook/message", message_payload()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], FALLBACK_REPLY);
    assert!(body["model_used"].is_null());
    assert!(body["processing_time"].as_f64().expect("time") >= 0.0);
}

#[tokio::test]
async fn admin_key_rotation_enables_the_pipeline() {
    let provider = MockServer::start_async().await;
    let completion = provider
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("authorization", "Bearer sk-rotated")
                .json_body_partial(r#"{"model":"gpt-4o","max_tokens":128}"#);
            then.status(200).json_body(json!({
                "choices": [{ "message": { "content": "회전된 키로 요약" } }]
            }));
        })
        .await;
    let harness = TestHarness::new(&provider, "");

    let (_, before) = harness.post("/webhook/message", message_payload()).await;
    assert_eq!(before["message"], PLACEHOLDER_REPLY);
    assert!(before["model_used"].is_null());

    let update = json!({ "api_key": "sk-rotated", "model": "gpt-4o", "max_tokens": 128 });
    let (status, update) = harness.admin("/admin/config/openai", Some(update)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(update["openai_available"], true);

    let (_, after) = harness.post("/webhook/message", message_payload()).await;
    completion.assert_async().await;
    let expected = format!("{SUMMARY_PREFIX}회전된 키로 요약");
    assert_eq!(after["message"], expected);
    assert_eq!(after["model_used"], "gpt-4o");
}

#[tokio::test]
async fn admin_connection_test_hits_provider() {
    let provider = MockServer::start_async().await;
    provider
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .json_body_partial(r#"{"max_tokens":10}"#);
            then.status(200).json_body(json!({
                "choices": [{ "message": { "content": "안녕하세요!" } }]
            }));
        })
        .await;
    let harness = TestHarness::new(&provider, "sk-integration");

    let (status, body) = harness.admin("/admin/test/openai", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["response"], "안녕하세요!");
    assert!(body["response_time_ms"].as_f64().expect("timing") >= 0.0);
}
