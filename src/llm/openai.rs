//! OpenAI chat-completions client.

use super::{AdapterError, ChatMessage, CompletionRequest, ConnectionReport, LlmClient, round2};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

const CONNECTION_TEST_PROMPT: &str = "안녕하세요";
const CONNECTION_TEST_MAX_TOKENS: u32 = 10;

/// Adapter issuing `POST {base_url}/chat/completions` with a bearer credential.
///
/// The credential lives behind a lock so the admin API can rebind it while requests are in
/// flight; each call clones the key it started with.
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: RwLock<Option<Arc<str>>>,
}

impl OpenAiClient {
    /// Build a client for `base_url` with the given transport timeout, initially disabled.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AdapterError> {
        let http = Client::builder()
            .user_agent(concat!("talkrelay/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: RwLock::new(None),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn current_key(&self) -> Option<Arc<str>> {
        self.api_key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn initialize(&self, api_key: &str) {
        let api_key = api_key.trim();
        let lock = self.api_key.write();
        let mut slot = lock.unwrap_or_else(PoisonError::into_inner);
        if api_key.is_empty() {
            *slot = None;
            tracing::warn!("OpenAI API key not configured; summarization disabled");
        } else {
            *slot = Some(Arc::from(api_key));
            tracing::info!(base_url = %self.base_url, "OpenAI client initialized");
        }
    }

    fn is_available(&self) -> bool {
        self.current_key().is_some()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, AdapterError> {
        let api_key = self.current_key().ok_or(AdapterError::NotConfigured)?;
        let body = ChatCompletionBody {
            model: &request.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        tracing::debug!(
            model = %request.model,
            max_tokens = request.max_tokens,
            messages = request.messages.len(),
            "Requesting chat completion"
        );
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key.as_ref())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&raw)
                .map(|envelope| envelope.error.message)
                .unwrap_or(raw);
            return Err(AdapterError::Provider { status, message });
        }

        let payload: ChatCompletionResponse = match response.json().await {
            Ok(payload) => payload,
            Err(error) => {
                let reason = format!("failed to decode completion: {error}");
                return Err(AdapterError::MalformedResponse(reason));
            }
        };
        let content = payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AdapterError::MalformedResponse("completion had no content".into()))?;

        Ok(content.trim().to_string())
    }

    async fn test_connection(&self, model: &str) -> ConnectionReport {
        if !self.is_available() {
            return ConnectionReport::failure("OpenAI API 키가 설정되지 않았습니다.");
        }

        let request = CompletionRequest {
            messages: vec![ChatMessage::user(CONNECTION_TEST_PROMPT)],
            model: model.to_string(),
            max_tokens: CONNECTION_TEST_MAX_TOKENS,
            temperature: None,
        };
        let started = Instant::now();
        let outcome = self.complete(request).await;
        let elapsed_ms = round2(started.elapsed().as_secs_f64() * 1000.0);

        match outcome {
            Ok(response) => ConnectionReport {
                success: true,
                message: "OpenAI API 연결 성공".into(),
                model: Some(model.to_string()),
                response_time_ms: Some(elapsed_ms),
                response: Some(response),
            },
            Err(error) => {
                tracing::warn!(%error, elapsed_ms, "OpenAI connection test failed");
                ConnectionReport::failure(format!("OpenAI API 연결 실패: {error}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    const OFFLINE_URL: &str = "http://127.0.0.1:1";

    fn client_for(server: &MockServer) -> OpenAiClient {
        let url = server.url("/v1");
        let client = OpenAiClient::new(url, Duration::from_secs(5)).expect("client");
        client.initialize("sk-test");
        client
    }

    fn offline_client() -> OpenAiClient {
        OpenAiClient::new(OFFLINE_URL, Duration::from_secs(1)).expect("client")
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            messages: vec![ChatMessage::system("be brief"), ChatMessage::user("hello")],
            model: "gpt-4o-mini".into(),
            max_tokens: 50,
            temperature: Some(0.5),
        }
    }

    #[test]
    fn initialize_tracks_credential_presence() {
        let client = offline_client();
        assert!(!client.is_available());
        client.initialize("sk-live");
        assert!(client.is_available());
        client.initialize("   ");
        assert!(!client.is_available());
    }

    #[tokio::test]
    async fn complete_returns_trimmed_content() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .header("authorization", "Bearer sk-test")
                    .json_body_partial(r#"{"model":"gpt-4o-mini","max_tokens":50}"#);
                then.status(200).json_body(json!({
                    "choices": [
                        { "message": { "role": "assistant", "content": "  요약입니다.\n" } }
                    ]
                }));
            })
            .await;

        let text = client_for(&server)
            .complete(request())
            .await
            .expect("completion");

        mock.assert_async().await;
        assert_eq!(text, "요약입니다.");
    }

    #[tokio::test]
    async fn provider_error_message_is_surfaced() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(401).json_body(json!({
                    "error": {
                        "message": "Incorrect API key provided",
                        "type": "invalid_request_error"
                    }
                }));
            })
            .await;

        let error = client_for(&server)
            .complete(request())
            .await
            .expect_err("provider error");

        match error {
            AdapterError::Provider { status, message } => {
                assert_eq!(status.as_u16(), 401);
                assert_eq!(message, "Incorrect API key provided");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_choices_are_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(200).json_body(json!({ "choices": [] }));
            })
            .await;

        let error = client_for(&server)
            .complete(request())
            .await
            .expect_err("malformed");
        assert!(matches!(error, AdapterError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn complete_without_credential_is_rejected() {
        let client = offline_client();
        let error = client.complete(request()).await.expect_err("not configured");
        assert!(matches!(error, AdapterError::NotConfigured));
    }

    #[tokio::test]
    async fn connection_test_reports_unconfigured_key() {
        let client = offline_client();
        let report = client.test_connection("gpt-4o-mini").await;
        assert!(!report.success);
        assert_eq!(report.message, "OpenAI API 키가 설정되지 않았습니다.");
    }

    #[tokio::test]
    async fn connection_test_measures_round_trip() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .json_body_partial(r#"{"max_tokens":10}"#);
                then.status(200).json_body(json!({
                    "choices": [{ "message": { "content": "안녕하세요!" } }]
                }));
            })
            .await;

        let report = client_for(&server).test_connection("gpt-4o").await;

        mock.assert_async().await;
        assert!(report.success);
        assert_eq!(report.model.as_deref(), Some("gpt-4o"));
        assert_eq!(report.response.as_deref(), Some("안녕하세요!"));
        assert!(report.response_time_ms.expect("timing") >= 0.0);
    }

    #[tokio::test]
    async fn connection_test_captures_failures() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(500).body("upstream exploded");
            })
            .await;

        let report = client_for(&server).test_connection("gpt-4o").await;
        assert!(!report.success);
        assert!(report.message.starts_with("OpenAI API 연결 실패"));
        assert!(report.message.contains("upstream exploded"));
    }
}
