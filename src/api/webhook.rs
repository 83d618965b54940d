//! Endpoints called by the Messenger Bot R app.

use super::{AppError, AppState, now_rfc3339};
use crate::processing::{
    IncomingMessage, ProcessedMessage, SUMMARY_PREFIX, SummaryRequest,
    types::{DEFAULT_LANGUAGE, DEFAULT_SUMMARY_LINES},
};
use axum::{
    Json, Router,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

const DEFAULT_LOG_LIMIT: usize = 50;
const TEST_ROOM: &str = "테스트 채팅방";
const TEST_SENDER: &str = "테스트 사용자";
const TEST_MESSAGE: &str = "안녕하세요! 테스트 메시지입니다.";

pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route("/message", post(process_message))
        .route("/status", get(status))
        .route("/test", post(test_webhook))
        .route("/summary", post(create_summary))
        .route("/logs", get(recent_logs))
        .route("/config", get(webhook_config))
}

/// Summarize an incoming chat message and reply.
async fn process_message(
    State(state): State<AppState>,
    payload: Result<Json<IncomingMessage>, JsonRejection>,
) -> Result<Json<ProcessedMessage>, AppError> {
    let Json(message) = payload?;
    Ok(Json(state.pipeline.handle(&message).await))
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "active",
        "service": "카카오톡 메신저 봇 R 웹훅",
        "openai_available": state.llm.is_available(),
        "timestamp": now_rfc3339(),
    }))
}

/// Standard envelope for the test hook.
#[derive(Serialize)]
struct WebhookResponse {
    status: &'static str,
    message: &'static str,
    data: Value,
    timestamp: String,
}

/// Run the pipeline on a synthesized message; only `message` is taken from the body.
async fn test_webhook(
    State(state): State<AppState>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<WebhookResponse>, AppError> {
    let Json(body) = payload?;
    let text = body
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or(TEST_MESSAGE);
    tracing::info!(message = text, "Webhook test requested");

    let input = IncomingMessage::new(TEST_ROOM, TEST_SENDER, text);
    let output = state.pipeline.handle(&input).await;

    Ok(Json(WebhookResponse {
        status: if output.success { "success" } else { "error" },
        message: "웹훅 테스트 완료",
        data: json!({
            "test_input": input,
            "test_output": output,
        }),
        timestamp: now_rfc3339(),
    }))
}

/// Read `lines` leniently: integers, whole-number floats and numeric strings.
fn parse_lines(value: &Value) -> Result<i64, AppError> {
    let lines = match value {
        Value::Number(number) => number.as_i64().or_else(|| whole_number(number.as_f64())),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    };
    lines.ok_or_else(|| AppError::bad_request("lines는 정수여야 합니다."))
}

fn whole_number(value: Option<f64>) -> Option<i64> {
    value
        .filter(|value| value.fract() == 0.0)
        .map(|value| value as i64)
}

fn parse_language(value: Option<&Value>) -> Result<String, AppError> {
    match value {
        None | Some(Value::Null) => Ok(DEFAULT_LANGUAGE.to_string()),
        Some(Value::String(language)) if language.trim().is_empty() => {
            Ok(DEFAULT_LANGUAGE.to_string())
        }
        Some(Value::String(language)) => Ok(language.trim().to_string()),
        Some(_) => Err(AppError::bad_request("language는 문자열이어야 합니다.")),
    }
}

/// Summarize `message` into `lines` lines without the chat reply framing.
async fn create_summary(
    State(state): State<AppState>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(body) = payload?;
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .filter(|message| !message.is_empty())
        .ok_or_else(|| AppError::bad_request("메시지가 필요합니다."))?;
    let lines = match body.get("lines") {
        None | Some(Value::Null) => i64::from(DEFAULT_SUMMARY_LINES),
        Some(value) => parse_lines(value)?,
    };
    let language = parse_language(body.get("language"))?;
    let request = SummaryRequest::new(message, lines)
        .map_err(|error| AppError::bad_request(format!("잘못된 요약 요청: {error}")))?
        .language(language);

    state.metrics.record_summary();
    let (summary, model_used) = match state.summarizer.try_summarize(&request).await {
        Ok(summary) => (summary.text, Some(summary.model)),
        Err(error) => {
            let model = state
                .llm
                .is_available()
                .then(|| state.settings.snapshot().openai_model.clone());
            (error.to_string(), model)
        }
    };

    Ok(Json(json!({
        "status": "success",
        "original_message": message,
        "summary": summary,
        "lines": request.lines(),
        "language": request.language_tag(),
        "model_used": model_used,
    })))
}

#[derive(Debug, Deserialize)]
pub(super) struct LogsQuery {
    pub(super) limit: Option<usize>,
}

async fn recent_logs(
    State(state): State<AppState>,
    query: Result<Query<LogsQuery>, QueryRejection>,
) -> Result<Json<Value>, AppError> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT);
    let tail = state.log_file.tail(limit).await.map_err(|error| {
        tracing::error!(%error, "Log read failed");
        AppError::internal(format!("로그 조회 중 오류: {error}"))
    })?;

    Ok(Json(match tail {
        Some(tail) => json!({
            "logs": tail.lines,
            "total_lines": tail.lines.len(),
            "log_file": tail.path.display().to_string(),
        }),
        None => json!({ "logs": [], "message": "로그 파일이 없습니다." }),
    }))
}

/// Setup information for configuring the messenger app.
async fn webhook_config(State(state): State<AppState>) -> Json<Value> {
    let base = state.settings.snapshot().public_base_url();
    let timestamp = time::OffsetDateTime::now_utc().unix_timestamp();
    Json(json!({
        "webhook_url": format!("{base}/webhook/message"),
        "test_url": format!("{base}/webhook/test"),
        "summary_url": format!("{base}/webhook/summary"),
        "status_url": format!("{base}/webhook/status"),
        "supported_methods": ["POST"],
        "content_type": "application/json",
        "example_payload": {
            "room": "친구와의 채팅",
            "sender": "홍길동",
            "message": "안녕하세요! 오늘 날씨가 좋네요.",
            "isGroupChat": false,
            "timestamp": timestamp,
            "packageName": "com.kakao.talk",
        },
        "response_format": {
            "room": "친구와의 채팅",
            "message": format!("{SUMMARY_PREFIX}[3줄 요약 내용]"),
            "success": true,
            "processing_time": 1.23,
            "model_used": "gpt-4o-mini",
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::super::tests::{get, harness, post};
    use crate::llm::testing::{FakeLlm, Scripted};
    use crate::processing::{PLACEHOLDER_REPLY, SummarizeError};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn status_reports_adapter_availability() {
        let harness = harness(FakeLlm::enabled());
        let (status, body) = get(&harness.router, "/webhook/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "active");
        assert_eq!(body["openai_available"], true);
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_hook_wraps_pipeline_output() {
        let harness = harness(FakeLlm::disabled());
        let payload = json!({ "message": "테스트" });
        let (status, body) = post(&harness.router, "/webhook/test", payload).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["data"]["test_input"]["room"], "테스트 채팅방");
        assert_eq!(body["data"]["test_input"]["message"], "테스트");
        assert_eq!(body["data"]["test_output"]["message"], PLACEHOLDER_REPLY);
    }

    #[tokio::test]
    async fn summary_requires_a_message() {
        let harness = harness(FakeLlm::enabled());
        let payload = json!({ "message": "" });
        let (status, body) = post(&harness.router, "/webhook/summary", payload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "메시지가 필요합니다.");
    }

    #[tokio::test]
    async fn summary_rejects_unusable_lines() {
        let harness = harness(FakeLlm::enabled());
        for lines in [json!(0), json!(11), json!("three"), json!(2.5), json!([3])] {
            let payload = json!({ "message": "hello", "lines": lines });
            let (status, body) = post(&harness.router, "/webhook/summary", payload).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body["detail"].is_string());
        }
    }

    #[tokio::test]
    async fn summary_accepts_numeric_lines_in_any_json_form() {
        for lines in [json!(2), json!("2"), json!(" 2 "), json!(2.0)] {
            let llm = FakeLlm::enabled().script(Scripted::Reply("요약".into()));
            let harness = harness(llm);
            let payload = json!({ "message": "긴 글", "lines": lines });
            let (status, body) = post(&harness.router, "/webhook/summary", payload).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["lines"], 2);
        }
    }

    #[tokio::test]
    async fn summary_returns_text_and_model() {
        let llm = FakeLlm::enabled().script(Scripted::Reply("첫 줄\n둘째 줄".into()));
        let harness = harness(llm);
        let payload = json!({ "message": "긴 글", "lines": 2 });
        let (status, body) = post(&harness.router, "/webhook/summary", payload).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"], "첫 줄\n둘째 줄");
        assert_eq!(body["lines"], 2);
        assert_eq!(body["language"], "ko");
        assert_eq!(body["model_used"], "gpt-4o-mini");
        assert_eq!(body["original_message"], "긴 글");
    }

    #[tokio::test]
    async fn summary_echoes_requested_language() {
        let harness = harness(FakeLlm::enabled());
        let payload = json!({ "message": "hello", "language": "en" });
        let (status, body) = post(&harness.router, "/webhook/summary", payload).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["language"], "en");

        let payload = json!({ "message": "hello", "language": 7 });
        let (status, _) = post(&harness.router, "/webhook/summary", payload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn summary_without_adapter_reports_policy_text() {
        let harness = harness(FakeLlm::disabled());
        let payload = json!({ "message": "hello" });
        let (status, body) = post(&harness.router, "/webhook/summary", payload).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"], SummarizeError::Unavailable.to_string());
        assert!(body["model_used"].is_null());
    }

    #[tokio::test]
    async fn logs_without_file_are_empty() {
        let harness = harness(FakeLlm::disabled());
        let (status, body) = get(&harness.router, "/webhook/logs").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["logs"], json!([]));
    }

    #[tokio::test]
    async fn logs_honour_limit() {
        let harness = harness(FakeLlm::disabled());
        let path = harness.state.log_file.configured_path().to_path_buf();
        std::fs::write(&path, "a\nb\nc\n").expect("write log");

        let (_, body) = get(&harness.router, "/webhook/logs?limit=2").await;
        assert_eq!(body["logs"], json!(["b", "c"]));
        assert_eq!(body["total_lines"], 2);

        let (_, body) = get(&harness.router, "/webhook/logs?limit=0").await;
        assert_eq!(body["logs"], json!(["a", "b", "c"]));
    }

    #[tokio::test]
    async fn invalid_body_is_rejected_with_detail() {
        let harness = harness(FakeLlm::disabled());
        let (status, body) = post(&harness.router, "/webhook/summary", json!([1, 2])).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn config_lists_webhook_urls() {
        let harness = harness(FakeLlm::disabled());
        let (_, body) = get(&harness.router, "/webhook/config").await;
        let webhook_url = "http://127.0.0.1:8000/webhook/message";
        assert_eq!(body["webhook_url"], webhook_url);
        assert_eq!(body["example_payload"]["packageName"], "com.kakao.talk");
    }
}
