//! Operator endpoints.

use super::{AppError, AppState, SERVICE_NAME, auth::AdminUser, now_rfc3339, webhook::LogsQuery};
use crate::{
    config::LlmSettingsUpdate,
    llm::ConnectionReport,
    metrics::format_uptime,
    processing::IncomingMessage,
    stats::{SystemStats, format_kib},
};
use axum::{
    Json, Router,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    routing::{get, post},
};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::time::Duration;

const DEFAULT_LOG_LIMIT: usize = 100;

pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route("/config", get(get_config))
        .route("/config/openai", post(update_openai_config))
        .route("/test/openai", post(test_openai_connection))
        .route("/stats", get(get_stats))
        .route("/logs", get(get_logs))
        .route("/logs/clear", post(clear_logs))
        .route("/models", get(list_models))
        .route("/webhook/test", post(test_webhook))
        .route("/info", get(server_info))
}

/// Current settings with secrets reduced to presence flags.
async fn get_config(State(state): State<AppState>, _admin: AdminUser) -> Json<Value> {
    let settings = state.settings.snapshot();
    Json(json!({
        "server": {
            "host": settings.host,
            "port": settings.port,
            "debug": settings.debug,
        },
        "openai": {
            "api_key_set": settings.api_key_set(),
            "model": settings.openai_model,
            "max_tokens": settings.openai_max_tokens,
            "temperature": settings.openai_temperature,
            "available": state.llm.is_available(),
        },
        "messenger_bot": {
            "webhook_secret_set": !settings.webhook_secret.is_empty(),
            "allowed_origins": settings.allowed_origins,
        },
        "logging": {
            "level": settings.log_level,
            "file": settings.log_file.display().to_string(),
            "rotation": settings.log_rotation,
            "retention": settings.log_retention,
        },
    }))
}

/// Replace LLM settings. Every field is validated before any is applied.
async fn update_openai_config(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(fields) = payload?;
    let update = LlmSettingsUpdate::from_json(&fields).map_err(|error| {
        tracing::error!(%error, admin = %admin, "OpenAI settings update rejected");
        AppError::internal(format!("설정 업데이트 실패: {error}"))
    })?;

    // Runs under the settings write lock.
    let settings = state.settings.apply_with(&update, |next| {
        if update.changes_api_key() {
            state.llm.initialize(&next.openai_api_key);
        }
    });
    tracing::info!(
        admin = %admin,
        model = %settings.openai_model,
        max_tokens = settings.openai_max_tokens,
        temperature = settings.openai_temperature,
        api_key_changed = update.changes_api_key(),
        "OpenAI settings updated"
    );

    Ok(Json(json!({
        "status": "success",
        "message": "OpenAI 설정이 업데이트되었습니다.",
        "openai_available": state.llm.is_available(),
    })))
}

async fn test_openai_connection(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<ConnectionReport>, AppError> {
    let model = state.settings.snapshot().openai_model.clone();
    let report = state.llm.test_connection(&model).await;
    if report.success {
        Ok(Json(report))
    } else {
        Err(AppError::internal(report.message))
    }
}

async fn get_stats(State(state): State<AppState>, _admin: AdminUser) -> Json<Value> {
    let settings = state.settings.snapshot();
    let system = SystemStats::collect().await;
    let log_size = state.log_file.size().await.unwrap_or_else(|error| {
        tracing::warn!(%error, "Failed to read log file size");
        0
    });
    let counters = state.metrics.snapshot();

    Json(json!({
        "system": system,
        "service": {
            "openai_available": state.llm.is_available(),
            "openai_model": settings.openai_model,
            "log_file_size": format_kib(log_size),
            "uptime": format_uptime(Duration::from_secs(counters.uptime_seconds)),
            "messages_processed": counters.messages_processed,
            "messages_failed": counters.messages_failed,
            "summaries_requested": counters.summaries_requested,
        },
        "config": {
            "debug_mode": settings.debug,
            "log_level": settings.log_level,
            "webhook_configured": !settings.webhook_secret.is_empty(),
        },
        "timestamp": now_rfc3339(),
    }))
}

async fn get_logs(
    State(state): State<AppState>,
    _admin: AdminUser,
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
            "file_path": tail.path.display().to_string(),
        }),
        None => json!({ "logs": [], "message": "로그 파일이 존재하지 않습니다." }),
    }))
}

async fn clear_logs(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> Result<Json<Value>, AppError> {
    // Logged before truncation so the clear leaves an empty file behind.
    tracing::info!(admin = %admin, "Clearing log file");
    let cleared = state.log_file.clear().await.map_err(|error| {
        tracing::error!(%error, "Log clear failed");
        AppError::internal(format!("로그 초기화 중 오류: {error}"))
    })?;

    Ok(Json(if cleared {
        json!({ "status": "success", "message": "로그 파일이 초기화되었습니다." })
    } else {
        json!({ "status": "info", "message": "로그 파일이 존재하지 않습니다." })
    }))
}

#[derive(Serialize)]
struct ModelOption {
    id: &'static str,
    name: &'static str,
    description: &'static str,
}

const MODELS: &[ModelOption] = &[
    ModelOption {
        id: "gpt-4o-mini",
        name: "GPT-4o Mini",
        description: "빠르고 효율적인 모델",
    },
    ModelOption {
        id: "gpt-4o",
        name: "GPT-4o",
        description: "최신 GPT-4 모델",
    },
    ModelOption {
        id: "gpt-4",
        name: "GPT-4",
        description: "고성능 GPT-4 모델",
    },
    ModelOption {
        id: "gpt-3.5-turbo",
        name: "GPT-3.5 Turbo",
        description: "빠른 응답 모델",
    },
];

async fn list_models(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "models": MODELS,
        "current_model": state.settings.snapshot().openai_model,
    }))
}

/// Run the message pipeline on an admin supplied payload, filling in defaults.
async fn test_webhook(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(payload) = payload?;
    let field = |key: &str, default: &str| {
        payload
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    };
    let mut input = IncomingMessage::new(
        field("room", "관리자 테스트"),
        field("sender", "관리자"),
        field("message", "테스트 메시지입니다."),
    );
    input.is_group_chat = payload
        .get("isGroupChat")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let output = state.pipeline.handle(&input).await;
    tracing::info!(admin = %admin, success = output.success, "Admin webhook test executed");

    Ok(Json(json!({
        "status": "success",
        "message": "웹훅 테스트 완료",
        "input": input,
        "output": output,
    })))
}

async fn server_info(State(state): State<AppState>) -> Json<Value> {
    let settings = state.settings.snapshot();
    let base = settings.public_base_url();
    Json(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "webhook_endpoint": format!("{base}/webhook/message"),
        "admin_endpoint": format!("{base}/admin"),
        "docs_available": settings.debug,
    }))
}
