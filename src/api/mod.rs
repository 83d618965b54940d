//! HTTP surface for the relay.
//!
//! - `/webhook/*` – endpoints called by the Messenger Bot R app: message processing, a test
//!   hook, direct summaries, status, setup information and a log tail.
//! - `/admin/*` – operator endpoints behind HTTP Basic auth: settings view and LLM settings
//!   mutation, connection test, host statistics, log view/clear and a pipeline test. The model
//!   catalog and service info are public.
//! - `/health` – liveness.
//!
//! Handlers share one [`AppState`]; the LLM adapter is injected so tests can swap in a fake.

mod admin;
mod auth;
mod webhook;

use crate::{
    config::{LogRotation, Settings, SettingsStore},
    llm::LlmClient,
    logfile::LogFile,
    metrics::RelayMetrics,
    processing::{MessagePipeline, Summarizer},
};
use axum::{
    Json, Router,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::{Value, json};
use std::sync::Arc;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Human readable service name reported by info endpoints.
pub const SERVICE_NAME: &str = "카카오톡 메신저 봇 R 연동 서버";

/// Shared handles available to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Current settings snapshot holder.
    pub settings: Arc<SettingsStore>,
    /// Chat-completion adapter.
    pub llm: Arc<dyn LlmClient>,
    /// Summarization pipeline.
    pub summarizer: Arc<Summarizer>,
    /// Message pipeline.
    pub pipeline: Arc<MessagePipeline>,
    /// Log file handle used by the log endpoints.
    pub log_file: Arc<LogFile>,
    /// Relay counters.
    pub metrics: Arc<RelayMetrics>,
}

impl AppState {
    /// Wire pipelines around `settings` and an already initialized adapter.
    pub fn new(settings: Settings, llm: Arc<dyn LlmClient>) -> Self {
        let rotation = settings.rotation().unwrap_or(LogRotation::Never);
        let log_file = Arc::new(LogFile::new(settings.log_file.clone(), rotation));
        let settings = Arc::new(SettingsStore::new(settings));
        let metrics = Arc::new(RelayMetrics::new());
        let summarizer = Arc::new(Summarizer::new(llm.clone(), settings.clone()));
        let pipeline = MessagePipeline::new(summarizer.clone(), settings.clone(), metrics.clone());
        Self {
            settings,
            llm,
            summarizer,
            pipeline: Arc::new(pipeline),
            log_file,
            metrics,
        }
    }
}

/// Build the HTTP router exposing the webhook and admin surfaces.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/webhook", webhook::router())
        .nest("/admin", admin::router())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "OK",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "messenger_bot_r": "연동 준비 완료"
    }))
}

/// Current UTC time as RFC 3339.
pub(crate) fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

/// Error returned by handlers, rendered as `{"detail": ...}`.
#[derive(Debug)]
pub(crate) struct AppError {
    status: StatusCode,
    detail: String,
}

impl AppError {
    pub(crate) fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    pub(crate) fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }
}

/// Malformed or mistyped JSON bodies keep axum's status (400, 415 or 422).
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}
