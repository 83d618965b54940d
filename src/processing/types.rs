//! Message records and error definitions for the relay pipelines.

use crate::llm::AdapterError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Package name Messenger Bot R reports for KakaoTalk notifications.
pub const KAKAO_PACKAGE: &str = "com.kakao.talk";

/// Smallest accepted summary length in lines.
pub const MIN_SUMMARY_LINES: u8 = 1;
/// Largest accepted summary length in lines.
pub const MAX_SUMMARY_LINES: u8 = 10;
/// Summary length used when the caller does not ask for one.
pub const DEFAULT_SUMMARY_LINES: u8 = 3;
/// Reply language used when the caller does not ask for one.
pub const DEFAULT_LANGUAGE: &str = "ko";

fn default_package() -> Option<String> {
    Some(KAKAO_PACKAGE.to_string())
}

/// Chat message forwarded by the messenger app.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingMessage {
    /// Chat room name.
    pub room: String,
    /// Display name of the sender.
    pub sender: String,
    /// Message body.
    pub message: String,
    /// Whether the room is a group chat.
    #[serde(default)]
    pub is_group_chat: bool,
    /// Epoch seconds reported by the app.
    #[serde(default)]
    pub timestamp: Option<i64>,
    /// Android package the notification came from.
    #[serde(default = "default_package")]
    pub package_name: Option<String>,
}

impl IncomingMessage {
    /// Build a one-to-one KakaoTalk message without a timestamp.
    pub fn new(
        room: impl Into<String>,
        sender: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            room: room.into(),
            sender: sender.into(),
            message: message.into(),
            is_group_chat: false,
            timestamp: None,
            package_name: default_package(),
        }
    }
}

/// Reply returned to the messenger app.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedMessage {
    /// Room the reply belongs to.
    pub room: String,
    /// Reply text.
    pub message: String,
    /// Whether processing succeeded.
    pub success: bool,
    /// Wall-clock seconds spent, two decimals.
    pub processing_time: f64,
    /// Model that produced the reply; `null` for placeholder and fallback replies.
    pub model_used: Option<String>,
}

/// Validated request for an N-line summary.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRequest {
    message: String,
    lines: u8,
    language: String,
}

/// Rejections raised while building a [`SummaryRequest`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SummaryRequestError {
    /// Requested line count is outside the accepted range.
    #[error("lines must be between 1 and 10, got {0}")]
    LinesOutOfRange(i64),
}

impl SummaryRequest {
    /// Build a summary request for `lines` lines.
    pub fn new(message: impl Into<String>, lines: i64) -> Result<Self, SummaryRequestError> {
        let lines = u8::try_from(lines)
            .ok()
            .filter(|value| (MIN_SUMMARY_LINES..=MAX_SUMMARY_LINES).contains(value))
            .ok_or(SummaryRequestError::LinesOutOfRange(lines))?;
        Ok(Self {
            message: message.into(),
            lines,
            language: DEFAULT_LANGUAGE.into(),
        })
    }

    /// Request using the default line count.
    pub fn with_default_lines(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            lines: DEFAULT_SUMMARY_LINES,
            language: DEFAULT_LANGUAGE.into(),
        }
    }

    /// Ask for the reply in `language` instead of Korean.
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Text to summarize.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Requested number of lines.
    pub fn lines(&self) -> u8 {
        self.lines
    }

    /// Reply language tag, `"ko"` by default.
    pub fn language_tag(&self) -> &str {
        &self.language
    }
}

/// Summary text together with the model that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// Summary text as returned by the provider.
    pub text: String,
    /// Model used for the call.
    pub model: String,
}

/// Reasons a summary could not be produced.
#[derive(Debug, Error)]
pub enum SummarizeError {
    /// No credential is configured, so the provider is not called at all.
    #[error("OpenAI 서비스를 사용할 수 없습니다. API 키를 확인해주세요.")]
    Unavailable,
    /// The provider call failed.
    #[error("요약 처리 중 오류가 발생했습니다: {0}")]
    Provider(#[from] AdapterError),
}

impl SummarizeError {
    /// Whether the message pipeline may relay this failure as reply text.
    ///
    /// Transport and provider-status failures are reported to the chat; a malformed provider
    /// payload is treated as an unexpected fault.
    pub fn is_reportable(&self) -> bool {
        !matches!(self, Self::Provider(AdapterError::MalformedResponse(_)))
    }
}
