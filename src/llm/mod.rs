//! Chat-completion adapter used by the summarization pipeline.
//!
//! The [`LlmClient`] trait is the seam between the pipelines and the external provider: the
//! server wires in [`OpenAiClient`], tests substitute a scripted fake.

mod openai;

pub use openai::OpenAiClient;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by a chat-completion call.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// No credential is bound to the adapter.
    #[error("OpenAI API key is not configured")]
    NotConfigured,
    /// The request never produced an HTTP response.
    #[error("failed to reach provider: {0}")]
    Http(#[from] reqwest::Error),
    /// The provider answered with an error status.
    #[error("provider returned {status}: {message}")]
    Provider {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Provider supplied error message, or the raw body.
        message: String,
    },
    /// The provider answered 2xx but the payload could not be used.
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

/// Speaker of a prompt message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions framing the conversation.
    System,
    /// End-user content.
    User,
}

/// One prompt message sent to the provider.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatMessage {
    /// Speaker role.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// System instruction message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// User message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Parameters for a single chat completion.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    /// Prompt messages in order.
    pub messages: Vec<ChatMessage>,
    /// Model identifier.
    pub model: String,
    /// Completion token limit.
    pub max_tokens: u32,
    /// Sampling temperature; provider default when `None`.
    pub temperature: Option<f32>,
}

/// Outcome of a connectivity check. Serialized as-is by the admin API.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConnectionReport {
    /// Whether the provider answered.
    pub success: bool,
    /// Human readable summary.
    pub message: String,
    /// Model exercised by the check.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Round-trip time in milliseconds, two decimals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<f64>,
    /// Text the provider produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

impl ConnectionReport {
    /// Failed check with the given message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            model: None,
            response_time_ms: None,
            response: None,
        }
    }
}

/// Capability set of a chat-completion provider.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Bind to `api_key`, or disable the client when it is empty. Never fails.
    fn initialize(&self, api_key: &str);

    /// Whether a credential is bound.
    fn is_available(&self) -> bool;

    /// Issue one chat completion and return the trimmed reply text.
    async fn complete(&self, request: CompletionRequest) -> Result<String, AdapterError>;

    /// Issue a minimal completion against `model` to validate connectivity.
    async fn test_connection(&self, model: &str) -> ConnectionReport;
}

/// Round a duration in seconds-as-float to two decimals.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
