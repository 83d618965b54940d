//! N-line summarization on top of the chat-completion adapter.

use crate::{
    config::SettingsStore,
    llm::{ChatMessage, CompletionRequest, LlmClient},
    processing::types::{DEFAULT_LANGUAGE, Summary, SummarizeError, SummaryRequest},
};
use std::sync::Arc;

/// Build the system instruction for an `lines`-line summary written in `language`.
pub(crate) fn build_system_prompt(lines: u8, language: &str) -> String {
    let style = if language == DEFAULT_LANGUAGE {
        "자연스러운 한국어로 작성하세요.".to_string()
    } else {
        format!("자연스러운 '{language}' 언어로 작성하세요.")
    };
    format!(
        "당신은 한국어 메시지를 {lines}줄로 \
         간결하게 요약하는 전문가입니다.\n\
         다음 규칙을 따라주세요:\n\
         1. 정확히 {lines}줄로 요약하세요.\n\
         2. 핵심 내용만 포함하세요.\n\
         3. {style}\n\
         4. 불필요한 부사나 형용사는 제거하세요.\n\
         5. 중요한 정보는 빠뜨리지 마세요."
    )
}

/// Build the user instruction embedding the literal message.
pub(crate) fn build_user_prompt(lines: u8, message: &str) -> String {
    format!("다음 메시지를 {lines}줄로 요약해주세요:\n\n{message}")
}

/// Produces summaries using the model parameters current at call time.
pub struct Summarizer {
    llm: Arc<dyn LlmClient>,
    settings: Arc<SettingsStore>,
}

impl Summarizer {
    /// Wire the summarizer to an adapter and the shared settings.
    pub fn new(llm: Arc<dyn LlmClient>, settings: Arc<SettingsStore>) -> Self {
        Self { llm, settings }
    }

    /// Whether the underlying adapter has a credential.
    pub fn is_available(&self) -> bool {
        self.llm.is_available()
    }

    /// Summarize `request`, reporting failures as typed errors.
    pub async fn try_summarize(&self, request: &SummaryRequest) -> Result<Summary, SummarizeError> {
        if !self.llm.is_available() {
            return Err(SummarizeError::Unavailable);
        }

        let settings = self.settings.snapshot();
        let lines = request.lines();
        let completion = CompletionRequest {
            messages: vec![
                ChatMessage::system(build_system_prompt(lines, request.language_tag())),
                ChatMessage::user(build_user_prompt(lines, request.message())),
            ],
            model: settings.openai_model.clone(),
            max_tokens: settings.openai_max_tokens,
            temperature: Some(settings.openai_temperature),
        };

        match self.llm.complete(completion).await {
            Ok(text) => {
                tracing::info!(
                    input_chars = request.message().chars().count(),
                    output_chars = text.chars().count(),
                    lines,
                    model = %settings.openai_model,
                    "Summary generated"
                );
                Ok(Summary {
                    text,
                    model: settings.openai_model.clone(),
                })
            }
            Err(error) => {
                tracing::error!(%error, model = %settings.openai_model, "Summarization failed");
                Err(SummarizeError::Provider(error))
            }
        }
    }

    /// Summarize `request`, rendering any failure as reply text. Never fails.
    pub async fn summarize(&self, request: &SummaryRequest) -> String {
        match self.try_summarize(request).await {
            Ok(summary) => summary.text,
            Err(error) => error.to_string(),
        }
    }
}
