//! Message pipeline: wraps summarization with timing and reply policy.

use crate::{
    config::SettingsStore,
    llm::round2,
    metrics::RelayMetrics,
    processing::{
        summarize::Summarizer,
        types::{IncomingMessage, ProcessedMessage, SummaryRequest},
    },
};
use std::sync::Arc;
use std::time::Instant;

/// Reply used while no LLM credential is configured.
pub const PLACEHOLDER_REPLY: &str = "안녕하세요! 현재 AI 서비스가 \
                                     일시적으로 사용할 수 없습니다.";
/// Reply used when processing fails unexpectedly.
pub const FALLBACK_REPLY: &str = "죄송합니다. \
                                  메시지 처리 중 오류가 발생했습니다.";
/// Label placed before a successful summary.
pub const SUMMARY_PREFIX: &str = "📝 메시지 요약:\n";

/// Turns incoming chat messages into replies.
pub struct MessagePipeline {
    summarizer: Arc<Summarizer>,
    settings: Arc<SettingsStore>,
    metrics: Arc<RelayMetrics>,
}

impl MessagePipeline {
    /// Build a pipeline sharing the summarizer, settings and counters.
    pub fn new(
        summarizer: Arc<Summarizer>,
        settings: Arc<SettingsStore>,
        metrics: Arc<RelayMetrics>,
    ) -> Self {
        Self {
            summarizer,
            settings,
            metrics,
        }
    }

    /// Process one message. Never fails; failures are tagged in the reply.
    pub async fn handle(&self, incoming: &IncomingMessage) -> ProcessedMessage {
        let started = Instant::now();
        tracing::info!(
            room = %incoming.room,
            sender = %incoming.sender,
            group = incoming.is_group_chat,
            "Message received"
        );
        tracing::debug!(message = %incoming.message, "Message content");
        if let Some(package) = incoming
            .package_name
            .as_deref()
            .filter(|package| *package != crate::processing::types::KAKAO_PACKAGE)
        {
            tracing::info!(package, room = %incoming.room, "Message from non-KakaoTalk package");
        }

        let (message, success, model_used) = self.reply_for(incoming).await;
        let processing_time = round2(started.elapsed().as_secs_f64());
        self.metrics.record_message(success);

        if success {
            tracing::info!(processing_time, room = %incoming.room, "Message processed");
        }
        ProcessedMessage {
            room: incoming.room.clone(),
            message,
            success,
            processing_time,
            model_used,
        }
    }

    async fn reply_for(&self, incoming: &IncomingMessage) -> (String, bool, Option<String>) {
        if !self.summarizer.is_available() {
            return (PLACEHOLDER_REPLY.to_string(), true, None);
        }

        let request = SummaryRequest::with_default_lines(incoming.message.clone());
        match self.summarizer.try_summarize(&request).await {
            Ok(summary) => (
                format!("{SUMMARY_PREFIX}{}", summary.text),
                true,
                Some(summary.model),
            ),
            Err(error) if error.is_reportable() => {
                let model = self.settings.snapshot().openai_model.clone();
                (error.to_string(), true, Some(model))
            }
            Err(error) => {
                tracing::error!(%error, room = %incoming.room, "Message processing failed");
                (FALLBACK_REPLY.to_string(), false, None)
            }
        }
    }
}
