//! Relay pipelines: message handling and summarization.

pub mod message;
pub mod summarize;
pub mod types;

pub use message::{FALLBACK_REPLY, MessagePipeline, PLACEHOLDER_REPLY, SUMMARY_PREFIX};
pub use summarize::Summarizer;
pub use types::{
    IncomingMessage, ProcessedMessage, Summary, SummarizeError, SummaryRequest,
    SummaryRequestError,
};
