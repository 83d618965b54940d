#![deny(missing_docs)]

//! Core library for the talkrelay server: Messenger Bot R webhooks in, OpenAI summaries out.

/// HTTP routing and handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Chat-completion adapter abstraction and the OpenAI client.
pub mod llm;
/// Log file tail and truncation.
pub mod logfile;
/// Structured logging and tracing setup.
pub mod logging;
/// Relay activity counters.
pub mod metrics;
/// Message and summarization pipelines.
pub mod processing;
/// Host resource statistics.
pub mod stats;
