//! Tracing configuration and log routing.
//!
//! The application logs to stdout using a compact formatter and to the configured `LOG_FILE`.
//! When rotation is enabled the rolling appender writes `<LOG_FILE>.<date>` files and prunes
//! them according to `LOG_RETENTION`. A non‑blocking writer is used to minimize contention
//! on hot paths.
use std::path::Path;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::{LogRotation, Settings};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Configure tracing subscribers for stdout and file logging.
///
/// - Respects `RUST_LOG` for filtering, falling back to `LOG_LEVEL`.
/// - Installs a compact stdout layer and, when the file can be opened, a file layer.
/// - Uses a global guard to keep the non‑blocking writer alive for the process lifetime.
pub fn init_tracing(settings: &Settings) {
    let level = settings.log_level.to_lowercase();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    if let Some(writer) = configure_file_writer(settings) {
        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact();

        registry.with(file_layer).init();
    } else {
        registry.init();
    }
}

/// Build a non‑blocking writer for file logging.
///
/// Returns `None` when the log directory cannot be created or the appender cannot start.
fn configure_file_writer(settings: &Settings) -> Option<NonBlocking> {
    let path = settings.log_file.as_path();
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
        eprintln!("Invalid log file path {}", path.display());
        return None;
    };
    if let Err(err) = std::fs::create_dir_all(directory) {
        eprintln!("Failed to create log directory {}: {err}", directory.display());
        return None;
    }

    // Settings were validated at load time; fall back to a single file if that changes.
    let rotation = settings.rotation().unwrap_or(LogRotation::Never);
    let mut builder = RollingFileAppender::builder()
        .rotation(match rotation {
            LogRotation::Never => Rotation::NEVER,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
        })
        .filename_prefix(file_name);
    if let Ok(Some(max_files)) = settings.max_log_files() {
        builder = builder.max_log_files(max_files);
    }

    match builder.build(directory) {
        Ok(appender) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let _ = LOG_GUARD.set(guard);
            Some(non_blocking)
        }
        Err(err) => {
            eprintln!("Failed to open log file {}: {err}", path.display());
            None
        }
    }
}
