use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Thread-safe counters describing relay activity.
pub struct RelayMetrics {
    started_at: Instant,
    messages_processed: AtomicU64,
    messages_failed: AtomicU64,
    summaries_requested: AtomicU64,
}

impl Default for RelayMetrics {
    fn default() -> Self {
        Self {
            started_at: Instant::now(),
            messages_processed: AtomicU64::new(0),
            messages_failed: AtomicU64::new(0),
            summaries_requested: AtomicU64::new(0),
        }
    }
}

impl RelayMetrics {
    /// Create an empty metrics accumulator; uptime counts from now.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message that went through the pipeline, successful or not.
    pub fn record_message(&self, success: bool) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.messages_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a direct summary request.
    pub fn record_summary(&self) {
        self.summaries_requested.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_processed: self.messages_processed.load(Ordering::Relaxed),
            messages_failed: self.messages_failed.load(Ordering::Relaxed),
            summaries_requested: self.summaries_requested.load(Ordering::Relaxed),
            uptime_seconds: self.started_at.elapsed().as_secs(),
        }
    }
}

/// Immutable view of relay counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Messages handled by the message pipeline since startup.
    pub messages_processed: u64,
    /// Messages that ended in the fallback reply.
    pub messages_failed: u64,
    /// Direct summary requests served.
    pub summaries_requested: u64,
    /// Seconds since the server started.
    pub uptime_seconds: u64,
}

/// Render an uptime like `"2h 05m 09s"`.
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m {seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}
