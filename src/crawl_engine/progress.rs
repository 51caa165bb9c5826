//! Periodic progress reporting, abstracted so the same orchestrator loop
//! supports a silent library caller and a logging CLI.

use std::time::Duration;

/// A snapshot of crawl progress emitted periodically by the orchestrator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressSnapshot {
    pub processed: u64,
    pub queued: u64,
    pub failed: u64,
    pub blocked: u64,
    pub errors: u64,
    pub pages_per_sec: f64,
    pub avg_delay: Duration,
    pub elapsed: Duration,
}

/// Implementations can log, send to a channel, update a UI, etc. The same
/// core crawl loop supports both a silent library caller and a reporting
/// CLI through this abstraction.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, snapshot: ProgressSnapshot);
}

/// Reports nothing. Used by library callers that don't need updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpProgress;

impl ProgressReporter for NoOpProgress {
    #[inline(always)]
    fn report(&self, _snapshot: ProgressSnapshot) {}
}

/// Emits one `tracing::info!` line per snapshot. The default reporter for
/// the `crawl` binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingProgress;

impl ProgressReporter for LoggingProgress {
    fn report(&self, snapshot: ProgressSnapshot) {
        tracing::info!(
            processed = snapshot.processed,
            queued = snapshot.queued,
            failed = snapshot.failed,
            blocked = snapshot.blocked,
            errors = snapshot.errors,
            pages_per_sec = format!("{:.2}", snapshot.pages_per_sec),
            avg_delay_ms = snapshot.avg_delay.as_millis(),
            elapsed_s = snapshot.elapsed.as_secs(),
            "crawl progress",
        );
    }
}
