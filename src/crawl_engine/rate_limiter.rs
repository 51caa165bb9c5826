//! Per-host (optionally global) minimum-interval rate limiter with jitter
//! and an error-driven backoff term.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

const GLOBAL_BUCKET: &str = "global";

#[derive(Debug, Default)]
struct HostRateState {
    last_request_at: Option<Instant>,
    consecutive_errors: u32,
}

/// Per-host minimum-interval gate. The inner `tokio::sync::Mutex` per host is
/// the single lock for the compute-and-update step spec.md §5 requires;
/// `DashMap` only arbitrates which host's mutex a caller takes.
pub struct RateLimiter {
    buckets: DashMap<String, Arc<Mutex<HostRateState>>>,
    interval: Duration,
    min_delay: Duration,
    jitter_max: Duration,
    backoff_base: Duration,
    backoff_factor: f64,
    backoff_max: Duration,
    per_host: bool,
}

impl RateLimiter {
    #[must_use]
    pub fn new(
        requests_per_second: f64,
        per_host: bool,
        min_delay: Duration,
        jitter_max: Duration,
        backoff_base: Duration,
        backoff_factor: f64,
        backoff_max: Duration,
    ) -> Self {
        let interval =
            if requests_per_second > 0.0 { Duration::from_secs_f64(1.0 / requests_per_second) } else { Duration::ZERO };
        Self {
            buckets: DashMap::new(),
            interval,
            min_delay,
            jitter_max,
            backoff_base,
            backoff_factor,
            backoff_max,
            per_host,
        }
    }

    fn bucket_key(&self, host: &str) -> String {
        if self.per_host { host.to_string() } else { GLOBAL_BUCKET.to_string() }
    }

    fn bucket(&self, key: &str) -> Arc<Mutex<HostRateState>> {
        self.buckets.entry(key.to_string()).or_insert_with(|| Arc::new(Mutex::new(HostRateState::default()))).clone()
    }

    /// Sleeps `max(0, last + max(interval, min_delay) - now) + jitter + error_backoff`,
    /// then records `now` as `last_request_at`.
    pub async fn acquire(&self, host: &str) {
        let key = self.bucket_key(host);
        let bucket = self.bucket(&key);
        let mut state = bucket.lock().await;

        let base_interval = self.interval.max(self.min_delay);
        let now = Instant::now();

        let wait_for_interval = state
            .last_request_at
            .and_then(|last| (last + base_interval).checked_duration_since(now))
            .unwrap_or(Duration::ZERO);

        let jitter = if self.jitter_max.is_zero() {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(rand::rng().random_range(0.0..self.jitter_max.as_secs_f64()))
        };

        let backoff = if self.backoff_base.is_zero() || state.consecutive_errors == 0 {
            Duration::ZERO
        } else {
            let scaled = self.backoff_base.as_secs_f64() * self.backoff_factor.powi(state.consecutive_errors as i32 - 1);
            Duration::from_secs_f64(scaled).min(self.backoff_max)
        };

        let sleep_for = wait_for_interval + jitter + backoff;
        if !sleep_for.is_zero() {
            debug!(host = %key, sleep_ms = sleep_for.as_millis(), "rate limiter sleeping");
            tokio::time::sleep(sleep_for).await;
        }

        state.last_request_at = Some(Instant::now());
    }

    pub async fn record_success(&self, host: &str) {
        let key = self.bucket_key(host);
        let bucket = self.bucket(&key);
        bucket.lock().await.consecutive_errors = 0;
    }

    pub async fn record_error(&self, host: &str) {
        let key = self.bucket_key(host);
        let bucket = self.bucket(&key);
        bucket.lock().await.consecutive_errors += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enforces_minimum_interval_per_host() {
        let limiter = RateLimiter::new(2.0, true, Duration::ZERO, Duration::ZERO, Duration::ZERO, 2.0, Duration::ZERO);
        let start = Instant::now();
        limiter.acquire("a").await;
        limiter.acquire("a").await;
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn distinct_hosts_do_not_serialize_against_each_other() {
        let limiter = RateLimiter::new(1.0, true, Duration::ZERO, Duration::ZERO, Duration::ZERO, 2.0, Duration::ZERO);
        limiter.acquire("h1").await;
        let start = Instant::now();
        limiter.acquire("h2").await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn error_backoff_grows_and_resets_on_success() {
        let limiter =
            RateLimiter::new(0.0, true, Duration::ZERO, Duration::ZERO, Duration::from_millis(50), 2.0, Duration::from_secs(5));
        limiter.acquire("a").await;
        limiter.record_error("a").await;
        let start = Instant::now();
        limiter.acquire("a").await;
        assert!(start.elapsed() >= Duration::from_millis(50));

        limiter.record_success("a").await;
        let start = Instant::now();
        limiter.acquire("a").await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
