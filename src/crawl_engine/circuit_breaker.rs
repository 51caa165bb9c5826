//! Per-host circuit breaker: a failure counter that opens for a cooldown.
//!
//! Two states only — no `HalfOpen` success-threshold ramp. The next success
//! after the cooldown closes the breaker; the next failure re-opens it.
//! There is no background probe: admission is re-checked lazily the next
//! time a URL for that host is dispatched.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
}

#[derive(Debug, Clone)]
struct HostBreakerState {
    consecutive_failures: u32,
    breaker_open_until: Option<Instant>,
}

impl Default for HostBreakerState {
    fn default() -> Self {
        Self { consecutive_failures: 0, breaker_open_until: None }
    }
}

/// Per-host `Closed`/`Open` state table.
pub struct CircuitBreaker {
    hosts: DashMap<String, HostBreakerState>,
    failure_threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self { hosts: DashMap::new(), failure_threshold, cooldown }
    }

    /// Admission check: `false` while `now < breaker_open_until` for `host`.
    #[must_use]
    pub fn should_attempt(&self, host: &str) -> bool {
        self.hosts.get(host).is_none_or(|state| match state.breaker_open_until {
            Some(until) => Instant::now() >= until,
            None => true,
        })
    }

    /// `consecutive_errors = 0`, `breaker_open_until = None`.
    pub fn record_success(&self, host: &str) {
        if let Some(mut state) = self.hosts.get_mut(host) {
            if state.consecutive_failures > 0 || state.breaker_open_until.is_some() {
                debug!(host, "circuit breaker closed after success");
            }
            state.consecutive_failures = 0;
            state.breaker_open_until = None;
        }
    }

    /// `consecutive_errors += 1`; opens the breaker once the threshold is hit.
    pub fn record_failure(&self, host: &str) {
        let mut state = self.hosts.entry(host.to_string()).or_default();
        state.consecutive_failures += 1;

        if state.consecutive_failures >= self.failure_threshold {
            state.breaker_open_until = Some(Instant::now() + self.cooldown);
            warn!(host, failures = state.consecutive_failures, cooldown = ?self.cooldown, "circuit breaker open");
        }
    }

    #[must_use]
    pub fn state(&self, host: &str) -> CircuitState {
        match self.hosts.get(host) {
            Some(state) if state.breaker_open_until.is_some_and(|until| Instant::now() < until) => CircuitState::Open,
            _ => CircuitState::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_by_default() {
        let cb = CircuitBreaker::new(2, Duration::from_secs(1));
        assert!(cb.should_attempt("a"));
    }

    #[test]
    fn opens_after_threshold_failures() {
        let cb = CircuitBreaker::new(2, Duration::from_secs(60));
        cb.record_failure("a");
        assert!(cb.should_attempt("a"));
        cb.record_failure("a");
        assert!(!cb.should_attempt("a"));
        assert_eq!(cb.state("a"), CircuitState::Open);
    }

    #[test]
    fn closes_again_after_cooldown() {
        let cb = CircuitBreaker::new(1, Duration::from_millis(50));
        cb.record_failure("a");
        assert!(!cb.should_attempt("a"));
        std::thread::sleep(Duration::from_millis(80));
        assert!(cb.should_attempt("a"));
    }

    #[test]
    fn success_resets_failure_count() {
        let cb = CircuitBreaker::new(2, Duration::from_secs(60));
        cb.record_failure("a");
        cb.record_success("a");
        cb.record_failure("a");
        assert!(cb.should_attempt("a"));
    }
}
