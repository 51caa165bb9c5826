//! Generic bounded-retry executor over a classified operation.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::FetchError;

/// Policy consumed by [`retry`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub backoff_factor: f64,
}

/// Outcome of a retried operation: the result plus the sequence of delays
/// actually slept, for observability and tests.
pub struct RetryOutcome<T> {
    pub result: Result<T, FetchError>,
    pub delays: Vec<Duration>,
}

/// Executes `attempt(i)` for `i` in `0..=max_retries`. On `Transient`/
/// `Network` errors with attempts remaining, sleeps
/// `base_delay * backoff_factor^i` and retries with `i + 1`. Any other
/// error, or exhausting the budget, surfaces immediately.
pub async fn retry<F, Fut, T>(policy: RetryPolicy, attempt: F) -> RetryOutcome<T>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut delays = Vec::new();
    let mut i = 0;

    loop {
        match attempt(i).await {
            Ok(value) => return RetryOutcome { result: Ok(value), delays },
            Err(err) if err.is_retryable() && i < policy.max_retries => {
                let delay = policy.base_delay.mul_f64(policy.backoff_factor.powi(i as i32));
                debug!(attempt = i, delay_ms = delay.as_millis(), "retrying after error: {err}");
                tokio::time::sleep(delay).await;
                delays.push(delay);
                i += 1;
            }
            Err(err) => return RetryOutcome { result: Err(err), delays },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let policy = RetryPolicy { max_retries: 3, base_delay: Duration::from_millis(1), backoff_factor: 2.0 };
        let calls = AtomicU32::new(0);

        let outcome = retry(policy, |i| {
            let calls = &calls;
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if i < 2 { Err(FetchError::Transient("503".into())) } else { Ok(42) }
            }
        })
        .await;

        assert_eq!(outcome.result.unwrap(), 42);
        assert_eq!(outcome.delays.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let policy = RetryPolicy { max_retries: 3, base_delay: Duration::from_millis(1), backoff_factor: 2.0 };
        let calls = AtomicU32::new(0);

        let outcome: RetryOutcome<()> = retry(policy, |_i| {
            let calls = &calls;
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::Permanent("404".into()))
            }
        })
        .await;

        assert!(outcome.result.is_err());
        assert!(outcome.delays.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausting_retries_surfaces_last_error() {
        let policy = RetryPolicy { max_retries: 1, base_delay: Duration::from_millis(1), backoff_factor: 2.0 };
        let outcome: RetryOutcome<()> = retry(policy, |_i| async { Err(FetchError::Network("refused".into())) }).await;
        assert!(outcome.result.is_err());
        assert_eq!(outcome.delays.len(), 1);
    }
}
