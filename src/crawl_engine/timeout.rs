//! Attempt-indexed timeout policy: bounds grow linearly with the retry
//! attempt so a transient slow peer gets progressively more budget without
//! unbounded growth.

use std::future::Future;
use std::time::Duration;

use crate::error::FetchError;

/// Connect/read/total bounds for one fetch attempt.
#[derive(Debug, Clone, Copy)]
pub struct AttemptTimeouts {
    pub connect: Duration,
    pub read: Duration,
    pub total: Duration,
}

/// Base bounds plus the linear-growth step applied per retry attempt.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutPolicy {
    pub connect: Duration,
    pub read: Duration,
    pub total: Duration,
    pub step: Duration,
}

impl TimeoutPolicy {
    /// `base + step * attempt` for each bound.
    #[must_use]
    pub fn for_attempt(&self, attempt: u32) -> AttemptTimeouts {
        let grow = self.step * attempt;
        AttemptTimeouts { connect: self.connect + grow, read: self.read + grow, total: self.total + grow }
    }
}

/// Wraps `operation` with `timeouts.total`; a timeout surfaces as
/// `FetchError::Transient` so the retry executor treats it like any other
/// transient failure.
pub async fn with_total_timeout<F, T>(operation: F, timeouts: AttemptTimeouts) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>>,
{
    match tokio::time::timeout(timeouts.total, operation).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Transient(format!("total timeout after {:?}", timeouts.total))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_grow_linearly_with_attempt() {
        let policy = TimeoutPolicy {
            connect: Duration::from_secs(1),
            read: Duration::from_secs(2),
            total: Duration::from_secs(5),
            step: Duration::from_secs(1),
        };
        let t0 = policy.for_attempt(0);
        let t2 = policy.for_attempt(2);
        assert_eq!(t0.total, Duration::from_secs(5));
        assert_eq!(t2.total, Duration::from_secs(7));
        assert_eq!(t2.connect, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn total_timeout_surfaces_as_transient() {
        let timeouts = AttemptTimeouts { connect: Duration::from_millis(1), read: Duration::from_millis(1), total: Duration::from_millis(5) };
        let result: Result<(), FetchError> = with_total_timeout(
            async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(())
            },
            timeouts,
        )
        .await;
        assert!(matches!(result, Err(FetchError::Transient(_))));
    }
}
