//! Two-level concurrency controller: one global semaphore, one per-host
//! semaphore created lazily on first sight.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Holds both permits for one in-flight request. `Drop` releases the
/// per-host permit before the global one, the reverse of acquire order,
/// per spec.md §4.8/§5.
pub struct ConcurrencyPermit {
    _host: OwnedSemaphorePermit,
    _global: OwnedSemaphorePermit,
}

/// Global + per-host semaphore pair. Acquire order is fixed: global first,
/// then per-host — this prevents a pathological deadlock where many tasks
/// hold per-host permits and starve the global pool. Per-host semaphores are
/// never garbage-collected during a crawl.
pub struct ConcurrencyController {
    global: Arc<Semaphore>,
    per_host: DashMap<String, Arc<Semaphore>>,
    per_host_limit: usize,
}

impl ConcurrencyController {
    #[must_use]
    pub fn new(max_concurrent: usize, per_host_concurrent: usize) -> Self {
        Self {
            global: Arc::new(Semaphore::new(max_concurrent)),
            per_host: DashMap::new(),
            per_host_limit: per_host_concurrent,
        }
    }

    /// Acquire a global permit, then the per-host permit for `host`.
    ///
    /// # Panics
    /// Panics only if the underlying semaphores are closed, which this
    /// controller never does during a crawl.
    pub async fn acquire(&self, host: &str) -> ConcurrencyPermit {
        let global = self
            .global
            .clone()
            .acquire_owned()
            .await
            .expect("global semaphore is never closed during a crawl");

        let host_semaphore = self
            .per_host
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_host_limit)))
            .clone();

        let host_permit = host_semaphore
            .acquire_owned()
            .await
            .expect("per-host semaphore is never closed during a crawl");

        ConcurrencyPermit { _host: host_permit, _global: global }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn caps_global_concurrency() {
        let controller = Arc::new(ConcurrencyController::new(2, 10));
        let active = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let max_seen = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..6 {
            let controller = controller.clone();
            let active = active.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _permit = controller.acquire(&format!("host{i}")).await;
                let now = active.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, std::sync::atomic::Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                active.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(max_seen.load(std::sync::atomic::Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn caps_per_host_concurrency_independent_of_other_hosts() {
        let controller = Arc::new(ConcurrencyController::new(10, 1));
        let permit_a = controller.acquire("a").await;
        // A second acquire for a different host must not block on host "a".
        let permit_b = tokio::time::timeout(Duration::from_millis(50), controller.acquire("b")).await;
        assert!(permit_b.is_ok());
        drop(permit_a);
        drop(permit_b);
    }
}
