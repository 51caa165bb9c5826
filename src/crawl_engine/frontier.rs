//! Deduplicated, priority-ordered URL queue with processed/failed
//! bookkeeping (§4.7).
//!
//! All state-mutating operations serialize under one internal
//! `tokio::sync::Mutex` — a `DashMap` alone cannot provide the atomic
//! multi-set move `add`/`next`/`mark_*` require, so the teacher's
//! lock-free per-key registry idiom is intentionally not used here.

use std::collections::{BTreeMap, HashSet, VecDeque};

use tokio::sync::Mutex;

use crate::error::CrawlError;
use crate::url_normalizer::CanonicalUrl;

/// `{ url, priority, depth }` — one entry in the frontier.
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    pub url: CanonicalUrl,
    pub priority: i64,
    pub depth: u32,
}

#[derive(Debug, Clone, Default)]
pub struct FrontierStats {
    pub queued: usize,
    pub processed: usize,
    pub failed: usize,
}

impl FrontierStats {
    #[must_use]
    pub fn total(&self) -> usize {
        self.queued + self.processed + self.failed
    }
}

struct FrontierInner {
    /// Keyed by negated priority so `BTreeMap`'s natural ascending order
    /// yields highest-priority-first; FIFO within a class via the `VecDeque`.
    queued: BTreeMap<i64, VecDeque<CanonicalUrl>>,
    known: HashSet<CanonicalUrl>,
    depth: std::collections::HashMap<CanonicalUrl, u32>,
    processed: HashSet<CanonicalUrl>,
    /// Terminal failures, each carrying the error string that caused them
    /// (§3 "failed ... carries an error string").
    failed: std::collections::HashMap<CanonicalUrl, String>,
}

/// Three disjoint sets (`queued`, `processed`, `failed`) behind one mutex.
/// Invariant: every URL ever observed is in exactly one of the three.
pub struct Frontier {
    inner: Mutex<FrontierInner>,
}

impl Default for Frontier {
    fn default() -> Self {
        Self::new()
    }
}

impl Frontier {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(FrontierInner {
                queued: BTreeMap::new(),
                known: HashSet::new(),
                depth: std::collections::HashMap::new(),
                processed: HashSet::new(),
                failed: std::collections::HashMap::new(),
            }),
        }
    }

    /// Returns `true` iff `url` was not already known in any of the three
    /// sets. `depth[url]` is recorded at first add and never decreases.
    pub async fn add(&self, url: CanonicalUrl, priority: i64, depth: u32) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.known.contains(&url) {
            return false;
        }
        inner.known.insert(url.clone());
        inner.depth.insert(url.clone(), depth);
        inner.queued.entry(-priority).or_default().push_back(url);
        true
    }

    /// Removes and returns the highest-priority queued URL, FIFO within its
    /// priority class, alongside its recorded depth.
    pub async fn next(&self) -> Option<FrontierEntry> {
        let mut inner = self.inner.lock().await;

        let Some(&neg_priority) = inner.queued.keys().next() else { return None };
        let queue = inner.queued.get_mut(&neg_priority)?;
        let url = queue.pop_front()?;
        let emptied = queue.is_empty();
        if emptied {
            inner.queued.remove(&neg_priority);
        }

        let depth = inner.depth.get(&url).copied().unwrap_or(0);
        Some(FrontierEntry { url, priority: -neg_priority, depth })
    }

    pub async fn mark_processed(&self, url: &CanonicalUrl) {
        let mut inner = self.inner.lock().await;
        inner.processed.insert(url.clone());
    }

    pub async fn mark_failed(&self, url: &CanonicalUrl, error: &CrawlError) {
        let mut inner = self.inner.lock().await;
        inner.failed.insert(url.clone(), error.to_string());
    }

    pub async fn is_known(&self, url: &CanonicalUrl) -> bool {
        self.inner.lock().await.known.contains(url)
    }

    /// The error string recorded for a terminally-failed URL, if any.
    pub async fn failure_reason(&self, url: &CanonicalUrl) -> Option<String> {
        self.inner.lock().await.failed.get(url).cloned()
    }

    pub async fn stats(&self) -> FrontierStats {
        let inner = self.inner.lock().await;
        FrontierStats {
            queued: inner.queued.values().map(VecDeque::len).sum(),
            processed: inner.processed.len(),
            failed: inner.failed.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> CanonicalUrl {
        CanonicalUrl::parse(s).unwrap()
    }

    #[tokio::test]
    async fn add_is_idempotent_for_duplicates() {
        let frontier = Frontier::new();
        assert!(frontier.add(url("http://a/p"), 0, 0).await);
        assert!(!frontier.add(url("http://a/p/"), 0, 0).await);
        assert!(!frontier.add(url("http://a/p#z"), 0, 0).await);
    }

    #[tokio::test]
    async fn next_returns_highest_priority_first_fifo_within_class() {
        let frontier = Frontier::new();
        frontier.add(url("http://a/low1"), 0, 1).await;
        frontier.add(url("http://a/high"), 5, 1).await;
        frontier.add(url("http://a/low2"), 0, 1).await;

        assert_eq!(frontier.next().await.unwrap().url, url("http://a/high"));
        assert_eq!(frontier.next().await.unwrap().url, url("http://a/low1"));
        assert_eq!(frontier.next().await.unwrap().url, url("http://a/low2"));
        assert!(frontier.next().await.is_none());
    }

    #[tokio::test]
    async fn mark_processed_moves_out_of_queued() {
        let frontier = Frontier::new();
        let u = url("http://a/p");
        frontier.add(u.clone(), 0, 0).await;
        frontier.next().await;
        frontier.mark_processed(&u).await;
        let stats = frontier.stats().await;
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.queued, 0);
    }

    #[tokio::test]
    async fn mark_failed_records_the_error_string() {
        let frontier = Frontier::new();
        let u = url("http://a/gone");
        frontier.add(u.clone(), 0, 0).await;
        frontier.next().await;
        frontier.mark_failed(&u, &CrawlError::BlockedByRobots(u.as_str().to_string())).await;
        let reason = frontier.failure_reason(&u).await.unwrap();
        assert!(reason.contains("blocked by robots.txt"));
        assert_eq!(frontier.stats().await.failed, 1);
    }
}
