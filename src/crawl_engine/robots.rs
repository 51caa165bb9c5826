//! `robots.txt` acquisition and caching, keyed by host.
//!
//! At most one in-flight fetch per host: concurrent callers for a
//! never-seen host share the same fetch future via a
//! `DashMap<String, Arc<OnceCell<RobotsEntry>>>`, the "per-key gate"
//! spec.md §4.5 describes — the same lazy-creation-must-be-atomic-with-
//! first-use discipline the teacher's per-domain semaphore registry uses.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use robotstxt::DefaultMatcher;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
struct RobotsEntry {
    body: Option<String>,
    crawl_delay: Duration,
}

/// Fetch-once-per-host cache evaluating `Allow`/`Disallow` and `Crawl-delay`.
pub struct RobotsCache {
    client: reqwest::Client,
    user_agent: String,
    entries: DashMap<String, Arc<OnceCell<RobotsEntry>>>,
}

impl RobotsCache {
    #[must_use]
    pub fn new(client: reqwest::Client, user_agent: String) -> Self {
        Self { client, user_agent, entries: DashMap::new() }
    }

    async fn entry_for(&self, scheme: &str, host: &str) -> RobotsEntry {
        let cell = self.entries.entry(host.to_string()).or_insert_with(|| Arc::new(OnceCell::new())).clone();

        cell.get_or_init(|| async {
            let robots_url = format!("{scheme}://{host}/robots.txt");
            match self.client.get(&robots_url).send().await {
                Ok(resp) if resp.status().is_success() => match resp.text().await {
                    Ok(body) => {
                        debug!(host, "cached robots.txt");
                        RobotsEntry { crawl_delay: extract_crawl_delay(&body, &self.user_agent), body: Some(body) }
                    }
                    Err(err) => {
                        warn!(host, error = %err, "failed to read robots.txt body, allowing everything");
                        RobotsEntry { body: None, crawl_delay: Duration::ZERO }
                    }
                },
                Ok(resp) => {
                    info!(host, status = %resp.status(), "robots.txt unavailable, allowing everything");
                    RobotsEntry { body: None, crawl_delay: Duration::ZERO }
                }
                Err(err) => {
                    warn!(host, error = %err, "failed to fetch robots.txt, allowing everything");
                    RobotsEntry { body: None, crawl_delay: Duration::ZERO }
                }
            }
        })
        .await
        .clone()
    }

    /// Whether `user_agent` may fetch `url` per the cached rules for its host.
    /// An unfetchable or absent `robots.txt` allows everything.
    pub async fn can_fetch(&self, url: &str, host: &str, scheme: &str) -> bool {
        let entry = self.entry_for(scheme, host).await;
        match entry.body {
            Some(body) => DefaultMatcher::default().one_agent_allowed_by_robots(&body, &self.user_agent, url),
            None => true,
        }
    }

    /// The `Crawl-delay:` directive for this host, or zero if absent or
    /// unavailable.
    pub async fn crawl_delay(&self, host: &str, scheme: &str) -> Duration {
        self.entry_for(scheme, host).await.crawl_delay
    }
}

/// `robotstxt` doesn't expose `Crawl-delay`, so it's parsed from the raw
/// text directly, honoring the longest-matching `User-agent:` block (our
/// own agent, falling back to `*`).
fn extract_crawl_delay(body: &str, user_agent: &str) -> Duration {
    let mut current_is_exact_match = false;
    let mut current_is_wildcard = false;
    let mut best: Option<f64> = None;
    let mut fallback: Option<f64> = None;

    for line in body.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else { continue };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                current_is_wildcard = value == "*";
                current_is_exact_match = value.eq_ignore_ascii_case(user_agent);
            }
            "crawl-delay" => {
                if let Ok(secs) = value.parse::<f64>() {
                    if current_is_exact_match {
                        best = Some(secs);
                    } else if current_is_wildcard {
                        fallback = Some(secs);
                    }
                }
            }
            _ => {}
        }
    }

    Duration::from_secs_f64(best.or(fallback).unwrap_or(0.0).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_crawl_delay_for_matching_agent() {
        let body = "User-agent: *\nDisallow: /private\nCrawl-delay: 2\n";
        assert_eq!(extract_crawl_delay(body, "mybot"), Duration::from_secs(2));
    }

    #[test]
    fn absent_crawl_delay_is_zero() {
        let body = "User-agent: *\nDisallow: /private\n";
        assert_eq!(extract_crawl_delay(body, "mybot"), Duration::ZERO);
    }

    #[tokio::test]
    async fn unavailable_robots_allows_everything() {
        let cache = RobotsCache::new(reqwest::Client::new(), "test-bot".to_string());
        // no network access in this test; host will never resolve and the
        // fetch will fail, which must still allow everything.
        let allowed = cache.can_fetch("http://127.0.0.1:1/x", "127.0.0.1:1", "http").await;
        assert!(allowed);
    }
}
