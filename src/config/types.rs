//! `CrawlConfig`: every tunable the crawl engine reads, with sensible
//! defaults and a fluent builder.

use serde::{Deserialize, Serialize};

/// Configuration for one crawl run.
///
/// Builder methods (`with_*`) return `Self` so call sites read as a chain
/// off [`CrawlConfig::default`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub(crate) max_concurrent: usize,
    pub(crate) per_host_concurrent: usize,
    pub(crate) max_depth: u32,
    pub(crate) max_pages: usize,
    pub(crate) same_host_only: bool,
    pub(crate) include_patterns: Vec<String>,
    pub(crate) exclude_patterns: Vec<String>,

    pub(crate) requests_per_second: f64,
    pub(crate) min_delay: f64,
    pub(crate) jitter: f64,

    pub(crate) respect_robots: bool,
    pub(crate) user_agent: String,

    pub(crate) retry_max_retries: u32,
    pub(crate) retry_backoff_factor: f64,
    pub(crate) retry_base_delay: f64,

    pub(crate) connect_timeout: f64,
    pub(crate) read_timeout: f64,
    pub(crate) total_timeout: f64,
    /// Per-attempt linear growth applied to each timeout bound, in seconds.
    pub(crate) timeout_step: f64,

    pub(crate) circuit_breaker_threshold: u32,
    pub(crate) circuit_breaker_cooldown: f64,

    pub(crate) verify_tls: bool,

    /// Rate-limiter error backoff: base delay, growth factor, and cap, in
    /// seconds. Not named individually in spec.md §3's enumerated list but
    /// required by §4.4's backoff term.
    pub(crate) backoff_base: f64,
    pub(crate) backoff_max: f64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            per_host_concurrent: 2,
            max_depth: 3,
            max_pages: 1_000,
            same_host_only: true,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),

            requests_per_second: 1.0,
            min_delay: 0.0,
            jitter: 0.0,

            respect_robots: true,
            user_agent: "politecrawl/0.1".to_string(),

            retry_max_retries: 3,
            retry_backoff_factor: 2.0,
            retry_base_delay: 0.5,

            connect_timeout: 10.0,
            read_timeout: 30.0,
            total_timeout: 30.0,
            timeout_step: 5.0,

            circuit_breaker_threshold: 5,
            circuit_breaker_cooldown: 30.0,

            verify_tls: true,

            backoff_base: 0.0,
            backoff_max: 5.0,
        }
    }
}

impl CrawlConfig {
    #[must_use]
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    #[must_use]
    pub fn with_per_host_concurrent(mut self, n: usize) -> Self {
        self.per_host_concurrent = n;
        self
    }

    #[must_use]
    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth;
        self
    }

    #[must_use]
    pub fn with_max_pages(mut self, n: usize) -> Self {
        self.max_pages = n;
        self
    }

    #[must_use]
    pub fn with_same_host_only(mut self, same_host_only: bool) -> Self {
        self.same_host_only = same_host_only;
        self
    }

    #[must_use]
    pub fn with_include_patterns(mut self, patterns: Vec<String>) -> Self {
        self.include_patterns = patterns;
        self
    }

    #[must_use]
    pub fn with_exclude_patterns(mut self, patterns: Vec<String>) -> Self {
        self.exclude_patterns = patterns;
        self
    }

    #[must_use]
    pub fn with_requests_per_second(mut self, rps: f64) -> Self {
        self.requests_per_second = rps;
        self
    }

    #[must_use]
    pub fn with_min_delay(mut self, seconds: f64) -> Self {
        self.min_delay = seconds;
        self
    }

    #[must_use]
    pub fn with_jitter(mut self, seconds: f64) -> Self {
        self.jitter = seconds;
        self
    }

    #[must_use]
    pub fn with_respect_robots(mut self, respect: bool) -> Self {
        self.respect_robots = respect;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    #[must_use]
    pub fn with_retry_max_retries(mut self, n: u32) -> Self {
        self.retry_max_retries = n;
        self
    }

    #[must_use]
    pub fn with_retry_base_delay(mut self, seconds: f64) -> Self {
        self.retry_base_delay = seconds;
        self
    }

    #[must_use]
    pub fn with_retry_backoff_factor(mut self, factor: f64) -> Self {
        self.retry_backoff_factor = factor;
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, connect: f64, read: f64, total: f64) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self.total_timeout = total;
        self
    }

    #[must_use]
    pub fn with_circuit_breaker(mut self, threshold: u32, cooldown: f64) -> Self {
        self.circuit_breaker_threshold = threshold;
        self.circuit_breaker_cooldown = cooldown;
        self
    }

    #[must_use]
    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    #[must_use]
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    #[must_use]
    pub fn per_host_concurrent(&self) -> usize {
        self.per_host_concurrent
    }

    #[must_use]
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    #[must_use]
    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    #[must_use]
    pub fn same_host_only(&self) -> bool {
        self.same_host_only
    }

    #[must_use]
    pub fn include_patterns(&self) -> &[String] {
        &self.include_patterns
    }

    #[must_use]
    pub fn exclude_patterns(&self) -> &[String] {
        &self.exclude_patterns
    }

    #[must_use]
    pub fn respect_robots(&self) -> bool {
        self.respect_robots
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}
