//! Error taxonomy for fetch, parse, and crawl operations.
//!
//! `FetchError` is the unit the retry executor reasons about: every failure a
//! worker can observe collapses into one of its variants, and the variant
//! alone decides whether the retry executor tries again.

use std::fmt;
use thiserror::Error;

/// Error surfaced by a single attempt to fetch (and optionally parse) a page.
///
/// The retry executor only inspects the variant, never the message, to decide
/// whether to retry. Keep that decision table here rather than scattered at
/// call sites.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection-level failure that is likely to succeed on a later attempt:
    /// connect/read timeouts, connection reset, DNS resolution failure.
    #[error("transient network error: {0}")]
    Transient(String),

    /// Lower-level network failure distinct from a timeout (TLS handshake
    /// failure, connection refused). Retryable, same backoff treatment as
    /// `Transient`.
    #[error("network error: {0}")]
    Network(String),

    /// Server told us not to bother again: 4xx other than 429, robots.txt
    /// disallow, or a redirect loop. Never retried.
    #[error("permanent error: {0}")]
    Permanent(String),

    /// Fetch succeeded but the response body could not be parsed.
    /// Not retried — a different byte stream won't fix malformed markup.
    #[error("parse error: {0}")]
    Parse(String),

    /// Anything that doesn't fit the above. Treated as non-retryable by
    /// default so unexpected failures fail closed rather than loop forever.
    #[error("{0}")]
    Other(String),

    /// HTTP 429 or 503 with a `Retry-After` hint. Retried with the server's
    /// requested delay honored by the rate limiter's error backoff.
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<std::time::Duration> },
}

impl FetchError {
    /// Whether the retry executor should attempt this fetch again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Network(_) | Self::RateLimited { .. })
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transient(err.to_string())
        } else if err.is_connect() {
            Self::Network(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Errors surfaced at the crawl-engine level: admission decisions made
/// before a fetch is ever attempted, plus the terminal outcome passed to
/// `mark_failed`.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// The per-host circuit breaker is open; this URL was not attempted.
    #[error("circuit open for host {host}")]
    CircuitOpen { host: String },

    /// robots.txt disallows this path for our user agent.
    #[error("blocked by robots.txt: {0}")]
    BlockedByRobots(String),

    /// The fetch was attempted (possibly several times) and exhausted retries.
    #[error("fetch failed after {attempts} attempt(s): {source}")]
    FetchFailed { attempts: u32, #[source] source: FetchError },

    /// Configuration was invalid at crawl start.
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage sink failed to persist a record or close.
    #[error("storage error: {0}")]
    Storage(String),

    /// Sitemap collaborator failed to fetch or parse a sitemap.
    #[error("sitemap error: {0}")]
    Sitemap(String),

    /// Underlying I/O failure (config file, storage file).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias for crawl-engine level results.
pub type CrawlResult<T> = Result<T, CrawlError>;

/// Emitted by the frontier/orchestrator when a URL is dropped before being
/// queued. Not an error in the `std::error::Error` sense — a routine
/// filtering decision recorded for observability and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Already queued or already processed.
    Duplicate,
    /// Exceeds the configured max depth.
    TooDeep,
    /// Host not in the allow-list, or excluded by pattern.
    OutOfScope,
    /// URL failed to parse as an absolute http(s) URL.
    InvalidUrl,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Duplicate => "duplicate",
            Self::TooDeep => "too deep",
            Self::OutOfScope => "out of scope",
            Self::InvalidUrl => "invalid url",
        };
        f.write_str(s)
    }
}
