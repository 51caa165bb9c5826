//! Drives the crawl loop: dequeue → admit → fetch → classify → parse →
//! enqueue children → record (§4.9).

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use regex::Regex;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::CrawlConfig;
use crate::crawl_engine::circuit_breaker::CircuitBreaker;
use crate::crawl_engine::concurrency::ConcurrencyController;
use crate::crawl_engine::frontier::{Frontier, FrontierStats};
use crate::crawl_engine::progress::{NoOpProgress, ProgressReporter, ProgressSnapshot};
use crate::crawl_engine::rate_limiter::RateLimiter;
use crate::crawl_engine::retry::{retry, RetryPolicy};
use crate::crawl_engine::robots::RobotsCache;
use crate::crawl_engine::timeout::{with_total_timeout, AttemptTimeouts, TimeoutPolicy};
use crate::error::{CrawlError, FetchError};
use crate::page_record::PageRecord;
use crate::parser::{HtmlParser, Parser};
use crate::storage::Storage;
use crate::url_normalizer::CanonicalUrl;

/// HTTP statuses the retry executor treats as transient (§4.2).
const TRANSIENT_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Returned by [`CrawlEngine::crawl`].
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub processed: u64,
    pub failed: u64,
    pub stats: FrontierStats,
    pub elapsed: Duration,
}

/// Compiled include/exclude filters plus the seed-host allow-list, built
/// once at crawl start and shared read-only across workers.
struct Filters {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
    seed_hosts: HashSet<String>,
}

impl Filters {
    fn admits(&self, url: &CanonicalUrl, child_depth: u32, config: &CrawlConfig) -> bool {
        if child_depth >= config.max_depth {
            return false;
        }
        if config.same_host_only && !self.seed_hosts.contains(url.host()) {
            return false;
        }
        if self.exclude.iter().any(|re| re.is_match(url.as_str())) {
            return false;
        }
        if !self.include.is_empty() && !self.include.iter().any(|re| re.is_match(url.as_str())) {
            return false;
        }
        true
    }
}

/// What a worker records when a URL does not end up `processed`.
enum Outcome {
    /// Admission rejection: circuit open, robots-blocked, or filtered out.
    Rejected { blocked: bool },
    /// Retries exhausted on a classified fetch error.
    Errored,
}

/// Owns every shared subsystem for one crawl run: the frontier, concurrency
/// controller, rate limiter, robots cache, and circuit breaker, plus the
/// pluggable parser and storage sink.
pub struct CrawlEngine {
    config: CrawlConfig,
    client: reqwest::Client,
    frontier: Frontier,
    concurrency: ConcurrencyController,
    rate_limiter: RateLimiter,
    robots: RobotsCache,
    circuit_breaker: CircuitBreaker,
    parser: Arc<dyn Parser>,
    storage: Arc<dyn Storage>,
    progress: Arc<dyn ProgressReporter>,
    cancellation: CancellationToken,
}

impl CrawlEngine {
    /// Builds the engine with the default HTML parser.
    ///
    /// # Errors
    /// Returns an error if the HTTP client fails to build from `config`.
    pub fn new(config: CrawlConfig, storage: Arc<dyn Storage>) -> Result<Self, CrawlError> {
        Self::with_parser(config, storage, Arc::new(HtmlParser))
    }

    /// # Errors
    /// Returns an error if the HTTP client fails to build from `config`.
    pub fn with_parser(config: CrawlConfig, storage: Arc<dyn Storage>, parser: Arc<dyn Parser>) -> Result<Self, CrawlError> {
        let client =
            crate::crawl_engine::http_client::build_client(&config).map_err(|e| CrawlError::Config(e.to_string()))?;

        let rate_limiter = RateLimiter::new(
            config.requests_per_second,
            true,
            Duration::from_secs_f64(config.min_delay),
            Duration::from_secs_f64(config.jitter),
            Duration::from_secs_f64(config.backoff_base),
            config.retry_backoff_factor,
            Duration::from_secs_f64(config.backoff_max),
        );
        let robots = RobotsCache::new(client.clone(), config.user_agent.clone());
        let circuit_breaker =
            CircuitBreaker::new(config.circuit_breaker_threshold, Duration::from_secs_f64(config.circuit_breaker_cooldown));
        let concurrency = ConcurrencyController::new(config.max_concurrent, config.per_host_concurrent);

        Ok(Self {
            config,
            client,
            frontier: Frontier::new(),
            concurrency,
            rate_limiter,
            robots,
            circuit_breaker,
            parser,
            storage,
            progress: Arc::new(NoOpProgress),
            cancellation: CancellationToken::new(),
        })
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// A token the caller can cancel (e.g. from a `SIGINT` handler) to stop
    /// dispatching new URLs and drain in-flight work.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Normalizes each seed at depth 0, then runs up to `max_concurrent`
    /// worker tasks pulling from the frontier until it is empty with nothing
    /// in flight, `max_pages` is reached, or the cancellation token fires.
    /// Closes storage exactly once after every worker has drained.
    pub async fn crawl(self: Arc<Self>, seeds: &[String]) -> CrawlReport {
        let start = Instant::now();
        let mut seed_hosts = HashSet::new();

        for seed in seeds {
            match CanonicalUrl::parse(seed) {
                Ok(url) => {
                    seed_hosts.insert(url.host().to_string());
                    self.frontier.add(url, 0, 0).await;
                }
                Err(err) => warn!(seed, error = %err, "skipping unparseable seed"),
            }
        }

        let filters = Arc::new(Filters {
            include: compile_patterns(&self.config.include_patterns),
            exclude: compile_patterns(&self.config.exclude_patterns),
            seed_hosts,
        });

        let processed_count = Arc::new(AtomicU64::new(0));
        let failed_count = Arc::new(AtomicU64::new(0));
        let blocked_count = Arc::new(AtomicU64::new(0));
        let error_count = Arc::new(AtomicU64::new(0));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let delay_total = Arc::new(Mutex::new(Duration::ZERO));
        let delay_samples = Arc::new(AtomicU64::new(0));

        let mut workers = Vec::with_capacity(self.config.max_concurrent);
        for _ in 0..self.config.max_concurrent {
            let engine = self.clone();
            let filters = filters.clone();
            let processed_count = processed_count.clone();
            let failed_count = failed_count.clone();
            let blocked_count = blocked_count.clone();
            let error_count = error_count.clone();
            let in_flight = in_flight.clone();
            let delay_total = delay_total.clone();
            let delay_samples = delay_samples.clone();

            workers.push(tokio::spawn(async move {
                loop {
                    if engine.cancellation.is_cancelled() {
                        break;
                    }
                    if processed_count.load(Ordering::SeqCst) as usize >= engine.config.max_pages {
                        break;
                    }

                    let Some(entry) = engine.frontier.next().await else {
                        if in_flight.load(Ordering::SeqCst) == 0 {
                            break;
                        }
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        continue;
                    };

                    in_flight.fetch_add(1, Ordering::SeqCst);
                    let outcome = engine
                        .clone()
                        .process_url(entry.url, entry.depth, &filters, &delay_total, &delay_samples)
                        .await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);

                    match outcome {
                        Ok(()) => {
                            processed_count.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(Outcome::Rejected { blocked }) => {
                            failed_count.fetch_add(1, Ordering::SeqCst);
                            if blocked {
                                blocked_count.fetch_add(1, Ordering::SeqCst);
                            }
                        }
                        Err(Outcome::Errored) => {
                            failed_count.fetch_add(1, Ordering::SeqCst);
                            error_count.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                }
            }));
        }

        let progress_handle = {
            let engine = self.clone();
            let processed_count = processed_count.clone();
            let failed_count = failed_count.clone();
            let blocked_count = blocked_count.clone();
            let error_count = error_count.clone();
            let delay_total = delay_total.clone();
            let delay_samples = delay_samples.clone();
            let cancellation = self.cancellation.clone();

            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        () = tokio::time::sleep(Duration::from_millis(500)) => {}
                        () = cancellation.cancelled() => break,
                    }
                    let stats = engine.frontier.stats().await;
                    let samples = delay_samples.load(Ordering::SeqCst).max(1);
                    let avg_delay = *delay_total.lock().await / u32::try_from(samples).unwrap_or(u32::MAX);
                    engine.progress.report(ProgressSnapshot {
                        processed: processed_count.load(Ordering::SeqCst),
                        queued: stats.queued as u64,
                        failed: failed_count.load(Ordering::SeqCst),
                        blocked: blocked_count.load(Ordering::SeqCst),
                        errors: error_count.load(Ordering::SeqCst),
                        pages_per_sec: processed_count.load(Ordering::SeqCst) as f64 / start.elapsed().as_secs_f64().max(0.001),
                        avg_delay,
                        elapsed: start.elapsed(),
                    });
                }
            })
        };

        for worker in workers {
            let _ = worker.await;
        }
        progress_handle.abort();

        if let Err(err) = self.storage.close().await {
            error!(error = %err, "storage close failed");
        }

        CrawlReport {
            processed: processed_count.load(Ordering::SeqCst),
            failed: failed_count.load(Ordering::SeqCst),
            stats: self.frontier.stats().await,
            elapsed: start.elapsed(),
        }
    }

    async fn process_url(
        self: Arc<Self>,
        url: CanonicalUrl,
        depth: u32,
        filters: &Arc<Filters>,
        delay_total: &Arc<Mutex<Duration>>,
        delay_samples: &Arc<AtomicU64>,
    ) -> Result<(), Outcome> {
        let host = url.host().to_string();

        if !self.circuit_breaker.should_attempt(&host) {
            debug!(url = %url, host, "admission rejected: circuit open");
            self.frontier.mark_failed(&url, &CrawlError::CircuitOpen { host: host.clone() }).await;
            return Err(Outcome::Rejected { blocked: false });
        }

        if self.config.respect_robots {
            let allowed = self.robots.can_fetch(url.as_str(), &host, url.scheme()).await;
            if !allowed {
                warn!(url = %url, "blocked by robots.txt");
                self.frontier.mark_failed(&url, &CrawlError::BlockedByRobots(url.as_str().to_string())).await;
                return Err(Outcome::Rejected { blocked: true });
            }
        }

        let permit = self.concurrency.acquire(&host).await;
        let crawl_delay =
            if self.config.respect_robots { self.robots.crawl_delay(&host, url.scheme()).await } else { Duration::ZERO };

        let timeout_policy = TimeoutPolicy {
            connect: Duration::from_secs_f64(self.config.connect_timeout),
            read: Duration::from_secs_f64(self.config.read_timeout),
            total: Duration::from_secs_f64(self.config.total_timeout),
            step: Duration::from_secs_f64(self.config.timeout_step),
        };
        let retry_policy = RetryPolicy {
            max_retries: self.config.retry_max_retries,
            base_delay: Duration::from_secs_f64(self.config.retry_base_delay),
            backoff_factor: self.config.retry_backoff_factor,
        };

        let attempt_start = Instant::now();
        let outcome = retry(retry_policy, |attempt| {
            let engine = self.clone();
            let url = url.clone();
            let host = host.clone();
            let timeouts = timeout_policy.for_attempt(attempt);
            async move {
                engine.rate_limiter.acquire(&host).await;
                if !crawl_delay.is_zero() {
                    tokio::time::sleep(crawl_delay).await;
                }
                let result = with_total_timeout(engine.fetch_once(&url, timeouts), timeouts).await;
                match &result {
                    Ok(_) => engine.rate_limiter.record_success(&host).await,
                    Err(_) => engine.rate_limiter.record_error(&host).await,
                }
                result
            }
        })
        .await;

        {
            let mut total = delay_total.lock().await;
            *total += attempt_start.elapsed();
        }
        delay_samples.fetch_add(1, Ordering::SeqCst);
        drop(permit);

        match outcome.result {
            Ok((status, body, content_type)) => {
                self.circuit_breaker.record_success(&host);
                let record = self.parser.parse(&body, &url, status, content_type);

                self.frontier.mark_processed(&url).await;
                if let Err(err) = self.storage.save(record.clone()).await {
                    error!(url = %url, error = %err, "storage save failed");
                }

                self.enqueue_children(depth, &record, filters).await;
                Ok(())
            }
            Err(err) => {
                self.circuit_breaker.record_failure(&host);
                let attempts = outcome.delays.len() as u32 + 1;
                self.frontier.mark_failed(&url, &CrawlError::FetchFailed { attempts, source: err }).await;
                Err(Outcome::Errored)
            }
        }
    }

    /// Parser output already carries absolute, joined links (§3), so
    /// enqueueing only needs to filter and assign `priority = -(child_depth)`
    /// (deeper URLs sort strictly lower, §4.9).
    async fn enqueue_children(&self, depth: u32, record: &PageRecord, filters: &Filters) {
        let child_depth = depth + 1;
        for link in &record.links {
            let Ok(child) = CanonicalUrl::parse(link) else { continue };
            if self.frontier.is_known(&child).await {
                continue;
            }
            if !filters.admits(&child, child_depth, &self.config) {
                continue;
            }
            self.frontier.add(child, -i64::from(child_depth), child_depth).await;
        }
    }

    /// Issues one GET, applying `timeouts.connect` to the connect-and-send
    /// phase and `timeouts.read` to reading the body; both grow linearly with
    /// the retry attempt (§4.10). `timeouts.total` bounds the whole attempt
    /// via [`with_total_timeout`] in the caller.
    async fn fetch_once(&self, url: &CanonicalUrl, timeouts: AttemptTimeouts) -> Result<(u16, Vec<u8>, Option<String>), FetchError> {
        let response = tokio::time::timeout(timeouts.connect, self.client.get(url.as_str()).send())
            .await
            .map_err(|_| FetchError::Transient(format!("connect timeout after {:?}", timeouts.connect)))?
            .map_err(FetchError::from)?;

        let status = response.status();
        let content_type = response.headers().get("content-type").and_then(|v| v.to_str().ok()).map(str::to_string);
        let code = status.as_u16();

        if TRANSIENT_STATUSES.contains(&code) {
            return Err(FetchError::Transient(format!("HTTP {status}")));
        }
        if status.is_client_error() {
            return Err(FetchError::Permanent(format!("HTTP {status}")));
        }
        if !status.is_success() && !status.is_redirection() {
            return Err(FetchError::Permanent(format!("HTTP {status}")));
        }

        let body = tokio::time::timeout(timeouts.read, response.bytes())
            .await
            .map_err(|_| FetchError::Transient(format!("read timeout after {:?}", timeouts.read)))?
            .map_err(FetchError::from)?;
        info!(url = %url, status = %status, "fetched");
        Ok((code, body.to_vec(), content_type))
    }
}

fn compile_patterns(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| match Regex::new(p) {
            Ok(re) => Some(re),
            Err(err) => {
                warn!(pattern = p, error = %err, "ignoring invalid filter pattern");
                None
            }
        })
        .collect()
}
