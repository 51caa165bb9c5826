//! The concurrent fetch engine: frontier, concurrency controller, rate
//! limiter, robots cache, retry executor, circuit breaker, and the
//! orchestrator that drives them.

pub mod circuit_breaker;
pub mod concurrency;
pub mod frontier;
pub mod http_client;
pub mod orchestrator;
pub mod progress;
pub mod rate_limiter;
pub mod retry;
pub mod robots;
pub mod timeout;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use concurrency::{ConcurrencyController, ConcurrencyPermit};
pub use frontier::{Frontier, FrontierEntry, FrontierStats};
pub use orchestrator::{CrawlEngine, CrawlReport};
pub use progress::{LoggingProgress, NoOpProgress, ProgressReporter, ProgressSnapshot};
pub use rate_limiter::RateLimiter;
pub use retry::{retry, RetryOutcome, RetryPolicy};
pub use robots::RobotsCache;
pub use timeout::{AttemptTimeouts, TimeoutPolicy};
