//! Configuration loading: a typed [`CrawlConfig`] with a builder and a
//! TOML file loader that warns on unrecognized top-level keys rather than
//! rejecting them.

pub mod types;

pub use types::CrawlConfig;

use tracing::warn;

const KNOWN_KEYS: &[&str] = &[
    "max_concurrent",
    "per_host_concurrent",
    "max_depth",
    "max_pages",
    "same_host_only",
    "include_patterns",
    "exclude_patterns",
    "requests_per_second",
    "min_delay",
    "jitter",
    "respect_robots",
    "user_agent",
    "retry_max_retries",
    "retry_backoff_factor",
    "retry_base_delay",
    "connect_timeout",
    "read_timeout",
    "total_timeout",
    "timeout_step",
    "circuit_breaker_threshold",
    "circuit_breaker_cooldown",
    "verify_tls",
    "backoff_base",
    "backoff_max",
];

/// Parses `text` as TOML, logging a warning for any top-level key this
/// version of `CrawlConfig` doesn't recognize, then deserializes over
/// [`CrawlConfig::default`].
pub fn load_toml(text: &str) -> Result<CrawlConfig, toml::de::Error> {
    if let Ok(toml::Value::Table(table)) = toml::from_str::<toml::Value>(text) {
        for key in table.keys() {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                warn!(key, "unknown configuration key, ignoring");
            }
        }
    }
    toml::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_recognized_keys_over_defaults() {
        let config = load_toml("max_concurrent = 42\nuser_agent = \"testbot\"\n").unwrap();
        assert_eq!(config.max_concurrent(), 42);
        assert_eq!(config.user_agent(), "testbot");
        assert_eq!(config.max_depth(), CrawlConfig::default().max_depth());
    }

    #[test]
    fn unknown_keys_do_not_fail_the_load() {
        let config = load_toml("totally_unknown_key = 1\nmax_pages = 5\n").unwrap();
        assert_eq!(config.max_pages(), 5);
    }
}
