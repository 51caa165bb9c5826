//! `reqwest::Client` construction from [`crate::config::CrawlConfig`].

use crate::config::CrawlConfig;

/// Builds a client with the configured TLS verification and user agent.
///
/// No connect/read/total timeout is set at the client level: all three
/// bounds grow linearly with the retry attempt index (§4.9/§4.10), so they
/// are applied per-attempt by the orchestrator (`fetch_once`) instead of
/// pinned once here, where `reqwest`'s client-level timeout would otherwise
/// cap every attempt at the base (attempt-0) value.
pub fn build_client(config: &CrawlConfig) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().user_agent(&config.user_agent).danger_accept_invalid_certs(!config.verify_tls).build()
}
