//! Sitemap discovery: a read-only URL enumerator consulted before crawling.
//!
//! Handles both `<urlset>` (leaf sitemaps) and `<sitemapindex>` (recursing
//! into child sitemaps), guarding against cycles by tracking already-fetched
//! sitemap URLs.

use std::collections::HashSet;

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use tracing::{debug, info, warn};

use crate::url_normalizer::CanonicalUrl;

const WELL_KNOWN_PATHS: &[&str] =
    &["/sitemap.xml", "/sitemap_index.xml", "/sitemap/sitemap.xml", "/sitemaps/sitemap.xml"];

/// Reads sitemaps over an `&reqwest::Client`, recursing through sitemap
/// indexes and guarding against a sitemap that (directly or indirectly)
/// references itself.
pub struct SitemapReader {
    client: reqwest::Client,
    visited: HashSet<String>,
}

impl SitemapReader {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client, visited: HashSet::new() }
    }

    /// Fetch one sitemap URL, recursing into any child sitemaps it names.
    pub async fn fetch_sitemap(&mut self, sitemap_url: &str) -> Vec<CanonicalUrl> {
        let key = sitemap_url.trim_end_matches('/').to_string();
        if self.visited.contains(&key) {
            debug!(sitemap = %key, "sitemap already visited, skipping");
            return Vec::new();
        }
        self.visited.insert(key.clone());

        info!(sitemap = %key, "fetching sitemap");
        let body = match self.client.get(sitemap_url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => body,
                Err(err) => {
                    warn!(sitemap = %key, error = %err, "failed to read sitemap body");
                    return Vec::new();
                }
            },
            Ok(resp) => {
                warn!(sitemap = %key, status = %resp.status(), "sitemap fetch returned non-success status");
                return Vec::new();
            }
            Err(err) => {
                warn!(sitemap = %key, error = %err, "failed to fetch sitemap");
                return Vec::new();
            }
        };

        let (child_sitemaps, locs) = match parse_sitemap_xml(&body) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(sitemap = %key, error = %err, "failed to parse sitemap xml");
                return Vec::new();
            }
        };

        let mut urls = Vec::new();
        if !child_sitemaps.is_empty() {
            info!(sitemap = %key, count = child_sitemaps.len(), "found sitemap index");
            for child in child_sitemaps {
                urls.extend(Box::pin(self.fetch_sitemap(&child)).await);
            }
        }
        if !locs.is_empty() {
            info!(sitemap = %key, count = locs.len(), "found urls in sitemap");
        }
        for loc in locs {
            if let Ok(canonical) = CanonicalUrl::parse(&loc) {
                urls.push(canonical);
            }
        }
        urls
    }

    /// Probe the well-known sitemap paths under `base_url`, then fall back to
    /// a `Sitemap:` directive in `robots.txt`.
    pub async fn discover(&mut self, base_url: &str) -> Vec<CanonicalUrl> {
        for path in WELL_KNOWN_PATHS {
            let Ok(candidate) = reqwest::Url::parse(base_url).and_then(|u| u.join(path)) else { continue };
            let urls = self.fetch_sitemap(candidate.as_str()).await;
            if !urls.is_empty() {
                info!(url = %candidate, count = urls.len(), "found sitemap");
                return urls;
            }
        }

        if let Ok(robots_url) = reqwest::Url::parse(base_url).and_then(|u| u.join("/robots.txt")) {
            if let Ok(resp) = self.client.get(robots_url).send().await {
                if resp.status().is_success() {
                    if let Ok(text) = resp.text().await {
                        for line in text.lines() {
                            let line = line.trim();
                            if let Some(rest) = line.to_ascii_lowercase().strip_prefix("sitemap:") {
                                let sitemap_url = line[line.len() - rest.trim().len()..].trim().to_string();
                                let urls = self.fetch_sitemap(&sitemap_url).await;
                                if !urls.is_empty() {
                                    return urls;
                                }
                            }
                        }
                    }
                }
            }
        }

        warn!(base_url, "could not find a sitemap");
        Vec::new()
    }
}

/// Returns `(child_sitemap_urls, page_urls)`.
fn parse_sitemap_xml(xml: &str) -> Result<(Vec<String>, Vec<String>), quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut child_sitemaps = Vec::new();
    let mut locs = Vec::new();
    let mut in_sitemap_entry = false;
    let mut in_loc = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => {
                match local_name(e.name().as_ref()) {
                    "sitemap" => in_sitemap_entry = true,
                    "loc" => in_loc = true,
                    _ => {}
                }
            }
            Event::End(e) => match local_name(e.name().as_ref()) {
                "sitemap" => in_sitemap_entry = false,
                "loc" => in_loc = false,
                _ => {}
            },
            Event::Text(t) => {
                if in_loc {
                    let text = t.unescape()?.trim().to_string();
                    if !text.is_empty() {
                        if in_sitemap_entry {
                            child_sitemaps.push(text);
                        } else {
                            locs.push(text);
                        }
                    }
                }
            }
            _ => {}
        }
        buf.clear();
    }

    Ok((child_sitemaps, locs))
}

fn local_name(qualified: &[u8]) -> &str {
    let s = std::str::from_utf8(qualified).unwrap_or("");
    s.rsplit(':').next().unwrap_or(s)
}
