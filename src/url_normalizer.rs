//! URL canonicalization used everywhere identity is required: frontier
//! dedup, rate-limiter/robots/circuit-breaker host keys.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum UrlError {
    #[error("invalid url: {0}")]
    Parse(#[from] url::ParseError),
    #[error("url has no host: {0}")]
    NoHost(String),
    #[error("unsupported scheme {0:?}, only http/https are crawled")]
    UnsupportedScheme(String),
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    }
}

/// An immutable, cheaply-cloneable canonical URL.
///
/// Two `CanonicalUrl`s compare equal iff their canonical string forms match,
/// which is exactly the identity [`crate::error::SkipReason::Duplicate`]
/// checks are built on.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CanonicalUrl {
    canonical: Cow<'static, str>,
    url: Arc<Url>,
}

impl CanonicalUrl {
    /// Parse and normalize: strip fragment, strip one trailing `/` unless the
    /// path is exactly `/`, lowercase host, drop the scheme's default port.
    pub fn parse(input: &str) -> Result<Self, UrlError> {
        let mut url = Url::parse(input)?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(UrlError::UnsupportedScheme(url.scheme().to_string()));
        }
        if url.host_str().is_none() {
            return Err(UrlError::NoHost(input.to_string()));
        }

        url.set_fragment(None);

        if let Some(host) = url.host_str() {
            let lower = host.to_ascii_lowercase();
            if lower != host {
                let _ = url.set_host(Some(&lower));
            }
        }

        if url.port() == default_port(url.scheme()) {
            let _ = url.set_port(None);
        }

        if url.path().len() > 1 && url.path().ends_with('/') {
            let trimmed = url.path().trim_end_matches('/').to_string();
            url.set_path(&trimmed);
        }

        let canonical = Cow::Owned(url.as_str().to_string());
        Ok(Self { canonical, url: Arc::new(url) })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// Lowercased, port-stripped authority — the dedup/rate-limit/
    /// circuit-breaker key used throughout the crate.
    #[must_use]
    pub fn host(&self) -> &str {
        // parse() rejects urls without a host, so this always succeeds.
        self.url.host_str().unwrap_or_default()
    }

    #[must_use]
    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// Resolve a possibly-relative `href` found on this page against its URL,
    /// then normalize the result.
    pub fn join(&self, href: &str) -> Result<Self, UrlError> {
        let joined = self.url.join(href)?;
        Self::parse(joined.as_str())
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl PartialEq for CanonicalUrl {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}
impl Eq for CanonicalUrl {}

impl Hash for CanonicalUrl {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl FromStr for CanonicalUrl {
    type Err = UrlError;
    fn from_str(s: &str) -> Result<Self, UrlError> {
        Self::parse(s)
    }
}

impl AsRef<str> for CanonicalUrl {
    fn as_ref(&self) -> &str {
        &self.canonical
    }
}

impl Deref for CanonicalUrl {
    type Target = Url;
    fn deref(&self) -> &Self::Target {
        &self.url
    }
}

/// Normalize free function mirrored from the teacher's module shape
/// (the real work lives on [`CanonicalUrl::parse`]).
pub fn normalize(input: &str) -> Result<CanonicalUrl, UrlError> {
    CanonicalUrl::parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fragment() {
        let u = CanonicalUrl::parse("https://example.com/page#section1").unwrap();
        assert_eq!(u.as_str(), "https://example.com/page");
    }

    #[test]
    fn strips_trailing_slash_except_root() {
        let u = CanonicalUrl::parse("http://a/p/").unwrap();
        assert_eq!(u.as_str(), "http://a/p");
        let root = CanonicalUrl::parse("http://a/").unwrap();
        assert_eq!(root.as_str(), "http://a/");
    }

    #[test]
    fn dedup_equivalent_urls() {
        let a = CanonicalUrl::parse("http://a/p").unwrap();
        let b = CanonicalUrl::parse("http://a/p/").unwrap();
        let c = CanonicalUrl::parse("http://a/p#z").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn lowercases_host_and_drops_default_port() {
        let u = CanonicalUrl::parse("HTTP://Example.COM:80/x").unwrap();
        assert_eq!(u.host(), "example.com");
        assert_eq!(u.as_str(), "http://example.com/x");
    }

    #[test]
    fn keeps_nonstandard_port() {
        let u = CanonicalUrl::parse("http://example.com:8080/x").unwrap();
        assert_eq!(u.as_str(), "http://example.com:8080/x");
    }

    #[test]
    fn rejects_non_http_scheme() {
        assert!(matches!(CanonicalUrl::parse("ftp://example.com"), Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn join_resolves_relative_links() {
        let base = CanonicalUrl::parse("http://a/dir/page").unwrap();
        let joined = base.join("../x").unwrap();
        assert_eq!(joined.as_str(), "http://a/x");
    }
}
