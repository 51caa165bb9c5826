//! The parser's output record, persisted by a [`crate::storage::Storage`] sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata extracted from `<meta>` tags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageMetadata {
    pub description: Option<String>,
    pub keywords: Option<String>,
}

/// A single `<img>` reference found on the page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageImage {
    pub src: String,
    pub alt: Option<String>,
}

/// The fields a `Parser` produces for one fetched page.
///
/// Parsing never fails outright: a malformed body yields a record with
/// `parse_error` set and every other field left at its default, rather than
/// an error thrown back to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub url: String,
    pub title: Option<String>,
    pub text: String,
    pub links: Vec<String>,
    pub metadata: PageMetadata,
    pub images: Vec<PageImage>,
    pub headings: Vec<String>,
    pub tables: Vec<Vec<Vec<String>>>,
    pub lists: Vec<Vec<String>>,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub crawled_at: DateTime<Utc>,
    /// Set by a `Parser` that could not produce structured fields at all.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parse_error: Option<String>,
}

impl PageRecord {
    /// A record for a body the parser could not make sense of at all.
    #[must_use]
    pub fn parse_failed(url: &str, status_code: u16, content_type: Option<String>, error: String) -> Self {
        Self {
            url: url.to_string(),
            title: None,
            text: String::new(),
            links: Vec::new(),
            metadata: PageMetadata::default(),
            images: Vec::new(),
            headings: Vec::new(),
            tables: Vec::new(),
            lists: Vec::new(),
            status_code,
            content_type,
            crawled_at: Utc::now(),
            parse_error: Some(error),
        }
    }
}
