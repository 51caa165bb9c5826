//! Pluggable persistent sinks for crawled pages.
//!
//! The orchestrator depends only on the [`Storage`] trait object; storage
//! failures are logged and never fail the URL that produced the record
//! (§4.11, §7).

mod csv;
mod jsonl;
mod sql;

pub use csv::CsvStorage;
pub use jsonl::JsonlStorage;
pub use sql::SqlStorage;

use async_trait::async_trait;
use thiserror::Error;

use crate::page_record::PageRecord;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(String),
}

/// Append-only, internally buffered persistence capability. Implementations
/// must be idempotent on `close`.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn save(&self, record: PageRecord) -> Result<(), StorageError>;
    async fn close(&self) -> Result<(), StorageError>;
}

/// Pick a storage back-end by the extension of `path`: `.jsonl` -> JSONL,
/// `.csv` -> CSV, `.db`/`.sqlite` -> SQL. Anything else defaults to JSONL.
pub async fn storage_for_path(path: &std::path::Path) -> Result<Box<dyn Storage>, StorageError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => Ok(Box::new(CsvStorage::new(path).await?)),
        Some("db" | "sqlite") => Ok(Box::new(SqlStorage::new(path).await?)),
        _ => Ok(Box::new(JsonlStorage::new(path).await?)),
    }
}
