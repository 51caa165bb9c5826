//! CSV storage: header row written on first flush, nested fields
//! JSON-encoded in-cell, RFC-4180 escaping via the `csv` crate.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use super::{Storage, StorageError};
use crate::page_record::PageRecord;

/// The flattened, per-cell shape written to CSV: nested collections are
/// JSON-encoded strings, matching the original storage adapter's
/// `_flatten_data` behavior.
#[derive(Serialize)]
struct FlatRecord {
    url: String,
    title: String,
    text: String,
    links: String,
    metadata: String,
    images: String,
    headings: String,
    tables: String,
    lists: String,
    status_code: u16,
    content_type: String,
    crawled_at: String,
}

impl From<&PageRecord> for FlatRecord {
    fn from(r: &PageRecord) -> Self {
        Self {
            url: r.url.clone(),
            title: r.title.clone().unwrap_or_default(),
            text: r.text.clone(),
            links: serde_json::to_string(&r.links).unwrap_or_default(),
            metadata: serde_json::to_string(&r.metadata).unwrap_or_default(),
            images: serde_json::to_string(&r.images).unwrap_or_default(),
            headings: serde_json::to_string(&r.headings).unwrap_or_default(),
            tables: serde_json::to_string(&r.tables).unwrap_or_default(),
            lists: serde_json::to_string(&r.lists).unwrap_or_default(),
            status_code: r.status_code,
            content_type: r.content_type.clone().unwrap_or_default(),
            crawled_at: r.crawled_at.to_rfc3339(),
        }
    }
}

pub struct CsvStorage {
    path: PathBuf,
    buffer: Arc<Mutex<Vec<PageRecord>>>,
    header_written: Arc<Mutex<bool>>,
    total_saved: Arc<Mutex<u64>>,
}

impl CsvStorage {
    pub async fn new(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let header_written = tokio::fs::metadata(path).await.map(|m| m.len() > 0).unwrap_or(false);
        Ok(Self {
            path: path.to_path_buf(),
            buffer: Arc::new(Mutex::new(Vec::new())),
            header_written: Arc::new(Mutex::new(header_written)),
            total_saved: Arc::new(Mutex::new(0)),
        })
    }

    async fn flush(&self) -> Result<(), StorageError> {
        let mut buffer = self.buffer.lock().await;
        if buffer.is_empty() {
            return Ok(());
        }
        let records = std::mem::take(&mut *buffer);
        drop(buffer);

        let mut header_written = self.header_written.lock().await;
        let path = self.path.clone();
        let write_header = !*header_written;

        let count = records.len();
        let written = tokio::task::spawn_blocking(move || -> Result<usize, std::io::Error> {
            let file = std::fs::OpenOptions::new().create(true).append(true).open(&path)?;
            let mut writer = ::csv::WriterBuilder::new().has_headers(write_header).from_writer(file);
            for record in &records {
                writer.serialize(FlatRecord::from(record))?;
            }
            writer.flush()?;
            Ok(records.len())
        })
        .await
        .map_err(|e| StorageError::Database(format!("csv writer task panicked: {e}")))??;

        *header_written = true;
        debug!(count = written, "flushed records to csv");

        let mut total = self.total_saved.lock().await;
        *total += count as u64;
        Ok(())
    }
}

#[async_trait]
impl Storage for CsvStorage {
    async fn save(&self, record: PageRecord) -> Result<(), StorageError> {
        self.buffer.lock().await.push(record);
        self.flush().await
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.flush().await?;
        debug!(total = *self.total_saved.lock().await, "csv storage closed");
        Ok(())
    }
}
