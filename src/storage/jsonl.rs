//! Line-delimited JSON storage: one JSON object per line, appended.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use super::{Storage, StorageError};
use crate::page_record::PageRecord;

pub struct JsonlStorage {
    file: Arc<Mutex<tokio::fs::File>>,
    total_saved: Arc<Mutex<u64>>,
}

impl JsonlStorage {
    pub async fn new(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let file = tokio::fs::OpenOptions::new().create(true).append(true).open(path).await?;
        Ok(Self { file: Arc::new(Mutex::new(file)), total_saved: Arc::new(Mutex::new(0)) })
    }
}

#[async_trait]
impl Storage for JsonlStorage {
    async fn save(&self, record: PageRecord) -> Result<(), StorageError> {
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;

        let mut total = self.total_saved.lock().await;
        *total += 1;
        Ok(())
    }

    async fn close(&self) -> Result<(), StorageError> {
        let mut file = self.file.lock().await;
        file.flush().await?;
        debug!(total = *self.total_saved.lock().await, "jsonl storage closed");
        Ok(())
    }
}
