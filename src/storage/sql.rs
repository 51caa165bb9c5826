//! SQL storage: a single `pages` table keyed uniquely by `url`, nested
//! fields stored as JSON text, upsert-on-conflict, against SQLite.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tokio::sync::Mutex;
use tracing::debug;

use super::{Storage, StorageError};
use crate::page_record::PageRecord;

pub struct SqlStorage {
    pool: SqlitePool,
    total_saved: Arc<Mutex<u64>>,
}

impl SqlStorage {
    pub async fn new(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let url = format!("sqlite://{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&url)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        sqlx::query(
            r"CREATE TABLE IF NOT EXISTS pages (
                url TEXT PRIMARY KEY,
                title TEXT,
                text TEXT,
                links TEXT,
                metadata TEXT,
                images TEXT,
                headings TEXT,
                tables TEXT,
                lists TEXT,
                status_code INTEGER,
                content_type TEXT,
                crawled_at TEXT
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(Self { pool, total_saved: Arc::new(Mutex::new(0)) })
    }
}

#[async_trait]
impl Storage for SqlStorage {
    async fn save(&self, record: PageRecord) -> Result<(), StorageError> {
        let links = serde_json::to_string(&record.links)?;
        let metadata = serde_json::to_string(&record.metadata)?;
        let images = serde_json::to_string(&record.images)?;
        let headings = serde_json::to_string(&record.headings)?;
        let tables = serde_json::to_string(&record.tables)?;
        let lists = serde_json::to_string(&record.lists)?;

        sqlx::query(
            r"INSERT INTO pages
                (url, title, text, links, metadata, images, headings, tables, lists, status_code, content_type, crawled_at)
              VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
              ON CONFLICT(url) DO UPDATE SET
                title = excluded.title, text = excluded.text, links = excluded.links,
                metadata = excluded.metadata, images = excluded.images, headings = excluded.headings,
                tables = excluded.tables, lists = excluded.lists, status_code = excluded.status_code,
                content_type = excluded.content_type, crawled_at = excluded.crawled_at",
        )
        .bind(&record.url)
        .bind(&record.title)
        .bind(&record.text)
        .bind(links)
        .bind(metadata)
        .bind(images)
        .bind(headings)
        .bind(tables)
        .bind(lists)
        .bind(i64::from(record.status_code))
        .bind(&record.content_type)
        .bind(record.crawled_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Database(e.to_string()))?;

        let mut total = self.total_saved.lock().await;
        *total += 1;
        Ok(())
    }

    async fn close(&self) -> Result<(), StorageError> {
        debug!(total = *self.total_saved.lock().await, "sql storage closed");
        self.pool.close().await;
        Ok(())
    }
}
