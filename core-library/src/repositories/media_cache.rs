//! Flattened node cache repository
//!
//! Rows are stamped with the generation of the snapshot that wrote them.
//! A snapshot is committed by upserting every row with a fresh generation and
//! then collecting all rows whose generation is older.

use crate::error::Result;
use crate::models::{CacheRow, Visibility};
use crate::repositories::{get_i64, get_optional_i64, get_string, missing_column};
use bridge_traits::database::{DatabaseAdapter, QueryRow, QueryValue};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, instrument};

#[async_trait::async_trait]
pub trait MediaCacheRepository: Send + Sync {
    /// Insert or replace rows keyed by `doc_id` in one transaction.
    ///
    /// Returns the number of rows written.
    async fn upsert_batch(&self, visibility: Visibility, rows: &[CacheRow]) -> Result<u64>;

    /// Delete every row whose generation is strictly older than `generation_id`.
    async fn delete_older_than(&self, visibility: Visibility, generation_id: i64) -> Result<u64>;

    /// All rows of a scope, in storage order.
    async fn all_rows(&self, visibility: Visibility) -> Result<Vec<CacheRow>>;

    /// Highest persisted generation, `None` for an empty cache.
    async fn max_generation(&self, visibility: Visibility) -> Result<Option<i64>>;

    async fn count(&self, visibility: Visibility) -> Result<i64>;
}

/// SQLite implementation of MediaCacheRepository
pub struct SqliteMediaCacheRepository {
    adapter: Arc<dyn DatabaseAdapter>,
}

impl SqliteMediaCacheRepository {
    pub fn new(adapter: Arc<dyn DatabaseAdapter>) -> Self {
        Self { adapter }
    }

    /// Convenience constructor using an existing `sqlx` pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        use crate::adapters::sqlite_native::SqliteAdapter;
        Self::new(Arc::new(SqliteAdapter::from_pool(pool)))
    }

    fn row_params(row: &CacheRow) -> Vec<QueryValue> {
        vec![
            QueryValue::Text(row.doc_id.clone()),
            QueryValue::Text(row.parent_id.clone()),
            QueryValue::Text(row.display_name.clone()),
            QueryValue::Text(row.mime_type.clone()),
            QueryValue::Integer(row.size),
            QueryValue::Integer(row.last_modified),
            QueryValue::Integer(row.generation_id),
            QueryValue::Text(row.locator.clone()),
            QueryValue::Text(row.root_locator.clone()),
            QueryValue::Text(row.file_path.clone()),
            QueryValue::Text(row.media_type_key.clone()),
        ]
    }
}

#[async_trait::async_trait]
impl MediaCacheRepository for SqliteMediaCacheRepository {
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    async fn upsert_batch(&self, visibility: Visibility, rows: &[CacheRow]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            r#"
            INSERT OR REPLACE INTO {} (
                doc_id, parent_id, display_name, mime_type, size, last_modified,
                generation_id, locator, root_locator, file_path, media_type
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            visibility.cache_table()
        );

        let params: Vec<Vec<QueryValue>> = rows.iter().map(Self::row_params).collect();
        let statements: Vec<(&str, &[QueryValue])> = params
            .iter()
            .map(|p| (sql.as_str(), p.as_slice()))
            .collect();

        let results = self.adapter.execute_batch(&statements).await?;
        Ok(results.iter().sum())
    }

    #[instrument(skip(self))]
    async fn delete_older_than(&self, visibility: Visibility, generation_id: i64) -> Result<u64> {
        let sql = format!(
            "DELETE FROM {} WHERE generation_id < ?",
            visibility.cache_table()
        );
        let deleted = self
            .adapter
            .execute(&sql, &[QueryValue::Integer(generation_id)])
            .await?;
        debug!(deleted, "Collected stale cache rows");
        Ok(deleted)
    }

    async fn all_rows(&self, visibility: Visibility) -> Result<Vec<CacheRow>> {
        let sql = format!("SELECT * FROM {}", visibility.cache_table());
        let rows = self.adapter.query(&sql, &[]).await?;
        rows.iter().map(row_to_cache_row).collect()
    }

    async fn max_generation(&self, visibility: Visibility) -> Result<Option<i64>> {
        let sql = format!(
            "SELECT MAX(generation_id) as generation FROM {}",
            visibility.cache_table()
        );
        let row = self.adapter.query_one(&sql, &[]).await?;
        Ok(get_optional_i64(&row, "generation"))
    }

    async fn count(&self, visibility: Visibility) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) as count FROM {}", visibility.cache_table());
        let row = self.adapter.query_one(&sql, &[]).await?;
        row.get("count")
            .and_then(|value| value.as_i64())
            .ok_or_else(|| missing_column("count"))
    }
}

fn row_to_cache_row(row: &QueryRow) -> Result<CacheRow> {
    Ok(CacheRow {
        doc_id: get_string(row, "doc_id")?,
        parent_id: get_string(row, "parent_id")?,
        display_name: get_string(row, "display_name")?,
        mime_type: get_string(row, "mime_type")?,
        size: get_i64(row, "size")?,
        last_modified: get_i64(row, "last_modified")?,
        generation_id: get_i64(row, "generation_id")?,
        locator: get_string(row, "locator")?,
        root_locator: get_string(row, "root_locator")?,
        file_path: get_string(row, "file_path")?,
        media_type_key: get_string(row, "media_type")?,
    })
}
