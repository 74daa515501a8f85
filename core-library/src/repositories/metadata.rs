//! Metadata cache repository trait and implementation

use crate::error::Result;
use crate::models::Metadata;
use crate::repositories::{get_i64, get_string, missing_column};
use bridge_traits::database::{DatabaseAdapter, QueryRow, QueryValue};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, instrument};

const DELETE_SQL: &str = "DELETE FROM media_metadata WHERE doc_id = ?";
const INSERT_SQL: &str = r#"
    INSERT INTO media_metadata (
        doc_id, width, height, duration_ms, rotation_degrees, last_modified
    )
    VALUES (?, ?, ?, ?, ?, ?)
"#;

/// Persistence of probed media metadata keyed by document id.
#[async_trait::async_trait]
pub trait MetadataRepository: Send + Sync {
    /// Find the stored metadata of a document, regardless of revision.
    async fn find(&self, doc_id: &str) -> Result<Option<Metadata>>;

    /// Every stored record.
    async fn all(&self) -> Result<Vec<Metadata>>;

    /// Replace the record of `metadata.doc_id`.
    async fn replace(&self, metadata: &Metadata) -> Result<()>;

    /// Replace many records in one transaction.
    async fn replace_batch(&self, records: &[Metadata]) -> Result<()>;

    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of MetadataRepository
pub struct SqliteMetadataRepository {
    adapter: Arc<dyn DatabaseAdapter>,
}

impl SqliteMetadataRepository {
    pub fn new(adapter: Arc<dyn DatabaseAdapter>) -> Self {
        Self { adapter }
    }

    /// Convenience constructor using an existing `sqlx` pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        use crate::adapters::sqlite_native::SqliteAdapter;
        Self::new(Arc::new(SqliteAdapter::from_pool(pool)))
    }

    fn insert_params(metadata: &Metadata) -> Vec<QueryValue> {
        vec![
            QueryValue::Text(metadata.doc_id.clone()),
            QueryValue::Integer(metadata.width as i64),
            QueryValue::Integer(metadata.height as i64),
            QueryValue::Integer(metadata.duration_ms),
            QueryValue::Integer(metadata.rotation_degrees as i64),
            QueryValue::Integer(metadata.last_modified),
        ]
    }
}

#[async_trait::async_trait]
impl MetadataRepository for SqliteMetadataRepository {
    async fn find(&self, doc_id: &str) -> Result<Option<Metadata>> {
        let row = self
            .adapter
            .query_one_optional(
                "SELECT * FROM media_metadata WHERE doc_id = ?",
                &[QueryValue::Text(doc_id.to_string())],
            )
            .await?;
        row.map(|row| row_to_metadata(&row)).transpose()
    }

    async fn all(&self) -> Result<Vec<Metadata>> {
        let rows = self
            .adapter
            .query("SELECT * FROM media_metadata", &[])
            .await?;
        rows.iter().map(row_to_metadata).collect()
    }

    #[instrument(skip(self, metadata), fields(doc_id = %metadata.doc_id))]
    async fn replace(&self, metadata: &Metadata) -> Result<()> {
        self.replace_batch(std::slice::from_ref(metadata)).await
    }

    async fn replace_batch(&self, records: &[Metadata]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let doc_ids: Vec<[QueryValue; 1]> = records
            .iter()
            .map(|m| [QueryValue::Text(m.doc_id.clone())])
            .collect();
        let inserts: Vec<Vec<QueryValue>> = records.iter().map(Self::insert_params).collect();

        let mut statements: Vec<(&str, &[QueryValue])> = Vec::with_capacity(records.len() * 2);
        for (delete, insert) in doc_ids.iter().zip(inserts.iter()) {
            statements.push((DELETE_SQL, delete.as_slice()));
            statements.push((INSERT_SQL, insert.as_slice()));
        }

        self.adapter.execute_batch(&statements).await?;
        debug!(records = records.len(), "Replaced metadata records");
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let row = self
            .adapter
            .query_one("SELECT COUNT(*) as count FROM media_metadata", &[])
            .await?;
        row.get("count")
            .and_then(|value| value.as_i64())
            .ok_or_else(|| missing_column("count"))
    }
}

fn row_to_metadata(row: &QueryRow) -> Result<Metadata> {
    Ok(Metadata {
        doc_id: get_string(row, "doc_id")?,
        width: get_i64(row, "width")? as i32,
        height: get_i64(row, "height")? as i32,
        duration_ms: get_i64(row, "duration_ms")?,
        rotation_degrees: get_i64(row, "rotation_degrees")? as i32,
        last_modified: get_i64(row, "last_modified")?,
    })
}
