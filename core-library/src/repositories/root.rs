//! Root location repository trait and implementation

use crate::error::Result;
use crate::models::{RootLocation, Visibility};
use crate::repositories::{get_string, missing_column};
use bridge_traits::database::{DatabaseAdapter, QueryRow, QueryValue};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::instrument;

/// Persistence of user-granted roots, one table per visibility scope.
#[async_trait::async_trait]
pub trait RootRepository: Send + Sync {
    /// All roots of a scope in the order they were added.
    async fn list(&self, visibility: Visibility) -> Result<Vec<RootLocation>>;

    /// Insert the root, or refresh its display name if it already exists.
    async fn upsert(&self, root: &RootLocation, added_at: i64) -> Result<()>;

    /// Delete a root by locator
    ///
    /// # Returns
    /// - `Ok(true)` if the root was deleted
    /// - `Ok(false)` if it was not present
    async fn delete(&self, locator: &str, visibility: Visibility) -> Result<bool>;

    /// Count roots of a scope
    async fn count(&self, visibility: Visibility) -> Result<i64>;
}

/// SQLite implementation of RootRepository
pub struct SqliteRootRepository {
    adapter: Arc<dyn DatabaseAdapter>,
}

impl SqliteRootRepository {
    pub fn new(adapter: Arc<dyn DatabaseAdapter>) -> Self {
        Self { adapter }
    }

    /// Convenience constructor using an existing `sqlx` pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        use crate::adapters::sqlite_native::SqliteAdapter;
        Self::new(Arc::new(SqliteAdapter::from_pool(pool)))
    }
}

#[async_trait::async_trait]
impl RootRepository for SqliteRootRepository {
    #[instrument(skip(self))]
    async fn list(&self, visibility: Visibility) -> Result<Vec<RootLocation>> {
        let sql = format!(
            "SELECT root_locator, display_name FROM {} ORDER BY added_at ASC, root_locator ASC",
            visibility.roots_table()
        );
        let rows = self.adapter.query(&sql, &[]).await?;
        rows.iter()
            .map(|row| row_to_root(row, visibility))
            .collect()
    }

    #[instrument(skip(self, root), fields(visibility = %root.visibility))]
    async fn upsert(&self, root: &RootLocation, added_at: i64) -> Result<()> {
        let sql = format!(
            r#"
            INSERT INTO {} (root_locator, display_name, added_at)
            VALUES (?, ?, ?)
            ON CONFLICT(root_locator) DO UPDATE SET display_name = excluded.display_name
            "#,
            root.visibility.roots_table()
        );
        self.adapter
            .execute(
                &sql,
                &[
                    QueryValue::Text(root.locator.clone()),
                    QueryValue::Text(root.display_name.clone()),
                    QueryValue::Integer(added_at),
                ],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, locator: &str, visibility: Visibility) -> Result<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE root_locator = ?",
            visibility.roots_table()
        );
        let affected = self
            .adapter
            .execute(&sql, &[QueryValue::Text(locator.to_string())])
            .await?;
        Ok(affected > 0)
    }

    async fn count(&self, visibility: Visibility) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) as count FROM {}", visibility.roots_table());
        let row = self.adapter.query_one(&sql, &[]).await?;
        row.get("count")
            .and_then(|value| value.as_i64())
            .ok_or_else(|| missing_column("count"))
    }
}

fn row_to_root(row: &QueryRow, visibility: Visibility) -> Result<RootLocation> {
    Ok(RootLocation {
        locator: get_string(row, "root_locator")?,
        visibility,
        display_name: get_string(row, "display_name")?,
    })
}
