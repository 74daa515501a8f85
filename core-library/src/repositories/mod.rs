//! # Repository Pattern Implementation
//!
//! Repository traits and SQLite implementations for the media index tables.
//!
//! ## Available Repositories
//!
//! - `RootRepository` - user-granted root locations, one table per visibility
//! - `MetadataRepository` - probed dimensions and durations keyed by document
//! - `MediaCacheRepository` - the flattened, generation-stamped node cache

pub mod media_cache;
pub mod metadata;
pub mod root;

pub use media_cache::{MediaCacheRepository, SqliteMediaCacheRepository};
pub use metadata::{MetadataRepository, SqliteMetadataRepository};
pub use root::{RootRepository, SqliteRootRepository};

use crate::error::{LibraryError, Result};
use bridge_traits::database::QueryRow;

pub(crate) fn get_string(row: &QueryRow, key: &str) -> Result<String> {
    row.get(key)
        .and_then(|value| value.as_string())
        .ok_or_else(|| missing_column(key))
}

pub(crate) fn get_i64(row: &QueryRow, key: &str) -> Result<i64> {
    row.get(key)
        .and_then(|value| value.as_i64())
        .ok_or_else(|| missing_column(key))
}

pub(crate) fn get_optional_i64(row: &QueryRow, key: &str) -> Option<i64> {
    row.get(key).and_then(|value| value.as_i64())
}

pub(crate) fn missing_column(column: &str) -> LibraryError {
    LibraryError::InvalidInput {
        field: column.to_string(),
        message: "missing column in result set".to_string(),
    }
}
