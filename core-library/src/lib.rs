//! # Media Library Persistence
//!
//! Owns the media index database and provides repository patterns for data
//! access.
//!
//! ## Overview
//!
//! This module manages:
//! - SQLite connection pool and schema migrations
//! - Domain models (roots, nodes, metadata, flattened cache rows)
//! - Repositories for root locations, the metadata cache and the per-visibility
//!   node cache

pub mod adapters;
pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use adapters::SqliteAdapter;
pub use error::{LibraryError, Result};
pub use models::{
    CacheRow, MediaDirectory, MediaFile, MediaNode, MediaRoot, MediaType, Metadata,
    MetadataValues, NodeInfo, RootLocation, Visibility,
};
pub use repositories::{
    MediaCacheRepository, MetadataRepository, RootRepository, SqliteMediaCacheRepository,
    SqliteMetadataRepository, SqliteRootRepository,
};
