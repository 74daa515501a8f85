//! # Media Metadata
//!
//! Resolves width, height, duration and rotation of indexed media files.
//!
//! ## Overview
//!
//! This module handles:
//! - The metadata cache, an in-memory map in front of the `media_metadata` table
//! - Cache-only resolution during crawls and full probing through the host's
//!   `MetadataProbe`
//! - Write-through of probed values before they are attached to a file

pub mod cache;
pub mod error;
pub mod extractor;

pub use cache::MetadataCache;
pub use error::{MetadataError, Result};
pub use extractor::{ExtractionMode, MetadataExtractor};
