//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the media index core and the
//! platform that actually owns the documents. The core never touches a file
//! system, permission database or media decoder directly; everything goes
//! through one of the traits below.
//!
//! ## Traits
//!
//! ### Documents & Permissions
//! - [`DocumentProvider`](documents::DocumentProvider) - List children of a node under a granted root
//! - [`PermissionProvider`](documents::PermissionProvider) - Currently held read grants
//!
//! ### Media
//! - [`MetadataProbe`](probe::MetadataProbe) - Image EXIF and video container probing
//! - [`PreloadEngine`](playback::PreloadEngine) - Playback engine preload contract
//!
//! ### Storage
//! - [`DatabaseAdapter`](database::DatabaseAdapter) - Relational store used by the index cache
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ In Progress |
//! | Android  | TBD                 | 📋 Planned |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should convert platform-specific errors to `BridgeError` and
//! include the locator that failed in the message.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so a single implementation can
//! be shared across the crawler, the store task and the metadata extractor.
//!
//! ## Examples
//!
//! ### Implementing DocumentProvider
//!
//! ```ignore
//! use bridge_traits::documents::{DocumentEntry, DocumentProvider};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//!
//! pub struct MyProvider;
//!
//! #[async_trait]
//! impl DocumentProvider for MyProvider {
//!     async fn list_children(&self, root: &str, parent_doc_id: &str) -> Result<Vec<DocumentEntry>> {
//!         todo!()
//!     }
//!
//!     async fn resolve_display_name(&self, root: &str) -> Result<Option<String>> {
//!         todo!()
//!     }
//! }
//! ```

pub mod database;
pub mod documents;
pub mod error;
pub mod playback;
pub mod probe;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use database::{DatabaseAdapter, DatabaseConfig, QueryRow, QueryValue};
pub use documents::{DocumentEntry, DocumentProvider, PermissionProvider, DIRECTORY_MIME_TYPE};
pub use playback::{PreloadEngine, PreloadItem};
pub use probe::{ImageProbe, MetadataProbe, VideoProbe};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, SystemClock};
