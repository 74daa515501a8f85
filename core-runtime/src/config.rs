//! # Core Configuration Module
//!
//! Provides configuration management for the media index.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds all bridges and settings the index needs. It enforces
//! fail-fast validation so a missing capability is reported at startup rather
//! than on the first crawl.
//!
//! ## Required Dependencies
//!
//! - `DocumentProvider` - Lists children of granted roots (desktop default: filesystem)
//! - `PermissionProvider` - Reports currently held read grants
//!
//! ## Optional Dependencies
//!
//! - `MetadataProbe` - Image/video probing (desktop default: `image` crate probe).
//!   Without a probe, metadata extraction is cache-only.
//! - `LoggerSink` - Mirrors logs into the host pipeline
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/data/media_index.db")
//!     .permission_provider(Arc::new(MyPermissions))
//!     .cache_batch_size(500)
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Fails: no permission provider
//! let config = CoreConfig::builder()
//!     .database_path("/data/media_index.db")
//!     .build()
//!     .expect("Should fail - missing required bridges");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{DocumentProvider, LoggerSink, MetadataProbe, PermissionProvider};
use std::path::PathBuf;
use std::sync::Arc;

/// Rows committed per transaction when persisting a snapshot.
pub const DEFAULT_CACHE_BATCH_SIZE: usize = 200;

/// Upper bound for a single snapshot transaction.
pub const MAX_CACHE_BATCH_SIZE: usize = 10_000;

/// Core configuration for the media index.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Path to the SQLite database file
    pub database_path: PathBuf,

    /// Hierarchical document listing (required)
    pub document_provider: Arc<dyn DocumentProvider>,

    /// Read-grant lookup used to validate persisted roots (required)
    pub permission_provider: Arc<dyn PermissionProvider>,

    /// Media probe; absent means extraction never leaves the cache
    pub metadata_probe: Option<Arc<dyn MetadataProbe>>,

    /// Host log pipeline (optional)
    pub logger_sink: Option<Arc<dyn LoggerSink>>,

    /// Indexing behaviour
    pub index: IndexSettings,

    /// Preload staging distances
    pub preload: PreloadSettings,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("document_provider", &"DocumentProvider { ... }")
            .field("permission_provider", &"PermissionProvider { ... }")
            .field(
                "metadata_probe",
                &self
                    .metadata_probe
                    .as_ref()
                    .map(|_| "MetadataProbe { ... }"),
            )
            .field(
                "logger_sink",
                &self.logger_sink.as_ref().map(|_| "LoggerSink { ... }"),
            )
            .field("index", &self.index)
            .field("preload", &self.preload)
            .finish()
    }
}

/// Indexing settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSettings {
    /// Rows per snapshot transaction
    pub cache_batch_size: usize,

    /// Probe files missing from the metadata cache while crawling.
    /// Slows the first crawl considerably on large roots.
    pub probe_during_crawl: bool,

    /// Load the whole metadata table into memory at startup
    pub warm_metadata_cache: bool,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            cache_batch_size: DEFAULT_CACHE_BATCH_SIZE,
            probe_during_crawl: false,
            warm_metadata_cache: true,
        }
    }
}

/// Distance thresholds of the preload staging policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreloadSettings {
    /// Milliseconds loaded from the start of direct neighbours
    pub partial_range_ms: u64,

    /// Up to this distance, tracks are selected
    pub tracks_selected_distance: usize,

    /// Up to this distance, the source is prepared
    pub source_prepared_distance: usize,
}

impl Default for PreloadSettings {
    fn default() -> Self {
        Self {
            partial_range_ms: 3_000,
            tracks_selected_distance: 2,
            source_prepared_distance: 4,
        }
    }
}

impl PreloadSettings {
    pub fn validate(&self) -> Result<()> {
        if self.partial_range_ms == 0 {
            return Err(Error::Config(
                "Preload partial range must be greater than 0ms".to_string(),
            ));
        }

        if self.tracks_selected_distance < 2 {
            return Err(Error::Config(
                "Tracks-selected distance must be at least 2 (distance 1 is the partial range)"
                    .to_string(),
            ));
        }

        if self.source_prepared_distance < self.tracks_selected_distance {
            return Err(Error::Config(format!(
                "Source-prepared distance ({}) cannot be smaller than tracks-selected distance ({})",
                self.source_prepared_distance, self.tracks_selected_distance
            )));
        }

        Ok(())
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Database path is not empty
    /// - Snapshot batch size is within (0, 10 000]
    /// - Crawl-time probing has a probe to use
    /// - Preload distances are ordered
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.index.cache_batch_size == 0 {
            return Err(Error::Config(
                "Cache batch size must be greater than 0".to_string(),
            ));
        }

        if self.index.cache_batch_size > MAX_CACHE_BATCH_SIZE {
            return Err(Error::Config(format!(
                "Cache batch size exceeds maximum of {} rows",
                MAX_CACHE_BATCH_SIZE
            )));
        }

        if self.index.probe_during_crawl && self.metadata_probe.is_none() {
            return Err(Error::Config(
                "Probe during crawl enabled but no MetadataProbe provided. \
                 Disable the setting or inject a MetadataProbe implementation."
                    .to_string(),
            ));
        }

        self.preload.validate()
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_document_provider() -> Result<Arc<dyn DocumentProvider>> {
    use bridge_desktop::FilesystemDocumentProvider;

    let provider: Arc<dyn DocumentProvider> = Arc::new(FilesystemDocumentProvider::new());
    Ok(provider)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_document_provider() -> Result<Arc<dyn DocumentProvider>> {
    Err(Error::CapabilityMissing {
        capability: "DocumentProvider".to_string(),
        message: "DocumentProvider implementation is required to list granted roots. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default \
                 FilesystemDocumentProvider. Android: inject a DocumentsContract-backed provider."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_metadata_probe() -> Option<Arc<dyn MetadataProbe>> {
    use bridge_desktop::ImageMetadataProbe;

    let probe: Arc<dyn MetadataProbe> = Arc::new(ImageMetadataProbe::new());
    Some(probe)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_metadata_probe() -> Option<Arc<dyn MetadataProbe>> {
    None
}

fn permission_provider_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "PermissionProvider".to_string(),
        message: "PermissionProvider implementation is required to validate persisted roots. \
                 Desktop: inject bridge_desktop::GrantedPathsPermissions. \
                 Android: inject a provider backed by persisted URI permissions."
            .to_string(),
    }
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    document_provider: Option<Arc<dyn DocumentProvider>>,
    permission_provider: Option<Arc<dyn PermissionProvider>>,
    metadata_probe: Option<Arc<dyn MetadataProbe>>,
    logger_sink: Option<Arc<dyn LoggerSink>>,
    index: IndexSettings,
    preload: PreloadSettings,
}

impl CoreConfigBuilder {
    /// Sets the database path.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder()
    ///     .database_path("/data/media_index.db");
    /// ```
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Sets the document provider.
    ///
    /// If not provided, the desktop filesystem provider is used when the
    /// `desktop-shims` feature is enabled.
    pub fn document_provider(mut self, provider: Arc<dyn DocumentProvider>) -> Self {
        self.document_provider = Some(provider);
        self
    }

    /// Sets the permission provider (required).
    pub fn permission_provider(mut self, provider: Arc<dyn PermissionProvider>) -> Self {
        self.permission_provider = Some(provider);
        self
    }

    /// Sets the metadata probe (optional).
    pub fn metadata_probe(mut self, probe: Arc<dyn MetadataProbe>) -> Self {
        self.metadata_probe = Some(probe);
        self
    }

    /// Sets the host logger sink (optional).
    pub fn logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    /// Rows committed per snapshot transaction.
    ///
    /// Default: 200
    pub fn cache_batch_size(mut self, rows: usize) -> Self {
        self.index.cache_batch_size = rows;
        self
    }

    /// Probe uncached files while crawling.
    ///
    /// Default: false
    pub fn probe_during_crawl(mut self, enabled: bool) -> Self {
        self.index.probe_during_crawl = enabled;
        self
    }

    /// Preload the metadata table into memory at startup.
    ///
    /// Default: true
    pub fn warm_metadata_cache(mut self, enabled: bool) -> Self {
        self.index.warm_metadata_cache = enabled;
        self
    }

    /// Sets all index settings at once.
    pub fn index_settings(mut self, settings: IndexSettings) -> Self {
        self.index = settings;
        self
    }

    /// Sets the preload staging distances.
    pub fn preload_settings(mut self, settings: PreloadSettings) -> Self {
        self.preload = settings;
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns `Ok(CoreConfig)` on success, or an error if:
    /// - The database path is missing
    /// - A required bridge is missing (DocumentProvider, PermissionProvider)
    /// - Settings are invalid
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let document_provider = match self.document_provider {
            Some(provider) => provider,
            None => provide_default_document_provider()?,
        };

        let permission_provider = self
            .permission_provider
            .ok_or_else(permission_provider_missing_error)?;

        let metadata_probe = self.metadata_probe.or_else(provide_default_metadata_probe);

        let config = CoreConfig {
            database_path,
            document_provider,
            permission_provider,
            metadata_probe,
            logger_sink: self.logger_sink,
            index: self.index,
            preload: self.preload,
        };

        config.validate()?;

        Ok(config)
    }
}
