//! Core service façade and bootstrap helpers.
//!
//! [`CoreService`] wires the host-provided bridges from a
//! [`CoreConfig`](core_runtime::config::CoreConfig) into the media index: it
//! opens the SQLite database, warms the metadata cache and owns one
//! [`MediaStore`] per visibility plus the gallery cache. Hosts construct it
//! once and pass it around explicitly.
//!
//! Desktop apps typically enable the `desktop-shims` feature (which depends on
//! `bridge-desktop`) so the filesystem provider and image probe are used by
//! default.
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use core_service::{bridge_desktop::GrantedPathsPermissions, CoreService};
//! use core_library::models::{MediaType, Visibility};
//! use std::sync::Arc;
//!
//! let permissions = GrantedPathsPermissions::new();
//! permissions.grant("/home/me/Pictures").await;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/home/me/.local/share/mediaflow/index.db")
//!     .permission_provider(Arc::new(permissions))
//!     .build()?;
//! let core = CoreService::bootstrap(config).await?;
//!
//! core.store(Visibility::Public).add("/home/me/Pictures").await?;
//! let images = core.gallery(Visibility::Public, MediaType::Image);
//! images.load(Default::default()).await;
//! ```

pub mod error;

pub use error::{CoreError, Result};

#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
pub use bridge_desktop;

use std::collections::HashMap;
use std::sync::Arc;

use bridge_traits::{
    database::{DatabaseAdapter, DatabaseConfig},
    playback::PreloadEngine,
    time::SystemClock,
};
use core_library::models::{MediaType, Visibility};
use core_library::repositories::{
    SqliteMediaCacheRepository, SqliteMetadataRepository, SqliteRootRepository,
};
use core_library::SqliteAdapter;
use core_metadata::{ExtractionMode, MetadataCache, MetadataExtractor};
use core_playback::{PreloadWindow, StagingPolicy};
use core_runtime::config::CoreConfig;
use core_runtime::events::EventBus;
use core_sync::{
    DataChangedListener, Gallery, LifecycleDataChangedListener, MediaStore, RootRegistry,
    SnapshotCache, TreeCrawler,
};
use parking_lot::Mutex;
use tracing::{info, instrument, warn};

const EVENT_BUS_CAPACITY: usize = 256;

/// Primary façade exposed to host applications.
pub struct CoreService {
    config: CoreConfig,
    database: Arc<dyn DatabaseAdapter>,
    events: Arc<EventBus>,
    metadata: Arc<MetadataCache>,
    public: Arc<MediaStore>,
    private: Arc<MediaStore>,
    galleries: Mutex<HashMap<(Visibility, MediaType), Arc<Gallery>>>,
}

impl CoreService {
    /// Open the database at `config.database_path` and build the service.
    #[instrument(skip(config), fields(database = %config.database_path.display()))]
    pub async fn bootstrap(config: CoreConfig) -> Result<Self> {
        let adapter = SqliteAdapter::new(DatabaseConfig::new(&config.database_path))
            .await
            .map_err(|e| CoreError::InitializationFailed(e.to_string()))?;
        Self::with_database(config, Arc::new(adapter)).await
    }

    /// Build the service over an already opened, migrated database.
    pub async fn with_database(
        config: CoreConfig,
        database: Arc<dyn DatabaseAdapter>,
    ) -> Result<Self> {
        config.validate()?;
        let events = Arc::new(EventBus::new(EVENT_BUS_CAPACITY));

        let metadata = Arc::new(MetadataCache::new(Arc::new(SqliteMetadataRepository::new(
            database.clone(),
        ))));
        if config.index.warm_metadata_cache {
            match metadata.warm_up().await {
                Ok(entries) => info!(entries, "Metadata cache warmed"),
                Err(e) => warn!(error = %e, "Metadata warm-up failed, reading through"),
            }
        }

        let extractor = Arc::new(MetadataExtractor::new(
            metadata.clone(),
            config.metadata_probe.clone(),
        ));
        let crawler = Arc::new(TreeCrawler::new(
            config.document_provider.clone(),
            extractor,
            ExtractionMode::from_cache_only(!config.index.probe_during_crawl),
        ));
        let registry = Arc::new(RootRegistry::new(
            Arc::new(SqliteRootRepository::new(database.clone())),
            config.document_provider.clone(),
            config.permission_provider.clone(),
            Arc::new(SystemClock),
        ));
        let snapshots = Arc::new(
            SnapshotCache::new(
                Arc::new(SqliteMediaCacheRepository::new(database.clone())),
                Arc::new(SystemClock),
                config.index.cache_batch_size,
            )
            .with_events(events.clone()),
        );

        let build_store = |visibility| {
            MediaStore::new(
                visibility,
                registry.clone(),
                crawler.clone(),
                snapshots.clone(),
                Some(events.clone()),
            )
        };
        let public = build_store(Visibility::Public);
        let private = build_store(Visibility::Private);

        info!(
            probe = config.metadata_probe.is_some(),
            batch_size = config.index.cache_batch_size,
            "Core service ready"
        );

        Ok(Self {
            config,
            database,
            events,
            metadata,
            public,
            private,
            galleries: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(&self.events)
    }

    pub fn metadata_cache(&self) -> Arc<MetadataCache> {
        Arc::clone(&self.metadata)
    }

    pub fn store(&self, visibility: Visibility) -> Arc<MediaStore> {
        match visibility {
            Visibility::Public => Arc::clone(&self.public),
            Visibility::Private => Arc::clone(&self.private),
        }
    }

    /// The gallery for `(visibility, media_type)`, created on first use.
    pub fn gallery(&self, visibility: Visibility, media_type: MediaType) -> Arc<Gallery> {
        let mut galleries = self.galleries.lock();
        galleries
            .entry((visibility, media_type))
            .or_insert_with(|| Gallery::new(self.store(visibility), media_type))
            .clone()
    }

    /// A suspended lifecycle listener registered with both stores.
    pub fn lifecycle_listener(
        &self,
        delegate: Arc<dyn DataChangedListener>,
    ) -> Result<Arc<LifecycleDataChangedListener>> {
        let listener = LifecycleDataChangedListener::new(delegate);
        for store in [&self.public, &self.private] {
            listener.register(store)?;
        }
        Ok(listener)
    }

    /// A preload window over `engine` using the configured staging distances.
    pub fn preload_window(&self, engine: Arc<dyn PreloadEngine>) -> Result<PreloadWindow> {
        let policy = StagingPolicy::new(self.config.preload)?;
        Ok(PreloadWindow::new(engine, policy).with_events(self.events()))
    }

    pub async fn health_check(&self) -> Result<()> {
        self.database.health_check().await?;
        Ok(())
    }

    /// Wait for pending snapshot writes, then close the database.
    pub async fn shutdown(&self) -> Result<()> {
        for store in [&self.public, &self.private] {
            store.flush_persist().await;
        }
        self.database.close().await?;
        info!("Core service shut down");
        Ok(())
    }
}
