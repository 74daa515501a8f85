//! Hand-written bridge fakes and a store harness over an in-memory database.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::documents::{DocumentEntry, DocumentProvider, PermissionProvider, DIRECTORY_MIME_TYPE};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::time::SystemClock;
use core_library::db::create_test_pool;
use core_library::models::Visibility;
use core_library::repositories::{
    SqliteMediaCacheRepository, SqliteMetadataRepository, SqliteRootRepository,
};
use core_metadata::{ExtractionMode, MetadataCache, MetadataExtractor};
use core_runtime::events::EventBus;
use core_sync::{MediaStore, RootRegistry, SnapshotCache, TreeCrawler};
use parking_lot::Mutex;
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// In-memory document tree keyed by `(root, parent doc id)`.
#[derive(Default)]
pub struct FakeDocuments {
    listings: Mutex<HashMap<(String, String), Vec<DocumentEntry>>>,
    names: Mutex<HashMap<String, String>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl FakeDocuments {
    pub fn set_listing(&self, root: &str, parent: &str, entries: Vec<DocumentEntry>) {
        self.listings
            .lock()
            .insert((root.to_string(), parent.to_string()), entries);
    }

    pub fn set_name(&self, root: &str, name: &str) {
        self.names.lock().insert(root.to_string(), name.to_string());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentProvider for FakeDocuments {
    async fn list_children(&self, root: &str, parent: &str) -> BridgeResult<Vec<DocumentEntry>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .listings
            .lock()
            .get(&(root.to_string(), parent.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn resolve_display_name(&self, root: &str) -> BridgeResult<Option<String>> {
        Ok(self.names.lock().get(root).cloned())
    }
}

#[derive(Default)]
pub struct FakePermissions {
    granted: Mutex<HashSet<String>>,
    failing: Mutex<bool>,
}

impl FakePermissions {
    pub fn grant(&self, locator: &str) {
        self.granted.lock().insert(locator.to_string());
    }

    pub fn revoke(&self, locator: &str) {
        self.granted.lock().remove(locator);
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }
}

#[async_trait]
impl PermissionProvider for FakePermissions {
    async fn current_readable_locators(&self) -> BridgeResult<HashSet<String>> {
        if *self.failing.lock() {
            return Err(BridgeError::OperationFailed("permission service down".to_string()));
        }
        Ok(self.granted.lock().clone())
    }
}

pub fn dir(doc_id: &str, name: &str) -> DocumentEntry {
    DocumentEntry::new(doc_id, name, DIRECTORY_MIME_TYPE)
}

pub fn media(doc_id: &str, mime: &str, last_modified: i64) -> DocumentEntry {
    DocumentEntry::new(doc_id, doc_id, mime)
        .with_size(100)
        .with_last_modified(last_modified)
}

pub struct Harness {
    pub pool: SqlitePool,
    pub documents: Arc<FakeDocuments>,
    pub permissions: Arc<FakePermissions>,
    pub events: Arc<EventBus>,
}

impl Harness {
    pub async fn new() -> Self {
        Self {
            pool: create_test_pool().await.unwrap(),
            documents: Arc::new(FakeDocuments::default()),
            permissions: Arc::new(FakePermissions::default()),
            events: Arc::new(EventBus::new(64)),
        }
    }

    /// A fresh store over the shared database, as after a restart.
    pub fn store(&self, visibility: Visibility) -> Arc<MediaStore> {
        let registry = Arc::new(RootRegistry::new(
            Arc::new(SqliteRootRepository::from_pool(self.pool.clone())),
            self.documents.clone(),
            self.permissions.clone(),
            Arc::new(SystemClock),
        ));
        let cache = Arc::new(MetadataCache::new(Arc::new(
            SqliteMetadataRepository::from_pool(self.pool.clone()),
        )));
        let extractor = Arc::new(MetadataExtractor::new(cache, None));
        let crawler = Arc::new(TreeCrawler::new(
            self.documents.clone(),
            extractor,
            ExtractionMode::CacheOnly,
        ));
        let snapshots = Arc::new(
            SnapshotCache::new(
                Arc::new(SqliteMediaCacheRepository::from_pool(self.pool.clone())),
                Arc::new(SystemClock),
                2,
            )
            .with_events(self.events.clone()),
        );
        MediaStore::new(
            visibility,
            registry,
            crawler,
            snapshots,
            Some(self.events.clone()),
        )
    }

    /// Root `tree/camera` holding two images and a video in `trip/`.
    pub fn seed_camera(&self) {
        self.documents.set_name("tree/camera", "Camera");
        self.documents.set_listing(
            "tree/camera",
            "",
            vec![
                media("old.jpg", "image/jpeg", 100),
                dir("trip", "Trip"),
                media("readme.txt", "text/plain", 1),
            ],
        );
        self.documents.set_listing(
            "tree/camera",
            "trip",
            vec![
                media("new.jpg", "image/jpeg", 300),
                media("clip.mp4", "video/mp4", 200),
            ],
        );
        self.permissions.grant("tree/camera");
    }
}
