//! # Store Orchestrator
//!
//! One [`MediaStore`] per visibility owns the validated root list and the
//! crawled trees, and publishes them as an immutable [`StoreSnapshot`].
//!
//! ## Loading
//!
//! [`MediaStore::fetch`] is single-flight: the first caller starts a load task
//! and every caller arriving while it runs awaits the same result.
//!
//! 1. Load the persisted roots and drop those without read permission
//! 2. Unless refreshing, rebuild the trees from the snapshot cache
//! 3. When refreshing or the cache produced nothing, crawl every root and
//!    persist the result in the background
//! 4. Publish the snapshot and bump the data version once
//! 5. Resolve every waiter, then notify listeners
//!
//! A failed load resolves waiters with `false` and keeps the previous snapshot.

use crate::crawler::TreeCrawler;
use crate::directory_tree::DirectoryTree;
use crate::error::Result;
use crate::listener::{ChangeKind, DataChanged, DataChangedListener, ListenerId};
use crate::registry::RootRegistry;
use crate::snapshot::SnapshotCache;
use core_library::models::{collect_files, MediaFile, MediaRoot, MediaType, RootLocation, Visibility};
use core_runtime::events::{CoreEvent, EventBus, IndexEvent, RootEvent};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a store instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreId(u64);

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store-{}", self.0)
    }
}

/// Immutable view of a store's data.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub roots: Vec<RootLocation>,
    pub trees: Arc<Vec<MediaRoot>>,
    pub directory_trees: Arc<Vec<DirectoryTree>>,
}

impl StoreSnapshot {
    pub fn new(roots: Vec<RootLocation>, trees: Vec<MediaRoot>) -> Self {
        let directory_trees = trees.iter().map(DirectoryTree::build).collect();
        Self {
            roots,
            trees: Arc::new(trees),
            directory_trees: Arc::new(directory_trees),
        }
    }

    pub fn tree(&self, root_locator: &str) -> Option<&MediaRoot> {
        self.trees.iter().find(|tree| tree.locator == root_locator)
    }

    /// Every file of `media_type` across all trees.
    pub fn files_of(&self, media_type: MediaType) -> Vec<MediaFile> {
        let mut files = Vec::new();
        for tree in self.trees.iter() {
            collect_files(&tree.children, &mut files);
        }
        files
            .into_iter()
            .filter(|file| file.media_type == media_type)
            .cloned()
            .collect()
    }

    pub fn file_count(&self) -> usize {
        self.trees.iter().map(|tree| tree.files().len()).sum()
    }
}

struct Loaded {
    snapshot: StoreSnapshot,
    from_cache: bool,
}

type LoadFuture = Shared<BoxFuture<'static, bool>>;

pub struct MediaStore {
    id: StoreId,
    visibility: Visibility,
    registry: Arc<RootRegistry>,
    crawler: Arc<TreeCrawler>,
    snapshot_cache: Arc<SnapshotCache>,
    events: Option<Arc<EventBus>>,
    state: RwLock<Arc<StoreSnapshot>>,
    data_version: AtomicI64,
    in_flight: Mutex<Option<LoadFuture>>,
    persist_task: Mutex<Option<JoinHandle<()>>>,
    listeners: Mutex<Vec<(ListenerId, Arc<dyn DataChangedListener>)>>,
    next_listener: AtomicU64,
}

impl MediaStore {
    pub fn new(
        visibility: Visibility,
        registry: Arc<RootRegistry>,
        crawler: Arc<TreeCrawler>,
        snapshot_cache: Arc<SnapshotCache>,
        events: Option<Arc<EventBus>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: StoreId(NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed)),
            visibility,
            registry,
            crawler,
            snapshot_cache,
            events,
            state: RwLock::new(Arc::new(StoreSnapshot::default())),
            data_version: AtomicI64::new(1),
            in_flight: Mutex::new(None),
            persist_task: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        })
    }

    pub fn id(&self) -> StoreId {
        self.id
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn data_version(&self) -> i64 {
        self.data_version.load(Ordering::Acquire)
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.lock().is_some()
    }

    pub fn snapshot(&self) -> Arc<StoreSnapshot> {
        self.state.read().clone()
    }

    pub fn roots(&self) -> Vec<RootLocation> {
        self.state.read().roots.clone()
    }

    pub fn files(&self) -> Arc<Vec<MediaRoot>> {
        self.state.read().trees.clone()
    }

    pub fn directory_trees(&self) -> Arc<Vec<DirectoryTree>> {
        self.state.read().directory_trees.clone()
    }

    /// Load the store, joining a load already in flight.
    ///
    /// Resolves to `false` when the load failed.
    pub async fn fetch(self: &Arc<Self>, is_refresh: bool) -> bool {
        let load = {
            let mut slot = self.in_flight.lock();
            match slot.as_ref() {
                Some(load) => {
                    debug!(visibility = %self.visibility, is_refresh, "Joining in-flight load");
                    load.clone()
                }
                None => {
                    let load = self.start_load(is_refresh);
                    *slot = Some(load.clone());
                    load
                }
            }
        };
        load.await
    }

    /// `fetch(true)`.
    pub async fn refresh(self: &Arc<Self>) -> bool {
        self.fetch(true).await
    }

    fn start_load(self: &Arc<Self>, is_refresh: bool) -> LoadFuture {
        let (tx, rx) = oneshot::channel();
        let store = Arc::clone(self);

        tokio::spawn(async move {
            let guard = InFlightGuard(&store);
            let success = store.run_load(is_refresh).await;
            drop(guard);
            let _ = tx.send(success);
            if success {
                store.notify_listeners(ChangeKind::Loaded);
            }
        });

        rx.map(|result| result.unwrap_or(false)).boxed().shared()
    }

    #[instrument(skip(self), fields(visibility = %self.visibility))]
    async fn run_load(&self, is_refresh: bool) -> bool {
        let started = Instant::now();
        self.emit(CoreEvent::Index(IndexEvent::LoadStarted {
            visibility: self.visibility.key().to_string(),
            is_refresh,
        }));

        let loaded = self.load(is_refresh).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match loaded {
            Ok(Loaded {
                snapshot,
                from_cache,
            }) => {
                let root_count = snapshot.roots.len();
                let file_count = snapshot.file_count();
                *self.state.write() = Arc::new(snapshot);
                let data_version = self.bump_version();

                info!(
                    data_version,
                    from_cache, root_count, file_count, duration_ms, "Store loaded"
                );
                self.emit(CoreEvent::Index(IndexEvent::LoadCompleted {
                    visibility: self.visibility.key().to_string(),
                    data_version,
                    success: true,
                    from_cache,
                    root_count,
                    file_count,
                    duration_ms,
                }));
                true
            }
            Err(e) => {
                error!(error = %e, duration_ms, "Store load failed");
                self.emit(CoreEvent::Index(IndexEvent::LoadCompleted {
                    visibility: self.visibility.key().to_string(),
                    data_version: self.data_version(),
                    success: false,
                    from_cache: false,
                    root_count: 0,
                    file_count: 0,
                    duration_ms,
                }));
                false
            }
        }
    }

    async fn load(&self, is_refresh: bool) -> Result<Loaded> {
        let roots = self.validated_roots().await?;

        if !is_refresh {
            match self.snapshot_cache.reconstruct(self.visibility).await {
                Ok(reconstructed) => {
                    let trees = reconstructed.into_roots(&roots);
                    if trees.iter().any(|tree| !tree.is_empty()) {
                        return Ok(Loaded {
                            snapshot: StoreSnapshot::new(roots, trees),
                            from_cache: true,
                        });
                    }
                    debug!("Snapshot cache empty, crawling");
                }
                Err(e) => warn!(error = %e, "Failed to read snapshot cache, crawling"),
            }
        }

        let mut trees = Vec::with_capacity(roots.len());
        for root in &roots {
            trees.push(self.crawler.crawl_root(root).await);
        }
        self.persist_in_background(trees.clone());

        Ok(Loaded {
            snapshot: StoreSnapshot::new(roots, trees),
            from_cache: false,
        })
    }

    async fn validated_roots(&self) -> Result<Vec<RootLocation>> {
        let validated = self.registry.load_valid(self.visibility).await?;
        if validated.dropped > 0 {
            self.emit(CoreEvent::Roots(RootEvent::Dropped {
                visibility: self.visibility.key().to_string(),
                count: validated.dropped,
            }));
        }
        Ok(validated.roots)
    }

    /// Persist `trees` after any earlier persist finished, so generations
    /// commit in order.
    fn persist_in_background(&self, trees: Vec<MediaRoot>) {
        let cache = Arc::clone(&self.snapshot_cache);
        let visibility = self.visibility;
        let mut slot = self.persist_task.lock();
        let previous = slot.take();

        *slot = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            // Failures are logged and reported on the event bus by the cache
            if cache.persist(visibility, &trees).await.is_ok() {
                debug!(%visibility, "Background persist finished");
            }
        }));
    }

    /// Wait for the most recent background persist to finish.
    pub async fn flush_persist(&self) {
        let task = self.persist_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Background persist task failed");
            }
        }
    }

    fn bump_version(&self) -> i64 {
        let next = next_data_version(self.data_version());
        self.data_version.store(next, Ordering::Release);
        next
    }

    /// Add a root to the registry and the published root list.
    ///
    /// The trees are unchanged until the next fetch.
    pub async fn add(&self, locator: &str) -> Result<RootLocation> {
        let root = self.registry.add_root(locator, self.visibility).await?;
        self.update_roots(|roots| {
            roots.retain(|existing| existing.locator != root.locator);
            roots.push(root.clone());
        });
        self.emit(CoreEvent::Roots(RootEvent::Added {
            visibility: self.visibility.key().to_string(),
            locator: root.locator.clone(),
            name: root.display_name.clone(),
        }));
        self.notify_listeners(ChangeKind::RootsChanged);
        Ok(root)
    }

    /// Remove a root from the registry and the published root list.
    pub async fn remove(&self, locator: &str) -> Result<bool> {
        let removed = self.registry.remove_root(locator, self.visibility).await?;
        self.update_roots(|roots| roots.retain(|existing| existing.locator != locator));
        self.emit(CoreEvent::Roots(RootEvent::Removed {
            visibility: self.visibility.key().to_string(),
            locator: locator.to_string(),
        }));
        self.notify_listeners(ChangeKind::RootsChanged);
        Ok(removed)
    }

    /// Re-read and re-validate the root list without crawling.
    pub async fn reload_roots(&self) -> Result<usize> {
        let roots = self.validated_roots().await?;
        let count = roots.len();
        self.update_roots(|current| *current = roots);
        info!(visibility = %self.visibility, roots = count, "Reloaded roots");
        self.notify_listeners(ChangeKind::RootsChanged);
        Ok(count)
    }

    fn update_roots<F>(&self, update: F)
    where
        F: FnOnce(&mut Vec<RootLocation>),
    {
        let mut state = self.state.write();
        let mut next = StoreSnapshot::clone(&state);
        update(&mut next.roots);
        *state = Arc::new(next);
    }

    pub fn register_listener(&self, listener: Arc<dyn DataChangedListener>) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, listener));
        id
    }

    pub fn unregister_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    fn notify_listeners(&self, kind: ChangeKind) {
        let listeners: Vec<Arc<dyn DataChangedListener>> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        let change = DataChanged {
            store_id: self.id,
            visibility: self.visibility,
            data_version: self.data_version(),
            kind,
        };
        debug!(listeners = listeners.len(), data_version = change.data_version, "Notifying listeners");
        for listener in listeners {
            listener.on_data_changed(&change);
        }
    }

    fn emit(&self, event: CoreEvent) {
        if let Some(events) = &self.events {
            let _ = events.emit(event);
        }
    }
}

/// Versions count up and wrap to `i64::MIN` instead of reaching `i64::MAX`.
fn next_data_version(current: i64) -> i64 {
    match current.checked_add(1) {
        Some(next) if next != i64::MAX => next,
        _ => i64::MIN,
    }
}

/// Clears the in-flight slot when the load task ends, including by panic.
struct InFlightGuard<'a>(&'a MediaStore);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.in_flight.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_library::models::{MediaNode, NodeInfo};

    #[test]
    fn test_version_wraps_before_max() {
        assert_eq!(next_data_version(1), 2);
        assert_eq!(next_data_version(i64::MAX - 2), i64::MAX - 1);
        assert_eq!(next_data_version(i64::MAX - 1), i64::MIN);
        assert_eq!(next_data_version(i64::MIN), i64::MIN + 1);
    }

    #[test]
    fn test_snapshot_files_by_type() {
        let mut root = MediaRoot::new("tree/a", "A");
        for (doc_id, media_type) in [("1.jpg", MediaType::Image), ("2.mp4", MediaType::Video)] {
            root.children.push(MediaNode::File(MediaFile::new(
                NodeInfo {
                    locator: String::new(),
                    doc_id: doc_id.to_string(),
                    parent_doc_id: String::new(),
                    root_locator: "tree/a".to_string(),
                    name: doc_id.to_string(),
                    mime_type: String::new(),
                    size: 0,
                    last_modified: 0,
                    path: "A".to_string(),
                },
                media_type,
            )));
        }
        let snapshot = StoreSnapshot::new(
            vec![RootLocation::new("tree/a", Visibility::Public, "A")],
            vec![root],
        );

        assert_eq!(snapshot.file_count(), 2);
        assert_eq!(snapshot.files_of(MediaType::Video).len(), 1);
        assert_eq!(snapshot.directory_trees.len(), 1);
        assert!(snapshot.tree("tree/a").is_some());
        assert!(snapshot.tree("tree/b").is_none());
    }
}
