//! # Gallery Projection
//!
//! A sorted, flat list of one media type drawn from a store, optionally
//! restricted to one root or directory.

use crate::directory_tree::{DirectoryScope, DirectoryTree};
use crate::sort::SortType;
use crate::store::{MediaStore, StoreSnapshot};
use core_library::models::{collect_files, MediaFile, MediaType, Visibility};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

struct GalleryState {
    sort_type: SortType,
    root_directory: Option<DirectoryScope>,
    files: Arc<Vec<MediaFile>>,
    directory_trees: Arc<Vec<DirectoryTree>>,
}

struct InFlight {
    generation: u64,
    future: Shared<BoxFuture<'static, bool>>,
}

pub struct Gallery {
    store: Arc<MediaStore>,
    media_type: MediaType,
    state: RwLock<GalleryState>,
    in_flight: Mutex<Option<InFlight>>,
    next_generation: AtomicU64,
}

impl Gallery {
    pub fn new(store: Arc<MediaStore>, media_type: MediaType) -> Arc<Self> {
        Arc::new(Self {
            store,
            media_type,
            state: RwLock::new(GalleryState {
                sort_type: SortType::default(),
                root_directory: None,
                files: Arc::new(Vec::new()),
                directory_trees: Arc::new(Vec::new()),
            }),
            in_flight: Mutex::new(None),
            next_generation: AtomicU64::new(1),
        })
    }

    pub fn store(&self) -> &Arc<MediaStore> {
        &self.store
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn visibility(&self) -> Visibility {
        self.store.visibility()
    }

    pub fn sort_type(&self) -> SortType {
        self.state.read().sort_type
    }

    pub fn root_directory(&self) -> Option<DirectoryScope> {
        self.state.read().root_directory.clone()
    }

    /// Scope later loads to `scope`, or to every root with `None`.
    pub fn set_root_directory(&self, scope: Option<DirectoryScope>) {
        self.state.write().root_directory = scope;
    }

    pub fn files(&self) -> Arc<Vec<MediaFile>> {
        self.state.read().files.clone()
    }

    pub fn directory_trees(&self) -> Arc<Vec<DirectoryTree>> {
        self.state.read().directory_trees.clone()
    }

    pub fn file(&self, index: usize) -> Option<MediaFile> {
        self.state.read().files.get(index).cloned()
    }

    /// Materialize the file list with `sort`, joining a load in flight.
    pub async fn load(self: &Arc<Self>, sort: SortType) -> bool {
        self.state.write().sort_type = sort;
        self.materialize(false).await
    }

    /// Refresh the store, then materialize from the refreshed data.
    ///
    /// Reports whether the store refresh succeeded.
    pub async fn refresh(self: &Arc<Self>, sort: SortType) -> bool {
        self.state.write().sort_type = sort;
        let refreshed = self.store.refresh().await;
        self.materialize(true).await;
        refreshed
    }

    /// Join the in-flight materialization, or start one. With `fresh`, an
    /// in-flight run is awaited and a new one started so the result reflects
    /// the current store snapshot.
    async fn materialize(self: &Arc<Self>, fresh: bool) -> bool {
        if fresh {
            let previous = self.in_flight.lock().as_ref().map(|f| f.future.clone());
            if let Some(previous) = previous {
                previous.await;
            }
        }

        let future = {
            let mut slot = self.in_flight.lock();
            match slot.as_ref() {
                Some(in_flight) if !fresh => in_flight.future.clone(),
                _ => {
                    let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                    let gallery = Arc::clone(self);
                    let future = async move {
                        let loaded = gallery.run_materialize().await;
                        let mut slot = gallery.in_flight.lock();
                        if slot.as_ref().map(|f| f.generation) == Some(generation) {
                            slot.take();
                        }
                        loaded
                    }
                    .boxed()
                    .shared();
                    *slot = Some(InFlight {
                        generation,
                        future: future.clone(),
                    });
                    future
                }
            }
        };
        future.await
    }

    async fn run_materialize(&self) -> bool {
        let scope = self.root_directory();
        let mut snapshot = self.store.snapshot();
        let mut files = self.collect(&snapshot, scope.as_ref());

        if scope.is_none() && files.is_empty() {
            debug!(media_type = %self.media_type, "Gallery empty, loading store");
            self.store.fetch(false).await;
            snapshot = self.store.snapshot();
            files = self.collect(&snapshot, None);
        }

        let sort_type = self.sort_type();
        sort_type.apply(&mut files);
        info!(
            visibility = %self.visibility(),
            media_type = %self.media_type,
            sort = %sort_type,
            files = files.len(),
            "Gallery loaded"
        );

        let mut state = self.state.write();
        state.files = Arc::new(files);
        state.directory_trees = snapshot.directory_trees.clone();
        true
    }

    fn collect(&self, snapshot: &StoreSnapshot, scope: Option<&DirectoryScope>) -> Vec<MediaFile> {
        let Some(scope) = scope else {
            return snapshot.files_of(self.media_type);
        };

        let Some(tree) = snapshot.tree(&scope.root_locator) else {
            debug!(root = %scope.root_locator, "Scoped root not loaded");
            return Vec::new();
        };

        let mut found = Vec::new();
        match &scope.doc_id {
            None => collect_files(&tree.children, &mut found),
            Some(doc_id) => match tree.find_directory(doc_id) {
                Some(dir) => collect_files(&dir.children, &mut found),
                None => debug!(doc_id = %doc_id, "Scoped directory not loaded"),
            },
        }
        found
            .into_iter()
            .filter(|file| file.media_type == self.media_type)
            .cloned()
            .collect()
    }
}
