//! # Flatten/Reconstruct Cache
//!
//! Persists crawled trees as one row per node and rebuilds them on cold start.
//!
//! ## Generations
//!
//! Every persisted snapshot is stamped with a generation id. Rows are written
//! with insert-or-replace, so nodes that still exist are simply restamped; once
//! every chunk is committed, rows with an older generation are collected. The
//! id is `max(now_millis, last_generation + 1)`, which keeps it strictly
//! increasing even if the wall clock moves backwards.
//!
//! ## Reconstruction
//!
//! Rows come back in storage order, so a child may be read before its parent.
//! Reconstruction first collects every row into an arena, creating placeholder
//! directories for parents that have not been read yet, then assembles the
//! owned tree from the top-level rows down.

use crate::error::Result;
use bridge_traits::time::Clock;
use core_library::models::{
    placeholder_directory_info, CacheRow, MediaDirectory, MediaNode, MediaRoot, RootLocation,
    Visibility,
};
use core_library::repositories::MediaCacheRepository;
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Lazy breadth-first flattening of root forests into cache rows.
pub struct Flatten<'a> {
    generation_id: i64,
    pending: VecDeque<&'a MediaNode>,
}

impl<'a> Iterator for Flatten<'a> {
    type Item = CacheRow;

    fn next(&mut self) -> Option<CacheRow> {
        let node = self.pending.pop_front()?;
        if let MediaNode::Directory(dir) = node {
            self.pending.extend(dir.children.iter());
        }
        Some(CacheRow::from_node(node, self.generation_id))
    }
}

/// Yield one row per node of `roots`, directories included.
pub fn flatten(generation_id: i64, roots: &[MediaRoot]) -> Flatten<'_> {
    Flatten {
        generation_id,
        pending: roots.iter().flat_map(|root| root.children.iter()).collect(),
    }
}

/// Result of one persisted snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistOutcome {
    pub generation_id: i64,
    pub rows_written: u64,
    pub rows_collected: u64,
}

/// Forest rebuilt from the cache table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconstructed {
    pub top_level: Vec<MediaNode>,
    /// Rows skipped because their media type key was not recognised
    pub skipped_rows: usize,
    /// Nodes (placeholders included) unreachable from any top-level node
    pub orphaned_nodes: usize,
}

impl Reconstructed {
    pub fn is_empty(&self) -> bool {
        self.top_level.is_empty()
    }

    pub fn find_directory(&self, doc_id: &str) -> Option<&MediaDirectory> {
        let mut stack: Vec<&MediaNode> = self.top_level.iter().collect();
        while let Some(node) = stack.pop() {
            if let MediaNode::Directory(dir) = node {
                if dir.info.doc_id == doc_id {
                    return Some(dir);
                }
                stack.extend(dir.children.iter());
            }
        }
        None
    }

    /// Group top-level nodes under the roots they were crawled from.
    ///
    /// Nodes of roots not in `roots` are dropped.
    pub fn into_roots(self, roots: &[RootLocation]) -> Vec<MediaRoot> {
        let mut by_root: HashMap<String, Vec<MediaNode>> = HashMap::new();
        for node in self.top_level {
            by_root
                .entry(node.info().root_locator.clone())
                .or_default()
                .push(node);
        }

        roots
            .iter()
            .map(|root| {
                let mut media_root = MediaRoot::new(root.locator.clone(), root.display_name.clone());
                media_root.children = by_root.remove(&root.locator).unwrap_or_default();
                media_root
            })
            .collect()
    }
}

struct ArenaNode {
    node: Option<MediaNode>,
    children: Vec<usize>,
}

pub struct SnapshotCache {
    repository: Arc<dyn MediaCacheRepository>,
    clock: Arc<dyn Clock>,
    batch_size: usize,
    events: Option<Arc<EventBus>>,
}

impl SnapshotCache {
    pub fn new(
        repository: Arc<dyn MediaCacheRepository>,
        clock: Arc<dyn Clock>,
        batch_size: usize,
    ) -> Self {
        Self {
            repository,
            clock,
            batch_size: batch_size.max(1),
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Next generation id for `visibility`.
    pub async fn next_generation(&self, visibility: Visibility) -> Result<i64> {
        let now = self.clock.unix_timestamp_millis();
        let last = self.repository.max_generation(visibility).await?;
        Ok(match last {
            Some(last) => now.max(last.saturating_add(1)),
            None => now,
        })
    }

    /// Persist `roots` under a fresh generation and collect older rows.
    pub async fn persist(&self, visibility: Visibility, roots: &[MediaRoot]) -> Result<PersistOutcome> {
        let generation_id = self.next_generation(visibility).await?;
        self.persist_generation(visibility, generation_id, roots)
            .await
    }

    /// Persist `roots` as generation `generation_id`.
    ///
    /// Rows are committed in chunks of the configured batch size. Stale rows are
    /// only collected after every chunk committed, so a failed write leaves the
    /// previous snapshot readable.
    #[instrument(skip(self, roots), fields(visibility = %visibility))]
    pub async fn persist_generation(
        &self,
        visibility: Visibility,
        generation_id: i64,
        roots: &[MediaRoot],
    ) -> Result<PersistOutcome> {
        let result = self.write_chunks(visibility, generation_id, roots).await;

        match result {
            Ok(outcome) => {
                info!(
                    generation_id,
                    rows_written = outcome.rows_written,
                    rows_collected = outcome.rows_collected,
                    "Persisted snapshot"
                );
                self.emit(CacheEvent::SnapshotPersisted {
                    visibility: visibility.key().to_string(),
                    generation_id,
                    rows_written: outcome.rows_written,
                    rows_collected: outcome.rows_collected,
                });
                Ok(outcome)
            }
            Err(e) => {
                warn!(generation_id, error = %e, "Snapshot persistence failed");
                self.emit(CacheEvent::PersistFailed {
                    visibility: visibility.key().to_string(),
                    generation_id,
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn write_chunks(
        &self,
        visibility: Visibility,
        generation_id: i64,
        roots: &[MediaRoot],
    ) -> Result<PersistOutcome> {
        let mut rows = flatten(generation_id, roots);
        let mut rows_written = 0u64;
        let mut chunk: Vec<CacheRow> = Vec::with_capacity(self.batch_size);

        loop {
            chunk.clear();
            chunk.extend(rows.by_ref().take(self.batch_size));
            if chunk.is_empty() {
                break;
            }
            rows_written += self.repository.upsert_batch(visibility, &chunk).await?;
            debug!(rows_written, "Committed snapshot chunk");
        }

        let rows_collected = self
            .repository
            .delete_older_than(visibility, generation_id)
            .await?;

        Ok(PersistOutcome {
            generation_id,
            rows_written,
            rows_collected,
        })
    }

    /// Rebuild the persisted forest of `visibility`.
    #[instrument(skip(self), fields(visibility = %visibility))]
    pub async fn reconstruct(&self, visibility: Visibility) -> Result<Reconstructed> {
        let rows = self.repository.all_rows(visibility).await?;
        let row_count = rows.len();
        let reconstructed = reconstruct_rows(rows);
        debug!(
            rows = row_count,
            top_level = reconstructed.top_level.len(),
            skipped = reconstructed.skipped_rows,
            orphaned = reconstructed.orphaned_nodes,
            "Reconstructed snapshot"
        );
        Ok(reconstructed)
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(events) = &self.events {
            let _ = events.emit(CoreEvent::Cache(event));
        }
    }
}

/// Two-phase assembly of rows given in any order.
pub fn reconstruct_rows(rows: Vec<CacheRow>) -> Reconstructed {
    let mut arena: Vec<ArenaNode> = Vec::with_capacity(rows.len());
    let mut directories: HashMap<String, usize> = HashMap::new();
    let mut top_level: Vec<usize> = Vec::new();
    let mut top_positions: HashMap<String, usize> = HashMap::new();
    let mut skipped_rows = 0;

    for row in rows {
        let Some(node) = row.to_node() else {
            debug!(doc_id = %row.doc_id, media_type = %row.media_type_key, "Skipping row with unknown media type");
            skipped_rows += 1;
            continue;
        };

        let index = if row.is_directory() {
            match directories.get(&row.doc_id) {
                Some(&existing) => {
                    // Placeholder created by an earlier child row
                    arena[existing].node = Some(node);
                    existing
                }
                None => {
                    arena.push(ArenaNode {
                        node: Some(node),
                        children: Vec::new(),
                    });
                    directories.insert(row.doc_id.clone(), arena.len() - 1);
                    arena.len() - 1
                }
            }
        } else {
            arena.push(ArenaNode {
                node: Some(node),
                children: Vec::new(),
            });
            arena.len() - 1
        };

        if row.parent_id.is_empty() {
            match top_positions.get(&row.doc_id) {
                Some(&position) => top_level[position] = index,
                None => {
                    top_positions.insert(row.doc_id.clone(), top_level.len());
                    top_level.push(index);
                }
            }
        } else {
            let parent = match directories.get(&row.parent_id) {
                Some(&parent) => parent,
                None => {
                    arena.push(ArenaNode {
                        node: Some(MediaNode::Directory(MediaDirectory::new(
                            placeholder_directory_info(&row.parent_id),
                        ))),
                        children: Vec::new(),
                    });
                    directories.insert(row.parent_id.clone(), arena.len() - 1);
                    arena.len() - 1
                }
            };
            arena[parent].children.push(index);
        }
    }

    let total = arena.len();
    let mut assembled = 0;
    let top_level: Vec<MediaNode> = top_level
        .into_iter()
        .filter_map(|index| assemble(&mut arena, index, &mut assembled))
        .collect();

    let orphaned_nodes = total.saturating_sub(assembled);
    if orphaned_nodes > 0 {
        debug!(orphaned_nodes, "Nodes unreachable from any top-level node");
    }

    Reconstructed {
        top_level,
        skipped_rows,
        orphaned_nodes,
    }
}

/// Move node `index` and its subtree out of the arena.
///
/// Each node is taken once, so a corrupt parent chain can never duplicate or
/// loop.
fn assemble(arena: &mut [ArenaNode], index: usize, assembled: &mut usize) -> Option<MediaNode> {
    let mut node = arena[index].node.take()?;
    *assembled += 1;
    let children = std::mem::take(&mut arena[index].children);
    if let MediaNode::Directory(dir) = &mut node {
        dir.children = children
            .into_iter()
            .filter_map(|child| assemble(arena, child, assembled))
            .collect();
    }
    Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::time::Clock;
    use chrono::{DateTime, TimeZone, Utc};
    use core_library::db::create_test_pool;
    use core_library::models::{MediaFile, MediaType, NodeInfo};
    use core_library::repositories::SqliteMediaCacheRepository;

    struct FixedClock(i64);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            Utc.timestamp_millis_opt(self.0).unwrap()
        }
    }

    fn info(doc_id: &str, parent: &str, mime: &str, path: &str) -> NodeInfo {
        NodeInfo {
            locator: format!("tree/root/document/{}", doc_id),
            doc_id: doc_id.to_string(),
            parent_doc_id: parent.to_string(),
            root_locator: "tree/root".to_string(),
            name: doc_id.to_string(),
            mime_type: mime.to_string(),
            size: 1,
            last_modified: 2,
            path: path.to_string(),
        }
    }

    fn sample_root() -> MediaRoot {
        let mut day = MediaDirectory::new(info("day", "trip", "inode/directory", "Root/trip"));
        day.children.push(MediaNode::File(MediaFile::new(
            info("b.mp4", "day", "video/mp4", "Root/trip/day"),
            MediaType::Video,
        )));
        let mut trip = MediaDirectory::new(info("trip", "", "inode/directory", "Root"));
        trip.children.push(MediaNode::Directory(day));
        trip.children.push(MediaNode::File(MediaFile::new(
            info("a.jpg", "trip", "image/jpeg", "Root/trip"),
            MediaType::Image,
        )));

        let mut root = MediaRoot::new("tree/root", "Root");
        root.children.push(MediaNode::Directory(trip));
        root.children.push(MediaNode::File(MediaFile::new(
            info("top.png", "", "image/png", "Root"),
            MediaType::Image,
        )));
        root
    }

    fn sort_tree(nodes: &mut [MediaNode]) {
        nodes.sort_by(|a, b| a.doc_id().cmp(b.doc_id()));
        for node in nodes.iter_mut() {
            if let MediaNode::Directory(dir) = node {
                sort_tree(&mut dir.children);
            }
        }
    }

    async fn cache(clock: i64, batch: usize) -> SnapshotCache {
        let pool = create_test_pool().await.unwrap();
        SnapshotCache::new(
            Arc::new(SqliteMediaCacheRepository::from_pool(pool)),
            Arc::new(FixedClock(clock)),
            batch,
        )
    }

    #[test]
    fn test_flatten_yields_every_node_once_breadth_first() {
        let root = sample_root();
        let rows: Vec<CacheRow> = flatten(7, std::slice::from_ref(&root)).collect();

        let ids: Vec<&str> = rows.iter().map(|r| r.doc_id.as_str()).collect();
        assert_eq!(ids, vec!["trip", "top.png", "day", "a.jpg", "b.mp4"]);
        assert!(rows.iter().all(|r| r.generation_id == 7));
        assert_eq!(rows[0].media_type_key, "");
        assert_eq!(rows[4].media_type_key, "video");
    }

    #[test]
    fn test_reconstruct_children_before_parents() {
        let root = sample_root();
        let mut rows: Vec<CacheRow> = flatten(1, std::slice::from_ref(&root)).collect();
        rows.reverse();

        let mut rebuilt = reconstruct_rows(rows);
        assert_eq!(rebuilt.orphaned_nodes, 0);
        let day = rebuilt.find_directory("day").unwrap();
        assert_eq!(day.info.path, "Root/trip", "placeholder merged with real row");

        let mut expected = root.children.clone();
        sort_tree(&mut expected);
        sort_tree(&mut rebuilt.top_level);
        assert_eq!(rebuilt.top_level, expected);
    }

    #[test]
    fn test_reconstruct_skips_unknown_media_types() {
        let root = sample_root();
        let mut rows: Vec<CacheRow> = flatten(1, std::slice::from_ref(&root)).collect();
        rows[1].media_type_key = "audio".to_string();

        let rebuilt = reconstruct_rows(rows);
        assert_eq!(rebuilt.skipped_rows, 1);
        assert_eq!(rebuilt.top_level.len(), 1);
    }

    #[test]
    fn test_orphans_are_dropped() {
        let orphan = CacheRow::from_node(
            &MediaNode::File(MediaFile::new(
                info("lost.jpg", "missing", "image/jpeg", "Root/missing"),
                MediaType::Image,
            )),
            1,
        );
        let rebuilt = reconstruct_rows(vec![orphan]);
        assert!(rebuilt.is_empty());
        assert_eq!(rebuilt.orphaned_nodes, 2);
    }

    #[tokio::test]
    async fn test_persist_and_reconstruct_round_trip() {
        let cache = cache(1_000, 2).await;
        let root = sample_root();

        let outcome = cache
            .persist(Visibility::Public, std::slice::from_ref(&root))
            .await
            .unwrap();
        assert_eq!(outcome.generation_id, 1_000);
        assert_eq!(outcome.rows_written, 5);
        assert_eq!(outcome.rows_collected, 0);

        let roots = vec![RootLocation::new("tree/root", Visibility::Public, "Root")];
        let mut rebuilt = cache
            .reconstruct(Visibility::Public)
            .await
            .unwrap()
            .into_roots(&roots);
        assert_eq!(rebuilt.len(), 1);
        sort_tree(&mut rebuilt[0].children);

        let mut expected = root;
        sort_tree(&mut expected.children);
        assert_eq!(rebuilt[0], expected);
    }

    #[tokio::test]
    async fn test_generations_are_monotonic_and_collect_stale_rows() {
        // Clock stuck in the past: generations still advance
        let cache = cache(10, 200).await;
        let mut root = sample_root();

        let first = cache
            .persist(Visibility::Private, std::slice::from_ref(&root))
            .await
            .unwrap();
        root.children.pop();
        let second = cache
            .persist(Visibility::Private, std::slice::from_ref(&root))
            .await
            .unwrap();

        assert_eq!(first.generation_id, 10);
        assert_eq!(second.generation_id, 11);
        assert_eq!(second.rows_collected, 1);

        let rebuilt = cache.reconstruct(Visibility::Private).await.unwrap();
        assert_eq!(rebuilt.top_level.len(), 1);
        assert!(cache
            .reconstruct(Visibility::Public)
            .await
            .unwrap()
            .is_empty());
    }
}
