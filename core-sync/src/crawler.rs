//! # Tree Crawler
//!
//! Breadth-first walk of one root through the host's [`DocumentProvider`].
//!
//! Each directory is listed exactly once. Listings are unordered, so the crawl
//! records directories in an arena while it walks and assembles the owned tree
//! at the end: BFS order guarantees every child slot has a higher index than
//! its parent, so assembling in reverse index order never sees an unbuilt child.

use bridge_traits::documents::{DocumentEntry, DocumentProvider};
use core_library::models::{
    MediaDirectory, MediaFile, MediaNode, MediaRoot, MediaType, NodeInfo, RootLocation,
};
use core_metadata::{ExtractionMode, MetadataExtractor};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// A listed child before the tree is assembled.
enum Entry {
    File(MediaFile),
    Directory(usize),
}

struct Slot {
    directory: MediaDirectory,
    entries: Vec<Entry>,
}

/// Counters of one crawl.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub directories: usize,
    pub files: usize,
    pub skipped: usize,
    pub failed_listings: usize,
}

pub struct TreeCrawler {
    documents: Arc<dyn DocumentProvider>,
    extractor: Arc<MetadataExtractor>,
    mode: ExtractionMode,
}

impl TreeCrawler {
    pub fn new(
        documents: Arc<dyn DocumentProvider>,
        extractor: Arc<MetadataExtractor>,
        mode: ExtractionMode,
    ) -> Self {
        Self {
            documents,
            extractor,
            mode,
        }
    }

    pub fn mode(&self) -> ExtractionMode {
        self.mode
    }

    /// Crawl `root` into a complete tree. Listing failures leave the affected
    /// directory empty and never abort the crawl.
    #[instrument(skip(self, root), fields(root = %root.locator))]
    pub async fn crawl_root(&self, root: &RootLocation) -> MediaRoot {
        let (media_root, stats) = self.crawl_with_stats(root).await;
        debug!(?stats, "Crawl stats");
        media_root
    }

    pub async fn crawl_with_stats(&self, root: &RootLocation) -> (MediaRoot, CrawlStats) {
        let started = Instant::now();
        let mut stats = CrawlStats::default();
        let mut slots: Vec<Slot> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<usize> = VecDeque::new();

        let top_entries = self
            .list_level(root, "", &root.display_name, &mut slots, &mut seen, &mut queue, &mut stats)
            .await;

        while let Some(index) = queue.pop_front() {
            let parent_doc_id = slots[index].directory.info.doc_id.clone();
            let path = slots[index].directory.child_path();
            let entries = self
                .list_level(
                    root,
                    &parent_doc_id,
                    &path,
                    &mut slots,
                    &mut seen,
                    &mut queue,
                    &mut stats,
                )
                .await;
            slots[index].entries = entries;
        }

        let mut built: Vec<Option<MediaDirectory>> = Vec::with_capacity(slots.len());
        built.resize_with(slots.len(), || None);
        for (index, slot) in slots.into_iter().enumerate().rev() {
            let mut directory = slot.directory;
            directory.children = assemble(slot.entries, &mut built);
            built[index] = Some(directory);
        }

        let mut media_root = MediaRoot::new(root.locator.clone(), root.display_name.clone());
        media_root.children = assemble(top_entries, &mut built);

        info!(
            directories = stats.directories,
            files = stats.files,
            failed_listings = stats.failed_listings,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Crawled root"
        );
        (media_root, stats)
    }

    /// List one directory, classify its children and resolve file metadata
    /// for the batch.
    #[allow(clippy::too_many_arguments)]
    async fn list_level(
        &self,
        root: &RootLocation,
        parent_doc_id: &str,
        path: &str,
        slots: &mut Vec<Slot>,
        seen: &mut HashSet<String>,
        queue: &mut VecDeque<usize>,
        stats: &mut CrawlStats,
    ) -> Vec<Entry> {
        let listing = match self
            .documents
            .list_children(&root.locator, parent_doc_id)
            .await
        {
            Ok(listing) => listing,
            Err(e) => {
                warn!(parent = parent_doc_id, error = %e, "Listing failed, treating as empty");
                stats.failed_listings += 1;
                return Vec::new();
            }
        };

        let mut entries = Vec::with_capacity(listing.len());
        for entry in listing {
            if entry.is_directory() {
                if !seen.insert(entry.doc_id.clone()) {
                    debug!(doc_id = %entry.doc_id, "Directory listed twice, skipping");
                    stats.skipped += 1;
                    continue;
                }
                let info = self.node_info(root, parent_doc_id, path, entry);
                slots.push(Slot {
                    directory: MediaDirectory::new(info),
                    entries: Vec::new(),
                });
                let index = slots.len() - 1;
                queue.push_back(index);
                entries.push(Entry::Directory(index));
                stats.directories += 1;
            } else if let Some(media_type) = MediaType::from_mime(&entry.mime_type) {
                let info = self.node_info(root, parent_doc_id, path, entry);
                entries.push(Entry::File(MediaFile::new(info, media_type)));
                stats.files += 1;
            } else {
                stats.skipped += 1;
            }
        }

        let files: Vec<&mut MediaFile> = entries
            .iter_mut()
            .filter_map(|entry| match entry {
                Entry::File(file) => Some(file),
                Entry::Directory(_) => None,
            })
            .collect();
        if !files.is_empty() {
            self.extractor.ensure_batch(files, self.mode).await;
        }

        entries
    }

    fn node_info(
        &self,
        root: &RootLocation,
        parent_doc_id: &str,
        path: &str,
        entry: DocumentEntry,
    ) -> NodeInfo {
        NodeInfo {
            locator: self.documents.document_locator(&root.locator, &entry.doc_id),
            doc_id: entry.doc_id,
            parent_doc_id: parent_doc_id.to_string(),
            root_locator: root.locator.clone(),
            name: entry.display_name,
            mime_type: entry.mime_type,
            size: entry.size,
            last_modified: entry.last_modified,
            path: path.to_string(),
        }
    }
}

fn assemble(entries: Vec<Entry>, built: &mut [Option<MediaDirectory>]) -> Vec<MediaNode> {
    entries
        .into_iter()
        .filter_map(|entry| match entry {
            Entry::File(file) => Some(MediaNode::File(file)),
            Entry::Directory(index) => built[index].take().map(MediaNode::Directory),
        })
        .collect()
}
