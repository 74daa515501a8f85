//! # Media Index & Synchronization
//!
//! Builds and serves the per-visibility media index.
//!
//! ## Overview
//!
//! This module manages:
//! - Root locations and their permission validation
//! - Breadth-first crawling of roots through the host document provider
//! - The flattened, generation-stamped snapshot cache used for cold start
//! - Single-flight store loading with versioned change notification
//! - Sorted, scoped gallery projections of a store
//!
//! ## Components
//!
//! - **Root Registry** (`registry`): persisted roots, validated against granted permissions
//! - **Tree Crawler** (`crawler`): one listing per directory, unordered results assembled into a tree
//! - **Snapshot Cache** (`snapshot`): flatten/persist/reconstruct with generational collection
//! - **Store** (`store`): orchestrates loads and publishes immutable snapshots
//! - **Listeners** (`listener`): change notification with a lifecycle-aware adapter
//! - **Gallery** (`gallery`): per media type views with sort orders (`sort`)
//! - **Directory Tree** (`directory_tree`): navigation overlay with per-directory counts

pub mod crawler;
pub mod directory_tree;
pub mod error;
pub mod gallery;
pub mod listener;
pub mod registry;
pub mod snapshot;
pub mod sort;
pub mod store;

pub use crawler::{CrawlStats, TreeCrawler};
pub use directory_tree::{DirectoryScope, DirectoryTree, TreeNode, TreeNodeId};
pub use error::{Result, SyncError};
pub use gallery::Gallery;
pub use listener::{
    ChangeKind, DataChanged, DataChangedListener, LifecycleDataChangedListener, LifecycleState,
    ListenerId,
};
pub use registry::{RootRegistry, ValidatedRoots};
pub use snapshot::{flatten, PersistOutcome, Reconstructed, SnapshotCache};
pub use sort::SortType;
pub use store::{MediaStore, StoreId, StoreSnapshot};
