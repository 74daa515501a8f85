//! Document Listing & Permission Abstractions
//!
//! The host platform exposes user-granted hierarchical locations ("roots").
//! The core only ever asks two questions of a root: "what are the children of
//! this node?" and "what is the root called?". Result sets are unordered.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::Result;

/// Mime type reported for directory entries.
pub const DIRECTORY_MIME_TYPE: &str = "inode/directory";

/// Mime type the Android document provider reports for directories.
pub const DOCUMENT_TREE_DIRECTORY_MIME_TYPE: &str = "vnd.android.document/directory";

/// One child returned by [`DocumentProvider::list_children`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEntry {
    /// Opaque identifier, unique within the granting root's visibility scope
    pub doc_id: String,
    pub display_name: String,
    pub mime_type: String,
    /// Size in bytes
    pub size: i64,
    /// Last modification time (milliseconds since epoch)
    pub last_modified: i64,
}

impl DocumentEntry {
    pub fn new(
        doc_id: impl Into<String>,
        display_name: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            doc_id: doc_id.into(),
            display_name: display_name.into(),
            mime_type: mime_type.into(),
            size: 0,
            last_modified: 0,
        }
    }

    pub fn with_size(mut self, size: i64) -> Self {
        self.size = size;
        self
    }

    pub fn with_last_modified(mut self, last_modified: i64) -> Self {
        self.last_modified = last_modified;
        self
    }

    /// Returns true when the entry denotes a directory.
    pub fn is_directory(&self) -> bool {
        self.mime_type == DIRECTORY_MIME_TYPE
            || self.mime_type == DOCUMENT_TREE_DIRECTORY_MIME_TYPE
    }
}

/// Hierarchical document listing capability.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::documents::DocumentProvider;
///
/// async fn top_level(provider: &dyn DocumentProvider, root: &str) {
///     // An empty parent id lists the root's implicit top document
///     let children = provider.list_children(root, "").await?;
/// }
/// ```
#[async_trait]
pub trait DocumentProvider: Send + Sync {
    /// List the children of `parent_doc_id` under `root`.
    ///
    /// An empty `parent_doc_id` addresses the root's top document.
    async fn list_children(&self, root: &str, parent_doc_id: &str)
        -> Result<Vec<DocumentEntry>>;

    /// Resolve the human readable name of a root.
    async fn resolve_display_name(&self, root: &str) -> Result<Option<String>>;

    /// Build the locator of a document below `root`.
    fn document_locator(&self, root: &str, doc_id: &str) -> String {
        format!("{}/document/{}", root, doc_id)
    }
}

/// Permission capability used to validate persisted roots.
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    /// Locators of every root the process may currently read.
    async fn current_readable_locators(&self) -> Result<HashSet<String>>;
}
