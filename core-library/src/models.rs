//! Domain models for the media index
//!
//! Nodes form an owned tree per root: a [`MediaRoot`] owns its top-level
//! [`MediaNode`]s and every directory owns its children. Persistence works on
//! the flattened [`CacheRow`] form.

use bridge_traits::DIRECTORY_MIME_TYPE;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Scopes
// =============================================================================

/// Partition of the whole index. Each visibility has its own roots, cache
/// table, store and galleries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub const ALL: [Visibility; 2] = [Visibility::Public, Visibility::Private];

    pub fn key(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }

    /// Parse a persisted key. Unknown keys fall back to `Public`.
    pub fn from_key(key: &str) -> Self {
        match key {
            "private" => Visibility::Private,
            _ => Visibility::Public,
        }
    }

    pub(crate) fn roots_table(&self) -> &'static str {
        match self {
            Visibility::Public => "root_locations_public",
            Visibility::Private => "root_locations_private",
        }
    }

    pub(crate) fn cache_table(&self) -> &'static str {
        match self {
            Visibility::Public => "media_cache_public",
            Visibility::Private => "media_cache_private",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Kind of a media file, derived from its mime type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    pub const ALL: [MediaType; 2] = [MediaType::Image, MediaType::Video];

    pub fn key(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "image" => Some(MediaType::Image),
            "video" => Some(MediaType::Video),
            _ => None,
        }
    }

    /// Classify a mime type; anything that is not `image/*` or `video/*` is
    /// not media.
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        if mime_type.starts_with("image/") {
            Some(MediaType::Image)
        } else if mime_type.starts_with("video/") {
            Some(MediaType::Video)
        } else {
            None
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// =============================================================================
// Roots
// =============================================================================

/// A user-granted location the index may read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootLocation {
    pub locator: String,
    pub visibility: Visibility,
    /// Empty when the name could not be resolved
    pub display_name: String,
}

impl RootLocation {
    pub fn new(
        locator: impl Into<String>,
        visibility: Visibility,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            locator: locator.into(),
            visibility,
            display_name: display_name.into(),
        }
    }
}

// =============================================================================
// Metadata
// =============================================================================

/// Probed properties of a media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataValues {
    pub width: i32,
    pub height: i32,
    pub duration_ms: i64,
    pub rotation_degrees: i32,
}

/// Cached metadata of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub doc_id: String,
    pub width: i32,
    pub height: i32,
    pub duration_ms: i64,
    pub rotation_degrees: i32,
    /// Modification time of the document when it was probed
    pub last_modified: i64,
}

impl Metadata {
    pub fn new(doc_id: impl Into<String>, last_modified: i64, values: MetadataValues) -> Self {
        Self {
            doc_id: doc_id.into(),
            width: values.width,
            height: values.height,
            duration_ms: values.duration_ms,
            rotation_degrees: values.rotation_degrees,
            last_modified,
        }
    }

    /// Metadata is only valid for the exact revision it was probed from.
    pub fn is_valid_for(&self, last_modified: i64) -> bool {
        self.last_modified == last_modified
    }
}

/// Render a duration as `m:ss`. Non-positive durations render empty.
pub fn format_duration(duration_ms: i64) -> String {
    if duration_ms <= 0 {
        return String::new();
    }
    let seconds = duration_ms / 1000;
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

// =============================================================================
// Nodes
// =============================================================================

/// Fields shared by directories and files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub locator: String,
    pub doc_id: String,
    /// Empty for nodes directly under a root
    pub parent_doc_id: String,
    pub root_locator: String,
    pub name: String,
    pub mime_type: String,
    pub size: i64,
    pub last_modified: i64,
    /// Slash-separated path of the containing directory, starting at the root name
    pub path: String,
}

impl NodeInfo {
    pub fn is_top_level(&self) -> bool {
        self.parent_doc_id.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDirectory {
    pub info: NodeInfo,
    pub children: Vec<MediaNode>,
}

impl MediaDirectory {
    pub fn new(info: NodeInfo) -> Self {
        Self {
            info,
            children: Vec::new(),
        }
    }

    /// Direct child directories.
    pub fn directories(&self) -> impl Iterator<Item = &MediaDirectory> {
        self.children.iter().filter_map(MediaNode::as_directory)
    }

    /// Direct child files.
    pub fn files(&self) -> impl Iterator<Item = &MediaFile> {
        self.children.iter().filter_map(MediaNode::as_file)
    }

    /// Path handed to the children of this directory.
    pub fn child_path(&self) -> String {
        format!("{}/{}", self.info.path, self.info.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub info: NodeInfo,
    pub media_type: MediaType,
    pub metadata: Option<Metadata>,
}

impl MediaFile {
    pub fn new(info: NodeInfo, media_type: MediaType) -> Self {
        Self {
            info,
            media_type,
            metadata: None,
        }
    }

    /// `m:ss` for videos with known duration, empty otherwise.
    pub fn duration_label(&self) -> String {
        self.metadata
            .as_ref()
            .map(|metadata| format_duration(metadata.duration_ms))
            .unwrap_or_default()
    }
}

/// A node of the live tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaNode {
    Directory(MediaDirectory),
    File(MediaFile),
}

impl MediaNode {
    pub fn info(&self) -> &NodeInfo {
        match self {
            MediaNode::Directory(dir) => &dir.info,
            MediaNode::File(file) => &file.info,
        }
    }

    pub fn doc_id(&self) -> &str {
        &self.info().doc_id
    }

    pub fn name(&self) -> &str {
        &self.info().name
    }

    pub fn as_directory(&self) -> Option<&MediaDirectory> {
        match self {
            MediaNode::Directory(dir) => Some(dir),
            MediaNode::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&MediaFile> {
        match self {
            MediaNode::File(file) => Some(file),
            MediaNode::Directory(_) => None,
        }
    }

    /// Persisted media type key; empty for directories.
    pub fn media_type_key(&self) -> &'static str {
        match self {
            MediaNode::Directory(_) => "",
            MediaNode::File(file) => file.media_type.key(),
        }
    }
}

/// The tree of one root location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRoot {
    pub locator: String,
    pub name: String,
    pub children: Vec<MediaNode>,
}

impl MediaRoot {
    pub fn new(locator: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            name: name.into(),
            children: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Every file below this root, depth first.
    pub fn files(&self) -> Vec<&MediaFile> {
        let mut files = Vec::new();
        collect_files(&self.children, &mut files);
        files
    }

    /// Find a directory anywhere below this root.
    pub fn find_directory(&self, doc_id: &str) -> Option<&MediaDirectory> {
        let mut stack: Vec<&MediaNode> = self.children.iter().collect();
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

    /// Number of nodes (directories and files) below this root.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack: Vec<&MediaNode> = self.children.iter().collect();
        while let Some(node) = stack.pop() {
            count += 1;
            if let MediaNode::Directory(dir) = node {
                stack.extend(dir.children.iter());
            }
        }
        count
    }
}

/// Append every file reachable from `nodes` to `out`.
pub fn collect_files<'a>(nodes: &'a [MediaNode], out: &mut Vec<&'a MediaFile>) {
    let mut stack: Vec<&MediaNode> = nodes.iter().rev().collect();
    while let Some(node) = stack.pop() {
        match node {
            MediaNode::File(file) => out.push(file),
            MediaNode::Directory(dir) => stack.extend(dir.children.iter().rev()),
        }
    }
}

// =============================================================================
// Persistence
// =============================================================================

/// Flattened persistence record of one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRow {
    pub doc_id: String,
    pub parent_id: String,
    pub display_name: String,
    pub mime_type: String,
    pub size: i64,
    pub last_modified: i64,
    pub generation_id: i64,
    pub locator: String,
    pub root_locator: String,
    pub file_path: String,
    /// `"image"`, `"video"`, or empty for directories
    pub media_type_key: String,
}

impl CacheRow {
    pub fn from_node(node: &MediaNode, generation_id: i64) -> Self {
        let info = node.info();
        Self {
            doc_id: info.doc_id.clone(),
            parent_id: info.parent_doc_id.clone(),
            display_name: info.name.clone(),
            mime_type: info.mime_type.clone(),
            size: info.size,
            last_modified: info.last_modified,
            generation_id,
            locator: info.locator.clone(),
            root_locator: info.root_locator.clone(),
            file_path: info.path.clone(),
            media_type_key: node.media_type_key().to_string(),
        }
    }

    pub fn is_directory(&self) -> bool {
        self.media_type_key.is_empty()
    }

    fn node_info(&self) -> NodeInfo {
        NodeInfo {
            locator: self.locator.clone(),
            doc_id: self.doc_id.clone(),
            parent_doc_id: self.parent_id.clone(),
            root_locator: self.root_locator.clone(),
            name: self.display_name.clone(),
            mime_type: self.mime_type.clone(),
            size: self.size,
            last_modified: self.last_modified,
            path: self.file_path.clone(),
        }
    }

    /// Rebuild the node (without children or metadata).
    ///
    /// Returns `None` when the media type key is not recognised.
    pub fn to_node(&self) -> Option<MediaNode> {
        if self.is_directory() {
            return Some(MediaNode::Directory(MediaDirectory::new(self.node_info())));
        }
        MediaType::from_key(&self.media_type_key)
            .map(|media_type| MediaNode::File(MediaFile::new(self.node_info(), media_type)))
    }
}

/// Placeholder info for a directory referenced before its own row is read.
pub fn placeholder_directory_info(doc_id: &str) -> NodeInfo {
    NodeInfo {
        locator: String::new(),
        doc_id: doc_id.to_string(),
        parent_doc_id: String::new(),
        root_locator: String::new(),
        name: String::new(),
        mime_type: DIRECTORY_MIME_TYPE.to_string(),
        size: 0,
        last_modified: 0,
        path: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(doc_id: &str, parent: &str, name: &str, mime: &str) -> NodeInfo {
        NodeInfo {
            locator: format!("root/document/{}", doc_id),
            doc_id: doc_id.to_string(),
            parent_doc_id: parent.to_string(),
            root_locator: "root".to_string(),
            name: name.to_string(),
            mime_type: mime.to_string(),
            size: 10,
            last_modified: 100,
            path: "Camera".to_string(),
        }
    }

    fn sample_root() -> MediaRoot {
        let mut trip = MediaDirectory::new(info("d1", "", "Trip", DIRECTORY_MIME_TYPE));
        trip.children.push(MediaNode::File(MediaFile::new(
            info("f2", "d1", "beach.mp4", "video/mp4"),
            MediaType::Video,
        )));

        let mut root = MediaRoot::new("root", "Camera");
        root.children.push(MediaNode::File(MediaFile::new(
            info("f1", "", "cat.jpg", "image/jpeg"),
            MediaType::Image,
        )));
        root.children.push(MediaNode::Directory(trip));
        root
    }

    #[test]
    fn test_visibility_keys() {
        assert_eq!(Visibility::Private.key(), "private");
        assert_eq!(Visibility::from_key("private"), Visibility::Private);
        assert_eq!(Visibility::from_key("public"), Visibility::Public);
        assert_eq!(Visibility::from_key("bogus"), Visibility::Public);
    }

    #[test]
    fn test_media_type_from_mime() {
        assert_eq!(MediaType::from_mime("image/png"), Some(MediaType::Image));
        assert_eq!(MediaType::from_mime("video/mp4"), Some(MediaType::Video));
        assert_eq!(MediaType::from_mime("audio/mpeg"), None);
        assert_eq!(MediaType::from_key("video"), Some(MediaType::Video));
        assert_eq!(MediaType::from_key(""), None);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "");
        assert_eq!(format_duration(-5), "");
        assert_eq!(format_duration(61_000), "1:01");
        assert_eq!(format_duration(65_000), "1:05");
        assert_eq!(format_duration(3_599_999), "59:59");
    }

    #[test]
    fn test_metadata_validity_requires_exact_timestamp() {
        let values = MetadataValues {
            width: 1920,
            height: 1080,
            duration_ms: 0,
            rotation_degrees: 0,
        };
        let metadata = Metadata::new("f1", 150, values);
        assert!(metadata.is_valid_for(150));
        assert!(!metadata.is_valid_for(200));
    }

    #[test]
    fn test_root_traversal() {
        let root = sample_root();

        let names: Vec<_> = root.files().iter().map(|f| f.info.name.as_str()).collect();
        assert_eq!(names, vec!["cat.jpg", "beach.mp4"]);
        assert_eq!(root.node_count(), 3);
        assert!(root.find_directory("d1").is_some());
        assert!(root.find_directory("f1").is_none());
    }

    #[test]
    fn test_cache_row_conversion() {
        let root = sample_root();
        let dir = &root.children[1];
        let row = CacheRow::from_node(dir, 7);

        assert!(row.is_directory());
        assert_eq!(row.generation_id, 7);
        assert_eq!(row.media_type_key, "");

        let file_row = CacheRow::from_node(&root.children[0], 7);
        assert_eq!(file_row.media_type_key, "image");
        let node = file_row.to_node().unwrap();
        assert_eq!(node.as_file().unwrap().media_type, MediaType::Image);

        let mut unknown = file_row.clone();
        unknown.media_type_key = "audio".to_string();
        assert!(unknown.to_node().is_none());
    }

    #[test]
    fn test_child_path() {
        let dir = MediaDirectory::new(info("d1", "", "Trip", DIRECTORY_MIME_TYPE));
        assert_eq!(dir.child_path(), "Camera/Trip");
    }
}
