//! Directory navigation overlay.
//!
//! One [`DirectoryTree`] per root, stored as an arena of [`TreeNode`]s addressed
//! by [`TreeNodeId`]. Nodes reference directories by doc id and hold
//! precomputed image and video counts of their whole subtree.

use core_library::models::{MediaDirectory, MediaNode, MediaRoot, MediaType};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreeNodeId(usize);

impl TreeNodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Restricts a gallery to one root or one directory below it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectoryScope {
    pub root_locator: String,
    /// `None` scopes to the whole root
    pub doc_id: Option<String>,
}

impl DirectoryScope {
    pub fn root(root_locator: impl Into<String>) -> Self {
        Self {
            root_locator: root_locator.into(),
            doc_id: None,
        }
    }

    pub fn directory(root_locator: impl Into<String>, doc_id: impl Into<String>) -> Self {
        Self {
            root_locator: root_locator.into(),
            doc_id: Some(doc_id.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    parent: Option<TreeNodeId>,
    children: Vec<TreeNodeId>,
    name: String,
    doc_id: Option<String>,
    image_count: usize,
    video_count: usize,
}

impl TreeNode {
    pub fn parent(&self) -> Option<TreeNodeId> {
        self.parent
    }

    pub fn children(&self) -> &[TreeNodeId] {
        &self.children
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `None` for the root node.
    pub fn doc_id(&self) -> Option<&str> {
        self.doc_id.as_deref()
    }

    pub fn image_count(&self) -> usize {
        self.image_count
    }

    pub fn video_count(&self) -> usize {
        self.video_count
    }

    pub fn file_count(&self) -> usize {
        self.image_count + self.video_count
    }

    pub fn count(&self, media_type: MediaType) -> usize {
        match media_type {
            MediaType::Image => self.image_count,
            MediaType::Video => self.video_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryTree {
    root_locator: String,
    nodes: Vec<TreeNode>,
}

impl DirectoryTree {
    const ROOT: TreeNodeId = TreeNodeId(0);

    /// Build the overlay of `root`, breadth first.
    pub fn build(root: &MediaRoot) -> Self {
        let mut nodes = vec![TreeNode {
            parent: None,
            children: Vec::new(),
            name: root.name.clone(),
            doc_id: None,
            image_count: 0,
            video_count: 0,
        }];
        let (images, videos) = direct_counts(&root.children);
        nodes[0].image_count = images;
        nodes[0].video_count = videos;

        let mut pending: VecDeque<(TreeNodeId, &MediaDirectory)> = root
            .children
            .iter()
            .filter_map(MediaNode::as_directory)
            .map(|dir| (Self::ROOT, dir))
            .collect();

        while let Some((parent, dir)) = pending.pop_front() {
            let id = TreeNodeId(nodes.len());
            let (images, videos) = direct_counts(&dir.children);
            nodes.push(TreeNode {
                parent: Some(parent),
                children: Vec::new(),
                name: dir.info.name.clone(),
                doc_id: Some(dir.info.doc_id.clone()),
                image_count: images,
                video_count: videos,
            });
            nodes[parent.0].children.push(id);
            pending.extend(dir.directories().map(|child| (id, child)));
        }

        // Children always follow their parent, so a reverse sweep folds every
        // subtree into its parent after the subtree itself is complete.
        for index in (1..nodes.len()).rev() {
            if let Some(parent) = nodes[index].parent {
                let (images, videos) = (nodes[index].image_count, nodes[index].video_count);
                nodes[parent.0].image_count += images;
                nodes[parent.0].video_count += videos;
            }
        }

        Self {
            root_locator: root.locator.clone(),
            nodes,
        }
    }

    pub fn root_locator(&self) -> &str {
        &self.root_locator
    }

    pub fn root(&self) -> TreeNodeId {
        Self::ROOT
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn node(&self, id: TreeNodeId) -> Option<&TreeNode> {
        self.nodes.get(id.0)
    }

    pub fn children(&self, id: TreeNodeId) -> &[TreeNodeId] {
        self.node(id).map(TreeNode::children).unwrap_or_default()
    }

    pub fn parent(&self, id: TreeNodeId) -> Option<TreeNodeId> {
        self.node(id).and_then(TreeNode::parent)
    }

    pub fn find(&self, doc_id: &str) -> Option<TreeNodeId> {
        self.nodes
            .iter()
            .position(|node| node.doc_id.as_deref() == Some(doc_id))
            .map(TreeNodeId)
    }

    /// Handles from the root down to `id`, both included.
    pub fn breadcrumb(&self, id: TreeNodeId) -> Vec<TreeNodeId> {
        let mut path = Vec::new();
        let mut current = self.node(id).map(|_| id);
        while let Some(step) = current {
            path.push(step);
            current = self.parent(step);
        }
        path.reverse();
        path
    }

    /// Gallery scope selecting the subtree of `id`.
    pub fn scope(&self, id: TreeNodeId) -> Option<DirectoryScope> {
        let node = self.node(id)?;
        Some(DirectoryScope {
            root_locator: self.root_locator.clone(),
            doc_id: node.doc_id.clone(),
        })
    }
}

fn direct_counts(children: &[MediaNode]) -> (usize, usize) {
    children
        .iter()
        .filter_map(MediaNode::as_file)
        .fold((0, 0), |(images, videos), file| match file.media_type {
            MediaType::Image => (images + 1, videos),
            MediaType::Video => (images, videos + 1),
        })
}
