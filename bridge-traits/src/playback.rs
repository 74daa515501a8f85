//! Playback engine preload contract.
//!
//! The core does not play media. It only tells the host engine which items
//! around the current position deserve to be warmed up, and how urgently.

use serde::{Deserialize, Serialize};

/// Item handed to the preload engine. Identity is the document locator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PreloadItem {
    pub locator: String,
}

impl PreloadItem {
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
        }
    }
}

/// Preload manager exposed by the host playback engine.
///
/// Calls are cheap bookkeeping on the host side and therefore synchronous.
/// The engine asks the core for the desired stage of each item through the
/// staging policy once [`invalidate`](PreloadEngine::invalidate) is called.
pub trait PreloadEngine: Send + Sync {
    /// Start tracking `item`, ranked by the index it was added for.
    fn add(&self, item: &PreloadItem, ranking: usize);

    /// Release `item` and any resources staged for it.
    fn remove(&self, item: &PreloadItem);

    fn set_current_playing_index(&self, index: usize);

    /// Re-evaluate every tracked item against the staging policy.
    fn invalidate(&self);
}
