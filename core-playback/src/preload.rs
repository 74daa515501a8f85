//! # Preload Window
//!
//! Keeps the host preload engine tracking exactly the items in the window
//! `[current - 1, current + 1]`, clamped to the playlist bounds. Items are
//! ranked by their playlist index; the engine then asks
//! [`PreloadWindow::target_stage`] how far each ranked item should be staged.
//!
//! ```text
//! distance   0    1        2         3..=4     5..
//! stage      src  range    tracks    src       none
//! ```

use bridge_traits::playback::{PreloadEngine, PreloadItem};
use core_runtime::config::PreloadSettings;
use core_runtime::events::{CoreEvent, EventBus, PreloadEvent};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::Result;

/// Desired preload stage of one ranked item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum PreloadStage {
    NotPreloaded,
    SourcePrepared,
    TracksSelected,
    /// Load `duration_ms` from the default start position
    SpecifiedRangeLoaded { duration_ms: u64 },
}

/// Distance based staging thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagingPolicy {
    settings: PreloadSettings,
}

impl StagingPolicy {
    pub fn new(settings: PreloadSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> PreloadSettings {
        self.settings
    }

    pub fn stage_for(&self, rank: usize, current: usize) -> PreloadStage {
        let distance = rank.abs_diff(current);
        if distance == 1 {
            PreloadStage::SpecifiedRangeLoaded {
                duration_ms: self.settings.partial_range_ms,
            }
        } else if distance == 0 {
            PreloadStage::SourcePrepared
        } else if distance <= self.settings.tracks_selected_distance {
            PreloadStage::TracksSelected
        } else if distance <= self.settings.source_prepared_distance {
            PreloadStage::SourcePrepared
        } else {
            PreloadStage::NotPreloaded
        }
    }
}

impl Default for StagingPolicy {
    fn default() -> Self {
        Self {
            settings: PreloadSettings::default(),
        }
    }
}

#[derive(Default)]
struct WindowState {
    items: Vec<PreloadItem>,
    preloaded: HashSet<PreloadItem>,
}

/// Sliding preload window over a playlist.
///
/// Engine calls are made while the window lock is held so that concurrent
/// index changes reach the engine in order. [`target_stage`](Self::target_stage)
/// does not take the lock and is safe to call from inside the engine.
pub struct PreloadWindow {
    engine: Arc<dyn PreloadEngine>,
    policy: StagingPolicy,
    events: Option<Arc<EventBus>>,
    current_index: AtomicUsize,
    state: Mutex<WindowState>,
}

impl PreloadWindow {
    pub fn new(engine: Arc<dyn PreloadEngine>, policy: StagingPolicy) -> Self {
        Self {
            engine,
            policy,
            events: None,
            current_index: AtomicUsize::new(0),
            state: Mutex::new(WindowState::default()),
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn policy(&self) -> &StagingPolicy {
        &self.policy
    }

    pub fn current_index(&self) -> usize {
        self.current_index.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Items currently registered with the engine.
    pub fn preloaded(&self) -> HashSet<PreloadItem> {
        self.state.lock().preloaded.clone()
    }

    /// Replace the playlist and move the window to `start_index`.
    pub fn reset(&self, items: Vec<PreloadItem>, start_index: usize) {
        let mut state = self.state.lock();
        debug!(items = items.len(), start_index, "Resetting preload playlist");
        state.items = items;
        self.move_window(&mut state, start_index);
    }

    pub fn set_current_index(&self, index: usize) {
        let mut state = self.state.lock();
        self.move_window(&mut state, index);
    }

    pub fn item(&self, index: usize) -> Option<PreloadItem> {
        self.state.lock().items.get(index).cloned()
    }

    /// Staging-status callback for the engine.
    pub fn target_stage(&self, rank: usize) -> PreloadStage {
        self.policy.stage_for(rank, self.current_index())
    }

    #[instrument(skip(self, state), fields(items = state.items.len()))]
    fn move_window(&self, state: &mut WindowState, index: usize) {
        if state.items.is_empty() {
            let released = state.preloaded.len();
            for item in state.preloaded.drain() {
                self.engine.remove(&item);
            }
            debug!(released, "Playlist empty, released preloaded items");
            self.emit(PreloadEvent::Cleared);
            return;
        }

        let start = index.saturating_sub(1);
        let end = index.saturating_add(1).min(state.items.len() - 1);

        let mut stale = state.preloaded.clone();
        let mut added = 0;
        for rank in start..=end {
            let item = &state.items[rank];
            if stale.remove(item) {
                continue;
            }
            if state.preloaded.insert(item.clone()) {
                self.engine.add(item, rank);
                added += 1;
            }
        }

        for item in &stale {
            self.engine.remove(item);
            state.preloaded.remove(item);
        }

        self.current_index.store(index, Ordering::Release);
        self.engine.set_current_playing_index(index);
        self.engine.invalidate();

        debug!(
            current_index = index,
            added,
            removed = stale.len(),
            "Preload window moved"
        );
        self.emit(PreloadEvent::WindowMoved {
            current_index: index,
            added,
            removed: stale.len(),
        });
    }

    fn emit(&self, event: PreloadEvent) {
        if let Some(events) = &self.events {
            let _ = events.emit(CoreEvent::Preload(event));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use mockall::predicate::eq;
    use mockall::Sequence;

    mock! {
        pub Engine {}

        impl PreloadEngine for Engine {
            fn add(&self, item: &PreloadItem, ranking: usize);
            fn remove(&self, item: &PreloadItem);
            fn set_current_playing_index(&self, index: usize);
            fn invalidate(&self);
        }
    }

    fn playlist(count: usize) -> Vec<PreloadItem> {
        (0..count)
            .map(|i| PreloadItem::new(format!("tree/videos/document/{}.mp4", i)))
            .collect()
    }

    fn window(engine: MockEngine) -> PreloadWindow {
        PreloadWindow::new(Arc::new(engine), StagingPolicy::default())
    }

    #[test]
    fn test_staging_around_index_five() {
        let policy = StagingPolicy::default();
        let stages: Vec<PreloadStage> = (0..10).map(|rank| policy.stage_for(rank, 5)).collect();

        let range = PreloadStage::SpecifiedRangeLoaded { duration_ms: 3_000 };
        assert_eq!(stages[4], range);
        assert_eq!(stages[6], range);
        assert_eq!(stages[3], PreloadStage::TracksSelected);
        assert_eq!(stages[7], PreloadStage::TracksSelected);
        for rank in [1, 2, 8, 9] {
            assert_eq!(stages[rank], PreloadStage::SourcePrepared, "rank {}", rank);
        }
        assert_eq!(stages[0], PreloadStage::NotPreloaded);
        assert_eq!(stages[5], PreloadStage::SourcePrepared);
    }

    #[test]
    fn test_custom_settings_are_validated() {
        let inverted = PreloadSettings {
            tracks_selected_distance: 5,
            source_prepared_distance: 3,
            ..PreloadSettings::default()
        };
        assert!(StagingPolicy::new(inverted).is_err());

        let wide = StagingPolicy::new(PreloadSettings {
            partial_range_ms: 1_500,
            tracks_selected_distance: 3,
            source_prepared_distance: 6,
        })
        .unwrap();
        assert_eq!(
            wide.stage_for(1, 0),
            PreloadStage::SpecifiedRangeLoaded { duration_ms: 1_500 }
        );
        assert_eq!(wide.stage_for(3, 0), PreloadStage::TracksSelected);
        assert_eq!(wide.stage_for(6, 0), PreloadStage::SourcePrepared);
        assert_eq!(wide.stage_for(7, 0), PreloadStage::NotPreloaded);
    }

    #[test]
    fn test_reset_registers_clamped_window() {
        let items = playlist(3);
        let mut engine = MockEngine::new();
        let mut seq = Sequence::new();
        engine
            .expect_add()
            .with(eq(items[0].clone()), eq(0))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        engine
            .expect_add()
            .with(eq(items[1].clone()), eq(1))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        engine
            .expect_set_current_playing_index()
            .with(eq(0))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        engine
            .expect_invalidate()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        engine.expect_remove().never();

        let window = window(engine);
        window.reset(items.clone(), 0);

        assert_eq!(window.preloaded().len(), 2);
        assert_eq!(window.current_index(), 0);
    }

    #[test]
    fn test_moving_window_swaps_only_edges() {
        let items = playlist(6);
        let mut engine = MockEngine::new();
        for rank in 1..=3 {
            engine
                .expect_add()
                .with(eq(items[rank].clone()), eq(rank))
                .times(1)
                .return_const(());
        }
        engine
            .expect_add()
            .with(eq(items[4].clone()), eq(4))
            .times(1)
            .return_const(());
        engine
            .expect_remove()
            .with(eq(items[1].clone()))
            .times(1)
            .return_const(());
        engine.expect_set_current_playing_index().times(2).return_const(());
        engine.expect_invalidate().times(2).return_const(());

        let window = window(engine);
        window.reset(items.clone(), 2);
        window.set_current_index(3);

        let preloaded = window.preloaded();
        assert_eq!(preloaded.len(), 3);
        assert!(preloaded.contains(&items[2]));
        assert!(!preloaded.contains(&items[1]));
        assert_eq!(window.target_stage(4), PreloadStage::SpecifiedRangeLoaded { duration_ms: 3_000 });
    }

    #[test]
    fn test_empty_playlist_releases_everything() {
        let items = playlist(2);
        let mut engine = MockEngine::new();
        engine.expect_add().times(2).return_const(());
        engine.expect_remove().times(2).return_const(());
        engine.expect_set_current_playing_index().times(1).return_const(());
        engine.expect_invalidate().times(1).return_const(());

        let events = Arc::new(EventBus::new(8));
        let mut rx = events.subscribe();
        let window = window(engine).with_events(events);
        window.reset(items, 0);
        window.reset(Vec::new(), 0);

        assert!(window.preloaded().is_empty());
        assert!(window.is_empty());
        assert!(matches!(
            rx.try_recv(),
            Ok(CoreEvent::Preload(PreloadEvent::WindowMoved { added: 2, .. }))
        ));
        assert_eq!(rx.try_recv().ok(), Some(CoreEvent::Preload(PreloadEvent::Cleared)));
    }

    #[test]
    fn test_index_past_end_releases_window() {
        let items = playlist(4);
        let mut engine = MockEngine::new();
        engine.expect_add().times(2).return_const(());
        engine.expect_remove().times(2).return_const(());
        engine.expect_set_current_playing_index().times(2).return_const(());
        engine.expect_invalidate().times(2).return_const(());

        let window = window(engine);
        window.reset(items, 0);
        window.set_current_index(10);

        assert!(window.preloaded().is_empty());
        assert_eq!(window.current_index(), 10);
    }

    #[test]
    fn test_item_lookup() {
        let mut engine = MockEngine::new();
        engine.expect_add().return_const(());
        engine.expect_set_current_playing_index().return_const(());
        engine.expect_invalidate().return_const(());

        let window = window(engine);
        assert!(window.item(0).is_none());
        window.reset(playlist(2), 1);

        assert_eq!(
            window.item(1),
            Some(PreloadItem::new("tree/videos/document/1.mp4"))
        );
        assert!(window.item(2).is_none());
        assert_eq!(window.len(), 2);
    }
}
