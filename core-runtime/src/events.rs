//! # Event Bus System
//!
//! Provides an event-driven architecture for the media index using `tokio::sync::broadcast`.
//! Stores, the snapshot cache and the preload window publish typed events; hosts
//! subscribe for diagnostics, progress indicators or analytics.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enum hierarchies for different domains
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     emit      ┌───────────┐
//! │ MediaStore   ├──────────────>│           │
//! └──────────────┘               │           │
//!                                │ EventBus  │
//! ┌──────────────┐     emit      │ (broadcast│     subscribe    ┌────────────┐
//! │SnapshotCache ├──────────────>│  channel) ├─────────────────>│ Subscriber │
//! └──────────────┘               │           │                  └────────────┘
//!                                │           │
//! ┌──────────────┐     emit      │           │
//! │PreloadWindow ├──────────────>│           │
//! └──────────────┘               └───────────┘
//! ```
//!
//! ## Usage
//!
//! ### Publishing Events
//!
//! ```rust
//! use core_runtime::events::{EventBus, CoreEvent, RootEvent};
//!
//! let event_bus = EventBus::new(100);
//! let event = CoreEvent::Roots(RootEvent::Added {
//!     visibility: "public".to_string(),
//!     locator: "content://tree/primary%3ADCIM".to_string(),
//!     name: "DCIM".to_string(),
//! });
//!
//! event_bus.emit(event).ok();
//! ```
//!
//! ### Filtering Events
//!
//! ```rust
//! use core_runtime::events::{EventBus, EventStream, CoreEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = EventStream::new(event_bus.subscribe())
//!     .filter(|event| matches!(event, CoreEvent::Index(_)));
//!
//! tokio::spawn(async move {
//!     while let Ok(event) = stream.recv().await {
//!         println!("Index event: {}", event.description());
//!     }
//! });
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! Emitting with no subscribers returns an error; publishers ignore it.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Store load lifecycle
    Index(IndexEvent),
    /// Root registry changes
    Roots(RootEvent),
    /// Snapshot persistence
    Cache(CacheEvent),
    /// Preload window movement
    Preload(PreloadEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Index(e) => e.description(),
            CoreEvent::Roots(e) => e.description(),
            CoreEvent::Cache(e) => e.description(),
            CoreEvent::Preload(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Index(IndexEvent::LoadCompleted { success: false, .. }) => {
                EventSeverity::Error
            }
            CoreEvent::Cache(CacheEvent::PersistFailed { .. }) => EventSeverity::Error,
            CoreEvent::Roots(RootEvent::Dropped { .. }) => EventSeverity::Warning,
            CoreEvent::Index(IndexEvent::LoadCompleted { .. }) => EventSeverity::Info,
            CoreEvent::Roots(_) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Index Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum IndexEvent {
    /// A store left Idle
    LoadStarted { visibility: String, is_refresh: bool },

    /// A store returned to Idle
    LoadCompleted {
        visibility: String,
        data_version: i64,
        success: bool,
        /// True when the tree came from the persisted snapshot
        from_cache: bool,
        root_count: usize,
        file_count: usize,
        duration_ms: u64,
    },
}

impl IndexEvent {
    fn description(&self) -> &str {
        match self {
            IndexEvent::LoadStarted { .. } => "Index load started",
            IndexEvent::LoadCompleted { success: true, .. } => "Index load completed",
            IndexEvent::LoadCompleted { .. } => "Index load failed",
        }
    }
}

// ============================================================================
// Root Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum RootEvent {
    Added {
        visibility: String,
        locator: String,
        name: String,
    },
    Removed {
        visibility: String,
        locator: String,
    },
    /// Persisted roots whose read grant no longer holds
    Dropped { visibility: String, count: usize },
}

impl RootEvent {
    fn description(&self) -> &str {
        match self {
            RootEvent::Added { .. } => "Root added",
            RootEvent::Removed { .. } => "Root removed",
            RootEvent::Dropped { .. } => "Roots dropped after permission check",
        }
    }
}

// ============================================================================
// Cache Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CacheEvent {
    SnapshotPersisted {
        visibility: String,
        generation_id: i64,
        rows_written: u64,
        rows_collected: u64,
    },
    PersistFailed {
        visibility: String,
        generation_id: i64,
        message: String,
    },
}

impl CacheEvent {
    fn description(&self) -> &str {
        match self {
            CacheEvent::SnapshotPersisted { .. } => "Snapshot persisted",
            CacheEvent::PersistFailed { .. } => "Snapshot persistence failed",
        }
    }
}

// ============================================================================
// Preload Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PreloadEvent {
    WindowMoved {
        current_index: usize,
        added: usize,
        removed: usize,
    },
    Cleared,
}

impl PreloadEvent {
    fn description(&self) -> &str {
        match self {
            PreloadEvent::WindowMoved { .. } => "Preload window moved",
            PreloadEvent::Cleared => "Preload window cleared",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to core events.
///
/// Cloning the bus shares the underlying channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// when nobody is listening.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Receiver wrapper with an optional predicate.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only yield events matching `predicate`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that matches the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
