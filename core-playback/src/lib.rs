//! # Playback Continuity
//!
//! The core never decodes or renders media. It keeps a small window of items
//! around the playing position registered with the host's preload engine and
//! answers the engine's question of how far each ranked item should be staged.
//!
//! ## Overview
//!
//! - [`StagingPolicy`] maps the distance from the playing index to a
//!   [`PreloadStage`]
//! - [`PreloadWindow`] tracks the playlist and keeps the engine's set equal to
//!   the window `[index - 1, index + 1]`

pub mod error;
pub mod preload;

pub use error::{PlaybackError, Result};
pub use preload::{PreloadStage, PreloadWindow, StagingPolicy};
