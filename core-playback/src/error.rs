//! # Playback Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlaybackError {
    /// Preload staging distances failed validation.
    #[error("Invalid preload settings: {0}")]
    InvalidSettings(#[from] core_runtime::Error),
}

pub type Result<T> = std::result::Result<T, PlaybackError>;
