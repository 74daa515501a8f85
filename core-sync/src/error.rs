use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Invalid listener transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] core_metadata::MetadataError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::error::BridgeError),
}

pub type Result<T> = std::result::Result<T, SyncError>;
