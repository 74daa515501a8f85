//! # Desktop Bridge Implementations
//!
//! Default implementations of the document, permission and probe bridges for
//! desktop platforms (macOS, Windows, Linux), where a root is simply a
//! directory on the local file system.
//!
//! - `FilesystemDocumentProvider` lists directories with `tokio::fs`
//! - `GrantedPathsPermissions` holds the set of directories the user granted
//! - `ImageMetadataProbe` reads image dimensions with the `image` crate
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{FilesystemDocumentProvider, GrantedPathsPermissions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let documents = FilesystemDocumentProvider::new();
//!     let permissions = GrantedPathsPermissions::new();
//!     permissions.grant("/home/me/Pictures").await;
//!
//!     // Hand both to the core configuration
//! }
//! ```

mod filesystem;
mod permissions;
mod probe;

pub use filesystem::{mime_type_for, FilesystemDocumentProvider};
pub use permissions::GrantedPathsPermissions;
pub use probe::ImageMetadataProbe;
