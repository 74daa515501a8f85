//! Workspace façade crate.
//!
//! Exposes the feature flags that map onto the individual workspace crates
//! (`core-service`, `core-sync`, `core-playback`, ...). Desktop hosts depend on
//! `mediaflow-workspace` with the default `desktop-shims` feature and get the
//! service façade without wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service::{CoreError, CoreService, Result};
