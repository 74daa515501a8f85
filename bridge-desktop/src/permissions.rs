//! Permission set backed by user-granted directories

use async_trait::async_trait;
use bridge_traits::{documents::PermissionProvider, error::Result};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Directories the user granted to the process.
///
/// A granted directory that no longer exists is not reported as readable.
#[derive(Debug, Clone, Default)]
pub struct GrantedPathsPermissions {
    granted: Arc<RwLock<HashSet<String>>>,
}

impl GrantedPathsPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            granted: Arc::new(RwLock::new(paths.into_iter().map(Into::into).collect())),
        }
    }

    pub async fn grant(&self, path: impl Into<String>) {
        let path = path.into();
        debug!(path = %path, "Granted read access");
        self.granted.write().await.insert(path);
    }

    /// Returns true if the path was granted.
    pub async fn revoke(&self, path: &str) -> bool {
        debug!(path, "Revoked read access");
        self.granted.write().await.remove(path)
    }

    pub async fn granted(&self) -> HashSet<String> {
        self.granted.read().await.clone()
    }
}

#[async_trait]
impl PermissionProvider for GrantedPathsPermissions {
    async fn current_readable_locators(&self) -> Result<HashSet<String>> {
        let granted = self.granted().await;
        let mut readable = HashSet::with_capacity(granted.len());
        for path in granted {
            if tokio::fs::metadata(Path::new(&path))
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false)
            {
                readable.insert(path);
            }
        }
        Ok(readable)
    }
}
