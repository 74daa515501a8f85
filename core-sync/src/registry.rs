//! # Root Registry
//!
//! Persisted root locations per visibility, validated against the set of
//! locations the host still grants read access to.

use crate::error::Result;
use bridge_traits::documents::{DocumentProvider, PermissionProvider};
use bridge_traits::time::Clock;
use core_library::models::{RootLocation, Visibility};
use core_library::repositories::RootRepository;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Roots that survived validation, plus how many were dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatedRoots {
    pub roots: Vec<RootLocation>,
    pub dropped: usize,
}

pub struct RootRegistry {
    repository: Arc<dyn RootRepository>,
    documents: Arc<dyn DocumentProvider>,
    permissions: Arc<dyn PermissionProvider>,
    clock: Arc<dyn Clock>,
}

impl RootRegistry {
    pub fn new(
        repository: Arc<dyn RootRepository>,
        documents: Arc<dyn DocumentProvider>,
        permissions: Arc<dyn PermissionProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            documents,
            permissions,
            clock,
        }
    }

    pub async fn list_roots(&self, visibility: Visibility) -> Result<Vec<RootLocation>> {
        Ok(self.repository.list(visibility).await?)
    }

    /// Persist a root, resolving its display name from the document provider.
    ///
    /// A failed or empty name lookup still adds the root, unnamed.
    #[instrument(skip(self))]
    pub async fn add_root(&self, locator: &str, visibility: Visibility) -> Result<RootLocation> {
        let display_name = match self.documents.resolve_display_name(locator).await {
            Ok(Some(name)) if !name.is_empty() => name,
            Ok(_) => {
                warn!(locator, "Root has no display name");
                String::new()
            }
            Err(e) => {
                warn!(locator, error = %e, "Failed to resolve root display name");
                String::new()
            }
        };

        let root = RootLocation::new(locator, visibility, display_name);
        self.repository
            .upsert(&root, self.clock.unix_timestamp_millis())
            .await?;
        info!(locator, name = %root.display_name, "Added root");
        Ok(root)
    }

    /// Delete exactly `locator` from the `visibility` scope.
    #[instrument(skip(self))]
    pub async fn remove_root(&self, locator: &str, visibility: Visibility) -> Result<bool> {
        let removed = self.repository.delete(locator, visibility).await?;
        if !removed {
            debug!(locator, "Root was not registered");
        }
        Ok(removed)
    }

    /// Keep only roots the host still grants read access to.
    pub async fn validate(&self, roots: Vec<RootLocation>) -> Result<ValidatedRoots> {
        let readable = self.permissions.current_readable_locators().await?;
        let total = roots.len();
        let roots: Vec<RootLocation> = roots
            .into_iter()
            .filter(|root| readable.contains(&root.locator))
            .collect();

        let dropped = total - roots.len();
        if dropped > 0 {
            warn!(dropped, kept = roots.len(), "Dropped roots without read permission");
        }
        Ok(ValidatedRoots { roots, dropped })
    }

    /// Persisted roots of a scope, validated.
    pub async fn load_valid(&self, visibility: Visibility) -> Result<ValidatedRoots> {
        let roots = self.list_roots(visibility).await?;
        self.validate(roots).await
    }
}
