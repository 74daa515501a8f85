//! In-memory metadata cache backed by the `media_metadata` table.
//!
//! The map is warmed once from the table; afterwards it is authoritative and
//! every write goes to both the map and the table.

use crate::error::Result;
use core_library::models::Metadata;
use core_library::repositories::MetadataRepository;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct MetadataCache {
    repository: Arc<dyn MetadataRepository>,
    entries: RwLock<HashMap<String, Metadata>>,
    warm: AtomicBool,
}

impl MetadataCache {
    pub fn new(repository: Arc<dyn MetadataRepository>) -> Self {
        Self {
            repository,
            entries: RwLock::new(HashMap::new()),
            warm: AtomicBool::new(false),
        }
    }

    /// Load every persisted record into memory.
    ///
    /// Returns the number of cached records.
    pub async fn warm_up(&self) -> Result<usize> {
        let records = self.repository.all().await?;
        let count = records.len();
        {
            let mut entries = self.entries.write();
            for record in records {
                entries.insert(record.doc_id.clone(), record);
            }
        }
        self.warm.store(true, Ordering::Release);
        info!(records = count, "Metadata cache warmed");
        Ok(count)
    }

    pub fn is_warm(&self) -> bool {
        self.warm.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Metadata of `doc_id` probed from exactly the `last_modified` revision.
    ///
    /// Before warm-up a miss falls through to the table. Read failures are
    /// logged and reported as a miss.
    pub async fn lookup(&self, doc_id: &str, last_modified: i64) -> Option<Metadata> {
        let cached = self.entries.read().get(doc_id).cloned();
        if let Some(found) = cached {
            return found.is_valid_for(last_modified).then_some(found);
        }
        if self.is_warm() {
            return None;
        }

        match self.repository.find(doc_id).await {
            Ok(Some(found)) => {
                let valid = found.is_valid_for(last_modified);
                self.entries.write().insert(doc_id.to_string(), found.clone());
                valid.then_some(found)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(doc_id, error = %e, "Metadata lookup failed");
                None
            }
        }
    }

    /// Record `metadata` in memory and replace its row.
    pub async fn store(&self, metadata: &Metadata) -> Result<()> {
        self.entries
            .write()
            .insert(metadata.doc_id.clone(), metadata.clone());
        self.repository.replace(metadata).await?;
        Ok(())
    }

    /// Record many values in memory and replace their rows in one transaction.
    pub async fn store_batch(&self, records: &[Metadata]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        {
            let mut entries = self.entries.write();
            for record in records {
                entries.insert(record.doc_id.clone(), record.clone());
            }
        }
        self.repository.replace_batch(records).await?;
        debug!(records = records.len(), "Flushed probed metadata");
        Ok(())
    }
}
