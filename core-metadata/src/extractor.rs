//! Metadata resolution for crawled media files
//!
//! A file's metadata is resolved from the cache when the cached record was
//! probed from the file's current revision. Otherwise, in [`ExtractionMode::Probe`],
//! the host probe is asked for dimensions, duration and rotation and the result
//! is written to the cache before it is attached to the file.
//!
//! Failures never propagate to the caller: a file whose metadata cannot be
//! resolved simply stays without metadata.
//!
//! ## Usage
//!
//! ```ignore
//! use core_metadata::{ExtractionMode, MetadataExtractor};
//!
//! # async fn example(extractor: MetadataExtractor, file: &mut core_library::MediaFile) {
//! extractor.ensure_metadata(file, ExtractionMode::CacheOnly).await;
//! if let Some(metadata) = &file.metadata {
//!     println!("{}x{}", metadata.width, metadata.height);
//! }
//! # }
//! ```

use bridge_traits::probe::MetadataProbe;
use core_library::models::{MediaFile, MediaType, Metadata, MetadataValues};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::MetadataCache;
use crate::error::{MetadataError, Result};

/// Whether a cache miss may fall back to probing the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractionMode {
    #[default]
    CacheOnly,
    Probe,
}

impl ExtractionMode {
    pub fn from_cache_only(cache_only: bool) -> Self {
        if cache_only {
            Self::CacheOnly
        } else {
            Self::Probe
        }
    }
}

pub struct MetadataExtractor {
    cache: Arc<MetadataCache>,
    probe: Option<Arc<dyn MetadataProbe>>,
}

impl MetadataExtractor {
    pub fn new(cache: Arc<MetadataCache>, probe: Option<Arc<dyn MetadataProbe>>) -> Self {
        Self { cache, probe }
    }

    pub fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    pub fn can_probe(&self) -> bool {
        self.probe.is_some()
    }

    /// Attach metadata to `file` if it has none yet.
    pub async fn ensure_metadata(&self, file: &mut MediaFile, mode: ExtractionMode) {
        if file.metadata.is_some() {
            return;
        }

        if let Some(cached) = self
            .cache
            .lookup(&file.info.doc_id, file.info.last_modified)
            .await
        {
            file.metadata = Some(cached);
            return;
        }

        if mode == ExtractionMode::CacheOnly {
            return;
        }

        match self.probe_file(file).await {
            Ok(metadata) => {
                if let Err(e) = self.cache.store(&metadata).await {
                    warn!(doc_id = %metadata.doc_id, error = %e, "Failed to persist probed metadata");
                }
                file.metadata = Some(metadata);
            }
            Err(e) => {
                warn!(doc_id = %file.info.doc_id, error = %e, "Metadata probe failed");
            }
        }
    }

    /// Resolve a listing batch, persisting every probed value in one write.
    ///
    /// Returns how many files carry metadata afterwards.
    pub async fn ensure_batch(&self, files: Vec<&mut MediaFile>, mode: ExtractionMode) -> usize {
        let mut files = files;
        let mut probed: Vec<(usize, Metadata)> = Vec::new();

        for (index, file) in files.iter_mut().enumerate() {
            let file = &mut **file;
            if file.metadata.is_some() {
                continue;
            }
            if let Some(cached) = self
                .cache
                .lookup(&file.info.doc_id, file.info.last_modified)
                .await
            {
                file.metadata = Some(cached);
                continue;
            }
            if mode == ExtractionMode::CacheOnly {
                continue;
            }
            match self.probe_file(file).await {
                Ok(metadata) => probed.push((index, metadata)),
                Err(e) => {
                    warn!(doc_id = %file.info.doc_id, error = %e, "Metadata probe failed");
                }
            }
        }

        if !probed.is_empty() {
            let records: Vec<Metadata> = probed.iter().map(|(_, m)| m.clone()).collect();
            if let Err(e) = self.cache.store_batch(&records).await {
                warn!(records = records.len(), error = %e, "Failed to persist probed metadata");
            }
            for (index, metadata) in probed {
                files[index].metadata = Some(metadata);
            }
        }

        files.iter().filter(|f| f.metadata.is_some()).count()
    }

    async fn probe_file(&self, file: &MediaFile) -> Result<Metadata> {
        let probe = self.probe.as_ref().ok_or(MetadataError::ProbeUnavailable)?;
        let locator = file.info.locator.as_str();

        let values = match file.media_type {
            MediaType::Image => {
                let image = probe
                    .probe_image(locator)
                    .await
                    .map_err(|e| probe_failed(locator, e))?;
                MetadataValues {
                    width: image.width,
                    height: image.height,
                    duration_ms: 0,
                    rotation_degrees: image.rotation_degrees(),
                }
            }
            MediaType::Video => {
                let video = probe
                    .probe_video(locator)
                    .await
                    .map_err(|e| probe_failed(locator, e))?;
                MetadataValues {
                    width: video.width,
                    height: video.height,
                    duration_ms: video.duration_ms,
                    rotation_degrees: video.rotation_degrees,
                }
            }
        };

        debug!(
            doc_id = %file.info.doc_id,
            width = values.width,
            height = values.height,
            "Probed media metadata"
        );
        Ok(Metadata::new(
            file.info.doc_id.clone(),
            file.info.last_modified,
            values,
        ))
    }
}

fn probe_failed(locator: &str, error: bridge_traits::error::BridgeError) -> MetadataError {
    MetadataError::ProbeFailed {
        locator: locator.to_string(),
        message: error.to_string(),
    }
}
