//! Image probing with the `image` crate

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    probe::{ImageProbe, MetadataProbe, VideoProbe},
};
use image::{ImageDecoder, ImageReader};
use std::path::PathBuf;
use tracing::debug;

/// Reads image dimensions and EXIF orientation from local files.
///
/// Locators are file paths, as produced by
/// [`FilesystemDocumentProvider`](crate::FilesystemDocumentProvider).
/// Video containers are not supported.
#[derive(Debug, Clone, Default)]
pub struct ImageMetadataProbe;

impl ImageMetadataProbe {
    pub fn new() -> Self {
        Self
    }

    fn read(path: PathBuf) -> Result<ImageProbe> {
        let failed = |e: image::ImageError| BridgeError::OperationFailed(e.to_string());

        let reader = ImageReader::open(&path)?
            .with_guessed_format()?;
        let mut decoder = reader.into_decoder().map_err(failed)?;
        let (width, height) = decoder.dimensions();
        let orientation = decoder
            .orientation()
            .map(|o| u16::from(o.to_exif()))
            .unwrap_or(bridge_traits::probe::ORIENTATION_NORMAL);

        Ok(ImageProbe {
            width: width as i32,
            height: height as i32,
            orientation,
        })
    }
}

#[async_trait]
impl MetadataProbe for ImageMetadataProbe {
    async fn probe_image(&self, locator: &str) -> Result<ImageProbe> {
        let path = PathBuf::from(locator);
        let probe = tokio::task::spawn_blocking(move || Self::read(path))
            .await
            .map_err(|e| BridgeError::OperationFailed(e.to_string()))??;
        debug!(locator, width = probe.width, height = probe.height, "Probed image");
        Ok(probe)
    }

    async fn probe_video(&self, locator: &str) -> Result<VideoProbe> {
        Err(BridgeError::NotAvailable(format!(
            "video probing is not supported on desktop: {}",
            locator
        )))
    }
}
