//! Media metadata probing.
//!
//! Probing is the slow path of metadata extraction: it opens the document and
//! reads embedded EXIF data (images) or container metadata (videos).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// EXIF orientation value meaning "no transform".
pub const ORIENTATION_NORMAL: u16 = 1;

/// Dimensions and EXIF orientation of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageProbe {
    pub width: i32,
    pub height: i32,
    /// Raw EXIF orientation tag (1..=8)
    pub orientation: u16,
}

impl ImageProbe {
    /// Rotation in degrees implied by the EXIF orientation tag.
    pub fn rotation_degrees(&self) -> i32 {
        match self.orientation {
            3 | 4 => 180,
            5 | 6 => 90,
            7 | 8 => 270,
            _ => 0,
        }
    }
}

/// Dimensions and duration of a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoProbe {
    pub width: i32,
    pub height: i32,
    pub duration_ms: i64,
    pub rotation_degrees: i32,
}

/// Metadata probing capability keyed by document locator.
#[async_trait]
pub trait MetadataProbe: Send + Sync {
    async fn probe_image(&self, locator: &str) -> Result<ImageProbe>;

    async fn probe_video(&self, locator: &str) -> Result<VideoProbe>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exif_orientation_to_degrees() {
        let probe = |orientation| ImageProbe {
            width: 1,
            height: 1,
            orientation,
        };

        assert_eq!(probe(ORIENTATION_NORMAL).rotation_degrees(), 0);
        assert_eq!(probe(3).rotation_degrees(), 180);
        assert_eq!(probe(6).rotation_degrees(), 90);
        assert_eq!(probe(8).rotation_degrees(), 270);
        assert_eq!(probe(0).rotation_degrees(), 0);
    }
}
