//! Document listing over the local file system using Tokio

use async_trait::async_trait;
use bridge_traits::{
    documents::{DocumentEntry, DocumentProvider, DIRECTORY_MIME_TYPE},
    error::{BridgeError, Result},
};
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;
use tokio::fs;
use tracing::debug;

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Mime type guessed from the file extension.
pub fn mime_type_for(path: &Path) -> &'static str {
    let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
        return FALLBACK_MIME_TYPE;
    };
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "tif" | "tiff" => "image/tiff",
        "mp4" | "m4v" => "video/mp4",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "3gp" => "video/3gpp",
        "txt" => "text/plain",
        _ => FALLBACK_MIME_TYPE,
    }
}

/// Tokio-based document provider.
///
/// Roots are directory paths. Document ids are the absolute paths of entries
/// below a root, so they stay distinct across roots that share a layout. The
/// empty id names the root itself. Hidden entries are skipped and symlinked
/// directories are not followed.
#[derive(Debug, Clone, Default)]
pub struct FilesystemDocumentProvider;

impl FilesystemDocumentProvider {
    pub fn new() -> Self {
        Self
    }

    /// Resolve `doc_id` to a path, rejecting ids outside `root`.
    fn resolve(root: &str, doc_id: &str) -> Result<PathBuf> {
        let root = Path::new(root);
        if doc_id.is_empty() {
            return Ok(root.to_path_buf());
        }
        let escapes = || {
            BridgeError::OperationFailed(format!("Document id escapes root: {}", doc_id))
        };
        let relative = Path::new(doc_id)
            .strip_prefix(root)
            .map_err(|_| escapes())?;

        let mut path = root.to_path_buf();
        for component in relative.components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                _ => return Err(escapes()),
            }
        }
        Ok(path)
    }

    fn map_io_error(path: &Path, e: std::io::Error) -> BridgeError {
        if e.kind() == std::io::ErrorKind::NotFound {
            BridgeError::NotFound(path.display().to_string())
        } else {
            BridgeError::Io(e)
        }
    }
}

#[async_trait]
impl DocumentProvider for FilesystemDocumentProvider {
    async fn list_children(&self, root: &str, parent_doc_id: &str) -> Result<Vec<DocumentEntry>> {
        let directory = Self::resolve(root, parent_doc_id)?;
        let mut read_dir = fs::read_dir(&directory)
            .await
            .map_err(|e| Self::map_io_error(&directory, e))?;

        let mut entries = Vec::new();
        while let Some(entry) = read_dir.next_entry().await.map_err(BridgeError::Io)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }

            let file_type = entry.file_type().await.map_err(BridgeError::Io)?;
            let metadata = match fs::metadata(entry.path()).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    debug!(path = ?entry.path(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if file_type.is_symlink() && metadata.is_dir() {
                continue;
            }

            let mime_type = if metadata.is_dir() {
                DIRECTORY_MIME_TYPE
            } else {
                mime_type_for(&entry.path())
            };
            let last_modified = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as i64)
                .unwrap_or(0);
            let size = if metadata.is_dir() {
                0
            } else {
                metadata.len() as i64
            };

            entries.push(
                DocumentEntry::new(entry.path().to_string_lossy(), name, mime_type)
                    .with_size(size)
                    .with_last_modified(last_modified),
            );
        }

        debug!(path = ?directory, count = entries.len(), "Listed directory");
        Ok(entries)
    }

    async fn resolve_display_name(&self, root: &str) -> Result<Option<String>> {
        let path = Path::new(root);
        let metadata = fs::metadata(path)
            .await
            .map_err(|e| Self::map_io_error(path, e))?;
        if !metadata.is_dir() {
            return Err(BridgeError::NotFound(root.to_string()));
        }
        Ok(path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned()))
    }

    fn document_locator(&self, root: &str, doc_id: &str) -> String {
        if doc_id.is_empty() {
            root.to_string()
        } else {
            doc_id.to_string()
        }
    }
}
