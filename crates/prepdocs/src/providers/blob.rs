//! Blob storage for source files

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::file::{basename, extension_of};
use crate::types::File;

/// Trait for blob storage of ingested files
///
/// Implementations:
/// - `LocalBlobManager`: Local directory
/// - `GcsBlobManager`: Google Cloud Storage (feature `gcp`)
#[async_trait]
pub trait BlobManager: Send + Sync {
    /// Store the file, returning URLs of the stored blobs
    async fn upload_blob(&self, file: &File) -> Result<Vec<String>>;

    /// Remove the blob for `path`, or every blob when `None`
    async fn remove_blob(&self, path: Option<&str>) -> Result<()>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// Citation label for a page of a file: `name.pdf#page=N` (1-based) for PDFs,
/// the bare file name otherwise
pub fn sourcepage_from_file_page(filename: &str, page: usize) -> String {
    let name = basename(filename);
    if extension_of(filename) == ".pdf" {
        format!("{}#page={}", name, page + 1)
    } else {
        name
    }
}

/// Blob storage in a local directory
pub struct LocalBlobManager {
    /// Directory blobs are copied into
    storage_dir: PathBuf,
}

impl LocalBlobManager {
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
        }
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    fn blob_path(&self, path: &str) -> PathBuf {
        self.storage_dir.join(basename(path))
    }
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::storage(format!("failed to remove {}: {}", path.display(), e))),
    }
}

#[async_trait]
impl BlobManager for LocalBlobManager {
    async fn upload_blob(&self, file: &File) -> Result<Vec<String>> {
        let source = file.source_path().ok_or_else(|| {
            Error::storage(format!("'{}' has no source path to copy from", file.filename()))
        })?;

        tokio::fs::create_dir_all(&self.storage_dir).await?;
        let destination = self.blob_path(file.path());
        tokio::fs::copy(source, &destination).await.map_err(|e| {
            Error::storage(format!("failed to copy {} to {}: {}", source.display(), destination.display(), e))
        })?;

        tracing::info!("Uploaded '{}' to {}", file.filename(), destination.display());
        Ok(vec![format!("file://{}", destination.display())])
    }

    async fn remove_blob(&self, path: Option<&str>) -> Result<()> {
        match path {
            Some(path) => {
                tracing::info!("Removing blob '{}'", basename(path));
                remove_if_exists(&self.blob_path(path)).await
            }
            None => {
                tracing::info!("Removing all blobs from {}", self.storage_dir.display());
                let mut entries = match tokio::fs::read_dir(&self.storage_dir).await {
                    Ok(entries) => entries,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
                    Err(e) => return Err(e.into()),
                };
                while let Some(entry) = entries.next_entry().await? {
                    if entry.file_type().await?.is_file() {
                        remove_if_exists(&entry.path()).await?;
                    }
                }
                Ok(())
            }
        }
    }

    fn name(&self) -> &str {
        "local"
    }
}
