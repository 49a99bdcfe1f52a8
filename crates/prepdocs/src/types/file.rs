//! Source files with a scoped, single-consume content handle

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use crate::error::{Error, Result};

/// Readable content of a source file, consumed once by a parser
pub type ContentReader = dyn AsyncRead + Send + Sync + Unpin;

/// Access-control lists attached to a file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAcls {
    /// Owner / user object ids
    #[serde(default)]
    pub oids: Vec<String>,
    /// Group ids
    #[serde(default)]
    pub groups: Vec<String>,
}

impl FileAcls {
    /// ACL granting access to a single owner
    pub fn owner(oid: impl Into<String>) -> Self {
        Self {
            oids: vec![oid.into()],
            groups: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.oids.is_empty() && self.groups.is_empty()
    }
}

/// The parts of a file a section keeps after the content handle is released
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    /// Path as produced by the lister
    pub path: String,
    /// Externally reachable URL of the file, if any
    pub url: Option<String>,
    /// Access-control lists
    pub acls: FileAcls,
}

impl FileRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            url: None,
            acls: FileAcls::default(),
        }
    }

    /// Base name of the file
    pub fn filename(&self) -> String {
        basename(&self.path)
    }

    /// Lower-cased extension with a leading dot, or an empty string
    pub fn file_extension(&self) -> String {
        extension_of(&self.path)
    }
}

/// A file handed to the pipeline by a lister
///
/// The content handle is released exactly once: either by an explicit
/// [`File::close`] or when the file is dropped.
pub struct File {
    path: String,
    content: Option<Box<ContentReader>>,
    url: Option<String>,
    acls: FileAcls,
    source_path: Option<PathBuf>,
}

impl File {
    /// Create a file from a listed path and its content reader
    pub fn new(path: impl Into<String>, content: Box<ContentReader>) -> Self {
        Self {
            path: path.into(),
            content: Some(content),
            url: None,
            acls: FileAcls::default(),
            source_path: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_acls(mut self, acls: FileAcls) -> Self {
        self.acls = acls;
        self
    }

    /// Location the blob store can re-read the file from after parsing
    pub fn with_source_path(mut self, source_path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(source_path.into());
        self
    }

    /// Path as produced by the lister
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Base name of the file
    pub fn filename(&self) -> String {
        basename(&self.path)
    }

    /// Extension with a leading dot as it appears in the name (not lower-cased)
    pub fn file_extension(&self) -> String {
        Path::new(&self.path)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn acls(&self) -> &FileAcls {
        &self.acls
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Borrow the content reader; fails once the file has been closed
    pub fn content_mut(&mut self) -> Result<&mut ContentReader> {
        match self.content.as_deref_mut() {
            Some(content) => Ok(content),
            None => Err(Error::internal(format!(
                "content of '{}' has already been released",
                self.path
            ))),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.content.is_none()
    }

    /// Release the content handle. Calling it again is a no-op.
    pub fn close(&mut self) {
        if let Some(content) = self.content.take() {
            drop(content);
            tracing::debug!("Closed '{}'", self.path);
        }
    }

    /// Non-owning reference kept by sections
    pub fn file_ref(&self) -> FileRef {
        FileRef {
            path: self.path.clone(),
            url: self.url.clone(),
            acls: self.acls.clone(),
        }
    }
}

impl Drop for File {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("File")
            .field("path", &self.path)
            .field("url", &self.url)
            .field("acls", &self.acls)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Base name of a path, falling back to the path itself
pub fn basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

/// Lower-cased extension with a leading dot, or an empty string
pub fn extension_of(path: &str) -> String {
    Path::new(path)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn test_names_and_extensions() {
        let file = File::new("data/Reports/Q1.PDF", Box::new(&b""[..]));
        assert_eq!(file.filename(), "Q1.PDF");
        assert_eq!(file.file_extension(), ".PDF");
        assert_eq!(file.file_ref().file_extension(), ".pdf");

        let file = File::new("README", Box::new(&b""[..]));
        assert_eq!(file.file_extension(), "");
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut file = File::new("a.txt", Box::new(&b"hello"[..]));
        let mut text = String::new();
        file.content_mut().unwrap().read_to_string(&mut text).await.unwrap();
        assert_eq!(text, "hello");

        file.close();
        assert!(file.is_closed());
        file.close();
        assert!(file.content_mut().is_err());
    }

    #[test]
    fn test_file_is_shareable_across_tasks() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<File>();
        assert_send_sync::<&File>();
    }
}
