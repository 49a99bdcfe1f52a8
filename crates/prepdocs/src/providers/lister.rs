//! File listers feeding the pipeline

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::error::{Error, Result};
use crate::types::File;

/// Source of files (for ingestion) and paths (for removal)
pub trait ListFileStrategy: Send + Sync {
    /// Files with open content handles, in listing order
    fn list(&self) -> BoxStream<'_, Result<File>>;

    /// Paths only, without opening anything
    fn list_paths(&self) -> BoxStream<'_, Result<String>>;
}

/// Lists a local file or every file under a local directory
///
/// Hidden entries and `.md5` sidecar files are skipped; files are listed in
/// file name order.
pub struct LocalListFileStrategy {
    root: PathBuf,
}

impl LocalListFileStrategy {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

fn walk(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Err(Error::config(format!("path does not exist: {}", root.display())));
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry))
    {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().is_some_and(|ext| ext == "md5") {
            continue;
        }
        paths.push(entry.into_path());
    }
    Ok(paths)
}

impl LocalListFileStrategy {
    fn walk_stream(&self) -> BoxStream<'_, Result<PathBuf>> {
        let root = self.root.clone();
        stream::once(async move {
            tokio::task::spawn_blocking(move || walk(&root))
                .await
                .map_err(|e| Error::internal(format!("Task join error: {}", e)))?
        })
        .map_ok(|paths| stream::iter(paths.into_iter().map(Ok)))
        .try_flatten()
        .boxed()
    }
}

impl ListFileStrategy for LocalListFileStrategy {
    fn list(&self) -> BoxStream<'_, Result<File>> {
        self.walk_stream()
            .and_then(|path| async move {
                let content = tokio::fs::File::open(&path).await?;
                let name = path.to_string_lossy().to_string();
                Ok(File::new(name, Box::new(content)).with_source_path(path))
            })
            .boxed()
    }

    fn list_paths(&self) -> BoxStream<'_, Result<String>> {
        self.walk_stream()
            .map_ok(|path| path.to_string_lossy().to_string())
            .boxed()
    }
}
