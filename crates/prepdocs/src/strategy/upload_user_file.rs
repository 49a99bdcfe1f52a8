//! Ingestion of a single file that a user has already stored

use std::sync::Arc;
use tracing::{Instrument, Span};

use super::parse_file;
use crate::error::Result;
use crate::ingestion::FileProcessors;
use crate::providers::{ImageEmbeddings, SearchManager};
use crate::types::File;

/// Indexes one user-owned file at a time
///
/// Sections carry the file's ACLs so the index can restrict them to their
/// owner. There is no blob upload and no metadata extraction on this path.
pub struct UploadUserFileStrategy {
    search_manager: Arc<dyn SearchManager>,
    file_processors: Arc<FileProcessors>,
    image_embeddings: Option<Arc<dyn ImageEmbeddings>>,
    span: Span,
}

impl UploadUserFileStrategy {
    pub fn new(search_manager: Arc<dyn SearchManager>, file_processors: Arc<FileProcessors>) -> Self {
        Self {
            search_manager,
            file_processors,
            image_embeddings: None,
            span: Span::none(),
        }
    }

    /// Image embeddings are not supported here; configuring them only logs a warning
    pub fn with_image_embeddings(mut self, image_embeddings: Arc<dyn ImageEmbeddings>) -> Self {
        self.image_embeddings = Some(image_embeddings);
        self
    }

    /// Emit log events inside `span`
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Parse, split and index `file`, releasing its content handle
    pub async fn add_file(&self, mut file: File) -> Result<()> {
        async {
            if self.image_embeddings.is_some() {
                tracing::warn!("Image embeddings are not currently supported for the user upload feature");
            }

            let result = parse_file(&mut file, &self.file_processors, None, false, None).await;
            file.close();

            let sections = result?;
            if !sections.is_empty() {
                self.search_manager
                    .update_content(&sections, None, file.url())
                    .await?;
            }
            Ok(())
        }
        .instrument(self.span.clone())
        .await
    }

    /// Remove the index entries of `filename` owned solely by `oid`
    pub async fn remove_file(&self, filename: &str, oid: &str) -> Result<()> {
        async {
            if filename.is_empty() {
                tracing::warn!("Filename is required to remove a file");
                return Ok(());
            }
            self.search_manager.remove_content(Some(filename), Some(oid)).await
        }
        .instrument(self.span.clone())
        .await
    }
}
