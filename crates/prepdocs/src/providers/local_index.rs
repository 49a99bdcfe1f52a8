//! Search index persisted as a JSON file

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::embedding::EmbeddingProvider;
use super::search::{
    documents_for_sections, embed_documents, matches_removal, SearchDocument, SearchManager,
    MAX_BATCH_SIZE,
};
use crate::error::{Error, Result};
use crate::types::Section;

/// JSON-file backed search index
///
/// Documents are keyed by id, so re-ingesting a file replaces its documents.
pub struct LocalSearchIndex {
    path: PathBuf,
    use_acls: bool,
    embeddings: Option<Arc<dyn EmbeddingProvider>>,
    documents: Mutex<Option<BTreeMap<String, SearchDocument>>>,
}

impl LocalSearchIndex {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            use_acls: false,
            embeddings: None,
            documents: Mutex::new(None),
        }
    }

    pub fn with_acls(mut self, use_acls: bool) -> Self {
        self.use_acls = use_acls;
        self
    }

    pub fn with_embeddings(mut self, embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        self.embeddings = Some(embeddings);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the indexed documents, ordered by id
    pub async fn documents(&self) -> Result<Vec<SearchDocument>> {
        self.ensure_loaded().await?;
        Ok(self
            .documents
            .lock()
            .as_ref()
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn ensure_loaded(&self) -> Result<()> {
        if self.documents.lock().is_some() {
            return Ok(());
        }

        let loaded = match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => {
                let docs: Vec<SearchDocument> = serde_json::from_slice(&bytes).map_err(|e| {
                    Error::search(format!("corrupt index file {}: {}", self.path.display(), e))
                })?;
                docs.into_iter().map(|doc| (doc.id.clone(), doc)).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        let mut documents = self.documents.lock();
        if documents.is_none() {
            *documents = Some(loaded);
        }
        Ok(())
    }

    async fn persist(&self) -> Result<()> {
        let bytes = {
            let documents = self.documents.lock();
            let docs: Vec<&SearchDocument> = documents.iter().flat_map(|docs| docs.values()).collect();
            serde_json::to_vec_pretty(&docs)?
        };

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl SearchManager for LocalSearchIndex {
    async fn create_index(&self) -> Result<()> {
        self.ensure_loaded().await?;
        if !tokio::fs::try_exists(&self.path).await? {
            tracing::info!("Creating search index {}", self.path.display());
            self.persist().await?;
        } else {
            tracing::info!("Search index {} already exists", self.path.display());
        }
        Ok(())
    }

    async fn update_content(
        &self,
        sections: &[Section],
        image_embeddings: Option<&[Vec<f32>]>,
        url: Option<&str>,
    ) -> Result<()> {
        self.ensure_loaded().await?;

        for (batch_index, batch) in sections.chunks(MAX_BATCH_SIZE).enumerate() {
            let mut documents = documents_for_sections(
                batch,
                batch_index * MAX_BATCH_SIZE,
                image_embeddings,
                url,
                self.use_acls,
            );
            if let Some(embeddings) = &self.embeddings {
                embed_documents(&mut documents, embeddings.as_ref()).await?;
            }

            let mut index = self.documents.lock();
            let index = index.get_or_insert_with(BTreeMap::new);
            for doc in documents {
                index.insert(doc.id.clone(), doc);
            }
        }

        tracing::debug!("Indexed {} sections into {}", sections.len(), self.path.display());
        self.persist().await
    }

    async fn remove_content(&self, path: Option<&str>, only_oid: Option<&str>) -> Result<()> {
        self.ensure_loaded().await?;

        let removed = {
            let mut index = self.documents.lock();
            let index = index.get_or_insert_with(BTreeMap::new);
            let before = index.len();
            index.retain(|_, doc| !matches_removal(doc, path, only_oid));
            before - index.len()
        };

        tracing::info!(
            "Removed {} documents for {} from the search index",
            removed,
            path.unwrap_or("all files")
        );
        self.persist().await
    }

    fn name(&self) -> &str {
        "local-json"
    }
}
