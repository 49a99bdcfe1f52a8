//! Batch ingestion of listed files

use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{Instrument, Span};

use super::{parse_file, DocumentAction, IngestReport, Strategy};
use crate::enrichment::{ContentUnderstandingDescriber, PollPolicy};
use crate::error::{Error, Result};
use crate::ingestion::{FileProcessors, MetadataExtractor};
use crate::providers::{
    AzureCredential, BlobManager, ImageEmbeddings, ListFileStrategy, LlmProvider, SearchManager,
};
use crate::types::File;

/// Analyzer settings checked during setup
struct ContentUnderstandingSetup {
    endpoint: Option<String>,
    credential: AzureCredential,
    poll_policy: PollPolicy,
}

/// Ingests every file from a lister into blob storage and the search index
pub struct FileStrategy {
    list_file_strategy: Arc<dyn ListFileStrategy>,
    blob_manager: Arc<dyn BlobManager>,
    search_manager: Arc<dyn SearchManager>,
    file_processors: Arc<FileProcessors>,
    document_action: DocumentAction,
    image_embeddings: Option<Arc<dyn ImageEmbeddings>>,
    llm: Option<Arc<dyn LlmProvider>>,
    metadata: MetadataExtractor,
    category: Option<String>,
    content_understanding: Option<ContentUnderstandingSetup>,
    fail_fast: bool,
    span: Span,
}

impl FileStrategy {
    pub fn new(
        list_file_strategy: Arc<dyn ListFileStrategy>,
        blob_manager: Arc<dyn BlobManager>,
        search_manager: Arc<dyn SearchManager>,
        file_processors: Arc<FileProcessors>,
        document_action: DocumentAction,
    ) -> Self {
        Self {
            list_file_strategy,
            blob_manager,
            search_manager,
            file_processors,
            document_action,
            image_embeddings: None,
            llm: None,
            metadata: MetadataExtractor::default(),
            category: None,
            content_understanding: None,
            fail_fast: false,
            span: Span::none(),
        }
    }

    pub fn with_image_embeddings(mut self, image_embeddings: Arc<dyn ImageEmbeddings>) -> Self {
        self.image_embeddings = Some(image_embeddings);
        self
    }

    /// Enable metadata extraction with `llm`
    pub fn with_metadata(mut self, llm: Arc<dyn LlmProvider>, metadata: MetadataExtractor) -> Self {
        self.llm = Some(llm);
        self.metadata = metadata;
        self
    }

    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }

    /// Create the media analyzer during setup
    pub fn with_content_understanding(
        mut self,
        endpoint: Option<String>,
        credential: AzureCredential,
        poll_policy: PollPolicy,
    ) -> Self {
        self.content_understanding = Some(ContentUnderstandingSetup {
            endpoint,
            credential,
            poll_policy,
        });
        self
    }

    /// Stop at the first per-file error instead of recording it
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Emit log events inside `span`
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn document_action(&self) -> DocumentAction {
        self.document_action
    }

    async fn setup_content_understanding(&self, setup: &ContentUnderstandingSetup) -> Result<()> {
        let endpoint = setup.endpoint.as_deref().filter(|e| !e.trim().is_empty()).ok_or_else(|| {
            Error::config("Content Understanding is enabled but no endpoint was provided")
        })?;
        let credential = setup.credential.token_credential().ok_or_else(|| {
            Error::config("Content Understanding requires a token credential, not a key")
        })?;

        ContentUnderstandingDescriber::new(endpoint, credential)?
            .with_poll_policy(setup.poll_policy)
            .with_span(self.span.clone())
            .create_analyzer()
            .await
    }

    /// Parse, store and index one file; `Ok(false)` when nothing was indexed
    async fn ingest_file(&self, file: &mut File) -> Result<bool> {
        let enrichment = self
            .llm
            .as_deref()
            .map(|llm| (&self.metadata, llm));
        let sections = parse_file(
            file,
            &self.file_processors,
            self.category.as_deref(),
            self.image_embeddings.is_some(),
            enrichment,
        )
        .await?;

        if sections.is_empty() {
            return Ok(false);
        }

        let blob_uris = self.blob_manager.upload_blob(file).await?;
        let image_embeddings = match &self.image_embeddings {
            Some(embedder) if !blob_uris.is_empty() => {
                Some(embedder.create_embeddings(&blob_uris).await?)
            }
            _ => None,
        };

        self.search_manager
            .update_content(&sections, image_embeddings.as_deref(), file.url())
            .await?;
        tracing::info!("Indexed {} sections from '{}'", sections.len(), file.filename());
        Ok(true)
    }

    async fn run_add(&self) -> Result<IngestReport> {
        let mut report = IngestReport::default();
        let mut files = self.list_file_strategy.list();

        while let Some(listed) = files.next().await {
            let (filename, result) = match listed {
                Ok(mut file) => {
                    let result = self.ingest_file(&mut file).await;
                    file.close();
                    (file.filename(), result)
                }
                Err(e) => ("<listing>".to_string(), Err(e)),
            };

            match result {
                Ok(true) => report.processed += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    tracing::error!("Failed to ingest '{}': {}", filename, e);
                    if self.fail_fast {
                        return Err(e);
                    }
                    report.failed.push((filename, e.to_string()));
                }
            }
        }

        Ok(report)
    }

    async fn run_remove(&self) -> Result<IngestReport> {
        let mut report = IngestReport::default();
        let mut paths = self.list_file_strategy.list_paths();

        while let Some(path) = paths.next().await {
            let path = path?;
            self.blob_manager.remove_blob(Some(&path)).await?;
            self.search_manager.remove_content(Some(&path), None).await?;
            report.processed += 1;
        }

        Ok(report)
    }

    async fn run_remove_all(&self) -> Result<IngestReport> {
        self.blob_manager.remove_blob(None).await?;
        self.search_manager.remove_content(None, None).await?;
        Ok(IngestReport::default())
    }
}

#[async_trait]
impl Strategy for FileStrategy {
    async fn setup(&self) -> Result<()> {
        async {
            self.search_manager.create_index().await?;
            if let Some(llm) = &self.llm {
                if !llm.health_check().await.unwrap_or(false) {
                    tracing::warn!(
                        "Language model '{}' ({}) is not available, metadata extraction will yield nothing",
                        llm.model(),
                        llm.name()
                    );
                }
            }
            if let Some(setup) = &self.content_understanding {
                self.setup_content_understanding(setup).await?;
            }
            Ok(())
        }
        .instrument(self.span.clone())
        .await
    }

    async fn run(&self) -> Result<IngestReport> {
        async {
            match self.document_action {
                DocumentAction::Add => self.run_add().await,
                DocumentAction::Remove => self.run_remove().await,
                DocumentAction::RemoveAll => self.run_remove_all().await,
            }
        }
        .instrument(self.span.clone())
        .await
    }
}
