//! Orchestration of the ingestion pipeline
//!
//! A strategy wires the collaborators together: list files, parse them
//! through the extension table, split into sections, store the originals and
//! reconcile the search index.

mod file_strategy;
mod upload_user_file;

pub use file_strategy::FileStrategy;
pub use upload_user_file::UploadUserFileStrategy;

use async_trait::async_trait;
use futures::TryStreamExt;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::ingestion::{FileProcessors, MetadataExtractor};
use crate::providers::LlmProvider;
use crate::types::{File, Section};

/// What a batch run does with the listed files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DocumentAction {
    /// Parse, store and index every listed file
    #[default]
    Add,
    /// Remove the blob and index entries of every listed path
    Remove,
    /// Remove every blob and every index entry
    RemoveAll,
}

/// A runnable ingestion job
#[async_trait]
pub trait Strategy: Send + Sync {
    /// One-time preparation; errors here are fatal
    async fn setup(&self) -> Result<()>;

    /// Execute the configured action
    async fn run(&self) -> Result<IngestReport>;
}

/// Outcome of a batch run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    /// Files indexed (or paths removed)
    pub processed: usize,
    /// Files that produced no sections
    pub skipped: usize,
    /// Files that failed, with the error message
    pub failed: Vec<(String, String)>,
}

impl IngestReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Parse and split one file into sections
///
/// Files without a registered processor yield no sections. When `enrichment`
/// is given and the extension triggers it, metadata extracted from the first
/// page is copied onto every section.
pub async fn parse_file(
    file: &mut File,
    file_processors: &FileProcessors,
    category: Option<&str>,
    image_embeddings_enabled: bool,
    enrichment: Option<(&MetadataExtractor, &dyn LlmProvider)>,
) -> Result<Vec<Section>> {
    let key = file.file_extension().to_lowercase();
    let Some(processor) = file_processors.get(&key) else {
        tracing::info!("Skipping '{}', no parser found.", file.filename());
        return Ok(Vec::new());
    };

    let filename = file.filename();
    tracing::info!("Ingesting '{}'", filename);
    let pages: Vec<_> = processor
        .parser()
        .parse(file.content_mut()?)
        .try_collect()
        .await
        .map_err(|e| match e {
            Error::Io(io) => Error::file_parse(&filename, io.to_string()),
            other => other,
        })?;

    let metadata = match enrichment {
        Some((extractor, llm)) if extractor.applies_to(&key) => match pages.first() {
            Some(first) if !first.text.trim().is_empty() => extractor.extract(&first.text, llm).await,
            _ => None,
        },
        _ => None,
    };

    tracing::info!("Splitting '{}' into sections", filename);
    if image_embeddings_enabled {
        tracing::warn!(
            "Each page will be split into smaller chunks of text, but images will be of the entire page."
        );
    }

    let file_ref = file.file_ref();
    let sections = processor
        .splitter()
        .split_pages(&pages)
        .into_iter()
        .map(|split_page| {
            let mut section =
                Section::new(split_page, file_ref.clone(), category.map(str::to_string));
            if let Some(metadata) = &metadata {
                section.apply_metadata(metadata);
            }
            section
        })
        .collect();

    Ok(sections)
}
