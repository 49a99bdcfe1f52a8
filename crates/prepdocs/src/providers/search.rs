//! Search index contract and the shared document shape

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::blob::sourcepage_from_file_page;
use super::embedding::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::types::file::basename;
use crate::types::Section;

/// Maximum number of documents sent to the index in one request
pub const MAX_BATCH_SIZE: usize = 1000;

/// Trait for the search index the pipeline reconciles with
///
/// Implementations:
/// - `LocalSearchIndex`: JSON file on local disk
/// - `AzureSearchManager`: Azure AI Search REST API
#[async_trait]
pub trait SearchManager: Send + Sync {
    /// Ensure the index exists
    async fn create_index(&self) -> Result<()>;

    /// Add or replace the documents for `sections`
    ///
    /// `image_embeddings` are indexed by page number; `url` is the storage URL
    /// recorded on every document.
    async fn update_content(
        &self,
        sections: &[Section],
        image_embeddings: Option<&[Vec<f32>]>,
        url: Option<&str>,
    ) -> Result<()>;

    /// Remove documents of the file at `path` (all documents when `None`),
    /// restricted to those owned solely by `only_oid` when given
    async fn remove_content(&self, path: Option<&str>, only_oid: Option<&str>) -> Result<()>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// One indexed document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
    pub sourcepage: String,
    pub sourcefile: String,
    #[serde(rename = "storageUrl", default)]
    pub storage_url: Option<String>,
    #[serde(default)]
    pub planid: Option<String>,
    #[serde(default)]
    pub doctype: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(rename = "imageEmbedding", default, skip_serializing_if = "Option::is_none")]
    pub image_embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub oids: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
}

/// Stable document id prefix for a file name
///
/// `file-{name with non [0-9A-Za-z_-] replaced by _}-{upper-case hex of the name}`
pub fn filename_to_id(filename: &str) -> String {
    let name = basename(filename);
    let ascii: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    format!("file-{}-{}", ascii, hex::encode_upper(name.as_bytes()))
}

/// Build documents for one batch of sections
///
/// `start` is the position of the batch's first section in the file, used to
/// number document ids.
pub fn documents_for_sections(
    sections: &[Section],
    start: usize,
    image_embeddings: Option<&[Vec<f32>]>,
    url: Option<&str>,
    use_acls: bool,
) -> Vec<SearchDocument> {
    sections
        .iter()
        .enumerate()
        .map(|(i, section)| {
            let (oids, groups) = if use_acls {
                (section.content.acls.oids.clone(), section.content.acls.groups.clone())
            } else {
                (Vec::new(), Vec::new())
            };

            SearchDocument {
                id: format!("{}-page-{}", filename_to_id(&section.content.path), start + i),
                content: section.split_page.text.clone(),
                category: section.category.clone(),
                sourcepage: sourcepage_from_file_page(&section.content.path, section.split_page.page_num),
                sourcefile: section.content.filename(),
                storage_url: url.map(str::to_string).or_else(|| section.content.url.clone()),
                planid: section.planid.clone(),
                doctype: section.doctype.clone(),
                locale: section.locale.clone(),
                embedding: section.embedding.clone(),
                image_embedding: image_embeddings
                    .and_then(|embeddings| embeddings.get(section.split_page.page_num))
                    .cloned(),
                oids,
                groups,
            }
        })
        .collect()
}

/// Fill in text embeddings for documents that do not carry one yet
pub async fn embed_documents(
    documents: &mut [SearchDocument],
    embeddings: &dyn EmbeddingProvider,
) -> Result<()> {
    let pending: Vec<usize> = documents
        .iter()
        .enumerate()
        .filter(|(_, doc)| doc.embedding.is_none())
        .map(|(i, _)| i)
        .collect();
    if pending.is_empty() {
        return Ok(());
    }

    let texts: Vec<String> = pending.iter().map(|&i| documents[i].content.clone()).collect();
    let vectors = embeddings.embed_batch(&texts).await?;
    if vectors.len() != texts.len() {
        return Err(Error::embedding(format!(
            "{} returned {} embeddings for {} texts",
            embeddings.name(),
            vectors.len(),
            texts.len()
        )));
    }

    for (i, vector) in pending.into_iter().zip(vectors) {
        documents[i].embedding = Some(vector);
    }
    Ok(())
}

/// Whether a document should be removed for `(path, only_oid)`
pub fn matches_removal(document: &SearchDocument, path: Option<&str>, only_oid: Option<&str>) -> bool {
    let file_matches = path.map_or(true, |path| document.sourcefile == basename(path));
    let owner_matches =
        only_oid.map_or(true, |oid| document.oids.len() == 1 && document.oids[0] == oid);
    file_matches && owner_matches
}
