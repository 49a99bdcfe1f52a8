//! Wiring of concrete collaborators from configuration

use std::path::Path;
use std::sync::Arc;
use tracing::Span;

use crate::config::{
    CredentialMode, ModelProvider, PrepdocsConfig, SearchBackend, StorageBackend,
};
use crate::enrichment::PollPolicy;
use crate::error::{Error, Result};
use crate::ingestion::{default_file_processors, MetadataExtractor};
use crate::providers::{
    AzureCliCredential, AzureCredential, AzureSearchManager, BlobManager, EmbeddingProvider,
    ImageEmbeddings, LlmProvider, LocalBlobManager, LocalListFileStrategy, LocalSearchIndex,
    OllamaClient, OpenAiClient, SearchManager, StaticTokenCredential, VisionImageEmbeddings,
};
use crate::strategy::{DocumentAction, FileStrategy, UploadUserFileStrategy};

/// Credential used for Azure services other than a keyed search index
pub fn build_credential(config: &PrepdocsConfig) -> Result<AzureCredential> {
    match config.credential.mode {
        CredentialMode::Key => config
            .credential
            .key
            .clone()
            .or_else(|| config.search.api_key.clone())
            .map(AzureCredential::Key)
            .ok_or_else(|| Error::config("credential mode 'key' requires credential.key")),
        CredentialMode::Token => config
            .credential
            .token
            .clone()
            .map(|token| AzureCredential::Token(Arc::new(StaticTokenCredential::new(token))))
            .ok_or_else(|| Error::config("credential mode 'token' requires credential.token")),
        CredentialMode::AzureCli => Ok(AzureCredential::Token(Arc::new(AzureCliCredential::new()))),
    }
}

fn build_embeddings(config: &PrepdocsConfig) -> Result<Option<Arc<dyn EmbeddingProvider>>> {
    let embeddings = &config.embeddings;
    let provider: Option<Arc<dyn EmbeddingProvider>> = match embeddings.provider {
        ModelProvider::None => None,
        ModelProvider::OpenAi => Some(Arc::new(OpenAiClient::new(
            &config.openai,
            &config.llm.model,
            &embeddings.model,
            embeddings.dimensions,
        )?)),
        ModelProvider::Ollama => Some(Arc::new(OllamaClient::new(
            &config.ollama,
            &config.llm.model,
            &embeddings.model,
            embeddings.dimensions,
        )?)),
    };
    Ok(provider)
}

fn build_llm(config: &PrepdocsConfig) -> Result<Option<Arc<dyn LlmProvider>>> {
    if !config.metadata.enabled {
        return Ok(None);
    }
    let provider: Option<Arc<dyn LlmProvider>> = match config.llm.provider {
        ModelProvider::None => None,
        ModelProvider::OpenAi => Some(Arc::new(OpenAiClient::new(
            &config.openai,
            &config.llm.model,
            &config.embeddings.model,
            config.embeddings.dimensions,
        )?)),
        ModelProvider::Ollama => Some(Arc::new(OllamaClient::new(
            &config.ollama,
            &config.llm.model,
            &config.embeddings.model,
            config.embeddings.dimensions,
        )?)),
    };
    Ok(provider)
}

fn build_image_embeddings(
    config: &PrepdocsConfig,
    credential: &AzureCredential,
) -> Result<Option<Arc<dyn ImageEmbeddings>>> {
    let settings = &config.image_embeddings;
    if !settings.enabled {
        return Ok(None);
    }
    let endpoint = settings
        .endpoint
        .as_deref()
        .ok_or_else(|| Error::config("image embeddings are enabled but no endpoint was provided"))?;
    let token = credential
        .token_credential()
        .ok_or_else(|| Error::config("image embeddings require a token credential, not a key"))?;

    Ok(Some(Arc::new(VisionImageEmbeddings::new(endpoint, settings, token)?)))
}

fn build_search_manager(
    config: &PrepdocsConfig,
    credential: &AzureCredential,
    use_acls: bool,
    search_images: bool,
) -> Result<Arc<dyn SearchManager>> {
    let embeddings = build_embeddings(config)?;

    let manager: Arc<dyn SearchManager> = match config.search.backend {
        SearchBackend::Local => {
            let mut index = LocalSearchIndex::new(&config.search.index_path).with_acls(use_acls);
            if let Some(embeddings) = embeddings {
                index = index.with_embeddings(embeddings);
            }
            Arc::new(index)
        }
        SearchBackend::Azure => {
            let search_credential = match &config.search.api_key {
                Some(key) => AzureCredential::Key(key.clone()),
                None => credential.clone(),
            };
            let mut manager = AzureSearchManager::new(&config.search, search_credential)?
                .with_acls(use_acls)
                .with_image_field(search_images);
            if let Some(embeddings) = embeddings {
                manager = manager.with_embeddings(embeddings);
            }
            Arc::new(manager)
        }
    };
    Ok(manager)
}

async fn build_blob_manager(config: &PrepdocsConfig) -> Result<Arc<dyn BlobManager>> {
    match config.storage.backend {
        StorageBackend::Local => Ok(Arc::new(LocalBlobManager::new(&config.storage.local_dir))),
        #[cfg(feature = "gcp")]
        StorageBackend::Gcs => {
            let bucket = config
                .storage
                .gcs_bucket
                .clone()
                .ok_or_else(|| Error::config("storage backend 'gcs' requires storage.gcs_bucket"))?;
            let manager = crate::providers::gcp::GcsBlobManager::new(
                bucket,
                Some(config.storage.gcs_prefix.clone()),
            )
            .await?;
            Ok(Arc::new(manager))
        }
        #[cfg(not(feature = "gcp"))]
        StorageBackend::Gcs => Err(Error::config(
            "storage backend 'gcs' requires building with the 'gcp' feature",
        )),
    }
}

/// Build the batch strategy for `source` (a file or directory)
pub async fn build_file_strategy(
    config: &PrepdocsConfig,
    action: DocumentAction,
    source: &Path,
) -> Result<FileStrategy> {
    let credential = build_credential(config)?;
    let image_embeddings = build_image_embeddings(config, &credential)?;
    let search_manager =
        build_search_manager(config, &credential, config.use_acls, image_embeddings.is_some())?;
    let blob_manager = build_blob_manager(config).await?;
    let file_processors = Arc::new(default_file_processors(&config.splitter)?);
    tracing::info!(
        "Preparing {:?} strategy for {} ({} file types)",
        action,
        source.display(),
        file_processors.len()
    );

    let mut strategy = FileStrategy::new(
        Arc::new(LocalListFileStrategy::new(source)),
        blob_manager,
        search_manager,
        file_processors,
        action,
    )
    .with_category(config.category.clone())
    .with_span(tracing::info_span!("prepdocs", action = ?action));

    if let Some(image_embeddings) = image_embeddings {
        strategy = strategy.with_image_embeddings(image_embeddings);
    }
    if let Some(llm) = build_llm(config)? {
        strategy = strategy.with_metadata(llm, MetadataExtractor::from_config(&config.metadata));
    }

    let understanding = &config.content_understanding;
    if understanding.enabled {
        strategy = strategy.with_content_understanding(
            understanding.endpoint.clone(),
            credential,
            PollPolicy::new(understanding.poll_attempts, understanding.poll_interval()),
        );
    }

    Ok(strategy)
}

/// Build the single-file strategy; the index is always ACL-aware
pub fn build_upload_user_file_strategy(config: &PrepdocsConfig) -> Result<UploadUserFileStrategy> {
    let credential = build_credential(config)?;
    let search_manager = build_search_manager(config, &credential, true, false)?;
    let file_processors = Arc::new(default_file_processors(&config.splitter)?);

    let mut strategy = UploadUserFileStrategy::new(search_manager, file_processors)
        .with_span(Span::current());
    if let Some(image_embeddings) = build_image_embeddings(config, &credential)? {
        strategy = strategy.with_image_embeddings(image_embeddings);
    }
    Ok(strategy)
}
