//! Configuration for the ingestion pipeline

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Main prepdocs configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepdocsConfig {
    /// Category tag applied to every section
    pub category: Option<String>,
    /// Store access-control lists with indexed documents
    pub use_acls: bool,
    /// Blob storage configuration
    pub storage: StorageConfig,
    /// Search index configuration
    pub search: SearchConfig,
    /// Text embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Language model configuration (metadata extraction)
    pub llm: LlmConfig,
    /// OpenAI-compatible service settings
    pub openai: OpenAiConfig,
    /// Ollama settings
    pub ollama: OllamaConfig,
    /// Metadata extraction configuration
    pub metadata: MetadataConfig,
    /// Text splitting configuration
    pub splitter: SplitterConfig,
    /// Content Understanding enrichment configuration
    pub content_understanding: ContentUnderstandingConfig,
    /// Image embedding configuration
    pub image_embeddings: ImageEmbeddingsConfig,
    /// Credential used for Azure services
    pub credential: CredentialConfig,
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
        .join("prepdocs")
}

/// Blob storage backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Local directory
    #[default]
    Local,
    /// Google Cloud Storage bucket
    Gcs,
}

/// Blob storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory blobs are copied into (local backend)
    pub local_dir: PathBuf,
    /// Bucket name (gcs backend)
    pub gcs_bucket: Option<String>,
    /// Object name prefix (gcs backend)
    pub gcs_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_dir: data_dir().join("blobs"),
            gcs_bucket: None,
            gcs_prefix: "originals/".to_string(),
        }
    }
}

/// Search index backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchBackend {
    /// JSON file on local disk
    #[default]
    Local,
    /// Azure AI Search service
    Azure,
}

/// Search index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub backend: SearchBackend,
    /// Index file (local backend)
    pub index_path: PathBuf,
    /// Search service name (azure backend)
    pub service: Option<String>,
    /// Index name
    pub index_name: String,
    /// Admin key (azure backend); prefer the AZURE_SEARCH_KEY environment variable
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// REST API version (azure backend)
    pub api_version: String,
    /// Analyzer for the content field
    pub analyzer_name: Option<String>,
    /// Name of the text embedding field
    pub embedding_field: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: SearchBackend::Local,
            index_path: data_dir().join("index.json"),
            service: None,
            index_name: "gptkbindex".to_string(),
            api_key: None,
            api_version: "2024-07-01".to_string(),
            analyzer_name: None,
            embedding_field: "embedding".to_string(),
        }
    }
}

/// Model service selection for embeddings and the language model
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    /// Feature disabled
    #[default]
    None,
    /// OpenAI-compatible API
    OpenAi,
    /// Local Ollama server
    Ollama,
}

/// Text embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: ModelProvider,
    /// Embedding model name
    pub model: String,
    /// Embedding dimensions
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: ModelProvider::None,
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Language model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: ModelProvider,
    /// Chat / generation model name
    pub model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ModelProvider::None,
            model: "gpt-4o-mini".to_string(),
        }
    }
}

/// OpenAI-compatible service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// API base URL
    pub base_url: String,
    /// API key; prefer the OPENAI_API_KEY environment variable
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            timeout_secs: 60,
            max_retries: 2,
        }
    }
}

/// Ollama settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

/// Metadata extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Run extraction when a language model is configured
    pub enabled: bool,
    /// Extensions that trigger extraction
    pub trigger_extensions: Vec<String>,
    /// Characters of the first page sent to the model
    pub max_chars: usize,
    /// Reply token budget
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger_extensions: vec![".pdf".to_string()],
            max_chars: 4000,
            max_tokens: 100,
            temperature: 0.0,
        }
    }
}

/// Text splitting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterConfig {
    /// Target chunk size in characters (prose formats)
    pub chunk_size: usize,
    /// Overlap between chunks in characters (prose formats)
    pub overlap: usize,
    /// Fixed chunk length in characters (structured formats)
    pub max_object_length: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 100,
            max_object_length: 1000,
        }
    }
}

/// Content Understanding enrichment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentUnderstandingConfig {
    pub enabled: bool,
    /// Service endpoint
    pub endpoint: Option<String>,
    /// Poll attempts before giving up
    pub poll_attempts: u32,
    /// Seconds between poll attempts
    pub poll_interval_secs: u64,
}

impl Default for ContentUnderstandingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            poll_attempts: 60,
            poll_interval_secs: 2,
        }
    }
}

impl ContentUnderstandingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Image embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageEmbeddingsConfig {
    pub enabled: bool,
    /// Vision service endpoint
    pub endpoint: Option<String>,
    /// REST API version
    pub api_version: String,
    /// Vectorization model version
    pub model_version: String,
}

impl Default for ImageEmbeddingsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            api_version: "2024-02-01".to_string(),
            model_version: "2023-04-15".to_string(),
        }
    }
}

/// How Azure services are authenticated
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CredentialMode {
    /// Tokens from `az account get-access-token`
    #[default]
    AzureCli,
    /// Static API key
    Key,
    /// Pre-issued bearer token
    Token,
}

/// Credential configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    pub mode: CredentialMode,
    /// API key (key mode); falls back to the search key
    #[serde(skip_serializing)]
    pub key: Option<String>,
    /// Bearer token (token mode)
    #[serde(skip_serializing)]
    pub token: Option<String>,
}

impl PrepdocsConfig {
    /// Parse a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| Error::config(format!("invalid config: {}", e)))
    }

    /// Load from an optional TOML file, then overlay environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let source = std::fs::read_to_string(path).map_err(|e| {
                    Error::config(format!("cannot read config file {}: {}", path.display(), e))
                })?;
                Self::from_toml_str(&source)?
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Overlay secrets and endpoints from the environment
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(key) = lookup("AZURE_SEARCH_KEY") {
            self.search.api_key = Some(key);
        }
        if let Some(service) = lookup("AZURE_SEARCH_SERVICE") {
            self.search.service = Some(service);
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.openai.api_key = Some(key);
        }
        if let Some(endpoint) = lookup("AZURE_CONTENTUNDERSTANDING_ENDPOINT") {
            self.content_understanding.endpoint = Some(endpoint);
        }
        if let Some(dir) = lookup("PREPDOCS_STORAGE_DIR") {
            self.storage.local_dir = PathBuf::from(dir);
        }
    }

    /// Check settings that can be verified without contacting any service
    pub fn validate(&self) -> Result<()> {
        if self.splitter.chunk_size == 0 || self.splitter.max_object_length == 0 {
            return Err(Error::config("splitter sizes must be greater than zero"));
        }
        if self.search.backend == SearchBackend::Azure && self.search.service.is_none() {
            return Err(Error::config(
                "search backend 'azure' requires search.service or AZURE_SEARCH_SERVICE",
            ));
        }
        if self.storage.backend == StorageBackend::Gcs && self.storage.gcs_bucket.is_none() {
            return Err(Error::config("storage backend 'gcs' requires storage.gcs_bucket"));
        }
        if self.image_embeddings.enabled && self.image_embeddings.endpoint.is_none() {
            return Err(Error::config("image embeddings are enabled but no endpoint was provided"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = PrepdocsConfig::from_toml_str(
            r#"
            category = "benefits"

            [splitter]
            chunk_size = 500

            [content_understanding]
            enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(config.category.as_deref(), Some("benefits"));
        assert_eq!(config.splitter.chunk_size, 500);
        assert_eq!(config.splitter.max_object_length, 1000);
        assert!(config.content_understanding.enabled);
        assert_eq!(config.content_understanding.poll_attempts, 60);
        assert_eq!(config.metadata.trigger_extensions, vec![".pdf"]);
        assert_eq!(config.llm.provider, ModelProvider::None);
    }

    #[test]
    fn test_env_overlay() {
        let env: HashMap<&str, &str> = [
            ("AZURE_SEARCH_KEY", "secret"),
            ("AZURE_CONTENTUNDERSTANDING_ENDPOINT", "https://cu.example.com"),
            ("OPENAI_API_KEY", "  "),
        ]
        .into_iter()
        .collect();

        let mut config = PrepdocsConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.search.api_key.as_deref(), Some("secret"));
        assert_eq!(
            config.content_understanding.endpoint.as_deref(),
            Some("https://cu.example.com")
        );
        assert!(config.openai.api_key.is_none());
    }

    #[test]
    fn test_validate_rejects_incomplete_backends() {
        let mut config = PrepdocsConfig::default();
        assert!(config.validate().is_ok());

        config.search.backend = SearchBackend::Azure;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.search.service = Some("contoso".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = PrepdocsConfig::from_toml_str("splitter = 3").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
