//! Error types for the ingestion pipeline

use thiserror::Error;

/// Result type alias for prepdocs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ingestion pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (fatal, raised before any file is processed)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unexpected response while creating the enrichment analyzer
    #[error("Error creating analyzer (HTTP {status}): {body}")]
    AnalyzerCreation { status: u16, body: String },

    /// The enrichment service reported a terminal failure for an operation
    #[error("Enrichment operation failed: {0}")]
    EnrichmentFailed(String),

    /// The enrichment operation was still running when the poll budget ran out
    #[error("Enrichment operation still running after {attempts} poll attempts")]
    EnrichmentTimeout { attempts: u32 },

    /// Malformed content for the selected parser or an unexpected response shape
    #[error("Format error: {0}")]
    Format(String),

    /// File parsing error
    #[error("Failed to parse file '{filename}': {message}")]
    FileParse { filename: String, message: String },

    /// Blob storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Search index error
    #[error("Search index error: {0}")]
    Search(String),

    /// Embedding error
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Language model error
    #[error("LLM error: {0}")]
    Llm(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a format error
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }

    /// Create a file parse error
    pub fn file_parse(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FileParse {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Create a search index error
    pub fn search(message: impl Into<String>) -> Self {
        Self::Search(message.into())
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create an LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// True for errors that abort setup rather than a single file
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::AnalyzerCreation { .. })
    }
}
