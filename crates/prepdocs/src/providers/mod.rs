//! Collaborator abstractions and their implementations
//!
//! The pipeline core only sees the traits; concrete implementations are
//! chosen by the bootstrap from configuration.

pub mod azure_search;
pub mod blob;
pub mod credential;
pub mod embedding;
mod http;
pub mod lister;
pub mod llm;
pub mod local_index;
pub mod ollama;
pub mod openai;
pub mod search;
pub mod vision;

#[cfg(feature = "gcp")]
pub mod gcp;

pub use azure_search::AzureSearchManager;
pub use blob::{sourcepage_from_file_page, BlobManager, LocalBlobManager};
pub use credential::{AzureCliCredential, AzureCredential, StaticTokenCredential, TokenCredential};
pub use embedding::{EmbeddingProvider, ImageEmbeddings};
pub use lister::{ListFileStrategy, LocalListFileStrategy};
pub use llm::LlmProvider;
pub use local_index::LocalSearchIndex;
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
pub use search::{filename_to_id, SearchDocument, SearchManager, MAX_BATCH_SIZE};
pub use vision::VisionImageEmbeddings;
