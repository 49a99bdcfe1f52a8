//! Language model provider trait

use async_trait::async_trait;

use crate::error::Result;

/// Trait for single-prompt text completion
///
/// Implementations:
/// - `OpenAiClient`: OpenAI-compatible chat completions endpoint
/// - `OllamaClient`: Local Ollama server
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Complete a prompt, returning the model's reply text
    async fn complete(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
