//! Model-assisted extraction of plan id, document type and locale

use std::collections::HashSet;

use serde_json::Value;

use super::processor::normalize_extension;
use crate::config::MetadataConfig;
use crate::error::{Error, Result};
use crate::providers::LlmProvider;
use crate::types::DocumentMetadata;

/// Extracts document-level metadata from the first page of a file
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    trigger_extensions: HashSet<String>,
    max_chars: usize,
    max_tokens: u32,
    temperature: f32,
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::from_config(&MetadataConfig::default())
    }
}

impl MetadataExtractor {
    pub fn from_config(config: &MetadataConfig) -> Self {
        Self {
            trigger_extensions: config
                .trigger_extensions
                .iter()
                .map(|ext| normalize_extension(ext))
                .collect(),
            max_chars: config.max_chars,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    /// Whether files with this extension go through extraction
    pub fn applies_to(&self, ext: &str) -> bool {
        !ext.is_empty() && self.trigger_extensions.contains(&normalize_extension(ext))
    }

    /// Ask the model for metadata; any failure degrades to `None`
    pub async fn extract(&self, text: &str, llm: &dyn LlmProvider) -> Option<DocumentMetadata> {
        if text.trim().is_empty() {
            return None;
        }

        let prompt = self.build_prompt(text);
        let reply = match llm.complete(&prompt, self.max_tokens, self.temperature).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("Metadata extraction failed ({}): {}", llm.name(), e);
                return None;
            }
        };

        match parse_metadata_response(&reply) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!("Ignoring metadata reply from {}: {}", llm.model(), e);
                None
            }
        }
    }

    fn build_prompt(&self, text: &str) -> String {
        let excerpt: String = text.chars().take(self.max_chars).collect();
        format!(
            "You are an expert at reading benefit plan documents. \
             From the following text, extract the Plan Identifier, the document type \
             and the document locale (for example en-US).\n\
             Respond with only a JSON object with the keys \"planid\", \"doctype\" and \"locale\", \
             using null for any value that is not present. \
             If none of them can be found, respond with only 'None'.\n\n\
             Text:\n{}",
            excerpt
        )
    }
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag on the opening fence line
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn field(object: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a model reply into metadata
///
/// A literal `None` (or an empty reply) means no metadata. Otherwise the reply
/// must be a JSON object, optionally wrapped in a code fence.
pub fn parse_metadata_response(reply: &str) -> Result<Option<DocumentMetadata>> {
    let body = strip_code_fence(reply);
    if body.is_empty() || body.eq_ignore_ascii_case("none") {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| Error::format(format!("metadata reply is not JSON: {}", e)))?;
    let Value::Object(object) = value else {
        return Err(Error::format("metadata reply is not a JSON object"));
    };

    let metadata = DocumentMetadata {
        planid: field(&object, "planid"),
        doctype: field(&object, "doctype"),
        locale: field(&object, "locale"),
    }
    .normalized();

    Ok((!metadata.is_empty()).then_some(metadata))
}
