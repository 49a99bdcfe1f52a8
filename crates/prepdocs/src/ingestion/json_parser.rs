//! JSON parser: arrays become one page per element, objects one page

use serde_json::Value;

use super::parser::{decode_utf8, pages_from_future, read_all, PageStream, Parser};
use crate::error::{Error, Result};
use crate::types::{ContentReader, Page};

/// Parses a single JSON document into pages
///
/// Element text is the compact re-serialization of the value with key order
/// and number literals preserved. Offsets count one separator character before
/// each element and are approximate.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonParser;

impl JsonParser {
    pub fn new() -> Self {
        Self
    }
}

fn to_pages(data: Value) -> Result<Vec<Page>> {
    match data {
        Value::Array(items) => {
            let mut pages = Vec::with_capacity(items.len());
            let mut offset = 0;
            for (i, item) in items.iter().enumerate() {
                offset += 1;
                let page = Page::new(i, offset, serde_json::to_string(item)?);
                offset += page.char_len();
                pages.push(page);
            }
            Ok(pages)
        }
        Value::Object(_) => Ok(vec![Page::new(0, 0, serde_json::to_string(&data)?)]),
        other => {
            tracing::warn!(
                "Top-level JSON value is neither an array nor an object ({}), no pages produced",
                kind_of(&other)
            );
            Ok(Vec::new())
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Parser for JsonParser {
    fn parse<'a>(&'a self, content: &'a mut ContentReader) -> PageStream<'a> {
        pages_from_future(async move {
            let text = decode_utf8(read_all(content).await?, "JSON")?;
            let data: Value = serde_json::from_str(&text)
                .map_err(|e| Error::format(format!("invalid JSON: {}", e)))?;
            to_pages(data)
        })
    }

    fn name(&self) -> &str {
        "json"
    }
}
