//! PDF parser backed by lopdf

use lopdf::Document;

use super::parser::{cleanup_data, pages_from_future, read_all, PageStream, Parser};
use crate::error::{Error, Result};
use crate::types::{ContentReader, Page};

/// Extracts text page by page from a PDF document
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfParser;

impl PdfParser {
    pub fn new() -> Self {
        Self
    }
}

fn extract_pages(data: &[u8]) -> Result<Vec<Page>> {
    let doc = Document::load_mem(data)
        .map_err(|e| Error::format(format!("failed to load PDF: {}", e)))?;

    let mut pages = Vec::new();
    let mut offset = 0;
    for (index, page_num) in doc.get_pages().into_keys().enumerate() {
        let text = match doc.extract_text(&[page_num]) {
            Ok(text) => cleanup_data(&text),
            Err(e) => {
                tracing::debug!("Could not extract text from PDF page {}: {}", page_num, e);
                String::new()
            }
        };
        let page = Page::new(index, offset, text);
        offset += page.char_len();
        pages.push(page);
    }

    Ok(pages)
}

impl Parser for PdfParser {
    fn parse<'a>(&'a self, content: &'a mut ContentReader) -> PageStream<'a> {
        pages_from_future(async move {
            let data = read_all(content).await?;
            tokio::task::spawn_blocking(move || extract_pages(&data))
                .await
                .map_err(|e| Error::internal(format!("PDF extraction task failed: {}", e)))?
        })
    }

    fn name(&self) -> &str {
        "pdf"
    }
}
