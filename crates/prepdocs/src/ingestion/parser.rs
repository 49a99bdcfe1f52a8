//! Parser capability and the plain-text parser

use std::future::Future;
use std::sync::OnceLock;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use regex::Regex;
use tokio::io::AsyncReadExt;

use crate::error::{Error, Result};
use crate::types::{ContentReader, Page};

/// Lazy, finite, non-restartable sequence of pages
pub type PageStream<'a> = BoxStream<'a, Result<Page>>;

/// Turns raw file content into pages
///
/// Each call consumes the reader once and yields a fresh stream. Implementations
/// are selected by file extension through [`super::FileProcessors`]; callers
/// never branch on the concrete parser type.
pub trait Parser: Send + Sync {
    /// Parse content into a stream of pages
    fn parse<'a>(&'a self, content: &'a mut ContentReader) -> PageStream<'a>;

    /// Parser name for logging
    fn name(&self) -> &str;
}

/// Build a page stream from a future that produces all pages at once
pub(crate) fn pages_from_future<'a, F>(pages: F) -> PageStream<'a>
where
    F: Future<Output = Result<Vec<Page>>> + Send + 'a,
{
    stream::once(pages)
        .map_ok(|pages| stream::iter(pages.into_iter().map(Ok)))
        .try_flatten()
        .boxed()
}

/// Read the remaining content into memory
pub(crate) async fn read_all(content: &mut ContentReader) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    content.read_to_end(&mut data).await?;
    Ok(data)
}

/// Decode bytes as UTF-8, reporting invalid input as a format error
pub(crate) fn decode_utf8(data: Vec<u8>, format: &str) -> Result<String> {
    String::from_utf8(data)
        .map_err(|e| Error::format(format!("{} content is not valid UTF-8: {}", format, e)))
}

fn newline_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{2,}").expect("valid newline regex"))
}

fn space_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\S\n]{2,}").expect("valid whitespace regex"))
}

/// Normalize whitespace in extracted text
///
/// Runs of two or more newlines become one newline, runs of two or more
/// other whitespace characters become one space, and the result is trimmed.
pub fn cleanup_data(data: &str) -> String {
    let output = newline_runs().replace_all(data, "\n");
    let output = space_runs().replace_all(&output, " ");
    output.trim().to_string()
}

/// Parses plain text into a single page
#[derive(Debug, Default, Clone, Copy)]
pub struct TextParser;

impl TextParser {
    pub fn new() -> Self {
        Self
    }
}

impl Parser for TextParser {
    fn parse<'a>(&'a self, content: &'a mut ContentReader) -> PageStream<'a> {
        pages_from_future(async move {
            let text = decode_utf8(read_all(content).await?, "text")?;
            Ok(vec![Page::new(0, 0, cleanup_data(&text))])
        })
    }

    fn name(&self) -> &str {
        "text"
    }
}

#[cfg(test)]
pub(crate) async fn collect_pages(parser: &dyn Parser, data: &'static [u8]) -> Result<Vec<Page>> {
    let mut content: &'static [u8] = data;
    parser.parse(&mut content).try_collect().await
}
