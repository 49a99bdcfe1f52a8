//! Extension-keyed table of parser and splitter pairs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::csv_parser::CsvParser;
#[cfg(feature = "html")]
use super::html_parser::HtmlParser;
use super::json_parser::JsonParser;
use super::parser::{Parser, TextParser};
#[cfg(feature = "pdf")]
use super::pdf_parser::PdfParser;
use super::splitter::{SentenceTextSplitter, SimpleTextSplitter, TextSplitter};
use crate::config::SplitterConfig;
use crate::error::{Error, Result};

/// Immutable pairing of one parser and one splitter
#[derive(Clone)]
pub struct FileProcessor {
    parser: Arc<dyn Parser>,
    splitter: Arc<dyn TextSplitter>,
}

impl FileProcessor {
    pub fn new(parser: Arc<dyn Parser>, splitter: Arc<dyn TextSplitter>) -> Self {
        Self { parser, splitter }
    }

    pub fn parser(&self) -> &dyn Parser {
        self.parser.as_ref()
    }

    pub fn splitter(&self) -> &dyn TextSplitter {
        self.splitter.as_ref()
    }
}

impl fmt::Debug for FileProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileProcessor")
            .field("parser", &self.parser.name())
            .field("splitter", &self.splitter.name())
            .finish()
    }
}

/// Normalize an extension to lower case with a leading dot
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

/// Processor table keyed by lower-cased extension
#[derive(Debug, Clone, Default)]
pub struct FileProcessors {
    processors: HashMap<String, FileProcessor>,
}

impl FileProcessors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processor; an extension can only be registered once
    pub fn register(&mut self, ext: &str, processor: FileProcessor) -> Result<()> {
        let key = normalize_extension(ext);
        if self.processors.contains_key(&key) {
            return Err(Error::config(format!(
                "a file processor is already registered for '{}'",
                key
            )));
        }
        self.processors.insert(key, processor);
        Ok(())
    }

    /// Builder form of [`FileProcessors::register`]
    pub fn with(mut self, ext: &str, processor: FileProcessor) -> Result<Self> {
        self.register(ext, processor)?;
        Ok(self)
    }

    /// Look up the processor for an extension (case-insensitive)
    pub fn get(&self, ext: &str) -> Option<&FileProcessor> {
        if ext.is_empty() {
            return None;
        }
        self.processors.get(&normalize_extension(ext))
    }

    /// Registered extensions, sorted
    pub fn extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self.processors.keys().map(String::as_str).collect();
        exts.sort_unstable();
        exts
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}

/// The default table: prose formats use sentence splitting, structured
/// formats use fixed-length splitting
pub fn default_file_processors(config: &SplitterConfig) -> Result<FileProcessors> {
    let sentence: Arc<dyn TextSplitter> =
        Arc::new(SentenceTextSplitter::new(config.chunk_size, config.overlap));
    let simple: Arc<dyn TextSplitter> = Arc::new(SimpleTextSplitter::new(config.max_object_length));

    let text = FileProcessor::new(Arc::new(TextParser), sentence.clone());

    let processors = FileProcessors::new()
        .with(".txt", text.clone())?
        .with(".md", text)?
        .with(".csv", FileProcessor::new(Arc::new(CsvParser), simple.clone()))?
        .with(".json", FileProcessor::new(Arc::new(JsonParser), simple))?;

    #[cfg(feature = "pdf")]
    let processors = processors.with(".pdf", FileProcessor::new(Arc::new(PdfParser), sentence.clone()))?;

    #[cfg(feature = "html")]
    let processors = {
        let html = FileProcessor::new(Arc::new(HtmlParser), sentence.clone());
        processors.with(".html", html.clone())?.with(".htm", html)?
    };

    Ok(processors)
}
