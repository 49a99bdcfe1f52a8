//! Parsing, splitting and metadata extraction

mod csv_parser;
#[cfg(feature = "html")]
mod html_parser;
mod json_parser;
pub mod metadata;
mod parser;
#[cfg(feature = "pdf")]
mod pdf_parser;
mod processor;
mod splitter;

pub use csv_parser::CsvParser;
#[cfg(feature = "html")]
pub use html_parser::HtmlParser;
pub use json_parser::JsonParser;
pub use metadata::{parse_metadata_response, MetadataExtractor};
pub use parser::{cleanup_data, PageStream, Parser, TextParser};
#[cfg(feature = "pdf")]
pub use pdf_parser::PdfParser;
pub use processor::{default_file_processors, normalize_extension, FileProcessor, FileProcessors};
pub use splitter::{SentenceTextSplitter, SimpleTextSplitter, TextSplitter};
