//! CSV parser: one page per data row

use super::parser::{decode_utf8, pages_from_future, read_all, PageStream, Parser};
use crate::error::Result;
use crate::types::{ContentReader, Page};

/// Parses CSV content into one page per row after the header
///
/// Each physical line is read as one record, so quoted fields that span
/// several lines are split at the line break. Lines end at `\r\n`, `\n` or a
/// lone `\r`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvParser;

impl CsvParser {
    pub fn new() -> Self {
        Self
    }
}

/// Split text into lines on `\r\n`, `\n` or `\r`, without a trailing empty line
fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        match rest.find(['\r', '\n']) {
            Some(pos) => {
                lines.push(&rest[..pos]);
                let skip = if rest[pos..].starts_with("\r\n") { 2 } else { 1 };
                rest = &rest[pos + skip..];
            }
            None => {
                lines.push(rest);
                break;
            }
        }
    }
    lines
}

/// Parse a single line as one CSV record and rejoin its fields with commas
fn join_record(line: &str) -> Result<String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());

    let mut record = csv::StringRecord::new();
    if reader.read_record(&mut record)? {
        Ok(record.iter().collect::<Vec<_>>().join(","))
    } else {
        Ok(String::new())
    }
}

fn to_pages(text: &str) -> Result<Vec<Page>> {
    let mut pages = Vec::new();
    let mut offset = 0;
    for (index, line) in split_lines(text).into_iter().skip(1).enumerate() {
        let page = Page::new(index, offset, join_record(line)?);
        offset += page.char_len() + 1;
        pages.push(page);
    }
    Ok(pages)
}

impl Parser for CsvParser {
    fn parse<'a>(&'a self, content: &'a mut ContentReader) -> PageStream<'a> {
        pages_from_future(async move {
            let text = decode_utf8(read_all(content).await?, "CSV")?;
            to_pages(&text)
        })
    }

    fn name(&self) -> &str {
        "csv"
    }
}
