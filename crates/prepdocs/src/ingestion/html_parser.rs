//! HTML parser backed by scraper

use scraper::{Html, Node, Selector};

use super::parser::{cleanup_data, decode_utf8, pages_from_future, read_all, PageStream, Parser};
use crate::error::{Error, Result};
use crate::types::{ContentReader, Page};

/// Extracts the visible body text of an HTML document as one page
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlParser;

impl HtmlParser {
    pub fn new() -> Self {
        Self
    }
}

fn body_text(html: &str) -> Result<String> {
    let document = Html::parse_document(html);
    let body_selector = Selector::parse("body")
        .map_err(|e| Error::internal(format!("invalid body selector: {:?}", e)))?;

    let mut content = String::new();
    if let Some(body) = document.select(&body_selector).next() {
        for node in body.descendants() {
            let Node::Text(text) = node.value() else {
                continue;
            };
            let hidden = node
                .parent()
                .and_then(|parent| parent.value().as_element())
                .is_some_and(|el| matches!(el.name(), "script" | "style" | "noscript"));
            if !hidden {
                content.push_str(text);
            }
        }
    }

    Ok(cleanup_data(&content))
}

impl Parser for HtmlParser {
    fn parse<'a>(&'a self, content: &'a mut ContentReader) -> PageStream<'a> {
        pages_from_future(async move {
            let html = decode_utf8(read_all(content).await?, "HTML")?;
            Ok(vec![Page::new(0, 0, body_text(&html)?)])
        })
    }

    fn name(&self) -> &str {
        "html"
    }
}
