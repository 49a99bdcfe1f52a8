//! Page and split-page types with source position tracking

use serde::{Deserialize, Serialize};

/// One unit of parsed text from a source file
///
/// `offset` is an approximate character offset of the page's first character
/// in a reconstruction of the source. It is a citation hint, not a byte index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Ordinal position within the source file (0-indexed)
    pub index: usize,
    /// Character offset in the reconstructed source
    pub offset: usize,
    /// Normalized text content
    pub text: String,
}

impl Page {
    /// Create a new page
    pub fn new(index: usize, offset: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            offset,
            text: text.into(),
        }
    }

    /// Length of the page text in characters
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A chunk produced by a text splitter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitPage {
    /// Index of the page (or segment) this chunk came from
    pub page_num: usize,
    /// Chunk text
    pub text: String,
}

impl SplitPage {
    pub fn new(page_num: usize, text: impl Into<String>) -> Self {
        Self {
            page_num,
            text: text.into(),
        }
    }
}
