//! Text splitters turning pages into indexable chunks

use unicode_segmentation::UnicodeSegmentation;

use crate::types::{Page, SplitPage};

/// Splits parsed pages into chunks
pub trait TextSplitter: Send + Sync {
    /// Split pages into chunks tagged with the page they came from
    fn split_pages(&self, pages: &[Page]) -> Vec<SplitPage>;

    /// Splitter name for logging
    fn name(&self) -> &str;
}

/// Sentence-aware splitter with configurable size and overlap
///
/// Chunks never cross a page boundary. Sizes are counted in characters.
#[derive(Debug, Clone)]
pub struct SentenceTextSplitter {
    /// Target chunk size in characters
    chunk_size: usize,
    /// Characters carried over from the end of the previous chunk
    overlap: usize,
}

impl Default for SentenceTextSplitter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CHUNK_SIZE, Self::DEFAULT_OVERLAP)
    }
}

impl SentenceTextSplitter {
    pub const DEFAULT_CHUNK_SIZE: usize = 1000;
    pub const DEFAULT_OVERLAP: usize = 100;

    /// Create a new splitter; overlap is capped at half the chunk size
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size / 2),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn split_text(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;
        // Characters added since the last flush, excluding overlap
        let mut fresh_len = 0usize;

        for sentence in text.split_sentence_bounds() {
            for piece in self.pieces(sentence) {
                let piece_len = piece.chars().count();

                if current_len + piece_len > self.chunk_size {
                    if fresh_len > 0 {
                        push_trimmed(&mut chunks, &current);
                        current = self.overlap_text(&current);
                        current_len = current.chars().count();
                        fresh_len = 0;
                    }
                    if current_len + piece_len > self.chunk_size {
                        current.clear();
                        current_len = 0;
                    }
                }

                current.push_str(piece);
                current_len += piece_len;
                fresh_len += piece_len;
            }
        }

        if fresh_len > 0 {
            push_trimmed(&mut chunks, &current);
        }

        chunks
    }

    /// Hard-split a sentence that alone exceeds the chunk size
    fn pieces<'a>(&self, sentence: &'a str) -> Vec<&'a str> {
        let mut pieces = Vec::new();
        let mut start = 0;
        let mut count = 0;
        for (pos, _) in sentence.char_indices() {
            if count == self.chunk_size {
                pieces.push(&sentence[start..pos]);
                start = pos;
                count = 0;
            }
            count += 1;
        }
        pieces.push(&sentence[start..]);
        pieces
    }

    /// Overlap text from the end of a chunk, started at a sentence or word boundary
    fn overlap_text(&self, text: &str) -> String {
        if self.overlap == 0 {
            return String::new();
        }

        let total = text.chars().count();
        if total <= self.overlap {
            return text.to_string();
        }

        let start = text
            .char_indices()
            .nth(total - self.overlap)
            .map(|(pos, _)| pos)
            .unwrap_or(0);
        let tail = &text[start..];

        if let Some(pos) = tail.find(". ") {
            return tail[pos + 2..].to_string();
        }
        if let Some(pos) = tail.find(' ') {
            return tail[pos + 1..].to_string();
        }
        tail.to_string()
    }
}

fn push_trimmed(chunks: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

impl TextSplitter for SentenceTextSplitter {
    fn split_pages(&self, pages: &[Page]) -> Vec<SplitPage> {
        pages
            .iter()
            .flat_map(|page| {
                self.split_text(&page.text)
                    .into_iter()
                    .map(move |text| SplitPage::new(page.index, text))
            })
            .collect()
    }

    fn name(&self) -> &str {
        "sentence"
    }
}

/// Concatenates all pages and cuts the result at a fixed length
///
/// Used for structured formats (JSON, CSV) where sentence boundaries carry no
/// meaning.
#[derive(Debug, Clone)]
pub struct SimpleTextSplitter {
    max_object_length: usize,
}

impl Default for SimpleTextSplitter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_OBJECT_LENGTH)
    }
}

impl SimpleTextSplitter {
    pub const DEFAULT_MAX_OBJECT_LENGTH: usize = 1000;

    pub fn new(max_object_length: usize) -> Self {
        Self {
            max_object_length: max_object_length.max(1),
        }
    }
}

impl TextSplitter for SimpleTextSplitter {
    fn split_pages(&self, pages: &[Page]) -> Vec<SplitPage> {
        let all_text: String = pages.iter().map(|page| page.text.as_str()).collect();
        if all_text.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = all_text.chars().collect();
        if chars.len() <= self.max_object_length {
            return vec![SplitPage::new(0, all_text)];
        }

        chars
            .chunks(self.max_object_length)
            .enumerate()
            .map(|(i, chunk)| SplitPage::new(i, chunk.iter().collect::<String>()))
            .collect()
    }

    fn name(&self) -> &str {
        "simple"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_pages_keep_page_numbers() {
        let splitter = SentenceTextSplitter::default();
        let pages = vec![
            Page::new(0, 0, "First page."),
            Page::new(1, 11, ""),
            Page::new(2, 11, "Third page."),
        ];

        let split = splitter.split_pages(&pages);
        assert_eq!(
            split,
            vec![SplitPage::new(0, "First page."), SplitPage::new(2, "Third page.")]
        );
    }

    #[test]
    fn test_long_text_respects_chunk_size() {
        let splitter = SentenceTextSplitter::new(60, 20);
        let text = "The plan covers dental care. Vision is included. ".repeat(10);
        let split = splitter.split_pages(&[Page::new(3, 0, text)]);

        assert!(split.len() > 1);
        for chunk in &split {
            assert_eq!(chunk.page_num, 3);
            assert!(chunk.text.chars().count() <= 60, "chunk too long: {:?}", chunk.text);
        }
    }

    #[test]
    fn test_oversized_sentence_is_cut() {
        let splitter = SentenceTextSplitter::new(10, 0);
        let split = splitter.split_pages(&[Page::new(0, 0, "abcdefghijklmnopqrstuvwxy")]);
        let texts: Vec<_> = split.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["abcdefghij", "klmnopqrst", "uvwxy"]);
    }

    #[test]
    fn test_simple_splitter_concatenates() {
        let splitter = SimpleTextSplitter::new(5);
        let pages = vec![Page::new(0, 1, "abc"), Page::new(1, 5, "defgh")];

        let split = splitter.split_pages(&pages);
        assert_eq!(
            split,
            vec![SplitPage::new(0, "abcde"), SplitPage::new(1, "fgh")]
        );
    }

    #[test]
    fn test_simple_splitter_single_and_blank() {
        let splitter = SimpleTextSplitter::default();
        assert!(splitter.split_pages(&[Page::new(0, 0, "  ")]).is_empty());
        assert!(splitter.split_pages(&[]).is_empty());
        assert_eq!(
            splitter.split_pages(&[Page::new(0, 0, "{\"a\":1}")]),
            vec![SplitPage::new(0, "{\"a\":1}")]
        );
    }
}
