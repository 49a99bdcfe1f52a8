//! Sections: indexable chunks with provenance and metadata

use serde::{Deserialize, Serialize};

use super::file::FileRef;
use super::page::SplitPage;

/// Structured metadata extracted from the first page of a document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Plan identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planid: Option<String>,
    /// Document type / classification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctype: Option<String>,
    /// Document locale (e.g. "en-US")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl DocumentMetadata {
    /// True when no field carries a value
    pub fn is_empty(&self) -> bool {
        self.planid.is_none() && self.doctype.is_none() && self.locale.is_none()
    }

    /// Drop blank values and literal "None" answers
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("none") && !v.eq_ignore_ascii_case("null"))
        }

        Self {
            planid: clean(self.planid),
            doctype: clean(self.doctype),
            locale: clean(self.locale),
        }
    }
}

/// One indexable chunk derived from the pages of one file
#[derive(Debug, Clone)]
pub struct Section {
    /// Splitter output this section wraps
    pub split_page: SplitPage,
    /// The file the section came from
    pub content: FileRef,
    /// Optional category tag
    pub category: Option<String>,
    /// Plan identifier shared by every section of the file
    pub planid: Option<String>,
    /// Document type shared by every section of the file
    pub doctype: Option<String>,
    /// Locale shared by every section of the file
    pub locale: Option<String>,
    /// Text embedding, when computed ahead of indexing
    pub embedding: Option<Vec<f32>>,
}

impl Section {
    /// Create a new section without metadata
    pub fn new(split_page: SplitPage, content: FileRef, category: Option<String>) -> Self {
        Self {
            split_page,
            content,
            category,
            planid: None,
            doctype: None,
            locale: None,
            embedding: None,
        }
    }

    /// Copy extracted metadata onto this section
    pub fn apply_metadata(&mut self, metadata: &DocumentMetadata) {
        self.planid = metadata.planid.clone();
        self.doctype = metadata.doctype.clone();
        self.locale = metadata.locale.clone();
    }

    /// Metadata currently attached to the section
    pub fn metadata(&self) -> DocumentMetadata {
        DocumentMetadata {
            planid: self.planid.clone(),
            doctype: self.doctype.clone(),
            locale: self.locale.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_drops_placeholders() {
        let meta = DocumentMetadata {
            planid: Some("  PLAN-42 ".to_string()),
            doctype: Some("None".to_string()),
            locale: Some("".to_string()),
        }
        .normalized();

        assert_eq!(meta.planid.as_deref(), Some("PLAN-42"));
        assert!(meta.doctype.is_none());
        assert!(meta.locale.is_none());
        assert!(!meta.is_empty());
    }

    #[test]
    fn test_apply_metadata() {
        let mut section = Section::new(
            SplitPage::new(0, "text"),
            FileRef::new("docs/a.pdf"),
            Some("benefits".to_string()),
        );
        let meta = DocumentMetadata {
            planid: Some("P1".to_string()),
            doctype: None,
            locale: Some("en-US".to_string()),
        };
        section.apply_metadata(&meta);

        assert_eq!(section.metadata(), meta);
        assert_eq!(section.category.as_deref(), Some("benefits"));
    }
}
