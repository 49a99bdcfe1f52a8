//! Core value types for the ingestion pipeline

pub mod file;
pub mod page;
pub mod section;

pub use file::{ContentReader, File, FileAcls, FileRef};
pub use page::{Page, SplitPage};
pub use section::{DocumentMetadata, Section};
