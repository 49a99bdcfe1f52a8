//! prepdocs: document ingestion pipeline
//!
//! Turns heterogeneous source files (text, CSV, JSON, PDF, HTML) into pages,
//! splits them into indexable sections, optionally enriches them with
//! model-extracted metadata, and reconciles the result with a blob store and
//! a search index.

pub mod bootstrap;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod ingestion;
pub mod providers;
pub mod strategy;
pub mod types;

pub use config::PrepdocsConfig;
pub use error::{Error, Result};
pub use strategy::{DocumentAction, FileStrategy, IngestReport, Strategy, UploadUserFileStrategy};
pub use types::{DocumentMetadata, File, FileAcls, FileRef, Page, Section, SplitPage};
