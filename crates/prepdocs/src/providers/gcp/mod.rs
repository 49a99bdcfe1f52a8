//! Google Cloud Platform collaborators

mod gcs_store;

pub use gcs_store::GcsBlobManager;
