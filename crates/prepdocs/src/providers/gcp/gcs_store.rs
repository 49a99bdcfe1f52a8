//! Google Cloud Storage blob manager

use async_trait::async_trait;

use google_cloud_storage::client::{Client as GcsClient, ClientConfig};
use google_cloud_storage::http::objects::delete::DeleteObjectRequest;
use google_cloud_storage::http::objects::list::ListObjectsRequest;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};

use crate::error::{Error, Result};
use crate::providers::blob::BlobManager;
use crate::types::file::basename;
use crate::types::File;

/// Stores ingested files as objects under a prefix in one bucket
pub struct GcsBlobManager {
    client: GcsClient,
    bucket: String,
    prefix: String,
}

impl GcsBlobManager {
    /// Create a manager using application default credentials
    pub async fn new(bucket: String, prefix: Option<String>) -> Result<Self> {
        let config = ClientConfig::default()
            .with_auth()
            .await
            .map_err(|e| Error::config(format!("Failed to create GCS client: {}", e)))?;

        Ok(Self {
            client: GcsClient::new(config),
            bucket,
            prefix: prefix.unwrap_or_else(|| "originals/".to_string()),
        })
    }

    fn object_name(&self, path: &str) -> String {
        format!("{}{}", self.prefix, basename(path))
    }

    fn gcs_uri(&self, object: &str) -> String {
        format!("gs://{}/{}", self.bucket, object)
    }

    async fn delete(&self, object: String) -> Result<()> {
        self.client
            .delete_object(&DeleteObjectRequest {
                bucket: self.bucket.clone(),
                object: object.clone(),
                ..Default::default()
            })
            .await
            .or_else(|e| {
                // Deleting an object that is already gone is not an error
                if e.to_string().contains("404") {
                    Ok(())
                } else {
                    Err(Error::storage(format!("Failed to delete {} from GCS: {}", object, e)))
                }
            })
    }
}

#[async_trait]
impl BlobManager for GcsBlobManager {
    async fn upload_blob(&self, file: &File) -> Result<Vec<String>> {
        let source = file.source_path().ok_or_else(|| {
            Error::storage(format!("'{}' has no source path to upload from", file.filename()))
        })?;
        let data = tokio::fs::read(source).await?;

        let object = self.object_name(file.path());
        let mut media = Media::new(object.clone());
        media.content_type = mime_guess::from_path(source)
            .first_or_octet_stream()
            .to_string()
            .into();

        self.client
            .upload_object(
                &UploadObjectRequest {
                    bucket: self.bucket.clone(),
                    ..Default::default()
                },
                data,
                &UploadType::Simple(media),
            )
            .await
            .map_err(|e| Error::storage(format!("Failed to upload to GCS: {}", e)))?;

        tracing::info!("Uploaded '{}' to {}", file.filename(), self.gcs_uri(&object));
        Ok(vec![self.gcs_uri(&object)])
    }

    async fn remove_blob(&self, path: Option<&str>) -> Result<()> {
        if let Some(path) = path {
            tracing::info!("Removing blob '{}'", basename(path));
            return self.delete(self.object_name(path)).await;
        }

        tracing::info!("Removing all blobs under gs://{}/{}", self.bucket, self.prefix);
        let mut page_token = None;
        loop {
            let listing = self
                .client
                .list_objects(&ListObjectsRequest {
                    bucket: self.bucket.clone(),
                    prefix: Some(self.prefix.clone()),
                    page_token: page_token.take(),
                    ..Default::default()
                })
                .await
                .map_err(|e| Error::storage(format!("Failed to list GCS objects: {}", e)))?;

            for item in listing.items.unwrap_or_default() {
                self.delete(item.name).await?;
            }

            match listing.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "gcs"
    }
}
