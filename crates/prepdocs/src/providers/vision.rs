//! Image embeddings from the Azure AI Vision retrieval API

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::credential::TokenCredential;
use super::embedding::ImageEmbeddings;
use super::http::build_client;
use crate::config::ImageEmbeddingsConfig;
use crate::enrichment::content_understanding::COGNITIVE_SERVICES_SCOPE;
use crate::error::{Error, Result};

/// Vectorizes images by URL, one request per image
pub struct VisionImageEmbeddings {
    client: Client,
    endpoint: String,
    api_version: String,
    model_version: String,
    credential: Arc<dyn TokenCredential>,
}

#[derive(Deserialize)]
struct VectorizeResponse {
    vector: Vec<f32>,
}

impl VisionImageEmbeddings {
    pub fn new(
        endpoint: impl Into<String>,
        config: &ImageEmbeddingsConfig,
        credential: Arc<dyn TokenCredential>,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(60)?,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            model_version: config.model_version.clone(),
            credential,
        })
    }
}

#[async_trait]
impl ImageEmbeddings for VisionImageEmbeddings {
    async fn create_embeddings(&self, blob_urls: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/computervision/retrieval:vectorizeImage", self.endpoint);
        let token = self.credential.get_token(COGNITIVE_SERVICES_SCOPE).await?;

        let mut embeddings = Vec::with_capacity(blob_urls.len());
        for blob_url in blob_urls {
            let response = self
                .client
                .post(&url)
                .query(&[
                    ("api-version", self.api_version.as_str()),
                    ("model-version", self.model_version.as_str()),
                ])
                .bearer_auth(&token)
                .json(&json!({ "url": blob_url }))
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(Error::embedding(format!(
                    "Image vectorization failed: HTTP {} - {}",
                    status, body
                )));
            }

            let vectorized: VectorizeResponse = response.json().await?;
            embeddings.push(vectorized.vector);
        }

        Ok(embeddings)
    }
}
