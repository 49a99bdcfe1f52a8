//! Azure Content Understanding client for image descriptions
//!
//! Manages a custom image analyzer and runs analyses through the service's
//! long-running operation protocol: a request returns an `Operation-Location`
//! handle that is polled until the operation leaves the `Running` state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{header::CONTENT_TYPE, Client, Response, StatusCode};
use serde_json::{json, Value};
use tracing::{Instrument, Span};

use super::poll::{classify_status, poll_until_done, PollPolicy};
use crate::error::{Error, Result};
use crate::providers::TokenCredential;

/// REST API version used for every request
pub const CU_API_VERSION: &str = "2024-12-01-preview";

/// Token scope for Cognitive Services
pub const COGNITIVE_SERVICES_SCOPE: &str = "https://cognitiveservices.azure.com/.default";

/// Identifier of the custom image analyzer
pub const ANALYZER_ID: &str = "image_analyzer";

/// Schema of the custom image analyzer
pub fn analyzer_schema() -> Value {
    json!({
        "analyzerId": ANALYZER_ID,
        "name": "Image understanding",
        "description": "Extract detailed structured information from images extracted from documents.",
        "baseAnalyzerId": "prebuilt-image",
        "scenario": "image",
        "config": {"returnDetails": false},
        "fieldSchema": {
            "name": "ImageInformation",
            "descriptions": "Description of image.",
            "fields": {
                "Description": {
                    "type": "string",
                    "description": "Description of the image. If the image has a title, start with the title. \
                        Include a 2-sentence summary. If the image is a chart, diagram, or table, include the \
                        underlying data in an HTML table tag, with accurate numbers. If the image is a chart, \
                        describe any axis or legends. The only allowed HTML tags are the table/thead/tr/td/tbody tags."
                }
            }
        }
    })
}

/// Produces a text description of an image
#[async_trait]
pub trait MediaDescriber: Send + Sync {
    async fn describe_image(&self, image_bytes: &[u8]) -> Result<String>;
}

/// Content Understanding client
pub struct ContentUnderstandingDescriber {
    endpoint: String,
    credential: Arc<dyn TokenCredential>,
    client: Client,
    poll_policy: PollPolicy,
    span: Span,
}

impl ContentUnderstandingDescriber {
    /// Create a client for the service at `endpoint`
    pub fn new(endpoint: impl Into<String>, credential: Arc<dyn TokenCredential>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            credential,
            client,
            poll_policy: PollPolicy::default(),
            span: Span::none(),
        })
    }

    pub fn with_poll_policy(mut self, poll_policy: PollPolicy) -> Self {
        self.poll_policy = poll_policy;
        self
    }

    /// Emit log events inside `span`
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn analyzer_url(&self) -> String {
        format!("{}/contentunderstanding/analyzers/{}", self.endpoint, ANALYZER_ID)
    }

    /// Create the image analyzer unless it already exists
    pub async fn create_analyzer(&self) -> Result<()> {
        async {
            tracing::info!("Creating analyzer '{}'...", ANALYZER_ID);
            let token = self.credential.get_token(COGNITIVE_SERVICES_SCOPE).await?;

            let response = self
                .client
                .put(self.analyzer_url())
                .query(&[("api-version", CU_API_VERSION)])
                .bearer_auth(&token)
                .json(&analyzer_schema())
                .send()
                .await?;

            match response.status() {
                StatusCode::CONFLICT => {
                    tracing::info!("Analyzer '{}' already exists.", ANALYZER_ID);
                    Ok(())
                }
                StatusCode::CREATED => {
                    let poll_url = operation_location(&response)?;
                    self.poll_operation(&poll_url, &token, "Creating analyzer...")
                        .await?;
                    tracing::info!("Analyzer '{}' created.", ANALYZER_ID);
                    Ok(())
                }
                status => {
                    let body = response.text().await.unwrap_or_default();
                    Err(Error::AnalyzerCreation {
                        status: status.as_u16(),
                        body,
                    })
                }
            }
        }
        .instrument(self.span.clone())
        .await
    }

    async fn poll_operation(&self, poll_url: &str, token: &str, message: &'static str) -> Result<Value> {
        let spinner = spinner(message);
        let result = poll_until_done(self.poll_policy, || {
            let request = self.client.get(poll_url).bearer_auth(token);
            async move {
                let body: Value = request.send().await?.error_for_status()?.json().await?;
                Ok(classify_status(body))
            }
        })
        .await;
        spinner.finish_and_clear();
        result
    }
}

#[async_trait]
impl MediaDescriber for ContentUnderstandingDescriber {
    async fn describe_image(&self, image_bytes: &[u8]) -> Result<String> {
        async {
            tracing::info!("Sending image to Azure Content Understanding service...");
            let token = self.credential.get_token(COGNITIVE_SERVICES_SCOPE).await?;

            let response = self
                .client
                .post(format!("{}:analyze", self.analyzer_url()))
                .query(&[("api-version", CU_API_VERSION)])
                .bearer_auth(&token)
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(image_bytes.to_vec())
                .send()
                .await?
                .error_for_status()?;

            let poll_url = operation_location(&response)?;
            let results = self.poll_operation(&poll_url, &token, "Processing...").await?;
            extract_description(&results)
        }
        .instrument(self.span.clone())
        .await
    }
}

fn operation_location(response: &Response) -> Result<String> {
    response
        .headers()
        .get("Operation-Location")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| Error::format("response is missing the Operation-Location header"))
}

/// Pull the description field out of a completed analysis
pub fn extract_description(results: &Value) -> Result<String> {
    results
        .pointer("/result/contents/0/fields/Description/valueString")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::format("analysis result has no Description field"))
}

fn spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} [{elapsed}]") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}
