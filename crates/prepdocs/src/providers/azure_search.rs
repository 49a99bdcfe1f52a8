//! Azure AI Search index over the REST API

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Map, Value};
use std::sync::Arc;

use super::credential::AzureCredential;
use super::embedding::EmbeddingProvider;
use super::http::build_client;
use super::search::{
    documents_for_sections, embed_documents, SearchDocument, SearchManager, MAX_BATCH_SIZE,
};
use crate::config::SearchConfig;
use crate::error::{Error, Result};
use crate::types::file::basename;
use crate::types::Section;

const SEARCH_SCOPE: &str = "https://search.azure.com/.default";

/// Search manager for an Azure AI Search service
pub struct AzureSearchManager {
    client: Client,
    endpoint: String,
    index_name: String,
    api_version: String,
    analyzer_name: Option<String>,
    embedding_field: String,
    credential: AzureCredential,
    use_acls: bool,
    search_images: bool,
    embeddings: Option<Arc<dyn EmbeddingProvider>>,
}

impl AzureSearchManager {
    pub fn new(config: &SearchConfig, credential: AzureCredential) -> Result<Self> {
        let service = config
            .service
            .as_deref()
            .ok_or_else(|| Error::config("search.service is required for the azure backend"))?;

        Ok(Self {
            client: build_client(60)?,
            endpoint: format!("https://{}.search.windows.net", service),
            index_name: config.index_name.clone(),
            api_version: config.api_version.clone(),
            analyzer_name: config.analyzer_name.clone(),
            embedding_field: config.embedding_field.clone(),
            credential,
            use_acls: false,
            search_images: false,
            embeddings: None,
        })
    }

    /// Point at a custom endpoint (sovereign clouds, test doubles)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_acls(mut self, use_acls: bool) -> Self {
        self.use_acls = use_acls;
        self
    }

    pub fn with_image_field(mut self, search_images: bool) -> Self {
        self.search_images = search_images;
        self
    }

    pub fn with_embeddings(mut self, embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        self.embeddings = Some(embeddings);
        self
    }

    fn index_url(&self) -> String {
        format!("{}/indexes/{}", self.endpoint, self.index_name)
    }

    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let request = request.query(&[("api-version", self.api_version.as_str())]);
        Ok(match &self.credential {
            AzureCredential::Key(key) => request.header("api-key", key),
            AzureCredential::Token(credential) => {
                request.bearer_auth(credential.get_token(SEARCH_SCOPE).await?)
            }
        })
    }

    async fn send_json(&self, request: RequestBuilder, body: &Value) -> Result<Value> {
        let response = self.authorize(request).await?.json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::search(format!("HTTP {} - {}", status, text)));
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        Ok(response.json().await?)
    }

    /// Index definition with the metadata fields
    pub fn index_definition(&self) -> Value {
        let mut content = json!({"name": "content", "type": "Edm.String", "searchable": true});
        if let Some(analyzer) = &self.analyzer_name {
            content["analyzer"] = json!(analyzer);
        }

        let filterable = |name: &str| {
            json!({"name": name, "type": "Edm.String", "filterable": true, "facetable": true})
        };

        let mut fields = vec![
            json!({"name": "id", "type": "Edm.String", "key": true}),
            content,
            filterable("category"),
            filterable("sourcepage"),
            filterable("sourcefile"),
            json!({"name": "storageUrl", "type": "Edm.String", "filterable": true, "facetable": false}),
            filterable("planid"),
            filterable("doctype"),
            filterable("locale"),
        ];

        if let Some(embeddings) = &self.embeddings {
            fields.push(json!({
                "name": self.embedding_field,
                "type": "Collection(Edm.Single)",
                "searchable": true,
                "dimensions": embeddings.dimensions(),
                "vectorSearchProfile": "embedding_config"
            }));
        }
        if self.search_images {
            fields.push(json!({
                "name": "imageEmbedding",
                "type": "Collection(Edm.Single)",
                "searchable": true,
                "dimensions": 1024,
                "vectorSearchProfile": "embedding_config"
            }));
        }
        if self.use_acls {
            for name in ["oids", "groups"] {
                fields.push(json!({"name": name, "type": "Collection(Edm.String)", "filterable": true}));
            }
        }

        json!({
            "name": self.index_name,
            "fields": fields,
            "vectorSearch": {
                "algorithms": [{"name": "hnsw_config", "kind": "hnsw", "hnswParameters": {"metric": "cosine"}}],
                "profiles": [{"name": "embedding_config", "algorithm": "hnsw_config"}]
            }
        })
    }

    fn to_action(&self, document: SearchDocument) -> Result<Value> {
        let Value::Object(mut object) = serde_json::to_value(document)? else {
            return Err(Error::internal("search document did not serialize to an object"));
        };
        if self.embedding_field != "embedding" {
            if let Some(embedding) = object.remove("embedding") {
                object.insert(self.embedding_field.clone(), embedding);
            }
        }
        if !self.use_acls {
            object.remove("oids");
            object.remove("groups");
        }
        let mut action = Map::new();
        action.insert("@search.action".to_string(), json!("mergeOrUpload"));
        action.extend(object);
        Ok(Value::Object(action))
    }
}

/// OData string literal with quotes escaped
fn odata_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[async_trait]
impl SearchManager for AzureSearchManager {
    async fn create_index(&self) -> Result<()> {
        let response = self
            .authorize(self.client.get(self.index_url()))
            .await?
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                tracing::info!("Search index {} already exists", self.index_name);
                Ok(())
            }
            StatusCode::NOT_FOUND => {
                tracing::info!("Creating {} search index", self.index_name);
                self.send_json(self.client.put(self.index_url()), &self.index_definition())
                    .await?;
                Ok(())
            }
            status => {
                let text = response.text().await.unwrap_or_default();
                Err(Error::search(format!("HTTP {} - {}", status, text)))
            }
        }
    }

    async fn update_content(
        &self,
        sections: &[Section],
        image_embeddings: Option<&[Vec<f32>]>,
        url: Option<&str>,
    ) -> Result<()> {
        let docs_url = format!("{}/docs/index", self.index_url());

        for (batch_index, batch) in sections.chunks(MAX_BATCH_SIZE).enumerate() {
            let mut documents = documents_for_sections(
                batch,
                batch_index * MAX_BATCH_SIZE,
                image_embeddings,
                url,
                self.use_acls,
            );
            if let Some(embeddings) = &self.embeddings {
                embed_documents(&mut documents, embeddings.as_ref()).await?;
            }

            let actions = documents
                .into_iter()
                .map(|doc| self.to_action(doc))
                .collect::<Result<Vec<_>>>()?;
            self.send_json(self.client.post(&docs_url), &json!({ "value": actions }))
                .await?;
        }

        Ok(())
    }

    async fn remove_content(&self, path: Option<&str>, only_oid: Option<&str>) -> Result<()> {
        tracing::info!(
            "Removing sections from '{}' from search index '{}'",
            path.unwrap_or("<all>"),
            self.index_name
        );
        let filter = path.map(|path| format!("sourcefile eq {}", odata_literal(&basename(path))));
        let search_url = format!("{}/docs/search", self.index_url());
        let docs_url = format!("{}/docs/index", self.index_url());

        loop {
            let mut query = json!({"search": "", "top": MAX_BATCH_SIZE, "select": "id"});
            if let Some(filter) = &filter {
                query["filter"] = json!(filter);
            }
            if self.use_acls {
                query["select"] = json!("id,oids");
            }

            let results = self.send_json(self.client.post(&search_url), &query).await?;
            let hits = results["value"].as_array().cloned().unwrap_or_default();
            if hits.is_empty() {
                break;
            }

            let removals: Vec<Value> = hits
                .iter()
                .filter(|hit| match only_oid {
                    Some(oid) => hit["oids"].as_array().is_some_and(|oids| {
                        oids.len() == 1 && oids[0].as_str() == Some(oid)
                    }),
                    None => true,
                })
                .map(|hit| json!({"@search.action": "delete", "id": hit["id"]}))
                .collect();
            if removals.is_empty() {
                break;
            }

            let count = removals.len();
            self.send_json(self.client.post(&docs_url), &json!({ "value": removals }))
                .await?;
            tracing::info!("Removed {} sections from index", count);

            // Filtered hits stay in the result set, so stop after a partial page
            if count < hits.len() || hits.len() < MAX_BATCH_SIZE {
                break;
            }
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "azure-search"
    }
}
