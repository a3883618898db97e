//! HTTP client wrapper for interacting with Qdrant.

use crate::config::VectorDbConfig;
use crate::document::{Document, SearchResult};
use crate::provider::Connection;
use crate::qdrant::{
    filters::file_id_filter,
    payload::{build_payload, point_id, search_result_from_payload},
    types::{CollectionResponse, QdrantError, QueryResponse},
};
use crate::vector_store::{CollectionInfo, VectorDbError, VectorStore, ensure_matching_lengths};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;

/// Vector store backed by the Qdrant REST API.
pub struct QdrantStore {
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    http: Connection<Client>,
}

impl QdrantStore {
    /// Construct a store from configuration. No network traffic happens until `initialize`.
    pub fn new(config: &VectorDbConfig) -> Result<Self, VectorDbError> {
        let base_url = normalize_base_url(&config.url).map_err(|error| {
            VectorDbError::InvalidConfig(QdrantError::InvalidUrl(error).to_string())
        })?;
        Ok(Self {
            base_url,
            api_key: config.api_key().map(str::to_string),
            timeout: Duration::from_secs(config.timeout),
            http: Connection::new(),
        })
    }

    fn client(&self) -> Result<std::sync::Arc<Client>, VectorDbError> {
        self.http.get().ok_or(VectorDbError::NotInitialized)
    }

    fn request(&self, http: &Client, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = http.request(method, url);
        if let Some(api_key) = &self.api_key {
            req = req.header("api-key", api_key);
        }
        req
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), QdrantError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            Err(status_error(response).await)
        }
    }

    async fn list_collections(&self, http: &Client) -> Result<(), QdrantError> {
        let response = self.request(http, Method::GET, "collections").send().await?;
        self.ensure_success(response, || {}).await
    }

    async fn collection_exists(
        &self,
        http: &Client,
        collection_name: &str,
    ) -> Result<bool, QdrantError> {
        let response = self
            .request(http, Method::GET, &format!("collections/{collection_name}"))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(status_error(response).await),
        }
    }

    async fn query_points(
        &self,
        collection_name: &str,
        vector: &[f32],
        filter: Option<Value>,
        limit: usize,
    ) -> Result<Vec<SearchResult>, VectorDbError> {
        let http = self.client()?;
        let mut body = json!({
            "query": vector,
            "limit": limit,
            "with_payload": true,
        });
        if let (Some(filter), Value::Object(obj)) = (filter, &mut body) {
            obj.insert("filter".into(), filter);
        }

        let result = async {
            let response = self
                .request(
                    &http,
                    Method::POST,
                    &format!("collections/{collection_name}/points/query"),
                )
                .json(&body)
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(status_error(response).await);
            }
            Ok::<QueryResponse, QdrantError>(response.json().await?)
        }
        .await;

        let payload = result.map_err(|error| {
            tracing::error!(collection = collection_name, error = %error, "Qdrant search failed");
            VectorDbError::Backend {
                operation: "search documents",
                source: error,
            }
        })?;

        Ok(payload
            .result
            .into_points()
            .into_iter()
            .map(|point| search_result_from_payload(point.score, point.payload))
            .collect())
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn initialize(&self) -> Result<(), VectorDbError> {
        let http = Client::builder()
            .user_agent("docsearch/qdrant")
            .timeout(self.timeout)
            .build()
            .map_err(|error| VectorDbError::backend("initialize Qdrant client")(error.into()))?;
        self.list_collections(&http)
            .await
            .map_err(VectorDbError::backend("initialize Qdrant client"))?;
        self.http.install(http);

        tracing::debug!(
            url = %self.base_url,
            has_api_key = self.api_key.is_some(),
            timeout_secs = self.timeout.as_secs(),
            "Initialized Qdrant HTTP client"
        );
        Ok(())
    }

    async fn health_check(&self) -> Result<(), VectorDbError> {
        let http = self.client()?;
        self.list_collections(&http)
            .await
            .map_err(VectorDbError::backend("reach Qdrant"))
    }

    async fn close(&self) {
        if self.http.release() {
            tracing::debug!(url = %self.base_url, "Qdrant client closed");
        }
    }

    async fn create_collection(
        &self,
        collection_name: &str,
        dimension: usize,
    ) -> Result<(), VectorDbError> {
        let http = self.client()?;
        let operation = "create collection";

        if self
            .collection_exists(&http, collection_name)
            .await
            .map_err(VectorDbError::backend(operation))?
        {
            tracing::debug!(collection = collection_name, "Collection already exists");
            return Ok(());
        }

        tracing::debug!(collection = collection_name, dimension, "Creating collection");
        let body = json!({
            "vectors": {
                "size": dimension,
                "distance": "Cosine"
            }
        });
        let response = self
            .request(&http, Method::PUT, &format!("collections/{collection_name}"))
            .json(&body)
            .send()
            .await
            .map_err(|error| VectorDbError::backend(operation)(error.into()))?;

        if response.status() == StatusCode::CONFLICT {
            tracing::debug!(
                collection = collection_name,
                "Collection created concurrently, continuing"
            );
            return Ok(());
        }

        self.ensure_success(response, || {
            tracing::info!(collection = collection_name, dimension, "Collection created");
        })
        .await
        .map_err(VectorDbError::backend(operation))
    }

    async fn upsert(
        &self,
        collection_name: &str,
        documents: &[Document],
        embeddings: &[Vec<f32>],
    ) -> Result<(), VectorDbError> {
        let http = self.client()?;
        ensure_matching_lengths(documents, embeddings)?;
        if documents.is_empty() {
            return Ok(());
        }

        let points: Vec<Value> = documents
            .iter()
            .zip(embeddings)
            .map(|(document, vector)| {
                json!({
                    "id": point_id(&document.file_id, &document.content).to_string(),
                    "vector": vector,
                    "payload": build_payload(document),
                })
            })
            .collect();

        let point_count = points.len();
        let operation = "upsert documents";
        let response = self
            .request(
                &http,
                Method::PUT,
                &format!("collections/{collection_name}/points"),
            )
            .query(&[("wait", true)])
            .json(&json!({ "points": points }))
            .send()
            .await
            .map_err(|error| VectorDbError::backend(operation)(error.into()))?;

        self.ensure_success(response, || {
            tracing::debug!(
                collection = collection_name,
                points = point_count,
                "Points upserted"
            );
        })
        .await
        .map_err(VectorDbError::backend(operation))
    }

    async fn search(
        &self,
        collection_name: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>, VectorDbError> {
        self.query_points(collection_name, vector, None, limit).await
    }

    async fn search_with_filter(
        &self,
        collection_name: &str,
        vector: &[f32],
        file_ids: &[String],
        limit: usize,
    ) -> Result<Vec<SearchResult>, VectorDbError> {
        self.client()?;
        let Some(filter) = file_id_filter(file_ids) else {
            tracing::debug!(collection = collection_name, "No file ids supplied, skipping search");
            return Ok(Vec::new());
        };
        self.query_points(collection_name, vector, Some(filter), limit)
            .await
    }

    async fn delete_documents(
        &self,
        collection_name: &str,
        file_ids: &[String],
    ) -> Result<(), VectorDbError> {
        let http = self.client()?;
        let Some(filter) = file_id_filter(file_ids) else {
            return Ok(());
        };

        let operation = "delete documents";
        let response = self
            .request(
                &http,
                Method::POST,
                &format!("collections/{collection_name}/points/delete"),
            )
            .query(&[("wait", true)])
            .json(&json!({ "filter": filter }))
            .send()
            .await
            .map_err(|error| VectorDbError::backend(operation)(error.into()))?;

        self.ensure_success(response, || {
            tracing::debug!(
                collection = collection_name,
                files = file_ids.len(),
                "Points deleted"
            );
        })
        .await
        .map_err(VectorDbError::backend(operation))
    }

    async fn get_collection_info(
        &self,
        collection_name: &str,
    ) -> Result<CollectionInfo, VectorDbError> {
        let http = self.client()?;
        let operation = "get collection info";
        let response = self
            .request(&http, Method::GET, &format!("collections/{collection_name}"))
            .send()
            .await
            .map_err(|error| VectorDbError::backend(operation)(error.into()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(VectorDbError::CollectionNotFound(collection_name.to_string()));
        }
        if !response.status().is_success() {
            return Err(VectorDbError::backend(operation)(status_error(response).await));
        }

        let CollectionResponse { result } = response
            .json()
            .await
            .map_err(|error| VectorDbError::backend(operation)(error.into()))?;
        let config = result.config.map_or(Value::Null, |config| {
            json!({
                "params": config.params,
                "hnsw_config": config.hnsw_config,
                "optimizer_config": config.optimizer_config,
            })
        });

        Ok(CollectionInfo {
            name: collection_name.to_string(),
            status: result.status.unwrap_or_else(|| "unknown".into()),
            vectors_count: result.vectors_count.or(result.points_count).unwrap_or(0),
            config,
        })
    }
}

async fn status_error(response: reqwest::Response) -> QdrantError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let error = QdrantError::UnexpectedStatus { status, body };
    tracing::error!(error = %error, "Qdrant request failed");
    error
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
