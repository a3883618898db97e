use super::{EmbeddingError, EmbeddingProvider, ModelInfo, known_dimension, status_error};
use crate::{config::EmbeddingConfig, provider::Connection};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default local Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Embedding provider backed by an Ollama runtime.
pub struct OllamaEmbedding {
    base_url: String,
    model: String,
    dimension: usize,
    timeout: Duration,
    http: Connection<Client>,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TaggedModel>,
}

#[derive(Deserialize)]
struct TaggedModel {
    name: String,
}

impl OllamaEmbedding {
    /// Construct a provider from configuration. No network traffic happens until `initialize`.
    pub fn new(config: &EmbeddingConfig, timeout: Duration) -> Self {
        let base_url = config
            .base_url_or(DEFAULT_OLLAMA_URL)
            .trim_end_matches('/')
            .to_string();
        Self {
            base_url,
            model: config.model.clone(),
            dimension: known_dimension(&config.model).unwrap_or(config.dimensions),
            timeout,
            http: Connection::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn build_client(&self) -> Result<Client, EmbeddingError> {
        Client::builder()
            .user_agent("docsearch/embedding")
            .timeout(self.timeout)
            .build()
            .map_err(|error| EmbeddingError::InvalidConfig(error.to_string()))
    }

    async fn probe_model(&self, http: &Client) -> Result<(), EmbeddingError> {
        let endpoint = self.endpoint("/api/tags");
        let response = http
            .get(&endpoint)
            .send()
            .await
            .map_err(|source| EmbeddingError::Request { endpoint, source })?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|error| EmbeddingError::InvalidResponse(error.to_string()))?;

        if tags.models.iter().any(|tagged| tagged.name.contains(&self.model)) {
            Ok(())
        } else {
            Err(EmbeddingError::ModelUnavailable {
                model: self.model.clone(),
                base_url: self.base_url.clone(),
            })
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedding {
    async fn initialize(&self) -> Result<(), EmbeddingError> {
        let http = self.build_client()?;
        self.probe_model(&http).await?;
        self.http.install(http);
        tracing::info!(
            provider = "ollama",
            model = %self.model,
            base_url = %self.base_url,
            dimension = self.dimension,
            "Embedding provider initialized"
        );
        Ok(())
    }

    async fn health_check(&self) -> Result<(), EmbeddingError> {
        match self.http.get() {
            Some(http) => self.probe_model(&http).await,
            None => self.probe_model(&self.build_client()?).await,
        }
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let http = self.http.get().ok_or(EmbeddingError::NotInitialized)?;
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(
            provider = "ollama",
            model = %self.model,
            texts = texts.len(),
            "Generating embeddings"
        );

        let endpoint = self.endpoint("/api/embed");
        let response = http
            .post(&endpoint)
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|source| EmbeddingError::Request { endpoint, source })?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|error| EmbeddingError::InvalidResponse(error.to_string()))?;

        if body.embeddings.iter().any(Vec::is_empty) {
            return Err(EmbeddingError::EmptyResponse);
        }
        if body.embeddings.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: body.embeddings.len(),
            });
        }

        Ok(body.embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "ollama".into(),
            model: self.model.clone(),
            base_url: Some(self.base_url.clone()),
            dimensions: self.dimension,
        }
    }

    async fn close(&self) {
        if self.http.release() {
            tracing::debug!(provider = "ollama", "Embedding provider closed");
        }
    }
}
