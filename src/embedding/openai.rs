use super::{EmbeddingError, EmbeddingProvider, ModelInfo, known_dimension, status_error};
use crate::{config::EmbeddingConfig, provider::Connection};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default OpenAI API root.
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Embedding provider backed by the OpenAI embeddings API.
pub struct OpenAiEmbedding {
    base_url: String,
    api_key: String,
    model: String,
    dimension: usize,
    timeout: Duration,
    http: Connection<Client>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl OpenAiEmbedding {
    /// Construct a provider from configuration. An API key is mandatory.
    pub fn new(config: &EmbeddingConfig, timeout: Duration) -> Result<Self, EmbeddingError> {
        let api_key = config.api_key().ok_or_else(|| {
            EmbeddingError::InvalidConfig("OpenAI embeddings require an API key".into())
        })?;
        Ok(Self {
            base_url: config
                .base_url_or(DEFAULT_OPENAI_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.to_string(),
            model: config.model.clone(),
            dimension: known_dimension(&config.model).unwrap_or(config.dimensions),
            timeout,
            http: Connection::new(),
        })
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
        let endpoint = self.endpoint(&format!("/models/{}", self.model));
        let response = http
            .get(&endpoint)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|source| EmbeddingError::Request { endpoint, source })?;

        match response.status() {
            status if status.is_success() => Ok(()),
            reqwest::StatusCode::NOT_FOUND => Err(EmbeddingError::ModelUnavailable {
                model: self.model.clone(),
                base_url: self.base_url.clone(),
            }),
            _ => Err(api_error(response).await),
        }
    }
}

/// Prefer the structured OpenAI error message over the raw body.
async fn api_error(response: reqwest::Response) -> EmbeddingError {
    match status_error(response).await {
        EmbeddingError::UnexpectedStatus { status, body } => {
            let body = serde_json::from_str::<ErrorResponse>(&body)
                .map(|parsed| parsed.error.message)
                .unwrap_or(body);
            EmbeddingError::UnexpectedStatus { status, body }
        }
        other => other,
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn initialize(&self) -> Result<(), EmbeddingError> {
        let http = self.build_client()?;
        self.probe_model(&http).await?;
        self.http.install(http);
        tracing::info!(
            provider = "openai",
            model = %self.model,
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
            provider = "openai",
            model = %self.model,
            texts = texts.len(),
            "Generating embeddings"
        );

        let endpoint = self.endpoint("/embeddings");
        let response = http
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|source| EmbeddingError::Request { endpoint, source })?;

        if !response.status().is_success() {
            let error = api_error(response).await;
            tracing::error!(provider = "openai", error = %error, "Embedding request rejected");
            return Err(error);
        }

        let mut body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|error| EmbeddingError::InvalidResponse(error.to_string()))?;

        if body.data.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: body.data.len(),
            });
        }
        body.data.sort_by_key(|item| item.index);
        if body.data.iter().any(|item| item.embedding.is_empty()) {
            return Err(EmbeddingError::EmptyResponse);
        }

        Ok(body.data.into_iter().map(|item| item.embedding).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "openai".into(),
            model: self.model.clone(),
            base_url: Some(self.base_url.clone()),
            dimensions: self.dimension,
        }
    }

    async fn close(&self) {
        self.http.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn config(base_url: &str, api_key: Option<&str>) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: "openai".into(),
            model: "text-embedding-3-small".into(),
            base_url: base_url.into(),
            api_key: api_key.map(str::to_string),
            dimensions: 1024,
        }
    }

    #[test]
    fn missing_api_key_is_rejected() {
        let result = OpenAiEmbedding::new(&config("", Some("  ")), Duration::from_secs(1));
        assert!(matches!(result, Err(EmbeddingError::InvalidConfig(_))));
    }

    #[test]
    fn blank_base_url_uses_public_endpoint() {
        let provider =
            OpenAiEmbedding::new(&config("", Some("sk-test")), Duration::from_secs(1))
                .expect("provider");
        let info = provider.model_info();
        assert_eq!(info.base_url.as_deref(), Some(DEFAULT_OPENAI_URL));
        assert_eq!(info.dimensions, 1536);
    }

    #[tokio::test]
    async fn embeddings_are_reordered_by_index() {
        let server = MockServer::start_async().await;
        let model = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/models/text-embedding-3-small")
                    .header("authorization", "Bearer sk-test");
                then.status(200).json_body(json!({ "id": "text-embedding-3-small" }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/embeddings")
                    .header("authorization", "Bearer sk-test");
                then.status(200).json_body(json!({
                    "data": [
                        { "index": 1, "embedding": [0.0, 1.0] },
                        { "index": 0, "embedding": [1.0, 0.0] }
                    ]
                }));
            })
            .await;

        let provider = OpenAiEmbedding::new(
            &config(&server.base_url(), Some("sk-test")),
            Duration::from_secs(5),
        )
        .expect("provider");
        provider.initialize().await.expect("initialize");
        model.assert();

        let vectors = provider
            .embed_texts(&["first".to_string(), "second".to_string()])
            .await
            .expect("vectors");
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn api_error_message_is_extracted() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/models/text-embedding-3-small");
                then.status(401)
                    .json_body(json!({ "error": { "message": "Incorrect API key" } }));
            })
            .await;

        let provider = OpenAiEmbedding::new(
            &config(&server.base_url(), Some("sk-bad")),
            Duration::from_secs(5),
        )
        .expect("provider");
        let error = provider.initialize().await.expect_err("unauthorized");
        match error {
            EmbeddingError::UnexpectedStatus { status, body } => {
                assert_eq!(status.as_u16(), 401);
                assert_eq!(body, "Incorrect API key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
