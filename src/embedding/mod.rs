//! Embedding providers: turn text into fixed-dimension vectors.

mod hash;
mod ollama;
mod openai;

pub use hash::HashEmbedding;
pub use ollama::OllamaEmbedding;
pub use openai::OpenAiEmbedding;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// An operation ran before `initialize` (or after `close`).
    #[error("Embedding provider not initialized")]
    NotInitialized,
    /// The transport failed before a response was received.
    #[error("Embedding request to {endpoint} failed: {source}")]
    Request {
        /// Endpoint that was called.
        endpoint: String,
        /// Underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },
    /// The backend answered with a non-success status.
    #[error("Embedding backend returned {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the backend.
        status: StatusCode,
        /// Response body for diagnostics.
        body: String,
    },
    /// The configured model is not served by the backend.
    #[error("Embedding model '{model}' is not available at {base_url}")]
    ModelUnavailable {
        /// Model that was requested.
        model: String,
        /// Backend that was probed.
        base_url: String,
    },
    /// The backend answered without any vector.
    #[error("No embedding returned from the backend")]
    EmptyResponse,
    /// The backend returned a different number of vectors than inputs.
    #[error("Expected {expected} embeddings, received {actual}")]
    CountMismatch {
        /// Number of inputs submitted.
        expected: usize,
        /// Number of vectors received.
        actual: usize,
    },
    /// The response body could not be decoded.
    #[error("Malformed embedding response: {0}")]
    InvalidResponse(String),
    /// Provider settings cannot produce embeddings.
    #[error("Invalid embedding configuration: {0}")]
    InvalidConfig(String),
}

/// Descriptive information about the active embedding model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    /// Provider name.
    pub provider: String,
    /// Model identifier.
    pub model: String,
    /// Endpoint the provider talks to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Output dimensionality.
    pub dimensions: usize,
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Open the backend connection and verify the configured model is available.
    async fn initialize(&self) -> Result<(), EmbeddingError>;

    /// Probe the backend without changing provider state.
    async fn health_check(&self) -> Result<(), EmbeddingError>;

    /// Produce one vector per input, preserving order. Empty input yields empty output.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Produce the vector for a single text.
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_texts(&[text.to_string()]).await?;
        vectors.pop().ok_or(EmbeddingError::EmptyResponse)
    }

    /// Dimensionality of produced vectors.
    fn dimension(&self) -> usize;

    /// Provider and model description.
    fn model_info(&self) -> ModelInfo;

    /// Release the backend connection.
    async fn close(&self) {}
}

/// Output size of well-known embedding models, matched by substring of the model name.
pub fn known_dimension(model: &str) -> Option<usize> {
    const KNOWN_MODELS: [(&str, usize); 8] = [
        ("bge-m3", 1024),
        ("nomic-embed-text", 768),
        ("mxbai-embed-large", 1024),
        ("snowflake-arctic-embed", 1024),
        ("all-minilm", 384),
        ("text-embedding-3-small", 1536),
        ("text-embedding-3-large", 3072),
        ("text-embedding-ada-002", 1536),
    ];
    let model = model.to_lowercase();
    KNOWN_MODELS
        .iter()
        .find(|(name, _)| model.contains(name))
        .map(|(_, dimension)| *dimension)
}

/// Read a failing response into [`EmbeddingError::UnexpectedStatus`].
pub(crate) async fn status_error(response: reqwest::Response) -> EmbeddingError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    EmbeddingError::UnexpectedStatus { status, body }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_dimension_matches_tagged_models() {
        assert_eq!(known_dimension("bge-m3:latest"), Some(1024));
        assert_eq!(known_dimension("nomic-embed-text"), Some(768));
        assert_eq!(known_dimension("text-embedding-3-large"), Some(3072));
        assert_eq!(known_dimension("custom-model"), None);
    }

    #[tokio::test]
    async fn embed_text_defaults_to_batch_call() {
        let provider = HashEmbedding::new(8);
        let single = provider.embed_text("attention").await.expect("vector");
        let batch = provider
            .embed_texts(&["attention".to_string()])
            .await
            .expect("vectors");
        assert_eq!(batch, vec![single]);
    }
}
