//! Retrieval-augmented chat over indexed files.
//!
//! Chunks are retrieved through the search service, packed into a bounded context and handed
//! to a text-generation provider together with the user's question.

mod context;
mod ollama;
pub mod prompt;
mod service;

pub use context::{BuiltContext, ContextBuilder, TokenEstimator};
pub use ollama::OllamaChat;
pub use service::{ChatError, ChatReply, ChatService, SourceChunk};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by text-generation providers.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// An operation ran before `initialize` (or after `close`).
    #[error("Chat provider not initialized")]
    NotInitialized,
    /// The transport failed before a response was received.
    #[error("Generation request to {endpoint} failed: {source}")]
    Request {
        /// Endpoint that was called.
        endpoint: String,
        /// Underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },
    /// The backend answered with a non-success status.
    #[error("Generation backend returned {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the backend.
        status: StatusCode,
        /// Response body for diagnostics.
        body: String,
    },
    /// The configured model is not served by the backend.
    #[error("Chat model '{model}' is not available at {base_url}")]
    ModelUnavailable {
        /// Model that was requested.
        model: String,
        /// Backend that was probed.
        base_url: String,
    },
    /// Provider response could not be parsed or was incomplete.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
    /// Provider settings are unusable.
    #[error("Invalid chat configuration: {0}")]
    InvalidConfig(String),
}

/// Descriptive information about the active chat model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatModelInfo {
    /// Provider name.
    pub provider: String,
    /// Model identifier.
    pub model: String,
    /// Endpoint the provider talks to.
    pub base_url: String,
}

/// Interface implemented by text-generation backends.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Open the backend connection and verify the configured model is available.
    async fn initialize(&self) -> Result<(), GenerationError>;

    /// Probe the backend.
    async fn health_check(&self) -> Result<(), GenerationError>;

    /// Answer `message` using `context` as the only source of facts.
    async fn generate_response(
        &self,
        context: &str,
        message: &str,
    ) -> Result<String, GenerationError>;

    /// Provider and model description.
    fn model_info(&self) -> ChatModelInfo;

    /// Release the backend connection.
    async fn close(&self) {}
}
