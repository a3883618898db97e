use super::{
    ChatModelInfo, ChatProvider, ContextBuilder, GenerationError,
    prompt::{EMPTY_ANSWER_FALLBACK, NO_CONTEXT_ANSWER},
};
use crate::health::{DependencyHealth, HealthReport};
use crate::search::{SearchError, SearchService};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Failure of a chat turn. No partial answer is ever returned.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The generation provider could not be started.
    #[error("Failed to initialize chat service: {0}")]
    Initialize(#[source] GenerationError),
    /// Chunk retrieval failed.
    #[error("Failed to chat with files: {0}")]
    Retrieval(#[source] SearchError),
    /// The generation provider failed.
    #[error("Failed to chat with files: {0}")]
    Generation(#[source] GenerationError),
}

impl ChatError {
    /// True when a provider was used before it was initialized.
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::Retrieval(error) => error.is_unavailable(),
            Self::Initialize(GenerationError::NotInitialized)
            | Self::Generation(GenerationError::NotInitialized) => true,
            Self::Initialize(_) | Self::Generation(_) => false,
        }
    }
}

/// Retrieved chunk echoed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceChunk {
    /// Source file.
    pub file_id: String,
    /// Chunk text.
    pub content: String,
    /// Similarity score.
    pub score: f32,
}

/// Answer to one chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    /// Model answer.
    pub response: String,
    /// Every retrieved chunk, whether or not it fit in the context.
    pub source_chunks: Vec<SourceChunk>,
    /// Number of retrieved chunks.
    pub total_chunks: usize,
}

/// Answers questions about specific files using retrieved chunks as context.
pub struct ChatService {
    search: Arc<SearchService>,
    provider: Arc<dyn ChatProvider>,
    context: ContextBuilder,
    default_max_chunks: usize,
}

impl ChatService {
    /// Wire the service with the default context budget and chunk count.
    pub fn new(search: Arc<SearchService>, provider: Arc<dyn ChatProvider>) -> Self {
        Self {
            search,
            provider,
            context: ContextBuilder::default(),
            default_max_chunks: 5,
        }
    }

    /// Replace the context builder.
    pub fn with_context_builder(mut self, context: ContextBuilder) -> Self {
        self.context = context;
        self
    }

    /// Chunks retrieved when the caller does not specify a count.
    pub fn with_default_max_chunks(mut self, max_chunks: usize) -> Self {
        self.default_max_chunks = max_chunks;
        self
    }

    /// Description of the active chat model.
    pub fn model_info(&self) -> ChatModelInfo {
        self.provider.model_info()
    }

    /// Start the generation provider.
    pub async fn initialize(&self) -> Result<(), ChatError> {
        self.provider
            .initialize()
            .await
            .map_err(ChatError::Initialize)?;
        tracing::info!(model = %self.provider.model_info().model, "Chat service initialized");
        Ok(())
    }

    /// Answer `message` from chunks of `file_ids`, retrieving at most `max_chunks` chunks.
    pub async fn chat_with_files(
        &self,
        file_ids: &[String],
        message: &str,
        max_chunks: Option<usize>,
    ) -> Result<ChatReply, ChatError> {
        let limit = max_chunks.unwrap_or(self.default_max_chunks);
        let chunks = self
            .search
            .search_with_file_filter(message, file_ids, limit)
            .await
            .map_err(ChatError::Retrieval)?;

        let context = self.context.build(&chunks);
        tracing::debug!(
            files = file_ids.len(),
            retrieved = chunks.len(),
            chunks_used = context.chunks_used,
            estimated_tokens = context.estimated_tokens,
            truncated = context.truncated,
            "Chat context assembled"
        );

        let response = if context.is_empty() {
            NO_CONTEXT_ANSWER.to_string()
        } else {
            let answer = self
                .provider
                .generate_response(&context.text, message)
                .await
                .map_err(ChatError::Generation)?;
            if answer.trim().is_empty() {
                tracing::warn!("Chat model returned an empty answer");
                EMPTY_ANSWER_FALLBACK.to_string()
            } else {
                answer
            }
        };

        self.search.metrics().record_chat();
        let source_chunks: Vec<SourceChunk> = chunks
            .into_iter()
            .map(|chunk| SourceChunk {
                file_id: chunk.file_id,
                content: chunk.content,
                score: chunk.score,
            })
            .collect();

        Ok(ChatReply {
            response,
            total_chunks: source_chunks.len(),
            source_chunks,
        })
    }

    /// Probe the generation provider. Never fails.
    pub async fn health_check(&self) -> HealthReport {
        let mut report = HealthReport::new();
        report.insert(
            "chat",
            DependencyHealth::from_probe("chat", self.provider.health_check().await),
        );
        report
    }

    /// Release the generation provider.
    pub async fn close(&self) {
        self.provider.close().await;
    }
}
