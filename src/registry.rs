//! Name-keyed constructors for every provider kind.
//!
//! Configuration selects providers by name; the registry turns those names into trait objects
//! and wires the search and chat services from them. New backends are added with the
//! `register_*` methods instead of editing a match.

use crate::chat::{ChatProvider, ChatService, ContextBuilder, OllamaChat, TokenEstimator};
use crate::config::AppConfig;
use crate::embedding::{EmbeddingProvider, HashEmbedding, OllamaEmbedding, OpenAiEmbedding};
use crate::metrics::ServiceMetrics;
use crate::provider::{ProviderError, ProviderKind};
use crate::qdrant::QdrantStore;
use crate::search::SearchService;
use crate::vector_store::{MemoryStore, VectorStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Builds an embedding provider from configuration.
pub type EmbeddingConstructor =
    fn(&AppConfig) -> Result<Arc<dyn EmbeddingProvider>, ProviderError>;
/// Builds a vector store from configuration.
pub type VectorStoreConstructor = fn(&AppConfig) -> Result<Arc<dyn VectorStore>, ProviderError>;
/// Builds a chat provider from configuration.
pub type ChatConstructor = fn(&AppConfig) -> Result<Arc<dyn ChatProvider>, ProviderError>;

/// Registry mapping provider names to constructor functions.
#[derive(Default)]
pub struct ProviderRegistry {
    embedding: HashMap<String, EmbeddingConstructor>,
    vector_stores: HashMap<String, VectorStoreConstructor>,
    chat: HashMap<String, ChatConstructor>,
}

/// Services wired from one configuration, sharing one metrics accumulator.
pub struct Services {
    /// Search orchestration.
    pub search: Arc<SearchService>,
    /// Retrieval-augmented chat.
    pub chat: Arc<ChatService>,
    /// Shared activity counters.
    pub metrics: Arc<ServiceMetrics>,
}

impl ProviderRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in provider.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_embedding("ollama", ollama_embedding);
        registry.register_embedding("openai", openai_embedding);
        registry.register_embedding("hash", hash_embedding);
        registry.register_vector_store("qdrant", qdrant_store);
        registry.register_vector_store("memory", memory_store);
        registry.register_chat("ollama", ollama_chat);
        registry
    }

    /// Register or replace an embedding provider. Names are case-insensitive.
    pub fn register_embedding(&mut self, name: &str, constructor: EmbeddingConstructor) {
        self.embedding.insert(name.to_lowercase(), constructor);
    }

    /// Register or replace a vector store. Names are case-insensitive.
    pub fn register_vector_store(&mut self, name: &str, constructor: VectorStoreConstructor) {
        self.vector_stores.insert(name.to_lowercase(), constructor);
    }

    /// Register or replace a chat provider. Names are case-insensitive.
    pub fn register_chat(&mut self, name: &str, constructor: ChatConstructor) {
        self.chat.insert(name.to_lowercase(), constructor);
    }

    /// Construct the embedding provider named by `embedding.provider`.
    pub fn build_embedding(
        &self,
        config: &AppConfig,
    ) -> Result<Arc<dyn EmbeddingProvider>, ProviderError> {
        let constructor = lookup(
            &self.embedding,
            ProviderKind::Embedding,
            &config.embedding.provider,
        )?;
        constructor(config)
    }

    /// Construct the vector store named by `vector_db.provider`.
    pub fn build_vector_store(
        &self,
        config: &AppConfig,
    ) -> Result<Arc<dyn VectorStore>, ProviderError> {
        let constructor = lookup(
            &self.vector_stores,
            ProviderKind::VectorStore,
            &config.vector_db.provider,
        )?;
        constructor(config)
    }

    /// Construct the chat provider named by `chat.provider`.
    pub fn build_chat(&self, config: &AppConfig) -> Result<Arc<dyn ChatProvider>, ProviderError> {
        let constructor = lookup(&self.chat, ProviderKind::Chat, &config.chat.provider)?;
        constructor(config)
    }

    /// Construct every provider and wire the services. Nothing is initialized yet.
    pub fn build_services(&self, config: &AppConfig) -> Result<Services, ProviderError> {
        let metrics = Arc::new(ServiceMetrics::new());
        let search = Arc::new(
            SearchService::new(
                self.build_embedding(config)?,
                self.build_vector_store(config)?,
                config.vector_db.collection.clone(),
            )
            .with_metrics(metrics.clone()),
        );
        let chat = ChatService::new(search.clone(), self.build_chat(config)?)
            .with_context_builder(ContextBuilder::new(
                config.chat.context_limit,
                TokenEstimator::new(config.chat.chars_per_token),
            ))
            .with_default_max_chunks(config.chat.max_chunks);

        tracing::debug!(
            embedding = %config.embedding.provider,
            vector_db = %config.vector_db.provider,
            chat = %config.chat.provider,
            "Providers constructed"
        );

        Ok(Services {
            search,
            chat: Arc::new(chat),
            metrics,
        })
    }
}

fn lookup<T: Copy>(
    table: &HashMap<String, T>,
    kind: ProviderKind,
    name: &str,
) -> Result<T, ProviderError> {
    table
        .get(&name.trim().to_lowercase())
        .copied()
        .ok_or_else(|| ProviderError::UnknownProvider {
            kind,
            name: name.to_string(),
        })
}

fn transport_timeout(config: &AppConfig) -> Duration {
    Duration::from_secs(config.vector_db.timeout)
}

fn ollama_embedding(config: &AppConfig) -> Result<Arc<dyn EmbeddingProvider>, ProviderError> {
    Ok(Arc::new(OllamaEmbedding::new(
        &config.embedding,
        transport_timeout(config),
    )))
}

fn openai_embedding(config: &AppConfig) -> Result<Arc<dyn EmbeddingProvider>, ProviderError> {
    Ok(Arc::new(OpenAiEmbedding::new(
        &config.embedding,
        transport_timeout(config),
    )?))
}

fn hash_embedding(config: &AppConfig) -> Result<Arc<dyn EmbeddingProvider>, ProviderError> {
    Ok(Arc::new(HashEmbedding::new(config.embedding.dimensions)))
}

fn qdrant_store(config: &AppConfig) -> Result<Arc<dyn VectorStore>, ProviderError> {
    Ok(Arc::new(QdrantStore::new(&config.vector_db)?))
}

fn memory_store(_config: &AppConfig) -> Result<Arc<dyn VectorStore>, ProviderError> {
    Ok(Arc::new(MemoryStore::new()))
}

fn ollama_chat(config: &AppConfig) -> Result<Arc<dyn ChatProvider>, ProviderError> {
    Ok(Arc::new(OllamaChat::new(
        &config.chat,
        transport_timeout(config),
    )))
}
