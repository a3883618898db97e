//! Vector store abstraction shared by the Qdrant and in-memory backends.

mod memory;

pub use memory::MemoryStore;

use crate::document::{Document, SearchResult};
use crate::qdrant::QdrantError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Errors raised by vector store providers.
#[derive(Debug, Error)]
pub enum VectorDbError {
    /// An operation ran before `initialize` (or after `close`).
    #[error("Vector database client not initialized")]
    NotInitialized,
    /// Upsert received a different number of documents and vectors.
    #[error("Number of documents ({documents}) must match number of embeddings ({embeddings})")]
    LengthMismatch {
        /// Documents submitted.
        documents: usize,
        /// Vectors submitted.
        embeddings: usize,
    },
    /// A vector does not match the collection dimension.
    #[error("Vector dimension {actual} does not match collection dimension {expected}")]
    DimensionMismatch {
        /// Dimension the collection was created with.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },
    /// The collection does not exist.
    #[error("Collection '{0}' does not exist")]
    CollectionNotFound(String),
    /// The backend rejected or failed an operation.
    #[error("Failed to {operation}: {source}")]
    Backend {
        /// Operation that failed.
        operation: &'static str,
        /// Underlying backend error.
        #[source]
        source: QdrantError,
    },
    /// Provider settings are unusable.
    #[error("Invalid vector database configuration: {0}")]
    InvalidConfig(String),
}

impl VectorDbError {
    pub(crate) fn backend(operation: &'static str) -> impl FnOnce(QdrantError) -> Self {
        move |source| Self::Backend { operation, source }
    }
}

/// Summary of a collection as reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionInfo {
    /// Collection name.
    pub name: String,
    /// Backend-reported status (for Qdrant: green, yellow, red).
    pub status: String,
    /// Number of stored vectors.
    pub vectors_count: u64,
    /// Backend-specific configuration details.
    pub config: Value,
}

/// Interface implemented by vector database backends.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Open the backend connection and verify it answers.
    async fn initialize(&self) -> Result<(), VectorDbError>;

    /// Probe the backend.
    async fn health_check(&self) -> Result<(), VectorDbError>;

    /// Release the backend connection.
    async fn close(&self);

    /// Create the collection with cosine distance unless it already exists.
    async fn create_collection(&self, name: &str, dimension: usize) -> Result<(), VectorDbError>;

    /// Insert or overwrite one point per document. Lengths must match.
    async fn upsert(
        &self,
        collection: &str,
        documents: &[Document],
        embeddings: &[Vec<f32>],
    ) -> Result<(), VectorDbError>;

    /// Nearest neighbours ordered by descending score.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>, VectorDbError>;

    /// Nearest neighbours restricted to points whose `file_id` is in `file_ids`.
    async fn search_with_filter(
        &self,
        collection: &str,
        vector: &[f32],
        file_ids: &[String],
        limit: usize,
    ) -> Result<Vec<SearchResult>, VectorDbError>;

    /// Remove every point belonging to the given files. Unknown ids are ignored.
    async fn delete_documents(
        &self,
        collection: &str,
        file_ids: &[String],
    ) -> Result<(), VectorDbError>;

    /// Describe a collection.
    async fn get_collection_info(&self, collection: &str) -> Result<CollectionInfo, VectorDbError>;
}

pub(crate) fn ensure_matching_lengths(
    documents: &[Document],
    embeddings: &[Vec<f32>],
) -> Result<(), VectorDbError> {
    if documents.len() == embeddings.len() {
        Ok(())
    } else {
        Err(VectorDbError::LengthMismatch {
            documents: documents.len(),
            embeddings: embeddings.len(),
        })
    }
}
