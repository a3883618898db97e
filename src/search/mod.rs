//! Search orchestration: embedding generation, vector upsert and retrieval, file grouping.

mod grouping;
mod service;

pub use grouping::group_by_file;
pub use service::{IndexOutcome, SearchService};

use crate::provider::ProviderError;
use thiserror::Error;

/// Failure of a search-service operation, naming the operation and carrying the provider error.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Provider startup or collection creation failed.
    #[error("Failed to initialize search service: {0}")]
    Initialize(#[source] ProviderError),
    /// Embedding or upsert of an indexing batch failed.
    #[error("Failed to index documents: {0}")]
    Index(#[source] ProviderError),
    /// Query embedding or similarity search failed.
    #[error("Failed to search documents: {0}")]
    Search(#[source] ProviderError),
    /// File-grouped search failed.
    #[error("Failed to search by file_id: {0}")]
    SearchByFile(#[source] ProviderError),
    /// File-restricted search failed.
    #[error("Failed to search documents with file filter: {0}")]
    FilteredSearch(#[source] ProviderError),
    /// Deletion by file id failed.
    #[error("Failed to delete documents: {0}")]
    Delete(#[source] ProviderError),
    /// Collection description failed.
    #[error("Failed to get collection info: {0}")]
    CollectionInfo(#[source] ProviderError),
}

impl SearchError {
    /// Provider error behind this failure.
    pub fn provider_error(&self) -> &ProviderError {
        match self {
            Self::Initialize(error)
            | Self::Index(error)
            | Self::Search(error)
            | Self::SearchByFile(error)
            | Self::FilteredSearch(error)
            | Self::Delete(error)
            | Self::CollectionInfo(error) => error,
        }
    }

    /// True when the service was used before its providers were initialized.
    pub fn is_unavailable(&self) -> bool {
        self.provider_error().is_not_initialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingError;

    #[test]
    fn message_names_operation_and_cause() {
        let error = SearchError::Search(EmbeddingError::EmptyResponse.into());
        assert_eq!(
            error.to_string(),
            "Failed to search documents: No embedding returned from the backend"
        );
        assert!(!error.is_unavailable());
    }

    #[test]
    fn not_initialized_is_unavailable() {
        let error = SearchError::Delete(EmbeddingError::NotInitialized.into());
        assert!(error.is_unavailable());
    }
}
