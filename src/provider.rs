//! Provider error taxonomy and connection lifecycle shared by the embedding, vector store
//! and chat backends.

use crate::{chat::GenerationError, embedding::EmbeddingError, vector_store::VectorDbError};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// Category of backend a provider name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Text embedding backend.
    Embedding,
    /// Vector database backend.
    VectorStore,
    /// Text generation backend used by chat.
    Chat,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Embedding => "embedding",
            Self::VectorStore => "vector store",
            Self::Chat => "chat",
        };
        f.write_str(label)
    }
}

/// Failure raised by any backend provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Embedding backend failure.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    /// Vector database failure.
    #[error(transparent)]
    VectorDb(#[from] VectorDbError),
    /// Text generation failure.
    #[error(transparent)]
    Generation(#[from] GenerationError),
    /// No constructor is registered under the configured name.
    #[error("Unsupported {kind} provider: {name}")]
    UnknownProvider {
        /// Provider category that was looked up.
        kind: ProviderKind,
        /// Name requested by configuration.
        name: String,
    },
}

impl ProviderError {
    /// True when the failing provider was never initialized or has been closed.
    pub fn is_not_initialized(&self) -> bool {
        matches!(
            self,
            Self::Embedding(EmbeddingError::NotInitialized)
                | Self::VectorDb(VectorDbError::NotInitialized)
                | Self::Generation(GenerationError::NotInitialized)
        )
    }
}

/// Connection handle installed by `initialize` and released by `close`.
///
/// Readers clone the `Arc` out of the lock so no guard is held across an `.await`.
pub(crate) struct Connection<T> {
    slot: RwLock<Option<Arc<T>>>,
}

impl<T> Connection<T> {
    pub(crate) fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    pub(crate) fn install(&self, value: T) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(value));
    }

    pub(crate) fn get(&self) -> Option<Arc<T>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drop the handle, returning whether one was installed.
    pub(crate) fn release(&self) -> bool {
        self.slot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }
}

impl<T> Default for Connection<T> {
    fn default() -> Self {
        Self::new()
    }
}
