use super::{SearchError, group_by_file};
use crate::document::{Document, FileHit, SearchResult};
use crate::embedding::{EmbeddingProvider, ModelInfo};
use crate::health::{DependencyHealth, HealthReport};
use crate::metrics::ServiceMetrics;
use crate::provider::ProviderError;
use crate::vector_store::{CollectionInfo, VectorStore};
use serde::Serialize;
use std::sync::Arc;

/// Result of an indexing batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexOutcome {
    /// Number of documents embedded and upserted.
    pub documents_processed: usize,
}

/// Orchestrates an embedding provider and a vector store over one collection.
pub struct SearchService {
    embedding: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    collection: String,
    metrics: Arc<ServiceMetrics>,
}

impl SearchService {
    /// Wire the service to its providers. Call [`SearchService::initialize`] before use.
    pub fn new(
        embedding: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embedding,
            store,
            collection: collection.into(),
            metrics: Arc::new(ServiceMetrics::new()),
        }
    }

    /// Share an existing metrics accumulator.
    pub fn with_metrics(mut self, metrics: Arc<ServiceMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Counters updated by this service.
    pub fn metrics(&self) -> &Arc<ServiceMetrics> {
        &self.metrics
    }

    /// Collection this service reads and writes.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Description of the active embedding model.
    pub fn embedding_info(&self) -> ModelInfo {
        self.embedding.model_info()
    }

    /// Start the vector store, then the embedding provider, then ensure the collection exists
    /// with the embedding dimension.
    pub async fn initialize(&self) -> Result<(), SearchError> {
        let result = async {
            self.store.initialize().await?;
            self.embedding.initialize().await?;
            self.store
                .create_collection(&self.collection, self.embedding.dimension())
                .await?;
            Ok::<(), ProviderError>(())
        }
        .await;

        result.map_err(SearchError::Initialize)?;
        tracing::info!(
            collection = %self.collection,
            dimension = self.embedding.dimension(),
            "Search service initialized"
        );
        Ok(())
    }

    /// Embed every document in one batch and upsert them in one batch.
    ///
    /// Any failure aborts the whole batch; nothing is reported as partially indexed.
    pub async fn index_documents(
        &self,
        documents: &[Document],
    ) -> Result<IndexOutcome, SearchError> {
        let texts: Vec<String> = documents
            .iter()
            .map(|document| document.content.clone())
            .collect();

        let result = async {
            let embeddings = self.embedding.embed_texts(&texts).await?;
            self.store
                .upsert(&self.collection, documents, &embeddings)
                .await?;
            Ok::<(), ProviderError>(())
        }
        .await;

        result.map_err(SearchError::Index)?;
        self.metrics.record_indexed(documents.len() as u64);
        tracing::info!(
            collection = %self.collection,
            documents = documents.len(),
            "Documents indexed"
        );
        Ok(IndexOutcome {
            documents_processed: documents.len(),
        })
    }

    /// Raw chunk hits for `query`, ordered by descending score.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let results = self
            .ranked(query, limit)
            .await
            .map_err(SearchError::Search)?;
        tracing::debug!(limit, results = results.len(), "Search completed");
        Ok(results)
    }

    /// Best chunk per file among the top `k` chunk hits, at most `top_files` files.
    pub async fn search_by_file_id(
        &self,
        query: &str,
        k: usize,
        top_files: usize,
    ) -> Result<Vec<FileHit>, SearchError> {
        let results = self
            .ranked(query, k)
            .await
            .map_err(SearchError::SearchByFile)?;
        let chunks = results.len();
        let files = group_by_file(results, top_files);
        tracing::debug!(k, top_files, chunks, files = files.len(), "File search completed");
        Ok(files)
    }

    /// Chunk hits restricted to the given files. No files means no hits.
    ///
    /// Used for chat retrieval, so it does not count towards the search metric.
    pub async fn search_with_file_filter(
        &self,
        query: &str,
        file_ids: &[String],
        limit: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        if file_ids.is_empty() {
            tracing::debug!("File-filtered search without file ids, returning no results");
            return Ok(Vec::new());
        }

        let result = async {
            let vector = self.embedding.embed_text(query).await?;
            let results = self
                .store
                .search_with_filter(&self.collection, &vector, file_ids, limit)
                .await?;
            Ok::<_, ProviderError>(results)
        }
        .await;

        result.map_err(SearchError::FilteredSearch)
    }

    /// Remove every chunk of the given files.
    pub async fn delete_documents(&self, file_ids: &[String]) -> Result<(), SearchError> {
        self.store
            .delete_documents(&self.collection, file_ids)
            .await
            .map_err(|error| SearchError::Delete(error.into()))?;
        tracing::info!(
            collection = %self.collection,
            files = file_ids.len(),
            "Documents deleted"
        );
        Ok(())
    }

    /// Describe the configured collection.
    pub async fn get_collection_info(&self) -> Result<CollectionInfo, SearchError> {
        self.store
            .get_collection_info(&self.collection)
            .await
            .map_err(|error| SearchError::CollectionInfo(error.into()))
    }

    /// Probe both providers. Never fails; failures are recorded per dependency.
    pub async fn health_check(&self) -> HealthReport {
        let mut report = HealthReport::new();
        report.insert(
            "vector_db",
            DependencyHealth::from_probe("vector_db", self.store.health_check().await),
        );
        report.insert(
            "embedding",
            DependencyHealth::from_probe("embedding", self.embedding.health_check().await),
        );
        report
    }

    /// Release provider connections.
    pub async fn close(&self) {
        self.embedding.close().await;
        self.store.close().await;
        tracing::debug!("Search service closed");
    }

    async fn ranked(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, ProviderError> {
        let vector = self.embedding.embed_text(query).await?;
        let results = self.store.search(&self.collection, &vector, limit).await?;
        self.metrics.record_search();
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingError, HashEmbedding};
    use crate::vector_store::{MemoryStore, VectorDbError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn ready_service() -> SearchService {
        let service = SearchService::new(
            Arc::new(HashEmbedding::new(32)),
            Arc::new(MemoryStore::new()),
            "documents",
        );
        service.initialize().await.expect("initialize");
        service
    }

    struct FailingEmbedding {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedding {
        async fn initialize(&self) -> Result<(), EmbeddingError> {
            Ok(())
        }

        async fn health_check(&self) -> Result<(), EmbeddingError> {
            Err(EmbeddingError::EmptyResponse)
        }

        async fn embed_texts(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(EmbeddingError::EmptyResponse)
        }

        fn dimension(&self) -> usize {
            4
        }

        fn model_info(&self) -> ModelInfo {
            ModelInfo {
                provider: "failing".into(),
                model: "none".into(),
                base_url: None,
                dimensions: 4,
            }
        }
    }

    #[tokio::test]
    async fn indexed_documents_are_searchable() {
        let service = ready_service().await;
        let outcome = service
            .index_documents(&[
                Document::new("doc-1", "rust ownership and borrowing"),
                Document::new("doc-2", "qdrant collections and payloads"),
            ])
            .await
            .expect("index");
        assert_eq!(outcome.documents_processed, 2);

        let results = service
            .search("rust ownership and borrowing", 5)
            .await
            .expect("search");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].file_id, "doc-1");
        assert_eq!(service.metrics().snapshot().documents_indexed, 2);
    }

    #[tokio::test]
    async fn file_search_groups_chunks() {
        let service = ready_service().await;
        service
            .index_documents(&[
                Document::new("doc-1", "alpha one"),
                Document::new("doc-1", "alpha two"),
                Document::new("doc-2", "beta one"),
                Document::new("doc-3", "gamma one"),
            ])
            .await
            .expect("index");

        let files = service
            .search_by_file_id("alpha one", 50, 5)
            .await
            .expect("search");
        assert_eq!(files.len(), 3);
        assert_eq!(files[0].file_id, "doc-1");
        assert_eq!(files[0].content, "alpha one");
    }

    #[tokio::test]
    async fn filtered_search_without_files_is_empty() {
        let service = ready_service().await;
        service
            .index_documents(&[Document::new("doc-1", "alpha")])
            .await
            .expect("index");

        let results = service
            .search_with_file_filter("alpha", &[], 5)
            .await
            .expect("search");
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn only_user_searches_are_counted() {
        let service = ready_service().await;
        service
            .index_documents(&[Document::new("doc-1", "alpha")])
            .await
            .expect("index");

        let filtered = service
            .search_with_file_filter("alpha", &["doc-1".into()], 5)
            .await
            .expect("filtered");
        assert_eq!(filtered.len(), 1);
        assert_eq!(service.metrics().snapshot().searches, 0);

        service.search("alpha", 5).await.expect("search");
        service
            .search_by_file_id("alpha", 5, 1)
            .await
            .expect("file search");
        assert_eq!(service.metrics().snapshot().searches, 2);
    }

    #[tokio::test]
    async fn delete_removes_file_chunks() {
        let service = ready_service().await;
        service
            .index_documents(&[Document::new("doc-1", "alpha"), Document::new("doc-2", "beta")])
            .await
            .expect("index");

        service
            .delete_documents(&["doc-1".into(), "missing".into()])
            .await
            .expect("delete");
        let info = service.get_collection_info().await.expect("info");
        assert_eq!(info.vectors_count, 1);
    }

    #[tokio::test]
    async fn embedding_failure_aborts_batch() {
        let embedding = Arc::new(FailingEmbedding {
            calls: AtomicUsize::new(0),
        });
        let service = SearchService::new(embedding.clone(), Arc::new(MemoryStore::new()), "docs");
        service.initialize().await.expect("initialize");

        let error = service
            .index_documents(&[Document::new("a", "x"), Document::new("b", "y")])
            .await
            .expect_err("failure");
        assert!(error.to_string().starts_with("Failed to index documents"));
        assert_eq!(embedding.calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.get_collection_info().await.expect("info").vectors_count, 0);
        assert_eq!(service.metrics().snapshot().documents_indexed, 0);
    }

    #[tokio::test]
    async fn uninitialized_service_reports_unavailable() {
        let service = SearchService::new(
            Arc::new(HashEmbedding::new(8)),
            Arc::new(MemoryStore::new()),
            "docs",
        );
        let error = service.get_collection_info().await.expect_err("not ready");
        assert!(error.is_unavailable());
        assert!(matches!(
            error.provider_error(),
            ProviderError::VectorDb(VectorDbError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn health_reports_each_dependency() {
        let service = SearchService::new(
            Arc::new(FailingEmbedding {
                calls: AtomicUsize::new(0),
            }),
            Arc::new(MemoryStore::new()),
            "docs",
        );
        service.initialize().await.expect("initialize");

        let report = service.health_check().await;
        assert!(!report.is_healthy());
        assert!(report.statuses()["vector_db"]);
        assert!(!report.statuses()["embedding"]);

        service.close().await;
        assert!(!service.health_check().await.statuses()["vector_db"]);
    }
}
