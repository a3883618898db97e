//! Application facade shared by the HTTP surface.
//!
//! [`AppServices`] owns the wired search and chat services together with their readiness flags.
//! Startup failures leave a service marked not ready instead of aborting the process; requests
//! that need it are then answered as unavailable.

use crate::chat::{ChatError, ChatReply};
use crate::document::{Document, FileHit, SearchResult};
use crate::health::HealthReport;
use crate::metrics::MetricsSnapshot;
use crate::registry::Services;
use crate::search::{IndexOutcome, SearchError};
use crate::vector_store::CollectionInfo;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Failure surfaced to request handlers.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The named service did not finish initializing at startup.
    #[error("{0} service not available")]
    NotReady(&'static str),
    /// Search orchestration failed.
    #[error(transparent)]
    Search(#[from] SearchError),
    /// Chat orchestration failed.
    #[error(transparent)]
    Chat(#[from] ChatError),
}

impl ServiceError {
    /// True when the failure means "try again later" rather than a fault.
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::NotReady(_) => true,
            Self::Search(error) => error.is_unavailable(),
            Self::Chat(error) => error.is_unavailable(),
        }
    }
}

/// Readiness plus per-dependency probe results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceHealth {
    /// Whether the search service initialized at startup.
    pub ready: bool,
    /// Probe outcome per dependency.
    pub report: HealthReport,
}

impl ServiceHealth {
    /// Ready and every dependency answered.
    pub fn is_healthy(&self) -> bool {
        self.ready && self.report.is_healthy()
    }
}

/// Operations the HTTP layer needs from the application.
#[async_trait]
pub trait DocumentApi: Send + Sync {
    /// Readiness and dependency health. Never fails.
    async fn health(&self) -> ServiceHealth;

    /// Best chunk per file among the top `k` hits, at most `top_files` files.
    async fn search_files(
        &self,
        query: &str,
        k: usize,
        top_files: usize,
    ) -> Result<Vec<FileHit>, ServiceError>;

    /// Raw chunk hits ordered by descending score.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, ServiceError>;

    /// Embed and store a batch of documents.
    async fn index_documents(&self, documents: Vec<Document>)
    -> Result<IndexOutcome, ServiceError>;

    /// Remove every chunk of the given files, returning the number of file ids processed.
    async fn delete_documents(&self, file_ids: &[String]) -> Result<usize, ServiceError>;

    /// Describe the configured collection.
    async fn collection_info(&self) -> Result<CollectionInfo, ServiceError>;

    /// Answer a question from chunks of the given files.
    async fn chat(
        &self,
        file_ids: &[String],
        message: &str,
        max_chunks: Option<usize>,
    ) -> Result<ChatReply, ServiceError>;

    /// Current activity counters.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Wired services with their startup readiness.
pub struct AppServices {
    services: Services,
    search_ready: AtomicBool,
    chat_ready: AtomicBool,
}

impl AppServices {
    /// Wrap services that have not been initialized yet.
    pub fn new(services: Services) -> Self {
        Self {
            services,
            search_ready: AtomicBool::new(false),
            chat_ready: AtomicBool::new(false),
        }
    }

    /// Underlying services.
    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Initialize search, then chat. Failures are logged and leave the service not ready.
    pub async fn initialize(&self) {
        match self.services.search.initialize().await {
            Ok(()) => self.search_ready.store(true, Ordering::Release),
            Err(error) => {
                tracing::warn!(
                    error = %error,
                    "Search service initialization failed; continuing without it"
                );
            }
        }

        match self.services.chat.initialize().await {
            Ok(()) => self.chat_ready.store(true, Ordering::Release),
            Err(error) => {
                tracing::warn!(
                    error = %error,
                    "Chat service initialization failed; continuing without it"
                );
            }
        }

        let health = self.health().await;
        if health.is_healthy() {
            tracing::info!("All services are healthy");
        } else {
            tracing::warn!(services = ?health.report.statuses(), "Some services are unhealthy");
        }
    }

    /// Release every provider connection.
    pub async fn close(&self) {
        self.services.chat.close().await;
        self.services.search.close().await;
        self.search_ready.store(false, Ordering::Release);
        self.chat_ready.store(false, Ordering::Release);
        tracing::info!("Services closed");
    }

    fn require_search(&self) -> Result<(), ServiceError> {
        if self.search_ready.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(ServiceError::NotReady("Search"))
        }
    }

    fn require_chat(&self) -> Result<(), ServiceError> {
        self.require_search()?;
        if self.chat_ready.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(ServiceError::NotReady("Chat"))
        }
    }
}

#[async_trait]
impl DocumentApi for AppServices {
    async fn health(&self) -> ServiceHealth {
        let mut report = self.services.search.health_check().await;
        report.merge(self.services.chat.health_check().await);
        ServiceHealth {
            ready: self.search_ready.load(Ordering::Acquire),
            report,
        }
    }

    async fn search_files(
        &self,
        query: &str,
        k: usize,
        top_files: usize,
    ) -> Result<Vec<FileHit>, ServiceError> {
        self.require_search()?;
        Ok(self
            .services
            .search
            .search_by_file_id(query, k, top_files)
            .await?)
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, ServiceError> {
        self.require_search()?;
        Ok(self.services.search.search(query, limit).await?)
    }

    async fn index_documents(
        &self,
        documents: Vec<Document>,
    ) -> Result<IndexOutcome, ServiceError> {
        self.require_search()?;
        Ok(self.services.search.index_documents(&documents).await?)
    }

    async fn delete_documents(&self, file_ids: &[String]) -> Result<usize, ServiceError> {
        self.require_search()?;
        self.services.search.delete_documents(file_ids).await?;
        Ok(file_ids.len())
    }

    async fn collection_info(&self) -> Result<CollectionInfo, ServiceError> {
        self.require_search()?;
        Ok(self.services.search.get_collection_info().await?)
    }

    async fn chat(
        &self,
        file_ids: &[String],
        message: &str,
        max_chunks: Option<usize>,
    ) -> Result<ChatReply, ServiceError> {
        self.require_chat()?;
        Ok(self
            .services
            .chat
            .chat_with_files(file_ids, message, max_chunks)
            .await?)
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.services.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::registry::ProviderRegistry;

    fn offline_services() -> Services {
        let mut config = AppConfig::default();
        config.embedding.provider = "hash".into();
        config.embedding.dimensions = 16;
        config.vector_db.provider = "memory".into();
        config.chat.base_url = "http://127.0.0.1:9".into();
        ProviderRegistry::with_defaults()
            .build_services(&config)
            .expect("services")
    }

    #[tokio::test]
    async fn uninitialized_services_are_not_ready() {
        let app = AppServices::new(offline_services());

        let error = app.search("query", 5).await.expect_err("not ready");
        assert!(matches!(error, ServiceError::NotReady("Search")));
        assert!(error.is_unavailable());
        assert!(!app.health().await.ready);
    }

    #[tokio::test]
    async fn chat_failure_leaves_search_usable() {
        let app = AppServices::new(offline_services());
        app.initialize().await;

        let outcome = app
            .index_documents(vec![Document::new("doc-1", "alpha beta")])
            .await
            .expect("index");
        assert_eq!(outcome.documents_processed, 1);

        let error = app
            .chat(&["doc-1".into()], "alpha?", None)
            .await
            .expect_err("chat unavailable");
        assert!(matches!(error, ServiceError::NotReady("Chat")));

        let health = app.health().await;
        assert!(health.ready);
        assert!(!health.is_healthy());
        assert!(health.report.statuses()["vector_db"]);
        assert!(!health.report.statuses()["chat"]);
    }

    #[tokio::test]
    async fn delete_reports_requested_count() {
        let app = AppServices::new(offline_services());
        app.initialize().await;

        let deleted = app
            .delete_documents(&["missing-1".into(), "missing-2".into()])
            .await
            .expect("delete");
        assert_eq!(deleted, 2);
        assert_eq!(app.metrics_snapshot().documents_indexed, 0);
    }
}
