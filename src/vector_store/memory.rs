//! In-memory vector store using cosine similarity.

use super::{CollectionInfo, VectorDbError, VectorStore, ensure_matching_lengths};
use crate::document::{Document, Metadata, SearchResult};
use crate::qdrant::{build_payload, point_id, search_result_from_payload};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

struct StoredPoint {
    vector: Vec<f32>,
    payload: Metadata,
}

struct Collection {
    dimension: usize,
    points: BTreeMap<Uuid, StoredPoint>,
}

/// Process-local vector store with the same payload and id semantics as Qdrant.
///
/// Contents are lost on restart. Intended for development and tests.
#[derive(Default)]
pub struct MemoryStore {
    ready: AtomicBool,
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_ready(&self) -> Result<(), VectorDbError> {
        if self.ready.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(VectorDbError::NotInitialized)
        }
    }

    async fn ranked(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        file_ids: Option<&HashSet<&str>>,
    ) -> Result<Vec<SearchResult>, VectorDbError> {
        self.ensure_ready()?;
        let collections = self.collections.read().await;
        let store = collections
            .get(collection)
            .ok_or_else(|| VectorDbError::CollectionNotFound(collection.to_string()))?;
        check_dimension(store.dimension, vector)?;

        let mut scored: Vec<SearchResult> = store
            .points
            .values()
            .filter(|point| {
                file_ids.is_none_or(|allowed| {
                    point
                        .payload
                        .get("file_id")
                        .and_then(Value::as_str)
                        .is_some_and(|file_id| allowed.contains(file_id))
                })
            })
            .map(|point| {
                search_result_from_payload(
                    cosine_similarity(&point.vector, vector),
                    Some(point.payload.clone()),
                )
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);
        Ok(scored)
    }
}

/// Cosine similarity; 0.0 when either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn check_dimension(expected: usize, vector: &[f32]) -> Result<(), VectorDbError> {
    if vector.len() == expected {
        Ok(())
    } else {
        Err(VectorDbError::DimensionMismatch {
            expected,
            actual: vector.len(),
        })
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn initialize(&self) -> Result<(), VectorDbError> {
        self.ready.store(true, Ordering::Release);
        tracing::debug!("In-memory vector store initialized");
        Ok(())
    }

    async fn health_check(&self) -> Result<(), VectorDbError> {
        self.ensure_ready()
    }

    async fn close(&self) {
        self.ready.store(false, Ordering::Release);
    }

    async fn create_collection(&self, name: &str, dimension: usize) -> Result<(), VectorDbError> {
        self.ensure_ready()?;
        let mut collections = self.collections.write().await;
        collections.entry(name.to_string()).or_insert_with(|| {
            tracing::info!(collection = name, dimension, "Collection created");
            Collection {
                dimension,
                points: BTreeMap::new(),
            }
        });
        Ok(())
    }

    async fn upsert(
        &self,
        collection: &str,
        documents: &[Document],
        embeddings: &[Vec<f32>],
    ) -> Result<(), VectorDbError> {
        self.ensure_ready()?;
        ensure_matching_lengths(documents, embeddings)?;
        if documents.is_empty() {
            return Ok(());
        }

        let mut collections = self.collections.write().await;
        let store = collections
            .get_mut(collection)
            .ok_or_else(|| VectorDbError::CollectionNotFound(collection.to_string()))?;
        for vector in embeddings {
            check_dimension(store.dimension, vector)?;
        }

        for (document, vector) in documents.iter().zip(embeddings) {
            store.points.insert(
                point_id(&document.file_id, &document.content),
                StoredPoint {
                    vector: vector.clone(),
                    payload: build_payload(document),
                },
            );
        }
        tracing::debug!(collection, points = documents.len(), "Points upserted");
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>, VectorDbError> {
        self.ranked(collection, vector, limit, None).await
    }

    async fn search_with_filter(
        &self,
        collection: &str,
        vector: &[f32],
        file_ids: &[String],
        limit: usize,
    ) -> Result<Vec<SearchResult>, VectorDbError> {
        let allowed: HashSet<&str> = file_ids.iter().map(String::as_str).collect();
        self.ranked(collection, vector, limit, Some(&allowed)).await
    }

    async fn delete_documents(
        &self,
        collection: &str,
        file_ids: &[String],
    ) -> Result<(), VectorDbError> {
        self.ensure_ready()?;
        if file_ids.is_empty() {
            return Ok(());
        }

        let mut collections = self.collections.write().await;
        let store = collections
            .get_mut(collection)
            .ok_or_else(|| VectorDbError::CollectionNotFound(collection.to_string()))?;
        let before = store.points.len();
        store.points.retain(|_, point| {
            point
                .payload
                .get("file_id")
                .and_then(Value::as_str)
                .is_none_or(|file_id| !file_ids.iter().any(|target| target == file_id))
        });
        tracing::debug!(
            collection,
            removed = before - store.points.len(),
            "Points deleted"
        );
        Ok(())
    }

    async fn get_collection_info(&self, collection: &str) -> Result<CollectionInfo, VectorDbError> {
        self.ensure_ready()?;
        let collections = self.collections.read().await;
        let store = collections
            .get(collection)
            .ok_or_else(|| VectorDbError::CollectionNotFound(collection.to_string()))?;
        Ok(CollectionInfo {
            name: collection.to_string(),
            status: "green".into(),
            vectors_count: store.points.len() as u64,
            config: json!({
                "params": { "vectors": { "size": store.dimension, "distance": "Cosine" } }
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with(documents: &[(&str, &str, [f32; 2])]) -> MemoryStore {
        let store = MemoryStore::new();
        store.initialize().await.expect("initialize");
        store.create_collection("docs", 2).await.expect("collection");
        let docs: Vec<Document> = documents
            .iter()
            .map(|(file_id, content, _)| Document::new(*file_id, *content))
            .collect();
        let vectors: Vec<Vec<f32>> = documents.iter().map(|(_, _, v)| v.to_vec()).collect();
        store.upsert("docs", &docs, &vectors).await.expect("upsert");
        store
    }

    #[tokio::test]
    async fn requires_initialize() {
        let store = MemoryStore::new();
        let result = store.create_collection("docs", 2).await;
        assert!(matches!(result, Err(VectorDbError::NotInitialized)));
    }

    #[tokio::test]
    async fn search_orders_by_descending_score() {
        let store = store_with(&[
            ("a", "east", [1.0, 0.0]),
            ("b", "north", [0.0, 1.0]),
            ("c", "north-east", [1.0, 1.0]),
        ])
        .await;

        let results = store.search("docs", &[1.0, 0.1], 3).await.expect("search");
        let order: Vec<_> = results.iter().map(|hit| hit.file_id.as_str()).collect();
        assert_eq!(order, vec!["a", "c", "b"]);
        assert!(results.windows(2).all(|pair| pair[0].score >= pair[1].score));
    }

    #[tokio::test]
    async fn upsert_same_content_overwrites() {
        let store = store_with(&[("a", "same", [1.0, 0.0])]).await;
        store
            .upsert("docs", &[Document::new("a", "same")], &[vec![0.0, 1.0]])
            .await
            .expect("upsert");

        let info = store.get_collection_info("docs").await.expect("info");
        assert_eq!(info.vectors_count, 1);
    }

    #[tokio::test]
    async fn filter_and_delete_by_file_id() {
        let store = store_with(&[
            ("a", "one", [1.0, 0.0]),
            ("a", "two", [0.9, 0.1]),
            ("b", "three", [1.0, 0.0]),
        ])
        .await;

        let filtered = store
            .search_with_filter("docs", &[1.0, 0.0], &["a".into()], 10)
            .await
            .expect("filtered");
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|hit| hit.file_id == "a"));

        store
            .delete_documents("docs", &["a".into(), "unknown".into()])
            .await
            .expect("delete");
        let remaining = store.search("docs", &[1.0, 0.0], 10).await.expect("search");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].file_id, "b");
    }

    #[tokio::test]
    async fn empty_filter_matches_nothing() {
        let store = store_with(&[("a", "one", [1.0, 0.0])]).await;
        let results = store
            .search_with_filter("docs", &[1.0, 0.0], &[], 10)
            .await
            .expect("search");
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn file_ids_match_exactly() {
        let store = store_with(&[
            ("a", "plain", [1.0, 0.0]),
            (" a ", "padded", [0.0, 1.0]),
        ])
        .await;

        let padded = store
            .search_with_filter("docs", &[1.0, 0.0], &[" a ".into()], 10)
            .await
            .expect("search");
        assert_eq!(padded.len(), 1);
        assert_eq!(padded[0].file_id, " a ");

        store
            .delete_documents("docs", &[" a ".into()])
            .await
            .expect("delete");
        let remaining = store.search("docs", &[1.0, 0.0], 10).await.expect("search");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].file_id, "a");
    }

    #[tokio::test]
    async fn create_collection_again_keeps_points() {
        let store = store_with(&[("a", "one", [1.0, 0.0])]).await;
        store.create_collection("docs", 2).await.expect("recreate");

        let results = store.search("docs", &[1.0, 0.0], 10).await.expect("search");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "one");
    }

    #[tokio::test]
    async fn dimension_mismatch_is_rejected() {
        let store = store_with(&[]).await;
        let result = store
            .upsert("docs", &[Document::new("a", "x")], &[vec![1.0, 0.0, 0.0]])
            .await;
        assert!(matches!(
            result,
            Err(VectorDbError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }
}
