use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form metadata attached to a document and echoed back on search hits.
pub type Metadata = Map<String, Value>;

/// A unit of content submitted for indexing, usually one chunk of a source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Text that is embedded and stored.
    pub content: String,
    /// Identifier of the source file this chunk belongs to.
    pub file_id: String,
    /// Additional payload fields persisted alongside the vector.
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    /// Create a document without metadata.
    pub fn new(file_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            file_id: file_id.into(),
            metadata: Metadata::new(),
        }
    }

    /// Attach a metadata entry, replacing any previous value under the same key.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Chunk-level similarity hit returned by a vector store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// Source file of the matching chunk.
    pub file_id: String,
    /// Similarity score (cosine, higher is more relevant).
    pub score: f32,
    /// Stored chunk content.
    pub content: String,
    /// Payload fields other than the reserved ones.
    pub metadata: Metadata,
}

/// One row per file, scored by the best matching chunk of that file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileHit {
    /// File identifier.
    pub file_id: String,
    /// Best chunk score observed for the file.
    pub score: f32,
    /// Content of the best matching chunk.
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metadata_defaults_to_empty_when_missing() {
        let doc: Document =
            serde_json::from_value(json!({ "content": "body", "file_id": "doc-1" }))
                .expect("document");
        assert!(doc.metadata.is_empty());
        assert_eq!(doc.file_id, "doc-1");
    }

    #[test]
    fn with_metadata_overwrites_existing_key() {
        let doc = Document::new("doc-1", "body")
            .with_metadata("page", 1)
            .with_metadata("page", 2);
        assert_eq!(doc.metadata["page"], json!(2));
    }
}
