//! Helpers for constructing, hashing and reading back point payloads.

use crate::document::{Document, Metadata, SearchResult};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::{Builder, Uuid};

/// Payload key holding the owning file identifier.
pub const FILE_ID_KEY: &str = "file_id";
/// Payload key holding the chunk text.
pub const CONTENT_KEY: &str = "content";
/// Payload key holding the hex SHA-256 of the chunk text.
pub const CONTENT_HASH_KEY: &str = "content_hash";

const LEGACY_FILE_ID_KEY: &str = "fileID";
/// Read order for chunk text; older ingestion runs wrote the alternates.
const CONTENT_KEYS: [&str; 4] = ["page_content", CONTENT_KEY, "text", "Content"];

/// Keys owned by the store. Metadata entries with these names are dropped on write and
/// never surface in [`SearchResult::metadata`].
pub const RESERVED_KEYS: [&str; 7] = [
    FILE_ID_KEY,
    LEGACY_FILE_ID_KEY,
    CONTENT_KEY,
    "page_content",
    "text",
    "Content",
    CONTENT_HASH_KEY,
];

fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Compute a deterministic SHA-256 hash for the chunk text.
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Deterministic point identifier for a `(file_id, content)` pair.
///
/// The NUL separator keeps `("ab", "c")` and `("a", "bc")` apart.
pub fn point_id(file_id: &str, content: &str) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update(file_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Builder::from_sha1_bytes(bytes).into_uuid()
}

/// Build the payload object stored alongside each indexed chunk.
pub fn build_payload(document: &Document) -> Metadata {
    let mut payload: Metadata = document
        .metadata
        .iter()
        .filter(|(key, _)| !is_reserved(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    payload.insert(FILE_ID_KEY.into(), Value::String(document.file_id.clone()));
    payload.insert(CONTENT_KEY.into(), Value::String(document.content.clone()));
    payload.insert(
        CONTENT_HASH_KEY.into(),
        Value::String(content_hash(&document.content)),
    );
    payload
}

/// Map a stored payload back into a search hit, accepting legacy key names.
pub fn search_result_from_payload(score: f32, payload: Option<Metadata>) -> SearchResult {
    let payload = payload.unwrap_or_default();

    let file_id = [FILE_ID_KEY, LEGACY_FILE_ID_KEY]
        .iter()
        .find_map(|key| non_empty_string(&payload, key))
        .unwrap_or_default();
    let content = CONTENT_KEYS
        .iter()
        .find_map(|key| non_empty_string(&payload, key))
        .unwrap_or_default();
    let metadata = payload
        .into_iter()
        .filter(|(key, _)| !is_reserved(key))
        .collect();

    SearchResult {
        file_id,
        score,
        content,
        metadata,
    }
}

fn non_empty_string(payload: &Metadata, key: &str) -> Option<String> {
    match payload.get(key) {
        Some(Value::String(text)) if !text.is_empty() => Some(text.clone()),
        _ => None,
    }
}
