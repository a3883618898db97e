//! Filter helpers for Qdrant queries and deletions.

use serde_json::{Value, json};

use super::payload::FILE_ID_KEY;

/// Restrict matches to points whose `file_id` is any of `file_ids`.
///
/// Identifiers are matched exactly as stored. Returns `None` when no non-empty identifier
/// remains, so callers can skip the request.
pub fn file_id_filter(file_ids: &[String]) -> Option<Value> {
    let cleaned: Vec<&str> = file_ids
        .iter()
        .map(String::as_str)
        .filter(|value| !value.is_empty())
        .collect();

    if cleaned.is_empty() {
        None
    } else {
        Some(json!({
            "must": [
                {
                    "key": FILE_ID_KEY,
                    "match": { "any": cleaned }
                }
            ]
        }))
    }
}
