//! Qdrant vector store integration.

pub mod client;
pub mod filters;
pub mod payload;
pub mod types;

pub use client::QdrantStore;
pub use filters::file_id_filter;
pub use payload::{build_payload, content_hash, point_id, search_result_from_payload};
pub use types::QdrantError;
