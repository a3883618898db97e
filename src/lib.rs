#![deny(missing_docs)]

//! Core library for the docsearch retrieval service.

/// HTTP routing and REST handlers.
pub mod api;
/// Application facade over the wired services.
pub mod app;
/// Retrieval-augmented chat: context assembly, generation providers, orchestration.
pub mod chat;
/// Layered configuration management.
pub mod config;
/// Document and search result types shared by every layer.
pub mod document;
/// Embedding provider abstraction and adapters.
pub mod embedding;
/// Structured dependency health reporting.
pub mod health;
/// Structured logging and tracing setup.
pub mod logging;
/// Service activity counters.
pub mod metrics;
/// Provider error taxonomy and connection lifecycle.
pub mod provider;
/// Qdrant vector store integration.
pub mod qdrant;
/// Name-keyed provider constructors.
pub mod registry;
/// Search orchestration over embedding and vector store providers.
pub mod search;
/// Vector store abstraction and the in-memory backend.
pub mod vector_store;
