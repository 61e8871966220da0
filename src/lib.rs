#![deny(missing_docs)]

//! Core library for the kbsearch retrieval-augmented question answering service.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Text extraction from uploaded files.
pub mod extract;
/// Language model adapters used for answer synthesis.
pub mod generation;
/// Structured logging and tracing setup.
pub mod logging;
/// Model Context Protocol server implementation.
pub mod mcp;
/// Ingestion and query metrics helpers.
pub mod metrics;
/// Chunking, retrieval, and synthesis pipeline.
pub mod processing;
/// Vector store abstraction with in-memory and Qdrant backends.
pub mod store;
