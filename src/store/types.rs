//! Shared types used by the vector store adapters.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned while reading from or writing to a vector store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid vector store URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Backend responded with an unexpected status code.
    #[error("Unexpected vector store response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the backend.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Vector length does not match the collection dimension.
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the collection was created with.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },
}

/// Metadata persisted alongside every indexed chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Name of the uploaded file the chunk came from.
    #[serde(default = "unknown_filename")]
    pub filename: String,
    /// Zero-based position of the chunk within its document.
    #[serde(default)]
    pub chunk_index: usize,
    /// Number of chunks the document was split into.
    #[serde(default)]
    pub total_chunks: usize,
}

impl ChunkMetadata {
    /// Build metadata for chunk `chunk_index` of `total_chunks` from `filename`.
    pub fn new(filename: impl Into<String>, chunk_index: usize, total_chunks: usize) -> Self {
        Self {
            filename: filename.into(),
            chunk_index,
            total_chunks,
        }
    }
}

fn unknown_filename() -> String {
    "Unknown".to_string()
}

/// A chunk embedded into a vector and ready to be written to the store.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    /// Unique identifier of the entry.
    pub id: String,
    /// Embedding vector for the chunk.
    pub vector: Vec<f32>,
    /// Raw chunk text.
    pub document: String,
    /// Metadata describing where the chunk came from.
    pub metadata: ChunkMetadata,
}

/// Nearest-neighbour hit returned by [`super::VectorStore::query`].
#[derive(Debug, Clone)]
pub struct StoredMatch {
    /// Identifier of the matched entry.
    pub id: String,
    /// Stored chunk text.
    pub document: String,
    /// Stored chunk metadata.
    pub metadata: ChunkMetadata,
    /// Cosine distance between the query and the entry (`0` is identical).
    pub distance: f32,
}
