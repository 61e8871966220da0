//! Core data types and error definitions for the retrieval pipeline.

use crate::{
    embedding::EmbeddingClientError, extract::ExtractionError, generation::GenerationError,
    store::ChunkMetadata, store::StoreError,
};
use serde::Serialize;
use thiserror::Error;

/// Errors produced while splitting text into chunks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkingError {
    /// Ingestion configured an impossible chunk budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Overlap would prevent the window from advancing.
    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({size})")]
    InvalidOverlap {
        /// Configured chunk size in characters.
        size: usize,
        /// Configured overlap in characters.
        overlap: usize,
    },
}

/// Errors emitted while indexing chunks.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Embedding provider failed; nothing was written.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Embedding provider returned a different number of vectors than chunks supplied.
    #[error("Embedding provider returned {actual} vectors for {expected} chunks")]
    CountMismatch {
        /// Number of chunks submitted.
        expected: usize,
        /// Number of vectors received.
        actual: usize,
    },
    /// Caller supplied metadata that does not line up with the chunks.
    #[error("Received {metadata} metadata records for {chunks} chunks")]
    MetadataMismatch {
        /// Number of chunks submitted.
        chunks: usize,
        /// Number of metadata records submitted.
        metadata: usize,
    },
    /// Vector store rejected the batch.
    #[error("Vector store request failed: {0}")]
    Store(#[from] StoreError),
}

/// Errors emitted while orchestrating similarity searches.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Embedding provider failed to return vectors for the query text.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Embedding provider returned no vectors.
    #[error("Embedding provider returned no vectors for the query")]
    EmptyEmbedding,
    /// Vector store query failed.
    #[error("Vector store request failed: {0}")]
    Store(#[from] StoreError),
}

/// Errors surfaced by the knowledge base service to its callers.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Uploaded file could not be turned into text.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    /// Text could not be chunked.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Indexing failed.
    #[error("Failed to index document: {0}")]
    Index(#[from] IndexError),
    /// Retrieval failed.
    #[error("Search failed: {0}")]
    Search(#[from] SearchError),
    /// Answer synthesis failed.
    #[error("Answer generation failed: {0}")]
    Generation(#[from] GenerationError),
    /// Vector store maintenance (stats, clear) failed.
    #[error("Vector store request failed: {0}")]
    Store(#[from] StoreError),
}

impl PipelineError {
    /// Whether the failure was caused by the caller's input rather than a backend.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Extraction(_) | Self::Chunking(_))
    }
}

/// One chunk of a source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Chunk text, an exact substring of the cleaned document.
    pub text: String,
    /// Zero-based position of the chunk within its document.
    pub index: usize,
    /// Source filename.
    pub filename: String,
}

/// Result of a successful [`crate::processing::Retriever::index`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexOutcome {
    /// Number of entries written.
    pub count: usize,
    /// Identifiers assigned to the entries, in chunk order.
    pub ids: Vec<String>,
}

/// A retrieved chunk with its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// Stored chunk text.
    pub document: String,
    /// Metadata stored alongside the chunk.
    pub metadata: ChunkMetadata,
    /// `1 - distance`, higher is more similar.
    pub similarity: f32,
}

/// Collection statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Number of chunks currently indexed.
    pub total_chunks: usize,
    /// Name of the backing collection.
    pub collection_name: String,
}

/// Synthesised answer for a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    /// Generated (or fixed no-results) answer text.
    pub answer: String,
    /// Number of sources that were placed in the prompt.
    pub source_count: usize,
    /// Model that produced the answer.
    pub model: String,
}

/// Full response of the question-answering flow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryAnswer {
    /// Generated answer text.
    pub answer: String,
    /// Query as asked.
    pub query: String,
    /// Chunks used as context.
    pub sources: Vec<SearchResult>,
    /// Number of sources used.
    pub num_sources: usize,
    /// Model that produced the answer.
    pub model: String,
}

/// Per-document ingestion summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    /// Filename the chunks were attributed to.
    pub filename: String,
    /// Number of chunks indexed.
    pub num_chunks: usize,
}
