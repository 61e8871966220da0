//! Retrieval pipeline: chunking, indexing, similarity search, and answer synthesis.

pub mod chunking;
mod retriever;
mod service;
pub mod synthesis;
pub mod types;

pub use retriever::Retriever;
pub use service::{KnowledgeBase, KnowledgeBaseApi, KnowledgeBaseSettings};
pub use synthesis::{NO_RESULTS_ANSWER, Synthesizer};
pub use types::{
    Answer, Chunk, ChunkingError, IndexError, IndexOutcome, IndexStats, IngestOutcome,
    PipelineError, QueryAnswer, SearchError, SearchResult,
};
