//! Vector store abstraction and backends.
//!
//! Both backends speak cosine distance so the retriever can convert every hit to a similarity
//! with `1 - distance` regardless of where the vectors live.

pub mod memory;
pub mod qdrant;
pub mod types;

use crate::config::{Config, VectorStoreKind};
use async_trait::async_trait;
use std::sync::Arc;

pub use memory::MemoryStore;
pub use qdrant::QdrantStore;
pub use types::{ChunkMetadata, IndexEntry, StoreError, StoredMatch};

/// Storage capability consumed by the retriever.
///
/// Implementations must make a single `upsert` batch and a `clear` atomic with respect to
/// concurrent callers.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Collection name reported in statistics.
    fn name(&self) -> &str;

    /// Insert or replace the supplied entries.
    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<(), StoreError>;

    /// Return up to `k` entries ranked by ascending cosine distance to `vector`.
    async fn query(&self, vector: Vec<f32>, k: usize) -> Result<Vec<StoredMatch>, StoreError>;

    /// Number of stored entries.
    async fn count(&self) -> Result<usize, StoreError>;

    /// Remove every entry, leaving an empty and immediately usable collection.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// Build the configured vector store, creating the backing collection when needed.
pub async fn build_vector_store(config: &Config) -> Result<Arc<dyn VectorStore>, StoreError> {
    match config.vector_store {
        VectorStoreKind::Memory => {
            tracing::info!(
                collection = %config.qdrant_collection_name,
                dimension = config.embedding_dimension,
                "Using in-memory vector store"
            );
            Ok(Arc::new(MemoryStore::new(
                config.qdrant_collection_name.clone(),
                config.embedding_dimension,
            )))
        }
        VectorStoreKind::Qdrant => {
            let store = QdrantStore::connect(config).await?;
            Ok(Arc::new(store))
        }
    }
}
