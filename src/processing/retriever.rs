//! Embedding-backed indexing and similarity search over a [`VectorStore`].

use crate::{
    embedding::EmbeddingClient,
    processing::types::{IndexError, IndexOutcome, IndexStats, SearchError, SearchResult},
    store::{ChunkMetadata, IndexEntry, VectorStore},
};
use std::sync::Arc;
use uuid::Uuid;

/// Turns chunks into stored vectors and queries into ranked, thresholded results.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    similarity_threshold: f32,
}

impl Retriever {
    /// Build a retriever over `store`, embedding with `embedder`.
    ///
    /// Results whose similarity falls below `similarity_threshold` are dropped by [`Self::search`].
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
        similarity_threshold: f32,
    ) -> Self {
        Self {
            embedder,
            store,
            similarity_threshold,
        }
    }

    /// Embed and store `chunks`, pairing each with the metadata at the same position.
    ///
    /// The whole batch fails if embedding fails or returns the wrong number of vectors; nothing
    /// is written in that case.
    pub async fn index(
        &self,
        chunks: Vec<String>,
        metadata: Vec<ChunkMetadata>,
    ) -> Result<IndexOutcome, IndexError> {
        if chunks.len() != metadata.len() {
            return Err(IndexError::MetadataMismatch {
                chunks: chunks.len(),
                metadata: metadata.len(),
            });
        }
        if chunks.is_empty() {
            return Ok(IndexOutcome::default());
        }

        let expected = chunks.len();
        let vectors = self.embedder.generate_embeddings(chunks.clone()).await?;
        if vectors.len() != expected {
            return Err(IndexError::CountMismatch {
                expected,
                actual: vectors.len(),
            });
        }

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(vectors)
            .zip(metadata)
            .map(|((document, vector), metadata)| IndexEntry {
                id: Uuid::new_v4().to_string(),
                vector,
                document,
                metadata,
            })
            .collect();
        let ids: Vec<String> = entries.iter().map(|entry| entry.id.clone()).collect();

        self.store.upsert(entries).await?;
        tracing::debug!(store = self.store.name(), count = ids.len(), "Chunks indexed");

        Ok(IndexOutcome {
            count: ids.len(),
            ids,
        })
    }

    /// Return up to `top_k` chunks most similar to `query`, best first.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>, SearchError> {
        let count = self.store.count().await?;
        if count == 0 || top_k == 0 {
            tracing::debug!(count, top_k, "Skipping search");
            return Ok(Vec::new());
        }

        let mut vectors = self
            .embedder
            .generate_embeddings(vec![query.to_string()])
            .await?;
        let vector = vectors.pop().ok_or(SearchError::EmptyEmbedding)?;

        let k = top_k.min(count);
        let matches = self.store.query(vector, k).await?;
        let received = matches.len();

        let results: Vec<SearchResult> = matches
            .into_iter()
            .map(|hit| SearchResult {
                document: hit.document,
                metadata: hit.metadata,
                similarity: 1.0 - hit.distance,
            })
            .filter(|result| result.similarity >= self.similarity_threshold)
            .collect();

        tracing::debug!(
            k,
            received,
            kept = results.len(),
            threshold = self.similarity_threshold,
            "Search completed"
        );
        Ok(results)
    }

    /// Remove every indexed chunk.
    pub async fn clear(&self) -> Result<(), crate::store::StoreError> {
        self.store.clear().await
    }

    /// Report the number of indexed chunks and the collection name.
    pub async fn stats(&self) -> Result<IndexStats, crate::store::StoreError> {
        Ok(IndexStats {
            total_chunks: self.store.count().await?,
            collection_name: self.store.name().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingClientError, HashedEmbeddingClient};
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    const DIMENSION: usize = 64;

    fn retriever(threshold: f32) -> Retriever {
        Retriever::new(
            Arc::new(HashedEmbeddingClient::new(DIMENSION)),
            Arc::new(MemoryStore::new("test", DIMENSION)),
            threshold,
        )
    }

    fn metadata_for(filename: &str, count: usize) -> Vec<ChunkMetadata> {
        (0..count)
            .map(|index| ChunkMetadata::new(filename, index, count))
            .collect()
    }

    struct ShortEmbedder;

    #[async_trait]
    impl EmbeddingClient for ShortEmbedder {
        async fn generate_embeddings(
            &self,
            _texts: Vec<String>,
        ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
            Ok(vec![vec![1.0; DIMENSION]])
        }
    }

    #[tokio::test]
    async fn indexes_and_ranks_matching_chunk_first() {
        let retriever = retriever(0.0);
        let chunks = vec![
            "The cat sat on the mat.".to_string(),
            "Dogs run in the park.".to_string(),
        ];
        let outcome = retriever
            .index(chunks, metadata_for("pets.txt", 2))
            .await
            .expect("index");
        assert_eq!(outcome.count, 2);
        assert_eq!(outcome.ids.len(), 2);
        assert_ne!(outcome.ids[0], outcome.ids[1]);

        let results = retriever
            .search("The cat sat on the mat.", 2)
            .await
            .expect("search");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document, "The cat sat on the mat.");
        assert_eq!(results[0].metadata.filename, "pets.txt");
        assert!(results[0].similarity >= results[1].similarity);
        assert!(
            results
                .iter()
                .all(|result| (0.0..=1.0 + f32::EPSILON).contains(&result.similarity))
        );
    }

    #[tokio::test]
    async fn short_sentences_are_found_by_keyword() {
        let retriever = retriever(0.0);
        let mut metadata = metadata_for("cat.txt", 1);
        metadata.extend(metadata_for("dog.txt", 1));
        retriever
            .index(
                vec!["The cat sat.".to_string(), "The dog ran.".to_string()],
                metadata,
            )
            .await
            .expect("index");

        let results = retriever.search("cat", 2).await.expect("search");
        let hit = results
            .iter()
            .find(|result| result.document.contains("cat"))
            .expect("cat sentence retrieved");
        assert_eq!(hit.metadata.filename, "cat.txt");
        assert!((0.0..=1.0 + f32::EPSILON).contains(&hit.similarity));
    }

    #[tokio::test]
    async fn empty_store_and_zero_top_k_return_nothing() {
        let retriever = retriever(0.0);
        assert!(retriever.search("anything", 5).await.unwrap().is_empty());

        retriever
            .index(vec!["text".into()], metadata_for("a.txt", 1))
            .await
            .unwrap();
        assert!(retriever.search("text", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn top_k_is_capped_by_store_size() {
        let retriever = retriever(0.0);
        let chunks: Vec<String> = (0..3).map(|i| format!("chunk number {i}")).collect();
        retriever
            .index(chunks, metadata_for("n.txt", 3))
            .await
            .unwrap();

        let results = retriever.search("chunk", 10).await.unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn threshold_filters_weak_matches() {
        let retriever = retriever(0.999);
        retriever
            .index(
                vec!["exact phrase".into(), "zzzzzzzzzzzzzzzzzzzzzzzzzzzzzz".into()],
                metadata_for("t.txt", 2),
            )
            .await
            .unwrap();

        let results = retriever.search("exact phrase", 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document, "exact phrase");
    }

    #[tokio::test]
    async fn empty_batch_skips_embedding() {
        let retriever = Retriever::new(
            Arc::new(ShortEmbedder),
            Arc::new(MemoryStore::new("test", DIMENSION)),
            0.0,
        );
        let outcome = retriever.index(Vec::new(), Vec::new()).await.unwrap();
        assert_eq!(outcome, IndexOutcome::default());
    }

    #[tokio::test]
    async fn vector_count_mismatch_is_rejected() {
        let store = Arc::new(MemoryStore::new("test", DIMENSION));
        let retriever = Retriever::new(Arc::new(ShortEmbedder), store.clone(), 0.0);

        let error = retriever
            .index(vec!["a".into(), "b".into()], metadata_for("x.txt", 2))
            .await
            .expect_err("mismatch");
        assert!(matches!(
            error,
            IndexError::CountMismatch {
                expected: 2,
                actual: 1
            }
        ));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn metadata_length_must_match() {
        let error = retriever(0.0)
            .index(vec!["a".into()], Vec::new())
            .await
            .expect_err("mismatch");
        assert!(matches!(error, IndexError::MetadataMismatch { .. }));
    }

    #[tokio::test]
    async fn clear_then_reindex() {
        let retriever = retriever(0.0);
        retriever
            .index(vec!["first".into()], metadata_for("a.txt", 1))
            .await
            .unwrap();
        retriever.clear().await.unwrap();

        let stats = retriever.stats().await.unwrap();
        assert_eq!(stats.total_chunks, 0);
        assert_eq!(stats.collection_name, "test");
        assert!(retriever.search("first", 5).await.unwrap().is_empty());

        retriever
            .index(vec!["second".into()], metadata_for("b.txt", 1))
            .await
            .unwrap();
        let results = retriever.search("second", 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].metadata.filename, "b.txt");
    }
}
