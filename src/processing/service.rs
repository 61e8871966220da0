//! Knowledge base service coordinating extraction, chunking, retrieval, and synthesis.

use crate::{
    config::Config,
    embedding::{EmbeddingClient, build_embedding_client},
    extract::{DocumentExtractor, ExtractionError, TextExtractor},
    generation::{Generator, build_generator},
    metrics::{MetricsSnapshot, PipelineMetrics},
    processing::{
        chunking::{chunk_document, clean_text},
        retriever::Retriever,
        synthesis::Synthesizer,
        types::{IndexStats, IngestOutcome, PipelineError, QueryAnswer, SearchResult},
    },
    store::{ChunkMetadata, VectorStore, build_vector_store},
};
use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;

/// Tunables the service applies to every request.
#[derive(Debug, Clone, Copy)]
pub struct KnowledgeBaseSettings {
    /// Chunk window in characters.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks.
    pub chunk_overlap: usize,
    /// Default number of results per search.
    pub top_k: usize,
    /// Minimum similarity for a result to be kept.
    pub similarity_threshold: f32,
    /// Output token budget for generated answers.
    pub max_answer_tokens: u32,
    /// Upload size limit in megabytes.
    pub max_file_size_mb: usize,
}

impl KnowledgeBaseSettings {
    /// Upload size limit expressed in bytes.
    pub fn max_file_size_bytes(&self) -> usize {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

impl From<&Config> for KnowledgeBaseSettings {
    fn from(config: &Config) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            top_k: config.top_k_results,
            similarity_threshold: config.similarity_threshold,
            max_answer_tokens: config.max_answer_tokens,
            max_file_size_mb: config.max_file_size_mb,
        }
    }
}

/// Owns the retrieval pipeline shared by the HTTP and MCP surfaces.
///
/// Construct once near process start (see [`KnowledgeBase::from_config`]) and share it through
/// an `Arc`; every request reuses the same embedder, store, and generator handles.
pub struct KnowledgeBase {
    extractor: Arc<dyn TextExtractor>,
    retriever: Retriever,
    synthesizer: Synthesizer,
    settings: KnowledgeBaseSettings,
    metrics: PipelineMetrics,
}

/// Abstraction over the knowledge base used by external surfaces (HTTP, MCP).
#[async_trait]
pub trait KnowledgeBaseApi: Send + Sync {
    /// Extract, clean, chunk, and index an uploaded file.
    async fn ingest_file(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> Result<IngestOutcome, PipelineError>;

    /// Clean, chunk, and index already-extracted text.
    async fn ingest_document(
        &self,
        filename: &str,
        text: &str,
    ) -> Result<IngestOutcome, PipelineError>;

    /// Retrieve the chunks most similar to `query`.
    async fn search(
        &self,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<SearchResult>, PipelineError>;

    /// Retrieve context for `query` and synthesise an answer from it.
    async fn ask(&self, query: &str, top_k: Option<usize>) -> Result<QueryAnswer, PipelineError>;

    /// Report the indexed chunk count and collection name.
    async fn stats(&self) -> Result<IndexStats, PipelineError>;

    /// Drop every indexed chunk.
    async fn clear(&self) -> Result<(), PipelineError>;

    /// Send a short probe to the language model.
    async fn check_generator(&self) -> Result<String, PipelineError>;

    /// Identifier of the answering model.
    fn model(&self) -> String;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl KnowledgeBase {
    /// Assemble a knowledge base from explicit collaborators.
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn Generator>,
        settings: KnowledgeBaseSettings,
    ) -> Self {
        Self {
            extractor: Arc::new(DocumentExtractor::default()),
            retriever: Retriever::new(embedder, store, settings.similarity_threshold),
            synthesizer: Synthesizer::new(generator, settings.max_answer_tokens),
            settings,
            metrics: PipelineMetrics::new(),
        }
    }

    /// Build every collaborator from configuration.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        tracing::info!("Initializing embedding client");
        let embedder =
            build_embedding_client(config).context("failed to build embedding client")?;
        let store = build_vector_store(config)
            .await
            .context("failed to initialize vector store")?;
        let generator = build_generator(config).context("failed to build language model client")?;
        tracing::info!(
            store = store.name(),
            model = generator.model(),
            "Knowledge base ready"
        );

        Ok(Self::new(embedder, store, generator, config.into()))
    }
}

#[async_trait]
impl KnowledgeBaseApi for KnowledgeBase {
    async fn ingest_file(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> Result<IngestOutcome, PipelineError> {
        if bytes.len() > self.settings.max_file_size_bytes() {
            let limit_mb = self.settings.max_file_size_mb;
            tracing::warn!(filename, size = bytes.len(), limit_mb, "Upload too large");
            return Err(ExtractionError::TooLarge { limit_mb }.into());
        }

        // PDF parsing is CPU-bound and touches the filesystem.
        let extractor = Arc::clone(&self.extractor);
        let name = filename.to_string();
        let body = bytes.to_vec();
        let text = tokio::task::spawn_blocking(move || extractor.extract(&name, &body))
            .await
            .map_err(|error| ExtractionError::failed(filename, error))??;
        self.ingest_document(filename, &text).await
    }

    async fn ingest_document(
        &self,
        filename: &str,
        text: &str,
    ) -> Result<IngestOutcome, PipelineError> {
        tracing::info!(filename, "Processing document");
        let cleaned = clean_text(text);
        if cleaned.is_empty() {
            return Err(ExtractionError::EmptyDocument(filename.to_string()).into());
        }

        let chunks = chunk_document(
            filename,
            &cleaned,
            self.settings.chunk_size,
            self.settings.chunk_overlap,
        )?;
        let total = chunks.len();
        let (texts, metadata): (Vec<String>, Vec<ChunkMetadata>) = chunks
            .into_iter()
            .map(|chunk| {
                let metadata = ChunkMetadata::new(chunk.filename, chunk.index, total);
                (chunk.text, metadata)
            })
            .unzip();

        let outcome = self.retriever.index(texts, metadata).await?;
        self.metrics.record_document(outcome.count as u64);
        tracing::info!(
            filename,
            chunks = outcome.count,
            chunk_size = self.settings.chunk_size,
            overlap = self.settings.chunk_overlap,
            "Document indexed"
        );

        Ok(IngestOutcome {
            filename: filename.to_string(),
            num_chunks: outcome.count,
        })
    }

    async fn search(
        &self,
        query: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<SearchResult>, PipelineError> {
        let top_k = top_k.unwrap_or(self.settings.top_k);
        Ok(self.retriever.search(query, top_k).await?)
    }

    async fn ask(&self, query: &str, top_k: Option<usize>) -> Result<QueryAnswer, PipelineError> {
        let sources = self.search(query, top_k).await?;
        let answer = self.synthesizer.synthesize(query, &sources).await?;
        self.metrics.record_query();
        tracing::info!(
            sources = answer.source_count,
            model = %answer.model,
            "Query answered"
        );

        Ok(QueryAnswer {
            answer: answer.answer,
            query: query.to_string(),
            num_sources: sources.len(),
            sources,
            model: answer.model,
        })
    }

    async fn stats(&self) -> Result<IndexStats, PipelineError> {
        Ok(self.retriever.stats().await?)
    }

    async fn clear(&self) -> Result<(), PipelineError> {
        self.retriever.clear().await?;
        self.metrics.reset_ingestion();
        tracing::info!("Knowledge base cleared");
        Ok(())
    }

    async fn check_generator(&self) -> Result<String, PipelineError> {
        Ok(self.synthesizer.probe().await?)
    }

    fn model(&self) -> String {
        self.synthesizer.model().to_string()
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
