//! Embedding client abstraction and provider adapters.
//!
//! The retriever only sees [`EmbeddingClient`]; which adapter backs it is decided once by
//! [`build_embedding_client`] from the loaded configuration.

use crate::config::{Config, EmbeddingProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// Provider could not be constructed from the current configuration.
    #[error("Embedding provider misconfigured: {0}")]
    Misconfigured(String),
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied chunk of text, preserving order.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Deterministic offline encoder that folds UTF-8 bytes into a fixed-size unit vector.
///
/// Texts sharing byte patterns at the same offsets score as similar; good enough for local runs
/// and tests, not a semantic model.
pub struct HashedEmbeddingClient {
    dimension: usize,
}

impl HashedEmbeddingClient {
    /// Construct an encoder producing vectors of `dimension` components.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(text: &str, dimension: usize) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; dimension];

        if text.is_empty() {
            return embedding;
        }

        for (idx, byte) in text.bytes().enumerate() {
            embedding[idx % dimension] += f32::from(byte) / 255.0;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();

        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingClient for HashedEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if self.dimension == 0 {
            return Err(EmbeddingClientError::GenerationFailed(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }

        tracing::trace!(
            count = texts.len(),
            dimension = self.dimension,
            "Hashing embeddings"
        );

        Ok(texts
            .iter()
            .map(|text| Self::encode(text, self.dimension))
            .collect())
    }
}

/// Embedding adapter for a local Ollama runtime (`POST /api/embed`).
pub struct OllamaEmbeddingClient {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaEmbeddingClient {
    /// Create a client targeting `base_url` with the given model.
    pub fn new(http: Client, base_url: String, model: String) -> Self {
        Self {
            http,
            base_url,
            model,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/embed", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingClient for OllamaEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        let response = self
            .http
            .post(self.endpoint())
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .await
            .map_err(|error| {
                EmbeddingClientError::GenerationFailed(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaEmbedResponse = response.json().await.map_err(|error| {
            EmbeddingClientError::GenerationFailed(format!(
                "failed to decode Ollama embeddings: {error}"
            ))
        })?;
        Ok(body.embeddings)
    }
}

/// Embedding adapter for the OpenAI embeddings API (`POST /v1/embeddings`).
pub struct OpenAiEmbeddingClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbeddingClient {
    /// Create a client targeting `base_url` with the given key and model.
    pub fn new(http: Client, base_url: String, api_key: String, model: String) -> Self {
        Self {
            http,
            base_url,
            api_key,
            model,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/embeddings", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Deserialize)]
struct OpenAiEmbedding {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .await
            .map_err(|error| {
                EmbeddingClientError::GenerationFailed(format!(
                    "failed to reach OpenAI embeddings: {error}"
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "OpenAI returned {status}: {body}"
            )));
        }

        let mut body: OpenAiEmbeddingResponse = response.json().await.map_err(|error| {
            EmbeddingClientError::GenerationFailed(format!(
                "failed to decode OpenAI embeddings: {error}"
            ))
        })?;
        body.data.sort_by_key(|item| item.index);
        Ok(body.data.into_iter().map(|item| item.embedding).collect())
    }
}

/// Build an embedding client suitable for the supplied configuration.
pub fn build_embedding_client(
    config: &Config,
) -> Result<Arc<dyn EmbeddingClient>, EmbeddingClientError> {
    tracing::debug!(
        provider = ?config.embedding_provider,
        model = %config.embedding_model,
        dimension = config.embedding_dimension,
        "Building embedding client"
    );
    match config.embedding_provider {
        EmbeddingProvider::Hashed => Ok(Arc::new(HashedEmbeddingClient::new(
            config.embedding_dimension,
        ))),
        EmbeddingProvider::Ollama => {
            let base_url = config
                .ollama_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
            Ok(Arc::new(OllamaEmbeddingClient::new(
                http_client(config)?,
                base_url,
                config.embedding_model.clone(),
            )))
        }
        EmbeddingProvider::OpenAI => {
            let api_key = config.openai_api_key.clone().ok_or_else(|| {
                EmbeddingClientError::Misconfigured("OPENAI_API_KEY is not set".into())
            })?;
            Ok(Arc::new(OpenAiEmbeddingClient::new(
                http_client(config)?,
                DEFAULT_OPENAI_URL.to_string(),
                api_key,
                config.embedding_model.clone(),
            )))
        }
    }
}

fn http_client(config: &Config) -> Result<Client, EmbeddingClientError> {
    Client::builder()
        .user_agent("kbsearch/embedding")
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|error| EmbeddingClientError::Misconfigured(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    #[tokio::test]
    async fn hashed_client_returns_unit_vectors_in_order() {
        let client = HashedEmbeddingClient::new(16);
        let vectors = client
            .generate_embeddings(vec!["alpha".into(), String::new(), "beta".into()])
            .await
            .expect("embeddings");

        assert_eq!(vectors.len(), 3);
        assert!(vectors.iter().all(|vector| vector.len() == 16));
        let norm: f32 = vectors[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert!(vectors[1].iter().all(|v| *v == 0.0));
        assert_ne!(vectors[0], vectors[2]);
    }

    #[tokio::test]
    async fn hashed_client_rejects_zero_dimension() {
        let error = HashedEmbeddingClient::new(0)
            .generate_embeddings(vec!["alpha".into()])
            .await
            .expect_err("zero dimension");
        assert!(error.to_string().contains("dimension"));
    }

    #[tokio::test]
    async fn ollama_client_parses_embeddings() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/embed")
                    .json_body_partial(r#"{"model":"all-minilm"}"#);
                then.status(200)
                    .json_body(json!({ "embeddings": [[0.1, 0.2], [0.3, 0.4]] }));
            })
            .await;

        let client = OllamaEmbeddingClient::new(
            Client::new(),
            server.base_url(),
            "all-minilm".into(),
        );
        let vectors = client
            .generate_embeddings(vec!["a".into(), "b".into()])
            .await
            .expect("embeddings");

        mock.assert();
        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[tokio::test]
    async fn openai_client_restores_input_order() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/embeddings")
                    .header("authorization", "Bearer sk-test");
                then.status(200).json_body(json!({
                    "data": [
                        { "index": 1, "embedding": [0.0, 1.0] },
                        { "index": 0, "embedding": [1.0, 0.0] }
                    ]
                }));
            })
            .await;

        let client = OpenAiEmbeddingClient::new(
            Client::new(),
            server.base_url(),
            "sk-test".into(),
            "text-embedding-3-small".into(),
        );
        let vectors = client
            .generate_embeddings(vec!["first".into(), "second".into()])
            .await
            .expect("embeddings");

        mock.assert();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn openai_client_surfaces_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/embeddings");
                then.status(401).body("bad key");
            })
            .await;

        let client = OpenAiEmbeddingClient::new(
            Client::new(),
            server.base_url(),
            "sk-test".into(),
            "text-embedding-3-small".into(),
        );
        let error = client
            .generate_embeddings(vec!["first".into()])
            .await
            .expect_err("error status");

        assert!(error.to_string().contains("401"));
    }
}
