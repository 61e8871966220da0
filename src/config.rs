use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
    /// Individually valid values that cannot be used together.
    #[error("Inconsistent configuration: {0}")]
    Inconsistent(String),
}

/// Runtime configuration for the knowledge base service.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Backend that stores embedded chunks.
    pub vector_store: VectorStoreKind,
    /// Base URL of the Qdrant instance (used when `vector_store` is `qdrant`).
    pub qdrant_url: String,
    /// Name of the collection holding indexed chunks.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Base URL of the Ollama runtime, shared by embeddings and generation.
    pub ollama_url: Option<String>,
    /// API key for OpenAI embeddings and chat completions.
    pub openai_api_key: Option<String>,
    /// API key for the Anthropic messages API.
    pub anthropic_api_key: Option<String>,
    /// API key for the Google Gemini API.
    pub google_api_key: Option<String>,
    /// Language model provider used for answer synthesis.
    pub llm_provider: LlmProvider,
    /// Model identifier passed to the language model provider.
    pub llm_model: String,
    /// Token budget for synthesized answers.
    pub max_answer_tokens: u32,
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,
    /// Upload size limit in megabytes.
    pub max_file_size_mb: usize,
    /// Default number of neighbours requested per query.
    pub top_k_results: usize,
    /// Minimum similarity a search result must reach to be returned.
    pub similarity_threshold: f32,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Timeout applied to outbound provider and Qdrant requests.
    pub request_timeout_secs: u64,
}

/// Supported vector store backends.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreKind {
    /// Process-local cosine index; contents vanish on restart.
    Memory,
    /// Qdrant collection reached over HTTP.
    Qdrant,
}

/// Supported embedding backends for the processing pipeline.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Deterministic offline byte-hash encoder.
    Hashed,
    /// Local Ollama runtime.
    Ollama,
    /// Hosted OpenAI embeddings API.
    OpenAI,
}

/// Supported language model providers for answer synthesis.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// OpenAI chat completions.
    OpenAI,
    /// Anthropic messages API.
    Anthropic,
    /// Google Gemini `generateContent`.
    Google,
    /// Local Ollama `/api/generate`.
    Ollama,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            vector_store: parse_or("VECTOR_STORE", VectorStoreKind::Memory)?,
            qdrant_url: load_env_or("QDRANT_URL", "http://127.0.0.1:6333"),
            qdrant_collection_name: load_env_or("QDRANT_COLLECTION_NAME", "knowledge_base"),
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            embedding_provider: parse_or("EMBEDDING_PROVIDER", EmbeddingProvider::Hashed)?,
            embedding_model: load_env_or("EMBEDDING_MODEL", "all-minilm"),
            embedding_dimension: parse_or("EMBEDDING_DIMENSION", 384)?,
            ollama_url: load_env_optional("OLLAMA_URL"),
            openai_api_key: load_env_optional("OPENAI_API_KEY"),
            anthropic_api_key: load_env_optional("ANTHROPIC_API_KEY"),
            google_api_key: load_env_optional("GOOGLE_API_KEY"),
            llm_provider: parse_or("LLM_PROVIDER", LlmProvider::Google)?,
            llm_model: load_env_or("LLM_MODEL", "models/gemini-2.0-flash"),
            max_answer_tokens: parse_or("MAX_ANSWER_TOKENS", 500)?,
            chunk_size: parse_or("CHUNK_SIZE", 1000)?,
            chunk_overlap: parse_or("CHUNK_OVERLAP", 200)?,
            max_file_size_mb: parse_or("MAX_FILE_SIZE_MB", 10)?,
            top_k_results: parse_or("TOP_K_RESULTS", 5)?,
            similarity_threshold: parse_or("SIMILARITY_THRESHOLD", 0.0)?,
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
            request_timeout_secs: parse_or("REQUEST_TIMEOUT_SECS", 60)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that individual parsers cannot see.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidValue("CHUNK_SIZE".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::Inconsistent(format!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".into()));
        }
        if !self.similarity_threshold.is_finite() {
            return Err(ConfigError::InvalidValue("SIMILARITY_THRESHOLD".into()));
        }
        Ok(())
    }
}

fn load_env_or(key: &str, default: &str) -> String {
    load_env_optional(key).unwrap_or_else(|| default.to_string())
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

impl FromStr for VectorStoreKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "in-memory" => Ok(Self::Memory),
            "qdrant" => Ok(Self::Qdrant),
            _ => Err(()),
        }
    }
}

impl FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hashed" => Ok(Self::Hashed),
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            _ => Err(()),
        }
    }
}

impl FromStr for LlmProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "google" | "gemini" => Ok(Self::Google),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Load configuration from the environment and install it in the global cache.
///
/// Subsequent calls return the cached value without re-reading the environment.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        vector_store = ?config.vector_store,
        collection = %config.qdrant_collection_name,
        embedding_provider = ?config.embedding_provider,
        llm_provider = ?config.llm_provider,
        chunk_size = config.chunk_size,
        chunk_overlap = config.chunk_overlap,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        vector_store: VectorStoreKind::Memory,
        qdrant_url: "http://127.0.0.1:6333".into(),
        qdrant_collection_name: "knowledge_base".into(),
        qdrant_api_key: None,
        embedding_provider: EmbeddingProvider::Hashed,
        embedding_model: "all-minilm".into(),
        embedding_dimension: 64,
        ollama_url: None,
        openai_api_key: None,
        anthropic_api_key: None,
        google_api_key: None,
        llm_provider: LlmProvider::Ollama,
        llm_model: "llama3".into(),
        max_answer_tokens: 500,
        chunk_size: 1000,
        chunk_overlap: 200,
        max_file_size_mb: 10,
        top_k_results: 5,
        similarity_threshold: 0.0,
        server_port: None,
        request_timeout_secs: 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn providers_parse_case_insensitively() {
        assert_eq!(
            "OpenAI".parse::<EmbeddingProvider>(),
            Ok(EmbeddingProvider::OpenAI)
        );
        assert_eq!("gemini".parse::<LlmProvider>(), Ok(LlmProvider::Google));
        assert_eq!(
            "Qdrant".parse::<VectorStoreKind>(),
            Ok(VectorStoreKind::Qdrant)
        );
        assert!("chroma".parse::<VectorStoreKind>().is_err());
    }

    #[test]
    fn validate_rejects_overlap_not_smaller_than_chunk_size() {
        let mut config = test_config();
        config.chunk_overlap = config.chunk_size;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Inconsistent(_))
        ));
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(test_config().validate().is_ok());
    }
}
