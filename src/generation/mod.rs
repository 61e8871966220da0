//! Text generation capability used for answer synthesis.
//!
//! Every provider implements [`Generator`]; [`build_generator`] picks one from configuration
//! when the service is constructed so the synthesis code never branches on provider names.

mod anthropic;
mod google;
mod ollama;
mod openai;

use crate::config::{Config, LlmProvider};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use anthropic::AnthropicGenerator;
pub use google::GoogleGenerator;
pub use ollama::OllamaGenerator;
pub use openai::OpenAiGenerator;

/// Sampling temperature shared by every provider.
pub(crate) const TEMPERATURE: f32 = 0.7;

/// System instruction sent by providers that accept one separately from the prompt.
pub(crate) const SYSTEM_PROMPT: &str =
    "You are a helpful assistant that answers questions based on provided documents.";

/// Errors surfaced while generating text.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Provider could not be constructed from the current configuration.
    #[error("Language model provider misconfigured: {0}")]
    Misconfigured(String),
    /// Provider was unreachable.
    #[error("Language model provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider answered with an error status.
    #[error("Failed to generate text: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
    /// Provider returned no text.
    #[error("Language model returned an empty response")]
    EmptyResponse,
}

/// Interface implemented by language model providers.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a completion for `prompt` using at most `max_tokens` output tokens.
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, GenerationError>;

    /// Model identifier reported alongside answers.
    fn model(&self) -> &str;
}

/// Build the generator selected by `LLM_PROVIDER`.
pub fn build_generator(config: &Config) -> Result<Arc<dyn Generator>, GenerationError> {
    let http = Client::builder()
        .user_agent("kbsearch/generate")
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|error| GenerationError::Misconfigured(error.to_string()))?;
    let model = config.llm_model.clone();

    tracing::debug!(provider = ?config.llm_provider, model = %model, "Building generator");
    let generator: Arc<dyn Generator> = match config.llm_provider {
        LlmProvider::OpenAI => Arc::new(OpenAiGenerator::new(
            http,
            openai::DEFAULT_BASE_URL.to_string(),
            require_key(config.openai_api_key.as_deref(), "OPENAI_API_KEY")?,
            model,
        )),
        LlmProvider::Anthropic => Arc::new(AnthropicGenerator::new(
            http,
            anthropic::DEFAULT_BASE_URL.to_string(),
            require_key(config.anthropic_api_key.as_deref(), "ANTHROPIC_API_KEY")?,
            model,
        )),
        LlmProvider::Google => Arc::new(GoogleGenerator::new(
            http,
            google::DEFAULT_BASE_URL.to_string(),
            require_key(config.google_api_key.as_deref(), "GOOGLE_API_KEY")?,
            model,
        )),
        LlmProvider::Ollama => Arc::new(OllamaGenerator::new(
            http,
            config
                .ollama_url
                .clone()
                .unwrap_or_else(|| ollama::DEFAULT_BASE_URL.to_string()),
            model,
        )),
    };
    Ok(generator)
}

fn require_key(value: Option<&str>, variable: &str) -> Result<String, GenerationError> {
    value
        .map(str::to_string)
        .ok_or_else(|| GenerationError::Misconfigured(format!("{variable} is not set")))
}

/// Trim provider output and reject blank completions.
pub(crate) fn non_empty(text: String) -> Result<String, GenerationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(GenerationError::EmptyResponse)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Map a failed HTTP exchange into a [`GenerationError`].
pub(crate) async fn error_from_status(
    provider: &str,
    response: reqwest::Response,
) -> GenerationError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(provider, %status, "Language model request failed");
    GenerationError::GenerationFailed(format!("{provider} returned {status}: {body}"))
}
