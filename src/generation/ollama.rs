use super::{GenerationError, Generator, TEMPERATURE, error_from_status, non_empty};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

pub(crate) const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";

/// Local Ollama runtime client (`POST /api/generate`, non-streaming).
pub struct OllamaGenerator {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaGenerator {
    /// Create a client targeting `base_url`.
    pub fn new(http: Client, base_url: String, model: String) -> Self {
        Self {
            http,
            base_url,
            model,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, GenerationError> {
        let payload = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": TEMPERATURE,
                "num_predict": max_tokens,
            }
        });

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                GenerationError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(GenerationError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            return Err(error_from_status("Ollama", response).await);
        }

        let body: OllamaResponse = response.json().await.map_err(|error| {
            GenerationError::InvalidResponse(format!("failed to decode Ollama response: {error}"))
        })?;

        if !body.done {
            return Err(GenerationError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        non_empty(body.response)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
