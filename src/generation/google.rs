use super::{GenerationError, Generator, TEMPERATURE, error_from_status, non_empty};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

pub(crate) const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Google Gemini `generateContent` client.
///
/// Model identifiers may be given with or without the `models/` prefix.
pub struct GoogleGenerator {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GoogleGenerator {
    /// Create a client targeting `base_url`.
    pub fn new(http: Client, base_url: String, api_key: String, model: String) -> Self {
        Self {
            http,
            base_url,
            api_key,
            model,
        }
    }

    fn endpoint(&self) -> String {
        let model = self.model.trim_start_matches("models/");
        format!(
            "{}/v1beta/models/{model}:generateContent",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl Generator for GoogleGenerator {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, GenerationError> {
        let payload = json!({
            "contents": [
                { "role": "user", "parts": [{ "text": prompt }] }
            ],
            "generationConfig": {
                "temperature": TEMPERATURE,
                "maxOutputTokens": max_tokens,
            }
        });

        tracing::debug!(model = %self.model, "Calling Gemini API");
        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                GenerationError::ProviderUnavailable(format!("failed to reach Gemini: {error}"))
            })?;

        if !response.status().is_success() {
            return Err(error_from_status("Gemini", response).await);
        }

        let body: GenerateContentResponse = response.json().await.map_err(|error| {
            GenerationError::InvalidResponse(format!("failed to decode Gemini response: {error}"))
        })?;

        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        non_empty(text)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
