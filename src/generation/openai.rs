use super::{
    GenerationError, Generator, SYSTEM_PROMPT, TEMPERATURE, error_from_status, non_empty,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub(crate) const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// OpenAI chat completions client.
pub struct OpenAiGenerator {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiGenerator {
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
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, GenerationError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens,
            temperature: TEMPERATURE,
        };

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|error| {
                GenerationError::ProviderUnavailable(format!("failed to reach OpenAI: {error}"))
            })?;

        if !response.status().is_success() {
            return Err(error_from_status("OpenAI", response).await);
        }

        let body: ChatCompletionResponse = response.json().await.map_err(|error| {
            GenerationError::InvalidResponse(format!("failed to decode OpenAI response: {error}"))
        })?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        non_empty(content)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    #[tokio::test]
    async fn sends_system_and_user_messages() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .header("authorization", "Bearer sk-test")
                    .json_body_partial(r#"{"model":"gpt-4o-mini","max_tokens":500}"#)
                    .body_contains("\"role\":\"system\"");
                then.status(200).json_body(json!({
                    "choices": [
                        { "message": { "role": "assistant", "content": "  Cats sit. \n" } }
                    ]
                }));
            })
            .await;

        let generator = OpenAiGenerator::new(
            Client::new(),
            server.base_url(),
            "sk-test".into(),
            "gpt-4o-mini".into(),
        );
        let answer = generator.generate("prompt", 500).await.expect("answer");

        mock.assert();
        assert_eq!(answer, "Cats sit.");
    }

    #[tokio::test]
    async fn rate_limit_is_a_generation_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(429).body("slow down");
            })
            .await;

        let generator = OpenAiGenerator::new(
            Client::new(),
            server.base_url(),
            "sk-test".into(),
            "gpt-4o-mini".into(),
        );
        let error = generator.generate("prompt", 10).await.expect_err("429");

        assert!(matches!(error, GenerationError::GenerationFailed(message) if message.contains("429")));
    }
}
