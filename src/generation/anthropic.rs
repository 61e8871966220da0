use super::{GenerationError, Generator, TEMPERATURE, error_from_status, non_empty};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub(crate) const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic messages API client.
pub struct AnthropicGenerator {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnthropicGenerator {
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
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl Generator for AnthropicGenerator {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String, GenerationError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens,
            temperature: TEMPERATURE,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .http
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|error| {
                GenerationError::ProviderUnavailable(format!("failed to reach Anthropic: {error}"))
            })?;

        if !response.status().is_success() {
            return Err(error_from_status("Anthropic", response).await);
        }

        let body: MessagesResponse = response.json().await.map_err(|error| {
            GenerationError::InvalidResponse(format!(
                "failed to decode Anthropic response: {error}"
            ))
        })?;

        let text = body
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");
        non_empty(text)
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
    async fn joins_text_blocks_and_sends_version_header() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/messages")
                    .header("x-api-key", "ak-test")
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .json_body_partial(r#"{"max_tokens":64}"#);
                then.status(200).json_body(json!({
                    "content": [
                        { "type": "text", "text": "The cat " },
                        { "type": "text", "text": "sat." }
                    ]
                }));
            })
            .await;

        let generator = AnthropicGenerator::new(
            Client::new(),
            server.base_url(),
            "ak-test".into(),
            "claude-3-5-haiku-latest".into(),
        );
        let answer = generator.generate("prompt", 64).await.expect("answer");

        mock.assert();
        assert_eq!(answer, "The cat sat.");
    }

    #[tokio::test]
    async fn empty_content_is_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(200).json_body(json!({ "content": [] }));
            })
            .await;

        let generator = AnthropicGenerator::new(
            Client::new(),
            server.base_url(),
            "ak-test".into(),
            "claude-3-5-haiku-latest".into(),
        );
        let error = generator.generate("prompt", 64).await.expect_err("empty");

        assert!(matches!(error, GenerationError::EmptyResponse));
    }
}
