use crate::error::LlmError;
use crate::llm::TextGenerator;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;
const TEMPERATURE: f32 = 0.7;

#[derive(Debug, Serialize, Clone)]
pub struct AnthropicMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: ErrorDetails,
}

#[derive(Debug, Deserialize)]
struct ErrorDetails {
    message: String,
    #[serde(rename = "type")]
    error_type: String,
}

pub struct AnthropicClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: ANTHROPIC_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl TextGenerator for AnthropicClient {
    async fn generate_text(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String, LlmError> {
        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            system: system_prompt.map(|s| s.to_string()),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: TEMPERATURE,
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;

            // Try to parse structured error
            if let Ok(parsed_error) = serde_json::from_str::<AnthropicError>(&error_text) {
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message: format!(
                        "Anthropic API error ({}): {} - {}",
                        status, parsed_error.error.error_type, parsed_error.error.message
                    ),
                });
            }

            return Err(LlmError::Api {
                status: status.as_u16(),
                message: format!("Anthropic API error ({}): {}", status, error_text),
            });
        }

        let completion: MessagesResponse = response.json().await?;

        completion
            .content
            .into_iter()
            .filter(|c| c.content_type == "text")
            .last()
            .and_then(|c| c.text)
            .ok_or(LlmError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> AnthropicClient {
        AnthropicClient::new("sk-test", "claude-sonnet-4-20250514", Duration::from_secs(5))
            .unwrap()
            .with_base_url(&server.uri())
    }

    #[tokio::test]
    async fn test_generate_text_sends_system_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-test"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .and(body_partial_json(serde_json::json!({
                "system": "be brief",
                "max_tokens": MAX_TOKENS,
                "temperature": 0.7
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": [{ "type": "text", "text": "Nice work today." }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = client_for(&server).generate_text("done", Some("be brief")).await.unwrap();
        assert_eq!(text, "Nice work today.");
    }

    #[tokio::test]
    async fn test_structured_error_keeps_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "type": "error",
                "error": { "type": "rate_limit_error", "message": "Slow down" }
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).generate_text("hi", None).await.unwrap_err();
        let text = err.to_string();
        assert!(text.contains("429"));
        assert!(text.contains("rate_limit_error"));
    }

    #[tokio::test]
    async fn test_no_text_block_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "content": [] })))
            .mount(&server)
            .await;

        let err = client_for(&server).generate_text("hi", None).await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse));
    }
}
