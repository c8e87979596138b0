//! OpenAI (GPT) provider implementation.
//!
//! Chat models go through `/chat/completions`; legacy completion models get
//! the transcript flattened into a single prompt and go through `/completions`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use parley_core::error::ProviderError;
use parley_core::{CallShape, Message};

use crate::traits::{CompletionRequest, CompletionResponse, Provider, Usage};

/// Default OpenAI API base URL.
const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// Token cap for legacy completion calls.
const COMPLETION_MAX_TOKENS: u32 = 100;

/// OpenAI provider for GPT models.
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Option<Duration>,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: OPENAI_API_URL.to_string(),
            timeout: None,
        }
    }

    /// Set a custom base URL (for compatible endpoints).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set a per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        self.timeout = Some(timeout);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn chat_body(&self, request: &CompletionRequest) -> ChatRequest {
        ChatRequest {
            model: request.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }

    fn completion_body(&self, request: &CompletionRequest) -> LegacyCompletionRequest {
        LegacyCompletionRequest {
            model: request.model.clone(),
            prompt: completion_prompt(&request.messages),
            temperature: request.temperature,
            max_tokens: request.max_tokens.unwrap_or(COMPLETION_MAX_TOKENS),
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }

    /// POST a JSON body and decode the JSON reply, mapping failures to provider errors.
    async fn post<B, R>(&self, path: &str, body: &B) -> anyhow::Result<R>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, path))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("OpenAI API error: {} - {}", status, error_text);
            return Err(ProviderError::api_error("openai", status.as_u16(), error_text).into());
        }

        Ok(response.json().await.map_err(|e| self.transport_error(e))?)
    }

    fn transport_error(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout {
                provider: "openai".to_string(),
                seconds: self.timeout.map(|t| t.as_secs()).unwrap_or_default(),
            }
        } else {
            ProviderError::NetworkError {
                provider: "openai".to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// Flatten a transcript into a completion prompt: one `role: content` line
/// per message, then an open `assistant: ` turn.
pub fn completion_prompt(messages: &[Message]) -> String {
    let mut prompt = messages
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join("\n");
    if !prompt.is_empty() {
        prompt.push('\n');
    }
    prompt.push_str("assistant: ");
    prompt
}

#[async_trait]
impl Provider for OpenAIProvider {
    fn id(&self) -> &str {
        "openai"
    }

    fn name(&self) -> &str {
        "OpenAI"
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    #[instrument(skip(self, request), fields(model = %request.model, shape = ?request.call_shape))]
    async fn complete(&self, request: CompletionRequest) -> anyhow::Result<CompletionResponse> {
        debug!(messages = request.messages.len(), "Sending request to OpenAI API");

        match request.call_shape {
            CallShape::Chat => {
                let body = self.chat_body(&request);
                let reply: ChatResponse = self.post("chat/completions", &body).await?;
                let usage = reply.usage.map(Usage::from).unwrap_or_default();
                let choice = reply.choices.into_iter().next().ok_or_else(|| {
                    ProviderError::EmptyResponse {
                        provider: "openai".to_string(),
                    }
                })?;
                Ok(CompletionResponse {
                    content: choice.message.content.unwrap_or_default(),
                    finish_reason: choice.finish_reason,
                    usage,
                })
            }
            CallShape::Completion => {
                let body = self.completion_body(&request);
                let reply: LegacyCompletionResponse = self.post("completions", &body).await?;
                let usage = reply.usage.map(Usage::from).unwrap_or_default();
                let choice = reply.choices.into_iter().next().ok_or_else(|| {
                    ProviderError::EmptyResponse {
                        provider: "openai".to_string(),
                    }
                })?;
                Ok(CompletionResponse {
                    content: choice.text.trim().to_string(),
                    finish_reason: choice.finish_reason,
                    usage,
                })
            }
        }
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    frequency_penalty: f32,
    presence_penalty: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct LegacyCompletionRequest {
    model: String,
    prompt: String,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LegacyCompletionResponse {
    choices: Vec<LegacyChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct LegacyChoice {
    text: String,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl From<OpenAIUsage> for Usage {
    fn from(u: OpenAIUsage) -> Self {
        Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_metadata() {
        let provider = OpenAIProvider::new("test-key");
        assert_eq!(provider.id(), "openai");
        assert_eq!(provider.name(), "OpenAI");
        assert!(provider.is_configured());
        assert!(!OpenAIProvider::new("").is_configured());
    }

    #[test]
    fn test_custom_base_url() {
        let provider = OpenAIProvider::new("test-key").with_base_url("http://localhost:8080/v1/");
        assert_eq!(provider.base_url(), "http://localhost:8080/v1");
    }

    #[test]
    fn test_completion_prompt_shape() {
        let messages = vec![Message::user("hi"), Message::assistant("hello")];
        assert_eq!(
            completion_prompt(&messages),
            "user: hi\nassistant: hello\nassistant: "
        );
        assert_eq!(completion_prompt(&[]), "assistant: ");
    }

    #[test]
    fn test_chat_body_has_zero_penalties() {
        let provider = OpenAIProvider::new("k");
        let request = CompletionRequest::new(
            "gpt-4",
            vec![Message::system("be brief"), Message::user("hi")],
            0.5,
            CallShape::Chat,
        );
        let body = serde_json::to_value(provider.chat_body(&request)).unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(body["frequency_penalty"], 0.0);
        assert_eq!(body["presence_penalty"], 0.0);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_completion_body_defaults() {
        let provider = OpenAIProvider::new("k");
        let request = CompletionRequest::new(
            "text-davinci-003",
            vec![Message::user("hi")],
            1.0,
            CallShape::Completion,
        );
        let body = serde_json::to_value(provider.completion_body(&request)).unwrap();
        assert_eq!(body["prompt"], "user: hi\nassistant: ");
        assert_eq!(body["max_tokens"], 100);
        assert_eq!(body["top_p"], 1.0);
    }

    #[test]
    fn test_parse_chat_response() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"Hi!"},"finish_reason":"stop"}],
                      "usage":{"prompt_tokens":9,"completion_tokens":2,"total_tokens":11}}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("Hi!"));
        assert_eq!(Usage::from(parsed.usage.unwrap()).output_tokens, 2);
    }
}
