//! Provider trait definitions.

use async_trait::async_trait;
use parley_core::{CallShape, Message};
use serde::{Deserialize, Serialize};

/// Request for a completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model to use
    pub model: String,
    /// Messages in the conversation
    pub messages: Vec<Message>,
    /// Sampling temperature
    pub temperature: f32,
    /// Endpoint shape the model expects
    pub call_shape: CallShape,
    /// Maximum tokens to generate (provider default when unset)
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(
        model: impl Into<String>,
        messages: Vec<Message>,
        temperature: f32,
        call_shape: CallShape,
    ) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature,
            call_shape,
            max_tokens: None,
        }
    }
}

/// Response from a completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Response text
    pub content: String,
    /// Finish reason as reported by the provider
    pub finish_reason: Option<String>,
    /// Usage statistics
    #[serde(default)]
    pub usage: Usage,
}

/// Token usage statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Input tokens used
    pub input_tokens: u32,
    /// Output tokens generated
    pub output_tokens: u32,
}

/// Core provider trait - every text-generation service implements this.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider identifier, matched against `ModelProfile::provider`.
    fn id(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str;

    /// Check if provider is configured and ready.
    fn is_configured(&self) -> bool;

    /// Generate a completion.
    async fn complete(&self, request: CompletionRequest) -> anyhow::Result<CompletionResponse>;
}
