//! Text-generation backend abstraction.

use async_trait::async_trait;

use crate::error::Result;
use crate::message::Message;

/// A remote text-generation service.
///
/// Maps an ordered message list plus sampling parameters to a text reply.
/// Failures are reported as [`crate::Error::Backend`] (or a structured
/// provider error) and never panic.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Generate a reply for `messages` using `model`.
    async fn generate(&self, messages: &[Message], model: &str, temperature: f32) -> Result<String>;
}
