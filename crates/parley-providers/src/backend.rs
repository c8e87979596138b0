//! [`Backend`] implementation that dispatches through the provider registry.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use parley_core::error::ProviderError;
use parley_core::{Backend, Config, Error, Message, ModelRegistry, Result};

use crate::rate_limit::RateLimiter;
use crate::registry::ProviderRegistry;
use crate::traits::CompletionRequest;

/// Rate-limited backend that routes each model to its provider and call shape.
pub struct ProviderBackend {
    providers: ProviderRegistry,
    models: Arc<ModelRegistry>,
    limiter: RateLimiter,
}

impl ProviderBackend {
    pub fn new(providers: ProviderRegistry, models: Arc<ModelRegistry>, limiter: RateLimiter) -> Self {
        Self {
            providers,
            models,
            limiter,
        }
    }

    /// Build providers and the limiter from configuration.
    pub fn from_config(config: &Config, models: Arc<ModelRegistry>) -> Self {
        Self::new(
            ProviderRegistry::from_config(config),
            models,
            RateLimiter::new(config.backend.min_call_interval()),
        )
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }
}

#[async_trait]
impl Backend for ProviderBackend {
    async fn generate(&self, messages: &[Message], model: &str, temperature: f32) -> Result<String> {
        let profile = self.models.get(model)?;
        let provider = self
            .providers
            .get(&profile.provider)
            .ok_or_else(|| Error::provider_not_configured(&profile.provider))?;

        self.limiter.acquire().await;

        let request =
            CompletionRequest::new(model, messages.to_vec(), temperature, profile.call_shape);
        let response = provider.complete(request).await.map_err(|err| {
            warn!(provider = %profile.provider, model, "Backend call failed: {:#}", err);
            match err.downcast::<ProviderError>() {
                Ok(provider_err) => Error::Provider(provider_err),
                Err(other) => Error::Backend(format!("{:#}", other)),
            }
        })?;

        debug!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Backend call completed"
        );
        Ok(response.content)
    }
}
