//! Provider registry for managing available providers.

use std::collections::HashMap;
use std::sync::Arc;

use parley_core::Config;

use super::openai::OpenAIProvider;
use super::traits::Provider;

/// Registry of available text-generation providers, keyed by provider id.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Initialize registry with all available providers based on configuration.
    ///
    /// API keys come from the config first, then from `OPENAI_API_KEY`.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();

        let openai_key = config
            .providers
            .openai
            .as_ref()
            .and_then(|c| c.resolve_api_key())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok());

        if let Some(api_key) = openai_key {
            let mut provider =
                OpenAIProvider::new(api_key).with_timeout(config.backend.timeout());
            if let Some(base_url) = config
                .providers
                .openai
                .as_ref()
                .and_then(|c| c.base_url.clone())
                .or_else(|| std::env::var("OPENAI_BASE_URL").ok())
            {
                provider = provider.with_base_url(base_url);
            }
            registry.register(Arc::new(provider));
        } else {
            tracing::debug!("No OpenAI API key found; provider not registered");
        }

        registry
    }

    /// Register a provider.
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.id().to_string(), provider);
    }

    /// Get a provider by ID.
    pub fn get(&self, id: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(id).cloned()
    }

    /// List all registered providers.
    pub fn list(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
