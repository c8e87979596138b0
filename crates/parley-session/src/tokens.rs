//! Token accounting.
//!
//! Costs are always computed under a model's registered tokenizer and never
//! cached, so changing a session's model changes its perceived length.

use std::sync::Arc;

use parley_core::{Message, ModelProfile, ModelRegistry, Result};

/// Prices text in tokens for a given model.
#[derive(Debug, Clone)]
pub struct TokenCounter {
    registry: Arc<ModelRegistry>,
}

impl TokenCounter {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Profile for `model`; unknown ids are `UnsupportedModel`.
    pub fn profile(&self, model: &str) -> Result<&ModelProfile> {
        self.registry.get(model)
    }

    /// Number of tokens in `text` under `model`'s tokenizer.
    pub fn cost(&self, model: &str, text: &str) -> Result<usize> {
        self.profile(model)?.tokenizer.count(text)
    }

    /// Sum of message content costs.
    pub fn length(&self, model: &str, messages: &[Message]) -> Result<usize> {
        let tokenizer = &self.profile(model)?.tokenizer;
        messages
            .iter()
            .try_fold(0usize, |total, m| tokenizer.count(&m.content).map(|c| total + c))
    }
}
