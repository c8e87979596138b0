//! Model registry.
//!
//! Maps a model identifier to a small capability descriptor: which provider
//! serves it, which request shape it expects, and which tokenizer prices its
//! text. Lookups fail closed: an unknown id is [`Error::UnsupportedModel`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tiktoken_rs::CoreBPE;

use crate::error::{Error, Result};

/// Counts tokens in text the way one model family does.
pub trait Tokenizer: Send + Sync {
    /// Number of tokens in `text`.
    fn count(&self, text: &str) -> Result<usize>;
}

/// Byte-pair encodings shipped with tiktoken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// GPT-4o family
    O200kBase,
    /// GPT-4 and GPT-3.5 chat models
    Cl100kBase,
    /// text-davinci-002/003
    P50kBase,
    /// Legacy GPT-3 base models
    R50kBase,
}

static O200K: OnceCell<CoreBPE> = OnceCell::new();
static CL100K: OnceCell<CoreBPE> = OnceCell::new();
static P50K: OnceCell<CoreBPE> = OnceCell::new();
static R50K: OnceCell<CoreBPE> = OnceCell::new();

impl Encoding {
    /// Name as used by tiktoken.
    pub fn name(&self) -> &'static str {
        match self {
            Encoding::O200kBase => "o200k_base",
            Encoding::Cl100kBase => "cl100k_base",
            Encoding::P50kBase => "p50k_base",
            Encoding::R50kBase => "r50k_base",
        }
    }

    /// Shared encoder, built on first use.
    fn bpe(&self) -> Result<&'static CoreBPE> {
        let cell = match self {
            Encoding::O200kBase => &O200K,
            Encoding::Cl100kBase => &CL100K,
            Encoding::P50kBase => &P50K,
            Encoding::R50kBase => &R50K,
        };
        cell.get_or_try_init(|| {
            tracing::debug!(encoding = self.name(), "Loading BPE encoding");
            let built = match self {
                Encoding::O200kBase => tiktoken_rs::o200k_base(),
                Encoding::Cl100kBase => tiktoken_rs::cl100k_base(),
                Encoding::P50kBase => tiktoken_rs::p50k_base(),
                Encoding::R50kBase => tiktoken_rs::r50k_base(),
            };
            built.map_err(|e| Error::Tokenizer(format!("{}: {}", self.name(), e)))
        })
    }
}

/// Tokenizer backed by a tiktoken encoding.
#[derive(Debug, Clone, Copy)]
pub struct BpeTokenizer {
    encoding: Encoding,
}

impl BpeTokenizer {
    pub fn new(encoding: Encoding) -> Self {
        Self { encoding }
    }
}

impl Tokenizer for BpeTokenizer {
    fn count(&self, text: &str) -> Result<usize> {
        // Special-token text is priced as ordinary text.
        Ok(self.encoding.bpe()?.encode_ordinary(text).len())
    }
}

/// How a model expects its request to be shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallShape {
    /// Role/content message list (`/chat/completions`)
    Chat,
    /// Single flattened prompt (`/completions`)
    Completion,
}

/// Capability descriptor for one model id.
#[derive(Clone)]
pub struct ModelProfile {
    /// Model identifier
    pub id: String,
    /// Provider that serves the model
    pub provider: String,
    /// Request shape
    pub call_shape: CallShape,
    /// Tokenizer used for budget accounting
    pub tokenizer: Arc<dyn Tokenizer>,
}

impl ModelProfile {
    pub fn new(
        id: impl Into<String>,
        provider: impl Into<String>,
        call_shape: CallShape,
        tokenizer: Arc<dyn Tokenizer>,
    ) -> Self {
        Self {
            id: id.into(),
            provider: provider.into(),
            call_shape,
            tokenizer,
        }
    }

    /// Profile for an OpenAI model priced with a tiktoken encoding.
    pub fn openai(id: impl Into<String>, call_shape: CallShape, encoding: Encoding) -> Self {
        Self::new(id, "openai", call_shape, Arc::new(BpeTokenizer::new(encoding)))
    }
}

impl fmt::Debug for ModelProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelProfile")
            .field("id", &self.id)
            .field("provider", &self.provider)
            .field("call_shape", &self.call_shape)
            .finish_non_exhaustive()
    }
}

/// Chat models known out of the box, with their encodings.
const CHAT_MODELS: &[(&str, Encoding)] = &[
    ("gpt-4o", Encoding::O200kBase),
    ("gpt-4o-mini", Encoding::O200kBase),
    ("gpt-4-turbo", Encoding::Cl100kBase),
    ("gpt-4", Encoding::Cl100kBase),
    ("gpt-4-0314", Encoding::Cl100kBase),
    ("gpt-4-32k", Encoding::Cl100kBase),
    ("gpt-4-32k-0314", Encoding::Cl100kBase),
    ("gpt-3.5-turbo", Encoding::Cl100kBase),
    ("gpt-3.5-turbo-0301", Encoding::Cl100kBase),
];

/// Legacy completion models known out of the box.
const COMPLETION_MODELS: &[(&str, Encoding)] = &[
    ("text-davinci-003", Encoding::P50kBase),
    ("text-davinci-002", Encoding::P50kBase),
    ("text-curie-001", Encoding::R50kBase),
    ("text-babbage-001", Encoding::R50kBase),
    ("text-ada-001", Encoding::R50kBase),
    ("davinci", Encoding::R50kBase),
    ("curie", Encoding::R50kBase),
    ("babbage", Encoding::R50kBase),
    ("ada", Encoding::R50kBase),
];

/// Registry of models the session can be bound to.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    profiles: HashMap<String, ModelProfile>,
}

impl ModelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in OpenAI catalog.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for (id, encoding) in CHAT_MODELS {
            registry.register(ModelProfile::openai(*id, CallShape::Chat, *encoding));
        }
        for (id, encoding) in COMPLETION_MODELS {
            registry.register(ModelProfile::openai(*id, CallShape::Completion, *encoding));
        }
        registry
    }

    /// Register (or replace) a model profile.
    pub fn register(&mut self, profile: ModelProfile) {
        self.profiles.insert(profile.id.clone(), profile);
    }

    /// Look up a model, failing closed on unknown ids.
    pub fn get(&self, model: &str) -> Result<&ModelProfile> {
        self.profiles
            .get(model)
            .ok_or_else(|| Error::UnsupportedModel(model.to_string()))
    }

    /// All registered model ids, sorted.
    pub fn models(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.profiles.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }
}
