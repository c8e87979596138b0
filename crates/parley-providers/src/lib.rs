//! # parley-providers
//!
//! Text-generation providers for Parley.
//!
//! This crate provides:
//! - Provider trait for abstracting HTTP text-generation services
//! - An OpenAI-compatible implementation covering chat and legacy completion endpoints
//! - A provider registry built from configuration
//! - A rate limiter spacing consecutive calls
//! - [`ProviderBackend`], the [`parley_core::Backend`] used by sessions

pub mod backend;
pub mod openai;
pub mod rate_limit;
pub mod registry;
pub mod traits;

pub use backend::ProviderBackend;
pub use openai::OpenAIProvider;
pub use rate_limit::RateLimiter;
pub use registry::ProviderRegistry;
pub use traits::{CompletionRequest, CompletionResponse, Provider, Usage};
