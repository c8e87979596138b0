//! # parley-core
//!
//! Core types and abstractions for Parley - a budgeted, persistent chat
//! session manager.
//!
//! This crate provides:
//! - Message primitives and the ordered message store
//! - Session state (model, budget parameters, persistence identity)
//! - Model registry mapping model ids to tokenizers and call shapes
//! - The backend abstraction used for text generation
//! - Configuration system
//! - Common error types

pub mod backend;
pub mod config;
pub mod error;
pub mod message;
pub mod model;
pub mod session;

pub use backend::Backend;
pub use config::Config;
pub use error::{Error, Result};
pub use message::{Message, MessageStore, Role};
pub use model::{BpeTokenizer, CallShape, Encoding, ModelProfile, ModelRegistry, Tokenizer};
pub use session::{Session, DEFAULT_AFTER_PRUNE_THRESHOLD, DEFAULT_PRUNE_TRIGGER};
