//! # parley-session
//!
//! Budgeted, persistent chat sessions.
//!
//! This crate provides:
//! - Token accounting under each model's tokenizer
//! - Compaction of history into a backend-written summary
//! - JSON Lines persistence of full session state
//! - The [`SessionController`] facade tying them together
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use parley_session::{FileSessionStore, SessionController};
//!
//! let store = Arc::new(FileSessionStore::new(".parley/sessions"));
//! let mut controller = SessionController::new(Session::new("gpt-4"), models, backend, store)?;
//!
//! let turn = controller.respond("What is a lifetime?").await?;
//! println!("{}", turn.reply);
//! ```
//!
//! ## Budget
//!
//! After each append, if the session's length exceeds `prune_trigger` the
//! [`Compactor`] replaces volatile history with a summary and the most recent
//! messages that fit under `after_prune_threshold`. Persistent messages are
//! never compacted away.

pub mod compaction;
pub mod controller;
pub mod persistence;
pub mod tokens;

pub use compaction::{
    CompactionOutcome, CompactionReport, Compactor, MIN_MESSAGES_KEPT, SUMMARY_INSTRUCTION,
    SUMMARY_PREFIX,
};
pub use controller::{AppendOutcome, SessionController, Turn};
pub use persistence::{FileSessionStore, SessionHeader, SessionStore, SessionSummary};
pub use tokens::TokenCounter;
