//! Session state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::{Message, MessageStore};

/// Token count above which a session is compacted.
pub const DEFAULT_PRUNE_TRIGGER: usize = 3500;

/// Token count a compaction aims to get back under.
pub const DEFAULT_AFTER_PRUNE_THRESHOLD: usize = 1500;

/// Full conversational state bound to one model and one persistence identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Model id; selects both the backend and the tokenizer
    pub model: String,
    /// Conversation messages, in order
    pub messages: MessageStore,
    /// Token ceiling that forces compaction
    pub prune_trigger: usize,
    /// Token ceiling to re-descend to after compaction
    pub after_prune_threshold: usize,
    /// Persistence identity, assigned once on first save
    pub filename: Option<String>,
    /// Human label, defaults to the filename
    pub title: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last save timestamp
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new session with default budget parameters.
    pub fn new(model: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            model: model.into(),
            messages: MessageStore::new(),
            prune_trigger: DEFAULT_PRUNE_TRIGGER,
            after_prune_threshold: DEFAULT_AFTER_PRUNE_THRESHOLD,
            filename: None,
            title: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the budget parameters.
    pub fn with_budget(mut self, prune_trigger: usize, after_prune_threshold: usize) -> Self {
        self.prune_trigger = prune_trigger;
        self.after_prune_threshold = after_prune_threshold;
        self
    }

    /// Title for display: explicit title, then filename, then a placeholder.
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .or(self.filename.as_deref())
            .unwrap_or("(unsaved)")
    }

    /// Messages as a slice.
    pub fn messages(&self) -> &[Message] {
        self.messages.as_slice()
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, message) in self.messages.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", message)?;
        }
        Ok(())
    }
}
