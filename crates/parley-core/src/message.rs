//! Message and conversation primitives.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System message (instructions)
    System,
    /// User message
    User,
    /// Assistant response
    Assistant,
}

impl Role {
    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message in a conversation.
///
/// Messages are never mutated after creation. A message with `persist` set
/// survives compaction; everything else may be folded into a summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,
    /// Message content
    pub content: String,
    /// Durable across compaction
    #[serde(default)]
    pub persist: bool,
}

impl Message {
    /// Create a message with an explicit role.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            persist: false,
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Mark the message as durable across compaction.
    pub fn persistent(mut self) -> Self {
        self.persist = true;
        self
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.role, self.content)
    }
}

/// Ordered sequence of messages.
///
/// Insertion order is conversation order. Duplicates are allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageStore {
    messages: Vec<Message>,
}

impl MessageStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a message to the end.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Remove and return the last message.
    pub fn pop(&mut self) -> Result<Message> {
        self.messages.pop().ok_or(Error::EmptyStore)
    }

    /// Remove every message.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Replace the whole sequence.
    pub fn replace(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl From<Vec<Message>> for MessageStore {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

impl<'a> IntoIterator for &'a MessageStore {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
