//! Session controller.
//!
//! The single entry point for mutating a session. Every mutation ends with a
//! save, so the record on disk always matches the last completed operation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use parley_core::{Backend, Error, Message, ModelRegistry, Result, Role, Session};

use crate::compaction::{CompactionOutcome, Compactor};
use crate::persistence::SessionStore;
use crate::tokens::TokenCounter;

/// Result of appending a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Session length once the append (and any compaction) finished
    pub length: usize,
    pub compaction: CompactionOutcome,
}

/// One conversational exchange.
#[derive(Debug, Clone)]
pub struct Turn {
    pub reply: String,
    pub user: AppendOutcome,
    pub assistant: AppendOutcome,
}

/// Owns the bound session and keeps it within budget and persisted.
pub struct SessionController {
    session: Session,
    counter: TokenCounter,
    compactor: Compactor,
    backend: Arc<dyn Backend>,
    store: Arc<dyn SessionStore>,
    temperature: f32,
}

impl SessionController {
    /// Bind `session`. Its model must be registered.
    pub fn new(
        session: Session,
        models: Arc<ModelRegistry>,
        backend: Arc<dyn Backend>,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self> {
        models.get(&session.model)?;
        let counter = TokenCounter::new(models);
        let compactor = Compactor::new(counter.clone(), backend.clone());
        Ok(Self {
            session,
            counter,
            compactor,
            backend,
            store,
            temperature: 1.0,
        })
    }

    /// Sampling temperature for conversational turns.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn messages(&self) -> &[Message] {
        self.session.messages()
    }

    pub fn models(&self) -> &ModelRegistry {
        self.counter.registry()
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Current length in tokens under the session's model.
    pub fn length(&self) -> Result<usize> {
        self.counter.length(&self.session.model, self.session.messages())
    }

    /// Transcript as `role: content` lines.
    pub fn transcript(&self) -> String {
        self.session.to_string()
    }

    /// Append a message, compacting if the session goes over its trigger.
    ///
    /// A failed compaction is not an error: the message stays appended, the
    /// history is kept whole and the failure is reported in the outcome.
    pub async fn append(&mut self, message: Message) -> Result<AppendOutcome> {
        self.counter.profile(&self.session.model)?;
        self.session.messages.append(message);

        let length = self.length()?;
        let compaction = if Compactor::needs_compaction(&self.session, length) {
            match self.compactor.compact(&mut self.session).await {
                Ok(report) => CompactionOutcome::Compacted(report),
                Err(e) => {
                    warn!(length, trigger = self.session.prune_trigger, "Compaction failed: {}", e);
                    CompactionOutcome::Failed(e.to_string())
                }
            }
        } else {
            CompactionOutcome::NotNeeded
        };

        let length = match &compaction {
            CompactionOutcome::Compacted(report) => report.tokens_after,
            _ => length,
        };

        self.save().await?;
        Ok(AppendOutcome { length, compaction })
    }

    /// Remove messages up to and including the most recent user message.
    ///
    /// Returns the number of messages removed; an empty session is left alone.
    pub async fn undo(&mut self) -> Result<usize> {
        let mut removed = 0;
        loop {
            match self.session.messages.pop() {
                Ok(message) => {
                    removed += 1;
                    if message.role == Role::User {
                        break;
                    }
                }
                Err(Error::EmptyStore) => break,
                Err(e) => return Err(e),
            }
        }

        if removed > 0 {
            self.save().await?;
        }
        Ok(removed)
    }

    /// Drop all messages, keeping identity and model.
    pub async fn clear(&mut self) -> Result<()> {
        self.session.messages.clear();
        self.save().await?;
        Ok(())
    }

    pub async fn rename(&mut self, title: impl Into<String>) -> Result<()> {
        self.session.title = Some(title.into());
        self.save().await?;
        Ok(())
    }

    /// Rebind to another registered model. Messages are untouched.
    pub async fn set_model(&mut self, model: impl Into<String>) -> Result<()> {
        let model = model.into();
        self.counter.profile(&model)?;
        info!(from = %self.session.model, to = %model, "Switching model");
        self.session.model = model;
        self.save().await?;
        Ok(())
    }

    /// Replace the bound session with the record at `path`.
    pub async fn load(&mut self, path: &Path) -> Result<()> {
        let session = self.store.load(path).await?;
        info!(title = session.display_title(), messages = session.messages.len(), "Loaded session");
        self.session = session;
        Ok(())
    }

    /// Persist the bound session.
    pub async fn save(&mut self) -> Result<PathBuf> {
        self.store.save(&mut self.session).await
    }

    /// Send `text` as a user turn and append the backend's reply.
    ///
    /// If the backend fails the user message stays in the session.
    pub async fn respond(&mut self, text: &str) -> Result<Turn> {
        let user = self.append(Message::user(text.trim())).await?;

        let reply = self
            .backend
            .generate(self.session.messages(), &self.session.model, self.temperature)
            .await?;
        let reply = reply.trim().to_string();

        let assistant = self.append(Message::assistant(reply.clone())).await?;
        Ok(Turn {
            reply,
            user,
            assistant,
        })
    }
}
