//! Shared fixtures for session integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use parley_core::{
    Backend, CallShape, Error, Message, ModelProfile, ModelRegistry, Result, Session, Tokenizer,
};
use parley_session::{FileSessionStore, SessionController};
use tempfile::TempDir;

/// One token per whitespace-separated word.
pub struct WordTokenizer;

impl Tokenizer for WordTokenizer {
    fn count(&self, text: &str) -> Result<usize> {
        Ok(text.split_whitespace().count())
    }
}

/// Counts characters, so the same text prices differently than under [`WordTokenizer`].
pub struct CharTokenizer;

impl Tokenizer for CharTokenizer {
    fn count(&self, text: &str) -> Result<usize> {
        Ok(text.chars().count())
    }
}

/// Backend returning a fixed reply, or failing while `fail` is set.
pub struct MockBackend {
    pub reply: String,
    pub fail: AtomicBool,
    pub calls: Mutex<Vec<(Vec<Message>, f32)>>,
}

impl MockBackend {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            fail: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn generate(&self, messages: &[Message], _model: &str, temperature: f32) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((messages.to_vec(), temperature));
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Backend("service unavailable".to_string()));
        }
        Ok(self.reply.clone())
    }
}

pub fn registry() -> Arc<ModelRegistry> {
    let mut registry = ModelRegistry::new();
    registry.register(ModelProfile::new(
        "words",
        "mock",
        CallShape::Chat,
        Arc::new(WordTokenizer),
    ));
    registry.register(ModelProfile::new(
        "chars",
        "mock",
        CallShape::Completion,
        Arc::new(CharTokenizer),
    ));
    Arc::new(registry)
}

/// `n` one-token words.
pub fn words(n: usize) -> String {
    vec!["w"; n].join(" ")
}

pub struct Fixture {
    pub controller: SessionController,
    pub backend: Arc<MockBackend>,
    pub store: Arc<FileSessionStore>,
    pub dir: TempDir,
}

pub fn fixture(session: Session) -> Fixture {
    let dir = TempDir::new().unwrap();
    let backend = MockBackend::replying("short recap");
    let store = Arc::new(FileSessionStore::new(dir.path().join("sessions")));
    let controller =
        SessionController::new(session, registry(), backend.clone(), store.clone()).unwrap();
    Fixture {
        controller,
        backend,
        store,
        dir,
    }
}
