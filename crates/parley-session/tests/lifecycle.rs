mod common;

use std::sync::Arc;

use common::{fixture, registry, words, MockBackend};
use parley_core::{Error, Message, Session};
use parley_session::{CompactionOutcome, FileSessionStore, SessionController, SessionStore};
use tempfile::TempDir;

#[tokio::test]
async fn test_undo_removes_through_last_user_message() {
    let mut fx = fixture(Session::new("words"));
    fx.controller.append(Message::user("a")).await.unwrap();
    fx.controller.append(Message::assistant("b")).await.unwrap();
    fx.controller.append(Message::user("c")).await.unwrap();

    let removed = fx.controller.undo().await.unwrap();
    assert_eq!(removed, 1);
    assert_eq!(
        fx.controller.messages(),
        &[Message::user("a"), Message::assistant("b")]
    );

    // Assistant reply and the user turn that prompted it go together.
    let removed = fx.controller.undo().await.unwrap();
    assert_eq!(removed, 2);
    assert!(fx.controller.messages().is_empty());
}

#[tokio::test]
async fn test_undo_on_empty_is_idempotent() {
    let mut fx = fixture(Session::new("words"));
    assert_eq!(fx.controller.undo().await.unwrap(), 0);
    assert_eq!(fx.controller.undo().await.unwrap(), 0);
    assert!(fx.controller.messages().is_empty());
    // Nothing mutated, so nothing was saved.
    assert!(fx.controller.session().filename.is_none());
    assert!(fx.store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_undo_without_user_message_empties_store() {
    let mut session = Session::new("words");
    session.messages.append(Message::assistant("x"));
    session.messages.append(Message::assistant("y"));
    let mut fx = fixture(session);

    assert_eq!(fx.controller.undo().await.unwrap(), 2);
    assert!(fx.controller.messages().is_empty());
}

#[tokio::test]
async fn test_save_load_round_trip() {
    let mut session = Session::new("words").with_budget(900, 400);
    session.messages.append(Message::system("pinned").persistent());
    session.messages.append(Message::user("question with \"quotes\"\nand a newline"));
    session.messages.append(Message::assistant("answer"));
    let mut fx = fixture(session);
    fx.controller.rename("Round trip").await.unwrap();

    let path = fx.store.find("log_0").await.unwrap();
    let loaded = fx.store.load(&path).await.unwrap();
    let in_memory = fx.controller.session();

    assert_eq!(loaded.model, in_memory.model);
    assert_eq!(loaded.messages, in_memory.messages);
    assert_eq!(loaded.prune_trigger, 900);
    assert_eq!(loaded.after_prune_threshold, 400);
    assert_eq!(loaded.filename.as_deref(), Some("log_0"));
    assert_eq!(loaded.title.as_deref(), Some("Round trip"));
    assert_eq!(loaded.created_at, in_memory.created_at);
}

#[tokio::test]
async fn test_load_replaces_whole_session() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FileSessionStore::new(dir.path()));
    let backend = MockBackend::replying("ok");

    let mut saved = Session::new("chars").with_budget(1000, 500);
    saved.messages.append(Message::user("from disk"));
    saved.title = Some("Saved".to_string());
    let path = store.save(&mut saved).await.unwrap();

    let mut controller =
        SessionController::new(Session::new("words"), registry(), backend, store.clone()).unwrap();
    controller.append(Message::user("in memory")).await.unwrap();

    controller.load(&path).await.unwrap();
    let session = controller.session();
    assert_eq!(session.model, "chars");
    assert_eq!(session.messages(), &[Message::user("from disk")]);
    assert_eq!(session.prune_trigger, 1000);
    assert_eq!(session.title.as_deref(), Some("Saved"));
    assert_eq!(session.filename, saved.filename);
}

#[tokio::test]
async fn test_switching_model_changes_length_only() {
    let mut fx = fixture(Session::new("words"));
    fx.controller.append(Message::user("hello world")).await.unwrap();
    let before = fx.controller.messages().to_vec();
    assert_eq!(fx.controller.length().unwrap(), 2);

    fx.controller.set_model("chars").await.unwrap();
    assert_eq!(fx.controller.length().unwrap(), 11);
    assert_eq!(fx.controller.messages(), before.as_slice());
    assert_eq!(fx.controller.session().model, "chars");
}

#[tokio::test]
async fn test_set_model_rejects_unknown_before_mutating() {
    let mut fx = fixture(Session::new("words"));
    let err = fx.controller.set_model("gpt-9000").await.unwrap_err();
    assert!(matches!(err, Error::UnsupportedModel(ref m) if m == "gpt-9000"));
    assert_eq!(fx.controller.session().model, "words");
}

#[tokio::test]
async fn test_respond_keeps_user_message_on_backend_failure() {
    let mut fx = fixture(Session::new("words"));
    fx.backend.set_failing(true);

    let err = fx.controller.respond("are you there?").await.unwrap_err();
    assert!(matches!(err, Error::Backend(_)));
    assert_eq!(fx.controller.messages(), &[Message::user("are you there?")]);

    fx.backend.set_failing(false);
    let turn = fx.controller.respond("now?").await.unwrap();
    assert_eq!(turn.reply, "short recap");
    assert_eq!(turn.user.compaction, CompactionOutcome::NotNeeded);
    assert_eq!(fx.controller.messages().len(), 3);
}

#[tokio::test]
async fn test_respond_uses_configured_temperature() {
    let fx = fixture(Session::new("words"));
    let backend = fx.backend.clone();
    let mut controller = fx.controller.with_temperature(0.25);
    controller.respond(&words(3)).await.unwrap();

    let calls = backend.calls.lock().unwrap();
    assert_eq!(calls[0].1, 0.25);
    assert_eq!(calls[0].0, vec![Message::user(words(3))]);
}

#[tokio::test]
async fn test_every_mutation_is_persisted() {
    let mut fx = fixture(Session::new("words"));
    fx.controller.append(Message::user("one")).await.unwrap();
    fx.controller.append(Message::user("two")).await.unwrap();
    fx.controller.undo().await.unwrap();

    let path = fx.store.find("log_0").await.unwrap();
    assert_eq!(fx.store.load(&path).await.unwrap().messages(), &[Message::user("one")]);

    fx.controller.clear().await.unwrap();
    assert!(fx.store.load(&path).await.unwrap().messages.is_empty());

    fx.controller.set_model("chars").await.unwrap();
    assert_eq!(fx.store.load(&path).await.unwrap().model, "chars");
    assert_eq!(fx.store.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_save_reaches_caller() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("sessions");
    std::fs::write(&blocker, "not a directory").unwrap();
    let store = Arc::new(FileSessionStore::new(&blocker));

    let mut controller =
        SessionController::new(Session::new("words"), registry(), MockBackend::replying("ok"), store)
            .unwrap();
    let err = controller.append(Message::user("hi")).await.unwrap_err();
    assert!(matches!(err, Error::Io(_)));

    // Nothing was written and the storage path is untouched.
    assert!(controller.session().filename.is_none());
    assert!(blocker.is_file());
    assert_eq!(std::fs::read_to_string(&blocker).unwrap(), "not a directory");
    let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}
