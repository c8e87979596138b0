//! Session persistence.
//!
//! Each session is one JSON Lines record at `<dir>/<filename>.jsonl`:
//!
//! ```text
//! {"format_version":1,"model":"gpt-4","prune_trigger":3500,...,"message_count":2}
//! {"role":"user","content":"hi","persist":false}
//! {"role":"assistant","content":"hello","persist":false}
//! ```
//!
//! The header line is enough to list sessions without reading transcripts.
//! Writes go to a hidden temporary sibling which is then renamed into place.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use parley_core::{Error, Message, MessageStore, Result, Session};

/// Current record format.
pub const FORMAT_VERSION: u32 = 1;

/// Extension of session records.
pub const RECORD_EXTENSION: &str = "jsonl";

/// First line of a session record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionHeader {
    pub format_version: u32,
    pub model: String,
    pub prune_trigger: usize,
    pub after_prune_threshold: usize,
    pub filename: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
}

/// Listing entry built from a record header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub filename: String,
    pub title: String,
    pub model: String,
    pub message_count: usize,
    pub updated_at: DateTime<Utc>,
    pub path: PathBuf,
}

impl SessionSummary {
    fn from_header(header: SessionHeader, path: PathBuf) -> Self {
        Self {
            filename: header.filename,
            title: header.title,
            model: header.model,
            message_count: header.message_count,
            updated_at: header.updated_at,
            path,
        }
    }
}

/// Durable storage for sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Write the full session state, assigning `filename` and `title` on first save.
    async fn save(&self, session: &mut Session) -> Result<PathBuf>;

    /// Reconstruct a session from a record.
    async fn load(&self, path: &Path) -> Result<Session>;

    /// Title of a record, reading only its header.
    async fn peek_title(&self, path: &Path) -> Result<String>;

    /// All records, most recently updated first.
    async fn list(&self) -> Result<Vec<SessionSummary>>;

    /// The most recently updated record, if any.
    async fn most_recent(&self) -> Result<Option<SessionSummary>> {
        Ok(self.list().await?.into_iter().next())
    }

    /// Resolve a filename (with or without extension) to a record path.
    async fn find(&self, filename: &str) -> Result<PathBuf>;
}

/// [`SessionStore`] backed by one JSONL file per session in a directory.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, filename: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", filename, RECORD_EXTENSION))
    }

    /// Next unused `log_<n>`, starting from the number of files in the directory.
    async fn next_filename(&self) -> Result<String> {
        let mut count = 0;
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                count += 1;
            }
        }

        let mut n = count;
        loop {
            let candidate = format!("log_{}", n);
            if !tokio::fs::try_exists(self.record_path(&candidate)).await? {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    async fn read_header(path: &Path) -> Result<SessionHeader> {
        let file = tokio::fs::File::open(path).await?;
        let mut lines = BufReader::new(file).lines();
        let line = lines
            .next_line()
            .await?
            .ok_or_else(|| Error::Persistence(format!("{} is empty", path.display())))?;
        let header: SessionHeader = serde_json::from_str(&line)?;
        Self::check_version(&header, path)?;
        Ok(header)
    }

    fn check_version(header: &SessionHeader, path: &Path) -> Result<()> {
        if header.format_version > FORMAT_VERSION {
            return Err(Error::Persistence(format!(
                "{} uses record format {}, newer than supported {}",
                path.display(),
                header.format_version,
                FORMAT_VERSION
            )));
        }
        Ok(())
    }

    fn is_record(path: &Path) -> bool {
        path.extension().and_then(|e| e.to_str()) == Some(RECORD_EXTENSION)
            && !path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with('.'))
                .unwrap_or(true)
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn save(&self, session: &mut Session) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let filename = match &session.filename {
            Some(filename) => filename.clone(),
            None => {
                let filename = self.next_filename().await?;
                debug!(filename = %filename, "Assigned session filename");
                session.filename = Some(filename.clone());
                filename
            }
        };
        if session.title.is_none() {
            session.title = Some(filename.clone());
        }
        session.updated_at = Utc::now();

        let header = SessionHeader {
            format_version: FORMAT_VERSION,
            model: session.model.clone(),
            prune_trigger: session.prune_trigger,
            after_prune_threshold: session.after_prune_threshold,
            filename: filename.clone(),
            title: session.display_title().to_string(),
            created_at: session.created_at,
            updated_at: session.updated_at,
            message_count: session.messages.len(),
        };

        let mut body = serde_json::to_string(&header)?;
        body.push('\n');
        for message in session.messages.iter() {
            body.push_str(&serde_json::to_string(message)?);
            body.push('\n');
        }

        let path = self.record_path(&filename);
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", filename, RECORD_EXTENSION));
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(path = %path.display(), messages = header.message_count, "Saved session");
        Ok(path)
    }

    async fn load(&self, path: &Path) -> Result<Session> {
        let contents = tokio::fs::read_to_string(path).await?;
        let mut lines = contents.lines().filter(|l| !l.trim().is_empty());

        let header_line = lines
            .next()
            .ok_or_else(|| Error::Persistence(format!("{} is empty", path.display())))?;
        let header: SessionHeader = serde_json::from_str(header_line)?;
        Self::check_version(&header, path)?;

        let messages = lines
            .map(|line| serde_json::from_str::<Message>(line))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if messages.len() != header.message_count {
            return Err(Error::Persistence(format!(
                "{} declares {} messages but contains {}",
                path.display(),
                header.message_count,
                messages.len()
            )));
        }

        debug!(path = %path.display(), messages = messages.len(), "Loaded session");
        Ok(Session {
            model: header.model,
            messages: MessageStore::from(messages),
            prune_trigger: header.prune_trigger,
            after_prune_threshold: header.after_prune_threshold,
            filename: Some(header.filename),
            title: Some(header.title),
            created_at: header.created_at,
            updated_at: header.updated_at,
        })
    }

    async fn peek_title(&self, path: &Path) -> Result<String> {
        Ok(Self::read_header(path).await?.title)
    }

    async fn list(&self) -> Result<Vec<SessionSummary>> {
        if !tokio::fs::try_exists(&self.dir).await? {
            return Ok(Vec::new());
        }

        let mut summaries = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !Self::is_record(&path) {
                continue;
            }
            match Self::read_header(&path).await {
                Ok(header) => summaries.push(SessionSummary::from_header(header, path)),
                Err(e) => warn!(path = %path.display(), "Skipping unreadable session record: {}", e),
            }
        }

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    async fn find(&self, filename: &str) -> Result<PathBuf> {
        let stem = filename
            .strip_suffix(&format!(".{}", RECORD_EXTENSION))
            .unwrap_or(filename);
        let path = self.record_path(stem);
        if tokio::fs::try_exists(&path).await? {
            Ok(path)
        } else {
            Err(Error::NotFound(format!("session '{}'", stem)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (FileSessionStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(temp_dir.path().join("sessions"));
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_first_save_assigns_identity() {
        let (store, _tmp) = create_test_store();
        let mut session = Session::new("gpt-4");

        let path = store.save(&mut session).await.unwrap();
        assert_eq!(session.filename.as_deref(), Some("log_0"));
        assert_eq!(session.title.as_deref(), Some("log_0"));
        assert_eq!(path, store.dir().join("log_0.jsonl"));

        // Identity is never reassigned.
        store.save(&mut session).await.unwrap();
        assert_eq!(session.filename.as_deref(), Some("log_0"));
    }

    #[tokio::test]
    async fn test_filenames_skip_taken_names() {
        let (store, _tmp) = create_test_store();
        tokio::fs::create_dir_all(store.dir()).await.unwrap();
        tokio::fs::write(store.dir().join("notes.txt"), "x").await.unwrap();
        tokio::fs::write(store.dir().join("log_1.jsonl"), "x").await.unwrap();

        let mut session = Session::new("gpt-4");
        store.save(&mut session).await.unwrap();
        // Two files present, so counting starts at 2.
        assert_eq!(session.filename.as_deref(), Some("log_2"));

        let mut other = Session::new("gpt-4");
        store.save(&mut other).await.unwrap();
        assert_eq!(other.filename.as_deref(), Some("log_3"));
    }

    #[tokio::test]
    async fn test_record_layout() {
        let (store, _tmp) = create_test_store();
        let mut session = Session::new("gpt-4");
        session.messages.append(Message::user("hi"));
        session.messages.append(Message::assistant("hello").persistent());

        let path = store.save(&mut session).await.unwrap();
        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 3);

        let header: SessionHeader = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(header.format_version, FORMAT_VERSION);
        assert_eq!(header.message_count, 2);
        assert!(lines[2].contains("\"persist\":true"));

        let mut entries = tokio::fs::read_dir(store.dir()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            assert!(!entry.file_name().to_string_lossy().ends_with(".tmp"));
        }
    }

    #[tokio::test]
    async fn test_peek_title_and_rename() {
        let (store, _tmp) = create_test_store();
        let mut session = Session::new("gpt-4");
        let path = store.save(&mut session).await.unwrap();
        assert_eq!(store.peek_title(&path).await.unwrap(), "log_0");

        session.title = Some("Borrow checker".to_string());
        store.save(&mut session).await.unwrap();
        assert_eq!(store.peek_title(&path).await.unwrap(), "Borrow checker");
    }

    #[tokio::test]
    async fn test_truncated_record_is_rejected() {
        let (store, _tmp) = create_test_store();
        let mut session = Session::new("gpt-4");
        session.messages.append(Message::user("a"));
        session.messages.append(Message::user("b"));
        let path = store.save(&mut session).await.unwrap();

        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        let truncated: Vec<&str> = raw.lines().take(2).collect();
        tokio::fs::write(&path, truncated.join("\n")).await.unwrap();

        let err = store.load(&path).await.unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
    }

    #[tokio::test]
    async fn test_newer_format_version_is_rejected() {
        let (store, _tmp) = create_test_store();
        let mut session = Session::new("gpt-4");
        session.messages.append(Message::user("a"));
        let path = store.save(&mut session).await.unwrap();

        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        let bumped = raw.replacen("\"format_version\":1", "\"format_version\":2", 1);
        assert_ne!(bumped, raw);
        tokio::fs::write(&path, bumped).await.unwrap();

        assert!(matches!(
            store.load(&path).await.unwrap_err(),
            Error::Persistence(_)
        ));
        assert!(matches!(
            store.peek_title(&path).await.unwrap_err(),
            Error::Persistence(_)
        ));
    }

    #[tokio::test]
    async fn test_list_most_recent_first() {
        let (store, _tmp) = create_test_store();
        assert!(store.list().await.unwrap().is_empty());
        assert!(store.most_recent().await.unwrap().is_none());

        let mut first = Session::new("gpt-4");
        store.save(&mut first).await.unwrap();
        let mut second = Session::new("gpt-3.5-turbo");
        store.save(&mut second).await.unwrap();
        // Touch the first session again so it becomes the most recent.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        first.title = Some("revisited".to_string());
        store.save(&mut first).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].title, "revisited");
        assert_eq!(listed[1].model, "gpt-3.5-turbo");

        let recent = store.most_recent().await.unwrap().unwrap();
        assert_eq!(recent.filename, "log_0");
    }

    #[tokio::test]
    async fn test_find_accepts_extension() {
        let (store, _tmp) = create_test_store();
        let mut session = Session::new("gpt-4");
        let path = store.save(&mut session).await.unwrap();

        assert_eq!(store.find("log_0").await.unwrap(), path);
        assert_eq!(store.find("log_0.jsonl").await.unwrap(), path);
        assert!(matches!(
            store.find("log_9").await.unwrap_err(),
            Error::NotFound(_)
        ));
    }
}
