//! # Session Persistence
//!
//! Best-effort snapshots of the editing session for crash/reload recovery.
//!
//! The whole session (history, cursor, title) is written as one JSON blob
//! under a single key. Failures are reported to the caller, who logs them
//! and keeps editing in memory.
//!
//! ## Acceptance policy
//!
//! A stored snapshot is only restored when the document at its cursor has
//! at least one block with non-blank content. An effectively empty session
//! is treated as absent so it never overwrites genuinely new content.

use crate::errors::PersistenceError;
use crate::history::HistoryEntry;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Persisted session shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub history: Vec<HistoryEntry>,
    pub cursor_index: usize,
    pub document_title: String,
}

impl SessionSnapshot {
    /// Entry the cursor points at, if the cursor is in range
    pub fn current(&self) -> Option<&HistoryEntry> {
        self.history.get(self.cursor_index)
    }

    /// Whether this snapshot passes the acceptance policy
    pub fn is_restorable(&self) -> bool {
        self.current()
            .map(|entry| entry.document.has_visible_content())
            .unwrap_or(false)
    }
}

/// Borrowed form used for writing, so saving never clones the history
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotRef<'a> {
    history: &'a [HistoryEntry],
    cursor_index: usize,
    document_title: &'a str,
}

/// Durable key/value storage for session blobs
pub trait SessionStore: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
    fn remove(&self, key: &str) -> Result<(), PersistenceError>;
}

/// One `<key>.json` file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }
}

impl SessionStore for FileSessionStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store; clones share the same map
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    values: Arc<Mutex<HashMap<String, String>>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: impl Into<String>) {
        self.values.lock().insert(key.to_string(), value.into());
    }

    /// Make subsequent writes fail, as a full or revoked storage would
    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock() = fail;
    }
}

impl SessionStore for MemorySessionStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.get(key))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        if *self.fail_writes.lock() {
            return Err(PersistenceError::Storage("storage quota exceeded".into()));
        }
        self.insert(key, value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.values.lock().remove(key);
        Ok(())
    }
}

/// Reads and writes the session snapshot under one fixed key
pub struct SessionGateway {
    store: Box<dyn SessionStore>,
    key: String,
}

impl SessionGateway {
    pub fn new(store: Box<dyn SessionStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn save(
        &self,
        history: &[HistoryEntry],
        cursor: usize,
        title: &str,
    ) -> Result<(), PersistenceError> {
        let json = serde_json::to_string(&SnapshotRef {
            history,
            cursor_index: cursor,
            document_title: title,
        })?;
        self.store.write(&self.key, &json)
    }

    /// Load the stored snapshot, applying the acceptance policy
    ///
    /// Anything unusable is logged and reported as absent.
    pub fn load(&self) -> Option<SessionSnapshot> {
        let raw = match self.store.read(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Failed to read session {}: {}", self.key, e);
                return None;
            }
        };

        let snapshot: SessionSnapshot = match serde_json::from_str(&raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("Discarding unreadable session {}: {}", self.key, e);
                return None;
            }
        };

        if snapshot.current().is_none() {
            tracing::warn!(
                "Discarding session {}: cursor {} outside {} entries",
                self.key,
                snapshot.cursor_index,
                snapshot.history.len()
            );
            return None;
        }
        if !snapshot.is_restorable() {
            tracing::info!("Ignoring blank session {}", self.key);
            return None;
        }

        Some(snapshot)
    }

    pub fn clear(&self) -> Result<(), PersistenceError> {
        self.store.remove(&self.key)
    }
}

/// Deadline-based save coalescing
///
/// The first request opens a window; requests inside it ride along.
#[derive(Debug, Clone)]
pub struct SaveScheduler {
    window: Duration,
    deadline: Option<Instant>,
}

impl SaveScheduler {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub fn request(&mut self, now: Instant) {
        if self.deadline.is_none() {
            self.deadline = Some(now + self.window);
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn due(&self, now: Instant) -> bool {
        matches!(self.deadline, Some(deadline) if now >= deadline)
    }

    pub fn clear(&mut self) {
        self.deadline = None;
    }
}
