//! # Undo/Redo History
//!
//! Linear history of document snapshots with a cursor.
//!
//! ## Design
//!
//! - Each committed command appends one immutable snapshot
//! - Undo/redo only move the cursor; snapshots are never rewritten
//! - Committing while the cursor is behind the tail discards the redo branch
//! - Depth is bounded; the oldest entries fall off first
//!
//! ```text
//! empty ──commit──▶ singleton ──commit──▶ n entries (cursor)
//!   ▲                                        │
//!   └────────────── reset ◀──────────────────┘  (reset yields a singleton)
//! ```

use crate::document::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default maximum number of entries kept
pub const DEFAULT_MAX_HISTORY: usize = 100;

/// Immutable document snapshot taken at commit time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(rename = "blocks")]
    pub document: Document,

    pub timestamp: DateTime<Utc>,

    /// Name of the command that produced this snapshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl HistoryEntry {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            timestamp: Utc::now(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Snapshot history for document editing
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<HistoryEntry>,

    /// Index of the current entry; meaningless while `entries` is empty
    cursor: usize,

    /// Maximum number of entries (at least 1)
    max_entries: usize,
}

impl History {
    /// Create an empty history with the default depth
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_MAX_HISTORY)
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            max_entries: max_entries.max(1),
        }
    }

    /// Rebuild a history from persisted parts
    ///
    /// Returns `None` when the parts violate `cursor < len`. Entries beyond
    /// the depth bound are dropped from the front.
    pub fn from_parts(
        entries: Vec<HistoryEntry>,
        cursor: usize,
        max_entries: usize,
    ) -> Option<Self> {
        if cursor >= entries.len() {
            return None;
        }
        let mut history = Self {
            entries,
            cursor,
            max_entries: max_entries.max(1),
        };
        history.trim();
        Some(history)
    }

    /// Append a snapshot, discarding any redo branch
    pub fn commit(&mut self, entry: HistoryEntry) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push(entry);
        self.cursor = self.entries.len() - 1;
        self.trim();
    }

    fn trim(&mut self) {
        if self.entries.len() > self.max_entries {
            // Oldest first, but never past the cursor; the rest comes off the redo end
            let overflow = self.entries.len() - self.max_entries;
            let front = overflow.min(self.cursor);
            self.entries.drain(..front);
            self.cursor -= front;
            self.entries.truncate(self.max_entries);
        }
    }

    /// Step back one entry and return it, or `None` at the first entry
    pub fn undo(&mut self) -> Option<&HistoryEntry> {
        if self.can_undo() {
            self.cursor -= 1;
            self.entries.get(self.cursor)
        } else {
            None
        }
    }

    /// Step forward one entry and return it, or `None` at the tail
    pub fn redo(&mut self) -> Option<&HistoryEntry> {
        if self.can_redo() {
            self.cursor += 1;
            self.entries.get(self.cursor)
        } else {
            None
        }
    }

    /// Collapse to a single entry (used when loading an unrelated document)
    pub fn reset(&mut self, document: Document) {
        self.entries.clear();
        self.entries.push(HistoryEntry::new(document));
        self.cursor = 0;
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty() && self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        !self.entries.is_empty() && self.cursor < self.entries.len() - 1
    }

    pub fn current(&self) -> Option<&HistoryEntry> {
        self.entries.get(self.cursor)
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Label of the entry an undo would leave
    pub fn undo_description(&self) -> Option<&str> {
        if self.can_undo() {
            self.current().and_then(|entry| entry.label.as_deref())
        } else {
            None
        }
    }

    /// Label of the entry a redo would reach
    pub fn redo_description(&self) -> Option<&str> {
        if self.can_redo() {
            self.entries
                .get(self.cursor + 1)
                .and_then(|entry| entry.label.as_deref())
        } else {
            None
        }
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}
