//! # Edit Session
//!
//! The single command surface over one document.
//!
//! An `EditSession` owns the document, its history, the selection and the
//! view state. Every command runs to completion before the next one:
//!
//! 1. validate preconditions against the current document
//! 2. apply exactly one store operation
//! 3. commit exactly one history entry
//! 4. prune the selection
//! 5. schedule a (debounced) session save
//!
//! Commands that leave the document as it was commit nothing. Clipboard and
//! storage failures never fail a command: they are logged and queued as
//! [`Notice`]s for the editing surface.

use crate::block::{Attributes, Block, IdGenerator};
use crate::clipboard::provider::ClipboardProvider;
use crate::clipboard::{ClipboardCodec, ClipboardPayload};
use crate::config::EditorConfig;
use crate::document::{Document, Position};
use crate::errors::{EditorError, ValidationError};
use crate::history::{History, HistoryEntry};
use crate::mutations::Mutation;
use crate::persistence::{SaveScheduler, SessionGateway, SessionStore};
use crate::selection::Selection;
use serde_json::Value;
use std::fmt;
use std::time::Instant;

/// Result of a command that was accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The document changed and one history entry was committed
    Applied,
    /// The document is as it was; nothing was committed or scheduled
    Unchanged,
}

impl CommandOutcome {
    pub fn is_applied(self) -> bool {
        self == CommandOutcome::Applied
    }
}

/// Soft, user-visible problems that did not stop editing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    SaveFailed(String),
    ClipboardFailed(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::SaveFailed(reason) => {
                write!(f, "Your changes could not be saved locally: {}", reason)
            }
            Notice::ClipboardFailed(reason) => write!(f, "Clipboard unavailable: {}", reason),
        }
    }
}

/// Session-scoped UI state the editing surface reads and toggles
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    /// Block that has keyboard focus
    pub focused_block: Option<String>,
    pub inserter_open: bool,
    pub settings_open: bool,
}

/// Editing session over one document
pub struct EditSession {
    document: Document,
    history: History,
    selection: Selection,
    ids: IdGenerator,
    title: String,
    view: ViewState,
    notices: Vec<Notice>,
    gateway: SessionGateway,
    scheduler: SaveScheduler,
    clipboard: Box<dyn ClipboardProvider>,
    codec: ClipboardCodec,
    config: EditorConfig,
}

impl EditSession {
    /// Start a fresh session on an empty document
    pub fn new(
        config: EditorConfig,
        store: Box<dyn SessionStore>,
        clipboard: Box<dyn ClipboardProvider>,
    ) -> Self {
        let mut history = History::with_max_entries(config.max_history);
        history.reset(Document::new());

        Self {
            document: Document::new(),
            history,
            selection: Selection::new(),
            ids: IdGenerator::new(&config.session_key),
            title: String::new(),
            view: ViewState::default(),
            notices: Vec::new(),
            gateway: SessionGateway::new(store, config.session_key.clone()),
            scheduler: SaveScheduler::new(config.save_debounce()),
            codec: ClipboardCodec::with_default_type(config.default_block_type.clone()),
            clipboard,
            config,
        }
    }

    /// Start a session, picking up the stored snapshot when it is accepted
    pub fn restore(
        config: EditorConfig,
        store: Box<dyn SessionStore>,
        clipboard: Box<dyn ClipboardProvider>,
    ) -> Self {
        let mut session = Self::new(config, store, clipboard);

        let Some(snapshot) = session.gateway.load() else {
            return session;
        };
        let Some(history) =
            History::from_parts(snapshot.history, snapshot.cursor_index, session.config.max_history)
        else {
            return session;
        };

        for entry in history.entries() {
            for id in entry.document.ids() {
                session.ids.observe([id.as_str()]);
            }
        }
        if let Some(current) = history.current() {
            session.document = current.document.clone();
        }
        session.history = history;
        session.title = snapshot.document_title;

        tracing::info!(
            "Restored session {} ({} blocks, {} history entries)",
            session.gateway.key(),
            session.document.len(),
            session.history.len()
        );
        session
    }

    // ---- Commands ----

    /// Validate and apply one mutation as one undoable step
    pub fn apply(&mut self, mutation: Mutation) -> Result<CommandOutcome, EditorError> {
        let next = mutation.apply(&self.document, &mut self.ids)?;
        Ok(self.commit(next, mutation.name()))
    }

    /// Insert a block and return its id
    pub fn insert(&mut self, block: Block, position: Position) -> Result<String, EditorError> {
        let before = self.document.ids();
        let supplied = block.id.clone();
        self.apply(Mutation::Insert { block, position })?;
        // The only top-level id that was not there before
        self.document
            .blocks()
            .iter()
            .find(|b| !before.contains(&b.id))
            .map(|b| b.id.clone())
            .ok_or_else(|| ValidationError::BlockNotFound(supplied).into())
    }

    pub fn update(
        &mut self,
        id: &str,
        content: Option<Value>,
        attributes: Attributes,
    ) -> Result<CommandOutcome, EditorError> {
        self.apply(Mutation::Update {
            id: id.to_string(),
            content,
            attributes,
        })
    }

    pub fn delete(&mut self, id: &str) -> Result<CommandOutcome, EditorError> {
        self.apply(Mutation::Delete { id: id.to_string() })
    }

    pub fn move_block(&mut self, id: &str, new_index: usize) -> Result<CommandOutcome, EditorError> {
        self.apply(Mutation::Move {
            id: id.to_string(),
            new_index,
        })
    }

    /// Duplicate a block and return the copy's id
    pub fn duplicate(&mut self, id: &str) -> Result<String, EditorError> {
        self.apply(Mutation::Duplicate { id: id.to_string() })?;
        self.document
            .index_of(id)
            .and_then(|index| self.document.blocks().get(index + 1))
            .map(|copy| copy.id.clone())
            .ok_or_else(|| ValidationError::BlockNotFound(id.to_string()).into())
    }

    pub fn replace_range(
        &mut self,
        start_id: &str,
        end_id: &str,
        blocks: Vec<Block>,
    ) -> Result<CommandOutcome, EditorError> {
        self.apply(Mutation::ReplaceRange {
            start_id: start_id.to_string(),
            end_id: end_id.to_string(),
            blocks,
        })
    }

    /// Replace the selected run. The selection must be non-empty and contiguous.
    pub fn replace_selection(&mut self, blocks: Vec<Block>) -> Result<CommandOutcome, EditorError> {
        let (start_id, end_id) = self.selection.span(&self.document)?;
        self.replace_range(&start_id, &end_id, blocks)
    }

    pub fn type_change(&mut self, id: &str, new_type: &str) -> Result<CommandOutcome, EditorError> {
        self.apply(Mutation::TypeChange {
            id: id.to_string(),
            new_type: new_type.to_string(),
        })
    }

    /// Step back one entry. Returns the restored document, or `None` at the first entry.
    pub fn undo(&mut self) -> Option<&Document> {
        let document = self.history.undo()?.document.clone();
        tracing::debug!("undo to entry {}", self.history.cursor());
        self.show(document);
        Some(&self.document)
    }

    /// Step forward one entry. Returns the restored document, or `None` at the tail.
    pub fn redo(&mut self) -> Option<&Document> {
        let document = self.history.redo()?.document.clone();
        tracing::debug!("redo to entry {}", self.history.cursor());
        self.show(document);
        Some(&self.document)
    }

    /// Encode a block and put it on the clipboard
    ///
    /// The payload is returned even when the clipboard write fails.
    pub fn copy(&mut self, id: &str) -> Result<ClipboardPayload, EditorError> {
        let block = self
            .document
            .get(id)
            .ok_or_else(|| ValidationError::BlockNotFound(id.to_string()))?;
        let payload = self.codec.encode(block);

        if let Err(e) = self.clipboard.write(&payload) {
            tracing::warn!("Clipboard write via {} failed: {}", self.clipboard.name(), e);
            self.notices.push(Notice::ClipboardFailed(e.to_string()));
        }
        Ok(payload)
    }

    /// Read the clipboard and insert what it decodes to
    ///
    /// Returns the inserted block's id, or `None` when nothing usable was on
    /// the clipboard.
    pub fn paste(&mut self, position: Position) -> Result<Option<String>, EditorError> {
        let contents = match self.clipboard.read() {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!("Clipboard read via {} failed: {}", self.clipboard.name(), e);
                self.notices.push(Notice::ClipboardFailed(e.to_string()));
                return Ok(None);
            }
        };

        // Decoded blocks carry no ids; the store assigns fresh ones
        let Some(block) = self.codec.decode_block(&contents) else {
            tracing::debug!("paste: nothing to insert");
            return Ok(None);
        };

        self.insert(block, position).map(Some)
    }

    /// Replace the document with an unrelated one; history collapses to it
    pub fn load_document(&mut self, document: Document, title: impl Into<String>) {
        self.ids.observe(document.ids().iter().map(String::as_str));
        self.history.reset(document.clone());
        self.document = document;
        self.title = title.into();
        self.selection.clear();
        self.view = ViewState::default();
        self.scheduler.request(Instant::now());
        tracing::info!("Loaded document \"{}\" ({} blocks)", self.title, self.document.len());
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        let title = title.into();
        if title != self.title {
            self.title = title;
            self.scheduler.request(Instant::now());
        }
    }

    // ---- Selection and view ----

    pub fn toggle_selection(&mut self, id: &str) -> Result<bool, EditorError> {
        Ok(self.selection.toggle(id, &self.document)?)
    }

    pub fn select_range(&mut self, start_id: &str, end_id: &str) -> Result<(), EditorError> {
        Ok(self.selection.select_range(start_id, end_id, &self.document)?)
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Move keyboard focus to a block, or clear it
    pub fn focus(&mut self, id: Option<&str>) -> Result<(), EditorError> {
        if let Some(id) = id {
            if !self.document.contains(id) {
                return Err(ValidationError::BlockNotFound(id.to_string()).into());
            }
        }
        self.view.focused_block = id.map(str::to_string);
        Ok(())
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ViewState {
        &mut self.view
    }

    // ---- Persistence ----

    /// Save if the debounce window has elapsed. Returns whether a save ran.
    pub fn tick(&mut self) -> bool {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> bool {
        if self.scheduler.due(now) {
            self.save();
            true
        } else {
            false
        }
    }

    /// Save now if a save is pending
    pub fn flush(&mut self) {
        if self.scheduler.is_pending() {
            self.save();
        }
    }

    pub fn has_pending_save(&self) -> bool {
        self.scheduler.is_pending()
    }

    /// Drop the stored snapshot and any pending save
    pub fn discard_saved_session(&mut self) -> Result<(), EditorError> {
        self.scheduler.clear();
        self.gateway.clear()?;
        tracing::info!("Discarded saved session {}", self.gateway.key());
        Ok(())
    }

    // ---- Queries ----

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Drain notices accumulated since the last call
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    // ---- Internals ----

    fn commit(&mut self, next: Document, label: &str) -> CommandOutcome {
        if next == self.document {
            tracing::debug!("{}: document unchanged", label);
            return CommandOutcome::Unchanged;
        }

        self.history
            .commit(HistoryEntry::new(next.clone()).with_label(label));
        tracing::debug!(
            "{}: {} blocks, history {}/{}",
            label,
            next.len(),
            self.history.cursor() + 1,
            self.history.len()
        );
        self.show(next);
        CommandOutcome::Applied
    }

    /// Make `document` current and bring dependent state in line with it
    fn show(&mut self, document: Document) {
        self.document = document;

        let pruned = self.selection.prune_invalid(&self.document);
        if pruned > 0 {
            tracing::debug!("pruned {} selected blocks", pruned);
        }
        let stale_focus = self
            .view
            .focused_block
            .as_deref()
            .is_some_and(|id| !self.document.contains(id));
        if stale_focus {
            self.view.focused_block = None;
        }

        self.scheduler.request(Instant::now());
    }

    fn save(&mut self) {
        self.scheduler.clear();
        if let Err(e) = self
            .gateway
            .save(self.history.entries(), self.history.cursor(), &self.title)
        {
            tracing::warn!("Failed to save session {}: {}", self.gateway.key(), e);
            self.notices.push(Notice::SaveFailed(e.to_string()));
        }
    }
}

impl Drop for EditSession {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::provider::{ClipboardContents, MemoryClipboard, NoClipboard};
    use crate::persistence::MemorySessionStore;
    use serde_json::json;
    use std::time::Duration;

    fn session() -> (EditSession, MemorySessionStore, MemoryClipboard) {
        let store = MemorySessionStore::new();
        let clipboard = MemoryClipboard::new();
        let session = EditSession::new(
            EditorConfig::default(),
            Box::new(store.clone()),
            Box::new(clipboard.clone()),
        );
        (session, store, clipboard)
    }

    #[test]
    fn test_session_creation() {
        let (session, _, _) = session();

        assert!(session.document().is_empty());
        assert_eq!(session.history().len(), 1);
        assert!(!session.can_undo());
        assert!(session.selection().is_empty());
        assert!(!session.has_pending_save());
    }

    #[test]
    fn test_one_command_one_entry() {
        let (mut session, _, _) = session();

        let id = session.insert(Block::paragraph("a"), Position::End).unwrap();
        session.duplicate(&id).unwrap();
        session.type_change(&id, "core/heading").unwrap();

        assert_eq!(session.history().len(), 4);
        assert_eq!(session.history().undo_description(), Some("typeChange"));
        assert_eq!(session.document().blocks()[0].block_type, "core/heading");
    }

    #[test]
    fn test_unchanged_commands_commit_nothing() {
        let (mut session, _, _) = session();
        let id = session.insert(Block::paragraph("a"), Position::End).unwrap();
        session.flush();

        assert_eq!(session.delete("missing").unwrap(), CommandOutcome::Unchanged);
        assert_eq!(
            session.type_change(&id, "core/paragraph").unwrap(),
            CommandOutcome::Unchanged
        );
        assert_eq!(session.history().len(), 2);
        assert!(!session.has_pending_save());
    }

    #[test]
    fn test_rejected_command_leaves_state() {
        let (mut session, _, _) = session();
        let id = session.insert(Block::paragraph("a"), Position::End).unwrap();
        let before = session.document().clone();

        let err = session.move_block("nope", 0).unwrap_err();
        assert_eq!(
            err.as_validation(),
            Some(&ValidationError::BlockNotFound("nope".into()))
        );
        let err = session
            .insert(Block::paragraph("b").with_id(id.clone()), Position::End)
            .unwrap_err();
        assert_eq!(err.as_validation(), Some(&ValidationError::DuplicateId(id)));

        assert_eq!(session.document(), &before);
        assert_eq!(session.history().len(), 2);
    }

    #[test]
    fn test_selection_pruned_after_delete() {
        let (mut session, _, _) = session();
        let a = session.insert(Block::paragraph("a"), Position::End).unwrap();
        let b = session.insert(Block::paragraph("b"), Position::End).unwrap();

        session.toggle_selection(&a).unwrap();
        session.toggle_selection(&b).unwrap();
        session.focus(Some(&a)).unwrap();
        session.delete(&a).unwrap();

        assert_eq!(session.selection().ids(), &[b.clone()]);
        assert_eq!(session.view().focused_block, None);

        // Undo brings the block back, not the selection
        session.undo().unwrap();
        assert!(session.document().contains(&a));
        assert_eq!(session.selection().len(), 1);
    }

    #[test]
    fn test_replace_selection_requires_contiguous() {
        let (mut session, _, _) = session();
        let ids: Vec<String> = (0..4)
            .map(|i| session.insert(Block::paragraph(format!("p{}", i)), Position::End).unwrap())
            .collect();

        let err = session.replace_selection(vec![]).unwrap_err();
        assert_eq!(err.as_validation(), Some(&ValidationError::EmptySelection));

        session.toggle_selection(&ids[0]).unwrap();
        session.toggle_selection(&ids[2]).unwrap();
        let err = session.replace_selection(vec![]).unwrap_err();
        assert_eq!(err.as_validation(), Some(&ValidationError::NonContiguousSelection));

        session.toggle_selection(&ids[1]).unwrap();
        session
            .replace_selection(vec![Block::paragraph("merged")])
            .unwrap();
        assert_eq!(session.document().len(), 2);
        assert!(session.selection().is_empty());
    }

    #[test]
    fn test_copy_and_paste() {
        let (mut session, _, clipboard) = session();
        let id = session
            .insert(Block::heading("Title", 2), Position::End)
            .unwrap();

        let payload = session.copy(&id).unwrap();
        assert_eq!(clipboard.get().structured.as_deref(), Some(payload.structured.as_str()));

        let pasted = session.paste(Position::After(id.clone())).unwrap().unwrap();
        assert_ne!(pasted, id);
        assert_eq!(session.document().len(), 2);
        assert_eq!(session.document().blocks()[1].content, json!({ "text": "Title", "level": 2 }));
    }

    #[test]
    fn test_paste_of_nothing_is_noop() {
        let (mut session, _, clipboard) = session();
        clipboard.set(ClipboardContents::plain_text("   "));

        assert_eq!(session.paste(Position::End).unwrap(), None);
        assert!(session.document().is_empty());
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_clipboard_failure_becomes_notice() {
        let mut session = EditSession::new(
            EditorConfig::default(),
            Box::new(MemorySessionStore::new()),
            Box::new(NoClipboard),
        );
        let id = session.insert(Block::paragraph("a"), Position::End).unwrap();

        assert!(session.copy(&id).is_ok());
        assert_eq!(session.paste(Position::End).unwrap(), None);

        let notices = session.take_notices();
        assert_eq!(notices.len(), 2);
        assert!(matches!(notices[0], Notice::ClipboardFailed(_)));
        assert!(session.take_notices().is_empty());
    }

    #[test]
    fn test_saves_are_debounced() {
        let (mut session, store, _) = session();
        let start = Instant::now();

        session.insert(Block::paragraph("a"), Position::End).unwrap();
        session.insert(Block::paragraph("b"), Position::End).unwrap();
        assert!(!session.tick_at(start));
        assert!(store.get("blockdoc-editor-session").is_none());

        assert!(session.tick_at(start + Duration::from_secs(5)));
        assert!(store.get("blockdoc-editor-session").is_some());
        assert!(!session.tick_at(start + Duration::from_secs(10)));
    }

    #[test]
    fn test_save_failure_keeps_editing() {
        let (mut session, store, _) = session();
        store.set_fail_writes(true);

        session.insert(Block::paragraph("a"), Position::End).unwrap();
        session.flush();
        session.insert(Block::paragraph("b"), Position::End).unwrap();

        assert_eq!(session.document().len(), 2);
        assert!(matches!(session.take_notices().as_slice(), [Notice::SaveFailed(_)]));
    }

    #[test]
    fn test_load_document_resets_history() {
        let (mut session, _, _) = session();
        session.insert(Block::paragraph("a"), Position::End).unwrap();

        let doc = Document::from_blocks(vec![Block::paragraph("other").with_id("x")]).unwrap();
        session.load_document(doc.clone(), "Other");

        assert_eq!(session.document(), &doc);
        assert_eq!(session.history().len(), 1);
        assert!(!session.can_undo());
        assert_eq!(session.title(), "Other");

        let id = session.insert(Block::paragraph("b"), Position::End).unwrap();
        assert_ne!(id, "x");
    }
}
