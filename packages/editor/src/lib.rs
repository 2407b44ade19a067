//! # Blockdoc Editor
//!
//! Core document model for a block-structured editor.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ editing surface (out of crate)              │
//! └─────────────────────────────────────────────┘
//!                     ↓ commands
//! ┌─────────────────────────────────────────────┐
//! │ session: EditSession                        │
//! │  - one command → one history entry          │
//! │  - selection pruning, view state, notices   │
//! │  - debounced session saves                  │
//! └─────────────────────────────────────────────┘
//!       ↓              ↓              ↓
//! ┌───────────┐ ┌──────────────┐ ┌──────────────┐
//! │ document  │ │ history      │ │ clipboard    │
//! │ mutations │ │ selection    │ │ persistence  │
//! └───────────┘ └──────────────┘ └──────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Documents are values**: store operations return a new document and
//!    never mutate in place, so history snapshots are free to share
//! 2. **Ids are never reused**: every id comes from a collision-checked
//!    generator owned by the session
//! 3. **Soft failures**: clipboard and storage problems become notices,
//!    never errors that end the session
//!
//! ## Usage
//!
//! ```rust,ignore
//! use blockdoc_editor::{
//!     Block, EditSession, EditorConfig, FileSessionStore, MemoryClipboard, Position,
//! };
//!
//! let config = EditorConfig::load(".")?;
//! let store = FileSessionStore::new(".blockdoc");
//! let mut session = EditSession::restore(config, Box::new(store), Box::new(MemoryClipboard::new()));
//!
//! let id = session.insert(Block::paragraph("Hello"), Position::End)?;
//! session.duplicate(&id)?;
//! session.undo();
//!
//! // Called from the host's event loop
//! session.tick();
//! ```

mod block;
pub mod clipboard;
mod config;
mod conversions;
mod document;
mod errors;
mod history;
mod mutations;
mod persistence;
mod selection;
mod session;

pub use block::{get_session_seed, Attributes, Block, IdGenerator};
pub use clipboard::provider::{ClipboardContents, ClipboardProvider, MemoryClipboard, NoClipboard};
pub use clipboard::{ClipboardCodec, ClipboardPayload};
pub use config::{EditorConfig, DEFAULT_CONFIG_NAME};
pub use conversions::{can_convert, convert};
pub use document::{Document, Position};
pub use errors::{ClipboardError, EditorError, PersistenceError, ValidationError};
pub use history::{History, HistoryEntry, DEFAULT_MAX_HISTORY};
pub use mutations::Mutation;
pub use persistence::{
    FileSessionStore, MemorySessionStore, SaveScheduler, SessionGateway, SessionSnapshot,
    SessionStore,
};
pub use selection::Selection;
pub use session::{CommandOutcome, EditSession, Notice, ViewState};
