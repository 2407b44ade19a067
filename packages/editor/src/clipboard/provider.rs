//! Platform clipboard capability.
//!
//! The editor only defines the interface; hosts inject a concrete provider.
//! [`MemoryClipboard`] backs the tests.

use crate::clipboard::ClipboardPayload;
use crate::errors::ClipboardError;
use parking_lot::Mutex;
use std::sync::Arc;

/// Representations currently on the clipboard
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClipboardContents {
    /// Canonical block serialization (custom clipboard format)
    pub structured: Option<String>,

    pub plain_text: Option<String>,

    /// HTML-ish markup
    pub markup: Option<String>,
}

impl ClipboardContents {
    pub fn plain_text(text: impl Into<String>) -> Self {
        Self {
            plain_text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn markup(markup: impl Into<String>) -> Self {
        Self {
            markup: Some(markup.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.structured.is_none() && self.plain_text.is_none() && self.markup.is_none()
    }
}

impl From<ClipboardPayload> for ClipboardContents {
    /// The structured form doubles as plain text so foreign text surfaces
    /// still hold something parseable
    fn from(payload: ClipboardPayload) -> Self {
        Self {
            plain_text: Some(payload.structured.clone()),
            structured: Some(payload.structured),
            markup: Some(payload.markup),
        }
    }
}

pub trait ClipboardProvider: Send + Sync {
    fn name(&self) -> &str;
    fn read(&self) -> Result<ClipboardContents, ClipboardError>;
    fn write(&self, payload: &ClipboardPayload) -> Result<(), ClipboardError>;
}

/// Provider for hosts without clipboard access
#[derive(Debug, Default)]
pub struct NoClipboard;

impl ClipboardProvider for NoClipboard {
    fn name(&self) -> &str {
        "none"
    }

    fn read(&self) -> Result<ClipboardContents, ClipboardError> {
        Err(ClipboardError::Unavailable)
    }

    fn write(&self, _payload: &ClipboardPayload) -> Result<(), ClipboardError> {
        Err(ClipboardError::Unavailable)
    }
}

/// In-process clipboard; clones share the same contents
#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    contents: Arc<Mutex<ClipboardContents>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put arbitrary contents on the clipboard, as another application would
    pub fn set(&self, contents: ClipboardContents) {
        *self.contents.lock() = contents;
    }

    pub fn get(&self) -> ClipboardContents {
        self.contents.lock().clone()
    }
}

impl ClipboardProvider for MemoryClipboard {
    fn name(&self) -> &str {
        "memory"
    }

    fn read(&self) -> Result<ClipboardContents, ClipboardError> {
        Ok(self.get())
    }

    fn write(&self, payload: &ClipboardPayload) -> Result<(), ClipboardError> {
        self.set(payload.clone().into());
        Ok(())
    }
}
