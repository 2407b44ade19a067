//! Error types for the editor

use thiserror::Error;

/// Rejected command preconditions. The document is left untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Block not found: {0}")]
    BlockNotFound(String),

    #[error("Duplicate block id: {0}")]
    DuplicateId(String),

    #[error("Invalid range: {start} does not precede {end}")]
    InvalidRange { start: String, end: String },

    #[error("Selection is not contiguous")]
    NonContiguousSelection,

    #[error("Selection is empty")]
    EmptySelection,

    #[error("Cannot convert {from} to {to}")]
    UnsupportedConversion { from: String, to: String },

    #[error("Block type must not be empty")]
    EmptyBlockType,
}

/// Session storage failures. Never fatal: editing continues in memory.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClipboardError {
    #[error("Clipboard is unavailable")]
    Unavailable,

    #[error("Clipboard error: {0}")]
    Platform(String),
}

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Clipboard error: {0}")]
    Clipboard(#[from] ClipboardError),

    #[error("Config error: {0}")]
    Config(String),
}

impl EditorError {
    /// The validation failure behind this error, if any
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            EditorError::Validation(e) => Some(e),
            _ => None,
        }
    }
}
