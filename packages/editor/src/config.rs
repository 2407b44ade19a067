//! Editor configuration, read from `blockdoc.config.json` when present.

use crate::errors::EditorError;
use crate::history::DEFAULT_MAX_HISTORY;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_NAME: &str = "blockdoc.config.json";

/// Editor configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    /// Maximum number of history entries kept for undo
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Window within which session saves are coalesced
    #[serde(default = "default_save_debounce_ms")]
    pub save_debounce_ms: u64,

    /// Storage key the session snapshot is written under
    #[serde(default = "default_session_key")]
    pub session_key: String,

    /// Block type used when pasted content matches nothing else
    #[serde(default = "default_block_type")]
    pub default_block_type: String,
}

fn default_max_history() -> usize {
    DEFAULT_MAX_HISTORY
}

fn default_save_debounce_ms() -> u64 {
    500
}

fn default_session_key() -> String {
    "blockdoc-editor-session".to_string()
}

fn default_block_type() -> String {
    "core/paragraph".to_string()
}

impl EditorConfig {
    /// Load config from a directory, falling back to defaults when absent
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, EditorError> {
        let config_path = dir.as_ref().join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| EditorError::Config(format!("{}: {}", config_path.display(), e)))?;
            Self::from_json(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_json(json: &str) -> Result<Self, EditorError> {
        let config: EditorConfig =
            serde_json::from_str(json).map_err(|e| EditorError::Config(e.to_string()))?;
        config.validated()
    }

    fn validated(self) -> Result<Self, EditorError> {
        if self.max_history == 0 {
            return Err(EditorError::Config("maxHistory must be at least 1".into()));
        }
        if self.session_key.trim().is_empty() {
            return Err(EditorError::Config("sessionKey must not be empty".into()));
        }
        if self.default_block_type.trim().is_empty() {
            return Err(EditorError::Config("defaultBlockType must not be empty".into()));
        }
        Ok(self)
    }

    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            save_debounce_ms: default_save_debounce_ms(),
            session_key: default_session_key(),
            default_block_type: default_block_type(),
        }
    }
}
