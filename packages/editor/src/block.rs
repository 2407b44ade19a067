//! # Blocks
//!
//! The atomic unit of a document: a type tag, an opaque content payload,
//! an attribute map and optional nested blocks.
//!
//! Ids come from an [`IdGenerator`] owned by the edit session. The generator
//! lives outside document snapshots so that undoing an insert never hands the
//! same id out twice.

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Attribute map. Keys are sorted, so serialization is deterministic.
pub type Attributes = Map<String, Value>;

/// A single document block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Unique within a document. Empty means "not yet assigned".
    #[serde(default)]
    pub id: String,

    #[serde(rename = "type")]
    pub block_type: String,

    #[serde(default)]
    pub content: Value,

    #[serde(default)]
    pub attributes: Attributes,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inner_blocks: Vec<Block>,
}

impl Block {
    /// Create a block without an id; the store assigns one on insert
    pub fn new(block_type: impl Into<String>, content: Value) -> Self {
        Self {
            id: String::new(),
            block_type: block_type.into(),
            content,
            attributes: Attributes::new(),
            inner_blocks: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_inner_blocks(mut self, inner: Vec<Block>) -> Self {
        self.inner_blocks = inner;
        self
    }

    /// Paragraph shorthand used throughout the editor and its tests
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::new("core/paragraph", serde_json::json!({ "text": text.into() }))
    }

    pub fn heading(text: impl Into<String>, level: u8) -> Self {
        Self::new(
            "core/heading",
            serde_json::json!({ "text": text.into(), "level": level }),
        )
    }

    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }

    /// Visit this block and every nested block, depth first
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Block)) {
        visit(self);
        for inner in &self.inner_blocks {
            inner.walk(visit);
        }
    }

    /// True when some string in the content (or in a nested block's content)
    /// is non-empty after trimming whitespace
    pub fn has_visible_content(&self) -> bool {
        value_has_text(&self.content) || self.inner_blocks.iter().any(Block::has_visible_content)
    }

    /// Same block with every id in the tree replaced by a fresh one
    pub fn reidentified(&self, ids: &mut IdGenerator, taken: &HashSet<String>) -> Block {
        let mut copy = self.clone();
        copy.assign_fresh_ids(ids, taken);
        copy
    }

    pub(crate) fn assign_fresh_ids(&mut self, ids: &mut IdGenerator, taken: &HashSet<String>) {
        self.id = ids.next_id(taken);
        for inner in &mut self.inner_blocks {
            inner.assign_fresh_ids(ids, taken);
        }
    }

    /// Fill in missing ids (the block itself and nested blocks) without
    /// touching ids that were supplied
    pub(crate) fn assign_missing_ids(&mut self, ids: &mut IdGenerator, taken: &HashSet<String>) {
        if !self.has_id() {
            self.id = ids.next_id(taken);
        }
        for inner in &mut self.inner_blocks {
            inner.assign_missing_ids(ids, taken);
        }
    }
}

fn value_has_text(value: &Value) -> bool {
    match value {
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => items.iter().any(value_has_text),
        Value::Object(map) => map.values().any(value_has_text),
        _ => false,
    }
}

/// Derive a stable seed from a session key and a creation instant
pub fn get_session_seed(key: &str, nonce: i64) -> String {
    let mut hasher = Hasher::new();
    hasher.update(key.as_bytes());
    hasher.update(&nonce.to_le_bytes());
    format!("{:x}", hasher.finalize())
}

/// Monotonic, collision-checked block id source
#[derive(Debug, Clone)]
pub struct IdGenerator {
    seed: String,
    count: u64,
    issued: HashSet<String>,
}

impl IdGenerator {
    /// Seeded from the session key and the current time
    pub fn new(session_key: &str) -> Self {
        let nonce = chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_else(|| chrono::Utc::now().timestamp_micros());
        Self::from_seed(get_session_seed(session_key, nonce))
    }

    pub fn from_seed(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            count: 0,
            issued: HashSet::new(),
        }
    }

    /// Generate the next id not present in `taken` and never issued before
    pub fn next_id(&mut self, taken: &HashSet<String>) -> String {
        loop {
            self.count += 1;
            let candidate = format!("{}-{}", self.seed, self.count);
            if taken.contains(&candidate) || self.issued.contains(&candidate) {
                continue;
            }
            self.issued.insert(candidate.clone());
            return candidate;
        }
    }

    /// Mark ids as used, e.g. after restoring a session from storage
    pub fn observe<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) {
        for id in ids {
            self.issued.insert(id.to_string());
        }
    }

    /// Whether `id` was issued by or reported to this generator
    pub fn is_used(&self, id: &str) -> bool {
        self.issued.contains(id)
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }
}
