//! # Clipboard Codec
//!
//! Converts a block to and from clipboard transport representations.
//!
//! ## Encoding
//!
//! Both representations are always produced together:
//! - **structured**: canonical JSON of the block, lossless
//! - **markup**: per-type block-comment markup (see [`markup`])
//!
//! ## Decoding
//!
//! Representations are tried in priority order, falling through silently:
//!
//! ```text
//! structured → plain text as structured → markup rules → visible text as default block
//! ```
//!
//! Only total exhaustion yields `None`, which callers treat as a paste no-op.
//! Ids inside a payload are never trusted: every decoded block, nested blocks
//! included, gets a fresh id.

pub mod markup;
pub mod provider;

use crate::block::{Attributes, Block, IdGenerator};
use crate::conversions::PARAGRAPH;
use markup::{visible_text, MarkupRules};
use provider::ClipboardContents;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;

/// Both transport representations of one block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipboardPayload {
    pub structured: String,
    pub markup: String,
}

/// Canonical clipboard schema. Unknown fields disqualify a payload.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CanonicalBlock {
    #[serde(default)]
    id: String,
    #[serde(rename = "type")]
    block_type: String,
    content: Value,
    attributes: Attributes,
    #[serde(default)]
    inner_blocks: Vec<CanonicalBlock>,
}

impl From<&Block> for CanonicalBlock {
    fn from(block: &Block) -> Self {
        Self {
            id: block.id.clone(),
            block_type: block.block_type.clone(),
            content: block.content.clone(),
            attributes: block.attributes.clone(),
            inner_blocks: block.inner_blocks.iter().map(CanonicalBlock::from).collect(),
        }
    }
}

impl CanonicalBlock {
    /// Into a block with ids cleared
    fn into_block(self) -> Option<Block> {
        if self.block_type.is_empty() {
            return None;
        }
        let inner_blocks = self
            .inner_blocks
            .into_iter()
            .map(CanonicalBlock::into_block)
            .collect::<Option<Vec<_>>>()?;
        Some(Block {
            id: String::new(),
            block_type: self.block_type,
            content: self.content,
            attributes: self.attributes,
            inner_blocks,
        })
    }
}

/// Parse the canonical structured form. Ids are cleared.
pub fn parse_structured(text: &str) -> Option<Block> {
    serde_json::from_str::<CanonicalBlock>(text.trim())
        .ok()?
        .into_block()
}

/// Block ⇄ clipboard payload codec
#[derive(Debug)]
pub struct ClipboardCodec {
    rules: MarkupRules,
    default_block_type: String,
}

impl ClipboardCodec {
    pub fn new() -> Self {
        Self::with_default_type(PARAGRAPH)
    }

    /// Codec whose last-resort block type is `default_block_type`
    pub fn with_default_type(default_block_type: impl Into<String>) -> Self {
        Self {
            rules: MarkupRules::new(),
            default_block_type: default_block_type.into(),
        }
    }

    pub fn rules_mut(&mut self) -> &mut MarkupRules {
        &mut self.rules
    }

    pub fn encode(&self, block: &Block) -> ClipboardPayload {
        let structured = serde_json::to_string(&CanonicalBlock::from(block))
            .unwrap_or_else(|_| "{}".to_string());
        let markup = self.rules.encode(block, &structured);
        ClipboardPayload { structured, markup }
    }

    /// Decode without assigning ids
    pub fn decode_block(&self, contents: &ClipboardContents) -> Option<Block> {
        if let Some(block) = contents.structured.as_deref().and_then(parse_structured) {
            return Some(block);
        }
        tracing::debug!("clipboard: no usable structured payload");

        if let Some(block) = contents.plain_text.as_deref().and_then(parse_structured) {
            return Some(block);
        }
        tracing::debug!("clipboard: plain text is not a structured payload");

        if let Some(block) = contents.markup.as_deref().and_then(|m| self.rules.decode(m)) {
            return Some(block);
        }
        tracing::debug!("clipboard: no markup rule matched");

        let text = contents
            .markup
            .as_deref()
            .map(visible_text)
            .filter(|text| !text.is_empty())
            .or_else(|| {
                contents
                    .plain_text
                    .as_deref()
                    .map(str::trim)
                    .filter(|text| !text.is_empty())
                    .map(str::to_string)
            })?;
        Some(Block::new(self.default_block_type.clone(), json!({ "text": text })))
    }

    /// Decode and give the block tree fresh ids not in `taken`
    pub fn decode(
        &self,
        contents: &ClipboardContents,
        ids: &mut IdGenerator,
        taken: &HashSet<String>,
    ) -> Option<Block> {
        let block = self.decode_block(contents);
        if block.is_none() {
            tracing::debug!("clipboard: all representations exhausted");
        }
        block.map(|b| b.reidentified(ids, taken))
    }
}

impl Default for ClipboardCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(codec: &ClipboardCodec, contents: &ClipboardContents) -> Option<Block> {
        codec.decode(contents, &mut IdGenerator::from_seed("paste"), &HashSet::new())
    }

    #[test]
    fn test_structured_round_trip() {
        let codec = ClipboardCodec::new();
        let block = Block::heading("Hi", 3)
            .with_id("orig")
            .with_attribute("textAlign", json!("center"))
            .with_inner_blocks(vec![Block::paragraph("nested").with_id("inner")]);

        let payload = codec.encode(&block);
        let decoded = decode(&codec, &ClipboardContents {
            structured: Some(payload.structured),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(decoded.block_type, block.block_type);
        assert_eq!(decoded.content, block.content);
        assert_eq!(decoded.attributes, block.attributes);
        assert_eq!(decoded.inner_blocks[0].content, block.inner_blocks[0].content);
        assert_ne!(decoded.id, "orig");
        assert_ne!(decoded.inner_blocks[0].id, "inner");
    }

    #[test]
    fn test_structured_rejects_foreign_json() {
        assert!(parse_structured(r#"{"type":"core/paragraph","content":{}}"#).is_none());
        assert!(parse_structured(r#"{"type":"","content":{},"attributes":{}}"#).is_none());
        assert!(parse_structured(
            r#"{"type":"core/paragraph","content":{},"attributes":{},"extra":1}"#
        )
        .is_none());
        assert!(parse_structured("[1, 2]").is_none());
    }

    #[test]
    fn test_plain_text_structured_fallback() {
        let codec = ClipboardCodec::new();
        let payload = codec.encode(&Block::paragraph("from text"));

        let decoded = decode(&codec, &ClipboardContents {
            structured: Some("garbage".into()),
            plain_text: Some(format!("  {}\n", payload.structured)),
            markup: None,
        })
        .unwrap();
        assert_eq!(decoded.content["text"], "from text");
    }

    #[test]
    fn test_markup_fallback() {
        let codec = ClipboardCodec::new();
        let payload = codec.encode(&Block::heading("Markup", 2));

        let decoded = decode(&codec, &ClipboardContents::markup(payload.markup)).unwrap();
        assert_eq!(decoded.block_type, "core/heading");
        assert_eq!(decoded.content, json!({ "text": "Markup", "level": 2 }));
    }

    #[test]
    fn test_unrecognized_markup_becomes_default_block() {
        let codec = ClipboardCodec::new();
        let decoded = decode(
            &codec,
            &ClipboardContents::markup("<span class=\"x\">Hello <b>world</b></span>"),
        )
        .unwrap();
        assert_eq!(decoded.block_type, PARAGRAPH);
        assert_eq!(decoded.content, json!({ "text": "Hello world" }));
    }

    #[test]
    fn test_plain_text_becomes_default_block() {
        let codec = ClipboardCodec::with_default_type("core/preformatted");
        let decoded = decode(&codec, &ClipboardContents::plain_text("  just text ")).unwrap();
        assert_eq!(decoded.block_type, "core/preformatted");
        assert_eq!(decoded.content["text"], "just text");
    }

    #[test]
    fn test_exhaustion_returns_none() {
        let codec = ClipboardCodec::new();
        assert!(decode(&codec, &ClipboardContents::default()).is_none());
        assert!(decode(&codec, &ClipboardContents::markup("  <span> </span> ")).is_none());
        assert!(decode(&codec, &ClipboardContents::plain_text("   ")).is_none());
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let codec = ClipboardCodec::new();
        let block = Block::paragraph("same")
            .with_attribute("b", json!(1))
            .with_attribute("a", json!(2));
        assert_eq!(codec.encode(&block), codec.encode(&block.clone()));
        assert!(codec.encode(&block).markup.contains(r#"{"a":2,"b":1}"#));
    }
}
