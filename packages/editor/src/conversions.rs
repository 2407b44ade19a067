//! # Block Type Conversions
//!
//! Explicit conversion table between block types.
//!
//! Only text-bearing types convert. Each exposes one generic text field,
//! which is carried across; the remaining content keys are rebuilt for the
//! target type. Attributes the target does not understand are dropped.
//!
//! | from \ to    | paragraph | heading | list  | quote | code | preformatted | button |
//! |--------------|-----------|---------|-------|-------|------|--------------|--------|
//! | paragraph    | -         | text    | split | text  | text | text         | text   |
//! | heading      | text      | -       | split | text  | text | text         | text   |
//! | list         | join      | join    | -     | join  | join | join         | join   |
//! | quote        | text      | text    | split | -     | text | text         | text   |
//! | code         | text      | text    | split | text  | -    | text         | text   |
//! | preformatted | text      | text    | split | text  | text | -            | text   |
//! | button       | text      | text    | split | text  | text | text         | -      |
//!
//! `split` breaks the text on newlines into list items, `join` joins items
//! with newlines. Every other pair is rejected.

use crate::block::{Attributes, Block};
use crate::errors::ValidationError;
use serde_json::{json, Value};

pub const PARAGRAPH: &str = "core/paragraph";
pub const HEADING: &str = "core/heading";
pub const LIST: &str = "core/list";
pub const QUOTE: &str = "core/quote";
pub const CODE: &str = "core/code";
pub const PREFORMATTED: &str = "core/preformatted";
pub const BUTTON: &str = "core/button";

/// Attribute keys every type keeps
const GLOBAL_ATTRIBUTES: &[&str] = &["className", "anchor"];

struct TextType {
    name: &'static str,
    /// Content key holding the generic text; `None` for list items
    text_key: Option<&'static str>,
    attributes: &'static [&'static str],
}

const TEXT_TYPES: &[TextType] = &[
    TextType { name: PARAGRAPH, text_key: Some("text"), attributes: &["align", "dropCap"] },
    TextType { name: HEADING, text_key: Some("text"), attributes: &["textAlign"] },
    TextType { name: LIST, text_key: None, attributes: &["ordered", "start", "reversed"] },
    TextType { name: QUOTE, text_key: Some("text"), attributes: &["align"] },
    TextType { name: CODE, text_key: Some("content"), attributes: &[] },
    TextType { name: PREFORMATTED, text_key: Some("text"), attributes: &[] },
    TextType {
        name: BUTTON,
        text_key: Some("text"),
        attributes: &["backgroundColor", "textColor", "borderRadius"],
    },
];

fn text_type(name: &str) -> Option<&'static TextType> {
    TEXT_TYPES.iter().find(|t| t.name == name)
}

/// Whether `from → to` has an entry in the table
pub fn can_convert(from: &str, to: &str) -> bool {
    from == to || (text_type(from).is_some() && text_type(to).is_some())
}

/// Generic text of a block, if its type carries one
pub fn text_of(block: &Block) -> Option<String> {
    let kind = text_type(&block.block_type)?;
    match kind.text_key {
        Some(key) => Some(
            block
                .content
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        ),
        None => Some(list_items(&block.content).join("\n")),
    }
}

fn list_items(content: &Value) -> Vec<String> {
    content
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| item.as_str().unwrap_or_default().to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Convert a block to another type according to the table
///
/// The id and inner blocks are kept. Same-type conversion returns the block
/// unchanged.
pub fn convert(block: &Block, to: &str) -> Result<Block, ValidationError> {
    if to.is_empty() {
        return Err(ValidationError::EmptyBlockType);
    }
    if block.block_type == to {
        return Ok(block.clone());
    }

    let unsupported = || ValidationError::UnsupportedConversion {
        from: block.block_type.clone(),
        to: to.to_string(),
    };
    let target = text_type(to).ok_or_else(unsupported)?;
    let text = text_of(block).ok_or_else(unsupported)?;

    let content = match target.name {
        LIST => {
            let items: Vec<Value> = text
                .split('\n')
                .filter(|line| !line.trim().is_empty())
                .map(|line| Value::String(line.to_string()))
                .collect();
            json!({ "items": items })
        }
        HEADING => json!({ "text": text, "level": 2 }),
        CODE => json!({ "content": text }),
        BUTTON => {
            let url = block.content.get("url").cloned().unwrap_or(json!("#"));
            json!({ "text": text, "url": url })
        }
        _ => json!({ "text": text }),
    };

    Ok(Block {
        id: block.id.clone(),
        block_type: to.to_string(),
        content,
        attributes: filter_attributes(&block.attributes, target),
        inner_blocks: block.inner_blocks.clone(),
    })
}

fn filter_attributes(attributes: &Attributes, target: &TextType) -> Attributes {
    attributes
        .iter()
        .filter(|(key, _)| {
            GLOBAL_ATTRIBUTES.contains(&key.as_str()) || target.attributes.contains(&key.as_str())
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
