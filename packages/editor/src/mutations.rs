//! # Document Mutations
//!
//! The structural commands an editing surface can issue, as data.
//!
//! ## Design Principles
//!
//! 1. **One mutation, one store operation**: a mutation maps to exactly one
//!    Document Store call, so it commits exactly one history entry
//! 2. **Validated**: preconditions are checked against the current document
//!    before anything is applied
//! 3. **Serializable**: mutations can be logged, replayed or sent over a wire
//!
//! ## Mutation Semantics
//!
//! ### Delete
//! - Absent ids are a no-op, not an error
//!
//! ### ReplaceRange
//! - Atomic: the whole run is replaced or nothing is
//! - Fails if either end is missing or the start follows the end
//!
//! ### TypeChange
//! - Follows the conversion table; unsupported pairs fail validation

use crate::block::{Attributes, Block, IdGenerator};
use crate::conversions;
use crate::document::{Document, Position};
use crate::errors::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Mutation {
    /// Insert a block; it gets a fresh id if it has none
    Insert { block: Block, position: Position },

    /// Replace content (when given) and shallow-merge attributes
    #[serde(rename_all = "camelCase")]
    Update {
        id: String,
        content: Option<Value>,
        #[serde(default)]
        attributes: Attributes,
    },

    /// Remove a block
    Delete { id: String },

    /// Relocate a block to a new index
    #[serde(rename_all = "camelCase")]
    Move { id: String, new_index: usize },

    /// Deep-copy a block right after itself
    Duplicate { id: String },

    /// Replace the run `start_id..=end_id`
    #[serde(rename_all = "camelCase")]
    ReplaceRange {
        start_id: String,
        end_id: String,
        blocks: Vec<Block>,
    },

    /// Convert a block to another type
    #[serde(rename_all = "camelCase")]
    TypeChange { id: String, new_type: String },
}

impl Mutation {
    /// Short name, used as the history entry label
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::Insert { .. } => "insert",
            Mutation::Update { .. } => "update",
            Mutation::Delete { .. } => "delete",
            Mutation::Move { .. } => "move",
            Mutation::Duplicate { .. } => "duplicate",
            Mutation::ReplaceRange { .. } => "replaceRange",
            Mutation::TypeChange { .. } => "typeChange",
        }
    }

    /// Validate without applying
    pub fn validate(&self, doc: &Document) -> Result<(), ValidationError> {
        let require = |id: &str| {
            doc.index_of(id)
                .map(|_| ())
                .ok_or_else(|| ValidationError::BlockNotFound(id.to_string()))
        };

        match self {
            Mutation::Insert { block, position } => {
                if block.block_type.is_empty() {
                    return Err(ValidationError::EmptyBlockType);
                }
                match position {
                    Position::Before(anchor) | Position::After(anchor) => require(anchor),
                    Position::Index(_) | Position::End => Ok(()),
                }
            }

            Mutation::Update { id, .. } | Mutation::Move { id, .. } | Mutation::Duplicate { id } => {
                require(id)
            }

            Mutation::Delete { .. } => Ok(()),

            Mutation::ReplaceRange { start_id, end_id, .. } => {
                require(start_id)?;
                require(end_id)?;
                if doc.index_of(start_id) > doc.index_of(end_id) {
                    return Err(ValidationError::InvalidRange {
                        start: start_id.clone(),
                        end: end_id.clone(),
                    });
                }
                Ok(())
            }

            Mutation::TypeChange { id, new_type } => {
                let block = doc
                    .get(id)
                    .ok_or_else(|| ValidationError::BlockNotFound(id.clone()))?;
                if new_type.is_empty() {
                    return Err(ValidationError::EmptyBlockType);
                }
                if !conversions::can_convert(&block.block_type, new_type) {
                    return Err(ValidationError::UnsupportedConversion {
                        from: block.block_type.clone(),
                        to: new_type.clone(),
                    });
                }
                Ok(())
            }
        }
    }

    /// Validate, then apply to produce the next document
    pub fn apply(&self, doc: &Document, ids: &mut IdGenerator) -> Result<Document, ValidationError> {
        self.validate(doc)?;

        match self {
            Mutation::Insert { block, position } => doc.insert(block.clone(), position, ids),
            Mutation::Update { id, content, attributes } => {
                doc.update(id, content.clone(), attributes)
            }
            Mutation::Delete { id } => Ok(doc.delete(id)),
            Mutation::Move { id, new_index } => doc.move_block(id, *new_index),
            Mutation::Duplicate { id } => doc.duplicate(id, ids),
            Mutation::ReplaceRange { start_id, end_id, blocks } => {
                doc.replace_range(start_id, end_id, blocks.clone(), ids)
            }
            Mutation::TypeChange { id, new_type } => doc.type_change(id, new_type),
        }
    }
}
