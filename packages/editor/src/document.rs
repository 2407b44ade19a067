//! # Document Store
//!
//! Ordered block sequence with structural operations.
//!
//! Every operation takes `&self` and returns a new [`Document`]; the
//! receiver is never modified. That is what lets history entries hold plain
//! snapshots.
//!
//! ## Identity
//!
//! Ids are unique across the whole tree, nested blocks included. Blocks
//! arriving without an id get one from the session's [`IdGenerator`];
//! blocks arriving with an id that is in the document, or that the
//! generator has already issued or seen, are rejected. Deserialized
//! documents go through the same uniqueness check as [`Document::from_blocks`].

use crate::block::{Attributes, Block, IdGenerator};
use crate::conversions;
use crate::errors::ValidationError;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashSet;

/// Where to insert a block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Position {
    /// Absolute index, clamped to the document length
    Index(usize),
    Before(String),
    After(String),
    End,
}

/// Editable block document
///
/// Serialized as a plain block array.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "Vec<Block>")]
pub struct Document {
    blocks: Vec<Block>,
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.blocks.serialize(serializer)
    }
}

impl TryFrom<Vec<Block>> for Document {
    type Error = ValidationError;

    fn try_from(blocks: Vec<Block>) -> Result<Self, Self::Error> {
        Self::from_blocks(blocks)
    }
}

/// First id in the tree that is empty or repeated
fn first_duplicate(blocks: &[Block]) -> Option<String> {
    let mut seen = HashSet::new();
    let mut duplicate = None;
    for block in blocks {
        block.walk(&mut |b| {
            if duplicate.is_none() && (!b.has_id() || !seen.insert(b.id.as_str())) {
                duplicate = Some(b.id.clone());
            }
        });
        if duplicate.is_some() {
            break;
        }
    }
    duplicate
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from existing blocks, checking id uniqueness
    pub fn from_blocks(blocks: Vec<Block>) -> Result<Self, ValidationError> {
        match first_duplicate(&blocks) {
            Some(id) => Err(ValidationError::DuplicateId(id)),
            None => Ok(Self { blocks }),
        }
    }

    /// Wrap blocks whose ids were just assigned. A repeat here is a
    /// generator defect, not bad input.
    fn assigned(blocks: Vec<Block>) -> Self {
        let duplicate = first_duplicate(&blocks);
        debug_assert!(
            duplicate.is_none(),
            "id assignment produced duplicate id {:?}",
            duplicate
        );
        Self { blocks }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Top-level block by id
    pub fn get(&self, id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    /// Top-level index of a block
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.blocks.iter().position(|b| b.id == id)
    }

    /// Whether any block in the tree carries this id
    pub fn contains(&self, id: &str) -> bool {
        self.ids().contains(id)
    }

    /// Every id in the tree
    pub fn ids(&self) -> HashSet<String> {
        let mut ids = HashSet::new();
        for block in &self.blocks {
            block.walk(&mut |b| {
                ids.insert(b.id.clone());
            });
        }
        ids
    }

    /// Top-level ids in document order
    pub fn top_level_ids(&self) -> Vec<&str> {
        self.blocks.iter().map(|b| b.id.as_str()).collect()
    }

    /// True when at least one block has non-blank content
    pub fn has_visible_content(&self) -> bool {
        self.blocks.iter().any(Block::has_visible_content)
    }

    fn require_index(&self, id: &str) -> Result<usize, ValidationError> {
        self.index_of(id)
            .ok_or_else(|| ValidationError::BlockNotFound(id.to_string()))
    }

    fn resolve(&self, position: &Position) -> Result<usize, ValidationError> {
        match position {
            Position::Index(index) => Ok((*index).min(self.blocks.len())),
            Position::Before(anchor) => self.require_index(anchor),
            Position::After(anchor) => self.require_index(anchor).map(|i| i + 1),
            Position::End => Ok(self.blocks.len()),
        }
    }

    /// Give `incoming` blocks ids, rejecting supplied ids already in `taken`,
    /// already used by the generator, or repeated among the incoming blocks
    ///
    /// Accepted supplied ids are recorded with the generator so they are
    /// never accepted again.
    fn admit(
        incoming: Vec<Block>,
        taken: &mut HashSet<String>,
        ids: &mut IdGenerator,
    ) -> Result<Vec<Block>, ValidationError> {
        let mut admitted = Vec::with_capacity(incoming.len());
        let mut accepted = Vec::new();
        for mut block in incoming {
            if block.block_type.is_empty() {
                return Err(ValidationError::EmptyBlockType);
            }

            let mut supplied = Vec::new();
            block.walk(&mut |b| {
                if b.has_id() {
                    supplied.push(b.id.clone());
                }
            });
            for id in supplied {
                if ids.is_used(&id) || !taken.insert(id.clone()) {
                    return Err(ValidationError::DuplicateId(id));
                }
                accepted.push(id);
            }

            block.assign_missing_ids(ids, taken);
            block.walk(&mut |b| {
                taken.insert(b.id.clone());
            });
            admitted.push(block);
        }
        ids.observe(accepted.iter().map(String::as_str));
        Ok(admitted)
    }

    /// Insert a block. A block without an id gets a fresh one.
    pub fn insert(
        &self,
        block: Block,
        position: &Position,
        ids: &mut IdGenerator,
    ) -> Result<Document, ValidationError> {
        let index = self.resolve(position)?;
        let mut taken = self.ids();
        let mut admitted = Self::admit(vec![block], &mut taken, ids)?;

        let mut blocks = self.blocks.clone();
        blocks.insert(index, admitted.remove(0));
        Ok(Document::assigned(blocks))
    }

    /// Replace content wholesale (when given) and shallow-merge attributes
    ///
    /// A `null` value in the delta removes that attribute.
    pub fn update(
        &self,
        id: &str,
        content: Option<Value>,
        attributes_delta: &Attributes,
    ) -> Result<Document, ValidationError> {
        let index = self.require_index(id)?;
        let mut blocks = self.blocks.clone();
        let block = &mut blocks[index];

        if let Some(content) = content {
            block.content = content;
        }
        for (key, value) in attributes_delta {
            if value.is_null() {
                block.attributes.remove(key);
            } else {
                block.attributes.insert(key.clone(), value.clone());
            }
        }

        Ok(Document { blocks })
    }

    /// Remove a block. Absent ids are a no-op.
    pub fn delete(&self, id: &str) -> Document {
        Document {
            blocks: self
                .blocks
                .iter()
                .filter(|b| b.id != id)
                .cloned()
                .collect(),
        }
    }

    /// Relocate one block; the others keep their relative order
    pub fn move_block(&self, id: &str, new_index: usize) -> Result<Document, ValidationError> {
        let from = self.require_index(id)?;
        let mut blocks = self.blocks.clone();
        let block = blocks.remove(from);
        let to = new_index.min(blocks.len());
        blocks.insert(to, block);
        Ok(Document { blocks })
    }

    /// Deep-copy a block (nested blocks included) right after the source
    pub fn duplicate(&self, id: &str, ids: &mut IdGenerator) -> Result<Document, ValidationError> {
        let index = self.require_index(id)?;
        let copy = self.blocks[index].reidentified(ids, &self.ids());

        let mut blocks = self.blocks.clone();
        blocks.insert(index + 1, copy);
        Ok(Document::assigned(blocks))
    }

    /// Replace the contiguous run `start_id..=end_id` with `new_blocks`
    pub fn replace_range(
        &self,
        start_id: &str,
        end_id: &str,
        new_blocks: Vec<Block>,
        ids: &mut IdGenerator,
    ) -> Result<Document, ValidationError> {
        let start = self.require_index(start_id)?;
        let end = self.require_index(end_id)?;
        if start > end {
            return Err(ValidationError::InvalidRange {
                start: start_id.to_string(),
                end: end_id.to_string(),
            });
        }

        // Ids of the outgoing run are not available to the replacement
        let mut taken = self.ids();
        let admitted = Self::admit(new_blocks, &mut taken, ids)?;

        let mut blocks = self.blocks.clone();
        blocks.splice(start..=end, admitted);
        Ok(Document::assigned(blocks))
    }

    /// Convert a block to another type using the conversion table
    pub fn type_change(&self, id: &str, new_type: &str) -> Result<Document, ValidationError> {
        let index = self.require_index(id)?;
        let converted = conversions::convert(&self.blocks[index], new_type)?;

        let mut blocks = self.blocks.clone();
        blocks[index] = converted;
        Ok(Document { blocks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc_with(n: usize, ids: &mut IdGenerator) -> Document {
        let mut doc = Document::new();
        for i in 0..n {
            doc = doc
                .insert(Block::paragraph(format!("p{}", i)), &Position::End, ids)
                .unwrap();
        }
        doc
    }

    fn texts(doc: &Document) -> Vec<String> {
        doc.blocks()
            .iter()
            .map(|b| b.content["text"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_insert_assigns_fresh_id() {
        let mut ids = IdGenerator::from_seed("t");
        let doc = Document::new();

        let next = doc
            .insert(Block::paragraph("hello"), &Position::Index(0), &mut ids)
            .unwrap();

        assert!(doc.is_empty(), "original document is untouched");
        assert_eq!(next.len(), 1);
        assert_eq!(next.blocks()[0].id, "t-1");
    }

    #[test]
    fn test_insert_anchor_positions() {
        let mut ids = IdGenerator::from_seed("t");
        let doc = doc_with(2, &mut ids);
        let anchor = doc.blocks()[1].id.clone();

        let before = doc
            .insert(Block::paragraph("x"), &Position::Before(anchor.clone()), &mut ids)
            .unwrap();
        assert_eq!(texts(&before), vec!["p0", "x", "p1"]);

        let after = doc
            .insert(Block::paragraph("y"), &Position::After(anchor), &mut ids)
            .unwrap();
        assert_eq!(texts(&after), vec!["p0", "p1", "y"]);

        let clamped = doc
            .insert(Block::paragraph("z"), &Position::Index(99), &mut ids)
            .unwrap();
        assert_eq!(texts(&clamped), vec!["p0", "p1", "z"]);
    }

    #[test]
    fn test_insert_rejects_missing_anchor_and_duplicate_id() {
        let mut ids = IdGenerator::from_seed("t");
        let doc = doc_with(1, &mut ids);

        let err = doc
            .insert(Block::paragraph("x"), &Position::After("nope".into()), &mut ids)
            .unwrap_err();
        assert_eq!(err, ValidationError::BlockNotFound("nope".into()));

        let existing = doc.blocks()[0].id.clone();
        let err = doc
            .insert(Block::paragraph("x").with_id(existing.clone()), &Position::End, &mut ids)
            .unwrap_err();
        assert_eq!(err, ValidationError::DuplicateId(existing));
    }

    #[test]
    fn test_update_merges_attributes() {
        let mut ids = IdGenerator::from_seed("t");
        let doc = Document::new()
            .insert(
                Block::paragraph("a")
                    .with_attribute("align", json!("left"))
                    .with_attribute("dropCap", json!(true)),
                &Position::End,
                &mut ids,
            )
            .unwrap();
        let id = doc.blocks()[0].id.clone();

        let mut delta = Attributes::new();
        delta.insert("align".into(), json!("right"));
        delta.insert("dropCap".into(), Value::Null);
        delta.insert("className".into(), json!("lead"));

        let updated = doc.update(&id, None, &delta).unwrap();
        let block = updated.get(&id).unwrap();
        assert_eq!(block.content["text"], "a");
        assert_eq!(block.attributes["align"], "right");
        assert_eq!(block.attributes["className"], "lead");
        assert!(block.attributes.get("dropCap").is_none());

        let replaced = doc
            .update(&id, Some(json!({ "text": "b" })), &Attributes::new())
            .unwrap();
        assert_eq!(replaced.get(&id).unwrap().content, json!({ "text": "b" }));
        assert_eq!(replaced.get(&id).unwrap().attributes["align"], "left");
    }

    #[test]
    fn test_delete_is_idempotent() {
        let mut ids = IdGenerator::from_seed("t");
        let doc = doc_with(2, &mut ids);
        let id = doc.blocks()[0].id.clone();

        let once = doc.delete(&id);
        let twice = once.delete(&id);
        assert_eq!(once.len(), 1);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_move_preserves_relative_order() {
        let mut ids = IdGenerator::from_seed("t");
        let doc = doc_with(4, &mut ids);
        let id = doc.blocks()[0].id.clone();

        let moved = doc.move_block(&id, 2).unwrap();
        assert_eq!(texts(&moved), vec!["p1", "p2", "p0", "p3"]);

        let to_end = doc.move_block(&id, 100).unwrap();
        assert_eq!(texts(&to_end), vec!["p1", "p2", "p3", "p0"]);
    }

    #[test]
    fn test_duplicate_inserts_after_source() {
        let mut ids = IdGenerator::from_seed("t");
        let doc = doc_with(2, &mut ids);
        let id = doc.blocks()[0].id.clone();

        let dup = doc.duplicate(&id, &mut ids).unwrap();
        assert_eq!(texts(&dup), vec!["p0", "p0", "p1"]);
        assert_ne!(dup.blocks()[1].id, id);
        assert_eq!(dup.blocks()[1].content, dup.blocks()[0].content);
    }

    #[test]
    fn test_replace_range() {
        let mut ids = IdGenerator::from_seed("t");
        let doc = doc_with(5, &mut ids);
        let start = doc.blocks()[1].id.clone();
        let end = doc.blocks()[3].id.clone();

        let replaced = doc
            .replace_range(&start, &end, vec![Block::paragraph("new")], &mut ids)
            .unwrap();
        assert_eq!(texts(&replaced), vec!["p0", "new", "p4"]);

        let err = doc
            .replace_range(&end, &start, vec![], &mut ids)
            .unwrap_err();
        assert_eq!(err, ValidationError::InvalidRange { start: end.clone(), end: start.clone() });

        let err = doc
            .replace_range("missing", &end, vec![], &mut ids)
            .unwrap_err();
        assert_eq!(err, ValidationError::BlockNotFound("missing".into()));
    }

    #[test]
    fn test_replace_range_rejects_reused_ids() {
        let mut ids = IdGenerator::from_seed("t");
        let doc = doc_with(2, &mut ids);
        let first = doc.blocks()[0].id.clone();

        let err = doc
            .replace_range(&first, &first, vec![Block::paragraph("x").with_id(first.clone())], &mut ids)
            .unwrap_err();
        assert_eq!(err, ValidationError::DuplicateId(first));
    }

    #[test]
    fn test_type_change() {
        let mut ids = IdGenerator::from_seed("t");
        let doc = doc_with(1, &mut ids);
        let id = doc.blocks()[0].id.clone();

        let changed = doc.type_change(&id, "core/heading").unwrap();
        let block = changed.get(&id).unwrap();
        assert_eq!(block.block_type, "core/heading");
        assert_eq!(block.content["text"], "p0");
    }

    #[test]
    fn test_from_blocks_rejects_duplicates() {
        let blocks = vec![Block::paragraph("a").with_id("x"), Block::paragraph("b").with_id("x")];
        assert_eq!(
            Document::from_blocks(blocks).unwrap_err(),
            ValidationError::DuplicateId("x".into())
        );
    }

    #[test]
    fn test_serializes_as_block_array() {
        let doc = Document::from_blocks(vec![Block::paragraph("a").with_id("x")]).unwrap();
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.is_array());
        let back: Document = serde_json::from_value(json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_deserialize_rejects_duplicate_and_empty_ids() {
        let duplicated = json!([
            { "id": "x", "type": "core/paragraph", "content": {}, "attributes": {} },
            { "id": "x", "type": "core/paragraph", "content": {}, "attributes": {} }
        ]);
        assert!(serde_json::from_value::<Document>(duplicated).is_err());

        let nested_empty = json!([
            { "id": "x", "type": "core/group", "content": {}, "innerBlocks": [
                { "type": "core/paragraph", "content": {} }
            ] }
        ]);
        assert!(serde_json::from_value::<Document>(nested_empty).is_err());
    }

    #[test]
    fn test_supplied_id_is_not_accepted_twice() {
        let mut ids = IdGenerator::from_seed("t");
        let doc = Document::new()
            .insert(Block::paragraph("first").with_id("a"), &Position::End, &mut ids)
            .unwrap()
            .delete("a");

        let err = doc
            .insert(Block::heading("second", 2).with_id("a"), &Position::End, &mut ids)
            .unwrap_err();
        assert_eq!(err, ValidationError::DuplicateId("a".into()));

        // Generated ids are off limits as well
        let generated = doc
            .insert(Block::paragraph("g"), &Position::End, &mut ids)
            .unwrap()
            .blocks()[0]
            .id
            .clone();
        let err = doc
            .insert(Block::paragraph("h").with_id(generated.clone()), &Position::End, &mut ids)
            .unwrap_err();
        assert_eq!(err, ValidationError::DuplicateId(generated));
    }

    #[test]
    fn test_failed_insert_does_not_burn_supplied_ids() {
        let mut ids = IdGenerator::from_seed("t");
        let doc = doc_with(1, &mut ids);
        let only = doc.blocks()[0].id.clone();

        let batch = vec![Block::paragraph("a").with_id("a"), Block::paragraph("b").with_id("a")];
        assert_eq!(
            doc.replace_range(&only, &only, batch, &mut ids).unwrap_err(),
            ValidationError::DuplicateId("a".into())
        );
        assert!(!ids.is_used("a"));
        assert!(doc
            .replace_range(&only, &only, vec![Block::paragraph("a").with_id("a")], &mut ids)
            .is_ok());
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "duplicate id")]
    fn test_assigned_asserts_on_repeated_ids() {
        Document::assigned(vec![
            Block::paragraph("a").with_id("dup"),
            Block::paragraph("b").with_id("dup"),
        ]);
    }
}
