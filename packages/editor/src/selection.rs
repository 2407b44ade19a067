//! Selection tracking over top-level blocks.

use crate::document::Document;
use crate::errors::ValidationError;

/// Selected block ids, in the order they were selected
///
/// Every id refers to a top-level block of the current document; the edit
/// session prunes the selection after each mutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    ids: Vec<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or remove a block. Returns whether it is selected afterwards.
    pub fn toggle(&mut self, id: &str, doc: &Document) -> Result<bool, ValidationError> {
        if let Some(pos) = self.ids.iter().position(|s| s == id) {
            self.ids.remove(pos);
            return Ok(false);
        }
        if doc.index_of(id).is_none() {
            return Err(ValidationError::BlockNotFound(id.to_string()));
        }
        self.ids.push(id.to_string());
        Ok(true)
    }

    /// Replace the selection with the run `start_id..=end_id`
    pub fn select_range(
        &mut self,
        start_id: &str,
        end_id: &str,
        doc: &Document,
    ) -> Result<(), ValidationError> {
        let start = doc
            .index_of(start_id)
            .ok_or_else(|| ValidationError::BlockNotFound(start_id.to_string()))?;
        let end = doc
            .index_of(end_id)
            .ok_or_else(|| ValidationError::BlockNotFound(end_id.to_string()))?;
        let (lo, hi) = if start <= end { (start, end) } else { (end, start) };

        self.ids = doc.blocks()[lo..=hi].iter().map(|b| b.id.clone()).collect();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|s| s == id)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn sorted_positions(&self, doc: &Document) -> Vec<usize> {
        let mut positions: Vec<usize> = self.ids.iter().filter_map(|id| doc.index_of(id)).collect();
        positions.sort_unstable();
        positions
    }

    /// True for fewer than two ids, otherwise true iff the selected
    /// positions form an unbroken run
    pub fn is_contiguous(&self, doc: &Document) -> bool {
        if self.ids.len() < 2 {
            return true;
        }
        let positions = self.sorted_positions(doc);
        positions.len() == self.ids.len() && positions.windows(2).all(|w| w[1] == w[0] + 1)
    }

    /// First and last selected ids in document order, for range operations
    pub fn span(&self, doc: &Document) -> Result<(String, String), ValidationError> {
        if self.ids.is_empty() {
            return Err(ValidationError::EmptySelection);
        }
        if !self.is_contiguous(doc) {
            return Err(ValidationError::NonContiguousSelection);
        }
        let positions = self.sorted_positions(doc);
        match (positions.first(), positions.last()) {
            (Some(&first), Some(&last)) => Ok((
                doc.blocks()[first].id.clone(),
                doc.blocks()[last].id.clone(),
            )),
            _ => Err(ValidationError::EmptySelection),
        }
    }

    /// Drop ids that no longer name a top-level block. Returns how many went.
    pub fn prune_invalid(&mut self, doc: &Document) -> usize {
        let before = self.ids.len();
        self.ids.retain(|id| doc.index_of(id).is_some());
        before - self.ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Block;

    fn doc(n: usize) -> Document {
        Document::from_blocks(
            (0..n)
                .map(|i| Block::paragraph(format!("p{}", i)).with_id(format!("b{}", i)))
                .collect(),
        )
        .unwrap()
    }

    fn select(doc: &Document, indices: &[usize]) -> Selection {
        let mut selection = Selection::new();
        for i in indices {
            selection.toggle(&format!("b{}", i), doc).unwrap();
        }
        selection
    }

    #[test]
    fn test_toggle() {
        let doc = doc(3);
        let mut selection = Selection::new();

        assert!(selection.toggle("b1", &doc).unwrap());
        assert!(selection.contains("b1"));
        assert!(!selection.toggle("b1", &doc).unwrap());
        assert!(selection.is_empty());

        assert_eq!(
            selection.toggle("zz", &doc).unwrap_err(),
            ValidationError::BlockNotFound("zz".into())
        );
    }

    #[test]
    fn test_contiguity() {
        let doc = doc(6);
        assert!(select(&doc, &[]).is_contiguous(&doc));
        assert!(select(&doc, &[4]).is_contiguous(&doc));
        assert!(select(&doc, &[2, 3, 4]).is_contiguous(&doc));
        assert!(select(&doc, &[4, 2, 3]).is_contiguous(&doc), "selection order does not matter");
        assert!(!select(&doc, &[2, 4, 5]).is_contiguous(&doc));
    }

    #[test]
    fn test_span() {
        let doc = doc(6);
        assert_eq!(
            select(&doc, &[3, 1, 2]).span(&doc).unwrap(),
            ("b1".to_string(), "b3".to_string())
        );
        assert_eq!(
            select(&doc, &[1, 3]).span(&doc).unwrap_err(),
            ValidationError::NonContiguousSelection
        );
        assert_eq!(Selection::new().span(&doc).unwrap_err(), ValidationError::EmptySelection);
    }

    #[test]
    fn test_select_range_in_either_direction() {
        let doc = doc(5);
        let mut selection = Selection::new();
        selection.select_range("b3", "b1", &doc).unwrap();
        assert_eq!(selection.ids(), &["b1", "b2", "b3"]);
    }

    #[test]
    fn test_prune_invalid() {
        let full = doc(4);
        let mut selection = select(&full, &[0, 2, 3]);

        let smaller = full.delete("b2");
        assert_eq!(selection.prune_invalid(&smaller), 1);
        assert_eq!(selection.ids(), &["b0", "b3"]);
    }
}
