//! Linear data store: the document flattened into open tags, close tags and
//! annotated characters.
//!
//! The element sequence is the single source of truth for document content.
//! Offsets are always element offsets, never byte or char offsets into some
//! string: an open tag occupies one position, as does each character.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use smol_str::SmolStr;

use crate::error::ModelError;

/// Node attributes carried on an open tag.
pub type Attributes = BTreeMap<SmolStr, SmolStr>;

/// Annotation names applied to a character, e.g. `textStyle/bold`.
pub type Annotations = BTreeSet<SmolStr>;

/// One position in the linear store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    /// Start of a node.
    Open {
        node_type: SmolStr,
        attributes: Attributes,
    },
    /// End of the innermost open node; must carry the same type.
    Close { node_type: SmolStr },
    /// A single character with its annotations.
    Char { ch: char, annotations: Annotations },
}

impl Element {
    /// Open tag without attributes.
    pub fn open(node_type: impl Into<SmolStr>) -> Self {
        Element::Open {
            node_type: node_type.into(),
            attributes: Attributes::new(),
        }
    }

    /// Open tag with attributes.
    pub fn open_with<K, V>(
        node_type: impl Into<SmolStr>,
        attributes: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<SmolStr>,
        V: Into<SmolStr>,
    {
        Element::Open {
            node_type: node_type.into(),
            attributes: attributes
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn close(node_type: impl Into<SmolStr>) -> Self {
        Element::Close {
            node_type: node_type.into(),
        }
    }

    /// Unannotated character.
    pub fn char(ch: char) -> Self {
        Element::Char {
            ch,
            annotations: Annotations::new(),
        }
    }

    /// Character elements for every char of `text`.
    pub fn text(text: &str) -> Vec<Element> {
        text.chars().map(Element::char).collect()
    }

    /// Character elements sharing one annotation set.
    pub fn annotated_text(text: &str, annotations: &Annotations) -> Vec<Element> {
        text.chars()
            .map(|ch| Element::Char {
                ch,
                annotations: annotations.clone(),
            })
            .collect()
    }

    /// Open tag, the given content, close tag.
    pub fn wrap(node_type: &str, content: Vec<Element>) -> Vec<Element> {
        let mut out = Vec::with_capacity(content.len() + 2);
        out.push(Element::open(node_type));
        out.extend(content);
        out.push(Element::close(node_type));
        out
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Element::Open { .. })
    }

    pub fn is_close(&self) -> bool {
        matches!(self, Element::Close { .. })
    }

    pub fn is_char(&self) -> bool {
        matches!(self, Element::Char { .. })
    }

    /// Node type of a tag element, `None` for characters.
    pub fn node_type(&self) -> Option<&SmolStr> {
        match self {
            Element::Open { node_type, .. } | Element::Close { node_type } => Some(node_type),
            Element::Char { .. } => None,
        }
    }

    pub fn as_char(&self) -> Option<char> {
        match self {
            Element::Char { ch, .. } => Some(*ch),
            _ => None,
        }
    }

    pub fn annotations(&self) -> Option<&Annotations> {
        match self {
            Element::Char { annotations, .. } => Some(annotations),
            _ => None,
        }
    }
}

/// The authoritative element sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinearData {
    elements: Vec<Element>,
}

impl LinearData {
    pub fn new(elements: Vec<Element>) -> Self {
        Self { elements }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, offset: usize) -> Option<&Element> {
        self.elements.get(offset)
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    fn check_range(&self, range: &Range<usize>) -> Result<(), ModelError> {
        if range.start > range.end || range.end > self.elements.len() {
            return Err(ModelError::range(range.start, range.end, self.elements.len()));
        }
        Ok(())
    }

    /// Elements in `[start, end)`.
    pub fn get_data(&self, range: Range<usize>) -> Result<&[Element], ModelError> {
        self.check_range(&range)?;
        Ok(&self.elements[range])
    }

    /// Replace `remove` elements at `offset` with `insert`, returning what was
    /// removed.
    pub fn splice(
        &mut self,
        offset: usize,
        remove: usize,
        insert: Vec<Element>,
    ) -> Result<Vec<Element>, ModelError> {
        let end = offset
            .checked_add(remove)
            .ok_or_else(|| ModelError::range(offset, usize::MAX, self.elements.len()))?;
        self.check_range(&(offset..end))?;

        tracing::trace!(
            target: "folio::linear",
            offset,
            remove,
            insert = insert.len(),
            "splice"
        );

        Ok(self.elements.splice(offset..end, insert).collect())
    }

    /// Characters in `range` as a string; tags are skipped.
    pub fn text(&self, range: Range<usize>) -> Result<String, ModelError> {
        Ok(self
            .get_data(range)?
            .iter()
            .filter_map(Element::as_char)
            .collect())
    }

    /// Whether `range` holds whole nodes only: nesting depth never drops
    /// below zero and returns to zero at the end.
    pub fn is_balanced(&self, range: Range<usize>) -> Result<bool, ModelError> {
        Ok(depth_balanced(self.get_data(range)?))
    }
}

pub(crate) fn depth_balanced(elements: &[Element]) -> bool {
    let mut depth = 0usize;
    for element in elements {
        match element {
            Element::Open { .. } => depth += 1,
            Element::Close { .. } => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
            }
            Element::Char { .. } => {}
        }
    }
    depth == 0
}

impl From<Vec<Element>> for LinearData {
    fn from(elements: Vec<Element>) -> Self {
        Self::new(elements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(text: &str) -> Vec<Element> {
        Element::wrap("paragraph", Element::text(text))
    }

    #[test]
    fn test_get_data() {
        let data = LinearData::new(paragraph("abc"));
        assert_eq!(data.len(), 5);
        assert_eq!(data.get_data(1..4).unwrap(), &Element::text("abc")[..]);
        assert!(data.get_data(5..5).unwrap().is_empty());
    }

    #[test]
    fn test_get_data_rejects_bad_ranges() {
        let data = LinearData::new(paragraph("abc"));
        #[allow(clippy::reversed_empty_ranges)]
        let reversed = data.get_data(3..1);
        assert_eq!(
            reversed.unwrap_err(),
            ModelError::Range {
                start: 3,
                end: 1,
                len: 5
            }
        );
        assert!(matches!(
            data.get_data(2..9),
            Err(ModelError::Range { .. })
        ));
    }

    #[test]
    fn test_splice_returns_removed() {
        let mut data = LinearData::new(paragraph("abc"));
        let removed = data.splice(2, 1, Element::text("xyz")).unwrap();
        assert_eq!(removed, Element::text("b"));
        assert_eq!(data.text(0..data.len()).unwrap(), "axyzc");
        assert_eq!(data.len(), 7);
    }

    #[test]
    fn test_splice_out_of_bounds() {
        let mut data = LinearData::new(paragraph("abc"));
        assert!(data.splice(4, 2, vec![]).is_err());
        assert!(data.splice(6, 0, vec![]).is_err());
        // Nothing changed.
        assert_eq!(data.len(), 5);
        // Appending at the very end is fine.
        data.splice(5, 0, paragraph("d")).unwrap();
        assert_eq!(data.len(), 8);
    }

    #[test]
    fn test_is_balanced() {
        let mut elements = paragraph("ab");
        elements.extend(paragraph("cd"));
        let data = LinearData::new(elements);
        assert!(data.is_balanced(0..8).unwrap());
        assert!(data.is_balanced(1..3).unwrap());
        // "b</p><p>c" closes before it opens.
        assert!(!data.is_balanced(2..6).unwrap());
        // "<p>ab" never closes.
        assert!(!data.is_balanced(0..3).unwrap());
    }
}
