use std::ops::Range;

use crate::transaction::{Affinity, Transaction};

/// Selection in linear offsets.
///
/// The anchor is where the selection started, the focus is where the caret
/// is now. They may be in any order; use `start()` and `end()` for ordered
/// bounds.
#[derive(Clone, Debug, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    /// Where selection started
    pub anchor: usize,
    /// Where the caret is now
    pub focus: usize,
}

impl Selection {
    pub fn new(anchor: usize, focus: usize) -> Self {
        Self { anchor, focus }
    }

    /// Collapsed selection (caret only).
    pub fn caret(offset: usize) -> Self {
        Self {
            anchor: offset,
            focus: offset,
        }
    }

    pub fn start(&self) -> usize {
        self.anchor.min(self.focus)
    }

    pub fn end(&self) -> usize {
        self.anchor.max(self.focus)
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    pub fn len(&self) -> usize {
        self.end() - self.start()
    }

    /// Same as `is_collapsed`.
    pub fn is_empty(&self) -> bool {
        self.is_collapsed()
    }

    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start() && offset < self.end()
    }

    /// Ordered range.
    pub fn to_range(&self) -> Range<usize> {
        self.start()..self.end()
    }

    /// Focus before anchor.
    pub fn is_backwards(&self) -> bool {
        self.focus < self.anchor
    }

    /// Translate both ends through a transaction.
    pub fn map_through(&self, transaction: &Transaction) -> Self {
        Self {
            anchor: transaction.map_offset(self.anchor, Affinity::Before),
            focus: transaction.map_offset(self.focus, Affinity::Before),
        }
    }

    /// Clamp both ends to `len`.
    pub fn clamp(&self, len: usize) -> Self {
        Self {
            anchor: self.anchor.min(len),
            focus: self.focus.min(len),
        }
    }
}

impl From<Range<usize>> for Selection {
    fn from(range: Range<usize>) -> Self {
        Self::new(range.start, range.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear::Element;

    #[test]
    fn test_selection_forward() {
        let sel = Selection::new(5, 10);
        assert_eq!(sel.start(), 5);
        assert_eq!(sel.end(), 10);
        assert!(!sel.is_backwards());
        assert_eq!(sel.len(), 5);
    }

    #[test]
    fn test_selection_backward() {
        let sel = Selection::new(10, 5);
        assert_eq!(sel.to_range(), 5..10);
        assert!(sel.is_backwards());
        assert!(sel.contains(5));
        assert!(!sel.contains(10));
    }

    #[test]
    fn test_caret() {
        let sel = Selection::caret(7);
        assert!(sel.is_collapsed());
        assert!(sel.is_empty());
        assert_eq!(sel.len(), 0);
    }

    #[test]
    fn test_caret_inside_removed_range() {
        let tx = Transaction::builder().retain(6).remove(4).build();
        assert_eq!(
            Selection::caret(10).map_through(&tx),
            Selection::caret(6)
        );
    }

    #[test]
    fn test_range_around_insertion() {
        let tx = Transaction::builder()
            .retain(3)
            .insert(Element::text("xy"))
            .build();
        // Anchor at the insertion point stays put, focus after it shifts.
        assert_eq!(Selection::new(3, 5).map_through(&tx), Selection::new(3, 7));
        assert_eq!(Selection::new(9, 2).clamp(4), Selection::new(4, 2));
    }
}
