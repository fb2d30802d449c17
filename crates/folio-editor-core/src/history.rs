//! Undo/redo stacks for a surface.
//!
//! Entries hold a transaction together with its inverse, so undo and redo
//! are just applications of one or the other. The stacks do not touch the
//! document themselves; [`Surface`](crate::surface::Surface) does.

use crate::selection::Selection;
use crate::transaction::Transaction;

/// A recorded change.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub transaction: Transaction,
    pub inverse: Transaction,
    /// Selection to restore on undo.
    pub selection_before: Selection,
    /// Selection to restore on redo.
    pub selection_after: Selection,
}

/// Bounded undo stack plus redo stack.
#[derive(Debug, Clone)]
pub struct History {
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    max_steps: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(crate::config::EditorConfig::DEFAULT_HISTORY_DEPTH)
    }
}

impl History {
    pub fn new(max_steps: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_steps,
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    /// Record a new change. Clears the redo stack and evicts the oldest
    /// entries past `max_steps`.
    pub fn record(&mut self, entry: HistoryEntry) {
        self.redo_stack.clear();
        self.undo_stack.push(entry);
        if self.undo_stack.len() > self.max_steps {
            let excess = self.undo_stack.len() - self.max_steps;
            self.undo_stack.drain(..excess);
        }
    }

    /// Entry to undo next. The caller hands it back through
    /// [`History::push_redo`] once applied.
    pub fn pop_undo(&mut self) -> Option<HistoryEntry> {
        self.undo_stack.pop()
    }

    pub fn push_redo(&mut self, entry: HistoryEntry) {
        self.redo_stack.push(entry);
    }

    pub fn pop_redo(&mut self) -> Option<HistoryEntry> {
        self.redo_stack.pop()
    }

    /// Put a redone entry back without clearing the redo stack.
    pub fn push_undo(&mut self, entry: HistoryEntry) {
        self.undo_stack.push(entry);
    }

    pub fn clear_history(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: usize) -> HistoryEntry {
        HistoryEntry {
            transaction: Transaction::builder().retain(n).build(),
            inverse: Transaction::builder().retain(n).build(),
            selection_before: Selection::caret(n),
            selection_after: Selection::caret(n + 1),
        }
    }

    #[test]
    fn test_new_record_clears_redo() {
        let mut history = History::new(100);
        history.record(entry(1));
        let undone = history.pop_undo().unwrap();
        history.push_redo(undone);
        assert!(history.can_redo());

        // New edit should clear redo
        history.record(entry(2));
        assert!(!history.can_redo());
    }

    #[test]
    fn test_max_steps() {
        let mut history = History::new(3);
        for n in 0..4 {
            history.record(entry(n));
        }
        assert_eq!(history.undo_len(), 3);
        // Oldest entry was evicted.
        assert_eq!(history.pop_undo().unwrap().selection_before, Selection::caret(3));
        assert_eq!(history.pop_undo().unwrap().selection_before, Selection::caret(2));
        assert_eq!(history.pop_undo().unwrap().selection_before, Selection::caret(1));
        assert!(history.pop_undo().is_none());
    }

    #[test]
    fn test_clear_history() {
        let mut history = History::default();
        history.record(entry(0));
        history.push_redo(entry(1));
        history.clear_history();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }
}
