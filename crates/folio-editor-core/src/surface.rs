//! The surface: single mutation entry point for a document.

use crate::config::{EditorConfig, OverlapPolicy};
use crate::document::Document;
use crate::error::ModelError;
use crate::history::{History, HistoryEntry};
use crate::selection::Selection;
use crate::sync::{ChangeEvent, ChangeObserver, DocumentSynchronizer};
use crate::transaction::Transaction;

/// Owns a document, its selection and its undo history.
#[derive(Debug, Clone)]
pub struct Surface {
    document: Document,
    selection: Selection,
    history: History,
    overlap: OverlapPolicy,
}

impl Surface {
    pub fn new(document: Document, config: &EditorConfig) -> Self {
        Self {
            document,
            selection: Selection::default(),
            history: History::new(config.history_depth),
            overlap: config.overlapping_changes,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// Replace the selection, clamped to the document.
    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = selection.clamp(self.document.len());
    }

    /// Apply a transaction: splice the data, rebuild the affected subtrees
    /// (notifying `observer` after each), remap the selection and record the
    /// change for undo.
    pub fn change(
        &mut self,
        transaction: &Transaction,
        observer: &mut impl ChangeObserver,
    ) -> Result<Vec<ChangeEvent>, ModelError> {
        self.commit(transaction, None, observer)
    }

    /// Apply a transaction and then move the selection to `selection`.
    pub fn change_with_selection(
        &mut self,
        transaction: &Transaction,
        selection: Selection,
        observer: &mut impl ChangeObserver,
    ) -> Result<Vec<ChangeEvent>, ModelError> {
        self.commit(transaction, Some(selection), observer)
    }

    fn commit(
        &mut self,
        transaction: &Transaction,
        selection: Option<Selection>,
        observer: &mut impl ChangeObserver,
    ) -> Result<Vec<ChangeEvent>, ModelError> {
        let selection_before = self.selection;
        let (inverse, events) = self.apply(transaction, observer)?;
        let selection_after = selection.unwrap_or_else(|| selection_before.map_through(transaction));
        self.selection = selection_after.clamp(self.document.len());

        if !transaction.is_noop() {
            self.history.record(HistoryEntry {
                transaction: transaction.clone(),
                inverse,
                selection_before,
                selection_after: self.selection,
            });
        }
        Ok(events)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Revert the last change. Returns `false` if there was nothing to undo.
    pub fn undo(&mut self, observer: &mut impl ChangeObserver) -> Result<bool, ModelError> {
        let Some(entry) = self.history.pop_undo() else {
            return Ok(false);
        };
        self.apply(&entry.inverse, observer)?;
        self.selection = entry.selection_before.clamp(self.document.len());
        self.history.push_redo(entry);
        Ok(true)
    }

    /// Reapply the last undone change. Returns `false` if there was nothing
    /// to redo.
    pub fn redo(&mut self, observer: &mut impl ChangeObserver) -> Result<bool, ModelError> {
        let Some(entry) = self.history.pop_redo() else {
            return Ok(false);
        };
        self.apply(&entry.transaction, observer)?;
        self.selection = entry.selection_after.clamp(self.document.len());
        self.history.push_undo(entry);
        Ok(true)
    }

    pub fn clear_history(&mut self) {
        self.history.clear_history();
    }

    fn apply(
        &mut self,
        transaction: &Transaction,
        observer: &mut impl ChangeObserver,
    ) -> Result<(Transaction, Vec<ChangeEvent>), ModelError> {
        let mut sync = DocumentSynchronizer::new(self.overlap);
        let inverse = transaction.apply(&self.document, &mut sync)?;
        let events = sync.synchronize(&mut self.document, observer)?;
        Ok((inverse, events))
    }
}
