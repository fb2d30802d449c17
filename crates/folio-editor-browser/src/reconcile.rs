//! Turning observed user input into model transactions.
//!
//! Everything here is a pure function of the document, the selection and the
//! input, so it runs without a DOM.

use std::ops::Range;

use folio_editor_core::{
    AnnotationMethod, Annotations, Document, Element, NodeId, Selection, Transaction,
};

use crate::error::ReconcileError;
use crate::input::{DeleteUnit, Direction, Format, InputType};

/// User input as seen by the editor, before it touches the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedInput {
    InsertText(String),
    /// Backspace: the selection, else the character or node before the caret.
    DeleteBackward,
    DeleteForward,
    /// The selection, else back or forward to a word boundary.
    DeleteWord(Direction),
    /// The selection, else back or forward to the edge of the block.
    DeleteLine(Direction),
    /// Enter: split the block at the caret.
    InsertParagraph,
    Paste(String),
    /// Toggle a character format over the selection.
    Format(Format),
    /// Text committed by an IME composition.
    CompositionEnd(String),
    /// The browser changed a text leaf's DOM directly; `observed` is its new
    /// text.
    TextMutation { leaf: NodeId, observed: String },
}

impl ObservedInput {
    /// Map a `beforeinput` event. `None` when the input has no model
    /// equivalent.
    pub fn from_before_input(input_type: &InputType, data: Option<String>) -> Option<Self> {
        match input_type {
            InputType::InsertText => data.map(ObservedInput::InsertText),
            InputType::InsertTransfer => data.map(ObservedInput::Paste),
            InputType::InsertBreak => Some(ObservedInput::InsertParagraph),
            InputType::Delete { unit, direction } => Some(match (unit, direction) {
                (DeleteUnit::Word, direction) => ObservedInput::DeleteWord(*direction),
                (DeleteUnit::Line, direction) => ObservedInput::DeleteLine(*direction),
                (DeleteUnit::Character, Direction::Forward) => ObservedInput::DeleteForward,
                (DeleteUnit::Character, Direction::Backward) | (DeleteUnit::Selection, _) => {
                    ObservedInput::DeleteBackward
                }
            }),
            InputType::Format(format) => Some(ObservedInput::Format(*format)),
            InputType::Composition
            | InputType::Undo
            | InputType::Redo
            | InputType::Unsupported(_) => None,
        }
    }
}

/// A transaction for the input plus where the selection goes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub transaction: Transaction,
    pub selection: Selection,
}

/// Compute the change for `input`. `Ok(None)` means there is nothing to do,
/// e.g. backspace at the start of the document.
pub fn reconcile(
    document: &Document,
    selection: Selection,
    input: &ObservedInput,
) -> Result<Option<Reconciled>, ReconcileError> {
    let selection = selection.clamp(document.len());
    let reconciled = match input {
        ObservedInput::InsertText(text) | ObservedInput::CompositionEnd(text) => {
            insert_text(document, selection, text)?
        }
        ObservedInput::Paste(text) => paste(document, selection, text)?,
        ObservedInput::DeleteBackward => delete(document, selection, Direction::Backward)?,
        ObservedInput::DeleteForward => delete(document, selection, Direction::Forward)?,
        ObservedInput::DeleteWord(direction) => {
            let range = selection
                .is_collapsed()
                .then(|| word_range(document, selection.focus, *direction))
                .flatten();
            delete_span(document, selection, *direction, range)?
        }
        ObservedInput::DeleteLine(direction) => {
            let range = if selection.is_collapsed() {
                line_range(document, selection.focus, *direction)?
            } else {
                None
            };
            delete_span(document, selection, *direction, range)?
        }
        ObservedInput::Format(format) => toggle_format(document, selection, *format)?,
        ObservedInput::InsertParagraph => split(document, selection)?,
        ObservedInput::TextMutation { leaf, observed } => text_mutation(document, *leaf, observed)?,
    };

    if let Some(reconciled) = &reconciled {
        tracing::trace!(
            target: "folio::reconcile",
            input = ?input,
            ops = reconciled.transaction.operations().len(),
            caret = reconciled.selection.focus,
            "reconciled input"
        );
    }
    Ok(reconciled)
}

/// Caret after inserted content starting at `start`. Content wrapped in a
/// block leaves the caret inside that block.
fn caret_after(start: usize, transaction: &Transaction) -> Selection {
    let inserted: Vec<&Element> = transaction.inserted().collect();
    let mut caret = start + inserted.len();
    if matches!(inserted.last(), Some(Element::Close { .. })) {
        caret -= 1;
    }
    Selection::caret(caret)
}

fn insert_text(
    document: &Document,
    selection: Selection,
    text: &str,
) -> Result<Option<Reconciled>, ReconcileError> {
    if text.is_empty() && selection.is_collapsed() {
        return Ok(None);
    }
    let transaction = Transaction::replace_text(document, selection.to_range(), text)?;
    let selection = caret_after(selection.start(), &transaction);
    Ok(Some(Reconciled {
        transaction,
        selection,
    }))
}

fn paste(
    document: &Document,
    selection: Selection,
    text: &str,
) -> Result<Option<Reconciled>, ReconcileError> {
    let normalized = text.replace("\r\n", "\n");
    if !normalized.contains('\n') {
        return insert_text(document, selection, &normalized);
    }

    let start = selection.start();
    let branch_id = document.branch_at(start)?;
    let branch = document.node(branch_id)?;
    let annotations = match start.checked_sub(1).and_then(|o| document.data().get(o)) {
        Some(Element::Char { annotations, .. }) => annotations.clone(),
        _ => Annotations::new(),
    };

    let lines = normalized.split('\n');
    let content: Vec<Element> = if branch.rules().can_have_grandchildren {
        lines
            .flat_map(|line| Element::wrap("paragraph", Element::annotated_text(line, &annotations)))
            .collect()
    } else if branch_id != document.root() && branch.rules().can_be_split {
        let mut content = Vec::new();
        for (i, line) in lines.enumerate() {
            if i > 0 {
                content.push(Element::close(branch.node_type().clone()));
                content.push(Element::Open {
                    node_type: branch.node_type().clone(),
                    attributes: branch.attributes().clone(),
                });
            }
            content.extend(Element::annotated_text(line, &annotations));
        }
        content
    } else {
        Element::annotated_text(&normalized, &annotations)
    };

    if !selection.is_collapsed() {
        // Validates the removal half.
        Transaction::remove_range(document, selection.to_range())?;
    }
    let transaction = Transaction::builder()
        .retain(start)
        .remove(selection.len())
        .insert(content)
        .build();
    let selection = caret_after(start, &transaction);
    Ok(Some(Reconciled {
        transaction,
        selection,
    }))
}

fn delete(
    document: &Document,
    selection: Selection,
    direction: Direction,
) -> Result<Option<Reconciled>, ReconcileError> {
    if !selection.is_collapsed() {
        let transaction = Transaction::remove_range(document, selection.to_range())?;
        return Ok(Some(Reconciled {
            transaction,
            selection: Selection::caret(selection.start()),
        }));
    }

    let caret = selection.focus;
    let data = document.data();
    let range = match direction {
        Direction::Backward => {
            let Some(before) = caret.checked_sub(1) else {
                return Ok(None);
            };
            match data.get(before) {
                Some(Element::Char { .. }) => before..caret,
                Some(Element::Close { .. }) => match leaf_at(document, before)? {
                    Some(range) => range,
                    None => return Ok(None),
                },
                // Start of a block: join it onto a preceding sibling of the
                // same type.
                Some(Element::Open { node_type, .. }) => match before
                    .checked_sub(1)
                    .and_then(|o| data.get(o))
                {
                    Some(Element::Close { node_type: prev }) if prev == node_type => {
                        before - 1..caret
                    }
                    _ => return Ok(None),
                },
                None => return Ok(None),
            }
        }
        Direction::Forward => match data.get(caret) {
            Some(Element::Char { .. }) => caret..caret + 1,
            Some(Element::Open { .. }) => match leaf_at(document, caret)? {
                Some(range) => range,
                None => return Ok(None),
            },
            Some(Element::Close { node_type }) => match data.get(caret + 1) {
                Some(Element::Open { node_type: next, .. }) if next == node_type => {
                    caret..caret + 2
                }
                _ => return Ok(None),
            },
            None => return Ok(None),
        },
    };

    let transaction = Transaction::remove_range(document, range.clone())?;
    Ok(Some(Reconciled {
        transaction,
        selection: Selection::caret(range.start),
    }))
}

/// Remove `range` when there is one; otherwise behave like a single
/// character delete, which also joins blocks at their edges.
fn delete_span(
    document: &Document,
    selection: Selection,
    direction: Direction,
    range: Option<Range<usize>>,
) -> Result<Option<Reconciled>, ReconcileError> {
    let Some(range) = range else {
        return delete(document, selection, direction);
    };
    let transaction = Transaction::remove_range(document, range.clone())?;
    Ok(Some(Reconciled {
        transaction,
        selection: Selection::caret(range.start),
    }))
}

/// Characters from `caret` to the next word boundary: whitespace next to the
/// caret, then the word behind it. Stops at any tag.
fn word_range(document: &Document, caret: usize, direction: Direction) -> Option<Range<usize>> {
    let data = document.data();
    let char_at = |offset: usize| match data.get(offset) {
        Some(Element::Char { ch, .. }) => Some(*ch),
        _ => None,
    };
    let range = match direction {
        Direction::Backward => {
            let mut start = caret;
            while start > 0 && char_at(start - 1).is_some_and(char::is_whitespace) {
                start -= 1;
            }
            while start > 0 && char_at(start - 1).is_some_and(|c| !c.is_whitespace()) {
                start -= 1;
            }
            start..caret
        }
        Direction::Forward => {
            let mut end = caret;
            while char_at(end).is_some_and(char::is_whitespace) {
                end += 1;
            }
            while char_at(end).is_some_and(|c| !c.is_whitespace()) {
                end += 1;
            }
            caret..end
        }
    };
    (!range.is_empty()).then_some(range)
}

/// From `caret` to the start or end of its block. `None` between blocks.
fn line_range(
    document: &Document,
    caret: usize,
    direction: Direction,
) -> Result<Option<Range<usize>>, ReconcileError> {
    let branch = document.branch_at(caret)?;
    if document.node(branch)?.rules().can_have_grandchildren {
        return Ok(None);
    }
    let inner = document.inner_range(branch)?;
    let range = match direction {
        Direction::Backward => inner.start..caret,
        Direction::Forward => caret..inner.end,
    };
    Ok((!range.is_empty()).then_some(range))
}

/// Set the format's annotation over the selection, or clear it when every
/// selected character already has it.
fn toggle_format(
    document: &Document,
    selection: Selection,
    format: Format,
) -> Result<Option<Reconciled>, ReconcileError> {
    if selection.is_collapsed() {
        return Ok(None);
    }
    let annotation = format.annotation();
    let range = selection.to_range();
    let applied = document
        .get_data(range.clone())?
        .iter()
        .filter_map(Element::annotations)
        .all(|annotations| annotations.contains(annotation));
    let method = if applied {
        AnnotationMethod::Clear
    } else {
        AnnotationMethod::Set
    };
    let transaction = Transaction::annotate(document, range, annotation, method)?;
    if transaction.is_noop() {
        return Ok(None);
    }
    Ok(Some(Reconciled {
        transaction,
        selection,
    }))
}

/// Range of the delimited leaf whose tag sits at `offset`.
fn leaf_at(document: &Document, offset: usize) -> Result<Option<Range<usize>>, ReconcileError> {
    let position = document.locate(offset)?;
    let node = document.node(position.node)?;
    if node.is_branch() || node.is_text() {
        return Ok(None);
    }
    Ok(Some(document.node_range(position.node)?))
}

fn split(document: &Document, selection: Selection) -> Result<Option<Reconciled>, ReconcileError> {
    let start = selection.start();
    let Some(split) = Transaction::split_at(document, start)? else {
        return Ok(None);
    };
    if !selection.is_collapsed() {
        Transaction::remove_range(document, selection.to_range())?;
    }
    let inserted: Vec<Element> = split.inserted().cloned().collect();
    let caret = start + inserted.len();
    let transaction = Transaction::builder()
        .retain(start)
        .remove(selection.len())
        .insert(inserted)
        .build();
    Ok(Some(Reconciled {
        transaction,
        selection: Selection::caret(caret),
    }))
}

/// Diff a text leaf's observed text against the model: keep the common
/// prefix and suffix, replace what lies between.
fn text_mutation(
    document: &Document,
    leaf: NodeId,
    observed: &str,
) -> Result<Option<Reconciled>, ReconcileError> {
    if !document.node(leaf)?.is_text() {
        return Err(ReconcileError::NotText(leaf));
    }
    let range = document.node_range(leaf)?;
    let current: Vec<char> = document.data().text(range.clone())?.chars().collect();
    let observed: Vec<char> = observed.chars().collect();

    let prefix = current
        .iter()
        .zip(&observed)
        .take_while(|(a, b)| a == b)
        .count();
    let max_suffix = current.len().min(observed.len()) - prefix;
    let suffix = current
        .iter()
        .rev()
        .zip(observed.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    let removed = current.len() - prefix - suffix;
    let inserted: String = observed[prefix..observed.len() - suffix].iter().collect();
    if removed == 0 && inserted.is_empty() {
        return Ok(None);
    }

    let at = range.start + prefix;
    // Previous character, or the first one of the leaf when editing at its
    // start.
    let neighbour = document.data().get(if prefix > 0 { at - 1 } else { at });
    let annotations = neighbour
        .and_then(Element::annotations)
        .cloned()
        .unwrap_or_default();

    let caret = at + inserted.chars().count();
    let transaction = Transaction::builder()
        .retain(at)
        .remove(removed)
        .insert(Element::annotated_text(&inserted, &annotations))
        .build();
    Ok(Some(Reconciled {
        transaction,
        selection: Selection::caret(caret),
    }))
}
