//! `beforeinput` input types.
//!
//! The browser's `inputType` strings are folded into the handful of things
//! the editor does with them. Parsing is plain string matching so it can be
//! tested natively; the wasm mount only hands the string over.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Backward,
    Forward,
}

/// How much a delete input removes from a collapsed selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteUnit {
    Character,
    Word,
    /// To the edge of the block. There is no layout here, so soft and hard
    /// lines are the same.
    Line,
    /// Only the selection (cut, drag, `deleteContent`).
    Selection,
}

/// Character formats the browser offers through `format*` inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Superscript,
    Subscript,
}

impl Format {
    /// The model annotation toggled by this format.
    pub fn annotation(self) -> &'static str {
        match self {
            Format::Bold => "textStyle/bold",
            Format::Italic => "textStyle/italic",
            Format::Underline => "textStyle/underline",
            Format::Strikethrough => "textStyle/strikethrough",
            Format::Superscript => "textStyle/superscript",
            Format::Subscript => "textStyle/subscript",
        }
    }

    fn from_suffix(name: &str) -> Option<Self> {
        Some(match name {
            "Bold" => Format::Bold,
            "Italic" => Format::Italic,
            "Underline" => Format::Underline,
            "StrikeThrough" | "Strikethrough" => Format::Strikethrough,
            "Superscript" => Format::Superscript,
            "Subscript" => Format::Subscript,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputType {
    /// Typing, autocorrect, kill-ring yanks.
    InsertText,
    /// Clipboard paste or drop.
    InsertTransfer,
    /// Enter or Shift+Enter.
    InsertBreak,
    /// IME composition, which the browser owns until it commits.
    Composition,
    Delete { unit: DeleteUnit, direction: Direction },
    Format(Format),
    Undo,
    Redo,
    /// Anything else. The editor swallows these so the browser cannot
    /// restructure the DOM behind the model's back.
    Unsupported(String),
}

/// Parse `InputEvent.inputType`.
pub fn parse_browser_input_type(s: &str) -> InputType {
    match s {
        "insertText" | "insertReplacementText" | "insertFromYank" => InputType::InsertText,
        "insertFromPaste" | "insertFromPasteAsQuotation" | "insertFromDrop" => {
            InputType::InsertTransfer
        }
        "insertParagraph" | "insertLineBreak" => InputType::InsertBreak,
        "insertCompositionText" | "deleteCompositionText" | "insertFromComposition"
        | "deleteByComposition" => InputType::Composition,
        "historyUndo" => InputType::Undo,
        "historyRedo" => InputType::Redo,
        other => other
            .strip_prefix("format")
            .and_then(Format::from_suffix)
            .map(InputType::Format)
            .or_else(|| other.strip_prefix("delete").and_then(parse_delete))
            .unwrap_or_else(|| InputType::Unsupported(other.to_string())),
    }
}

/// `rest` is what follows `delete`, e.g. `WordBackward`.
fn parse_delete(rest: &str) -> Option<InputType> {
    if matches!(rest, "ByCut" | "ByDrag" | "Content") {
        return Some(InputType::Delete {
            unit: DeleteUnit::Selection,
            direction: Direction::Backward,
        });
    }
    let (unit, direction) = if let Some(unit) = rest.strip_suffix("Backward") {
        (unit, Direction::Backward)
    } else {
        (rest.strip_suffix("Forward")?, Direction::Forward)
    };
    let unit = match unit {
        "Content" => DeleteUnit::Character,
        "Word" | "EntireWord" => DeleteUnit::Word,
        "SoftLine" | "HardLine" => DeleteUnit::Line,
        _ => return None,
    };
    Some(InputType::Delete { unit, direction })
}

/// Outcome of a `beforeinput` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeforeInputResult {
    /// The editor dealt with it; prevent the browser default.
    Handled,
    /// Let the browser apply it. Only composition gets this.
    PassThrough,
}
