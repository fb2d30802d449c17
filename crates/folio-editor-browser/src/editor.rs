//! Editor facade: a surface plus the view that mirrors it.

use folio_editor_core::{
    Document, EditorConfig, Element, ModelRegistry, Selection, Surface,
};

use crate::dom::{DomNodeId, DomPatch};
use crate::error::EditorError;
use crate::input::{BeforeInputResult, InputType};
use crate::reconcile::{ObservedInput, Reconciled, reconcile};
use crate::view::{ContentEditableView, ViewRegistry, default_view_registry};

#[derive(Debug)]
pub struct Editor {
    surface: Surface,
    view: ContentEditableView,
}

impl Editor {
    pub fn new(
        document: Document,
        views: ViewRegistry,
        config: &EditorConfig,
    ) -> Result<Self, EditorError> {
        let view = ContentEditableView::new(&document, views)?;
        let surface = Surface::new(document, config);
        Ok(Self { surface, view })
    }

    /// Editor over `elements` with the built-in model and view types.
    pub fn from_elements(elements: Vec<Element>, config: &EditorConfig) -> Result<Self, EditorError> {
        let models = ModelRegistry::with_defaults(config.duplicate_registration)?;
        let views = default_view_registry(config.duplicate_registration)?;
        Self::new(Document::new(elements, models)?, views, config)
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn document(&self) -> &Document {
        self.surface.document()
    }

    pub fn view(&self) -> &ContentEditableView {
        &self.view
    }

    pub fn selection(&self) -> Selection {
        self.surface.selection()
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.surface.set_selection(selection);
    }

    /// Reconcile and apply one input. `false` if it changed nothing.
    pub fn handle_input(&mut self, input: &ObservedInput) -> Result<bool, EditorError> {
        let Some(Reconciled {
            transaction,
            selection,
        }) = reconcile(self.surface.document(), self.surface.selection(), input)?
        else {
            return Ok(false);
        };
        self.surface
            .change_with_selection(&transaction, selection, &mut self.view)?;
        Ok(true)
    }

    /// Entry point for `beforeinput`. Composition is left to the browser and
    /// picked up from the DOM afterwards; every other input is handled here,
    /// including those with no model equivalent, which are dropped.
    pub fn handle_before_input(
        &mut self,
        input_type: &InputType,
        data: Option<String>,
    ) -> Result<BeforeInputResult, EditorError> {
        match input_type {
            InputType::Composition => return Ok(BeforeInputResult::PassThrough),
            InputType::Undo => {
                self.undo()?;
            }
            InputType::Redo => {
                self.redo()?;
            }
            _ => match ObservedInput::from_before_input(input_type, data) {
                Some(input) => {
                    self.handle_input(&input)?;
                }
                None => {
                    tracing::debug!(target: "folio::editor", input_type = ?input_type, "dropping input");
                }
            },
        }
        Ok(BeforeInputResult::Handled)
    }

    /// Store text the browser wrote into a DOM text node, without touching
    /// the model. Follow with [`Editor::handle_dom_text_mutation`].
    pub fn record_dom_text(&mut self, dom: DomNodeId, text: &str) -> Result<(), EditorError> {
        self.view.dom_mut().set_text(dom, text)?;
        Ok(())
    }

    /// Bring the model in line with the current DOM text of the leaf that
    /// owns `dom`.
    pub fn handle_dom_text_mutation(&mut self, dom: DomNodeId) -> Result<bool, EditorError> {
        let Some(leaf) = self.view.model_node_for_dom(dom) else {
            tracing::warn!(target: "folio::editor", dom = ?dom, "mutation outside any view");
            return Ok(false);
        };
        let observed = self.view.dom_text_of(leaf)?;
        self.handle_input(&ObservedInput::TextMutation { leaf, observed })
    }

    pub fn undo(&mut self) -> Result<bool, EditorError> {
        Ok(self.surface.undo(&mut self.view)?)
    }

    pub fn redo(&mut self) -> Result<bool, EditorError> {
        Ok(self.surface.redo(&mut self.view)?)
    }

    pub fn html(&self) -> Result<String, EditorError> {
        Ok(self.view.html()?)
    }

    /// DOM patches recorded since the last call.
    pub fn take_patches(&mut self) -> Vec<DomPatch> {
        self.view.take_patches()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::parse_browser_input_type;

    fn editor(text: &str) -> Editor {
        Editor::from_elements(
            Element::wrap("paragraph", Element::text(text)),
            &EditorConfig::default(),
        )
        .unwrap()
    }

    fn body(editor: &Editor) -> String {
        let html = editor.html().unwrap();
        html.trim_start_matches(r#"<div contenteditable="true">"#)
            .trim_end_matches("</div>")
            .to_string()
    }

    #[test]
    fn test_typing_and_undo() {
        let mut ed = editor("abc");
        ed.set_selection(Selection::caret(4));
        let result = ed
            .handle_before_input(&InputType::InsertText, Some("d".into()))
            .unwrap();
        assert_eq!(result, BeforeInputResult::Handled);
        assert_eq!(body(&ed), "<p>abcd</p>");
        assert_eq!(ed.selection(), Selection::caret(5));

        ed.handle_before_input(&InputType::Undo, None).unwrap();
        assert_eq!(body(&ed), "<p>abc</p>");
        assert_eq!(ed.selection(), Selection::caret(4));

        ed.handle_before_input(&InputType::Redo, None).unwrap();
        assert_eq!(body(&ed), "<p>abcd</p>");
        assert_eq!(ed.selection(), Selection::caret(5));
    }

    #[test]
    fn test_enter_then_backspace() {
        let mut ed = editor("abcd");
        ed.set_selection(Selection::caret(3));
        ed.handle_input(&ObservedInput::InsertParagraph).unwrap();
        assert_eq!(body(&ed), "<p>ab</p><p>cd</p>");
        assert_eq!(ed.selection(), Selection::caret(5));
        assert!(ed.view().is_aligned_with(ed.document()));

        ed.handle_input(&ObservedInput::DeleteBackward).unwrap();
        assert_eq!(body(&ed), "<p>abcd</p>");
        assert_eq!(ed.selection(), Selection::caret(3));
        assert!(ed.view().is_aligned_with(ed.document()));
    }

    #[test]
    fn test_composition_passes_through() {
        let mut ed = editor("a");
        let result = ed
            .handle_before_input(&InputType::Composition, Some("k".into()))
            .unwrap();
        assert_eq!(result, BeforeInputResult::PassThrough);
        assert!(!ed.surface().can_undo());
    }

    #[test]
    fn test_unsupported_input_is_swallowed() {
        let mut ed = editor("ab");
        ed.take_patches();
        for name in ["insertHorizontalRule", "insertOrderedList", "formatIndent"] {
            let result = ed
                .handle_before_input(&parse_browser_input_type(name), None)
                .unwrap();
            assert_eq!(result, BeforeInputResult::Handled);
        }
        assert_eq!(body(&ed), "<p>ab</p>");
        assert!(ed.take_patches().is_empty());
        assert!(!ed.surface().can_undo());
    }

    #[test]
    fn test_format_bold_reaches_model_and_view() {
        let mut ed = editor("abc");
        ed.set_selection(Selection::new(2, 4));
        let result = ed
            .handle_before_input(&parse_browser_input_type("formatBold"), None)
            .unwrap();
        assert_eq!(result, BeforeInputResult::Handled);
        assert_eq!(body(&ed), "<p>a<b>bc</b></p>");
        assert_eq!(ed.selection(), Selection::new(2, 4));
        assert!(ed.view().is_aligned_with(ed.document()));

        ed.handle_before_input(&InputType::Undo, None).unwrap();
        assert_eq!(body(&ed), "<p>abc</p>");
    }

    #[test]
    fn test_delete_word_backward() {
        let mut ed = editor("one two");
        ed.set_selection(Selection::caret(8));
        ed.handle_before_input(&parse_browser_input_type("deleteWordBackward"), None)
            .unwrap();
        assert_eq!(body(&ed), "<p>one </p>");
        assert_eq!(ed.selection(), Selection::caret(5));
    }

    #[test]
    fn test_dom_text_mutation_reaches_model() {
        let mut ed = editor("abc");
        let para = ed.document().children(ed.document().root()).unwrap()[0];
        let leaf = ed.document().children(para).unwrap()[0];
        let text = ed.view().dom_nodes_of(leaf).unwrap()[0];

        ed.record_dom_text(text, "abXc").unwrap();
        assert!(ed.handle_dom_text_mutation(text).unwrap());
        assert_eq!(ed.document().text_content(), "abXc");
        assert_eq!(ed.selection(), Selection::caret(4));
        assert_eq!(body(&ed), "<p>abXc</p>");

        // The re-rendered text node already matches.
        let leaf = ed.document().children(para).unwrap()[0];
        let text = ed.view().dom_nodes_of(leaf).unwrap()[0];
        assert!(!ed.handle_dom_text_mutation(text).unwrap());
    }

    #[test]
    fn test_typing_reuses_dom_slots() {
        let mut ed = editor("a");
        let slots = ed.view().dom().slot_count();
        for (i, ch) in "bcdefghijklmnopqrst".chars().enumerate() {
            ed.set_selection(Selection::caret(2 + i));
            ed.handle_input(&ObservedInput::InsertText(ch.to_string()))
                .unwrap();
        }
        assert_eq!(body(&ed), "<p>abcdefghijklmnopqrst</p>");
        assert_eq!(ed.view().dom().slot_count(), slots);
    }

    #[test]
    fn test_patch_stream_is_drained() {
        let mut ed = editor("a");
        assert!(!ed.take_patches().is_empty());
        assert!(ed.take_patches().is_empty());
        ed.set_selection(Selection::caret(2));
        ed.handle_input(&ObservedInput::InsertText("b".into())).unwrap();
        assert!(!ed.take_patches().is_empty());
    }
}
