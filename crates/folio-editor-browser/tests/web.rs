//! WASM browser tests for folio-editor-browser.
//!
//! Run with: `wasm-pack test --headless --firefox` or `--chrome`

#![cfg(all(target_family = "wasm", target_os = "unknown"))]

use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

use folio_editor_browser::mount::{DomMount, MountedEditor};
use folio_editor_browser::{
    BeforeInputResult, EditorConfig, Editor, Element, InputType, Selection,
    parse_browser_input_type,
};

fn host() -> web_sys::Element {
    let document = web_sys::window().unwrap().document().unwrap();
    let host = document.create_element("div").unwrap();
    document.body().unwrap().append_child(&host).unwrap();
    host
}

fn editor(text: &str) -> Editor {
    Editor::from_elements(
        Element::wrap("paragraph", Element::text(text)),
        &EditorConfig::default(),
    )
    .unwrap()
}

#[wasm_bindgen_test]
fn test_parse_input_types() {
    assert_eq!(parse_browser_input_type("insertText"), InputType::InsertText);
    assert_eq!(
        parse_browser_input_type("insertParagraph"),
        InputType::InsertBreak
    );
    assert!(matches!(
        parse_browser_input_type("somethingNew"),
        InputType::Unsupported(_)
    ));
}

#[wasm_bindgen_test]
fn test_mount_renders_view() {
    let host = host();
    let mounted = MountedEditor::mount(host.clone(), editor("abc")).unwrap();
    assert_eq!(host.inner_html(), mounted.html().unwrap());
    assert_eq!(
        host.inner_html(),
        r#"<div contenteditable="true"><p>abc</p></div>"#
    );
}

#[wasm_bindgen_test]
fn test_mount_follows_edits() {
    let host = host();
    let mounted = MountedEditor::mount(host.clone(), editor("ab")).unwrap();
    let result = mounted
        .update(|editor| {
            editor.set_selection(Selection::caret(3));
            editor.handle_before_input(&InputType::InsertBreak, None)
        })
        .unwrap()
        .unwrap();
    assert_eq!(result, BeforeInputResult::Handled);
    assert_eq!(
        host.inner_html(),
        r#"<div contenteditable="true"><p>ab</p><p></p></div>"#
    );

    mounted
        .update(|editor| editor.handle_before_input(&InputType::InsertText, Some("c".into())))
        .unwrap()
        .unwrap();
    assert_eq!(host.inner_html(), mounted.html().unwrap());

    mounted.update(|editor| editor.undo()).unwrap().unwrap();
    assert_eq!(host.inner_html(), mounted.html().unwrap());
}

#[wasm_bindgen_test]
fn test_dom_mount_maps_nodes_back() {
    let host = host();
    let mut ed = editor("x");
    let mut mount = DomMount::new(host.clone()).unwrap();
    let root = ed.view().root_element();
    mount.apply(&ed.take_patches(), root).unwrap();

    let live_root = host.first_child().unwrap();
    assert_eq!(mount.key_for(&live_root), Some(root));

    // Replaced nodes stop resolving; their successors do.
    let para = live_root.first_child().unwrap();
    let old_text = para.first_child().unwrap();
    let old_key = mount.key_for(&old_text).unwrap();
    ed.set_selection(Selection::caret(2));
    ed.handle_before_input(&InputType::InsertText, Some("y".into()))
        .unwrap();
    mount.apply(&ed.take_patches(), root).unwrap();
    assert_eq!(mount.key_for(&old_text), None);
    let new_text = para.first_child().unwrap();
    let new_key = mount.key_for(&new_text).unwrap();
    assert_ne!(new_key, old_key);
    assert_eq!(new_text.text_content().unwrap(), "xy");
}
