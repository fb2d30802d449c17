//! Live DOM backend: replays `DomPatch` batches onto `web_sys` nodes and
//! feeds browser input back into the editor.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use folio_editor_core::Selection;
use gloo_events::{EventListener, EventListenerOptions};
use wasm_bindgen::{JsCast, JsValue};

use crate::dom::{DomNodeId, DomPatch};
use crate::editor::Editor;
use crate::input::{BeforeInputResult, parse_browser_input_type};

/// Install the panic hook and a console tracing subscriber.
pub fn init_logging(level: tracing::Level) {
    console_error_panic_hook::set_once();
    use tracing::subscriber::set_global_default;
    use tracing_subscriber::Registry;
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt;

    let wasm_layer = tracing_wasm::WASMLayer::new(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(level)
            .build(),
    );
    let filter = EnvFilter::new(format!("{}", level).to_lowercase());
    let reg = Registry::default().with(filter).with(wasm_layer);

    let _ = set_global_default(reg);
}

/// Browser text from a `beforeinput` event: `data`, else the plain-text
/// payload of a paste or drop.
pub fn get_data_from_event(event: &web_sys::InputEvent) -> Option<String> {
    if let Some(data) = event.data() {
        if !data.is_empty() {
            return Some(data);
        }
    }
    if let Some(data_transfer) = event.data_transfer() {
        if let Ok(text) = data_transfer.get_data("text/plain") {
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// Mirror of a [`crate::DomTree`] in the real DOM.
#[derive(Debug)]
pub struct DomMount {
    host: web_sys::Element,
    document: web_sys::Document,
    nodes: HashMap<DomNodeId, web_sys::Node>,
    /// Live node to `[index, generation]` of its key.
    keys: js_sys::WeakMap,
    root: Option<DomNodeId>,
}

impl DomMount {
    pub fn new(host: web_sys::Element) -> Result<Self, JsValue> {
        let document = host
            .owner_document()
            .ok_or_else(|| JsValue::from_str("host element has no owner document"))?;
        Ok(Self {
            host,
            document,
            nodes: HashMap::new(),
            keys: js_sys::WeakMap::new(),
            root: None,
        })
    }

    /// Replay `patches`. `root` is attached to the host the first time it
    /// appears.
    pub fn apply(&mut self, patches: &[DomPatch], root: DomNodeId) -> Result<(), JsValue> {
        for patch in patches {
            match patch {
                DomPatch::CreateElement {
                    key,
                    tag,
                    attributes,
                } => {
                    let element = self.document.create_element(tag)?;
                    for (name, value) in attributes {
                        element.set_attribute(name, value)?;
                    }
                    self.remember(*key, element.into());
                }
                DomPatch::CreateText { key, text } => {
                    let text = self.document.create_text_node(text);
                    self.remember(*key, text.into());
                }
                DomPatch::AppendChild { parent, child } => {
                    self.node(*parent)?.append_child(self.node(*child)?)?;
                }
                DomPatch::InsertBefore {
                    parent,
                    child,
                    before,
                } => {
                    self.node(*parent)?
                        .insert_before(self.node(*child)?, Some(self.node(*before)?))?;
                }
                DomPatch::RemoveNode { key, released } => {
                    if let Some(node) = self.forget(*key) {
                        if let Some(parent) = node.parent_node() {
                            parent.remove_child(&node)?;
                        }
                    }
                    for id in released {
                        self.forget(*id);
                    }
                }
                DomPatch::SetText { key, text } => {
                    self.node(*key)?.set_text_content(Some(text));
                }
            }
        }

        if self.root != Some(root) {
            self.host.append_child(self.node(root)?)?;
            self.root = Some(root);
        }
        tracing::trace!(target: "folio::mount", patches = patches.len(), "patches applied");
        Ok(())
    }

    fn node(&self, id: DomNodeId) -> Result<&web_sys::Node, JsValue> {
        self.nodes
            .get(&id)
            .ok_or_else(|| JsValue::from_str(&format!("unknown DOM key {}", id.index())))
    }

    fn remember(&mut self, key: DomNodeId, node: web_sys::Node) {
        let parts = js_sys::Array::of2(&(key.index() as u32).into(), &key.generation().into());
        self.keys.set(&node, &parts);
        self.nodes.insert(key, node);
    }

    fn forget(&mut self, key: DomNodeId) -> Option<web_sys::Node> {
        let node = self.nodes.remove(&key)?;
        self.keys.delete(&node);
        Some(node)
    }

    pub fn get(&self, id: DomNodeId) -> Option<&web_sys::Node> {
        self.nodes.get(&id)
    }

    /// Key of a live node.
    pub fn key_for(&self, node: &web_sys::Node) -> Option<DomNodeId> {
        let parts: js_sys::Array = self.keys.get(node).dyn_into().ok()?;
        let index = parts.get(0).as_f64()? as u32;
        let generation = parts.get(1).as_f64()? as u32;
        let key = DomNodeId::from_parts(index, generation);
        self.nodes.contains_key(&key).then_some(key)
    }
}

struct Mounted {
    editor: Editor,
    mount: DomMount,
}

impl Mounted {
    fn flush(&mut self) -> Result<(), JsValue> {
        let patches = self.editor.take_patches();
        let root = self.editor.view().root_element();
        self.mount.apply(&patches, root)
    }

    /// Model offset of a DOM (node, offset) pair.
    fn offset_of(&self, node: Option<web_sys::Node>, offset: u32) -> Option<usize> {
        let key = self.mount.key_for(&node?)?;
        self.editor
            .view()
            .offset_for_dom_position(self.editor.document(), key, offset as usize)
            .ok()
            .flatten()
    }

    fn read_selection(&mut self) {
        let Some(selection) = web_sys::window().and_then(|w| w.get_selection().ok().flatten())
        else {
            return;
        };
        let anchor = self.offset_of(selection.anchor_node(), selection.anchor_offset());
        let focus = self.offset_of(selection.focus_node(), selection.focus_offset());
        if let (Some(anchor), Some(focus)) = (anchor, focus) {
            self.editor.set_selection(Selection::new(anchor, focus));
        }
    }

    fn write_selection(&self) -> Result<(), JsValue> {
        let Some(selection) = web_sys::window().and_then(|w| w.get_selection().ok().flatten())
        else {
            return Ok(());
        };
        let focus = self.editor.selection().focus;
        let position = self
            .editor
            .view()
            .dom_position_for_offset(self.editor.document(), focus)
            .map_err(|err| JsValue::from_str(&err.to_string()))?;
        if let Some((key, offset)) = position {
            if let Some(node) = self.mount.get(key) {
                selection.collapse_with_offset(Some(node), offset as u32)?;
            }
        }
        Ok(())
    }

    fn on_before_input(&mut self, event: &web_sys::InputEvent) -> Result<(), JsValue> {
        if event.is_composing() {
            return Ok(());
        }
        self.read_selection();
        let input_type = parse_browser_input_type(&event.input_type());
        let result = self
            .editor
            .handle_before_input(&input_type, get_data_from_event(event))
            .map_err(|err| JsValue::from_str(&err.to_string()))?;
        if result == BeforeInputResult::Handled {
            event.prevent_default();
            self.flush()?;
            self.write_selection()?;
        }
        Ok(())
    }

    /// The browser edited a text node on its own. Only composition gets this
    /// far, and it only ever touches the text node under the caret.
    fn on_input(&mut self) -> Result<(), JsValue> {
        let Some(node) = web_sys::window()
            .and_then(|w| w.get_selection().ok().flatten())
            .and_then(|s| s.anchor_node())
            .filter(|node| node.node_type() == web_sys::Node::TEXT_NODE)
        else {
            return Ok(());
        };
        let Some(key) = self.mount.key_for(&node) else {
            return Ok(());
        };
        let text = node.text_content().unwrap_or_default();
        let changed = self
            .editor
            .record_dom_text(key, &text)
            .and_then(|()| self.editor.handle_dom_text_mutation(key))
            .map_err(|err| JsValue::from_str(&err.to_string()))?;
        if changed {
            self.flush()?;
            self.write_selection()?;
        }
        Ok(())
    }
}

/// An editor attached to a host element. Dropping it removes the listeners.
pub struct MountedEditor {
    inner: Rc<RefCell<Mounted>>,
    _listeners: Vec<EventListener>,
}

impl MountedEditor {
    pub fn mount(host: web_sys::Element, editor: Editor) -> Result<Self, JsValue> {
        let target: web_sys::EventTarget = host.clone().into();
        let inner = Rc::new(RefCell::new(Mounted {
            editor,
            mount: DomMount::new(host)?,
        }));
        inner.borrow_mut().flush()?;

        let before_input = {
            let inner = Rc::clone(&inner);
            EventListener::new_with_options(
                &target,
                "beforeinput",
                EventListenerOptions::enable_prevent_default(),
                move |event| {
                    let Some(event) = event.dyn_ref::<web_sys::InputEvent>() else {
                        return;
                    };
                    if let Err(err) = inner.borrow_mut().on_before_input(event) {
                        tracing::warn!(target: "folio::mount", error = ?err, "beforeinput failed");
                    }
                },
            )
        };
        let input = {
            let inner = Rc::clone(&inner);
            EventListener::new(&target, "input", move |_event| {
                if let Err(err) = inner.borrow_mut().on_input() {
                    tracing::warn!(target: "folio::mount", error = ?err, "input failed");
                }
            })
        };

        Ok(Self {
            inner,
            _listeners: vec![before_input, input],
        })
    }

    /// Run `f` against the editor, then push any DOM patches it produced.
    pub fn update<R>(&self, f: impl FnOnce(&mut Editor) -> R) -> Result<R, JsValue> {
        let mut inner = self.inner.borrow_mut();
        let out = f(&mut inner.editor);
        inner.flush()?;
        Ok(out)
    }

    pub fn html(&self) -> Option<String> {
        self.inner.borrow().editor.html().ok()
    }
}
