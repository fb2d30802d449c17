//! Content-editable view layer.
//!
//! One view entry per model node, each owning the DOM nodes it rendered.
//! The view subscribes to the synchronizer's change events and rebuilds only
//! the DOM of the replaced children; a parent's container element survives
//! every change below it.

use std::collections::HashMap;
use std::fmt;

use folio_editor_core::{
    ChangeEvent, ChangeObserver, Document, DuplicatePolicy, Element, ModelError, Node, NodeId,
    NodeRegistry, NodeRules, ROOT_TYPE, TEXT_TYPE,
};
use smol_str::{SmolStr, format_smolstr};

use crate::dom::{DomNodeId, DomPatch, DomTree};
use crate::error::ViewError;

/// View constructor capability.
pub type ViewCtor = fn(&Node) -> ViewKind;

/// Registry used by the view layer.
pub type ViewRegistry = NodeRegistry<ViewCtor>;

/// A branch view: one container element holding the children's DOM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchView {
    pub tag: SmolStr,
    pub attributes: Vec<(SmolStr, SmolStr)>,
}

impl BranchView {
    pub fn new(tag: impl Into<SmolStr>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<SmolStr>, value: impl Into<SmolStr>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }
}

/// Rendering for leaf nodes.
pub trait LeafView: fmt::Debug {
    /// Build the DOM nodes for `node`. They are inserted by the caller.
    fn render(
        &self,
        dom: &mut DomTree,
        document: &Document,
        node: NodeId,
    ) -> Result<Vec<DomNodeId>, ViewError> {
        let _ = (dom, document, node);
        Err(ModelError::NotImplemented {
            type_name: std::any::type_name::<Self>(),
            operation: "LeafView::render",
        }
        .into())
    }
}

#[derive(Debug)]
pub enum ViewKind {
    Branch(BranchView),
    Leaf(Box<dyn LeafView>),
}

impl ViewKind {
    pub fn branch(tag: &str) -> Self {
        ViewKind::Branch(BranchView::new(tag))
    }
}

/// Character runs, wrapped per annotation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextView;

impl LeafView for TextView {
    fn render(
        &self,
        dom: &mut DomTree,
        document: &Document,
        node: NodeId,
    ) -> Result<Vec<DomNodeId>, ViewError> {
        let elements = document.get_data(document.node_range(node)?)?;
        let mut out = Vec::new();
        let mut i = 0;
        while i < elements.len() {
            let Some(annotations) = elements[i].annotations() else {
                i += 1;
                continue;
            };
            let run: String = elements[i..]
                .iter()
                .take_while(|e| e.annotations() == Some(annotations))
                .filter_map(Element::as_char)
                .collect();
            i += run.chars().count();

            let mut top = dom.create_text(run);
            for annotation in annotations.iter().rev() {
                let wrapper = annotation_element(dom, annotation);
                dom.append_child(wrapper, top)?;
                top = wrapper;
            }
            out.push(top);
        }
        Ok(out)
    }
}

fn annotation_element(dom: &mut DomTree, annotation: &str) -> DomNodeId {
    if let Some(href) = annotation.strip_prefix("link/") {
        return dom.create_element("a", [("href", href)]);
    }
    let tag = match annotation {
        "textStyle/bold" => "b",
        "textStyle/italic" => "i",
        "textStyle/underline" => "u",
        "textStyle/strikethrough" => "s",
        "textStyle/code" => "code",
        "textStyle/superscript" => "sup",
        "textStyle/subscript" => "sub",
        _ => return dom.create_element("span", [("data-annotation", annotation)]),
    };
    dom.create_element(tag, [] as [(&str, &str); 0])
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageView;

impl LeafView for ImageView {
    fn render(
        &self,
        dom: &mut DomTree,
        document: &Document,
        node: NodeId,
    ) -> Result<Vec<DomNodeId>, ViewError> {
        let node = document.node(node)?;
        let attributes: Vec<(&str, &str)> = ["src", "alt"]
            .into_iter()
            .filter_map(|key| node.attribute(key).map(|value| (key, value)))
            .collect();
        Ok(vec![dom.create_element("img", attributes)])
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleView;

impl LeafView for RuleView {
    fn render(
        &self,
        dom: &mut DomTree,
        _document: &Document,
        _node: NodeId,
    ) -> Result<Vec<DomNodeId>, ViewError> {
        Ok(vec![dom.create_element("hr", [] as [(&str, &str); 0])])
    }
}

fn heading_view(node: &Node) -> ViewKind {
    let level = node
        .attribute("level")
        .and_then(|l| l.parse::<u8>().ok())
        .unwrap_or(1)
        .clamp(1, 6);
    ViewKind::Branch(BranchView::new(format_smolstr!("h{level}")))
}

fn list_view(node: &Node) -> ViewKind {
    match node.attribute("style") {
        Some("number") => ViewKind::branch("ol"),
        _ => ViewKind::branch("ul"),
    }
}

/// View registry with a view for every built-in model type.
pub fn default_view_registry(policy: DuplicatePolicy) -> Result<ViewRegistry, ModelError> {
    let mut registry = ViewRegistry::new(policy);
    registry.register(ROOT_TYPE, NodeRules::container(), |_| {
        ViewKind::Branch(BranchView::new("div").with_attribute("contenteditable", "true"))
    })?;
    registry.register("paragraph", NodeRules::branch(), |_| ViewKind::branch("p"))?;
    registry.register("heading", NodeRules::branch(), heading_view)?;
    registry.register("preformatted", NodeRules::branch(), |_| ViewKind::branch("pre"))?;
    registry.register("div", NodeRules::container(), |_| ViewKind::branch("div"))?;
    registry.register("table", NodeRules::container(), |_| ViewKind::branch("table"))?;
    registry.register("tableRow", NodeRules::container(), |_| ViewKind::branch("tr"))?;
    registry.register("tableCell", NodeRules::container(), |_| ViewKind::branch("td"))?;
    registry.register("list", NodeRules::container(), list_view)?;
    registry.register("listItem", NodeRules::container(), |_| ViewKind::branch("li"))?;
    registry.register(TEXT_TYPE, NodeRules::leaf(), |_| ViewKind::Leaf(Box::new(TextView)))?;
    registry.register("image", NodeRules::leaf(), |_| ViewKind::Leaf(Box::new(ImageView)))?;
    registry.register("horizontalRule", NodeRules::leaf(), |_| {
        ViewKind::Leaf(Box::new(RuleView))
    })?;
    Ok(registry)
}

#[derive(Debug, Clone, Default)]
struct ViewEntry {
    /// Top-level DOM nodes rendered for the model node.
    dom: Vec<DomNodeId>,
    /// Element holding the children's DOM, for branches.
    container: Option<DomNodeId>,
    /// Mirror of the model node's children at the last sync.
    children: Vec<NodeId>,
}

/// DOM mirror of a document, kept current through change events.
#[derive(Debug)]
pub struct ContentEditableView {
    registry: ViewRegistry,
    dom: DomTree,
    root: NodeId,
    root_element: DomNodeId,
    entries: HashMap<NodeId, ViewEntry>,
    owners: HashMap<DomNodeId, NodeId>,
    absorbed: usize,
    failed: usize,
}

impl ContentEditableView {
    pub fn new(document: &Document, registry: ViewRegistry) -> Result<Self, ViewError> {
        let root = document.root();
        let mut view = Self {
            registry,
            dom: DomTree::new(),
            root,
            root_element: DomNodeId::default(),
            entries: HashMap::new(),
            owners: HashMap::new(),
            absorbed: 0,
            failed: 0,
        };
        view.build_node(document, root)?;
        view.root_element = view
            .entries
            .get(&root)
            .and_then(|entry| entry.container)
            .ok_or(ViewError::MissingView(root))?;

        tracing::debug!(
            target: "folio::view",
            entries = view.entries.len(),
            absorbed = view.absorbed,
            "view built"
        );
        Ok(view)
    }

    pub fn dom(&self) -> &DomTree {
        &self.dom
    }

    /// Mutable DOM access, for hosts that feed uncontrolled edits back in.
    pub fn dom_mut(&mut self) -> &mut DomTree {
        &mut self.dom
    }

    pub fn root_element(&self) -> DomNodeId {
        self.root_element
    }

    /// Number of view failures logged and absorbed so far.
    pub fn absorbed_failures(&self) -> usize {
        self.absorbed
    }

    /// Change events the view could not follow because the model and the
    /// view disagree. Any non-zero count means the DOM needs a rebuild.
    pub fn failed_updates(&self) -> usize {
        self.failed
    }

    pub fn html(&self) -> Result<String, ViewError> {
        self.dom.to_html(self.root_element)
    }

    pub fn take_patches(&mut self) -> Vec<DomPatch> {
        self.dom.take_patches()
    }

    /// Top-level DOM nodes rendered for a model node.
    pub fn dom_nodes_of(&self, node: NodeId) -> Option<&[DomNodeId]> {
        self.entries.get(&node).map(|entry| entry.dom.as_slice())
    }

    /// Current DOM text of a model node.
    pub fn dom_text_of(&self, node: NodeId) -> Result<String, ViewError> {
        let entry = self.entries.get(&node).ok_or(ViewError::MissingView(node))?;
        let mut text = String::new();
        for &dom in &entry.dom {
            text.push_str(&self.dom.text_content(dom)?);
        }
        Ok(text)
    }

    /// Model node whose view owns `dom`, walking up through wrapper elements.
    pub fn model_node_for_dom(&self, dom: DomNodeId) -> Option<NodeId> {
        let mut current = Some(dom);
        while let Some(id) = current {
            if let Some(&node) = self.owners.get(&id) {
                return Some(node);
            }
            current = self.dom.parent(id).ok().flatten();
        }
        None
    }

    /// Linear offset of a DOM position (`dom_offset` counts characters in a
    /// text node, child nodes in an element).
    pub fn offset_for_dom_position(
        &self,
        document: &Document,
        dom: DomNodeId,
        dom_offset: usize,
    ) -> Result<Option<usize>, ViewError> {
        let Some(node) = self.model_node_for_dom(dom) else {
            return Ok(None);
        };
        let model = document.node(node)?;
        let entry = self.entries.get(&node).ok_or(ViewError::MissingView(node))?;

        if model.is_text() {
            let start = document.node_range(node)?.start;
            let mut local = 0;
            for &top in &entry.dom {
                for text in self.dom.text_nodes(top)? {
                    if text == dom {
                        let offset = local + dom_offset.min(self.text_len(text)?);
                        return Ok(Some(start + offset.min(model.outer_length())));
                    }
                    local += self.text_len(text)?;
                }
            }
            return Ok(Some(start + dom_offset.min(model.outer_length())));
        }

        if entry.container == Some(dom) {
            let mut offset = document.inner_range(node)?.start;
            let mut seen = 0;
            for &child in &entry.children {
                let count = self.entries.get(&child).map_or(0, |e| e.dom.len());
                if seen + count > dom_offset {
                    break;
                }
                seen += count;
                offset += document.node(child)?.outer_length();
            }
            return Ok(Some(offset));
        }

        Ok(Some(document.node_range(node)?.start))
    }

    /// DOM position for a linear offset: a text node and character offset
    /// when the offset touches a text run, else a container and child index.
    pub fn dom_position_for_offset(
        &self,
        document: &Document,
        offset: usize,
    ) -> Result<Option<(DomNodeId, usize)>, ViewError> {
        let position = document.locate(offset)?;
        let node = document.node(position.node)?;

        if node.is_text() {
            return self.text_position(position.node, position.offset_in_node);
        }
        let Some(entry) = self.entries.get(&position.node) else {
            return Ok(None);
        };
        let Some(container) = entry.container else {
            return Ok(None);
        };

        let mut child_start = document.inner_range(position.node)?.start;
        let mut dom_index = 0;
        for &child in &entry.children {
            let child_node = document.node(child)?;
            let child_end = child_start + child_node.outer_length();
            if child_node.is_text() && child_end == offset {
                return self.text_position(child, child_node.outer_length());
            }
            if child_end > offset {
                break;
            }
            dom_index += self.entries.get(&child).map_or(0, |e| e.dom.len());
            child_start = child_end;
        }
        Ok(Some((container, dom_index)))
    }

    fn text_position(
        &self,
        node: NodeId,
        mut local: usize,
    ) -> Result<Option<(DomNodeId, usize)>, ViewError> {
        let Some(entry) = self.entries.get(&node) else {
            return Ok(None);
        };
        let mut last = None;
        for &top in &entry.dom {
            for text in self.dom.text_nodes(top)? {
                let len = self.text_len(text)?;
                if local <= len {
                    return Ok(Some((text, local)));
                }
                local -= len;
                last = Some((text, len));
            }
        }
        Ok(last)
    }

    fn text_len(&self, text: DomNodeId) -> Result<usize, ViewError> {
        Ok(self.dom.text_content(text)?.chars().count())
    }

    fn build_node(&mut self, document: &Document, id: NodeId) -> Result<Vec<DomNodeId>, ViewError> {
        let node = document.node(id)?;
        let kind = match self.registry.create(node.node_type(), node) {
            Ok(kind) => kind,
            Err(err) => return self.absorb(id, err.into()),
        };

        match kind {
            ViewKind::Branch(view) => {
                let element = self.dom.create_element(view.tag, view.attributes);
                let children = document.children(id)?.to_vec();
                // Register first so absorbed children still find their parent.
                self.entries.insert(
                    id,
                    ViewEntry {
                        dom: vec![element],
                        container: Some(element),
                        children: children.clone(),
                    },
                );
                self.owners.insert(element, id);
                for child in children {
                    for dom in self.build_node(document, child)? {
                        self.dom.append_child(element, dom)?;
                    }
                }
                Ok(vec![element])
            }
            ViewKind::Leaf(view) => match view.render(&mut self.dom, document, id) {
                Ok(dom) => {
                    for &node in &dom {
                        self.owners.insert(node, id);
                    }
                    self.entries.insert(
                        id,
                        ViewEntry {
                            dom: dom.clone(),
                            ..ViewEntry::default()
                        },
                    );
                    Ok(dom)
                }
                Err(err) => self.absorb(id, err),
            },
        }
    }

    /// Log a cosmetic failure and leave the node without DOM; anything else
    /// propagates.
    fn absorb(&mut self, id: NodeId, err: ViewError) -> Result<Vec<DomNodeId>, ViewError> {
        if !err.is_cosmetic() {
            return Err(err);
        }
        tracing::warn!(target: "folio::view", node = ?id, error = %err, "rendering without a view");
        self.absorbed += 1;
        self.entries.insert(id, ViewEntry::default());
        Ok(Vec::new())
    }

    /// Replace the DOM of the children named by `event`.
    pub fn apply_change(&mut self, document: &Document, event: &ChangeEvent) -> Result<(), ViewError> {
        let parent = event.parent;
        let entry = self
            .entries
            .get_mut(&parent)
            .ok_or(ViewError::MissingView(parent))?;
        let container = entry.container.ok_or(ViewError::MissingView(parent))?;

        let end = event.index + event.removed_count;
        let inserted = event.index..event.index + event.inserted_count;
        let new_children = document
            .children(parent)?
            .get(inserted.clone())
            .ok_or(ViewError::MissingView(parent))?
            .to_vec();
        if end > entry.children.len() {
            return Err(ViewError::MissingView(parent));
        }
        let removed: Vec<NodeId> = entry
            .children
            .splice(event.index..end, new_children.iter().copied())
            .collect();
        let following: Vec<NodeId> = entry.children[inserted.end..].to_vec();

        for id in removed {
            self.drop_entry(id, true)?;
        }

        let before = following
            .iter()
            .find_map(|child| self.entries.get(child).and_then(|e| e.dom.first().copied()));
        for id in new_children {
            for dom in self.build_node(document, id)? {
                self.dom.insert_before(container, dom, before)?;
            }
        }

        tracing::debug!(
            target: "folio::view",
            parent = ?parent,
            index = event.index,
            removed = event.removed_count,
            inserted = event.inserted_count,
            "view updated"
        );
        Ok(())
    }

    fn drop_entry(&mut self, id: NodeId, remove_dom: bool) -> Result<(), ViewError> {
        let Some(entry) = self.entries.remove(&id) else {
            return Ok(());
        };
        for dom in &entry.dom {
            self.owners.remove(dom);
            if remove_dom {
                self.dom.remove(*dom)?;
            }
        }
        for child in entry.children {
            self.drop_entry(child, false)?;
        }
        Ok(())
    }

    /// Whether every model node has a view entry and the root matches.
    pub fn is_aligned_with(&self, document: &Document) -> bool {
        let mut stack = vec![document.root()];
        while let Some(id) = stack.pop() {
            let Some(entry) = self.entries.get(&id) else {
                return false;
            };
            let Ok(children) = document.children(id) else {
                return false;
            };
            if entry.container.is_some() && entry.children != children {
                return false;
            }
            stack.extend_from_slice(children);
        }
        self.root == document.root()
    }
}

impl ChangeObserver for ContentEditableView {
    fn on_change(&mut self, document: &Document, event: &ChangeEvent) {
        let Err(err) = self.apply_change(document, event) else {
            return;
        };
        if err.is_cosmetic() {
            self.absorbed += 1;
            tracing::warn!(
                target: "folio::view",
                parent = ?event.parent,
                error = %err,
                "view update failed"
            );
        } else {
            self.failed += 1;
            tracing::error!(
                target: "folio::view",
                parent = ?event.parent,
                error = %err,
                "view out of sync with the model"
            );
        }
    }
}
