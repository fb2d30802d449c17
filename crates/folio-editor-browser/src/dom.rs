//! Arena DOM used by the view layer.
//!
//! The view never talks to a browser directly. It builds and edits this tree,
//! and every structural edit is also recorded as a [`DomPatch`] so a live
//! backend (see `mount`) can replay the same edits onto real nodes.
//!
//! Patch stream invariants:
//! - Patches are applied in order.
//! - Keys are never reused within one `DomTree`; slots are, under a new
//!   generation.
//! - `RemoveNode` lists every key released with the subtree; they are invalid
//!   for the rest of the stream.

use smol_str::SmolStr;

use crate::error::ViewError;

/// Stable key of a DOM node. Freed slots are reused under a new generation,
/// so a key never resolves again once its node is removed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomNodeId {
    index: u32,
    generation: u32,
}

impl DomNodeId {
    /// Reassemble a key stored outside the tree, e.g. on a live DOM node.
    pub fn from_parts(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DomNodeData {
    Element {
        tag: SmolStr,
        attributes: Vec<(SmolStr, SmolStr)>,
    },
    Text(String),
}

#[derive(Clone, Debug)]
struct DomNode {
    data: DomNodeData,
    parent: Option<DomNodeId>,
    children: Vec<DomNodeId>,
}

/// Incremental DOM patch operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DomPatch {
    CreateElement {
        key: DomNodeId,
        tag: SmolStr,
        attributes: Vec<(SmolStr, SmolStr)>,
    },
    CreateText {
        key: DomNodeId,
        text: String,
    },
    AppendChild {
        parent: DomNodeId,
        child: DomNodeId,
    },
    InsertBefore {
        parent: DomNodeId,
        child: DomNodeId,
        before: DomNodeId,
    },
    /// Detach `key` and drop its subtree.
    RemoveNode {
        key: DomNodeId,
        released: Vec<DomNodeId>,
    },
    SetText {
        key: DomNodeId,
        text: String,
    },
}

#[derive(Clone, Debug, Default)]
struct Slot {
    generation: u32,
    node: Option<DomNode>,
}

#[derive(Clone, Debug, Default)]
pub struct DomTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    patches: Vec<DomPatch>,
}

impl DomTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, id: DomNodeId) -> Result<&DomNode, ViewError> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(ViewError::MissingDomNode(id))
    }

    fn get_mut(&mut self, id: DomNodeId) -> Result<&mut DomNode, ViewError> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(ViewError::MissingDomNode(id))
    }

    fn alloc(&mut self, data: DomNodeData) -> DomNodeId {
        let node = DomNode {
            data,
            parent: None,
            children: Vec::new(),
        };
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.node = Some(node);
            return DomNodeId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        DomNodeId {
            index,
            generation: 0,
        }
    }

    /// Take `id` out of its slot and put the slot up for reuse.
    fn release(&mut self, id: DomNodeId) -> Option<DomNode> {
        let slot = self
            .slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)?;
        let node = slot.node.take()?;
        self.free.push(id.index);
        Some(node)
    }

    /// Allocated slots, live or free.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn create_element<K, V>(
        &mut self,
        tag: impl Into<SmolStr>,
        attributes: impl IntoIterator<Item = (K, V)>,
    ) -> DomNodeId
    where
        K: Into<SmolStr>,
        V: Into<SmolStr>,
    {
        let tag = tag.into();
        let attributes: Vec<(SmolStr, SmolStr)> = attributes
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let key = self.alloc(DomNodeData::Element {
            tag: tag.clone(),
            attributes: attributes.clone(),
        });
        self.patches.push(DomPatch::CreateElement {
            key,
            tag,
            attributes,
        });
        key
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> DomNodeId {
        let text = text.into();
        let key = self.alloc(DomNodeData::Text(text.clone()));
        self.patches.push(DomPatch::CreateText { key, text });
        key
    }

    pub fn contains(&self, id: DomNodeId) -> bool {
        self.get(id).is_ok()
    }

    pub fn data(&self, id: DomNodeId) -> Result<&DomNodeData, ViewError> {
        Ok(&self.get(id)?.data)
    }

    /// Tag name, `None` for text nodes.
    pub fn tag(&self, id: DomNodeId) -> Result<Option<&SmolStr>, ViewError> {
        Ok(match &self.get(id)?.data {
            DomNodeData::Element { tag, .. } => Some(tag),
            DomNodeData::Text(_) => None,
        })
    }

    pub fn parent(&self, id: DomNodeId) -> Result<Option<DomNodeId>, ViewError> {
        Ok(self.get(id)?.parent)
    }

    pub fn children(&self, id: DomNodeId) -> Result<&[DomNodeId], ViewError> {
        Ok(&self.get(id)?.children)
    }

    /// Append `child` to `parent`, detaching it from any previous parent.
    pub fn append_child(&mut self, parent: DomNodeId, child: DomNodeId) -> Result<(), ViewError> {
        self.attach(parent, child, None)?;
        self.patches.push(DomPatch::AppendChild { parent, child });
        Ok(())
    }

    /// Insert `child` before `before`, or append when `before` is `None`.
    pub fn insert_before(
        &mut self,
        parent: DomNodeId,
        child: DomNodeId,
        before: Option<DomNodeId>,
    ) -> Result<(), ViewError> {
        let Some(before) = before else {
            return self.append_child(parent, child);
        };
        self.attach(parent, child, Some(before))?;
        self.patches.push(DomPatch::InsertBefore {
            parent,
            child,
            before,
        });
        Ok(())
    }

    fn attach(
        &mut self,
        parent: DomNodeId,
        child: DomNodeId,
        before: Option<DomNodeId>,
    ) -> Result<(), ViewError> {
        self.get(child)?;
        self.detach(child)?;
        let node = self.get_mut(parent)?;
        let index = match before {
            Some(before) => node
                .children
                .iter()
                .position(|&c| c == before)
                .ok_or(ViewError::MissingDomNode(before))?,
            None => node.children.len(),
        };
        node.children.insert(index, child);
        self.get_mut(child)?.parent = Some(parent);
        Ok(())
    }

    fn detach(&mut self, child: DomNodeId) -> Result<(), ViewError> {
        if let Some(old_parent) = self.get_mut(child)?.parent.take() {
            self.get_mut(old_parent)?.children.retain(|&c| c != child);
        }
        Ok(())
    }

    /// Detach `id` and free its whole subtree.
    pub fn remove(&mut self, id: DomNodeId) -> Result<(), ViewError> {
        self.detach(id)?;
        let mut released = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.release(current) {
                stack.extend(node.children);
                if current != id {
                    released.push(current);
                }
            }
        }
        self.patches.push(DomPatch::RemoveNode { key: id, released });
        Ok(())
    }

    pub fn set_text(&mut self, id: DomNodeId, text: impl Into<String>) -> Result<(), ViewError> {
        let text = text.into();
        match &mut self.get_mut(id)?.data {
            DomNodeData::Text(current) => {
                current.clone_from(&text);
            }
            DomNodeData::Element { .. } => return Err(ViewError::NotText(id)),
        }
        self.patches.push(DomPatch::SetText { key: id, text });
        Ok(())
    }

    /// Concatenated text of the subtree.
    pub fn text_content(&self, id: DomNodeId) -> Result<String, ViewError> {
        let mut out = String::new();
        self.collect_text(id, &mut out)?;
        Ok(out)
    }

    fn collect_text(&self, id: DomNodeId, out: &mut String) -> Result<(), ViewError> {
        let node = self.get(id)?;
        match &node.data {
            DomNodeData::Text(text) => out.push_str(text),
            DomNodeData::Element { .. } => {
                for &child in &node.children {
                    self.collect_text(child, out)?;
                }
            }
        }
        Ok(())
    }

    /// Text nodes of the subtree in document order.
    pub fn text_nodes(&self, id: DomNodeId) -> Result<Vec<DomNodeId>, ViewError> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = self.get(current)?;
            match &node.data {
                DomNodeData::Text(_) => out.push(current),
                DomNodeData::Element { .. } => stack.extend(node.children.iter().rev()),
            }
        }
        Ok(out)
    }

    /// Serialize a subtree as HTML.
    pub fn to_html(&self, id: DomNodeId) -> Result<String, ViewError> {
        let mut out = String::new();
        self.write_html(id, &mut out)?;
        Ok(out)
    }

    fn write_html(&self, id: DomNodeId, out: &mut String) -> Result<(), ViewError> {
        let node = self.get(id)?;
        match &node.data {
            DomNodeData::Text(text) => escape_into(text, false, out),
            DomNodeData::Element { tag, attributes } => {
                out.push('<');
                out.push_str(tag);
                for (key, value) in attributes {
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    escape_into(value, true, out);
                    out.push('"');
                }
                out.push('>');
                if is_void(tag) {
                    return Ok(());
                }
                for &child in &node.children {
                    self.write_html(child, out)?;
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
        Ok(())
    }

    /// Drain the patches recorded since the last call.
    pub fn take_patches(&mut self) -> Vec<DomPatch> {
        std::mem::take(&mut self.patches)
    }

    pub fn pending_patches(&self) -> &[DomPatch] {
        &self.patches
    }
}

fn is_void(tag: &str) -> bool {
    matches!(tag, "img" | "hr" | "br")
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}
