//! Arena-backed node storage.
//!
//! Nodes reference their parent and children by [`NodeId`], never by pointer.
//! Ids are generational: once a node is freed its id never resolves again,
//! even if the slot is reused, so node identity can be compared across
//! rebuilds.

use smol_str::SmolStr;

use crate::linear::Attributes;
use crate::registry::NodeRules;

/// Type name used for coalesced character runs.
pub const TEXT_TYPE: &str = "text";

/// Stable handle to a node in a [`NodeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

/// Branch or leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Branch { children: Vec<NodeId> },
    Leaf,
}

/// One node of the document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub(crate) node_type: SmolStr,
    pub(crate) attributes: Attributes,
    pub(crate) rules: NodeRules,
    pub(crate) kind: NodeKind,
    /// Whether the node owns an open and a close tag. Text runs and the
    /// document root do not.
    pub(crate) delimited: bool,
    pub(crate) parent: Option<NodeId>,
    pub(crate) outer_length: usize,
}

/// What a model constructor receives.
#[derive(Debug, Clone, Copy)]
pub struct NodeSeed<'a> {
    pub node_type: &'a SmolStr,
    pub attributes: &'a Attributes,
    pub rules: NodeRules,
}

impl Node {
    /// Default model constructor: a branch or delimited leaf per the rules.
    pub fn from_seed(seed: NodeSeed<'_>) -> Node {
        let kind = if seed.rules.can_have_children {
            NodeKind::Branch {
                children: Vec::new(),
            }
        } else {
            NodeKind::Leaf
        };
        Node {
            node_type: seed.node_type.clone(),
            attributes: seed.attributes.clone(),
            rules: seed.rules,
            kind,
            delimited: true,
            parent: None,
            outer_length: 2,
        }
    }

    /// Character run of `length` elements.
    pub fn text(length: usize) -> Node {
        Node {
            node_type: SmolStr::new_static(TEXT_TYPE),
            attributes: Attributes::new(),
            rules: NodeRules::leaf(),
            kind: NodeKind::Leaf,
            delimited: false,
            parent: None,
            outer_length: length,
        }
    }

    pub fn node_type(&self) -> &SmolStr {
        &self.node_type
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(|v| v.as_str())
    }

    pub fn rules(&self) -> NodeRules {
        self.rules
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn is_branch(&self) -> bool {
        matches!(self.kind, NodeKind::Branch { .. })
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf) && !self.delimited
    }

    pub fn children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Branch { children } => children,
            NodeKind::Leaf => &[],
        }
    }

    /// Linear positions covered, delimiters included.
    pub fn outer_length(&self) -> usize {
        self.outer_length
    }

    /// Positions taken by this node's own open/close markers.
    pub fn delimiter_length(&self) -> usize {
        if self.delimited { 2 } else { 0 }
    }

    /// Positions between the open and close markers.
    pub fn inner_length(&self) -> usize {
        self.outer_length - self.delimiter_length()
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Slot storage for nodes with a free list.
#[derive(Debug, Clone, Default)]
pub struct NodeArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: Node) -> NodeId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.node = Some(node);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId {
            index,
            generation: 0,
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Free `id` and its whole subtree. Returns the number of nodes freed.
    pub fn remove_subtree(&mut self, id: NodeId) -> usize {
        let mut stack = vec![id];
        let mut freed = 0;
        while let Some(current) = stack.pop() {
            let Some(slot) = self.slots.get_mut(current.index as usize) else {
                continue;
            };
            if slot.generation != current.generation {
                continue;
            }
            if let Some(node) = slot.node.take() {
                if let NodeKind::Branch { children } = node.kind {
                    stack.extend(children);
                }
                self.free.push(current.index);
                self.live -= 1;
                freed += 1;
            }
        }
        freed
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}
