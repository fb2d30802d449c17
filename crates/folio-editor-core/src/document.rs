//! The document: linear data plus the tree index over it.
//!
//! The tree is a cache. Every node's outer length is the number of linear
//! positions it spans, so any node's offset can be recovered by summing the
//! lengths of its preceding siblings and ancestors. [`Document::rebuild_nodes`]
//! is the only way the tree changes after construction.

use std::ops::Range;

use smol_str::SmolStr;

use crate::config::DuplicatePolicy;
use crate::error::ModelError;
use crate::linear::{Attributes, Element, LinearData};
use crate::registry::{NodeRegistry, NodeRules};
use crate::sync::ChangeEvent;
use crate::tree::{Node, NodeArena, NodeId, NodeKind, NodeSeed};

/// Type name of the document root.
pub const ROOT_TYPE: &str = "document";

/// Model constructor capability.
pub type ModelCtor = fn(NodeSeed<'_>) -> Node;

/// Registry used by the data model.
pub type ModelRegistry = NodeRegistry<ModelCtor>;

impl NodeRegistry<ModelCtor> {
    /// Registry with the built-in block and leaf types.
    pub fn with_defaults(policy: DuplicatePolicy) -> Result<Self, ModelError> {
        let mut registry = Self::new(policy);
        let ctor: ModelCtor = Node::from_seed;
        registry.register(ROOT_TYPE, NodeRules::container(), ctor)?;
        for name in ["paragraph", "heading", "preformatted"] {
            registry.register(name, NodeRules::branch(), ctor)?;
        }
        for name in ["div", "table", "tableRow", "tableCell", "list"] {
            registry.register(name, NodeRules::container(), ctor)?;
        }
        registry.register("listItem", NodeRules::container().splittable(true), ctor)?;
        for name in ["image", "horizontalRule"] {
            registry.register(name, NodeRules::leaf(), ctor)?;
        }
        Ok(registry)
    }
}

/// A node covering a linear offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub node: NodeId,
    /// Distance from the node's first position (its open tag, if any).
    pub offset_in_node: usize,
}

/// Linear data, tree index and the registry that types it.
#[derive(Debug, Clone)]
pub struct Document {
    data: LinearData,
    arena: NodeArena,
    root: NodeId,
    registry: ModelRegistry,
}

impl Document {
    /// Build a document and index all of `elements`.
    pub fn new(elements: Vec<Element>, registry: ModelRegistry) -> Result<Self, ModelError> {
        let mut arena = NodeArena::new();
        let root = arena.insert(Node {
            node_type: SmolStr::new_static(ROOT_TYPE),
            attributes: Attributes::new(),
            rules: NodeRules::container(),
            kind: NodeKind::Branch {
                children: Vec::new(),
            },
            delimited: false,
            parent: None,
            outer_length: 0,
        });

        let mut document = Self {
            data: LinearData::new(elements),
            arena,
            root,
            registry,
        };
        let len = document.data.len();
        document.rebuild_nodes(root, 0, 0, 0, len)?;
        Ok(document)
    }

    /// Document with the default registry.
    pub fn from_elements(elements: Vec<Element>) -> Result<Self, ModelError> {
        Self::new(
            elements,
            ModelRegistry::with_defaults(DuplicatePolicy::default())?,
        )
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn data(&self) -> &LinearData {
        &self.data
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Length of the linear data.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get_data(&self, range: Range<usize>) -> Result<&[Element], ModelError> {
        self.data.get_data(range)
    }

    /// Plain text of the whole document.
    pub fn text_content(&self) -> String {
        self.data
            .elements()
            .iter()
            .filter_map(Element::as_char)
            .collect()
    }

    /// Splice the linear data only. The tree is stale for the affected
    /// region until it is rebuilt; [`crate::DocumentSynchronizer`] does both.
    pub fn splice(
        &mut self,
        offset: usize,
        remove: usize,
        insert: Vec<Element>,
    ) -> Result<Vec<Element>, ModelError> {
        self.data.splice(offset, remove, insert)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, ModelError> {
        self.arena.get(id).ok_or(ModelError::MissingNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.arena.contains(id)
    }

    pub fn children(&self, id: NodeId) -> Result<&[NodeId], ModelError> {
        Ok(self.node(id)?.children())
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, ModelError> {
        Ok(self.node(id)?.parent)
    }

    /// Number of live nodes, root included.
    pub fn node_count(&self) -> usize {
        self.arena.len()
    }

    /// Offset of the node's first position.
    pub fn offset_of(&self, id: NodeId) -> Result<usize, ModelError> {
        let mut offset = 0;
        let mut current = id;
        while let Some(parent) = self.node(current)?.parent {
            let parent_node = self.node(parent)?;
            for &sibling in parent_node.children() {
                if sibling == current {
                    break;
                }
                offset += self.node(sibling)?.outer_length;
            }
            offset += parent_node.delimiter_length() / 2;
            current = parent;
        }
        Ok(offset)
    }

    /// Outer range of a node.
    pub fn node_range(&self, id: NodeId) -> Result<Range<usize>, ModelError> {
        let start = self.offset_of(id)?;
        Ok(start..start + self.node(id)?.outer_length)
    }

    /// Range between a node's open and close tags.
    pub fn inner_range(&self, id: NodeId) -> Result<Range<usize>, ModelError> {
        let outer = self.node_range(id)?;
        let half = self.node(id)?.delimiter_length() / 2;
        Ok(outer.start + half..outer.end - half)
    }

    /// Deepest node whose outer range covers `offset`.
    ///
    /// The end of the document resolves to the root.
    pub fn locate(&self, offset: usize) -> Result<Position, ModelError> {
        let root_len = self.node(self.root)?.outer_length;
        if offset > root_len {
            return Err(ModelError::range(offset, offset, root_len));
        }

        let mut node = self.root;
        let mut start = 0;
        'descend: loop {
            let current = self.node(node)?;
            let mut child_start = start + current.delimiter_length() / 2;
            for &child in current.children() {
                let child_len = self.node(child)?.outer_length;
                if offset >= child_start && offset < child_start + child_len {
                    node = child;
                    start = child_start;
                    continue 'descend;
                }
                child_start += child_len;
            }
            return Ok(Position {
                node,
                offset_in_node: offset - start,
            });
        }
    }

    /// Deepest branch whose inner range contains `offset` (ends inclusive).
    pub fn branch_at(&self, offset: usize) -> Result<NodeId, ModelError> {
        let root_len = self.node(self.root)?.outer_length;
        if offset > root_len {
            return Err(ModelError::range(offset, offset, root_len));
        }

        let mut branch = self.root;
        let mut inner_start = 0;
        'descend: loop {
            let mut child_start = inner_start;
            for &child in self.node(branch)?.children() {
                let node = self.node(child)?;
                let inner = child_start + 1..child_start + node.outer_length - 1;
                if node.is_branch() && node.delimited && inner.start <= offset && offset <= inner.end
                {
                    branch = child;
                    inner_start = inner.start;
                    continue 'descend;
                }
                child_start += node.outer_length;
            }
            return Ok(branch);
        }
    }

    /// Replace `old_child_count` children of `parent` starting at
    /// `child_index` with nodes parsed from `[new_offset, new_offset +
    /// new_length)`, then propagate the length delta to the root.
    ///
    /// `new_offset` must be where the child at `child_index` starts. On error
    /// the tree is left untouched.
    pub fn rebuild_nodes(
        &mut self,
        parent: NodeId,
        child_index: usize,
        old_child_count: usize,
        new_offset: usize,
        new_length: usize,
    ) -> Result<ChangeEvent, ModelError> {
        let parent_node = self.node(parent)?;
        if !parent_node.is_branch() {
            return Err(ModelError::Alignment {
                offset: new_offset,
                reason: "rebuild parent is not a branch",
            });
        }
        let siblings = parent_node.children();
        if child_index + old_child_count > siblings.len() {
            return Err(ModelError::Alignment {
                offset: new_offset,
                reason: "child range exceeds the parent's children",
            });
        }

        let mut expected = self.offset_of(parent)? + parent_node.delimiter_length() / 2;
        for &sibling in &siblings[..child_index] {
            expected += self.node(sibling)?.outer_length;
        }
        if expected != new_offset {
            return Err(ModelError::Alignment {
                offset: new_offset,
                reason: "region does not start at a child boundary",
            });
        }

        let mut old_length = 0;
        for &old in &siblings[child_index..child_index + old_child_count] {
            old_length += self.node(old)?.outer_length;
        }
        let parent_rules = parent_node.rules;
        let parent_type = parent_node.node_type.clone();

        let end = new_offset
            .checked_add(new_length)
            .ok_or_else(|| ModelError::range(new_offset, usize::MAX, self.data.len()))?;
        let fresh = parse_region(
            &self.data,
            &mut self.arena,
            &self.registry,
            (&parent_type, parent_rules),
            new_offset..end,
        )?;
        let inserted_count = fresh.len();
        for &child in &fresh {
            if let Some(node) = self.arena.get_mut(child) {
                node.parent = Some(parent);
            }
        }

        let removed = match self.arena.get_mut(parent).map(|n| &mut n.kind) {
            Some(NodeKind::Branch { children }) => children
                .splice(child_index..child_index + old_child_count, fresh)
                .collect::<Vec<_>>(),
            _ => return Err(ModelError::MissingNode(parent)),
        };
        for old in removed {
            self.arena.remove_subtree(old);
        }

        let length_delta = new_length as isize - old_length as isize;
        let mut ancestor = Some(parent);
        while let Some(id) = ancestor {
            let node = self.arena.get_mut(id).ok_or(ModelError::MissingNode(id))?;
            node.outer_length = node.outer_length.saturating_add_signed(length_delta);
            ancestor = node.parent;
        }

        tracing::debug!(
            target: "folio::tree",
            parent = ?parent,
            child_index,
            old_child_count,
            inserted_count,
            new_offset,
            new_length,
            length_delta,
            "rebuilt nodes"
        );

        Ok(ChangeEvent {
            parent,
            index: child_index,
            removed_count: old_child_count,
            inserted_count,
            length_delta,
        })
    }

    /// Verify lengths, parent links, coalescing, type rules and that every
    /// node lines up with its tags in the linear data.
    pub fn check_invariants(&self) -> Result<(), ModelError> {
        let root = self.node(self.root)?;
        if root.outer_length != self.data.len() {
            return Err(ModelError::structure(
                root.outer_length,
                format!(
                    "root spans {} positions but data has {}",
                    root.outer_length,
                    self.data.len()
                ),
            ));
        }
        self.check_node(self.root, 0)
    }

    fn check_node(&self, id: NodeId, offset: usize) -> Result<(), ModelError> {
        let node = self.node(id)?;
        if node.delimited {
            match (self.data.get(offset), self.data.get(offset + node.outer_length - 1)) {
                (
                    Some(Element::Open { node_type: open, .. }),
                    Some(Element::Close { node_type: close }),
                ) if *open == node.node_type && *close == node.node_type => {}
                _ => {
                    return Err(ModelError::structure(
                        offset,
                        format!("`{}` does not line up with its tags", node.node_type),
                    ));
                }
            }
        }

        match &node.kind {
            NodeKind::Leaf => {
                if node.is_text() && node.outer_length == 0 {
                    return Err(ModelError::structure(offset, "empty text run"));
                }
                Ok(())
            }
            NodeKind::Branch { children } => {
                let mut child_offset = offset + node.delimiter_length() / 2;
                let mut total = node.delimiter_length();
                let mut previous_text = false;
                for &child in children {
                    let child_node = self.node(child)?;
                    if child_node.parent != Some(id) {
                        return Err(ModelError::structure(child_offset, "broken parent link"));
                    }
                    if previous_text && child_node.is_text() {
                        return Err(ModelError::structure(child_offset, "adjacent text runs"));
                    }
                    if !node.rules.can_have_grandchildren && child_node.is_branch() {
                        return Err(ModelError::structure(
                            child_offset,
                            format!(
                                "`{}` cannot contain `{}`",
                                node.node_type, child_node.node_type
                            ),
                        ));
                    }
                    previous_text = child_node.is_text();
                    self.check_node(child, child_offset)?;
                    child_offset += child_node.outer_length;
                    total += child_node.outer_length;
                }
                if total != node.outer_length {
                    return Err(ModelError::structure(
                        offset,
                        format!(
                            "`{}` has outer length {} but its parts sum to {}",
                            node.node_type, node.outer_length, total
                        ),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Parse `range` into detached nodes for a parent with the given type and
/// rules. Nodes created before an error are freed again.
fn parse_region(
    data: &LinearData,
    arena: &mut NodeArena,
    registry: &ModelRegistry,
    parent: (&SmolStr, NodeRules),
    range: Range<usize>,
) -> Result<Vec<NodeId>, ModelError> {
    let elements = data.get_data(range.clone())?;
    let mut top_level = Vec::new();
    let result = parse_into(elements, range.start, arena, registry, parent, &mut top_level);
    match result {
        Ok(()) => Ok(top_level),
        Err(err) => {
            for id in top_level {
                arena.remove_subtree(id);
            }
            Err(err)
        }
    }
}

struct OpenNode {
    id: NodeId,
    start: usize,
}

fn parse_into(
    elements: &[Element],
    base: usize,
    arena: &mut NodeArena,
    registry: &ModelRegistry,
    (parent_type, parent_rules): (&SmolStr, NodeRules),
    top_level: &mut Vec<NodeId>,
) -> Result<(), ModelError> {
    let mut stack: Vec<OpenNode> = Vec::new();
    let mut i = 0;

    while i < elements.len() {
        let offset = base + i;
        let (container_type, container_rules, container_is_leaf) = match stack.last() {
            Some(open) => {
                let node = arena.get(open.id).ok_or(ModelError::MissingNode(open.id))?;
                (node.node_type.clone(), node.rules, !node.is_branch())
            }
            None => (parent_type.clone(), parent_rules, false),
        };

        match &elements[i] {
            Element::Char { .. } => {
                let run = elements[i..]
                    .iter()
                    .take_while(|e| e.is_char())
                    .count();
                if container_is_leaf || !container_rules.can_have_children {
                    return Err(ModelError::structure(
                        offset,
                        format!("`{container_type}` cannot contain text"),
                    ));
                }
                let text = arena.insert(Node::text(run));
                attach(arena, &stack, top_level, text);
                i += run;
            }
            Element::Open {
                node_type,
                attributes,
            } => {
                if container_is_leaf || !container_rules.can_have_children {
                    return Err(ModelError::structure(
                        offset,
                        format!("`{container_type}` cannot contain `{node_type}`"),
                    ));
                }
                let rules = registry.rules(node_type)?;
                if rules.can_have_children && !container_rules.can_have_grandchildren {
                    return Err(ModelError::structure(
                        offset,
                        format!("`{container_type}` cannot contain `{node_type}`"),
                    ));
                }
                let node = registry.create(
                    node_type,
                    NodeSeed {
                        node_type,
                        attributes,
                        rules,
                    },
                )?;
                let id = arena.insert(node);
                attach(arena, &stack, top_level, id);
                stack.push(OpenNode { id, start: offset });
                i += 1;
            }
            Element::Close { node_type } => {
                let Some(open) = stack.pop() else {
                    return Err(ModelError::Alignment {
                        offset,
                        reason: "closes a node opened outside the region",
                    });
                };
                let node = arena.get_mut(open.id).ok_or(ModelError::MissingNode(open.id))?;
                if node.node_type != *node_type {
                    return Err(ModelError::structure(
                        offset,
                        format!("`{}` closed by `{}`", node.node_type, node_type),
                    ));
                }
                node.outer_length = offset - open.start + 1;
                i += 1;
            }
        }
    }

    if let Some(open) = stack.last() {
        return Err(ModelError::Alignment {
            offset: open.start,
            reason: "node is not closed within the region",
        });
    }
    Ok(())
}

fn attach(arena: &mut NodeArena, stack: &[OpenNode], top_level: &mut Vec<NodeId>, child: NodeId) {
    match stack.last() {
        Some(open) => {
            if let Some(node) = arena.get_mut(child) {
                node.parent = Some(open.id);
            }
            if let Some(Node {
                kind: NodeKind::Branch { children },
                ..
            }) = arena.get_mut(open.id)
            {
                children.push(child);
            }
        }
        None => top_level.push(child),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn paragraph(text: &str) -> Vec<Element> {
        Element::wrap("paragraph", Element::text(text))
    }

    /// Indented `type(outer length)` outline of the tree.
    fn outline(doc: &Document) -> String {
        fn walk(doc: &Document, id: NodeId, depth: usize, out: &mut String) {
            let node = doc.node(id).unwrap();
            out.push_str(&"  ".repeat(depth));
            out.push_str(&format!("{}({})\n", node.node_type(), node.outer_length()));
            for &child in node.children() {
                walk(doc, child, depth + 1, out);
            }
        }
        let mut out = String::new();
        walk(doc, doc.root(), 0, &mut out);
        out.trim_end().to_string()
    }

    fn table_doc() -> Document {
        let mut cell = paragraph("ab");
        cell.extend(paragraph("c"));
        let cell = Element::wrap("tableCell", cell);
        let row = Element::wrap("tableRow", cell);
        let mut data = Element::wrap("table", row);
        data.extend(paragraph("xyz"));
        Document::from_elements(data).unwrap()
    }

    #[test]
    fn test_single_paragraph() {
        let doc = Document::from_elements(paragraph("abc")).unwrap();
        let root = doc.node(doc.root()).unwrap();
        assert_eq!(root.outer_length(), 5);
        assert_eq!(root.children().len(), 1);

        let para = doc.node(root.children()[0]).unwrap();
        assert_eq!(para.node_type(), "paragraph");
        assert!(para.is_branch());
        assert_eq!(para.children().len(), 1);

        let text = doc.node(para.children()[0]).unwrap();
        assert!(text.is_text());
        assert_eq!(text.outer_length(), 3);
        doc.check_invariants().unwrap();
    }

    #[test]
    fn test_rebuild_whole_range_reproduces_tree() {
        let mut doc = Document::from_elements(paragraph("abc")).unwrap();
        let root = doc.root();
        let event = doc.rebuild_nodes(root, 0, 1, 0, 5).unwrap();
        assert_eq!(event.removed_count, 1);
        assert_eq!(event.inserted_count, 1);
        assert_eq!(event.length_delta, 0);
        insta::assert_snapshot!(outline(&doc), @r"
        document(5)
          paragraph(5)
            text(3)
        ");
        doc.check_invariants().unwrap();
    }

    #[test]
    fn test_nested_outline() {
        let doc = table_doc();
        insta::assert_snapshot!(outline(&doc), @r"
        document(18)
          table(13)
            tableRow(11)
              tableCell(9)
                paragraph(4)
                  text(2)
                paragraph(3)
                  text(1)
          paragraph(5)
            text(3)
        ");
        doc.check_invariants().unwrap();
    }

    #[test]
    fn test_offset_of_and_locate() {
        let doc = table_doc();
        let table = doc.children(doc.root()).unwrap()[0];
        let row = doc.children(table).unwrap()[0];
        let cell = doc.children(row).unwrap()[0];
        let second_para = doc.children(cell).unwrap()[1];

        assert_eq!(doc.offset_of(table).unwrap(), 0);
        assert_eq!(doc.offset_of(row).unwrap(), 1);
        assert_eq!(doc.offset_of(cell).unwrap(), 2);
        assert_eq!(doc.offset_of(second_para).unwrap(), 7);
        assert_eq!(doc.inner_range(second_para).unwrap(), 8..9);

        let pos = doc.locate(8).unwrap();
        assert_eq!(doc.node(pos.node).unwrap().node_type(), "text");
        assert_eq!(pos.offset_in_node, 0);

        // The close tag of the paragraph belongs to the paragraph.
        let pos = doc.locate(9).unwrap();
        assert_eq!(pos.node, second_para);
        assert_eq!(pos.offset_in_node, 2);

        // End of document resolves to the root.
        let pos = doc.locate(18).unwrap();
        assert_eq!(pos.node, doc.root());
        assert!(doc.locate(19).is_err());
    }

    #[test]
    fn test_offset_round_trip_every_position() {
        let doc = table_doc();
        for offset in 0..=doc.len() {
            let pos = doc.locate(offset).unwrap();
            assert_eq!(doc.offset_of(pos.node).unwrap() + pos.offset_in_node, offset);
        }
    }

    #[test]
    fn test_branch_at() {
        let doc = table_doc();
        let table = doc.children(doc.root()).unwrap()[0];
        // Between the table and the last paragraph.
        assert_eq!(doc.branch_at(13).unwrap(), doc.root());
        // Inside the first cell paragraph.
        let cell = doc.children(doc.children(table).unwrap()[0]).unwrap()[0];
        let first_para = doc.children(cell).unwrap()[0];
        assert_eq!(doc.branch_at(4).unwrap(), first_para);
        assert_eq!(doc.branch_at(6).unwrap(), first_para);
        assert_eq!(doc.branch_at(3).unwrap(), cell);
        // Between the two cell paragraphs.
        assert_eq!(doc.branch_at(7).unwrap(), cell);
    }

    #[test]
    fn test_rebuild_is_minimal() {
        let mut data = paragraph("ab");
        data.extend(paragraph("cd"));
        data.extend(paragraph("ef"));
        let mut doc = Document::from_elements(data).unwrap();
        let before: Vec<NodeId> = doc.children(doc.root()).unwrap().to_vec();
        let first_text = doc.children(before[0]).unwrap()[0];
        let last_text = doc.children(before[2]).unwrap()[0];

        // "cd" -> "cxd" inside the middle paragraph.
        doc.splice(6, 0, Element::text("x")).unwrap();
        let middle = before[1];
        let event = doc.rebuild_nodes(middle, 0, 1, 5, 3).unwrap();
        assert_eq!(event.length_delta, 1);

        let after = doc.children(doc.root()).unwrap();
        assert_eq!(after, &before[..]);
        assert_eq!(doc.children(before[0]).unwrap()[0], first_text);
        assert_eq!(doc.children(before[2]).unwrap()[0], last_text);
        assert_eq!(doc.node(middle).unwrap().outer_length(), 5);
        assert_eq!(doc.node(doc.root()).unwrap().outer_length(), 13);
        doc.check_invariants().unwrap();
    }

    #[test]
    fn test_rebuild_empty_region_negative_delta() {
        let mut data = paragraph("ab");
        data.extend(paragraph("cd"));
        let mut doc = Document::from_elements(data).unwrap();
        let root = doc.root();

        doc.splice(4, 4, vec![]).unwrap();
        let event = doc.rebuild_nodes(root, 1, 1, 4, 0).unwrap();
        assert_eq!(event.inserted_count, 0);
        assert_eq!(event.length_delta, -4);
        assert_eq!(doc.node(root).unwrap().outer_length(), 4);
        doc.check_invariants().unwrap();
    }

    #[test]
    fn test_rebuild_misaligned_start() {
        let mut doc = Document::from_elements(paragraph("abc")).unwrap();
        let root = doc.root();
        let err = doc.rebuild_nodes(root, 0, 1, 1, 3).unwrap_err();
        assert!(matches!(err, ModelError::Alignment { offset: 1, .. }));
    }

    #[test]
    fn test_rebuild_partial_node_is_alignment_error() {
        let mut data = paragraph("ab");
        data.extend(paragraph("cd"));
        let mut doc = Document::from_elements(data).unwrap();
        let root = doc.root();
        let nodes_before = doc.node_count();

        // Region stops in the middle of the second paragraph.
        let err = doc.rebuild_nodes(root, 0, 2, 0, 6).unwrap_err();
        assert!(matches!(err, ModelError::Alignment { offset: 4, .. }));
        // Tree untouched, nothing leaked.
        assert_eq!(doc.node_count(), nodes_before);
        doc.check_invariants().unwrap();
    }

    #[test]
    fn test_mismatched_close_is_structure_error() {
        let data = vec![
            Element::open("paragraph"),
            Element::char('a'),
            Element::close("heading"),
        ];
        let err = Document::from_elements(data).unwrap_err();
        assert!(matches!(err, ModelError::Structure { offset: 2, .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_paragraph_cannot_contain_paragraph() {
        let data = Element::wrap("paragraph", paragraph("a"));
        let err = Document::from_elements(data).unwrap_err();
        assert!(matches!(err, ModelError::Structure { offset: 1, .. }));
    }

    #[test]
    fn test_unknown_type_in_data() {
        let data = Element::wrap("marquee", Element::text("hi"));
        let err = Document::from_elements(data).unwrap_err();
        assert_eq!(
            err,
            ModelError::UnknownType {
                type_name: "marquee".into()
            }
        );
    }

    #[test]
    fn test_delimited_leaf() {
        let mut content = Element::text("a");
        content.extend([
            Element::open_with("image", [("src", "cat.png")]),
            Element::close("image"),
        ]);
        content.extend(Element::text("b"));
        let doc = Document::from_elements(Element::wrap("paragraph", content)).unwrap();
        let para = doc.children(doc.root()).unwrap()[0];
        let kids = doc.children(para).unwrap();
        assert_eq!(kids.len(), 3);
        let image = doc.node(kids[1]).unwrap();
        assert_eq!(image.kind(), &NodeKind::Leaf);
        assert_eq!(image.outer_length(), 2);
        assert_eq!(image.attribute("src"), Some("cat.png"));
        doc.check_invariants().unwrap();
    }

    #[test]
    fn test_text_inside_delimited_leaf_is_structure_error() {
        let data = Element::wrap(
            "paragraph",
            vec![
                Element::open("image"),
                Element::char('x'),
                Element::close("image"),
            ],
        );
        let err = Document::from_elements(data).unwrap_err();
        assert_eq!(
            err,
            ModelError::Structure {
                offset: 2,
                reason: "`image` cannot contain text".into()
            }
        );
    }

    proptest! {
        #[test]
        fn prop_lengths_and_offsets(texts in prop::collection::vec("[a-z]{0,6}", 1..6)) {
            let data: Vec<Element> = texts.iter().flat_map(|t| paragraph(t)).collect();
            let doc = Document::from_elements(data).unwrap();
            prop_assert!(doc.check_invariants().is_ok());
            prop_assert_eq!(doc.node(doc.root()).unwrap().outer_length(), doc.len());
            for offset in 0..=doc.len() {
                let pos = doc.locate(offset).unwrap();
                prop_assert_eq!(doc.offset_of(pos.node).unwrap() + pos.offset_in_node, offset);
            }
        }
    }
}
