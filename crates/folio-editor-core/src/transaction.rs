//! Transactions over the linear data.
//!
//! A transaction is a sequence of retain, insert and remove operations. It is
//! built against a document, applied by queueing each splice on a
//! synchronizer, and inverted from the elements the splices will remove.

use std::ops::Range;

use smol_str::SmolStr;

use crate::document::Document;
use crate::registry::NodeRules;
use crate::error::ModelError;
use crate::linear::{Annotations, Element};
use crate::sync::DocumentSynchronizer;
use crate::tree::NodeId;

/// Which side of an insertion an offset sticks to.
#[derive(Clone, Debug, Copy, PartialEq, Eq, Default)]
pub enum Affinity {
    /// Stay before text inserted exactly at the offset.
    #[default]
    Before,
    /// Move past text inserted exactly at the offset.
    After,
}

/// Whether [`Transaction::annotate`] adds or strips an annotation.
#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum AnnotationMethod {
    Set,
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Keep `n` elements.
    Retain(usize),
    /// Insert elements at the current position.
    Insert(Vec<Element>),
    /// Remove `n` elements.
    Remove(usize),
}

/// Ordered operations plus the lengths they expect and produce.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    operations: Vec<Operation>,
    len_before: usize,
    len_after: usize,
}

impl Transaction {
    pub fn builder() -> TransactionBuilder {
        TransactionBuilder::default()
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Elements retained or removed, i.e. the minimum document length this
    /// transaction can be applied to.
    pub fn len_before(&self) -> usize {
        self.len_before
    }

    pub fn length_delta(&self) -> isize {
        self.len_after as isize - self.len_before as isize
    }

    /// True when applying the transaction changes nothing.
    pub fn is_noop(&self) -> bool {
        self.operations
            .iter()
            .all(|op| matches!(op, Operation::Retain(_)))
    }

    /// Insert plain text at `offset`, inheriting the annotations of the
    /// character before it. Text inserted directly into a container that only
    /// holds blocks is wrapped in a paragraph.
    pub fn insert_text(document: &Document, offset: usize, text: &str) -> Result<Self, ModelError> {
        Self::replace_text(document, offset..offset, text)
    }

    /// Replace `range` with plain text, as [`Transaction::insert_text`] does
    /// at `range.start`. The removal is checked like [`Transaction::remove_range`].
    pub fn replace_text(
        document: &Document,
        range: Range<usize>,
        text: &str,
    ) -> Result<Self, ModelError> {
        check_offset(document, range.start)?;
        if !range.is_empty() {
            check_removal(document, range.clone())?;
        }
        let annotations = match range.start.checked_sub(1).and_then(|o| document.data().get(o)) {
            Some(Element::Char { annotations, .. }) => annotations.clone(),
            _ => Annotations::new(),
        };
        let mut content = Element::annotated_text(text, &annotations);

        let branch = document.node(document.branch_at(range.start)?)?;
        if branch.rules().can_have_grandchildren && !content.is_empty() {
            content = Element::wrap("paragraph", content);
        }
        check_insertion(document, range.start, &content)?;

        Ok(Self::builder()
            .retain(range.start)
            .remove(range.len())
            .insert(content)
            .build())
    }

    /// Insert whole nodes or characters at `offset`. The elements must nest
    /// properly and be allowed where they land.
    pub fn insert_elements(
        document: &Document,
        offset: usize,
        elements: Vec<Element>,
    ) -> Result<Self, ModelError> {
        check_offset(document, offset)?;
        check_insertion(document, offset, &elements)?;
        Ok(Self::builder().retain(offset).insert(elements).build())
    }

    /// Remove `range`, refusing removals that would join unlike nodes.
    pub fn remove_range(document: &Document, range: Range<usize>) -> Result<Self, ModelError> {
        check_removal(document, range.clone())?;
        Ok(Self::builder()
            .retain(range.start)
            .remove(range.len())
            .build())
    }

    /// Elements inserted by this transaction, in order.
    pub fn inserted(&self) -> impl Iterator<Item = &Element> {
        self.operations.iter().flat_map(|op| match op {
            Operation::Insert(elements) => elements.as_slice(),
            _ => &[],
        })
    }

    /// Split the innermost branch at `offset` into two nodes of the same type
    /// and attributes. `None` if that branch cannot be split.
    pub fn split_at(document: &Document, offset: usize) -> Result<Option<Self>, ModelError> {
        let id = document.branch_at(offset)?;
        if id == document.root() {
            return Ok(None);
        }
        let node = document.node(id)?;
        if !node.rules().can_be_split {
            return Ok(None);
        }
        let split = vec![
            Element::close(node.node_type().clone()),
            Element::Open {
                node_type: node.node_type().clone(),
                attributes: node.attributes().clone(),
            },
        ];
        Ok(Some(Self::builder().retain(offset).insert(split).build()))
    }

    /// Set or clear one attribute on a node's open tag.
    pub fn set_attribute(
        document: &Document,
        node: NodeId,
        key: &str,
        value: Option<&str>,
    ) -> Result<Self, ModelError> {
        let offset = document.offset_of(node)?;
        let Some(Element::Open {
            node_type,
            attributes,
        }) = document.data().get(offset)
        else {
            return Err(ModelError::Alignment {
                offset,
                reason: "node has no open tag",
            });
        };
        let mut attributes = attributes.clone();
        match value {
            Some(value) => {
                attributes.insert(SmolStr::new(key), SmolStr::new(value));
            }
            None => {
                attributes.remove(key);
            }
        }
        let open = Element::Open {
            node_type: node_type.clone(),
            attributes,
        };
        Ok(Self::builder()
            .retain(offset)
            .remove(1)
            .insert(vec![open])
            .build())
    }

    /// Add or remove an annotation on every character in `range`.
    pub fn annotate(
        document: &Document,
        range: Range<usize>,
        annotation: &str,
        method: AnnotationMethod,
    ) -> Result<Self, ModelError> {
        let elements = document.get_data(range.clone())?;
        let mut builder = Self::builder().retain(range.start);
        let mut run: Vec<Element> = Vec::new();

        for element in elements {
            let changed = match element {
                Element::Char { ch, annotations } => {
                    let has = annotations.contains(annotation);
                    match (method, has) {
                        (AnnotationMethod::Set, false) => {
                            let mut annotations = annotations.clone();
                            annotations.insert(SmolStr::new(annotation));
                            Some(Element::Char { ch: *ch, annotations })
                        }
                        (AnnotationMethod::Clear, true) => {
                            let mut annotations = annotations.clone();
                            annotations.remove(annotation);
                            Some(Element::Char { ch: *ch, annotations })
                        }
                        _ => None,
                    }
                }
                _ => None,
            };
            match changed {
                Some(element) => run.push(element),
                None => {
                    if !run.is_empty() {
                        let replaced = run.len();
                        builder = builder.remove(replaced).insert(std::mem::take(&mut run));
                    }
                    builder = builder.retain(1);
                }
            }
        }
        if !run.is_empty() {
            let replaced = run.len();
            builder = builder.remove(replaced).insert(run);
        }
        Ok(builder.build())
    }

    /// Map an offset in the document before this transaction to the document
    /// after it. Offsets inside a removed span collapse to its start.
    pub fn map_offset(&self, offset: usize, affinity: Affinity) -> usize {
        let mut old_pos = 0;
        let mut new_pos = 0;

        for op in &self.operations {
            if old_pos > offset {
                break;
            }
            match op {
                Operation::Retain(n) => {
                    if old_pos + n > offset {
                        return new_pos + (offset - old_pos);
                    }
                    old_pos += n;
                    new_pos += n;
                }
                Operation::Remove(n) => {
                    if old_pos + n > offset {
                        return new_pos;
                    }
                    old_pos += n;
                }
                Operation::Insert(elements) => {
                    if old_pos == offset && affinity == Affinity::Before {
                        // Stays before the insertion.
                    } else {
                        new_pos += elements.len();
                    }
                }
            }
        }

        new_pos + (offset - old_pos)
    }

    /// Queue every splice on `sync` and return the inverse transaction. The
    /// document is untouched until the synchronizer runs.
    pub fn apply(
        &self,
        document: &Document,
        sync: &mut DocumentSynchronizer,
    ) -> Result<Transaction, ModelError> {
        if self.len_before > document.len() {
            return Err(ModelError::range(0, self.len_before, document.len()));
        }

        let mut inverse = Transaction::builder();
        // Position in the original data, and in the data once earlier
        // splices have landed.
        let mut old_pos = 0;
        let mut new_pos = 0;
        let mut remove = 0;
        let mut insert: Vec<Element> = Vec::new();

        let mut flush = |old_pos: &mut usize,
                         new_pos: &mut usize,
                         remove: &mut usize,
                         insert: &mut Vec<Element>,
                         inverse: &mut TransactionBuilder|
         -> Result<(), ModelError> {
            if *remove == 0 && insert.is_empty() {
                return Ok(());
            }
            let inserted = insert.len();
            let removed = document.get_data(*old_pos..*old_pos + *remove)?.to_vec();
            sync.push_change(*new_pos, *remove, std::mem::take(insert));
            inverse.push_remove(inserted);
            inverse.push_insert(removed);
            *old_pos += *remove;
            *new_pos += inserted;
            *remove = 0;
            Ok(())
        };

        for op in &self.operations {
            match op {
                Operation::Retain(n) => {
                    flush(&mut old_pos, &mut new_pos, &mut remove, &mut insert, &mut inverse)?;
                    inverse.push_retain(*n);
                    old_pos += n;
                    new_pos += n;
                }
                Operation::Remove(n) => remove += n,
                Operation::Insert(elements) => insert.extend(elements.iter().cloned()),
            }
        }
        flush(&mut old_pos, &mut new_pos, &mut remove, &mut insert, &mut inverse)?;

        tracing::trace!(
            target: "folio::transaction",
            operations = self.operations.len(),
            delta = self.length_delta(),
            "applied transaction"
        );
        Ok(inverse.build())
    }
}

fn check_offset(document: &Document, offset: usize) -> Result<(), ModelError> {
    if offset > document.len() {
        return Err(ModelError::range(offset, offset, document.len()));
    }
    Ok(())
}

/// `elements` dropped in at `offset` must close every node they open, with
/// matching types, and obey the rules of each node they land in.
fn check_insertion(document: &Document, offset: usize, elements: &[Element]) -> Result<(), ModelError> {
    let registry = document.registry();
    let inside_leaf = offset
        .checked_sub(1)
        .and_then(|o| document.data().get(o))
        .and_then(|e| match e {
            Element::Open { node_type, .. } => Some(node_type),
            _ => None,
        })
        .map(|node_type| registry.rules(node_type).map(|r| (node_type, r)))
        .transpose()?
        .filter(|(_, rules)| !rules.can_have_children);
    let container = match inside_leaf {
        Some((node_type, rules)) => (node_type.clone(), rules),
        None => {
            let branch = document.node(document.branch_at(offset)?)?;
            (branch.node_type().clone(), branch.rules())
        }
    };

    let mut stack: Vec<(SmolStr, NodeRules)> = Vec::new();
    for (i, element) in elements.iter().enumerate() {
        let (container_type, container_rules) = stack.last().unwrap_or(&container);
        match element {
            Element::Char { .. } => {
                if !container_rules.can_have_children {
                    return Err(ModelError::structure(
                        offset + i,
                        format!("`{container_type}` cannot contain text"),
                    ));
                }
            }
            Element::Open { node_type, .. } => {
                let rules = registry.rules(node_type)?;
                let allowed = container_rules.can_have_children
                    && (!rules.can_have_children || container_rules.can_have_grandchildren);
                if !allowed {
                    return Err(ModelError::structure(
                        offset + i,
                        format!("`{container_type}` cannot contain `{node_type}`"),
                    ));
                }
                stack.push((node_type.clone(), rules));
            }
            Element::Close { node_type } => match stack.pop() {
                Some((open, _)) if open == *node_type => {}
                Some((open, _)) => {
                    return Err(ModelError::structure(
                        offset + i,
                        format!("`{open}` closed by `{node_type}`"),
                    ));
                }
                None => {
                    return Err(ModelError::structure(
                        offset + i,
                        "inserted elements are not balanced",
                    ));
                }
            },
        }
    }
    if !stack.is_empty() {
        return Err(ModelError::structure(
            offset,
            "inserted elements are not balanced",
        ));
    }
    Ok(())
}

/// Tags left unmatched by removing `range` must close and reopen the same
/// node types so the two sides join up.
fn check_removal(document: &Document, range: Range<usize>) -> Result<(), ModelError> {
    let removed = document.get_data(range.clone())?;

    let mut opens: Vec<&SmolStr> = Vec::new();
    let mut closes: Vec<&SmolStr> = Vec::new();
    for element in removed {
        match element {
            Element::Open { node_type, .. } => opens.push(node_type),
            Element::Close { node_type } => {
                if opens.pop().is_none() {
                    closes.push(node_type);
                }
            }
            Element::Char { .. } => {}
        }
    }
    let joins =
        closes.len() == opens.len() && closes.iter().zip(opens.iter().rev()).all(|(c, o)| c == o);
    if !joins {
        return Err(ModelError::structure(
            range.start,
            "removal would join nodes of different types",
        ));
    }
    Ok(())
}

/// Accumulates operations, merging adjacent ones of the same kind.
#[derive(Debug, Clone, Default)]
pub struct TransactionBuilder {
    transaction: Transaction,
}

impl TransactionBuilder {
    pub fn retain(mut self, n: usize) -> Self {
        self.push_retain(n);
        self
    }

    pub fn remove(mut self, n: usize) -> Self {
        self.push_remove(n);
        self
    }

    pub fn insert(mut self, elements: Vec<Element>) -> Self {
        self.push_insert(elements);
        self
    }

    pub fn build(self) -> Transaction {
        self.transaction
    }

    fn push_retain(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        let tx = &mut self.transaction;
        tx.len_before += n;
        tx.len_after += n;
        if let Some(Operation::Retain(count)) = tx.operations.last_mut() {
            *count += n;
        } else {
            tx.operations.push(Operation::Retain(n));
        }
    }

    fn push_remove(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        let tx = &mut self.transaction;
        tx.len_before += n;
        if let Some(Operation::Remove(count)) = tx.operations.last_mut() {
            *count += n;
        } else {
            tx.operations.push(Operation::Remove(n));
        }
    }

    /// Inserts sort before an adjacent remove so equal edits build equal
    /// transactions.
    fn push_insert(&mut self, elements: Vec<Element>) {
        if elements.is_empty() {
            return;
        }
        let tx = &mut self.transaction;
        tx.len_after += elements.len();
        match tx.operations.as_mut_slice() {
            [.., Operation::Insert(prev)] | [.., Operation::Insert(prev), Operation::Remove(_)] => {
                prev.extend(elements);
            }
            [.., last @ Operation::Remove(_)] => {
                let remove = std::mem::replace(last, Operation::Insert(elements));
                tx.operations.push(remove);
            }
            _ => tx.operations.push(Operation::Insert(elements)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::NoopObserver;

    fn paragraph(text: &str) -> Vec<Element> {
        Element::wrap("paragraph", Element::text(text))
    }

    fn two_paragraphs() -> Document {
        let mut data = paragraph("abc");
        data.extend(paragraph("def"));
        Document::from_elements(data).unwrap()
    }

    fn apply(doc: &mut Document, tx: &Transaction) -> Transaction {
        let mut sync = DocumentSynchronizer::default();
        let inverse = tx.apply(doc, &mut sync).unwrap();
        assert_eq!(doc.len(), doc.node(doc.root()).unwrap().outer_length());
        sync.synchronize(doc, &mut NoopObserver).unwrap();
        doc.check_invariants().unwrap();
        inverse
    }

    #[test]
    fn test_builder_merges_adjacent() {
        let tx = Transaction::builder()
            .retain(2)
            .retain(3)
            .remove(1)
            .insert(Element::text("a"))
            .insert(Element::text("b"))
            .remove(2)
            .build();
        assert_eq!(
            tx.operations(),
            &[
                Operation::Retain(5),
                Operation::Insert(Element::text("ab")),
                Operation::Remove(3),
            ]
        );
        assert_eq!(tx.len_before(), 8);
        assert_eq!(tx.length_delta(), -1);
    }

    #[test]
    fn test_map_offset_through_removal() {
        let tx = Transaction::builder().retain(6).remove(4).build();
        assert_eq!(tx.map_offset(10, Affinity::Before), 6);
        assert_eq!(tx.map_offset(8, Affinity::Before), 6);
        assert_eq!(tx.map_offset(12, Affinity::Before), 8);
        assert_eq!(tx.map_offset(3, Affinity::Before), 3);
    }

    #[test]
    fn test_map_offset_at_insertion() {
        let tx = Transaction::builder()
            .retain(2)
            .insert(Element::text("xyz"))
            .build();
        assert_eq!(tx.map_offset(2, Affinity::Before), 2);
        assert_eq!(tx.map_offset(2, Affinity::After), 5);
        assert_eq!(tx.map_offset(3, Affinity::Before), 6);
        assert_eq!(tx.map_offset(1, Affinity::After), 1);
    }

    #[test]
    fn test_insert_text_inherits_annotations() {
        let mut bold = Annotations::new();
        bold.insert("textStyle/bold".into());
        let data = Element::wrap("paragraph", Element::annotated_text("ab", &bold));
        let mut doc = Document::from_elements(data).unwrap();

        let tx = Transaction::insert_text(&doc, 3, "c").unwrap();
        apply(&mut doc, &tx);
        assert_eq!(doc.text_content(), "abc");
        assert_eq!(doc.data().get(3).unwrap().annotations(), Some(&bold));
    }

    #[test]
    fn test_insert_text_between_blocks_wraps() {
        let mut doc = two_paragraphs();
        let tx = Transaction::insert_text(&doc, 5, "new").unwrap();
        apply(&mut doc, &tx);
        assert_eq!(doc.children(doc.root()).unwrap().len(), 3);
        assert_eq!(doc.text_content(), "abcnewdef");
    }

    #[test]
    fn test_insert_elements_must_balance() {
        let doc = two_paragraphs();
        let err = Transaction::insert_elements(&doc, 5, vec![Element::open("paragraph")])
            .unwrap_err();
        assert!(matches!(err, ModelError::Structure { .. }));
        assert!(Transaction::insert_elements(&doc, 11, paragraph("x")).is_err());
    }

    #[test]
    fn test_insert_elements_checks_nesting() {
        let doc = Document::from_elements(paragraph("ab")).unwrap();
        let before = doc.data().clone();

        let err = Transaction::insert_elements(&doc, 2, paragraph("x")).unwrap_err();
        assert_eq!(
            err,
            ModelError::Structure {
                offset: 2,
                reason: "`paragraph` cannot contain `paragraph`".into()
            }
        );

        let mismatched = vec![
            Element::open("paragraph"),
            Element::char('x'),
            Element::close("heading"),
        ];
        let err = Transaction::insert_elements(&doc, 0, mismatched).unwrap_err();
        assert_eq!(
            err,
            ModelError::Structure {
                offset: 2,
                reason: "`paragraph` closed by `heading`".into()
            }
        );

        assert_eq!(doc.data(), &before);
        doc.check_invariants().unwrap();

        // A whole paragraph between blocks is fine.
        let mut doc = doc;
        let tx = Transaction::insert_elements(&doc, 4, paragraph("x")).unwrap();
        apply(&mut doc, &tx);
        assert_eq!(doc.children(doc.root()).unwrap().len(), 2);
    }

    #[test]
    fn test_no_text_inside_delimited_leaf() {
        let mut content = Element::text("a");
        content.extend([Element::open("image"), Element::close("image")]);
        let mut doc = Document::from_elements(Element::wrap("paragraph", content)).unwrap();

        let err = Transaction::insert_text(&doc, 3, "x").unwrap_err();
        assert_eq!(
            err,
            ModelError::Structure {
                offset: 3,
                reason: "`image` cannot contain text".into()
            }
        );
        assert!(Transaction::insert_elements(&doc, 3, Element::text("x")).is_err());

        // Right after the image is ordinary paragraph text.
        let tx = Transaction::insert_text(&doc, 4, "x").unwrap();
        apply(&mut doc, &tx);
        assert_eq!(doc.text_content(), "ax");
    }

    #[test]
    fn test_remove_across_paragraphs_joins() {
        let mut doc = two_paragraphs();
        // "c</p><p>d"
        let tx = Transaction::remove_range(&doc, 3..7).unwrap();
        apply(&mut doc, &tx);
        assert_eq!(doc.text_content(), "abef");
        assert_eq!(doc.children(doc.root()).unwrap().len(), 1);
    }

    #[test]
    fn test_remove_mismatched_types_rejected() {
        let mut data = paragraph("abc");
        data.extend(Element::wrap("heading", Element::text("def")));
        let doc = Document::from_elements(data).unwrap();
        let err = Transaction::remove_range(&doc, 3..7).unwrap_err();
        assert!(matches!(err, ModelError::Structure { offset: 3, .. }));
    }

    #[test]
    fn test_split_and_undo() {
        let mut doc = two_paragraphs();
        let before = doc.data().clone();
        let tx = Transaction::split_at(&doc, 2).unwrap().unwrap();
        let inverse = apply(&mut doc, &tx);
        assert_eq!(doc.children(doc.root()).unwrap().len(), 3);
        assert_eq!(doc.len(), 12);

        apply(&mut doc, &inverse);
        assert_eq!(doc.data(), &before);
    }

    #[test]
    fn test_split_unsplittable() {
        let data = Element::wrap("tableCell", paragraph("a"));
        let data = Element::wrap("tableRow", data);
        let doc = Document::from_elements(Element::wrap("table", data)).unwrap();
        // Between the cell's open tag and its paragraph.
        assert!(Transaction::split_at(&doc, 3).unwrap().is_none());
        // Root is never split.
        assert!(Transaction::split_at(&doc, 0).unwrap().is_none());
    }

    #[test]
    fn test_set_attribute() {
        let mut doc = Document::from_elements(Element::wrap("heading", Element::text("t"))).unwrap();
        let heading = doc.children(doc.root()).unwrap()[0];
        let tx = Transaction::set_attribute(&doc, heading, "level", Some("2")).unwrap();
        apply(&mut doc, &tx);
        let heading = doc.children(doc.root()).unwrap()[0];
        assert_eq!(doc.node(heading).unwrap().attribute("level"), Some("2"));

        let text = doc.children(heading).unwrap()[0];
        assert!(matches!(
            Transaction::set_attribute(&doc, text, "level", None),
            Err(ModelError::Alignment { .. })
        ));
    }

    #[test]
    fn test_annotate_set_and_clear() {
        let mut doc = two_paragraphs();
        let tx = Transaction::annotate(&doc, 2..7, "textStyle/bold", AnnotationMethod::Set).unwrap();
        // "bc" and "d" change, the tags in between are retained.
        assert_eq!(tx.len_before(), 7);
        assert_eq!(tx.length_delta(), 0);
        let inverse = apply(&mut doc, &tx);
        let bold: Vec<bool> = doc
            .data()
            .elements()
            .iter()
            .filter_map(|e| e.annotations())
            .map(|a| a.contains("textStyle/bold"))
            .collect();
        assert_eq!(bold, vec![false, true, true, true, false, false]);

        apply(&mut doc, &inverse);
        assert!(
            doc.data()
                .elements()
                .iter()
                .filter_map(|e| e.annotations())
                .all(|a| a.is_empty())
        );

        let clear =
            Transaction::annotate(&doc, 0..doc.len(), "textStyle/bold", AnnotationMethod::Clear)
                .unwrap();
        assert!(clear.is_noop());
    }

    #[test]
    fn test_apply_rejects_long_transaction() {
        let doc = two_paragraphs();
        let tx = Transaction::builder().retain(20).build();
        let mut sync = DocumentSynchronizer::default();
        assert!(matches!(
            tx.apply(&doc, &mut sync),
            Err(ModelError::Range { .. })
        ));
        assert!(sync.is_empty());
    }
}
