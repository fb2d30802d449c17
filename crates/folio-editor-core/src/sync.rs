//! Document synchronizer.
//!
//! Changes are queued as splices and applied here one at a time. Each pushed
//! change is expressed in the coordinates left behind by the changes pushed
//! before it, so changes must arrive in ascending offset order. For every
//! change the synchronizer splices the linear data, finds the smallest run of
//! whole nodes covering it, rebuilds that run and tells the observer before
//! touching the next change, so each event sees a tree consistent with
//! exactly the changes up to and including its own.

use std::collections::VecDeque;

use crate::config::OverlapPolicy;
use crate::document::Document;
use crate::error::ModelError;
use crate::linear::Element;
use crate::tree::NodeId;

/// One rebuilt child range, in the order rebuilds happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Branch whose children were replaced.
    pub parent: NodeId,
    /// Index of the first replaced child.
    pub index: usize,
    pub removed_count: usize,
    pub inserted_count: usize,
    /// Change in the parent's outer length.
    pub length_delta: isize,
}

/// Receives change events as the tree is rebuilt.
pub trait ChangeObserver {
    fn on_change(&mut self, document: &Document, event: &ChangeEvent);
}

impl<F> ChangeObserver for F
where
    F: FnMut(&Document, &ChangeEvent),
{
    fn on_change(&mut self, document: &Document, event: &ChangeEvent) {
        self(document, event)
    }
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ChangeObserver for NoopObserver {
    fn on_change(&mut self, _document: &Document, _event: &ChangeEvent) {}
}

/// A queued splice: `remove` elements at `offset` replaced by `insert`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChange {
    pub offset: usize,
    pub remove: usize,
    pub insert: Vec<Element>,
}

impl PendingChange {
    fn extent(&self) -> Extent {
        Extent {
            offset: self.offset,
            remove: self.remove,
            insert: self.insert.len(),
        }
    }
}

/// Lengths of one or more consecutive splices, in the coordinates before the
/// first of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Extent {
    offset: usize,
    remove: usize,
    insert: usize,
}

impl Extent {
    /// End of the inserted span in the coordinates after this change.
    fn inserted_end(&self) -> usize {
        self.offset + self.insert
    }

    /// Fold `next`, expressed in the coordinates after `self`, into a single
    /// extent expressed in the coordinates before `self`.
    fn merge(self, next: Extent) -> Extent {
        debug_assert!(next.offset >= self.offset);
        let next_end = next.offset + next.remove;
        let removed_end = if next_end > self.inserted_end() {
            (self.offset + self.remove).max(next_end + self.remove - self.insert)
        } else {
            self.offset + self.remove
        };
        let touched_end = self.inserted_end().max(next_end);
        let inserted_end = touched_end + next.insert - next.remove;
        Extent {
            offset: self.offset,
            remove: removed_end - self.offset,
            insert: inserted_end - self.offset,
        }
    }
}

/// Changes rebuilt together: a single push, or pushes coalesced under
/// [`OverlapPolicy::Coalesce`].
#[derive(Debug)]
struct Batch {
    extent: Extent,
    changes: Vec<PendingChange>,
}

impl Batch {
    fn splice(self, document: &mut Document) -> Result<Extent, ModelError> {
        for change in self.changes {
            document.splice(change.offset, change.remove, change.insert)?;
        }
        Ok(self.extent)
    }
}

/// Children `index..index + count` of `parent`, spanning `[start, end)` in
/// the current tree coordinates.
#[derive(Debug, Clone, Copy)]
struct Region {
    parent: NodeId,
    index: usize,
    count: usize,
    start: usize,
    end: usize,
}

/// Queues splices and applies them to the data and the tree in one pass.
#[derive(Debug, Clone, Default)]
pub struct DocumentSynchronizer {
    pending: Vec<PendingChange>,
    overlap: OverlapPolicy,
}

impl DocumentSynchronizer {
    pub fn new(overlap: OverlapPolicy) -> Self {
        Self {
            pending: Vec::new(),
            overlap,
        }
    }

    /// Queue a splice of the linear data. Nothing is touched until
    /// [`DocumentSynchronizer::synchronize`].
    pub fn push_change(&mut self, offset: usize, remove: usize, insert: Vec<Element>) {
        self.pending.push(PendingChange {
            offset,
            remove,
            insert,
        });
    }

    pub fn pending(&self) -> &[PendingChange] {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Splice and rebuild every pending change in push order, notifying
    /// `observer` once per change right after its rebuild. Ordering is
    /// validated before anything is spliced. Pending changes are cleared
    /// whether or not this succeeds.
    ///
    /// A change that leaves the whole document unbalanced cannot be rebuilt
    /// on its own; it is spliced together with the change after it and the
    /// two share one event.
    pub fn synchronize(
        &mut self,
        document: &mut Document,
        observer: &mut impl ChangeObserver,
    ) -> Result<Vec<ChangeEvent>, ModelError> {
        let pending = std::mem::take(&mut self.pending);
        let mut queue = self.batch_changes(pending)?;
        let mut events = Vec::with_capacity(queue.len());

        while let Some(batch) = queue.pop_front() {
            let mut extent = batch.splice(document)?;
            let mut region = locate_region(document, extent.offset, extent.remove)?;
            let new_end = loop {
                let new_end = region.end + extent.insert - extent.remove;
                if document.data().is_balanced(region.start..new_end)? {
                    break new_end;
                }
                if let Some(wider) = widen_to_parent(document, &region)? {
                    region = wider;
                    continue;
                }
                let Some(next) = queue.pop_front() else {
                    return Err(ModelError::structure(
                        region.start,
                        "change leaves the document root unbalanced",
                    ));
                };
                tracing::trace!(
                    target: "folio::sync",
                    first = extent.offset,
                    second = next.extent.offset,
                    "folding unbalanced change into the next"
                );
                extent = extent.merge(next.splice(document)?);
                region = locate_region(document, extent.offset, extent.remove)?;
            };

            let event = document.rebuild_nodes(
                region.parent,
                region.index,
                region.count,
                region.start,
                new_end - region.start,
            )?;
            observer.on_change(document, &event);
            events.push(event);
        }

        tracing::debug!(target: "folio::sync", events = events.len(), "synchronized");
        Ok(events)
    }

    fn batch_changes(&self, pending: Vec<PendingChange>) -> Result<VecDeque<Batch>, ModelError> {
        let mut queue: VecDeque<Batch> = VecDeque::with_capacity(pending.len());
        for change in pending {
            let extent = change.extent();
            let Some(previous) = queue.back_mut() else {
                queue.push_back(Batch {
                    extent,
                    changes: vec![change],
                });
                continue;
            };
            if extent.offset < previous.extent.offset {
                return Err(ModelError::Order {
                    previous: previous.extent.offset,
                    offset: extent.offset,
                });
            }
            if extent.offset < previous.extent.inserted_end() {
                match self.overlap {
                    OverlapPolicy::Reject => {
                        return Err(ModelError::Order {
                            previous: previous.extent.offset,
                            offset: extent.offset,
                        });
                    }
                    OverlapPolicy::Coalesce => {
                        previous.extent = previous.extent.merge(extent);
                        previous.changes.push(change);
                        continue;
                    }
                }
            }
            queue.push_back(Batch {
                extent,
                changes: vec![change],
            });
        }
        Ok(queue)
    }
}

/// Smallest run of whole children of the deepest branch whose inner span
/// holds `[offset, offset + remove]`. Text runs next to the run are pulled in
/// so that rebuilt characters coalesce with their neighbours.
fn locate_region(document: &Document, offset: usize, remove: usize) -> Result<Region, ModelError> {
    let end = offset + remove;
    let root = document.root();
    let root_len = document.node(root)?.outer_length();
    if end > root_len {
        return Err(ModelError::range(offset, end, root_len));
    }

    let mut parent = root;
    let mut inner_start = 0;
    'descend: loop {
        let mut spans = Vec::new();
        let mut position = inner_start;
        for &child in document.children(parent)? {
            let node = document.node(child)?;
            let span = (position, position + node.outer_length());
            if node.is_branch()
                && node.delimiter_length() > 0
                && span.0 < offset
                && end < span.1
            {
                parent = child;
                inner_start = span.0 + 1;
                continue 'descend;
            }
            spans.push(span);
            position = span.1;
        }

        let first = spans.iter().filter(|&&(_, e)| e <= offset).count();
        let last = spans.iter().filter(|&&(s, _)| s < end).count().max(first);
        return widen(document, parent, &spans, first, last, offset);
    }
}

/// Region covering the whole of `region.parent`, one level up. `None` at
/// the root.
fn widen_to_parent(document: &Document, region: &Region) -> Result<Option<Region>, ModelError> {
    let node = region.parent;
    let Some(parent) = document.parent(node)? else {
        return Ok(None);
    };
    let inner_start = document.inner_range(parent)?.start;
    let mut spans = Vec::new();
    let mut position = inner_start;
    let mut index = 0;
    for (i, &child) in document.children(parent)?.iter().enumerate() {
        let len = document.node(child)?.outer_length();
        if child == node {
            index = i;
        }
        spans.push((position, position + len));
        position += len;
    }
    widen(document, parent, &spans, index, index + 1, spans[index].0).map(Some)
}

fn widen(
    document: &Document,
    parent: NodeId,
    spans: &[(usize, usize)],
    mut first: usize,
    mut last: usize,
    offset: usize,
) -> Result<Region, ModelError> {
    let children = document.children(parent)?;
    if first > 0 && document.node(children[first - 1])?.is_text() {
        first -= 1;
    }
    if last < children.len() && document.node(children[last])?.is_text() {
        last += 1;
    }
    let (start, end) = if first < last {
        (spans[first].0, spans[last - 1].1)
    } else {
        (offset, offset)
    };
    Ok(Region {
        parent,
        index: first,
        count: last - first,
        start,
        end,
    })
}
