//! Lazy sequence algebra: single-pass, cloneable producers of tree items.
//!
//! Everything downstream of a path step is a [`SequenceCursor`]. Cursors are
//! pull-based — nothing advances faster than the consumer — and every cursor
//! clones into an independent copy that can be driven to exhaustion without
//! perturbing the original. Predicates, `for` bindings and nested steps all
//! rely on that.

pub mod axes;
pub mod fused;

use std::cmp::Ordering;

use smallvec::SmallVec;
use tracing::trace;

use crate::error::Error;
use crate::model::TreeCursor;
use crate::value::Atomic;

/// One item of a sequence: a positioned tree node or an atomic value.
#[derive(Debug, Clone)]
pub enum Item<C: TreeCursor> {
    Node(C),
    Atomic(Atomic),
}

impl<C: TreeCursor> Item<C> {
    pub fn is_node(&self) -> bool {
        matches!(self, Item::Node(_))
    }

    /// Atomized view: nodes yield their typed value, atomics pass through.
    pub fn atomized(&self) -> Atomic {
        match self {
            Item::Node(c) => c.typed_value(),
            Item::Atomic(a) => a.clone(),
        }
    }
}

pub type ItemResult<C> = Result<Item<C>, Error>;

/// Single-pass lazy producer of items.
///
/// `next_item` returns `None` once exhausted and stays exhausted. An error
/// item ends the sequence; callers stop pulling after one.
pub trait SequenceCursor<C: TreeCursor> {
    fn next_item(&mut self) -> Option<ItemResult<C>>;

    /// Independent copy resuming from the same point. Object-safe stand-in
    /// for `Clone`.
    fn boxed_clone(&self) -> BoxedCursor<C>;

    /// 1-based ordinal of the most recently returned item when the producer
    /// is strictly sequential; `None` when the ordinal is not tracked.
    fn sequential_position(&self) -> Option<i64> {
        None
    }

    /// Materializes the remaining items so they can be re-read any number
    /// of times.
    fn create_buffered(&mut self) -> Result<VecCursor<C>, Error> {
        let mut items = Vec::new();
        while let Some(item) = self.next_item() {
            items.push(item?);
        }
        Ok(VecCursor::new(items))
    }
}

pub type BoxedCursor<C> = Box<dyn SequenceCursor<C>>;

impl<C: TreeCursor> Clone for BoxedCursor<C> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

/// The empty sequence.
#[derive(Debug, Clone, Default)]
pub struct EmptyCursor;

impl<C: TreeCursor> SequenceCursor<C> for EmptyCursor {
    fn next_item(&mut self) -> Option<ItemResult<C>> {
        None
    }

    fn boxed_clone(&self) -> BoxedCursor<C> {
        Box::new(EmptyCursor)
    }
}

/// A singleton sequence.
#[derive(Debug, Clone)]
pub struct SingleItemCursor<C: TreeCursor> {
    item: Option<Item<C>>,
}

impl<C: TreeCursor> SingleItemCursor<C> {
    pub fn new(item: Item<C>) -> Self {
        Self { item: Some(item) }
    }
}

impl<C: TreeCursor> SequenceCursor<C> for SingleItemCursor<C> {
    fn next_item(&mut self) -> Option<ItemResult<C>> {
        self.item.take().map(Ok)
    }

    fn boxed_clone(&self) -> BoxedCursor<C> {
        Box::new(self.clone())
    }

    fn sequential_position(&self) -> Option<i64> {
        match self.item {
            None => Some(1),
            Some(_) => Some(0),
        }
    }
}

/// Replay cursor over a materialized item list. The backing vector is
/// shared between clones; only the read position is per-cursor.
#[derive(Debug)]
pub struct VecCursor<C: TreeCursor> {
    items: std::sync::Arc<Vec<Item<C>>>,
    pos: usize,
}

impl<C: TreeCursor> Clone for VecCursor<C> {
    fn clone(&self) -> Self {
        Self {
            items: std::sync::Arc::clone(&self.items),
            pos: self.pos,
        }
    }
}

impl<C: TreeCursor> VecCursor<C> {
    pub fn new(items: Vec<Item<C>>) -> Self {
        Self {
            items: std::sync::Arc::new(items),
            pos: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<C: TreeCursor> SequenceCursor<C> for VecCursor<C> {
    fn next_item(&mut self) -> Option<ItemResult<C>> {
        let item = self.items.get(self.pos)?.clone();
        self.pos += 1;
        Some(Ok(item))
    }

    fn boxed_clone(&self) -> BoxedCursor<C> {
        Box::new(self.clone())
    }

    fn sequential_position(&self) -> Option<i64> {
        Some(self.pos as i64)
    }
}

/// Left-to-right concatenation of sub-sequences.
pub struct ConcatCursor<C: TreeCursor> {
    parts: SmallVec<[BoxedCursor<C>; 2]>,
    idx: usize,
}

impl<C: TreeCursor> Clone for ConcatCursor<C> {
    fn clone(&self) -> Self {
        Self {
            parts: self.parts.clone(),
            idx: self.idx,
        }
    }
}

impl<C: TreeCursor> ConcatCursor<C> {
    pub fn new(parts: impl IntoIterator<Item = BoxedCursor<C>>) -> Self {
        Self {
            parts: parts.into_iter().collect(),
            idx: 0,
        }
    }
}

impl<C: TreeCursor> SequenceCursor<C> for ConcatCursor<C> {
    fn next_item(&mut self) -> Option<ItemResult<C>> {
        while self.idx < self.parts.len() {
            if let Some(item) = self.parts[self.idx].next_item() {
                return Some(item);
            }
            self.idx += 1;
        }
        None
    }

    fn boxed_clone(&self) -> BoxedCursor<C> {
        Box::new(self.clone())
    }
}

/// Ascending integer range, `start to end` inclusive; empty when reversed.
#[derive(Debug, Clone)]
pub struct RangeCursor {
    next: i64,
    end: i64,
}

impl RangeCursor {
    pub fn new(start: i64, end: i64) -> Self {
        Self { next: start, end }
    }
}

impl<C: TreeCursor> SequenceCursor<C> for RangeCursor {
    fn next_item(&mut self) -> Option<ItemResult<C>> {
        if self.next > self.end {
            return None;
        }
        let v = self.next;
        self.next += 1;
        Some(Ok(Item::Atomic(Atomic::Integer(v))))
    }

    fn boxed_clone(&self) -> BoxedCursor<C> {
        Box::new(self.clone())
    }
}

/// Growable ordered item collection backing the document-order normalizer.
#[derive(Debug, Clone, Default)]
pub struct ItemSet<C: TreeCursor> {
    items: Vec<Item<C>>,
}

impl<C: TreeCursor> ItemSet<C> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn push(&mut self, item: Item<C>) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Stable sort by document position. Positions without a global order
    /// (distinct roots) keep their arrival order.
    pub fn sort_by_document_position(&mut self) {
        self.items.sort_by(|a, b| match (a, b) {
            (Item::Node(x), Item::Node(y)) => {
                x.compare_position(y).unwrap_or(Ordering::Equal)
            }
            _ => Ordering::Equal,
        });
    }

    /// Drops items occupying the same tree position as their predecessor.
    /// Position equality, not value equality.
    pub fn dedup_by_position(&mut self) {
        self.items.dedup_by(|b, a| match (a, b) {
            (Item::Node(x), Item::Node(y)) => x.is_same_position(y),
            _ => false,
        });
    }

    pub fn into_cursor(self) -> VecCursor<C> {
        VecCursor::new(self.items)
    }
}

/// Buffers its source fully and emits it normalized: uniformly-node input
/// is sorted into document order with position-duplicates removed;
/// uniformly-atomic input passes through unsorted; a node/atomic mix is a
/// hard error.
pub struct DocOrderCursor<C: TreeCursor> {
    state: DocOrderState<C>,
}

enum DocOrderState<C: TreeCursor> {
    Pending(BoxedCursor<C>),
    Ready(VecCursor<C>),
    Failed,
}

impl<C: TreeCursor> Clone for DocOrderCursor<C> {
    fn clone(&self) -> Self {
        let state = match &self.state {
            DocOrderState::Pending(c) => DocOrderState::Pending(c.boxed_clone()),
            DocOrderState::Ready(v) => DocOrderState::Ready(v.clone()),
            DocOrderState::Failed => DocOrderState::Failed,
        };
        Self { state }
    }
}

impl<C: TreeCursor> DocOrderCursor<C> {
    pub fn new(source: BoxedCursor<C>) -> Self {
        Self {
            state: DocOrderState::Pending(source),
        }
    }

    fn normalize(source: &mut BoxedCursor<C>) -> Result<VecCursor<C>, Error> {
        let mut set = ItemSet::new();
        let mut nodes = 0usize;
        while let Some(item) = source.next_item() {
            let item = item?;
            if item.is_node() {
                nodes += 1;
            }
            set.push(item);
        }
        if nodes == set.len() {
            let before = set.len();
            set.sort_by_document_position();
            set.dedup_by_position();
            trace!(before, after = set.len(), "normalized node sequence");
        } else if nodes != 0 {
            return Err(Error::type_mismatch(
                "sequence mixes nodes and atomic values; no document order exists",
            ));
        }
        Ok(set.into_cursor())
    }
}

impl<C: TreeCursor> SequenceCursor<C> for DocOrderCursor<C> {
    fn next_item(&mut self) -> Option<ItemResult<C>> {
        if let DocOrderState::Pending(source) = &mut self.state {
            match Self::normalize(source) {
                Ok(ready) => self.state = DocOrderState::Ready(ready),
                Err(e) => {
                    self.state = DocOrderState::Failed;
                    return Some(Err(e));
                }
            }
        }
        match &mut self.state {
            DocOrderState::Ready(v) => v.next_item(),
            _ => None,
        }
    }

    fn boxed_clone(&self) -> BoxedCursor<C> {
        Box::new(self.clone())
    }

    fn sequential_position(&self) -> Option<i64> {
        match &self.state {
            DocOrderState::Ready(v) => SequenceCursor::<C>::sequential_position(v),
            _ => None,
        }
    }
}

/// Yields exactly the item whose sequential position equals `target`, then
/// stops — `[N]` terminates without buffering the rest of the axis.
pub struct PositionFilterCursor<C: TreeCursor> {
    base: BoxedCursor<C>,
    target: i64,
    seen: i64,
    done: bool,
}

impl<C: TreeCursor> Clone for PositionFilterCursor<C> {
    fn clone(&self) -> Self {
        Self {
            base: self.base.boxed_clone(),
            target: self.target,
            seen: self.seen,
            done: self.done,
        }
    }
}

impl<C: TreeCursor> PositionFilterCursor<C> {
    pub fn new(base: BoxedCursor<C>, target: i64) -> Self {
        Self {
            base,
            target,
            seen: 0,
            done: target < 1,
        }
    }
}

impl<C: TreeCursor> SequenceCursor<C> for PositionFilterCursor<C> {
    fn next_item(&mut self) -> Option<ItemResult<C>> {
        if self.done {
            return None;
        }
        loop {
            let item = match self.base.next_item()? {
                Ok(item) => item,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            self.seen += 1;
            let pos = self.base.sequential_position().unwrap_or(self.seen);
            if pos == self.target {
                self.done = true;
                return Some(Ok(item));
            }
            if pos > self.target {
                self.done = true;
                return None;
            }
        }
    }

    fn boxed_clone(&self) -> BoxedCursor<C> {
        Box::new(self.clone())
    }
}
