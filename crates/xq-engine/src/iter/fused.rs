//! Fused traversal for `descendant::X/child::Y/.../child::Z` chains.
//!
//! Instead of materializing one intermediate sequence per step, a single
//! pre-order walk visits every descendant once. Only when the leaf test
//! matches are the trailing tests checked against the candidate's ancestors
//! in reverse, so the per-node cost on non-matching nodes is one test. The
//! result streams in document order with no duplicates, which keeps the
//! whole chain an ordered set.

use super::axes::{Axis, DescendWalk, NodeTest};
use super::{BoxedCursor, Item, ItemResult, SequenceCursor};
use crate::model::TreeCursor;

/// Single-walk replacement for a descendant-class step followed by two or
/// more pure child steps. Built by the bind-time rewrite, never at runtime.
pub struct ChildOverDescendantsCursor<C: TreeCursor> {
    walk: DescendWalk<C>,
    /// Test of the leading descendant step.
    head: NodeTest,
    /// Tests of the trailing child steps, outermost first.
    tail: Vec<NodeTest>,
    /// Whether the leading axis was descendant-or-self (the head may then
    /// match the origin itself).
    or_self: bool,
    pos: i64,
}

impl<C: TreeCursor> Clone for ChildOverDescendantsCursor<C> {
    fn clone(&self) -> Self {
        Self {
            walk: self.walk.clone(),
            head: self.head.clone(),
            tail: self.tail.clone(),
            or_self: self.or_self,
            pos: self.pos,
        }
    }
}

impl<C: TreeCursor> ChildOverDescendantsCursor<C> {
    pub fn new(origin: &C, or_self: bool, head: NodeTest, tail: Vec<NodeTest>) -> Self {
        Self {
            walk: DescendWalk::new(origin.clone(), or_self),
            head,
            tail,
            or_self,
            pos: 0,
        }
    }

    /// Minimum depth a leaf can sit at: one level per child step, plus one
    /// for the head unless it may match the origin.
    fn min_depth(&self) -> usize {
        self.tail.len() + usize::from(!self.or_self)
    }

    /// Leaf matched; verify the trailing child tests against the ancestors
    /// in reverse, then the head test one level further up.
    fn ancestors_match(&self, leaf: &C) -> bool {
        let mut cur = leaf.clone();
        for test in self.tail.iter().rev().skip(1) {
            if !cur.move_to_parent() || !test.matches(Axis::Child, &cur) {
                return false;
            }
        }
        if !cur.move_to_parent() {
            return false;
        }
        self.head.matches(Axis::Descendant, &cur)
    }
}

impl<C: TreeCursor> SequenceCursor<C> for ChildOverDescendantsCursor<C> {
    fn next_item(&mut self) -> Option<ItemResult<C>> {
        loop {
            let candidate = match self.walk.current() {
                Some((node, depth)) => {
                    let leaf = self.tail.last()?;
                    (depth >= self.min_depth()
                        && leaf.matches(Axis::Child, node)
                        && self.ancestors_match(node))
                    .then(|| node.clone())
                }
                None => return None,
            };
            let advanced = self.walk.advance(true);
            if let Some(node) = candidate {
                self.pos += 1;
                return Some(Ok(Item::Node(node)));
            }
            if !advanced {
                return None;
            }
        }
    }

    fn boxed_clone(&self) -> BoxedCursor<C> {
        Box::new(self.clone())
    }

    fn sequential_position(&self) -> Option<i64> {
        Some(self.pos)
    }
}
