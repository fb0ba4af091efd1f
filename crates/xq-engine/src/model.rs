//! Tree navigation capability consumed by the iterator algebra.
//!
//! The core never owns or mutates a document; it only drives a cloneable
//! cursor supplied by the host. Cloning a cursor must be O(1) — every lazy
//! iterator in this crate relies on cheap independent traversal positions.

use core::cmp::Ordering;

use crate::value::Atomic;

/// Node classification of the underlying tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
    Namespace,
}

/// Qualified name of an element, attribute, namespace or PI node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
    pub ns_uri: Option<String>,
}

impl QName {
    pub fn local(local: impl Into<String>) -> Self {
        Self {
            prefix: None,
            local: local.into(),
            ns_uri: None,
        }
    }

    pub fn ns(ns_uri: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            prefix: None,
            local: local.into(),
            ns_uri: Some(ns_uri.into()),
        }
    }

    /// Expanded-name equality: namespace URI plus local part, prefix ignored.
    pub fn matches(&self, other: &QName) -> bool {
        self.local == other.local && self.ns_uri == other.ns_uri
    }
}

/// Abstract cursor over a tree of element/attribute/text/namespace nodes.
///
/// All `move_to_*` operations mutate the cursor position and return `false`
/// (leaving the position unchanged) when no such node exists. A cursor
/// positioned on an attribute or namespace node returns to its owner element
/// via `move_to_parent`.
pub trait TreeCursor: Clone + 'static {
    fn node_kind(&self) -> NodeKind;
    fn name(&self) -> Option<QName>;
    fn string_value(&self) -> String;

    /// Typed atomic value used by atomization. Untyped trees return
    /// `Atomic::Untyped` over the string value.
    fn typed_value(&self) -> Atomic {
        Atomic::Untyped(self.string_value())
    }

    fn move_to_parent(&mut self) -> bool;
    fn move_to_first_child(&mut self) -> bool;
    fn move_to_next_sibling(&mut self) -> bool;

    /// Document-order successor (pre-order), skipping attributes and
    /// namespaces. Derived from the other three primitives by default.
    fn move_to_following(&mut self) -> bool {
        if self.move_to_first_child() {
            return true;
        }
        let mut probe = self.clone();
        loop {
            if probe.move_to_next_sibling() {
                *self = probe;
                return true;
            }
            if !probe.move_to_parent() {
                return false;
            }
        }
    }

    fn move_to_first_attribute(&mut self) -> bool;
    fn move_to_next_attribute(&mut self) -> bool;
    fn move_to_first_namespace(&mut self) -> bool;
    fn move_to_next_namespace(&mut self) -> bool;

    /// True when both cursors address the same tree position.
    fn is_same_position(&self, other: &Self) -> bool;

    /// Document-order comparison. `None` when the nodes belong to different
    /// roots and no global order exists.
    ///
    /// The default walks ancestry paths and resolves the first divergence by
    /// sibling order (attributes before namespaces before children).
    fn compare_position(&self, other: &Self) -> Option<Ordering> {
        compare_by_ancestry(self, other)
    }

    /// Capability flag: the host guarantees that an exact-QName attribute
    /// test can stop scanning after its first match. Purely a performance
    /// shortcut; the default is always correct.
    fn supports_attribute_ordering_skip(&self) -> bool {
        false
    }
}

/// Fallback document-order comparator based on ancestry and stable sibling
/// order. Ancestors precede descendants; among children of the common
/// parent, attributes come first, then namespaces, then child nodes.
pub fn compare_by_ancestry<C: TreeCursor>(a: &C, b: &C) -> Option<Ordering> {
    if a.is_same_position(b) {
        return Some(Ordering::Equal);
    }
    let pa = path_to_root(a);
    let pb = path_to_root(b);
    let len = pa.len().min(pb.len());
    let mut i = 0;
    while i < len && pa[i].is_same_position(&pb[i]) {
        i += 1;
    }
    if i == len {
        // One path is a prefix of the other: the shorter one is the ancestor.
        return Some(if pa.len() < pb.len() {
            Ordering::Less
        } else {
            Ordering::Greater
        });
    }
    if i == 0 {
        // Different roots; no global order from this fallback.
        return None;
    }
    let parent = &pa[i - 1];
    sibling_order(parent, &pa[i], &pb[i])
}

fn path_to_root<C: TreeCursor>(cursor: &C) -> Vec<C> {
    let mut path = vec![cursor.clone()];
    let mut cur = cursor.clone();
    while cur.move_to_parent() {
        path.push(cur.clone());
    }
    path.reverse();
    path
}

fn sibling_order<C: TreeCursor>(parent: &C, a: &C, b: &C) -> Option<Ordering> {
    let mut rank = 0usize;
    let mut rank_a = None;
    let mut rank_b = None;
    let mut note = |cur: &C, rank: usize, ra: &mut Option<usize>, rb: &mut Option<usize>| {
        if ra.is_none() && cur.is_same_position(a) {
            *ra = Some(rank);
        }
        if rb.is_none() && cur.is_same_position(b) {
            *rb = Some(rank);
        }
    };

    let mut attr = parent.clone();
    if attr.move_to_first_attribute() {
        loop {
            note(&attr, rank, &mut rank_a, &mut rank_b);
            rank += 1;
            if !attr.move_to_next_attribute() {
                break;
            }
        }
    }
    let mut ns = parent.clone();
    if ns.move_to_first_namespace() {
        loop {
            note(&ns, rank, &mut rank_a, &mut rank_b);
            rank += 1;
            if !ns.move_to_next_namespace() {
                break;
            }
        }
    }
    let mut child = parent.clone();
    if child.move_to_first_child() {
        loop {
            note(&child, rank, &mut rank_a, &mut rank_b);
            rank += 1;
            if !child.move_to_next_sibling() {
                break;
            }
        }
    }
    match (rank_a, rank_b) {
        (Some(ra), Some(rb)) => Some(ra.cmp(&rb)),
        _ => None,
    }
}
