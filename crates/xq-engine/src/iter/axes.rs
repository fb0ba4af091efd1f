//! The thirteen axes as lazy walks over a single origin node.
//!
//! Each walk uses only the four cursor primitives (parent, first child,
//! next sibling, document-order following). The depth-first axes run an
//! explicit state machine with a depth counter and backtrack via
//! move-to-parent, so stack usage is bounded by tree depth, never by
//! traversal size. The two reverse sibling/preceding axes have no backward
//! primitive to lean on and buffer their (finite) item list up front.

use smallvec::SmallVec;

use crate::model::{NodeKind, QName, TreeCursor};

/// Traversal direction/relationship of one path step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Parent,
    Ancestor,
    AncestorOrSelf,
    Following,
    FollowingSibling,
    Preceding,
    PrecedingSibling,
    Attribute,
    Namespace,
    SelfAxis,
}

impl Axis {
    /// Reverse axes deliver nearest-first, i.e. reverse document order.
    pub fn is_reversing(self) -> bool {
        matches!(
            self,
            Axis::Parent | Axis::Ancestor | Axis::AncestorOrSelf | Axis::Preceding
                | Axis::PrecedingSibling
        )
    }

    /// Axes that can emit nodes from arbitrary depths below the origin.
    pub fn is_descendant_class(self) -> bool {
        matches!(
            self,
            Axis::Descendant | Axis::DescendantOrSelf | Axis::Following | Axis::Preceding
        )
    }

    /// The node kind an unprefixed name test selects on this axis.
    pub fn principal_node_kind(self) -> NodeKind {
        match self {
            Axis::Attribute => NodeKind::Attribute,
            Axis::Namespace => NodeKind::Namespace,
            _ => NodeKind::Element,
        }
    }
}

/// Node test applied to every candidate an axis walk produces.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeTest {
    /// `node()`: anything.
    Any,
    /// `*`: any node of the axis's principal kind.
    AnyName,
    /// Expanded-name test against the principal kind.
    Name(QName),
    /// `ns:*`: principal kind, any local name in the namespace.
    NsWildcard(String),
    /// `*:local`: principal kind, the local name in any namespace.
    LocalWildcard(String),
    /// Kind test: `text()`, `comment()`, `document-node()`.
    Kind(NodeKind),
    /// `processing-instruction()`, optionally with a target.
    Pi(Option<String>),
}

impl NodeTest {
    pub fn matches<C: TreeCursor>(&self, axis: Axis, cursor: &C) -> bool {
        match self {
            NodeTest::Any => true,
            NodeTest::AnyName => cursor.node_kind() == axis.principal_node_kind(),
            NodeTest::Name(q) => {
                cursor.node_kind() == axis.principal_node_kind()
                    && cursor.name().is_some_and(|n| n.matches(q))
            }
            NodeTest::NsWildcard(uri) => {
                cursor.node_kind() == axis.principal_node_kind()
                    && cursor
                        .name()
                        .is_some_and(|n| n.ns_uri.as_deref() == Some(uri.as_str()))
            }
            NodeTest::LocalWildcard(local) => {
                cursor.node_kind() == axis.principal_node_kind()
                    && cursor.name().is_some_and(|n| n.local == *local)
            }
            NodeTest::Kind(k) => cursor.node_kind() == *k,
            NodeTest::Pi(target) => {
                cursor.node_kind() == NodeKind::ProcessingInstruction
                    && target.as_ref().is_none_or(|t| {
                        cursor.name().is_some_and(|n| n.local == *t)
                    })
            }
        }
    }
}

/// Depth-first pre-order walk of a subtree, tracked with an explicit
/// relative depth. `advance(false)` skips the current node's subtree.
#[derive(Debug, Clone)]
pub(crate) struct DescendWalk<C: TreeCursor> {
    cur: Option<(C, usize)>,
}

impl<C: TreeCursor> DescendWalk<C> {
    pub(crate) fn new(origin: C, include_self: bool) -> Self {
        if include_self {
            return Self {
                cur: Some((origin, 0)),
            };
        }
        let mut c = origin;
        let cur = c.move_to_first_child().then_some((c, 1));
        Self { cur }
    }

    pub(crate) fn current(&self) -> Option<(&C, usize)> {
        self.cur.as_ref().map(|(c, d)| (c, *d))
    }

    /// Moves to the next node in pre-order. With `enter` false the current
    /// node's children are skipped.
    pub(crate) fn advance(&mut self, enter: bool) -> bool {
        let Some((mut probe, mut depth)) = self.cur.take() else {
            return false;
        };
        if enter && probe.move_to_first_child() {
            self.cur = Some((probe, depth + 1));
            return true;
        }
        loop {
            if depth == 0 {
                return false;
            }
            if probe.move_to_next_sibling() {
                self.cur = Some((probe, depth));
                return true;
            }
            if !probe.move_to_parent() {
                return false;
            }
            depth -= 1;
        }
    }
}

/// State machine behind one axis traversal from one origin.
enum Walk<C: TreeCursor> {
    Done,
    /// Self / parent: at most one node, already positioned.
    Once(C),
    /// Child / following-sibling: cursor sits on the node to emit next.
    Siblings(C),
    Attributes(C),
    /// Ancestor chain; climbs one parent per pull.
    Climb(C),
    /// Pre-order subtree walk for the descendant axes.
    Descend(DescendWalk<C>),
    /// Document-order tail for the following axis.
    Follow(C),
    /// Pre-buffered nearest-first list for the reverse buffered axes.
    Buffered(std::vec::IntoIter<C>),
}

impl<C: TreeCursor> Walk<C> {
    fn start(axis: Axis, origin: &C) -> Self {
        match axis {
            Axis::SelfAxis => Walk::Once(origin.clone()),
            Axis::Parent => {
                let mut c = origin.clone();
                if c.move_to_parent() {
                    Walk::Once(c)
                } else {
                    Walk::Done
                }
            }
            Axis::Child => {
                let mut c = origin.clone();
                if c.move_to_first_child() {
                    Walk::Siblings(c)
                } else {
                    Walk::Done
                }
            }
            Axis::Attribute => {
                let mut c = origin.clone();
                if c.move_to_first_attribute() {
                    Walk::Attributes(c)
                } else {
                    Walk::Done
                }
            }
            Axis::Namespace => {
                // In-scope namespaces: own declarations plus inherited
                // ones, nearest binding per prefix wins.
                if origin.node_kind() != NodeKind::Element {
                    return Walk::Done;
                }
                let mut seen: SmallVec<[String; 4]> = SmallVec::new();
                let mut out = Vec::new();
                let mut scope = Some(origin.clone());
                while let Some(cur) = scope {
                    let mut ns = cur.clone();
                    if ns.move_to_first_namespace() {
                        loop {
                            let prefix =
                                ns.name().map(|q| q.local).unwrap_or_default();
                            if !seen.contains(&prefix) {
                                seen.push(prefix);
                                out.push(ns.clone());
                            }
                            if !ns.move_to_next_namespace() {
                                break;
                            }
                        }
                    }
                    let mut parent = cur;
                    scope = parent.move_to_parent().then_some(parent);
                }
                Walk::Buffered(out.into_iter())
            }
            // The self node of ancestor-or-self is pended by the cursor,
            // not the walk.
            Axis::Ancestor | Axis::AncestorOrSelf => Walk::Climb(origin.clone()),
            Axis::Descendant => Walk::Descend(DescendWalk::new(origin.clone(), false)),
            Axis::DescendantOrSelf => Walk::Descend(DescendWalk::new(origin.clone(), true)),
            Axis::FollowingSibling => {
                let mut c = origin.clone();
                if is_unparented_kind(origin) {
                    Walk::Done
                } else if c.move_to_next_sibling() {
                    Walk::Siblings(c)
                } else {
                    Walk::Done
                }
            }
            Axis::Following => {
                // First node after the origin's subtree; attribute and
                // namespace origins anchor at their owner element.
                let mut probe = owner_element(origin);
                loop {
                    let mut sib = probe.clone();
                    if sib.move_to_next_sibling() {
                        return Walk::Follow(sib);
                    }
                    if !probe.move_to_parent() {
                        return Walk::Done;
                    }
                }
            }
            Axis::PrecedingSibling => {
                if is_unparented_kind(origin) {
                    return Walk::Done;
                }
                let mut sibs = Vec::new();
                let mut c = origin.clone();
                if !c.move_to_parent() {
                    return Walk::Done;
                }
                if !c.move_to_first_child() {
                    return Walk::Done;
                }
                loop {
                    if c.is_same_position(origin) {
                        break;
                    }
                    sibs.push(c.clone());
                    if !c.move_to_next_sibling() {
                        break;
                    }
                }
                sibs.reverse();
                Walk::Buffered(sibs.into_iter())
            }
            Axis::Preceding => {
                let anchor = owner_element(origin);
                let ancestors = ancestor_chain(&anchor);
                let mut root = anchor.clone();
                while root.move_to_parent() {}
                let mut seen = Vec::new();
                let mut c = root;
                loop {
                    if c.is_same_position(&anchor) {
                        break;
                    }
                    if !ancestors.iter().any(|a| a.is_same_position(&c)) {
                        seen.push(c.clone());
                    }
                    if !c.move_to_following() {
                        break;
                    }
                }
                seen.reverse();
                Walk::Buffered(seen.into_iter())
            }
        }
    }

    fn next(&mut self) -> Option<C> {
        match std::mem::replace(self, Walk::Done) {
            Walk::Done => None,
            Walk::Once(c) => Some(c),
            Walk::Siblings(c) => {
                let mut n = c.clone();
                if n.move_to_next_sibling() {
                    *self = Walk::Siblings(n);
                }
                Some(c)
            }
            Walk::Attributes(c) => {
                let mut n = c.clone();
                if n.move_to_next_attribute() {
                    *self = Walk::Attributes(n);
                }
                Some(c)
            }
            Walk::Climb(mut c) => {
                if c.move_to_parent() {
                    *self = Walk::Climb(c.clone());
                    Some(c)
                } else {
                    None
                }
            }
            Walk::Descend(mut walk) => {
                let node = walk.current().map(|(c, _)| c.clone());
                if node.is_some() && walk.advance(true) {
                    *self = Walk::Descend(walk);
                }
                node
            }
            Walk::Follow(c) => {
                let mut n = c.clone();
                if n.move_to_following() {
                    *self = Walk::Follow(n);
                }
                Some(c)
            }
            Walk::Buffered(mut iter) => {
                let node = iter.next();
                if node.is_some() {
                    *self = Walk::Buffered(iter);
                }
                node
            }
        }
    }

    fn clone_walk(&self) -> Self {
        match self {
            Walk::Done => Walk::Done,
            Walk::Once(c) => Walk::Once(c.clone()),
            Walk::Siblings(c) => Walk::Siblings(c.clone()),
            Walk::Attributes(c) => Walk::Attributes(c.clone()),
            Walk::Climb(c) => Walk::Climb(c.clone()),
            Walk::Descend(w) => Walk::Descend(w.clone()),
            Walk::Follow(c) => Walk::Follow(c.clone()),
            Walk::Buffered(iter) => Walk::Buffered(iter.clone()),
        }
    }
}

fn is_unparented_kind<C: TreeCursor>(c: &C) -> bool {
    // Attribute and namespace nodes have no siblings on any axis.
    matches!(c.node_kind(), NodeKind::Attribute | NodeKind::Namespace)
}

fn owner_element<C: TreeCursor>(c: &C) -> C {
    if is_unparented_kind(c) {
        let mut owner = c.clone();
        if owner.move_to_parent() {
            return owner;
        }
    }
    c.clone()
}

fn ancestor_chain<C: TreeCursor>(c: &C) -> Vec<C> {
    let mut out = Vec::new();
    let mut cur = c.clone();
    while cur.move_to_parent() {
        out.push(cur.clone());
    }
    out
}

/// Lazy axis traversal from one origin node, filtered by a node test.
///
/// `ancestor-or-self` interleaves the self node before the climb; all other
/// axes map directly onto one [`Walk`] state.
pub struct AxisCursor<C: TreeCursor> {
    axis: Axis,
    test: NodeTest,
    walk: Walk<C>,
    /// Pending self node for `ancestor-or-self`.
    or_self: Option<C>,
    pos: i64,
}

impl<C: TreeCursor> Clone for AxisCursor<C> {
    fn clone(&self) -> Self {
        Self {
            axis: self.axis,
            test: self.test.clone(),
            walk: self.walk.clone_walk(),
            or_self: self.or_self.clone(),
            pos: self.pos,
        }
    }
}

impl<C: TreeCursor> AxisCursor<C> {
    pub fn new(origin: &C, axis: Axis, test: NodeTest) -> Self {
        let or_self = (axis == Axis::AncestorOrSelf).then(|| origin.clone());
        Self {
            axis,
            test,
            walk: Walk::start(axis, origin),
            or_self,
            pos: 0,
        }
    }

    fn next_candidate(&mut self) -> Option<C> {
        if let Some(node) = self.or_self.take() {
            return Some(node);
        }
        self.walk.next()
    }
}

impl<C: TreeCursor> super::SequenceCursor<C> for AxisCursor<C> {
    fn next_item(&mut self) -> Option<super::ItemResult<C>> {
        loop {
            let node = self.next_candidate()?;
            if self.test.matches(self.axis, &node) {
                // Hosts without attribute ordering guarantee at most one
                // attribute per exact name; stop scanning after the hit.
                if self.axis == Axis::Attribute
                    && matches!(self.test, NodeTest::Name(_))
                    && node.supports_attribute_ordering_skip()
                {
                    self.walk = Walk::Done;
                }
                self.pos += 1;
                return Some(Ok(super::Item::Node(node)));
            }
        }
    }

    fn boxed_clone(&self) -> super::BoxedCursor<C> {
        Box::new(self.clone())
    }

    /// Forward axes emit in a single direction and know each item's
    /// ordinal; reverse axes report no position.
    fn sequential_position(&self) -> Option<i64> {
        (!self.axis.is_reversing()).then_some(self.pos)
    }
}
