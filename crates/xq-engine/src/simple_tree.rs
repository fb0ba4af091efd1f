//! Simple in-memory tree used by tests and quick prototypes.
//!
//! Nodes are flattened into one arena in pre-order with attributes before
//! namespaces before children, so a node's arena index *is* its document
//! position: cursor clones are an `Arc` bump and an index copy, and
//! document-order comparison is a single integer compare.
//!
//! Example:
//! ```
//! use xq_engine::simple_tree::{attr, elem, text};
//! use xq_engine::model::TreeCursor;
//!
//! // <root id="r"><child>Hello</child></root>
//! let mut root = elem("root")
//!     .attr(attr("id", "r"))
//!     .child(elem("child").child(text("Hello")))
//!     .build();
//! assert_eq!(root.string_value(), "Hello");
//! assert!(root.move_to_first_child());
//! ```

use std::cmp::Ordering;
use std::sync::Arc;

use crate::model::{NodeKind, QName, TreeCursor};
use crate::value::Atomic;

/// Declarative node description consumed by [`NodeSpec::build`].
pub struct NodeSpec {
    kind: NodeKind,
    name: Option<QName>,
    value: String,
    typed: Option<Atomic>,
    attrs: Vec<NodeSpec>,
    namespaces: Vec<NodeSpec>,
    children: Vec<NodeSpec>,
}

pub fn doc() -> NodeSpec {
    NodeSpec::new(NodeKind::Document, None, String::new())
}

pub fn elem(name: &str) -> NodeSpec {
    NodeSpec::new(NodeKind::Element, Some(QName::local(name)), String::new())
}

pub fn attr(name: &str, value: &str) -> NodeSpec {
    NodeSpec::new(
        NodeKind::Attribute,
        Some(QName::local(name)),
        value.to_string(),
    )
}

pub fn text(value: &str) -> NodeSpec {
    NodeSpec::new(NodeKind::Text, None, value.to_string())
}

pub fn comment(value: &str) -> NodeSpec {
    NodeSpec::new(NodeKind::Comment, None, value.to_string())
}

pub fn pi(target: &str, data: &str) -> NodeSpec {
    NodeSpec::new(
        NodeKind::ProcessingInstruction,
        Some(QName::local(target)),
        data.to_string(),
    )
}

pub fn ns(prefix: &str, uri: &str) -> NodeSpec {
    let name = QName {
        prefix: Some(prefix.to_string()),
        local: prefix.to_string(),
        ns_uri: Some(uri.to_string()),
    };
    NodeSpec::new(NodeKind::Namespace, Some(name), uri.to_string())
}

impl NodeSpec {
    fn new(kind: NodeKind, name: Option<QName>, value: String) -> Self {
        Self {
            kind,
            name,
            value,
            typed: None,
            attrs: Vec::new(),
            namespaces: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn child(mut self, child: NodeSpec) -> Self {
        self.children.push(child);
        self
    }

    pub fn attr(mut self, attr: NodeSpec) -> Self {
        debug_assert!(attr.kind == NodeKind::Attribute);
        self.attrs.push(attr);
        self
    }

    pub fn namespace(mut self, ns: NodeSpec) -> Self {
        debug_assert!(ns.kind == NodeKind::Namespace);
        self.namespaces.push(ns);
        self
    }

    /// Explicit typed value returned by atomization, instead of the
    /// untyped default.
    pub fn typed(mut self, value: Atomic) -> Self {
        self.typed = Some(value);
        self
    }

    /// Flattens the description into an arena and returns a cursor on the
    /// root.
    pub fn build(self) -> SimpleCursor {
        let mut nodes = Vec::new();
        flatten(self, None, &mut nodes);
        SimpleCursor {
            tree: Arc::new(nodes),
            idx: 0,
        }
    }
}

struct NodeData {
    kind: NodeKind,
    name: Option<QName>,
    value: String,
    typed: Option<Atomic>,
    parent: Option<usize>,
    first_child: Option<usize>,
    /// Also links attribute and namespace lists; those nodes never occur
    /// in a child sibling chain.
    next_sibling: Option<usize>,
    first_attr: Option<usize>,
    first_ns: Option<usize>,
}

fn flatten(spec: NodeSpec, parent: Option<usize>, nodes: &mut Vec<NodeData>) -> usize {
    let idx = nodes.len();
    nodes.push(NodeData {
        kind: spec.kind,
        name: spec.name,
        value: spec.value,
        typed: spec.typed,
        parent,
        first_child: None,
        next_sibling: None,
        first_attr: None,
        first_ns: None,
    });
    let mut prev: Option<usize> = None;
    for a in spec.attrs {
        let ai = flatten(a, Some(idx), nodes);
        match prev {
            None => nodes[idx].first_attr = Some(ai),
            Some(p) => nodes[p].next_sibling = Some(ai),
        }
        prev = Some(ai);
    }
    prev = None;
    for n in spec.namespaces {
        let ni = flatten(n, Some(idx), nodes);
        match prev {
            None => nodes[idx].first_ns = Some(ni),
            Some(p) => nodes[p].next_sibling = Some(ni),
        }
        prev = Some(ni);
    }
    prev = None;
    for c in spec.children {
        let ci = flatten(c, Some(idx), nodes);
        match prev {
            None => nodes[idx].first_child = Some(ci),
            Some(p) => nodes[p].next_sibling = Some(ci),
        }
        prev = Some(ci);
    }
    idx
}

/// Cursor over a [`NodeSpec::build`] arena. Cloning is O(1).
#[derive(Clone)]
pub struct SimpleCursor {
    tree: Arc<Vec<NodeData>>,
    idx: usize,
}

impl SimpleCursor {
    fn node(&self) -> &NodeData {
        &self.tree[self.idx]
    }

    fn goto(&mut self, target: Option<usize>) -> bool {
        match target {
            Some(idx) => {
                self.idx = idx;
                true
            }
            None => false,
        }
    }

    fn collect_text(&self, idx: usize, out: &mut String) {
        let node = &self.tree[idx];
        match node.kind {
            NodeKind::Text => out.push_str(&node.value),
            NodeKind::Document | NodeKind::Element => {
                let mut child = node.first_child;
                while let Some(c) = child {
                    self.collect_text(c, out);
                    child = self.tree[c].next_sibling;
                }
            }
            _ => {}
        }
    }
}

impl std::fmt::Debug for SimpleCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleCursor")
            .field("idx", &self.idx)
            .field("kind", &self.node().kind)
            .field("name", &self.node().name)
            .finish()
    }
}

impl TreeCursor for SimpleCursor {
    fn node_kind(&self) -> NodeKind {
        self.node().kind
    }

    fn name(&self) -> Option<QName> {
        self.node().name.clone()
    }

    fn string_value(&self) -> String {
        match self.node().kind {
            NodeKind::Document | NodeKind::Element => {
                let mut out = String::new();
                self.collect_text(self.idx, &mut out);
                out
            }
            _ => self.node().value.clone(),
        }
    }

    fn typed_value(&self) -> Atomic {
        match &self.node().typed {
            Some(v) => v.clone(),
            None => Atomic::Untyped(self.string_value()),
        }
    }

    fn move_to_parent(&mut self) -> bool {
        self.goto(self.node().parent)
    }

    fn move_to_first_child(&mut self) -> bool {
        self.goto(self.node().first_child)
    }

    fn move_to_next_sibling(&mut self) -> bool {
        if matches!(self.node().kind, NodeKind::Attribute | NodeKind::Namespace) {
            return false;
        }
        self.goto(self.node().next_sibling)
    }

    fn move_to_first_attribute(&mut self) -> bool {
        self.goto(self.node().first_attr)
    }

    fn move_to_next_attribute(&mut self) -> bool {
        if self.node().kind != NodeKind::Attribute {
            return false;
        }
        self.goto(self.node().next_sibling)
    }

    fn move_to_first_namespace(&mut self) -> bool {
        self.goto(self.node().first_ns)
    }

    fn move_to_next_namespace(&mut self) -> bool {
        if self.node().kind != NodeKind::Namespace {
            return false;
        }
        self.goto(self.node().next_sibling)
    }

    fn is_same_position(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.tree, &other.tree) && self.idx == other.idx
    }

    fn compare_position(&self, other: &Self) -> Option<Ordering> {
        Arc::ptr_eq(&self.tree, &other.tree).then(|| self.idx.cmp(&other.idx))
    }
}
