//! Dynamic evaluation state: the context item, the per-invocation data
//! pool, bind-time variable scoping and the external function table.
//!
//! A bound expression is read-only and may be re-executed freely; the data
//! pool is the only mutable state threaded through execution, and each
//! invocation supplies its own.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Error;
use crate::expr::TypeTag;
use crate::iter::{BoxedCursor, EmptyCursor, Item, SequenceCursor, SingleItemCursor};
use crate::model::TreeCursor;
use crate::value::Atomic;

/// Namespace URI plus local part; the key under which functions resolve.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpandedName {
    pub ns_uri: Option<String>,
    pub local: String,
}

impl ExpandedName {
    pub fn local(local: impl Into<String>) -> Self {
        Self {
            ns_uri: None,
            local: local.into(),
        }
    }

    pub fn ns(ns_uri: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            ns_uri: Some(ns_uri.into()),
            local: local.into(),
        }
    }
}

impl std::fmt::Display for ExpandedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.ns_uri {
            Some(ns) => write!(f, "{{{ns}}}{}", self.local),
            None => write!(f, "{}", self.local),
        }
    }
}

/// Result of executing one expression: nothing, a scalar, a positioned
/// node, or a lazy sequence the caller drains.
pub enum Value<C: TreeCursor> {
    Empty,
    Atomic(Atomic),
    Node(C),
    Sequence(BoxedCursor<C>),
}

impl<C: TreeCursor> Clone for Value<C> {
    fn clone(&self) -> Self {
        match self {
            Value::Empty => Value::Empty,
            Value::Atomic(a) => Value::Atomic(a.clone()),
            Value::Node(n) => Value::Node(n.clone()),
            Value::Sequence(s) => Value::Sequence(s.boxed_clone()),
        }
    }
}

impl<C: TreeCursor> std::fmt::Debug for Value<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Empty => f.write_str("Empty"),
            Value::Atomic(a) => f.debug_tuple("Atomic").field(a).finish(),
            Value::Node(_) => f.write_str("Node(..)"),
            Value::Sequence(_) => f.write_str("Sequence(..)"),
        }
    }
}

impl<C: TreeCursor> Value<C> {
    pub fn into_cursor(self) -> BoxedCursor<C> {
        match self {
            Value::Empty => Box::new(EmptyCursor),
            Value::Atomic(a) => Box::new(SingleItemCursor::new(Item::Atomic(a))),
            Value::Node(n) => Box::new(SingleItemCursor::new(Item::Node(n))),
            Value::Sequence(s) => s,
        }
    }

    /// Atomizes to at most one value. Empty input stays empty (absence
    /// propagates, it is not an error); more than one item is a
    /// cardinality violation.
    pub fn atomize_single(self) -> Result<Option<Atomic>, Error> {
        match self {
            Value::Empty => Ok(None),
            Value::Atomic(a) => Ok(Some(a)),
            Value::Node(n) => Ok(Some(n.typed_value())),
            Value::Sequence(mut s) => {
                let Some(first) = s.next_item() else {
                    return Ok(None);
                };
                let first = first?;
                if let Some(second) = s.next_item() {
                    second?;
                    return Err(Error::cardinality(
                        "operand atomized to more than one item",
                    ));
                }
                Ok(Some(first.atomized()))
            }
        }
    }

    /// Effective boolean value: empty is false, a single boolean is
    /// itself, a single number is a nonzero test (NaN false), a single
    /// string is a non-empty test, a single node is true. A multi-item
    /// sequence in boolean position is a cardinality violation.
    pub fn effective_boolean(self) -> Result<bool, Error> {
        let single = match self {
            Value::Empty => return Ok(false),
            Value::Atomic(a) => Item::Atomic(a),
            Value::Node(n) => Item::Node(n),
            Value::Sequence(mut s) => {
                let Some(first) = s.next_item() else {
                    return Ok(false);
                };
                let first = first?;
                if let Some(second) = s.next_item() {
                    second?;
                    return Err(Error::cardinality(
                        "effective boolean value of a multi-item sequence",
                    ));
                }
                first
            }
        };
        match single {
            Item::Node(_) => Ok(true),
            Item::Atomic(a) => match &a {
                Atomic::Boolean(b) => Ok(*b),
                Atomic::String(s) | Atomic::Untyped(s) | Atomic::AnyUri(s) => Ok(!s.is_empty()),
                _ if a.is_numeric() => Ok(!a.is_nan() && !a.is_zero()),
                _ => Err(Error::cardinality(format!(
                    "{} has no effective boolean value",
                    a.type_name()
                ))),
            },
        }
    }
}

/// Dynamic focus: the current item plus its 1-based position and the
/// context size, and the promotion registry every tower operation
/// consults.
pub struct EvalContext<C: TreeCursor> {
    item: Option<Item<C>>,
    position: i64,
    size: i64,
    registry: &'static crate::value::TypeRegistry,
}

impl<C: TreeCursor> Clone for EvalContext<C> {
    fn clone(&self) -> Self {
        Self {
            item: self.item.clone(),
            position: self.position,
            size: self.size,
            registry: self.registry,
        }
    }
}

impl<C: TreeCursor> EvalContext<C> {
    /// Context with no focus; context-sensitive expressions fail.
    pub fn detached() -> Self {
        Self {
            item: None,
            position: 0,
            size: 0,
            registry: crate::value::TypeRegistry::global(),
        }
    }

    pub fn with_node(node: C) -> Self {
        Self {
            item: Some(Item::Node(node)),
            position: 1,
            size: 1,
            registry: crate::value::TypeRegistry::global(),
        }
    }

    pub fn with_item(item: Item<C>, position: i64, size: i64) -> Self {
        Self {
            item: Some(item),
            position,
            size,
            registry: crate::value::TypeRegistry::global(),
        }
    }

    /// Refocuses on another item, keeping the registry.
    pub fn refocus(&self, item: Item<C>, position: i64, size: i64) -> Self {
        Self {
            item: Some(item),
            position,
            size,
            registry: self.registry,
        }
    }

    pub fn registry(&self) -> &'static crate::value::TypeRegistry {
        self.registry
    }

    pub fn item(&self) -> Result<&Item<C>, Error> {
        self.item.as_ref().ok_or(Error::NoContextItem)
    }

    /// The context item as a node; an atomic focus cannot start an axis.
    pub fn node(&self) -> Result<&C, Error> {
        match self.item()? {
            Item::Node(n) => Ok(n),
            Item::Atomic(a) => Err(Error::type_mismatch(format!(
                "axis step requires a node context, found {}",
                a.type_name()
            ))),
        }
    }

    pub fn position(&self) -> i64 {
        self.position
    }

    pub fn size(&self) -> i64 {
        self.size
    }
}

/// Data-pool slot index, fixed at bind time.
pub type Slot = usize;

/// Flat per-invocation variable storage indexed by [`Slot`]. Never shared
/// between concurrently running evaluations.
pub struct DataPool<C: TreeCursor> {
    slots: Vec<Value<C>>,
}

impl<C: TreeCursor> Clone for DataPool<C> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
        }
    }
}

impl<C: TreeCursor> DataPool<C> {
    pub fn new(size: usize) -> Self {
        Self {
            slots: (0..size).map(|_| Value::Empty).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, slot: Slot) -> Result<&Value<C>, Error> {
        self.slots
            .get(slot)
            .ok_or_else(|| Error::UndeclaredVariable(format!("slot {slot}")))
    }

    pub fn set(&mut self, slot: Slot, value: Value<C>) {
        if slot >= self.slots.len() {
            self.slots.resize_with(slot + 1, || Value::Empty);
        }
        self.slots[slot] = value;
    }
}

/// Bind-time lexical scope mapping variable names to pool slots.
///
/// Slots are allocated stack-style: a `for` pushes its loop variable before
/// binding the body and pops it after, so shadowing resolves to the
/// innermost binding. The high-water mark sizes the data pool.
#[derive(Debug, Clone, Default)]
pub struct VariableScope {
    stack: Vec<String>,
    high_water: usize,
}

impl VariableScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>) -> Slot {
        self.stack.push(name.into());
        self.high_water = self.high_water.max(self.stack.len());
        self.stack.len() - 1
    }

    pub fn pop(&mut self) {
        self.stack.pop();
    }

    /// Innermost binding wins.
    pub fn resolve(&self, name: &str) -> Option<Slot> {
        self.stack.iter().rposition(|n| n == name)
    }

    /// Slot count a data pool must provide for this expression.
    pub fn pool_size(&self) -> usize {
        self.high_water
    }
}

pub type Arity = usize;

pub type FunctionImpl<C> =
    Arc<dyn Fn(&EvalContext<C>, &[Value<C>]) -> Result<Value<C>, Error> + Send + Sync>;

/// Resolved callee: name, arity, declared result classification and the
/// invokable implementation.
pub struct FunctionDescriptor<C: TreeCursor> {
    pub name: ExpandedName,
    pub arity: Arity,
    pub result_type: TypeTag,
    imp: FunctionImpl<C>,
}

impl<C: TreeCursor> Clone for FunctionDescriptor<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            arity: self.arity,
            result_type: self.result_type,
            imp: Arc::clone(&self.imp),
        }
    }
}

impl<C: TreeCursor> FunctionDescriptor<C> {
    pub fn invoke(&self, ctx: &EvalContext<C>, args: &[Value<C>]) -> Result<Value<C>, Error> {
        (self.imp)(ctx, args)
    }
}

/// Resolution interface consulted once per call site, when the call
/// expression is built.
pub trait FunctionTable<C: TreeCursor> {
    fn resolve(&self, name: &ExpandedName, arity: Arity) -> Option<FunctionDescriptor<C>>;
}

/// Default table: exact (name, arity) registration.
pub struct FunctionRegistry<C: TreeCursor> {
    fns: HashMap<(ExpandedName, Arity), (FunctionImpl<C>, TypeTag)>,
}

impl<C: TreeCursor> Default for FunctionRegistry<C> {
    fn default() -> Self {
        Self {
            fns: HashMap::new(),
        }
    }
}

impl<C: TreeCursor> FunctionRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: ExpandedName,
        arity: Arity,
        result_type: TypeTag,
        imp: FunctionImpl<C>,
    ) {
        self.fns.insert((name, arity), (imp, result_type));
    }

    /// Convenience: register a plain closure under a local name.
    pub fn register_local<F>(&mut self, local: &str, arity: Arity, f: F)
    where
        F: 'static + Send + Sync + Fn(&EvalContext<C>, &[Value<C>]) -> Result<Value<C>, Error>,
    {
        self.register(
            ExpandedName::local(local),
            arity,
            TypeTag::Unknown,
            Arc::new(f),
        );
    }

    /// Convenience: register a plain closure in a namespace.
    pub fn register_ns<F>(&mut self, ns_uri: &str, local: &str, arity: Arity, f: F)
    where
        F: 'static + Send + Sync + Fn(&EvalContext<C>, &[Value<C>]) -> Result<Value<C>, Error>,
    {
        self.register(
            ExpandedName::ns(ns_uri, local),
            arity,
            TypeTag::Unknown,
            Arc::new(f),
        );
    }
}

impl<C: TreeCursor> FunctionTable<C> for FunctionRegistry<C> {
    fn resolve(&self, name: &ExpandedName, arity: Arity) -> Option<FunctionDescriptor<C>> {
        let (imp, result_type) = self.fns.get(&(name.clone(), arity))?;
        Some(FunctionDescriptor {
            name: name.clone(),
            arity,
            result_type: *result_type,
            imp: Arc::clone(imp),
        })
    }
}
