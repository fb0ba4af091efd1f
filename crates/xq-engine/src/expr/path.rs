//! Path expressions: the step chain, its bind-time analysis and the
//! iterator pipeline that executes it.
//!
//! A path is a singly-linked chain of steps. Each step wraps the previous
//! step's output as its base sequence; the whole pipeline is wrapped in the
//! document-order normalizer unless the bind-time analysis proved the chain
//! already ordered and duplicate-free.

use std::sync::Arc;

use tracing::debug;

use crate::error::Error;
use crate::iter::axes::{Axis, AxisCursor, NodeTest};
use crate::iter::fused::ChildOverDescendantsCursor;
use crate::iter::{
    BoxedCursor, DocOrderCursor, Item, ItemResult, PositionFilterCursor, SequenceCursor,
    SingleItemCursor,
};
use crate::model::TreeCursor;
use crate::runtime::{DataPool, EvalContext, Value, VariableScope};

use super::Expr;

/// What the first step evaluates against.
pub enum PathStart<C: TreeCursor> {
    /// The single current context node.
    ContextNode,
    /// An embedded sub-expression producing the base sequence.
    Expr(Arc<Expr<C>>),
}

/// One element of the step chain.
pub struct PathStep<C: TreeCursor> {
    pub kind: StepKind<C>,
    /// Embedded `[N]` position filter applied per context node.
    pub position: Option<i64>,
    pub next: Option<Arc<PathStep<C>>>,
}

pub enum StepKind<C: TreeCursor> {
    Axis { axis: Axis, test: NodeTest },
    /// Dynamic segment: a sub-expression evaluated once per base item.
    Expr(Arc<Expr<C>>),
    /// Bind-time fusion of a descendant-class step and its trailing pure
    /// child steps into one traversal.
    FusedChildren {
        or_self: bool,
        head: NodeTest,
        tail: Vec<NodeTest>,
    },
}

impl<C: TreeCursor> PathStep<C> {
    pub fn axis(axis: Axis, test: NodeTest) -> Self {
        Self {
            kind: StepKind::Axis { axis, test },
            position: None,
            next: None,
        }
    }

    pub fn expr(expr: Expr<C>) -> Self {
        Self {
            kind: StepKind::Expr(Arc::new(expr)),
            position: None,
            next: None,
        }
    }

    pub fn at_position(mut self, position: i64) -> Self {
        self.position = Some(position);
        self
    }

    /// Appends `next` at the end of this chain.
    pub fn then(mut self, next: PathStep<C>) -> Self {
        let mut tail = &mut self.next;
        while let Some(step) = tail {
            let step = Arc::get_mut(step)
                .unwrap_or_else(|| unreachable!("chain under construction is unshared"));
            tail = &mut step.next;
        }
        *tail = Some(Arc::new(next));
        self
    }
}

/// Binds every expression step in the chain.
pub(super) fn bind_steps<C: TreeCursor>(
    head: &mut Arc<PathStep<C>>,
    scope: &mut VariableScope,
) -> Result<(), Error> {
    let mut cur = head;
    loop {
        let step = Arc::get_mut(cur).ok_or(Error::AlreadyBound)?;
        if let StepKind::Expr(e) = &mut step.kind {
            super::child_mut(e)?.bind(scope)?;
        }
        match &mut step.next {
            Some(next) => cur = next,
            None => return Ok(()),
        }
    }
}

/// In-place fusion rewrite: a descendant or descendant-or-self step with no
/// position filter, followed by two or more pure child steps, collapses
/// into one [`StepKind::FusedChildren`]. Runs once, at bind time.
pub(super) fn fuse_steps<C: TreeCursor>(slot: &mut Option<Arc<PathStep<C>>>) {
    let Some(arc) = slot.take() else {
        return;
    };
    let mut step = match Arc::try_unwrap(arc) {
        Ok(step) => step,
        Err(shared) => {
            *slot = Some(shared);
            return;
        }
    };
    if let StepKind::Axis { axis, test } = &step.kind {
        if matches!(axis, Axis::Descendant | Axis::DescendantOrSelf) && step.position.is_none() {
            let mut tail = Vec::new();
            let mut cursor = &step.next;
            while let Some(n) = cursor {
                match &n.kind {
                    StepKind::Axis {
                        axis: Axis::Child,
                        test,
                    } if n.position.is_none() => {
                        tail.push(test.clone());
                        cursor = &n.next;
                    }
                    _ => break,
                }
            }
            if tail.len() >= 2 {
                let or_self = *axis == Axis::DescendantOrSelf;
                let head = test.clone();
                let mut rest = step.next.clone();
                for _ in 0..tail.len() {
                    rest = rest.and_then(|s| s.next.clone());
                }
                debug!(steps = tail.len() + 1, "fused child-over-descendants run");
                step = PathStep {
                    kind: StepKind::FusedChildren {
                        or_self,
                        head,
                        tail,
                    },
                    position: None,
                    next: rest,
                };
            }
        }
    }
    fuse_steps(&mut step.next);
    *slot = Some(Arc::new(step));
}

/// Orderedness analysis over the rewritten chain. A chain stays an ordered
/// set only while every step maps a document-ordered base to disjoint,
/// document-ordered per-item results: subtree-partitioning axes (child,
/// attribute, self) always do; one descendant-class step may, but nothing
/// except attribute/self steps can follow it; the sibling/following axes
/// overlap across a multi-node base and qualify only while the base is
/// still a single node.
pub(super) fn is_ordered<C: TreeCursor>(
    start: &PathStart<C>,
    mut cur: Option<&Arc<PathStep<C>>>,
) -> bool {
    if matches!(start, PathStart::Expr(_)) {
        return false;
    }
    // Whether the sequence feeding the current step can hold more than
    // one node.
    let mut multi = false;
    let mut after_descendant = false;
    while let Some(step) = cur {
        match &step.kind {
            StepKind::Expr(_) => return false,
            StepKind::Axis { axis, .. } => {
                if axis.is_reversing() {
                    return false;
                }
                if after_descendant && !matches!(axis, Axis::Attribute | Axis::SelfAxis) {
                    return false;
                }
                match axis {
                    Axis::Child | Axis::Attribute | Axis::SelfAxis => {}
                    Axis::Descendant | Axis::DescendantOrSelf => after_descendant = true,
                    // The in-scope namespace list interleaves inherited
                    // nodes and is not emitted in document order.
                    Axis::Namespace => return false,
                    Axis::Following | Axis::FollowingSibling => {
                        if multi {
                            return false;
                        }
                        if *axis == Axis::Following {
                            after_descendant = true;
                        }
                    }
                    Axis::Parent
                    | Axis::Ancestor
                    | Axis::AncestorOrSelf
                    | Axis::Preceding
                    | Axis::PrecedingSibling => return false,
                }
                if *axis != Axis::SelfAxis {
                    multi = true;
                }
            }
            StepKind::FusedChildren { .. } => {
                // A fused run is a single pre-order walk, ordered by
                // itself, but anything below it reopens subtrees.
                if after_descendant {
                    return false;
                }
                after_descendant = true;
                multi = true;
            }
        }
        cur = step.next.as_ref();
    }
    true
}

/// Assembles and returns the pipeline for one execution.
pub(super) fn execute_path<C: TreeCursor>(
    start: &PathStart<C>,
    steps: Option<&Arc<PathStep<C>>>,
    ordered: bool,
    ctx: &EvalContext<C>,
    pool: &mut DataPool<C>,
) -> Result<Value<C>, Error> {
    let mut cursor: BoxedCursor<C> = match start {
        PathStart::ContextNode => {
            Box::new(SingleItemCursor::new(Item::Node(ctx.node()?.clone())))
        }
        PathStart::Expr(e) => e.execute(ctx, pool)?.into_cursor(),
    };
    let mut cur = steps;
    while let Some(step) = cur {
        cursor = Box::new(StepCursor::new(
            cursor,
            Arc::clone(step),
            ctx.clone(),
            pool.clone(),
        ));
        cur = step.next.as_ref();
    }
    if ordered {
        Ok(Value::Sequence(cursor))
    } else {
        Ok(Value::Sequence(Box::new(DocOrderCursor::new(cursor))))
    }
}

/// Applies one step to every item of its base sequence, concatenating the
/// per-item traversals in base order.
pub struct StepCursor<C: TreeCursor> {
    base: BoxedCursor<C>,
    step: Arc<PathStep<C>>,
    ctx: EvalContext<C>,
    pool: DataPool<C>,
    current: Option<BoxedCursor<C>>,
    base_pos: i64,
    failed: bool,
}

impl<C: TreeCursor> StepCursor<C> {
    pub(super) fn new(
        base: BoxedCursor<C>,
        step: Arc<PathStep<C>>,
        ctx: EvalContext<C>,
        pool: DataPool<C>,
    ) -> Self {
        Self {
            base,
            step,
            ctx,
            pool,
            current: None,
            base_pos: 0,
            failed: false,
        }
    }

    fn open(&mut self, item: Item<C>) -> Result<BoxedCursor<C>, Error> {
        let inner: BoxedCursor<C> = match &self.step.kind {
            StepKind::Axis { axis, test } => match item {
                Item::Node(node) => Box::new(AxisCursor::new(&node, *axis, test.clone())),
                Item::Atomic(a) => {
                    return Err(Error::type_mismatch(format!(
                        "axis step requires nodes, found {}",
                        a.type_name()
                    )));
                }
            },
            StepKind::FusedChildren {
                or_self,
                head,
                tail,
            } => match item {
                Item::Node(node) => Box::new(ChildOverDescendantsCursor::new(
                    &node,
                    *or_self,
                    head.clone(),
                    tail.clone(),
                )),
                Item::Atomic(a) => {
                    return Err(Error::type_mismatch(format!(
                        "axis step requires nodes, found {}",
                        a.type_name()
                    )));
                }
            },
            StepKind::Expr(expr) => {
                let ctx = self.ctx.refocus(item, self.base_pos, 0);
                expr.execute(&ctx, &mut self.pool)?.into_cursor()
            }
        };
        Ok(match self.step.position {
            Some(k) => Box::new(PositionFilterCursor::new(inner, k)),
            None => inner,
        })
    }
}

impl<C: TreeCursor> SequenceCursor<C> for StepCursor<C> {
    fn next_item(&mut self) -> Option<ItemResult<C>> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(current) = &mut self.current {
                if let Some(item) = current.next_item() {
                    return Some(item);
                }
                self.current = None;
            }
            let item = match self.base.next_item()? {
                Ok(item) => item,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            };
            self.base_pos += 1;
            match self.open(item) {
                Ok(cursor) => self.current = Some(cursor),
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }

    fn boxed_clone(&self) -> BoxedCursor<C> {
        Box::new(Self {
            base: self.base.boxed_clone(),
            step: Arc::clone(&self.step),
            ctx: self.ctx.clone(),
            pool: self.pool.clone(),
            current: self.current.as_ref().map(|c| c.boxed_clone()),
            base_pos: self.base_pos,
            failed: self.failed,
        })
    }
}
