//! Expression tree with a two-phase protocol: one static `bind` pass, then
//! any number of side-effect-free `execute` calls.
//!
//! `bind` resolves variable references to data-pool slots, computes
//! context-sensitivity bottom-up, analyzes path orderedness and applies the
//! child-over-descendants fusion rewrite. `execute` never mutates bind-time
//! metadata; sub-expressions that lazy cursors re-evaluate are held behind
//! `Arc`, which is also what makes cursor clones cheap.

pub mod cursors;
pub mod path;

use std::sync::Arc;

use crate::error::Error;
use crate::iter::{ConcatCursor, RangeCursor};
use crate::model::TreeCursor;
use crate::runtime::{
    DataPool, EvalContext, ExpandedName, FunctionDescriptor, FunctionTable, Slot, Value,
    VariableScope,
};
use crate::value::{self, Atomic, ValueCode};

use cursors::{ForCursor, PredicateCursor};
use path::{PathStart, PathStep};

/// Arithmetic operators dispatched through the value tower.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    IntegerDiv,
    Mod,
}

/// Atomizing value comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Singleton-node comparisons: identity and document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCompOp {
    Is,
    Before,
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Minus,
    Plus,
}

/// Coarse static result classification, available after bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Boolean,
    Numeric,
    String,
    NodeSet,
    Sequence,
    Unknown,
}

/// One expression node. Built once by the external compiler, bound once,
/// executed arbitrarily often.
pub struct Expr<C: TreeCursor> {
    kind: ExprKind<C>,
    bound: bool,
    ctx_sensitive: bool,
}

pub enum ExprKind<C: TreeCursor> {
    Literal(Atomic),
    ContextItem,
    VarRef {
        name: String,
        slot: Option<Slot>,
    },
    Unary {
        op: UnaryOp,
        operand: Arc<Expr<C>>,
    },
    Arithmetic {
        op: ArithOp,
        left: Arc<Expr<C>>,
        right: Arc<Expr<C>>,
    },
    Comparison {
        op: CompOp,
        left: Arc<Expr<C>>,
        right: Arc<Expr<C>>,
    },
    NodeComp {
        op: NodeCompOp,
        left: Arc<Expr<C>>,
        right: Arc<Expr<C>>,
    },
    And {
        left: Arc<Expr<C>>,
        right: Arc<Expr<C>>,
    },
    Or {
        left: Arc<Expr<C>>,
        right: Arc<Expr<C>>,
    },
    If {
        cond: Arc<Expr<C>>,
        then_branch: Arc<Expr<C>>,
        else_branch: Arc<Expr<C>>,
    },
    For {
        var: String,
        slot: Option<Slot>,
        source: Arc<Expr<C>>,
        body: Arc<Expr<C>>,
    },
    Path {
        start: PathStart<C>,
        steps: Option<Arc<PathStep<C>>>,
        /// Proven in document order without duplicates; set at bind time.
        ordered: bool,
    },
    Filter {
        base: Arc<Expr<C>>,
        predicate: Arc<Expr<C>>,
        /// Literal integer predicate recognized at bind time; runs as a
        /// position filter instead of a per-item evaluation.
        literal_pos: Option<i64>,
    },
    FunctionCall {
        descriptor: FunctionDescriptor<C>,
        args: Vec<Arc<Expr<C>>>,
    },
    Range {
        start: Arc<Expr<C>>,
        end: Arc<Expr<C>>,
    },
    Sequence(Vec<Arc<Expr<C>>>),
}

fn child_mut<C: TreeCursor>(child: &mut Arc<Expr<C>>) -> Result<&mut Expr<C>, Error> {
    // Exclusive ownership holds until the first execute hands clones to
    // lazy cursors; a shared child here means the node was already bound.
    Arc::get_mut(child).ok_or(Error::AlreadyBound)
}

impl<C: TreeCursor> Expr<C> {
    fn new(kind: ExprKind<C>) -> Self {
        Self {
            kind,
            bound: false,
            ctx_sensitive: false,
        }
    }

    pub fn literal(value: Atomic) -> Self {
        Self::new(ExprKind::Literal(value))
    }

    pub fn integer(value: i64) -> Self {
        Self::literal(Atomic::Integer(value))
    }

    pub fn context_item() -> Self {
        Self::new(ExprKind::ContextItem)
    }

    pub fn var(name: impl Into<String>) -> Self {
        Self::new(ExprKind::VarRef {
            name: name.into(),
            slot: None,
        })
    }

    pub fn unary(op: UnaryOp, operand: Expr<C>) -> Self {
        Self::new(ExprKind::Unary {
            op,
            operand: Arc::new(operand),
        })
    }

    pub fn arithmetic(op: ArithOp, left: Expr<C>, right: Expr<C>) -> Self {
        Self::new(ExprKind::Arithmetic {
            op,
            left: Arc::new(left),
            right: Arc::new(right),
        })
    }

    pub fn comparison(op: CompOp, left: Expr<C>, right: Expr<C>) -> Self {
        Self::new(ExprKind::Comparison {
            op,
            left: Arc::new(left),
            right: Arc::new(right),
        })
    }

    pub fn node_comparison(op: NodeCompOp, left: Expr<C>, right: Expr<C>) -> Self {
        Self::new(ExprKind::NodeComp {
            op,
            left: Arc::new(left),
            right: Arc::new(right),
        })
    }

    pub fn and(left: Expr<C>, right: Expr<C>) -> Self {
        Self::new(ExprKind::And {
            left: Arc::new(left),
            right: Arc::new(right),
        })
    }

    pub fn or(left: Expr<C>, right: Expr<C>) -> Self {
        Self::new(ExprKind::Or {
            left: Arc::new(left),
            right: Arc::new(right),
        })
    }

    pub fn if_then_else(cond: Expr<C>, then_branch: Expr<C>, else_branch: Expr<C>) -> Self {
        Self::new(ExprKind::If {
            cond: Arc::new(cond),
            then_branch: Arc::new(then_branch),
            else_branch: Arc::new(else_branch),
        })
    }

    pub fn for_in(var: impl Into<String>, source: Expr<C>, body: Expr<C>) -> Self {
        Self::new(ExprKind::For {
            var: var.into(),
            slot: None,
            source: Arc::new(source),
            body: Arc::new(body),
        })
    }

    pub fn path(start: PathStart<C>, steps: Option<PathStep<C>>) -> Self {
        Self::new(ExprKind::Path {
            start,
            steps: steps.map(Arc::new),
            ordered: false,
        })
    }

    pub fn filter(base: Expr<C>, predicate: Expr<C>) -> Self {
        Self::new(ExprKind::Filter {
            base: Arc::new(base),
            predicate: Arc::new(predicate),
            literal_pos: None,
        })
    }

    /// Resolves the callee immediately; an unknown (name, arity) pair is a
    /// construction-time failure, not an execution-time one.
    pub fn function_call(
        table: &dyn FunctionTable<C>,
        name: ExpandedName,
        args: Vec<Expr<C>>,
    ) -> Result<Self, Error> {
        let descriptor =
            table
                .resolve(&name, args.len())
                .ok_or_else(|| Error::UndefinedFunction {
                    name: name.to_string(),
                    arity: args.len(),
                })?;
        Ok(Self::new(ExprKind::FunctionCall {
            descriptor,
            args: args.into_iter().map(Arc::new).collect(),
        }))
    }

    pub fn range(start: Expr<C>, end: Expr<C>) -> Self {
        Self::new(ExprKind::Range {
            start: Arc::new(start),
            end: Arc::new(end),
        })
    }

    pub fn sequence(children: Vec<Expr<C>>) -> Self {
        Self::new(ExprKind::Sequence(
            children.into_iter().map(Arc::new).collect(),
        ))
    }

    pub fn kind(&self) -> &ExprKind<C> {
        &self.kind
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Whether execution reads the ambient context item, position or size.
    pub fn is_context_sensitive(&self) -> bool {
        self.ctx_sensitive
    }

    /// Static analysis pass. Children bind first; `for` pushes its loop
    /// variable after binding the iteration source and pops it after the
    /// body, so shadowing across nested loops resolves lexically.
    pub fn bind(&mut self, scope: &mut VariableScope) -> Result<(), Error> {
        if self.bound {
            return Err(Error::AlreadyBound);
        }
        let ctx_sensitive = match &mut self.kind {
            ExprKind::Literal(_) => false,
            ExprKind::ContextItem => true,
            ExprKind::VarRef { name, slot } => {
                *slot = Some(
                    scope
                        .resolve(name)
                        .ok_or_else(|| Error::UndeclaredVariable(name.clone()))?,
                );
                false
            }
            ExprKind::Unary { operand, .. } => {
                let operand = child_mut(operand)?;
                operand.bind(scope)?;
                operand.ctx_sensitive
            }
            ExprKind::Arithmetic { left, right, .. }
            | ExprKind::Comparison { left, right, .. }
            | ExprKind::NodeComp { left, right, .. }
            | ExprKind::And { left, right }
            | ExprKind::Or { left, right }
            | ExprKind::Range {
                start: left,
                end: right,
            } => {
                let l = child_mut(left)?;
                l.bind(scope)?;
                let l_sensitive = l.ctx_sensitive;
                let r = child_mut(right)?;
                r.bind(scope)?;
                l_sensitive || r.ctx_sensitive
            }
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let mut sensitive = false;
                for child in [cond, then_branch, else_branch] {
                    let child = child_mut(child)?;
                    child.bind(scope)?;
                    sensitive |= child.ctx_sensitive;
                }
                sensitive
            }
            ExprKind::For {
                var,
                slot,
                source,
                body,
            } => {
                let src = child_mut(source)?;
                src.bind(scope)?;
                let src_sensitive = src.ctx_sensitive;
                *slot = Some(scope.push(var.clone()));
                let b = child_mut(body)?;
                let result = b.bind(scope);
                scope.pop();
                result?;
                src_sensitive || b.ctx_sensitive
            }
            ExprKind::Path {
                start,
                steps,
                ordered,
            } => {
                let start_sensitive = match start {
                    PathStart::ContextNode => true,
                    PathStart::Expr(e) => {
                        let e = child_mut(e)?;
                        e.bind(scope)?;
                        e.ctx_sensitive
                    }
                };
                if let Some(head) = steps {
                    path::bind_steps(head, scope)?;
                    path::fuse_steps(steps);
                }
                *ordered = path::is_ordered(start, steps.as_ref());
                start_sensitive
            }
            ExprKind::Filter {
                base,
                predicate,
                literal_pos,
            } => {
                let b = child_mut(base)?;
                b.bind(scope)?;
                let b_sensitive = b.ctx_sensitive;
                let p = child_mut(predicate)?;
                p.bind(scope)?;
                *literal_pos = match &p.kind {
                    ExprKind::Literal(a) => a.as_position(),
                    _ => None,
                };
                // The predicate's own context is the candidate item, not
                // the ambient focus.
                b_sensitive
            }
            ExprKind::FunctionCall { args, .. } => {
                let mut sensitive = false;
                for arg in args {
                    let arg = child_mut(arg)?;
                    arg.bind(scope)?;
                    sensitive |= arg.ctx_sensitive;
                }
                sensitive
            }
            ExprKind::Sequence(children) => {
                let mut sensitive = false;
                for child in children {
                    let child = child_mut(child)?;
                    child.bind(scope)?;
                    sensitive |= child.ctx_sensitive;
                }
                sensitive
            }
        };
        self.ctx_sensitive = ctx_sensitive;
        self.bound = true;
        Ok(())
    }

    /// Coarse result classification for bound expressions.
    pub fn static_return_type(&self) -> TypeTag {
        match &self.kind {
            ExprKind::Literal(a) => match a.code() {
                ValueCode::Boolean => TypeTag::Boolean,
                ValueCode::String | ValueCode::Untyped | ValueCode::AnyUri => TypeTag::String,
                code if code.is_numeric() => TypeTag::Numeric,
                _ => TypeTag::Unknown,
            },
            ExprKind::Unary { .. } | ExprKind::Arithmetic { .. } => TypeTag::Numeric,
            ExprKind::Comparison { .. }
            | ExprKind::NodeComp { .. }
            | ExprKind::And { .. }
            | ExprKind::Or { .. } => TypeTag::Boolean,
            ExprKind::Path { .. } => TypeTag::NodeSet,
            ExprKind::Range { .. } | ExprKind::Sequence(_) | ExprKind::For { .. } => {
                TypeTag::Sequence
            }
            ExprKind::Filter { base, .. } => base.static_return_type(),
            ExprKind::FunctionCall { descriptor, .. } => descriptor.result_type,
            ExprKind::If { then_branch, else_branch, .. } => {
                let t = then_branch.static_return_type();
                if t == else_branch.static_return_type() {
                    t
                } else {
                    TypeTag::Unknown
                }
            }
            _ => TypeTag::Unknown,
        }
    }

    /// Dynamic evaluation. Requires a completed `bind`; never mutates the
    /// tree, so a bound expression can be re-executed and shared.
    pub fn execute(
        self: &Arc<Self>,
        ctx: &EvalContext<C>,
        pool: &mut DataPool<C>,
    ) -> Result<Value<C>, Error> {
        if !self.bound {
            return Err(Error::NotBound);
        }
        let registry = ctx.registry();
        match &self.kind {
            ExprKind::Literal(a) => Ok(Value::Atomic(a.clone())),
            ExprKind::ContextItem => Ok(match ctx.item()? {
                crate::iter::Item::Node(n) => Value::Node(n.clone()),
                crate::iter::Item::Atomic(a) => Value::Atomic(a.clone()),
            }),
            ExprKind::VarRef { slot, name } => {
                let slot = slot.ok_or(Error::NotBound)?;
                pool.get(slot)
                    .map_err(|_| Error::UndeclaredVariable(name.clone()))
                    .cloned()
            }
            ExprKind::Unary { op, operand } => {
                let Some(v) = operand.execute(ctx, pool)?.atomize_single()? else {
                    return Ok(Value::Empty);
                };
                match op {
                    UnaryOp::Minus => Ok(Value::Atomic(value::neg(&v)?)),
                    UnaryOp::Plus => {
                        if v.is_numeric() {
                            Ok(Value::Atomic(v))
                        } else {
                            Err(Error::OperatorNotDefined {
                                op: "+",
                                left: v.type_name(),
                                right: "()",
                            })
                        }
                    }
                }
            }
            ExprKind::Arithmetic { op, left, right } => {
                let Some(l) = left.execute(ctx, pool)?.atomize_single()? else {
                    return Ok(Value::Empty);
                };
                let Some(r) = right.execute(ctx, pool)?.atomize_single()? else {
                    return Ok(Value::Empty);
                };
                let result = match op {
                    ArithOp::Add => value::add(registry, &l, &r)?,
                    ArithOp::Sub => value::sub(registry, &l, &r)?,
                    ArithOp::Mul => value::mul(registry, &l, &r)?,
                    ArithOp::Div => value::div(registry, &l, &r)?,
                    ArithOp::IntegerDiv => value::idiv(registry, &l, &r)?,
                    ArithOp::Mod => value::rem(registry, &l, &r)?,
                };
                Ok(Value::Atomic(result))
            }
            ExprKind::Comparison { op, left, right } => {
                let Some(l) = left.execute(ctx, pool)?.atomize_single()? else {
                    return Ok(Value::Empty);
                };
                let Some(r) = right.execute(ctx, pool)?.atomize_single()? else {
                    return Ok(Value::Empty);
                };
                let b = match op {
                    CompOp::Eq => value::eq(registry, &l, &r)?,
                    CompOp::Ne => !value::eq(registry, &l, &r)?,
                    CompOp::Lt => value::gt(registry, &r, &l)?,
                    CompOp::Gt => value::gt(registry, &l, &r)?,
                    CompOp::Le => value::eq(registry, &l, &r)? || value::gt(registry, &r, &l)?,
                    CompOp::Ge => value::eq(registry, &l, &r)? || value::gt(registry, &l, &r)?,
                };
                Ok(Value::Atomic(Atomic::Boolean(b)))
            }
            ExprKind::NodeComp { op, left, right } => {
                let Some(l) = single_node(left.execute(ctx, pool)?)? else {
                    return Ok(Value::Empty);
                };
                let Some(r) = single_node(right.execute(ctx, pool)?)? else {
                    return Ok(Value::Empty);
                };
                let b = match op {
                    NodeCompOp::Is => l.is_same_position(&r),
                    NodeCompOp::Before => {
                        l.compare_position(&r) == Some(std::cmp::Ordering::Less)
                    }
                    NodeCompOp::After => {
                        l.compare_position(&r) == Some(std::cmp::Ordering::Greater)
                    }
                };
                Ok(Value::Atomic(Atomic::Boolean(b)))
            }
            ExprKind::And { left, right } => {
                let b = left.execute(ctx, pool)?.effective_boolean()?
                    && right.execute(ctx, pool)?.effective_boolean()?;
                Ok(Value::Atomic(Atomic::Boolean(b)))
            }
            ExprKind::Or { left, right } => {
                let b = left.execute(ctx, pool)?.effective_boolean()?
                    || right.execute(ctx, pool)?.effective_boolean()?;
                Ok(Value::Atomic(Atomic::Boolean(b)))
            }
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if cond.execute(ctx, pool)?.effective_boolean()? {
                    then_branch.execute(ctx, pool)
                } else {
                    else_branch.execute(ctx, pool)
                }
            }
            ExprKind::For {
                slot, source, body, ..
            } => {
                let slot = slot.ok_or(Error::NotBound)?;
                let src = source.execute(ctx, pool)?.into_cursor();
                Ok(Value::Sequence(Box::new(ForCursor::new(
                    slot,
                    src,
                    Arc::clone(body),
                    ctx.clone(),
                    pool.clone(),
                ))))
            }
            ExprKind::Path {
                start,
                steps,
                ordered,
            } => path::execute_path(start, steps.as_ref(), *ordered, ctx, pool),
            ExprKind::Filter {
                base,
                predicate,
                literal_pos,
            } => {
                let base = base.execute(ctx, pool)?.into_cursor();
                if let Some(k) = literal_pos {
                    return Ok(Value::Sequence(Box::new(
                        crate::iter::PositionFilterCursor::new(base, *k),
                    )));
                }
                Ok(Value::Sequence(Box::new(PredicateCursor::new(
                    base,
                    Arc::clone(predicate),
                    ctx.clone(),
                    pool.clone(),
                ))))
            }
            ExprKind::FunctionCall { descriptor, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(arg.execute(ctx, pool)?);
                }
                descriptor.invoke(ctx, &values)
            }
            ExprKind::Range { start, end } => {
                let Some(s) = start.execute(ctx, pool)?.atomize_single()? else {
                    return Ok(Value::Empty);
                };
                let Some(e) = end.execute(ctx, pool)?.atomize_single()? else {
                    return Ok(Value::Empty);
                };
                let (s, e) = match (s.as_position(), e.as_position()) {
                    (Some(s), Some(e)) => (s, e),
                    _ => {
                        return Err(Error::type_mismatch(
                            "range bounds must be integers",
                        ));
                    }
                };
                Ok(Value::Sequence(Box::new(RangeCursor::new(s, e))))
            }
            ExprKind::Sequence(children) => match children.as_slice() {
                [] => Ok(Value::Empty),
                [only] => only.execute(ctx, pool),
                many => {
                    let mut parts = Vec::with_capacity(many.len());
                    for child in many {
                        parts.push(child.execute(ctx, pool)?.into_cursor());
                    }
                    Ok(Value::Sequence(Box::new(ConcatCursor::new(parts))))
                }
            },
        }
    }
}

/// Singleton-node coercion for `is` / `<<` / `>>`. Empty stays empty; a
/// longer sequence or an atomic operand is rejected.
fn single_node<C: TreeCursor>(value: Value<C>) -> Result<Option<C>, Error> {
    match value {
        Value::Empty => Ok(None),
        Value::Node(n) => Ok(Some(n)),
        Value::Atomic(a) => Err(Error::type_mismatch(format!(
            "node comparison requires nodes, found {}",
            a.type_name()
        ))),
        Value::Sequence(mut s) => {
            let Some(first) = s.next_item() else {
                return Ok(None);
            };
            let first = first?;
            if let Some(second) = s.next_item() {
                second?;
                return Err(Error::cardinality(
                    "node comparison requires a singleton",
                ));
            }
            match first {
                crate::iter::Item::Node(n) => Ok(Some(n)),
                crate::iter::Item::Atomic(a) => Err(Error::type_mismatch(format!(
                    "node comparison requires nodes, found {}",
                    a.type_name()
                ))),
            }
        }
    }
}

/// Convenience entry point: bind with a fresh scope, returning the
/// expression wrapped for execution plus the data-pool size it needs.
pub fn bind_root<C: TreeCursor>(mut expr: Expr<C>) -> Result<(Arc<Expr<C>>, usize), Error> {
    let mut scope = VariableScope::new();
    expr.bind(&mut scope)?;
    Ok((Arc::new(expr), scope.pool_size()))
}

/// Binds and executes in one call with a default-registry context.
pub fn evaluate<C: TreeCursor>(expr: Expr<C>, ctx: &EvalContext<C>) -> Result<Value<C>, Error> {
    let (expr, pool_size) = bind_root(expr)?;
    let mut pool = DataPool::new(pool_size);
    expr.execute(ctx, &mut pool)
}
