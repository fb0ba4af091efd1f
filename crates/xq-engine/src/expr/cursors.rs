//! Cursors that re-evaluate sub-expressions while being pulled: `for`
//! bodies and general predicates. Each holds its own context and data-pool
//! clone so a cursor clone is a fully independent evaluation.

use std::sync::Arc;

use crate::error::Error;
use crate::iter::{BoxedCursor, Item, ItemResult, SequenceCursor};
use crate::model::TreeCursor;
use crate::runtime::{DataPool, EvalContext, Slot, Value};

use super::Expr;

fn item_value<C: TreeCursor>(item: Item<C>) -> Value<C> {
    match item {
        Item::Node(n) => Value::Node(n),
        Item::Atomic(a) => Value::Atomic(a),
    }
}

/// Lazy `for` iteration: binds the loop variable to one source item at a
/// time and streams the body's result before pulling the next.
pub struct ForCursor<C: TreeCursor> {
    slot: Slot,
    source: BoxedCursor<C>,
    body: Arc<Expr<C>>,
    ctx: EvalContext<C>,
    pool: DataPool<C>,
    current: Option<BoxedCursor<C>>,
    failed: bool,
}

impl<C: TreeCursor> ForCursor<C> {
    pub(super) fn new(
        slot: Slot,
        source: BoxedCursor<C>,
        body: Arc<Expr<C>>,
        ctx: EvalContext<C>,
        pool: DataPool<C>,
    ) -> Self {
        Self {
            slot,
            source,
            body,
            ctx,
            pool,
            current: None,
            failed: false,
        }
    }
}

impl<C: TreeCursor> SequenceCursor<C> for ForCursor<C> {
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
            let item = match self.source.next_item()? {
                Ok(item) => item,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            };
            self.pool.set(self.slot, item_value(item));
            match self.body.execute(&self.ctx, &mut self.pool) {
                Ok(value) => self.current = Some(value.into_cursor()),
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }

    fn boxed_clone(&self) -> BoxedCursor<C> {
        Box::new(Self {
            slot: self.slot,
            source: self.source.boxed_clone(),
            body: Arc::clone(&self.body),
            ctx: self.ctx.clone(),
            pool: self.pool.clone(),
            current: self.current.as_ref().map(|c| c.boxed_clone()),
            failed: self.failed,
        })
    }
}

/// How a predicate result decides a candidate's fate. Cached across
/// candidates when the predicate is context-insensitive.
#[derive(Debug, Clone, Copy)]
enum Truth {
    Bool(bool),
    /// Numeric result: true exactly at this ordinal.
    Position(i64),
}

/// General predicate filter: evaluates the predicate per candidate with
/// the candidate as context item and its 1-based ordinal as position.
pub struct PredicateCursor<C: TreeCursor> {
    base: BoxedCursor<C>,
    /// Untouched copy of the base, kept for the on-demand size count.
    seed: BoxedCursor<C>,
    predicate: Arc<Expr<C>>,
    ctx: EvalContext<C>,
    pool: DataPool<C>,
    pos: i64,
    size: Option<i64>,
    cached: Option<Truth>,
    failed: bool,
}

impl<C: TreeCursor> PredicateCursor<C> {
    pub(super) fn new(
        base: BoxedCursor<C>,
        predicate: Arc<Expr<C>>,
        ctx: EvalContext<C>,
        pool: DataPool<C>,
    ) -> Self {
        let seed = base.boxed_clone();
        Self {
            base,
            seed,
            predicate,
            ctx,
            pool,
            pos: 0,
            size: None,
            cached: None,
            failed: false,
        }
    }

    /// Context size, counted once from the seed copy. Only paid for by
    /// context-sensitive predicates.
    fn size(&mut self) -> Result<i64, Error> {
        if let Some(size) = self.size {
            return Ok(size);
        }
        let mut probe = self.seed.boxed_clone();
        let mut count = 0i64;
        while let Some(item) = probe.next_item() {
            item?;
            count += 1;
        }
        self.size = Some(count);
        Ok(count)
    }

    fn interpret(value: Value<C>) -> Result<Truth, Error> {
        Ok(match value {
            Value::Empty => Truth::Bool(false),
            Value::Node(_) => Truth::Bool(true),
            Value::Atomic(a) => Self::interpret_atomic(a)?,
            Value::Sequence(mut s) => {
                let Some(first) = s.next_item() else {
                    return Ok(Truth::Bool(false));
                };
                match first? {
                    Item::Node(_) => Truth::Bool(true),
                    Item::Atomic(a) => {
                        if let Some(second) = s.next_item() {
                            second?;
                            return Err(Error::cardinality(
                                "predicate produced a multi-item atomic sequence",
                            ));
                        }
                        Self::interpret_atomic(a)?
                    }
                }
            }
        })
    }

    fn interpret_atomic(a: crate::value::Atomic) -> Result<Truth, Error> {
        if a.is_numeric() {
            // Non-integral and NaN positions match nothing.
            return Ok(Truth::Position(a.as_position().unwrap_or(-1)));
        }
        Ok(Truth::Bool(Value::<C>::Atomic(a).effective_boolean()?))
    }

    fn decide(&mut self, item: &Item<C>) -> Result<Truth, Error> {
        if let Some(cached) = self.cached {
            return Ok(cached);
        }
        let size = if self.predicate.is_context_sensitive() {
            self.size()?
        } else {
            0
        };
        let ctx = self.ctx.refocus(item.clone(), self.pos, size);
        let value = self.predicate.execute(&ctx, &mut self.pool)?;
        let truth = Self::interpret(value)?;
        if !self.predicate.is_context_sensitive() {
            self.cached = Some(truth);
        }
        Ok(truth)
    }
}

impl<C: TreeCursor> SequenceCursor<C> for PredicateCursor<C> {
    fn next_item(&mut self) -> Option<ItemResult<C>> {
        if self.failed {
            return None;
        }
        loop {
            let item = match self.base.next_item()? {
                Ok(item) => item,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            };
            self.pos += 1;
            let keep = match self.decide(&item) {
                Ok(Truth::Bool(b)) => b,
                Ok(Truth::Position(k)) => k == self.pos,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            };
            if keep {
                return Some(Ok(item));
            }
        }
    }

    fn boxed_clone(&self) -> BoxedCursor<C> {
        Box::new(Self {
            base: self.base.boxed_clone(),
            seed: self.seed.boxed_clone(),
            predicate: Arc::clone(&self.predicate),
            ctx: self.ctx.clone(),
            pool: self.pool.clone(),
            pos: self.pos,
            size: self.size,
            cached: self.cached,
            failed: self.failed,
        })
    }
}
