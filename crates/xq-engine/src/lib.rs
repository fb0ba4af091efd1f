//! XPath 2.0-style expression evaluation core over abstract tree cursors.
//!
//! Three subsystems, leaves first:
//! - [`value`]: the atomic type tower with its promotion/comparison matrix,
//! - [`iter`]: the lazy sequence algebra (thirteen axes, document-order
//!   normalization, position and predicate filters, path fusion),
//! - [`expr`]: the expression tree with its static `bind` pass and
//!   side-effect-free `execute`.
//!
//! The core never parses query text and never owns a document: the AST is
//! built programmatically (or by an external compiler) and navigation goes
//! through the [`model::TreeCursor`] capability the host supplies.
//! [`simple_tree`] provides a small arena-backed implementation for tests
//! and prototypes.
//!
//! ```
//! use xq_engine::expr::path::{PathStart, PathStep};
//! use xq_engine::iter::axes::{Axis, NodeTest};
//! use xq_engine::model::QName;
//! use xq_engine::simple_tree::elem;
//! use xq_engine::{evaluate, EvalContext, Expr, Value};
//!
//! let root = elem("a").child(elem("b")).child(elem("c")).build();
//! let expr: Expr<_> = Expr::path(
//!     PathStart::ContextNode,
//!     Some(PathStep::axis(Axis::Child, NodeTest::Name(QName::local("b")))),
//! );
//! let value = evaluate(expr, &EvalContext::with_node(root)).unwrap();
//! assert!(matches!(value, Value::Sequence(_)));
//! ```

pub mod error;
pub mod expr;
pub mod iter;
pub mod model;
pub mod runtime;
pub mod simple_tree;
pub mod value;

pub use error::Error;
pub use expr::{ArithOp, CompOp, Expr, ExprKind, NodeCompOp, TypeTag, UnaryOp, bind_root, evaluate};
pub use iter::{BoxedCursor, Item, SequenceCursor};
pub use model::{NodeKind, QName, TreeCursor};
pub use runtime::{
    DataPool, EvalContext, ExpandedName, FunctionRegistry, FunctionTable, Value, VariableScope,
};
pub use value::{Atomic, Promotion, TypeRegistry, ValueCode};
