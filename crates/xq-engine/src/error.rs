//! Error taxonomy for the evaluation core.
//!
//! Every failure unwinds to the nearest `bind`/`execute` caller; the core
//! performs no internal retry and holds no mutable state of its own besides
//! the per-invocation data pool, which the caller discards on error.

/// Closed set of error kinds raised by binding and evaluation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A raw value reached the tower without a registered representation.
    #[error("no value representation registered for {0}")]
    UnregisteredType(&'static str),

    /// The promotion matrix declares the operand codes incomparable.
    #[error("operator '{op}' is not defined for {left} and {right}")]
    OperatorNotDefined {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    /// Checked arithmetic wrapped, or a float operation left the finite range.
    #[error("numeric overflow in '{0}'")]
    NumericOverflow(&'static str),

    /// Integer division or modulo with a zero divisor.
    #[error("division by zero in '{0}'")]
    DivisionByZero(&'static str),

    /// A node was required where an atomic appeared, or vice versa.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// A single item was required but a longer sequence was supplied.
    #[error("cardinality violation: {0}")]
    CardinalityError(String),

    /// Bind-time function resolution failed.
    #[error("undefined function {name}#{arity}")]
    UndefinedFunction { name: String, arity: usize },

    /// Bind-time variable resolution failed.
    #[error("undeclared variable ${0}")]
    UndeclaredVariable(String),

    /// A context-dependent expression was evaluated without a context item.
    #[error("no context item is defined")]
    NoContextItem,

    /// Lifecycle guard: `execute` before `bind`.
    #[error("expression executed before bind")]
    NotBound,

    /// Lifecycle guard: `bind` called twice on the same node.
    #[error("expression bound twice")]
    AlreadyBound,

    /// The promotion matrix failed its startup symmetry validation.
    #[error("inconsistent promotion table between {left} and {right}")]
    InvalidRegistry {
        left: &'static str,
        right: &'static str,
    },
}

impl Error {
    pub(crate) fn cardinality(msg: impl Into<String>) -> Self {
        Error::CardinalityError(msg.into())
    }

    pub(crate) fn type_mismatch(msg: impl Into<String>) -> Self {
        Error::TypeMismatch(msg.into())
    }
}
