//! Binary operator front-ends over the value tower.
//!
//! Every entry point aligns its operands through the
//! [`TypeRegistry`](super::TypeRegistry), widens the narrower side and runs a
//! small kernel on the common representation. Floats follow IEEE semantics:
//! `x div 0e0` yields an infinity, comparisons against NaN are false, and an
//! overflow into the non-finite range from finite inputs is reported.

use std::cmp::Ordering;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use crate::error::Error;
use crate::value::promote::{rewrap, NumView};
use crate::value::{Atomic, TypeRegistry, ValueCode};

enum Aligned {
    Num {
        x: NumView,
        y: NumView,
        code: ValueCode,
    },
    Str(String, String),
    Bool(bool, bool),
    Ord(Ordering),
}

fn not_defined(op: &'static str, a: &Atomic, b: &Atomic) -> Error {
    Error::OperatorNotDefined {
        op,
        left: a.type_name(),
        right: b.type_name(),
    }
}

fn align(
    registry: &TypeRegistry,
    op: &'static str,
    a: &Atomic,
    b: &Atomic,
) -> Result<Aligned, Error> {
    let code = registry
        .common_code(a.code(), b.code())
        .ok_or_else(|| not_defined(op, a, b))?;
    if code.is_numeric() {
        let x = NumView::of(a)?.widen_to(code)?;
        let y = NumView::of(b)?.widen_to(code)?;
        return Ok(Aligned::Num { x, y, code });
    }
    match (a, b) {
        (Atomic::Boolean(x), Atomic::Boolean(y)) => Ok(Aligned::Bool(*x, *y)),
        (
            Atomic::String(x) | Atomic::Untyped(x) | Atomic::AnyUri(x),
            Atomic::String(y) | Atomic::Untyped(y) | Atomic::AnyUri(y),
        ) => Ok(Aligned::Str(x.clone(), y.clone())),
        (Atomic::DateTime(x), Atomic::DateTime(y)) => Ok(Aligned::Ord(x.cmp(y))),
        (Atomic::Date { date: x, .. }, Atomic::Date { date: y, .. }) => Ok(Aligned::Ord(x.cmp(y))),
        (Atomic::Time { time: x, .. }, Atomic::Time { time: y, .. }) => Ok(Aligned::Ord(x.cmp(y))),
        _ => Err(not_defined(op, a, b)),
    }
}

fn num_cmp(x: &NumView, y: &NumView) -> Option<Ordering> {
    match (x, y) {
        (NumView::Int(a), NumView::Int(b)) => Some(a.cmp(b)),
        (NumView::Dec(a), NumView::Dec(b)) => Some(a.cmp(b)),
        (NumView::F32(a), NumView::F32(b)) => a.partial_cmp(b),
        (NumView::F64(a), NumView::F64(b)) => a.partial_cmp(b),
        _ => None,
    }
}

/// Value equality. NaN is equal to nothing, including itself.
pub fn eq(registry: &TypeRegistry, a: &Atomic, b: &Atomic) -> Result<bool, Error> {
    Ok(match align(registry, "eq", a, b)? {
        Aligned::Num { x, y, .. } => num_cmp(&x, &y) == Some(Ordering::Equal),
        Aligned::Str(x, y) => x == y,
        Aligned::Bool(x, y) => x == y,
        Aligned::Ord(ord) => ord == Ordering::Equal,
    })
}

/// Strict greater-than. False whenever NaN is involved.
pub fn gt(registry: &TypeRegistry, a: &Atomic, b: &Atomic) -> Result<bool, Error> {
    Ok(match align(registry, "gt", a, b)? {
        Aligned::Num { x, y, .. } => num_cmp(&x, &y) == Some(Ordering::Greater),
        Aligned::Str(x, y) => x > y,
        Aligned::Bool(x, y) => x & !y,
        Aligned::Ord(ord) => ord == Ordering::Greater,
    })
}

fn numeric_pair(
    registry: &TypeRegistry,
    op: &'static str,
    a: &Atomic,
    b: &Atomic,
) -> Result<(NumView, NumView, ValueCode), Error> {
    match align(registry, op, a, b)? {
        Aligned::Num { x, y, code } => Ok((x, y, code)),
        _ => Err(not_defined(op, a, b)),
    }
}

fn checked_float<F: FnOnce() -> f64>(op: &'static str, a: f64, b: f64, f: F) -> Result<f64, Error> {
    let r = f();
    if !r.is_finite() && a.is_finite() && b.is_finite() && b != 0.0 {
        return Err(Error::NumericOverflow(op));
    }
    Ok(r)
}

fn checked_float32<F: FnOnce() -> f32>(
    op: &'static str,
    a: f32,
    b: f32,
    f: F,
) -> Result<f32, Error> {
    let r = f();
    if !r.is_finite() && a.is_finite() && b.is_finite() && b != 0.0 {
        return Err(Error::NumericOverflow(op));
    }
    Ok(r)
}

macro_rules! arith {
    ($name:ident, $op:literal, $int:ident, $dec:ident, $fop:tt) => {
        pub fn $name(registry: &TypeRegistry, a: &Atomic, b: &Atomic) -> Result<Atomic, Error> {
            let (x, y, code) = numeric_pair(registry, $op, a, b)?;
            let view = match (x, y) {
                (NumView::Int(a), NumView::Int(b)) => {
                    NumView::Int(a.$int(b).ok_or(Error::NumericOverflow($op))?)
                }
                (NumView::Dec(a), NumView::Dec(b)) => {
                    NumView::Dec(a.$dec(b).ok_or(Error::NumericOverflow($op))?)
                }
                (NumView::F32(a), NumView::F32(b)) => {
                    NumView::F32(checked_float32($op, a, b, || a $fop b)?)
                }
                (NumView::F64(a), NumView::F64(b)) => {
                    NumView::F64(checked_float($op, a, b, || a $fop b)?)
                }
                _ => return Err(not_defined($op, a, b)),
            };
            rewrap(&view, code)
        }
    };
}

arith!(add, "+", checked_add, checked_add, +);
arith!(sub, "-", checked_sub, checked_sub, -);
arith!(mul, "*", checked_mul, checked_mul, *);

/// Division. Integer operands divide exactly in decimal space; a zero
/// divisor is an error for integers and decimals, IEEE for floats.
pub fn div(registry: &TypeRegistry, a: &Atomic, b: &Atomic) -> Result<Atomic, Error> {
    let (x, y, code) = numeric_pair(registry, "div", a, b)?;
    match (x, y) {
        (NumView::Int(p), NumView::Int(q)) => {
            if q == 0 {
                return Err(Error::DivisionByZero("div"));
            }
            let p = Decimal::from_i128(p).ok_or(Error::NumericOverflow("div"))?;
            let q = Decimal::from_i128(q).ok_or(Error::NumericOverflow("div"))?;
            let r = p.checked_div(q).ok_or(Error::NumericOverflow("div"))?;
            Ok(Atomic::Decimal(r))
        }
        (NumView::Dec(p), NumView::Dec(q)) => {
            if q.is_zero() {
                return Err(Error::DivisionByZero("div"));
            }
            let r = p.checked_div(q).ok_or(Error::NumericOverflow("div"))?;
            Ok(Atomic::Decimal(r))
        }
        (NumView::F32(p), NumView::F32(q)) => rewrap(
            &NumView::F32(checked_float32("div", p, q, || p / q)?),
            code,
        ),
        (NumView::F64(p), NumView::F64(q)) => {
            rewrap(&NumView::F64(checked_float("div", p, q, || p / q)?), code)
        }
        _ => Err(not_defined("div", a, b)),
    }
}

/// Integer division: truncated quotient with an integer result. A zero
/// divisor is always an error, floats included.
pub fn idiv(registry: &TypeRegistry, a: &Atomic, b: &Atomic) -> Result<Atomic, Error> {
    let (x, y, _) = numeric_pair(registry, "idiv", a, b)?;
    let q = match (x, y) {
        (NumView::Int(p), NumView::Int(q)) => {
            if q == 0 {
                return Err(Error::DivisionByZero("idiv"));
            }
            p.checked_div(q).ok_or(Error::NumericOverflow("idiv"))?
        }
        (NumView::Dec(p), NumView::Dec(q)) => {
            if q.is_zero() {
                return Err(Error::DivisionByZero("idiv"));
            }
            let r = p.checked_div(q).ok_or(Error::NumericOverflow("idiv"))?;
            r.trunc().to_i128().ok_or(Error::NumericOverflow("idiv"))?
        }
        (NumView::F32(p), NumView::F32(q)) => float_idiv(f64::from(p), f64::from(q))?,
        (NumView::F64(p), NumView::F64(q)) => float_idiv(p, q)?,
        _ => return Err(not_defined("idiv", a, b)),
    };
    rewrap(&NumView::Int(q), ValueCode::Integer)
}

fn float_idiv(p: f64, q: f64) -> Result<i128, Error> {
    if q == 0.0 {
        return Err(Error::DivisionByZero("idiv"));
    }
    if !p.is_finite() || !q.is_finite() {
        return Err(Error::NumericOverflow("idiv"));
    }
    let r = (p / q).trunc();
    if r.abs() >= i128::MAX as f64 {
        return Err(Error::NumericOverflow("idiv"));
    }
    Ok(r as i128)
}

/// Remainder with the sign of the dividend. Zero divisor errors for
/// integers and decimals; floats yield NaN per IEEE.
pub fn rem(registry: &TypeRegistry, a: &Atomic, b: &Atomic) -> Result<Atomic, Error> {
    let (x, y, code) = numeric_pair(registry, "mod", a, b)?;
    let view = match (x, y) {
        (NumView::Int(p), NumView::Int(q)) => {
            if q == 0 {
                return Err(Error::DivisionByZero("mod"));
            }
            NumView::Int(p.checked_rem(q).ok_or(Error::NumericOverflow("mod"))?)
        }
        (NumView::Dec(p), NumView::Dec(q)) => {
            if q.is_zero() {
                return Err(Error::DivisionByZero("mod"));
            }
            NumView::Dec(p.checked_rem(q).ok_or(Error::NumericOverflow("mod"))?)
        }
        (NumView::F32(p), NumView::F32(q)) => NumView::F32(p % q),
        (NumView::F64(p), NumView::F64(q)) => NumView::F64(p % q),
        _ => return Err(not_defined("mod", a, b)),
    };
    rewrap(&view, code)
}

fn extreme(
    registry: &TypeRegistry,
    op: &'static str,
    a: &Atomic,
    b: &Atomic,
    want_greater: bool,
) -> Result<Atomic, Error> {
    // NaN poisons: once seen, the extreme is NaN in the common width.
    if a.is_nan() || b.is_nan() {
        let code = registry
            .common_code(a.code(), b.code())
            .ok_or_else(|| not_defined(op, a, b))?;
        return rewrap(&NumView::F64(f64::NAN), code);
    }
    let pick_a = gt(registry, a, b)? == want_greater || eq(registry, a, b)?;
    let code = registry
        .common_code(a.code(), b.code())
        .ok_or_else(|| not_defined(op, a, b))?;
    let winner = if pick_a { a } else { b };
    if code.is_numeric() {
        rewrap(&NumView::of(winner)?.widen_to(code)?, code)
    } else {
        super::promote(winner, code)
    }
}

pub fn max(registry: &TypeRegistry, a: &Atomic, b: &Atomic) -> Result<Atomic, Error> {
    extreme(registry, "max", a, b, true)
}

pub fn min(registry: &TypeRegistry, a: &Atomic, b: &Atomic) -> Result<Atomic, Error> {
    extreme(registry, "min", a, b, false)
}

/// Unary minus. Unsigned representations negate into `xs:integer`;
/// everything else keeps its representation.
pub fn neg(a: &Atomic) -> Result<Atomic, Error> {
    if !a.is_numeric() {
        return Err(Error::OperatorNotDefined {
            op: "-",
            left: a.type_name(),
            right: "()",
        });
    }
    let code = match a.code() {
        ValueCode::UnsignedByte
        | ValueCode::UnsignedShort
        | ValueCode::UnsignedInt
        | ValueCode::UnsignedLong
        | ValueCode::NonNegativeInteger
        | ValueCode::PositiveInteger => ValueCode::Integer,
        other => other,
    };
    let view = match NumView::of(a)? {
        NumView::Int(i) => NumView::Int(i.checked_neg().ok_or(Error::NumericOverflow("-"))?),
        NumView::Dec(d) => NumView::Dec(-d),
        NumView::F32(f) => NumView::F32(-f),
        NumView::F64(f) => NumView::F64(-f),
    };
    rewrap(&view, code)
}
