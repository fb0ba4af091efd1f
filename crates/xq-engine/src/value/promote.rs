//! Promotion matrix: which of two representations widens before an
//! operator applies.
//!
//! The matrix is derived once from a pairwise comparison over the widening
//! lattice and validated for symmetry before first use. Lookup is a plain
//! two-dimensional index, nothing on the operator hot path allocates.

use std::sync::OnceLock;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use crate::error::Error;
use crate::value::{Atomic, ValueCode};

/// Outcome of consulting the matrix for an operand pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promotion {
    /// Same width; the operator applies directly.
    Equal,
    /// The left operand is wider; the right widens to it.
    LeftWider,
    /// The right operand is wider; the left widens to it.
    RightWider,
    /// No common representation; the operator is not defined.
    Incomparable,
}

/// Pairwise widening table over all value codes.
pub struct TypeRegistry {
    matrix: [[Promotion; ValueCode::COUNT]; ValueCode::COUNT],
}

/// Family bucket used by the pairwise comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Boolean,
    /// Strings, with `AnyUri`/`Untyped` narrower than `String`.
    Stringish { wide: bool },
    /// Fixed-width integers: signedness plus bit width.
    Integer { signed: bool, bits: u8 },
    Decimal,
    Float,
    Double,
    Temporal(ValueCode),
}

fn family(code: ValueCode) -> Family {
    match code {
        ValueCode::Boolean => Family::Boolean,
        ValueCode::String => Family::Stringish { wide: true },
        ValueCode::Untyped | ValueCode::AnyUri => Family::Stringish { wide: false },
        ValueCode::Byte => Family::Integer { signed: true, bits: 8 },
        ValueCode::Short => Family::Integer { signed: true, bits: 16 },
        ValueCode::Int => Family::Integer { signed: true, bits: 32 },
        ValueCode::Long
        | ValueCode::Integer
        | ValueCode::NonPositiveInteger
        | ValueCode::NegativeInteger => Family::Integer { signed: true, bits: 64 },
        ValueCode::UnsignedByte => Family::Integer { signed: false, bits: 8 },
        ValueCode::UnsignedShort => Family::Integer { signed: false, bits: 16 },
        ValueCode::UnsignedInt => Family::Integer { signed: false, bits: 32 },
        ValueCode::UnsignedLong
        | ValueCode::NonNegativeInteger
        | ValueCode::PositiveInteger => Family::Integer { signed: false, bits: 64 },
        ValueCode::Decimal => Family::Decimal,
        ValueCode::Float => Family::Float,
        ValueCode::Double => Family::Double,
        ValueCode::DateTime | ValueCode::Date | ValueCode::Time => Family::Temporal(code),
    }
}

/// One pairwise comparison: the matrix is populated entirely from this.
///
/// Numerics form integer < decimal < float < double; inside the integers a
/// narrower width always fits into a wider width of the same signedness, and
/// an unsigned width fits into any strictly wider signed width. `u64`
/// against `i64` stays incomparable since neither embeds in the other.
fn compare(a: ValueCode, b: ValueCode) -> Promotion {
    if a == b {
        return Promotion::Equal;
    }
    match (family(a), family(b)) {
        (Family::Boolean, Family::Boolean) => Promotion::Equal,
        (Family::Stringish { wide: wa }, Family::Stringish { wide: wb }) => match (wa, wb) {
            (true, true) | (false, false) => {
                if a == b {
                    Promotion::Equal
                } else {
                    Promotion::Incomparable
                }
            }
            (true, false) => Promotion::LeftWider,
            (false, true) => Promotion::RightWider,
        },
        (
            Family::Integer { signed: sa, bits: ba },
            Family::Integer { signed: sb, bits: bb },
        ) => {
            if sa == sb {
                match ba.cmp(&bb) {
                    std::cmp::Ordering::Less => Promotion::RightWider,
                    std::cmp::Ordering::Greater => Promotion::LeftWider,
                    std::cmp::Ordering::Equal => Promotion::Equal,
                }
            } else if !sa && ba < bb {
                Promotion::RightWider
            } else if !sb && bb < ba {
                Promotion::LeftWider
            } else {
                Promotion::Incomparable
            }
        }
        (Family::Integer { .. }, Family::Decimal | Family::Float | Family::Double)
        | (Family::Decimal, Family::Float | Family::Double)
        | (Family::Float, Family::Double) => Promotion::RightWider,
        (Family::Decimal | Family::Float | Family::Double, Family::Integer { .. })
        | (Family::Float | Family::Double, Family::Decimal)
        | (Family::Double, Family::Float) => Promotion::LeftWider,
        (Family::Temporal(ta), Family::Temporal(tb)) if ta == tb => Promotion::Equal,
        _ => Promotion::Incomparable,
    }
}

impl TypeRegistry {
    /// Builds the matrix and checks that every entry mirrors its transpose.
    pub fn try_new() -> Result<Self, Error> {
        let mut matrix = [[Promotion::Incomparable; ValueCode::COUNT]; ValueCode::COUNT];
        for a in ValueCode::ALL {
            for b in ValueCode::ALL {
                matrix[a.index()][b.index()] = compare(a, b);
            }
        }
        for a in ValueCode::ALL {
            for b in ValueCode::ALL {
                let fwd = matrix[a.index()][b.index()];
                let rev = matrix[b.index()][a.index()];
                let mirrored = match fwd {
                    Promotion::Equal => rev == Promotion::Equal,
                    Promotion::LeftWider => rev == Promotion::RightWider,
                    Promotion::RightWider => rev == Promotion::LeftWider,
                    Promotion::Incomparable => rev == Promotion::Incomparable,
                };
                if !mirrored {
                    return Err(Error::InvalidRegistry {
                        left: a.type_name(),
                        right: b.type_name(),
                    });
                }
            }
        }
        Ok(Self { matrix })
    }

    /// Process-wide registry. The built-in table always validates.
    pub fn global() -> &'static TypeRegistry {
        static REGISTRY: OnceLock<TypeRegistry> = OnceLock::new();
        REGISTRY.get_or_init(|| {
            TypeRegistry::try_new().expect("built-in promotion table is symmetric")
        })
    }

    pub fn promotion(&self, left: ValueCode, right: ValueCode) -> Promotion {
        self.matrix[left.index()][right.index()]
    }

    /// Common code the pair meets at, or `None` when incomparable. An
    /// equal-width pair resolves to the left operand's code. Per the lookup
    /// protocol the reversed pair is consulted before giving up, so a
    /// one-sided table entry still resolves.
    pub fn common_code(&self, left: ValueCode, right: ValueCode) -> Option<ValueCode> {
        match self.promotion(left, right) {
            Promotion::Equal | Promotion::LeftWider => Some(left),
            Promotion::RightWider => Some(right),
            Promotion::Incomparable => match self.promotion(right, left) {
                Promotion::Equal | Promotion::LeftWider => Some(right),
                Promotion::RightWider => Some(left),
                Promotion::Incomparable => None,
            },
        }
    }
}

/// Rewraps `value` in the representation tagged by `target`. Narrowing is
/// checked; values outside the target range report overflow.
pub fn promote(value: &Atomic, target: ValueCode) -> Result<Atomic, Error> {
    if value.code() == target {
        return Ok(value.clone());
    }
    if target == ValueCode::String {
        if let Atomic::Untyped(s) | Atomic::AnyUri(s) = value {
            return Ok(Atomic::String(s.clone()));
        }
    }
    if value.is_numeric() && target.is_numeric() {
        return rewrap(&NumView::of(value)?, target);
    }
    Err(Error::type_mismatch(format!(
        "cannot represent {} as {}",
        value.type_name(),
        target.type_name()
    )))
}

/// Uniform numeric view the arithmetic kernel computes in.
#[derive(Debug, Clone, Copy)]
pub(crate) enum NumView {
    Int(i128),
    Dec(Decimal),
    F32(f32),
    F64(f64),
}

impl NumView {
    pub(crate) fn of(value: &Atomic) -> Result<Self, Error> {
        Ok(match value {
            Atomic::Byte(v) => NumView::Int(i128::from(*v)),
            Atomic::Short(v) => NumView::Int(i128::from(*v)),
            Atomic::Int(v) => NumView::Int(i128::from(*v)),
            Atomic::Long(v)
            | Atomic::Integer(v)
            | Atomic::NonPositiveInteger(v)
            | Atomic::NegativeInteger(v) => NumView::Int(i128::from(*v)),
            Atomic::UnsignedByte(v) => NumView::Int(i128::from(*v)),
            Atomic::UnsignedShort(v) => NumView::Int(i128::from(*v)),
            Atomic::UnsignedInt(v) => NumView::Int(i128::from(*v)),
            Atomic::UnsignedLong(v)
            | Atomic::NonNegativeInteger(v)
            | Atomic::PositiveInteger(v) => NumView::Int(i128::from(*v)),
            Atomic::Decimal(d) => NumView::Dec(*d),
            Atomic::Float(f) => NumView::F32(*f),
            Atomic::Double(d) => NumView::F64(*d),
            other => return Err(Error::UnregisteredType(other.type_name())),
        })
    }

    pub(crate) fn widen_to(self, target: ValueCode) -> Result<Self, Error> {
        Ok(match (self, target) {
            (NumView::Int(_) | NumView::Dec(_) | NumView::F32(_) | NumView::F64(_), t)
                if t.is_integer() =>
            {
                self
            }
            (NumView::Int(i), ValueCode::Decimal) => {
                NumView::Dec(Decimal::from_i128(i).ok_or(Error::NumericOverflow("promote"))?)
            }
            (NumView::Int(i), ValueCode::Float) => NumView::F32(i as f32),
            (NumView::Int(i), ValueCode::Double) => NumView::F64(i as f64),
            (NumView::Dec(d), ValueCode::Float) => {
                NumView::F32(d.to_f32().ok_or(Error::NumericOverflow("promote"))?)
            }
            (NumView::Dec(d), ValueCode::Double) => {
                NumView::F64(d.to_f64().ok_or(Error::NumericOverflow("promote"))?)
            }
            (NumView::F32(f), ValueCode::Double) => NumView::F64(f64::from(f)),
            (view, _) => view,
        })
    }
}

/// Checked narrowing from the kernel view back into a tagged atomic.
pub(crate) fn rewrap(view: &NumView, target: ValueCode) -> Result<Atomic, Error> {
    let overflow = || Error::NumericOverflow(target.type_name());
    if target.is_integer() {
        let i = match view {
            NumView::Int(i) => *i,
            NumView::Dec(d) => d.trunc().to_i128().ok_or_else(overflow)?,
            NumView::F32(f) if f.is_finite() => *f as i128,
            NumView::F64(f) if f.is_finite() => *f as i128,
            NumView::F32(_) | NumView::F64(_) => return Err(overflow()),
        };
        return Ok(match target {
            ValueCode::Byte => Atomic::Byte(i8::try_from(i).map_err(|_| overflow())?),
            ValueCode::Short => Atomic::Short(i16::try_from(i).map_err(|_| overflow())?),
            ValueCode::Int => Atomic::Int(i32::try_from(i).map_err(|_| overflow())?),
            ValueCode::Long => Atomic::Long(i64::try_from(i).map_err(|_| overflow())?),
            ValueCode::Integer => Atomic::Integer(i64::try_from(i).map_err(|_| overflow())?),
            ValueCode::NonPositiveInteger => {
                Atomic::NonPositiveInteger(i64::try_from(i).map_err(|_| overflow())?)
            }
            ValueCode::NegativeInteger => {
                Atomic::NegativeInteger(i64::try_from(i).map_err(|_| overflow())?)
            }
            ValueCode::UnsignedByte => Atomic::UnsignedByte(u8::try_from(i).map_err(|_| overflow())?),
            ValueCode::UnsignedShort => {
                Atomic::UnsignedShort(u16::try_from(i).map_err(|_| overflow())?)
            }
            ValueCode::UnsignedInt => Atomic::UnsignedInt(u32::try_from(i).map_err(|_| overflow())?),
            ValueCode::UnsignedLong => {
                Atomic::UnsignedLong(u64::try_from(i).map_err(|_| overflow())?)
            }
            ValueCode::NonNegativeInteger => {
                Atomic::NonNegativeInteger(u64::try_from(i).map_err(|_| overflow())?)
            }
            ValueCode::PositiveInteger => {
                Atomic::PositiveInteger(u64::try_from(i).map_err(|_| overflow())?)
            }
            _ => unreachable!("is_integer covers exactly the integer codes"),
        });
    }
    match target {
        ValueCode::Decimal => Ok(Atomic::Decimal(match view {
            NumView::Int(i) => Decimal::from_i128(*i).ok_or_else(overflow)?,
            NumView::Dec(d) => *d,
            NumView::F32(f) => Decimal::from_f32(*f).ok_or_else(overflow)?,
            NumView::F64(f) => Decimal::from_f64(*f).ok_or_else(overflow)?,
        })),
        ValueCode::Float => Ok(Atomic::Float(match view {
            NumView::Int(i) => *i as f32,
            NumView::Dec(d) => d.to_f32().ok_or_else(overflow)?,
            NumView::F32(f) => *f,
            NumView::F64(f) => *f as f32,
        })),
        ValueCode::Double => Ok(Atomic::Double(match view {
            NumView::Int(i) => *i as f64,
            NumView::Dec(d) => d.to_f64().ok_or_else(overflow)?,
            NumView::F32(f) => f64::from(*f),
            NumView::F64(f) => *f,
        })),
        other => Err(Error::type_mismatch(format!(
            "numeric result cannot take representation {}",
            other.type_name()
        ))),
    }
}
