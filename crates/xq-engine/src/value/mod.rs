//! The value tower: atomic representations, value codes, and the
//! promotion/comparison lattice.
//!
//! Callers combine heterogeneous representations through the operator
//! front-ends re-exported here without knowing concrete types; the
//! [`TypeRegistry`](promote::TypeRegistry) decides which operand widens.

mod ops;
mod promote;

pub use ops::{add, div, eq, gt, idiv, max, min, mul, neg, rem, sub};
pub use promote::{promote, Promotion, TypeRegistry};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use rust_decimal::Decimal;

/// One atomic item: a tagged wrapper around a concrete representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Atomic {
    Boolean(bool),
    String(String),
    Untyped(String),
    AnyUri(String),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Integer(i64),
    UnsignedByte(u8),
    UnsignedShort(u16),
    UnsignedInt(u32),
    UnsignedLong(u64),
    NonPositiveInteger(i64),
    NegativeInteger(i64),
    NonNegativeInteger(u64),
    PositiveInteger(u64),
    Decimal(Decimal),
    Float(f32),
    Double(f64),
    DateTime(DateTime<FixedOffset>),
    Date {
        date: NaiveDate,
        tz: Option<FixedOffset>,
    },
    Time {
        time: NaiveTime,
        tz: Option<FixedOffset>,
    },
}

/// Stable small-integer tag per representation; indexes the promotion
/// matrix. The set is closed: one code per `Atomic` variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueCode {
    Boolean = 0,
    String,
    Untyped,
    AnyUri,
    Byte,
    Short,
    Int,
    Long,
    Integer,
    UnsignedByte,
    UnsignedShort,
    UnsignedInt,
    UnsignedLong,
    NonPositiveInteger,
    NegativeInteger,
    NonNegativeInteger,
    PositiveInteger,
    Decimal,
    Float,
    Double,
    DateTime,
    Date,
    Time,
}

impl ValueCode {
    pub const COUNT: usize = 23;

    pub const ALL: [ValueCode; Self::COUNT] = [
        ValueCode::Boolean,
        ValueCode::String,
        ValueCode::Untyped,
        ValueCode::AnyUri,
        ValueCode::Byte,
        ValueCode::Short,
        ValueCode::Int,
        ValueCode::Long,
        ValueCode::Integer,
        ValueCode::UnsignedByte,
        ValueCode::UnsignedShort,
        ValueCode::UnsignedInt,
        ValueCode::UnsignedLong,
        ValueCode::NonPositiveInteger,
        ValueCode::NegativeInteger,
        ValueCode::NonNegativeInteger,
        ValueCode::PositiveInteger,
        ValueCode::Decimal,
        ValueCode::Float,
        ValueCode::Double,
        ValueCode::DateTime,
        ValueCode::Date,
        ValueCode::Time,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Schema-style type name used in error messages.
    pub fn type_name(self) -> &'static str {
        match self {
            ValueCode::Boolean => "xs:boolean",
            ValueCode::String => "xs:string",
            ValueCode::Untyped => "xs:untypedAtomic",
            ValueCode::AnyUri => "xs:anyURI",
            ValueCode::Byte => "xs:byte",
            ValueCode::Short => "xs:short",
            ValueCode::Int => "xs:int",
            ValueCode::Long => "xs:long",
            ValueCode::Integer => "xs:integer",
            ValueCode::UnsignedByte => "xs:unsignedByte",
            ValueCode::UnsignedShort => "xs:unsignedShort",
            ValueCode::UnsignedInt => "xs:unsignedInt",
            ValueCode::UnsignedLong => "xs:unsignedLong",
            ValueCode::NonPositiveInteger => "xs:nonPositiveInteger",
            ValueCode::NegativeInteger => "xs:negativeInteger",
            ValueCode::NonNegativeInteger => "xs:nonNegativeInteger",
            ValueCode::PositiveInteger => "xs:positiveInteger",
            ValueCode::Decimal => "xs:decimal",
            ValueCode::Float => "xs:float",
            ValueCode::Double => "xs:double",
            ValueCode::DateTime => "xs:dateTime",
            ValueCode::Date => "xs:date",
            ValueCode::Time => "xs:time",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ValueCode::Byte
                | ValueCode::Short
                | ValueCode::Int
                | ValueCode::Long
                | ValueCode::Integer
                | ValueCode::UnsignedByte
                | ValueCode::UnsignedShort
                | ValueCode::UnsignedInt
                | ValueCode::UnsignedLong
                | ValueCode::NonPositiveInteger
                | ValueCode::NegativeInteger
                | ValueCode::NonNegativeInteger
                | ValueCode::PositiveInteger
                | ValueCode::Decimal
                | ValueCode::Float
                | ValueCode::Double
        )
    }

    pub fn is_integer(self) -> bool {
        self.is_numeric()
            && !matches!(
                self,
                ValueCode::Decimal | ValueCode::Float | ValueCode::Double
            )
    }
}

impl Atomic {
    pub fn code(&self) -> ValueCode {
        match self {
            Atomic::Boolean(_) => ValueCode::Boolean,
            Atomic::String(_) => ValueCode::String,
            Atomic::Untyped(_) => ValueCode::Untyped,
            Atomic::AnyUri(_) => ValueCode::AnyUri,
            Atomic::Byte(_) => ValueCode::Byte,
            Atomic::Short(_) => ValueCode::Short,
            Atomic::Int(_) => ValueCode::Int,
            Atomic::Long(_) => ValueCode::Long,
            Atomic::Integer(_) => ValueCode::Integer,
            Atomic::UnsignedByte(_) => ValueCode::UnsignedByte,
            Atomic::UnsignedShort(_) => ValueCode::UnsignedShort,
            Atomic::UnsignedInt(_) => ValueCode::UnsignedInt,
            Atomic::UnsignedLong(_) => ValueCode::UnsignedLong,
            Atomic::NonPositiveInteger(_) => ValueCode::NonPositiveInteger,
            Atomic::NegativeInteger(_) => ValueCode::NegativeInteger,
            Atomic::NonNegativeInteger(_) => ValueCode::NonNegativeInteger,
            Atomic::PositiveInteger(_) => ValueCode::PositiveInteger,
            Atomic::Decimal(_) => ValueCode::Decimal,
            Atomic::Float(_) => ValueCode::Float,
            Atomic::Double(_) => ValueCode::Double,
            Atomic::DateTime(_) => ValueCode::DateTime,
            Atomic::Date { .. } => ValueCode::Date,
            Atomic::Time { .. } => ValueCode::Time,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.code().type_name()
    }

    pub fn is_numeric(&self) -> bool {
        self.code().is_numeric()
    }

    /// Only floating representations can report NaN.
    pub fn is_nan(&self) -> bool {
        match self {
            Atomic::Float(f) => f.is_nan(),
            Atomic::Double(d) => d.is_nan(),
            _ => false,
        }
    }

    /// Numeric zero test; `false` for non-numeric representations.
    pub fn is_zero(&self) -> bool {
        match self {
            Atomic::Byte(v) => *v == 0,
            Atomic::Short(v) => *v == 0,
            Atomic::Int(v) => *v == 0,
            Atomic::Long(v)
            | Atomic::Integer(v)
            | Atomic::NonPositiveInteger(v)
            | Atomic::NegativeInteger(v) => *v == 0,
            Atomic::UnsignedByte(v) => *v == 0,
            Atomic::UnsignedShort(v) => *v == 0,
            Atomic::UnsignedInt(v) => *v == 0,
            Atomic::UnsignedLong(v)
            | Atomic::NonNegativeInteger(v)
            | Atomic::PositiveInteger(v) => *v == 0,
            Atomic::Decimal(d) => d.is_zero(),
            Atomic::Float(f) => *f == 0.0,
            Atomic::Double(d) => *d == 0.0,
            _ => false,
        }
    }

    /// Lexical string value of the representation.
    pub fn string_value(&self) -> String {
        match self {
            Atomic::Boolean(b) => if *b { "true" } else { "false" }.to_string(),
            Atomic::String(s) | Atomic::Untyped(s) | Atomic::AnyUri(s) => s.clone(),
            Atomic::Byte(v) => v.to_string(),
            Atomic::Short(v) => v.to_string(),
            Atomic::Int(v) => v.to_string(),
            Atomic::Long(v)
            | Atomic::Integer(v)
            | Atomic::NonPositiveInteger(v)
            | Atomic::NegativeInteger(v) => v.to_string(),
            Atomic::UnsignedByte(v) => v.to_string(),
            Atomic::UnsignedShort(v) => v.to_string(),
            Atomic::UnsignedInt(v) => v.to_string(),
            Atomic::UnsignedLong(v)
            | Atomic::NonNegativeInteger(v)
            | Atomic::PositiveInteger(v) => v.to_string(),
            Atomic::Decimal(d) => d.to_string(),
            Atomic::Float(f) => f.to_string(),
            Atomic::Double(d) => d.to_string(),
            Atomic::DateTime(dt) => dt.to_rfc3339(),
            Atomic::Date { date, .. } => date.to_string(),
            Atomic::Time { time, .. } => time.to_string(),
        }
    }

    /// Integral view used by positional predicates; `None` for non-integral
    /// values (including floats with a fractional part).
    pub fn as_position(&self) -> Option<i64> {
        use rust_decimal::prelude::ToPrimitive;
        match self {
            Atomic::Byte(v) => Some(i64::from(*v)),
            Atomic::Short(v) => Some(i64::from(*v)),
            Atomic::Int(v) => Some(i64::from(*v)),
            Atomic::Long(v)
            | Atomic::Integer(v)
            | Atomic::NonPositiveInteger(v)
            | Atomic::NegativeInteger(v) => Some(*v),
            Atomic::UnsignedByte(v) => Some(i64::from(*v)),
            Atomic::UnsignedShort(v) => Some(i64::from(*v)),
            Atomic::UnsignedInt(v) => Some(i64::from(*v)),
            Atomic::UnsignedLong(v)
            | Atomic::NonNegativeInteger(v)
            | Atomic::PositiveInteger(v) => i64::try_from(*v).ok(),
            Atomic::Decimal(d) if d.fract().is_zero() => d.to_i64(),
            Atomic::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            Atomic::Double(d) if d.fract() == 0.0 && d.is_finite() => Some(*d as i64),
            _ => None,
        }
    }
}
