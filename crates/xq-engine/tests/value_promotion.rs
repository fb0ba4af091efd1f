//! Promotion matrix and operator semantics across the value tower.

use rstest::rstest;
use rust_decimal::Decimal;
use xq_engine::value::{add, div, eq, gt, idiv, max, neg, promote, rem, sub};
use xq_engine::{Atomic, Error, Promotion, TypeRegistry, ValueCode};

#[test]
fn matrix_builds_and_validates() {
    let registry = TypeRegistry::try_new().expect("built-in table is symmetric");
    for a in ValueCode::ALL {
        for b in ValueCode::ALL {
            let fwd = registry.promotion(a, b);
            let rev = registry.promotion(b, a);
            let mirrored = match fwd {
                Promotion::Equal => rev == Promotion::Equal,
                Promotion::LeftWider => rev == Promotion::RightWider,
                Promotion::RightWider => rev == Promotion::LeftWider,
                Promotion::Incomparable => rev == Promotion::Incomparable,
            };
            assert!(mirrored, "{} vs {}", a.type_name(), b.type_name());
        }
    }
}

#[rstest]
#[case(ValueCode::UnsignedByte, ValueCode::Short, Promotion::RightWider)]
#[case(ValueCode::UnsignedShort, ValueCode::Int, Promotion::RightWider)]
#[case(ValueCode::UnsignedInt, ValueCode::Long, Promotion::RightWider)]
#[case(ValueCode::Byte, ValueCode::Integer, Promotion::RightWider)]
#[case(ValueCode::Integer, ValueCode::Long, Promotion::Equal)]
#[case(ValueCode::Integer, ValueCode::Decimal, Promotion::RightWider)]
#[case(ValueCode::Decimal, ValueCode::Float, Promotion::RightWider)]
#[case(ValueCode::Float, ValueCode::Double, Promotion::RightWider)]
#[case(ValueCode::Double, ValueCode::Byte, Promotion::LeftWider)]
#[case(ValueCode::UnsignedLong, ValueCode::Long, Promotion::Incomparable)]
#[case(ValueCode::String, ValueCode::Integer, Promotion::Incomparable)]
#[case(ValueCode::Untyped, ValueCode::String, Promotion::RightWider)]
#[case(ValueCode::AnyUri, ValueCode::String, Promotion::RightWider)]
#[case(ValueCode::Boolean, ValueCode::Integer, Promotion::Incomparable)]
#[case(ValueCode::DateTime, ValueCode::Date, Promotion::Incomparable)]
fn lattice_facts(#[case] a: ValueCode, #[case] b: ValueCode, #[case] expected: Promotion) {
    assert_eq!(TypeRegistry::global().promotion(a, b), expected);
}

/// Operating on a mixed pair must equal promoting the narrower side first
/// and operating on the common representation.
#[rstest]
#[case(Atomic::Byte(3), Atomic::Long(4))]
#[case(Atomic::UnsignedByte(200), Atomic::Int(1000))]
#[case(Atomic::Integer(3), Atomic::Decimal(Decimal::new(25, 1)))]
#[case(Atomic::Integer(3), Atomic::Double(4.5))]
#[case(Atomic::Float(1.5), Atomic::Double(2.5))]
fn mixed_equals_promoted(#[case] a: Atomic, #[case] b: Atomic) {
    let registry = TypeRegistry::global();
    let code = match registry.promotion(a.code(), b.code()) {
        Promotion::Equal | Promotion::LeftWider => a.code(),
        Promotion::RightWider => b.code(),
        Promotion::Incomparable => panic!("cases are comparable"),
    };
    let pa = promote(&a, code).unwrap();
    let pb = promote(&b, code).unwrap();
    assert_eq!(
        add(registry, &a, &b).unwrap(),
        add(registry, &pa, &pb).unwrap()
    );
    assert_eq!(eq(registry, &a, &b).unwrap(), eq(registry, &pa, &pb).unwrap());
    assert_eq!(gt(registry, &a, &b).unwrap(), gt(registry, &pa, &pb).unwrap());
}

#[test]
fn string_is_not_numeric_promotable() {
    let registry = TypeRegistry::global();
    let err = add(registry, &Atomic::Integer(3), &Atomic::String("4".into())).unwrap_err();
    assert!(matches!(err, Error::OperatorNotDefined { op: "+", .. }));
}

#[test]
fn untyped_text_is_string_family() {
    let registry = TypeRegistry::global();
    let err = add(registry, &Atomic::Untyped("4".into()), &Atomic::Integer(3)).unwrap_err();
    assert!(matches!(err, Error::OperatorNotDefined { .. }));
    // But string-family members compare among themselves.
    assert!(eq(
        registry,
        &Atomic::Untyped("x".into()),
        &Atomic::String("x".into())
    )
    .unwrap());
}

#[test]
fn integer_division_yields_decimal() {
    let registry = TypeRegistry::global();
    assert_eq!(
        div(registry, &Atomic::Integer(5), &Atomic::Integer(2)).unwrap(),
        Atomic::Decimal(Decimal::new(25, 1))
    );
    assert_eq!(
        idiv(registry, &Atomic::Integer(5), &Atomic::Integer(2)).unwrap(),
        Atomic::Integer(2)
    );
    assert_eq!(
        idiv(registry, &Atomic::Integer(-5), &Atomic::Integer(2)).unwrap(),
        Atomic::Integer(-2)
    );
}

#[rstest]
#[case(Atomic::Integer(1), Atomic::Integer(0))]
#[case(Atomic::Decimal(Decimal::ONE), Atomic::Decimal(Decimal::ZERO))]
fn exact_division_by_zero_errors(#[case] a: Atomic, #[case] b: Atomic) {
    let registry = TypeRegistry::global();
    assert!(matches!(
        div(registry, &a, &b),
        Err(Error::DivisionByZero("div"))
    ));
    assert!(matches!(
        rem(registry, &a, &b),
        Err(Error::DivisionByZero("mod"))
    ));
    assert!(matches!(
        idiv(registry, &a, &b),
        Err(Error::DivisionByZero("idiv"))
    ));
}

#[test]
fn float_division_follows_ieee() {
    let registry = TypeRegistry::global();
    let inf = div(registry, &Atomic::Double(1.0), &Atomic::Double(0.0)).unwrap();
    assert_eq!(inf, Atomic::Double(f64::INFINITY));
    let nan = rem(registry, &Atomic::Double(1.0), &Atomic::Double(0.0)).unwrap();
    assert!(nan.is_nan());
    // idiv stays exact even for floats.
    assert!(matches!(
        idiv(registry, &Atomic::Double(1.0), &Atomic::Double(0.0)),
        Err(Error::DivisionByZero("idiv"))
    ));
}

#[test]
fn narrow_result_overflow_is_reported() {
    let registry = TypeRegistry::global();
    let err = add(registry, &Atomic::Byte(100), &Atomic::Byte(100)).unwrap_err();
    assert!(matches!(err, Error::NumericOverflow(_)));
    let err = sub(registry, &Atomic::UnsignedByte(0), &Atomic::UnsignedByte(1)).unwrap_err();
    assert!(matches!(err, Error::NumericOverflow(_)));
}

#[test]
fn float_overflow_from_finite_operands_is_reported() {
    let registry = TypeRegistry::global();
    let err = add(
        registry,
        &Atomic::Double(f64::MAX),
        &Atomic::Double(f64::MAX),
    )
    .unwrap_err();
    assert!(matches!(err, Error::NumericOverflow("+")));
}

#[test]
fn nan_compares_false_and_poisons_extremes() {
    let registry = TypeRegistry::global();
    let nan = Atomic::Double(f64::NAN);
    assert!(!eq(registry, &nan, &nan).unwrap());
    assert!(!gt(registry, &nan, &Atomic::Double(1.0)).unwrap());
    assert!(!gt(registry, &Atomic::Double(1.0), &nan).unwrap());
    assert!(max(registry, &nan, &Atomic::Double(1.0)).unwrap().is_nan());
}

#[test]
fn max_returns_the_wider_representation() {
    let registry = TypeRegistry::global();
    assert_eq!(
        max(registry, &Atomic::Byte(3), &Atomic::Long(2)).unwrap(),
        Atomic::Long(3)
    );
}

#[test]
fn equal_width_pair_keeps_the_left_representation() {
    let registry = TypeRegistry::global();
    assert_eq!(
        add(registry, &Atomic::Long(1), &Atomic::Integer(2)).unwrap(),
        Atomic::Long(3)
    );
    assert_eq!(
        add(registry, &Atomic::Integer(1), &Atomic::Long(2)).unwrap(),
        Atomic::Integer(3)
    );
}

#[test]
fn negating_unsigned_widens_to_integer() {
    assert_eq!(neg(&Atomic::UnsignedByte(5)).unwrap(), Atomic::Integer(-5));
    assert_eq!(neg(&Atomic::Byte(5)).unwrap(), Atomic::Byte(-5));
    assert!(matches!(
        neg(&Atomic::String("x".into())),
        Err(Error::OperatorNotDefined { op: "-", .. })
    ));
}

#[test]
fn promote_rejects_lossy_narrowing() {
    assert!(matches!(
        promote(&Atomic::Long(1_000), ValueCode::Byte),
        Err(Error::NumericOverflow(_))
    ));
    assert_eq!(
        promote(&Atomic::AnyUri("urn:x".into()), ValueCode::String).unwrap(),
        Atomic::String("urn:x".into())
    );
}
