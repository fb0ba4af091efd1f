//! Expression evaluation: the bind/execute lifecycle, empty-sequence
//! propagation, boolean logic, predicates, `for` loops and function calls.

mod common;

use common::{drain, names};
use rstest::rstest;
use std::sync::Arc;
use xq_engine::expr::path::{PathStart, PathStep};
use xq_engine::iter::axes::{Axis, NodeTest};
use xq_engine::simple_tree::{doc, elem, text, SimpleCursor};
use xq_engine::{
    bind_root, evaluate, ArithOp, Atomic, CompOp, DataPool, Error, EvalContext, ExpandedName,
    Expr, FunctionRegistry, Item, NodeCompOp, QName, Value, VariableScope,
};

fn detached() -> EvalContext<SimpleCursor> {
    EvalContext::detached()
}

fn eval(expr: Expr<SimpleCursor>) -> Result<Value<SimpleCursor>, Error> {
    evaluate(expr, &detached())
}

fn atomic(value: Result<Value<SimpleCursor>, Error>) -> Atomic {
    match value.expect("evaluates") {
        Value::Atomic(a) => a,
        other => panic!("expected atomic, got {other:?}"),
    }
}

#[test]
fn literal_arithmetic_with_promotion() {
    let expr = Expr::arithmetic(ArithOp::Add, Expr::integer(4), Expr::integer(3));
    assert_eq!(atomic(eval(expr)), Atomic::Integer(7));

    let expr = Expr::arithmetic(
        ArithOp::Mul,
        Expr::literal(Atomic::Double(1.5)),
        Expr::integer(2),
    );
    assert_eq!(atomic(eval(expr)), Atomic::Double(3.0));
}

#[test]
fn string_operand_in_arithmetic_is_rejected() {
    let expr = Expr::arithmetic(
        ArithOp::Add,
        Expr::integer(3),
        Expr::literal(Atomic::String("4".into())),
    );
    assert!(matches!(
        eval(expr),
        Err(Error::OperatorNotDefined { op: "+", .. })
    ));
}

#[test]
fn string_typed_node_atomizes_into_arithmetic() {
    // 3 + node, where the node carries a string typed value.
    let root = elem("n")
        .child(text("4"))
        .typed(Atomic::String("4".into()))
        .build();
    let expr = Expr::arithmetic(ArithOp::Add, Expr::integer(3), Expr::context_item());
    let err = evaluate(expr, &EvalContext::with_node(root)).unwrap_err();
    assert!(matches!(err, Error::OperatorNotDefined { op: "+", .. }));
}

#[test]
fn empty_sequence_propagates_through_operators() {
    let empty = || Expr::sequence(vec![]);
    let expr = Expr::arithmetic(ArithOp::Add, Expr::integer(1), empty());
    assert!(matches!(eval(expr), Ok(Value::Empty)));
    let expr = Expr::comparison(CompOp::Lt, empty(), Expr::integer(1));
    assert!(matches!(eval(expr), Ok(Value::Empty)));
    let expr = Expr::unary(xq_engine::UnaryOp::Minus, empty());
    assert!(matches!(eval(expr), Ok(Value::Empty)));
}

#[rstest]
#[case(CompOp::Eq, 2, 2, true)]
#[case(CompOp::Ne, 2, 3, true)]
#[case(CompOp::Lt, 2, 3, true)]
#[case(CompOp::Le, 3, 3, true)]
#[case(CompOp::Gt, 3, 2, true)]
#[case(CompOp::Ge, 2, 3, false)]
fn value_comparisons(#[case] op: CompOp, #[case] l: i64, #[case] r: i64, #[case] expected: bool) {
    let expr = Expr::comparison(op, Expr::integer(l), Expr::integer(r));
    assert_eq!(atomic(eval(expr)), Atomic::Boolean(expected));
}

#[test]
fn and_or_short_circuit_and_stay_two_valued() {
    // The right operand would fail on execution; short-circuiting must
    // prevent that.
    let failing = Expr::var("nope");
    let expr = Expr::and(Expr::literal(Atomic::Boolean(false)), failing);
    // Bind fails on the undeclared variable even when execution would
    // short-circuit past it.
    assert!(matches!(eval(expr), Err(Error::UndeclaredVariable(_))));

    let expr = Expr::or(
        Expr::literal(Atomic::Boolean(true)),
        Expr::arithmetic(
            ArithOp::Div,
            Expr::integer(1),
            Expr::integer(0),
        ),
    );
    assert_eq!(atomic(eval(expr)), Atomic::Boolean(true));

    let expr = Expr::and(
        Expr::literal(Atomic::Boolean(true)),
        Expr::sequence(vec![]),
    );
    // Empty in boolean position is false, never "no value".
    assert_eq!(atomic(eval(expr)), Atomic::Boolean(false));
}

#[test]
fn multi_item_effective_boolean_is_a_cardinality_error() {
    let pair = Expr::sequence(vec![Expr::integer(1), Expr::integer(2)]);
    let expr = Expr::and(pair, Expr::literal(Atomic::Boolean(true)));
    assert!(matches!(eval(expr), Err(Error::CardinalityError(_))));
}

#[test]
fn if_branches_on_effective_boolean() {
    let expr = Expr::if_then_else(
        Expr::literal(Atomic::String("x".into())),
        Expr::integer(1),
        Expr::integer(2),
    );
    assert_eq!(atomic(eval(expr)), Atomic::Integer(1));
    let expr = Expr::if_then_else(Expr::sequence(vec![]), Expr::integer(1), Expr::integer(2));
    assert_eq!(atomic(eval(expr)), Atomic::Integer(2));
}

#[test]
fn for_loop_is_lazy_and_concatenates_in_source_order() {
    // for $x in 1 to 3 return $x * 10
    let body = Expr::arithmetic(ArithOp::Mul, Expr::var("x"), Expr::integer(10));
    let expr = Expr::for_in("x", Expr::range(Expr::integer(1), Expr::integer(3)), body);
    assert_eq!(names(eval(expr).unwrap()), vec!["10", "20", "30"]);
}

#[test]
fn nested_for_loops_shadow_lexically() {
    // for $x in 1 to 2 return for $x in 10 to 11 return $x
    let inner = Expr::for_in(
        "x",
        Expr::range(Expr::integer(10), Expr::integer(11)),
        Expr::var("x"),
    );
    let expr = Expr::for_in("x", Expr::range(Expr::integer(1), Expr::integer(2)), inner);
    assert_eq!(names(eval(expr).unwrap()), vec!["10", "11", "10", "11"]);

    // The outer variable is visible again after the inner loop pops.
    let inner = Expr::for_in(
        "y",
        Expr::range(Expr::integer(1), Expr::integer(1)),
        Expr::var("x"),
    );
    let expr = Expr::for_in("x", Expr::range(Expr::integer(5), Expr::integer(6)), inner);
    assert_eq!(names(eval(expr).unwrap()), vec!["5", "6"]);
}

#[test]
fn loop_variable_out_of_scope_after_bind() {
    let lost = Expr::sequence(vec![
        Expr::for_in(
            "x",
            Expr::range(Expr::integer(1), Expr::integer(1)),
            Expr::var("x"),
        ),
        Expr::var("x"),
    ]);
    assert!(matches!(eval(lost), Err(Error::UndeclaredVariable(name)) if name == "x"));
}

#[test]
fn execute_before_bind_is_rejected() {
    let expr = Arc::new(Expr::<SimpleCursor>::integer(1));
    let mut pool = DataPool::new(0);
    assert!(matches!(
        expr.execute(&detached(), &mut pool),
        Err(Error::NotBound)
    ));
}

#[test]
fn binding_twice_is_rejected() {
    let mut expr = Expr::<SimpleCursor>::integer(1);
    let mut scope = VariableScope::new();
    expr.bind(&mut scope).unwrap();
    assert!(matches!(expr.bind(&mut scope), Err(Error::AlreadyBound)));
}

#[test]
fn bound_expression_is_reexecutable() {
    let (expr, pool_size) = bind_root(Expr::<SimpleCursor>::arithmetic(
        ArithOp::Add,
        Expr::integer(20),
        Expr::integer(22),
    ))
    .unwrap();
    for _ in 0..3 {
        let mut pool = DataPool::new(pool_size);
        let value = expr.execute(&detached(), &mut pool).unwrap();
        assert!(matches!(value, Value::Atomic(Atomic::Integer(42))));
    }
}

#[test]
fn general_predicate_filters_with_candidate_context() {
    // a/*[. = "x"] over <a><b>x</b><c>y</c><b>x</b></a>
    let root = doc()
        .child(
            elem("a")
                .child(elem("b").child(text("x")))
                .child(elem("c").child(text("y")))
                .child(elem("b").child(text("x"))),
        )
        .build();
    let base = Expr::path(
        PathStart::ContextNode,
        Some(
            PathStep::axis(Axis::Child, NodeTest::Name(QName::local("a")))
                .then(PathStep::axis(Axis::Child, NodeTest::AnyName)),
        ),
    );
    let predicate = Expr::comparison(
        CompOp::Eq,
        Expr::context_item(),
        Expr::literal(Atomic::String("x".into())),
    );
    let expr = Expr::filter(base, predicate);
    let got = names(evaluate(expr, &EvalContext::with_node(root)).unwrap());
    assert_eq!(got, vec!["b", "b"]);
}

#[test]
fn literal_integer_predicate_acts_as_position_filter() {
    let expr = Expr::filter(
        Expr::range(Expr::integer(10), Expr::integer(14)),
        Expr::integer(3),
    );
    assert_eq!(names(eval(expr).unwrap()), vec!["12"]);
}

#[test]
fn computed_numeric_predicate_matches_its_ordinal() {
    // (10 to 14)[1 + 1] — not a literal, but still positional.
    let expr = Expr::filter(
        Expr::range(Expr::integer(10), Expr::integer(14)),
        Expr::arithmetic(ArithOp::Add, Expr::integer(1), Expr::integer(1)),
    );
    assert_eq!(names(eval(expr).unwrap()), vec!["11"]);
}

#[test]
fn function_calls_resolve_at_construction() {
    let mut registry = FunctionRegistry::<SimpleCursor>::new();
    registry.register_local("double", 1, |_ctx, args| {
        let Some(a) = args[0].clone().atomize_single()? else {
            return Ok(Value::Empty);
        };
        let registry = xq_engine::TypeRegistry::global();
        Ok(Value::Atomic(xq_engine::value::add(registry, &a, &a)?))
    });

    let missing = Expr::function_call(&registry, ExpandedName::local("triple"), vec![]);
    assert!(matches!(
        missing,
        Err(Error::UndefinedFunction { arity: 0, .. })
    ));

    let call = Expr::function_call(
        &registry,
        ExpandedName::local("double"),
        vec![Expr::integer(21)],
    )
    .unwrap();
    assert_eq!(atomic(eval(call)), Atomic::Integer(42));
}

#[test]
fn node_comparisons_use_identity_and_document_order() {
    let root = doc()
        .child(elem("a").child(elem("b")).child(elem("c")))
        .build();
    let first = Expr::path(
        PathStart::ContextNode,
        Some(
            PathStep::axis(Axis::Child, NodeTest::AnyName)
                .then(PathStep::axis(Axis::Child, NodeTest::Name(QName::local("b")))),
        ),
    );
    let second = Expr::path(
        PathStart::ContextNode,
        Some(
            PathStep::axis(Axis::Child, NodeTest::AnyName)
                .then(PathStep::axis(Axis::Child, NodeTest::Name(QName::local("c")))),
        ),
    );
    let expr = Expr::node_comparison(NodeCompOp::Before, first, second);
    let got = evaluate(expr, &EvalContext::with_node(root)).unwrap();
    assert!(matches!(got, Value::Atomic(Atomic::Boolean(true))));
}

#[test]
fn sequence_node_flattens_nested_results() {
    let expr = Expr::sequence(vec![
        Expr::integer(1),
        Expr::range(Expr::integer(2), Expr::integer(3)),
        Expr::sequence(vec![]),
        Expr::integer(4),
    ]);
    assert_eq!(names(eval(expr).unwrap()), vec!["1", "2", "3", "4"]);
}

#[test]
fn context_sensitivity_is_computed_bottom_up() {
    let (ctx_free, _) = bind_root(Expr::<SimpleCursor>::arithmetic(
        ArithOp::Add,
        Expr::integer(1),
        Expr::integer(2),
    ))
    .unwrap();
    assert!(!ctx_free.is_context_sensitive());

    let (ctx_bound, _) = bind_root(Expr::<SimpleCursor>::arithmetic(
        ArithOp::Add,
        Expr::integer(1),
        Expr::context_item(),
    ))
    .unwrap();
    assert!(ctx_bound.is_context_sensitive());
}

#[test]
fn variable_values_flow_through_the_data_pool() {
    // Drive the pool by hand: bind $v, then read it back.
    let mut scope = VariableScope::new();
    let slot = scope.push("v");
    let mut expr = Expr::<SimpleCursor>::var("v");
    expr.bind(&mut scope).unwrap();
    let expr = Arc::new(expr);
    let mut pool = DataPool::new(scope.pool_size());
    pool.set(slot, Value::Atomic(Atomic::Integer(9)));
    let got = expr.execute(&detached(), &mut pool).unwrap();
    assert!(matches!(got, Value::Atomic(Atomic::Integer(9))));
}

#[test]
fn drained_for_over_nodes_reuses_cloned_cursors() {
    // for $x in child::* return $x — then drain twice from one value via
    // clone to prove re-entrant sub-evaluation.
    let root = elem("a").child(elem("b")).child(elem("c")).build();
    let expr = Expr::for_in(
        "x",
        Expr::path(
            PathStart::ContextNode,
            Some(PathStep::axis(Axis::Child, NodeTest::AnyName)),
        ),
        Expr::var("x"),
    );
    let value = evaluate(expr, &EvalContext::with_node(root)).unwrap();
    let Value::Sequence(cursor) = value else {
        panic!("for yields a sequence");
    };
    let a = drain(Value::Sequence(cursor.clone()));
    let b = drain(Value::Sequence(cursor));
    assert_eq!(a.len(), 2);
    assert_eq!(a.len(), b.len());
    assert!(matches!(&a[0], Item::Node(_)));
}
