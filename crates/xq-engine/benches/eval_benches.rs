use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use xq_engine::expr::path::{PathStart, PathStep};
use xq_engine::iter::axes::{Axis, NodeTest};
use xq_engine::simple_tree::{doc, elem, text, SimpleCursor};
use xq_engine::{
    bind_root, ArithOp, DataPool, EvalContext, Expr, Item, QName, SequenceCursor, Value,
};

/// Document with `sections` sections, each holding `rows` rows of three
/// cells plus some non-matching noise nodes.
fn build_document(sections: usize, rows: usize) -> SimpleCursor {
    let mut root = elem("table");
    for s in 0..sections {
        let mut section = elem("section");
        section = section.child(elem("caption").child(text(&format!("section {s}"))));
        for _ in 0..rows {
            let mut row = elem("row");
            for _ in 0..3 {
                row = row.child(elem("cell").child(text("x")));
            }
            section = section.child(row);
        }
        root = root.child(section);
    }
    doc().child(root).build()
}

fn name(local: &str) -> NodeTest {
    NodeTest::Name(QName::local(local))
}

fn drain(value: Value<SimpleCursor>) -> usize {
    let mut cursor = value.into_cursor();
    let mut count = 0;
    while let Some(item) = cursor.next_item() {
        let item = item.expect("eval failure");
        black_box(matches!(item, Item::Node(_)));
        count += 1;
    }
    count
}

fn bind_path(steps: PathStep<SimpleCursor>) -> (Arc<Expr<SimpleCursor>>, usize) {
    bind_root(Expr::path(PathStart::ContextNode, Some(steps))).expect("bind failure")
}

fn benchmark_descendant_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("axes/descendant_scan");
    for sections in [10usize, 100] {
        let document = build_document(sections, 10);
        let ctx = EvalContext::with_node(document);
        let (expr, pool_size) = bind_path(PathStep::axis(Axis::Descendant, NodeTest::AnyName));
        group.bench_with_input(BenchmarkId::from_parameter(sections), &ctx, |b, ctx| {
            b.iter(|| {
                let mut pool = DataPool::new(pool_size);
                let value = expr.execute(black_box(ctx), &mut pool).expect("eval failure");
                black_box(drain(value));
            });
        });
    }
    group.finish();
}

fn benchmark_fused_vs_stepwise(c: &mut Criterion) {
    let document = build_document(50, 20);
    let ctx = EvalContext::with_node(document);

    // Qualifies for the child-over-descendants rewrite.
    let fused = bind_path(
        PathStep::axis(Axis::Descendant, name("section"))
            .then(PathStep::axis(Axis::Child, name("row")))
            .then(PathStep::axis(Axis::Child, name("cell"))),
    );
    // The self step in the middle keeps this one stepwise.
    let stepwise = bind_path(
        PathStep::axis(Axis::Descendant, name("section"))
            .then(PathStep::axis(Axis::Child, name("row")))
            .then(PathStep::axis(Axis::SelfAxis, NodeTest::Any))
            .then(PathStep::axis(Axis::Child, name("cell"))),
    );

    let mut group = c.benchmark_group("paths/section_row_cell");
    for (label, (expr, pool_size)) in [("fused", fused), ("stepwise", stepwise)] {
        group.bench_with_input(BenchmarkId::from_parameter(label), &ctx, |b, ctx| {
            b.iter(|| {
                let mut pool = DataPool::new(pool_size);
                let value = expr.execute(black_box(ctx), &mut pool).expect("eval failure");
                black_box(drain(value));
            });
        });
    }
    group.finish();
}

fn benchmark_for_arithmetic(c: &mut Criterion) {
    // for $n in 1 to 1000 return $n * $n
    let (expr, pool_size) = bind_root(Expr::<SimpleCursor>::for_in(
        "n",
        Expr::range(Expr::integer(1), Expr::integer(1000)),
        Expr::arithmetic(ArithOp::Mul, Expr::var("n"), Expr::var("n")),
    ))
    .expect("bind failure");
    let ctx = EvalContext::detached();
    c.bench_function("expr/for_square_loop", |b| {
        b.iter(|| {
            let mut pool = DataPool::new(pool_size);
            let value = expr.execute(black_box(&ctx), &mut pool).expect("eval failure");
            black_box(drain(value));
        });
    });
}

fn benchmark_bind(c: &mut Criterion) {
    fn build() -> Expr<SimpleCursor> {
        Expr::for_in(
            "n",
            Expr::range(Expr::integer(1), Expr::integer(10)),
            Expr::path(
                PathStart::ContextNode,
                Some(
                    PathStep::axis(Axis::Descendant, NodeTest::Name(QName::local("section")))
                        .then(PathStep::axis(Axis::Child, NodeTest::Name(QName::local("row"))))
                        .then(PathStep::axis(Axis::Child, NodeTest::Name(QName::local("cell")))),
                ),
            ),
        )
    }
    c.bench_function("expr/bind", |b| {
        b.iter(|| {
            let bound = bind_root(black_box(build())).expect("bind failure");
            black_box(bound);
        });
    });
}

criterion_group!(
    benches,
    benchmark_descendant_scan,
    benchmark_fused_vs_stepwise,
    benchmark_for_arithmetic,
    benchmark_bind
);
criterion_main!(benches);
