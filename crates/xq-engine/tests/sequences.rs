//! Document-order normalization, position filtering and the support
//! cursors.

mod common;

use xq_engine::iter::axes::{Axis, AxisCursor, NodeTest};
use xq_engine::iter::{
    ConcatCursor, DocOrderCursor, EmptyCursor, PositionFilterCursor, RangeCursor, VecCursor,
};
use xq_engine::model::TreeCursor;
use xq_engine::simple_tree::{elem, SimpleCursor};
use xq_engine::{Atomic, BoxedCursor, Error, Item, SequenceCursor};

fn tree() -> SimpleCursor {
    elem("a")
        .child(elem("b"))
        .child(elem("c"))
        .child(elem("b"))
        .build()
}

fn nth_child(root: &SimpleCursor, n: usize) -> SimpleCursor {
    let mut cur = root.clone();
    assert!(cur.move_to_first_child());
    for _ in 0..n {
        assert!(cur.move_to_next_sibling());
    }
    cur
}

fn drain_cursor(mut cursor: BoxedCursor<SimpleCursor>) -> Result<Vec<Item<SimpleCursor>>, Error> {
    let mut out = Vec::new();
    while let Some(item) = cursor.next_item() {
        out.push(item?);
    }
    Ok(out)
}

fn node_names(items: &[Item<SimpleCursor>]) -> Vec<String> {
    items
        .iter()
        .map(|item| match item {
            Item::Node(n) => n.name().expect("named node").local,
            Item::Atomic(a) => a.string_value(),
        })
        .collect()
}

#[test]
fn doc_order_sorts_and_dedups_by_position() {
    let root = tree();
    let b2 = nth_child(&root, 2);
    let c = nth_child(&root, 1);
    let b1 = nth_child(&root, 0);
    // Shuffled, with one positional duplicate.
    let scrambled = VecCursor::new(vec![
        Item::Node(b2.clone()),
        Item::Node(c.clone()),
        Item::Node(b1),
        Item::Node(c),
    ]);
    let sorted = drain_cursor(Box::new(DocOrderCursor::new(Box::new(scrambled)))).unwrap();
    assert_eq!(node_names(&sorted), vec!["b", "c", "b"]);
}

#[test]
fn doc_order_is_idempotent() {
    let root = tree();
    let source: BoxedCursor<SimpleCursor> =
        Box::new(AxisCursor::new(&root, Axis::Child, NodeTest::AnyName));
    let once = drain_cursor(Box::new(DocOrderCursor::new(source.boxed_clone()))).unwrap();
    let twice = drain_cursor(Box::new(DocOrderCursor::new(Box::new(DocOrderCursor::new(
        source,
    )))))
    .unwrap();
    assert_eq!(node_names(&once), node_names(&twice));
}

#[test]
fn doc_order_passes_atomic_only_sequences_through() {
    let items = vec![
        Item::Atomic(Atomic::Integer(3)),
        Item::Atomic(Atomic::Integer(1)),
    ];
    let out = drain_cursor(Box::new(DocOrderCursor::new(Box::new(VecCursor::new(
        items,
    )))))
    .unwrap();
    // Atomic sequences have no document order; arrival order is kept.
    assert_eq!(node_names(&out), vec!["3", "1"]);
}

#[test]
fn doc_order_rejects_mixed_sequences() {
    let root = tree();
    let mixed = VecCursor::new(vec![
        Item::Node(root),
        Item::Atomic(Atomic::Integer(1)),
    ]);
    let err = drain_cursor(Box::new(DocOrderCursor::new(Box::new(mixed)))).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch(_)));
}

#[test]
fn position_filter_yields_exactly_the_kth_item() {
    let root = tree();
    for (k, expected) in [(1, Some("b")), (2, Some("c")), (3, Some("b")), (4, None)] {
        let base: BoxedCursor<SimpleCursor> =
            Box::new(AxisCursor::new(&root, Axis::Child, NodeTest::AnyName));
        let got = drain_cursor(Box::new(PositionFilterCursor::new(base, k))).unwrap();
        match expected {
            Some(name) => assert_eq!(node_names(&got), vec![name]),
            None => assert!(got.is_empty()),
        }
    }
}

#[test]
fn position_filter_rejects_out_of_range_targets() {
    let base: BoxedCursor<SimpleCursor> = Box::new(RangeCursor::new(1, 100));
    let got = drain_cursor(Box::new(PositionFilterCursor::new(base, 0))).unwrap();
    assert!(got.is_empty());
    let base: BoxedCursor<SimpleCursor> = Box::new(RangeCursor::new(1, 100));
    let got = drain_cursor(Box::new(PositionFilterCursor::new(base, -2))).unwrap();
    assert!(got.is_empty());
}

#[test]
fn range_cursor_is_inclusive_and_empty_when_reversed() {
    let got = drain_cursor(Box::new(RangeCursor::new(2, 4)) as BoxedCursor<SimpleCursor>).unwrap();
    assert_eq!(node_names(&got), vec!["2", "3", "4"]);
    let got = drain_cursor(Box::new(RangeCursor::new(4, 2)) as BoxedCursor<SimpleCursor>).unwrap();
    assert!(got.is_empty());
}

#[test]
fn concat_preserves_left_to_right_order() {
    let parts: Vec<BoxedCursor<SimpleCursor>> = vec![
        Box::new(RangeCursor::new(1, 2)),
        Box::new(EmptyCursor),
        Box::new(RangeCursor::new(5, 6)),
    ];
    let got = drain_cursor(Box::new(ConcatCursor::new(parts))).unwrap();
    assert_eq!(node_names(&got), vec!["1", "2", "5", "6"]);
}

#[test]
fn buffered_copy_replays_remaining_items() {
    let mut base: BoxedCursor<SimpleCursor> = Box::new(RangeCursor::new(1, 4));
    base.next_item().unwrap().unwrap();
    let buffered = base.create_buffered().unwrap();
    let first = drain_cursor(Box::new(buffered.clone())).unwrap();
    let second = drain_cursor(Box::new(buffered)).unwrap();
    assert_eq!(node_names(&first), vec!["2", "3", "4"]);
    assert_eq!(node_names(&first), node_names(&second));
}

#[test]
fn boxed_clone_of_partially_drained_cursor_resumes() {
    let root = tree();
    let mut original: BoxedCursor<SimpleCursor> =
        Box::new(AxisCursor::new(&root, Axis::Child, NodeTest::AnyName));
    original.next_item().unwrap().unwrap();
    let clone = original.boxed_clone();
    assert_eq!(
        node_names(&drain_cursor(clone).unwrap()),
        node_names(&drain_cursor(original).unwrap())
    );
}
