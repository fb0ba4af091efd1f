#![allow(dead_code)]

use xq_engine::model::TreeCursor;
use xq_engine::simple_tree::SimpleCursor;
use xq_engine::{Item, SequenceCursor, Value};

/// Drains a value into a vector, panicking on stream errors.
pub fn drain(value: Value<SimpleCursor>) -> Vec<Item<SimpleCursor>> {
    let mut out = Vec::new();
    let mut cursor = value.into_cursor();
    while let Some(item) = cursor.next_item() {
        out.push(item.expect("sequence item"));
    }
    out
}

/// Local names of node items; atomic items render as their string value.
pub fn names(value: Value<SimpleCursor>) -> Vec<String> {
    drain(value)
        .into_iter()
        .map(|item| match item {
            Item::Node(n) => n
                .name()
                .map_or_else(|| format!("{:?}", n.node_kind()), |q| q.local),
            Item::Atomic(a) => a.string_value(),
        })
        .collect()
}
