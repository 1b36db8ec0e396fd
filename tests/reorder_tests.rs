//! Stable partition and container detection, end to end through the engine.

mod common;

use common::{Harness, RowSpec};
use rowpin::identity::PIN_ID_ATTR;
use rowpin::reorder;
use rowpin::{HostDocument, MemoryDocument, NodeId};
use std::time::Duration;

fn five() -> Vec<RowSpec<'static>> {
    ["a", "b", "c", "d", "e"]
        .into_iter()
        .map(|id| RowSpec::native(id, "Subject"))
        .collect()
}

#[test]
fn test_pins_move_to_top_in_pin_order() {
    let mut h = Harness::new(&five()).boot();
    h.click(h.rows[3]);
    h.click(h.rows[1]);

    assert_eq!(h.pinned_ids(), vec!["b", "d"]);
    assert_eq!(h.order(), vec!["b", "d", "a", "c", "e"]);

    h.engine.doc_mut().reset_moves();
    assert_eq!(h.engine.reorder_now(), 0);
    assert_eq!(h.doc().moves(), 0);
}

#[test]
fn test_partition_from_unsorted_list_uses_minimal_moves() {
    let mut doc = MemoryDocument::new();
    let list = doc.append(doc.root(), "tbody", &[], "");
    let rows: Vec<NodeId> = ["a", "b", "c", "d", "e"]
        .into_iter()
        .map(|id| doc.append(list, "tr", &[(PIN_ID_ATTR, id)], ""))
        .collect();
    doc.reset_moves();
    let pins = ["b", "d"];

    let moves = reorder::reorder(&mut doc, &rows, |id| pins.iter().position(|p| *p == id)).unwrap();

    assert_eq!(moves, 2);
    assert_eq!(doc.moves(), 2);
    assert_eq!(doc.child_attributes(list, PIN_ID_ATTR), ["b", "d", "a", "c", "e"]);
}

#[test]
fn test_unpinned_row_lands_after_pinned_block() {
    let mut h = Harness::new(&five()).boot();
    h.click(h.rows[3]);
    h.click(h.rows[1]);
    h.click(h.rows[1]);

    assert_eq!(h.pinned_ids(), vec!["d"]);
    assert_eq!(h.order(), vec!["d", "b", "a", "c", "e"]);
}

#[test]
fn test_no_reorder_without_pins() {
    let mut h = Harness::new(&five()).boot();
    h.engine.doc_mut().reset_moves();

    assert_eq!(h.engine.reorder_now(), 0);
    assert!(!h.engine.reorder_pending());
    h.run_for(Duration::from_secs(5));
    assert_eq!(h.doc().moves(), 0);
}

#[test]
fn test_wrapped_rows_reorder_their_wrappers() {
    let mut doc = MemoryDocument::new();
    let list = doc.append(doc.root(), "div", &[("role", "list")], "");
    let mut rows = Vec::new();
    for id in ["a", "b", "c"] {
        let wrapper = doc.append(list, "div", &[("class", "wrap")], "");
        rows.push(doc.append(wrapper, "div", &[(PIN_ID_ATTR, id)], ""));
    }
    let pins = ["c", "a"];

    assert_eq!(reorder::find_container(&doc, &rows), Some(list));
    reorder::reorder(&mut doc, &rows, |id| pins.iter().position(|p| *p == id)).unwrap();

    let order: Vec<String> = doc
        .children(list)
        .into_iter()
        .flat_map(|w| doc.child_attributes(w, PIN_ID_ATTR))
        .collect();
    assert_eq!(order, ["c", "a", "b"]);
}

#[test]
fn test_container_search_is_bounded() {
    // A single row buried deeper than the search limit
    let mut doc = MemoryDocument::new();
    let mut parent = doc.root();
    for _ in 0..(reorder::MAX_CONTAINER_DEPTH + 3) {
        parent = doc.append(parent, "div", &[], "");
    }
    let row = doc.append(parent, "div", &[(PIN_ID_ATTR, "x")], "");

    assert_eq!(reorder::find_container(&doc, &[row]), doc.parent(row));
}

#[test]
fn test_rows_already_in_order_are_not_moved() {
    let mut doc = MemoryDocument::new();
    let list = doc.append(doc.root(), "tbody", &[], "");
    let rows: Vec<NodeId> = ["a", "b", "c"]
        .into_iter()
        .map(|id| doc.append(list, "tr", &[(PIN_ID_ATTR, id)], ""))
        .collect();
    doc.reset_moves();
    let pins = ["b", "c"];

    let moves = reorder::reorder(&mut doc, &rows, |id| pins.iter().position(|p| *p == id)).unwrap();

    // b and c keep their places, a goes to the end
    assert_eq!(moves, 1);
    assert_eq!(doc.moves(), 1);
    assert_eq!(doc.child_attributes(list, PIN_ID_ATTR), ["b", "c", "a"]);
}
