//! Selection mixin addressing modes and collection member handles.

mod common;

use common::capture_errors;
use serde_json::json;
use stagehand::testing::Rig;
use stagehand::{
    Address, Clock, Column, DriverConfig, EventType, Fluent, RecordKey, RecordLocator, Selectable,
    Toolkit,
};

/// A rig with a `#list` collection of four records and rendered item nodes.
fn list_rig() -> (Rig, stagehand::NodeId, Vec<stagehand::NodeId>) {
    let rig = Rig::new();
    let list = rig.dom.add_node("div", Some("list"));
    rig.toolkit.seed_records(
        list,
        (1..=4i64).map(|id| (id, json!({"name": format!("row-{id}"), "group": id % 2}))),
    );
    let mut nodes = Vec::new();
    for index in 0..4 {
        let node = rig.dom.add_child(list, "div", None);
        rig.toolkit.set_record_node(list, index, node);
        nodes.push(node);
    }
    (rig, list, nodes)
}

#[test]
fn select_by_keys_then_wait_for_exact_selection() {
    let (rig, list, _nodes) = list_rig();

    rig.driver
        .list("#list")
        .select(Address::keys([1i64, 3]))
        .selected(Address::keys([1i64, 3]));
    rig.pump(5_000);

    assert!(!rig.driver.player().has_pending(), "chain must drain");
    assert_eq!(
        rig.toolkit.selected_keys(list),
        vec![RecordKey::from(1i64), RecordKey::from(3i64)]
    );
}

#[test]
fn select_by_index_range_and_all() {
    let (rig, list, _nodes) = list_rig();

    let handle = rig.driver.list("#list");
    handle.select(Address::index(0)).selected(Address::index(0));
    rig.pump(5_000);
    assert_eq!(rig.toolkit.selected_keys(list).len(), 1);

    handle
        .select(Address::range(1, 2))
        .selected(Address::indexes([0, 1, 2]));
    rig.pump(5_000);
    assert_eq!(rig.toolkit.selected_keys(list).len(), 3);

    handle.select(Address::All).selected(Address::All);
    rig.pump(5_000);
    assert_eq!(rig.toolkit.selected_keys(list).len(), 4);

    handle.deselect(Address::All).deselected(Address::All);
    rig.pump(5_000);
    assert!(rig.toolkit.selected_keys(list).is_empty());
}

#[test]
fn select_by_property_query() {
    let (rig, list, _nodes) = list_rig();

    rig.driver
        .list("#list")
        .select(Address::query("group", 1))
        .selected(Address::query("group", 1));
    rig.pump(5_000);

    // Records 1 and 3 have group == 1.
    assert_eq!(
        rig.toolkit.selected_keys(list),
        vec![RecordKey::from(1i64), RecordKey::from(3i64)]
    );
}

#[test]
fn unresolvable_keys_fail_the_run() {
    let (rig, _list, _nodes) = list_rig();
    let errors = capture_errors(rig.driver.player());

    rig.driver.list("#list").select(Address::keys([1i64, 99]));
    rig.pump(5_000);

    let errors = errors.borrow();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("did not match"), "{}", errors[0]);
}

#[test]
fn selection_wait_wakes_on_the_toolkit_event() {
    // A coarse poll interval proves the subscription does the waking.
    let (rig, list, _nodes) = {
        let rig = Rig::with_config(DriverConfig {
            event_delay_ms: 0,
            poll_interval_ms: 60_000,
            debounce_ms: 1,
            pointer_grace_ms: 0,
            ..DriverConfig::default()
        });
        let list = rig.dom.add_node("div", Some("list"));
        rig.toolkit
            .seed_records(list, (1..=4i64).map(|id| (id, json!({}))));
        (rig, list, Vec::<stagehand::NodeId>::new())
    };

    rig.driver.list("#list").selected(Address::keys([2i64]));
    {
        let toolkit = rig.toolkit.clone();
        rig.driver
            .timers()
            .defer(30, move || toolkit.select(list, &[RecordKey::from(2i64)]));
    }

    rig.pump(2_000);

    assert!(!rig.driver.player().has_pending());
    assert!(
        rig.clock.now_ms() < 1_000,
        "resolved via subscription at {}ms, not the poll",
        rig.clock.now_ms()
    );
    assert_eq!(rig.toolkit.subscription_count(), 0, "subscriptions torn down");
}

#[test]
fn item_handle_resolves_record_and_node() {
    let (rig, _list, nodes) = list_rig();

    let item = rig.driver.list("#list").item(RecordLocator::query("name", "row-3"));
    item.click();
    rig.pump(5_000);

    assert_eq!(item.record_index(), Some(2));
    assert_eq!(rig.injector.names(), vec!["click"]);
    assert_eq!(rig.injector.captured()[0].target, nodes[2]);
}

#[test]
fn item_selected_state_follows_selection() {
    let (rig, _list, _nodes) = list_rig();

    let list_handle = rig.driver.list("#list");
    list_handle
        .select(Address::keys([2i64]))
        .item(2i64)
        .selected()
        .list()
        .deselect(Address::keys([2i64]))
        .item(2i64)
        .deselected();
    rig.pump(5_000);

    assert!(!rig.driver.player().has_pending());
}

#[test]
fn reveal_waits_for_the_async_scroller() {
    let (rig, list, _nodes) = list_rig();
    rig.toolkit.set_async_scroll(true);

    let item = rig.driver.list("#list").item(4i64).reveal();
    rig.pump(1_000);

    assert_eq!(item.record_index(), Some(3));
    assert_eq!(rig.toolkit.scroll_log(), vec![(list, 3)]);
    assert!(
        rig.driver.player().has_pending(),
        "reveal still waiting on the scroller"
    );

    assert_eq!(rig.toolkit.flush_scrolls(), 1);
    rig.pump(1_000);
    assert!(!rig.driver.player().has_pending());
}

#[test]
fn reveal_completes_synchronously_without_async_scroller() {
    let (rig, list, _nodes) = list_rig();

    rig.driver.list("#list").item(1i64).reveal();
    rig.pump(1_000);

    assert_eq!(rig.toolkit.scroll_log(), vec![(list, 0)]);
    assert!(!rig.driver.player().has_pending());
}

#[test]
fn grid_rows_and_cells_resolve_through_column_locators() {
    let rig = Rig::new();
    let grid = rig.dom.add_node("table", Some("orders"));
    rig.toolkit.seed_records(
        grid,
        [
            ("a", json!({"total": 10})),
            ("b", json!({"total": 20})),
        ],
    );
    rig.toolkit.seed_columns(
        grid,
        vec![
            Column {
                key: "name".to_owned(),
                index: 0,
                meta: json!({"title": "Name"}),
            },
            Column {
                key: "total".to_owned(),
                index: 1,
                meta: json!({"title": "Total"}),
            },
        ],
    );
    let row_node = rig.dom.add_child(grid, "tr", None);
    let cell_node = rig.dom.add_child(row_node, "td", None);
    rig.toolkit.set_record_node(grid, 1, row_node);
    rig.toolkit.set_cell_node(grid, 1, 1, cell_node);

    let row = rig.driver.grid("#orders").row("b");
    let cell = row.cell("total");
    cell.click();
    rig.pump(5_000);

    assert_eq!(row.record_index(), Some(1));
    assert_eq!(rig.injector.captured()[0].target, cell_node);
    assert_eq!(rig.injector.captured()[0].event, EventType::Click);

    // Return-to-owner navigation keeps the chain fluent.
    let grid_again = cell.row().grid();
    grid_again.select(Address::keys(["b"]));
    rig.pump(5_000);
    assert!(!rig.driver.player().has_pending());
}

#[test]
fn record_value_reaches_inspection_callbacks() {
    let (rig, _list, _nodes) = list_rig();
    let seen = std::rc::Rc::new(std::cell::RefCell::new(None));

    {
        let seen = seen.clone();
        rig.driver
            .list("#list")
            .item(2i64)
            .and(move |subject| *seen.borrow_mut() = Some(subject.value.clone()));
    }
    rig.pump(5_000);

    let value = seen.borrow().clone().unwrap();
    assert_eq!(value["name"], "row-2");
}
