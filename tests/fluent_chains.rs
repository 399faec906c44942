//! Fluent chains end to end: actions, states, inspection, waits, and
//! relational navigation.

mod common;

use std::cell::Cell;
use std::rc::Rc;

use common::{capture_errors, rig_with_button, Trace};
use serde_json::json;
use stagehand::testing::Rig;
use stagehand::{Clock, DriverConfig, Fluent, ToolkitVariant, WidgetFlag};

#[test]
fn click_then_visible_drains_in_order() {
    let (rig, _button) = rig_with_button();
    rig.driver.element("#btn").click().visible();
    rig.pump(5_000);

    assert_eq!(rig.injector.names(), vec!["click"]);
    assert!(!rig.driver.player().has_pending());
}

#[test]
fn chains_share_one_root_resolution() {
    let (rig, button) = rig_with_button();
    let handle = rig.driver.element("#btn");
    handle.click().focus().double_click();
    rig.pump(5_000);

    let captured = rig.injector.captured();
    assert_eq!(captured.len(), 3);
    assert!(captured.iter().all(|e| e.target == button));
    assert_eq!(handle.handle().element().unwrap().node(), button);
}

#[test]
fn set_value_then_value_like() {
    let rig = Rig::new();
    let field = rig.dom.add_node("input", Some("name"));

    rig.driver
        .field("#name")
        .set_value(json!("Ada Lovelace"))
        .value_like("Lovelace");
    rig.pump(5_000);

    use stagehand::Toolkit;
    assert_eq!(rig.toolkit.value(field), json!("Ada Lovelace"));
    assert!(!rig.driver.player().has_pending());
}

#[test]
fn checked_state_wakes_on_the_toolkit_event() {
    // Coarse polling: only the subscription can wake the wait.
    let rig = Rig::with_config(DriverConfig {
        event_delay_ms: 0,
        poll_interval_ms: 60_000,
        debounce_ms: 1,
        pointer_grace_ms: 0,
        ..DriverConfig::default()
    });
    let field = rig.dom.add_node("input", Some("agree"));

    rig.driver.field("#agree").checked();
    {
        let toolkit = rig.toolkit.clone();
        rig.driver.timers().defer(40, move || {
            toolkit.set_flag(field, WidgetFlag::Checked, true);
            toolkit.fire(field, "check");
        });
    }

    rig.pump(2_000);

    assert!(!rig.driver.player().has_pending());
    assert!(rig.clock.now_ms() < 1_000, "woken at {}ms", rig.clock.now_ms());
    assert_eq!(rig.toolkit.subscription_count(), 0);
}

#[test]
fn modern_variant_listens_on_its_own_events() {
    let rig = Rig::with_config(DriverConfig {
        event_delay_ms: 0,
        poll_interval_ms: 60_000,
        debounce_ms: 1,
        pointer_grace_ms: 0,
        variant: ToolkitVariant::Modern,
        ..DriverConfig::default()
    });
    let field = rig.dom.add_node("input", Some("agree"));

    rig.driver.field("#agree").checked();
    {
        let toolkit = rig.toolkit.clone();
        rig.driver.timers().defer(40, move || {
            toolkit.set_flag(field, WidgetFlag::Checked, true);
            // The rewritten toolkit only fires change.
            toolkit.fire(field, "change");
        });
    }

    rig.pump(2_000);
    assert!(!rig.driver.player().has_pending());
    assert!(rig.clock.now_ms() < 1_000);
}

#[test]
fn container_expand_collapse_states() {
    let rig = Rig::new();
    let panel = rig.dom.add_node("div", Some("panel"));
    rig.toolkit.set_flag(panel, WidgetFlag::Expanded, true);

    rig.driver.container("#panel").expanded();
    rig.pump(5_000);
    assert!(!rig.driver.player().has_pending());

    rig.toolkit.set_flag(panel, WidgetFlag::Expanded, false);
    rig.driver.container("#panel").collapsed();
    rig.pump(5_000);
    assert!(!rig.driver.player().has_pending());
}

#[test]
fn destroyed_state_waits_for_removal() {
    let rig = Rig::new();
    let toast = rig.dom.add_node("div", Some("toast"));

    {
        let dom = rig.dom.clone();
        rig.driver.timers().defer(30, move || dom.set_attached(toast, false));
    }
    rig.driver.element("#toast").destroyed();
    rig.pump(5_000);

    assert!(!rig.driver.player().has_pending());
    assert!(rig.clock.now_ms() >= 30);
}

#[test]
fn inspection_sees_the_resolved_element() {
    let (rig, button) = rig_with_button();
    let seen = Rc::new(Cell::new(None));

    {
        let seen = seen.clone();
        rig.driver
            .element("#btn")
            .and(move |subject| seen.set(Some(subject.node())));
    }
    rig.pump(5_000);

    assert_eq!(seen.get(), Some(button));
}

#[test]
fn wait_steps_interleave_with_the_chain() {
    let (rig, _button) = rig_with_button();
    let trace = Trace::new();
    let gate = Rc::new(Cell::new(false));

    {
        let gate = gate.clone();
        rig.driver.timers().defer(60, move || gate.set(true));
    }
    {
        let trace = trace.clone();
        let gate = gate.clone();
        rig.driver
            .element("#btn")
            .and(move |_| trace.push("before"))
            .wait_ms(20)
            .label("gate open")
            .wait_until(move || gate.get())
            .click();
    }

    rig.pump(5_000);

    assert_eq!(trace.entries(), vec!["before"]);
    assert_eq!(rig.injector.names(), vec!["click"]);
    assert!(rig.clock.now_ms() >= 60, "click held behind the gate");
}

#[test]
fn wait_until_timeout_uses_the_diagnostic_label() {
    let (rig, _button) = rig_with_button();
    let errors = capture_errors(rig.driver.player());

    rig.driver
        .element("#btn")
        .timeout(100)
        .label("grid refresh")
        .wait_until(|| false);
    rig.pump(5_000);

    let errors = errors.borrow();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("grid refresh"), "{}", errors[0]);
}

#[test]
fn relational_navigation_scopes_queries() {
    let rig = Rig::new();
    let form = rig.dom.add_node("form", Some("signup"));
    let row = rig.dom.add_child(form, "div", None);
    let input = rig.dom.add_child(row, "input", None);
    // A decoy input outside the form must not match the scoped query.
    rig.dom.add_node("input", Some("decoy"));

    rig.driver.element("#signup").down("input").click();
    rig.pump(5_000);

    assert_eq!(rig.injector.captured()[0].target, input);

    rig.injector.clear();
    rig.driver.element("#signup").child("div").click();
    rig.pump(5_000);
    assert_eq!(rig.injector.captured()[0].target, row);
}

#[test]
fn upward_navigation_finds_the_ancestor() {
    let rig = Rig::new();
    let form = rig.dom.add_node("form", Some("signup"));
    let row = rig.dom.add_child(form, "div", None);
    let input = rig.dom.add_child(row, "input", Some("email"));
    let _ = input;

    rig.driver.element("#email").up("form").click();
    rig.pump(5_000);

    assert_eq!(rig.injector.captured()[0].target, form);
}

#[test]
fn handle_timeout_governs_the_root_binding() {
    let rig = Rig::new();
    let errors = capture_errors(rig.driver.player());

    rig.driver.element("#nonexistent").timeout(80).click();
    rig.pump(5_000);

    assert_eq!(errors.borrow().len(), 1);
    assert!(
        rig.clock.now_ms() < 1_000,
        "root timed out at {}ms under the chain timeout",
        rig.clock.now_ms()
    );
}

#[test]
#[should_panic(expected = "no state")]
fn unknown_state_panics_with_the_class_name() {
    let (rig, _button) = rig_with_button();
    rig.driver.element("#btn").state("expanded");
}
