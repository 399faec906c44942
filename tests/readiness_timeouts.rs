//! Readiness gating: deferred visibility, timeouts and their messages,
//! animation settling, locator re-resolution.

mod common;

use std::rc::Rc;

use common::{capture_end, capture_errors};
use stagehand::testing::{CapturingInjector, MockDom, MockToolkit, Rig};
use stagehand::{
    Clock, Driver, DriverConfig, EventType, ManualClock, PlayState, Playable, TargetSpec,
};

#[test]
fn click_waits_for_deferred_visibility() {
    let rig = Rig::new();
    let button = rig.dom.add_node("button", Some("btn"));
    rig.dom.set_visible(button, false);

    {
        let dom = rig.dom.clone();
        rig.driver.timers().defer(40, move || dom.set_visible(button, true));
    }
    rig.driver
        .play(
            Playable::event(EventType::Click)
                .with_target(TargetSpec::selector("#btn"))
                .with_timeout(1_000),
        )
        .unwrap();

    rig.pump(5_000);

    assert_eq!(rig.injector.names(), vec!["click"]);
    assert!(
        (40..=60).contains(&rig.clock.now_ms()),
        "dispatched at {}ms",
        rig.clock.now_ms()
    );
}

#[test]
fn missing_target_times_out_with_a_descriptive_message() {
    let rig = Rig::new();
    let errors = capture_errors(rig.driver.player());
    let ended = capture_end(rig.driver.player());

    rig.driver
        .play(
            Playable::event(EventType::Click)
                .with_target(TargetSpec::selector("#missing"))
                .with_timeout(200),
        )
        .unwrap();
    rig.pump(5_000);

    let errors = errors.borrow();
    assert_eq!(errors.len(), 1, "exactly one error event");
    let message = &errors[0];
    assert!(message.contains("#missing"), "{message}");
    assert!(message.contains("available"), "{message}");
    assert!(message.contains("click"), "{message}");
    assert!(*ended.borrow());
    assert!(!rig.driver.player().has_pending());
    assert!(rig.injector.is_empty());
}

#[test]
fn invisible_target_timeout_names_the_awaited_state() {
    let rig = Rig::new();
    let button = rig.dom.add_node("button", Some("btn"));
    rig.dom.set_visible(button, false);
    let errors = capture_errors(rig.driver.player());

    rig.driver
        .play(
            Playable::event(EventType::Click)
                .with_target(TargetSpec::selector("#btn"))
                .with_timeout(100),
        )
        .unwrap();
    rig.pump(5_000);

    let errors = errors.borrow();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("#btn"), "{}", errors[0]);
    assert!(errors[0].contains("visible"), "{}", errors[0]);
}

#[test]
fn zero_timeout_disables_the_deadline() {
    let rig = Rig::new();
    let errors = capture_errors(rig.driver.player());

    {
        let dom = rig.dom.clone();
        rig.driver
            .timers()
            .defer(30_000, move || {
                dom.add_node("button", Some("late"));
            });
    }
    rig.driver
        .play(
            Playable::event(EventType::Click)
                .with_target(TargetSpec::selector("#late"))
                .with_timeout(0),
        )
        .unwrap();

    rig.pump(60_000);

    assert!(errors.borrow().is_empty(), "timeout 0 never expires");
    assert_eq!(rig.injector.names(), vec!["click"]);
}

#[test]
fn dispatch_waits_for_animations_to_settle() {
    let clock = Rc::new(ManualClock::new(0));
    let dom = Rc::new(MockDom::new());
    let toolkit = Rc::new(MockToolkit::new());
    let injector = Rc::new(CapturingInjector::new());
    let animations = Rc::new(stagehand::testing::AnimationSwitch::default());
    animations.set_active(true);
    let driver = Driver::builder(dom.clone(), toolkit)
        .injector(injector.clone())
        .animations(animations.clone())
        .clock(clock.clone())
        .config(DriverConfig::immediate())
        .build();
    dom.add_node("button", Some("btn"));

    {
        let animations = animations.clone();
        driver.timers().defer(25, move || animations.set_active(false));
    }
    driver
        .play(Playable::event(EventType::Click).with_target(TargetSpec::selector("#btn")))
        .unwrap();

    stagehand::testing::pump(driver.timers(), &clock, 5_000);

    assert_eq!(injector.names(), vec!["click"]);
    assert!(clock.now_ms() >= 25, "held until animations settled");
}

#[test]
fn selector_re_resolution_rebinds_in_place() {
    let rig = Rig::new();
    let original = rig.dom.add_node("button", Some("btn"));
    rig.dom.set_visible(original, false);

    // Replace the node mid-wait; the selector must pick up the
    // replacement without failing the playable.
    {
        let dom = rig.dom.clone();
        rig.driver.timers().defer(20, move || {
            dom.remove(original);
            dom.add_node("button", Some("btn"));
        });
    }
    rig.driver
        .play(
            Playable::event(EventType::Click)
                .with_target(TargetSpec::selector("#btn"))
                .with_timeout(1_000),
        )
        .unwrap();

    rig.pump(5_000);

    let captured = rig.injector.captured();
    assert_eq!(captured.len(), 1);
    assert_ne!(captured[0].target, original, "dispatch goes to the replacement");
}

#[test]
fn resolver_function_gates_readiness() {
    let rig = Rig::new();
    let node = rig.dom.add_node("div", Some("probe"));
    rig.dom.set_attr(node, "data-ready", "no");

    {
        let dom = rig.dom.clone();
        rig.driver
            .timers()
            .defer(50, move || dom.set_attr(node, "data-ready", "yes"));
    }
    rig.driver
        .play(
            Playable::event(EventType::Click)
                .with_target(TargetSpec::resolver(move |dom| {
                    let candidate = dom.find("#probe", None, stagehand::Direction::Down)?;
                    (dom.attr(candidate, "data-ready").as_deref() == Some("yes"))
                        .then_some(candidate)
                }))
                .with_timeout(1_000),
        )
        .unwrap();

    rig.pump(5_000);

    assert_eq!(rig.injector.names(), vec!["click"]);
    assert!(rig.clock.now_ms() >= 50);
}

#[test]
fn detachment_wait_resolves_when_the_node_leaves() {
    let rig = Rig::new();
    let node = rig.dom.add_node("div", Some("toast"));

    {
        let dom = rig.dom.clone();
        rig.driver.timers().defer(35, move || dom.set_attached(node, false));
    }
    let handle = rig
        .driver
        .play(
            Playable::resolve(TargetSpec::selector("#toast"))
                .with_availability(stagehand::Availability::Detached)
                .with_timeout(1_000),
        )
        .unwrap();

    rig.pump(5_000);

    assert_eq!(handle.borrow().state, PlayState::Done);
    assert!(rig.clock.now_ms() >= 35);
}

#[test]
fn failed_playable_empties_the_rest_of_the_queue() {
    let rig = Rig::new();
    rig.dom.add_node("button", Some("btn"));
    let errors = capture_errors(rig.driver.player());

    rig.driver
        .play(
            Playable::event(EventType::Click)
                .with_target(TargetSpec::selector("#gone"))
                .with_timeout(50),
        )
        .unwrap();
    rig.driver
        .play(Playable::event(EventType::Click).with_target(TargetSpec::selector("#btn")))
        .unwrap();

    rig.pump(5_000);

    assert_eq!(errors.borrow().len(), 1);
    assert!(rig.injector.is_empty(), "queued tail never plays after a failure");
    assert!(!rig.driver.player().has_pending());
}
