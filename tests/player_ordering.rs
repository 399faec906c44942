//! Queue ordering guarantees: top-level FIFO, nested-callback splicing,
//! pause/resume, and termination signals.

mod common;

use common::{capture_end, capture_errors, rig_with_button, Trace};
use stagehand::testing::Rig;
use stagehand::{EventType, PlayState, Playable, TargetSpec};

#[test]
fn top_level_playables_fire_in_enqueue_order() {
    let rig = Rig::new();
    let trace = Trace::new();

    for label in ["first", "second", "third"] {
        let trace = trace.clone();
        rig.driver
            .play(Playable::callback(move || {
                trace.push(label);
                Ok(())
            }))
            .unwrap();
    }

    rig.pump(1_000);
    assert_eq!(trace.entries(), vec!["first", "second", "third"]);
    assert!(!rig.driver.player().has_pending());
}

#[test]
fn callback_enqueues_splice_ahead_of_later_playables() {
    // outer().callback(inner1, inner2).next() must play outer, inner1,
    // inner2, next.
    let rig = Rig::new();
    let trace = Trace::new();

    {
        let trace = trace.clone();
        let driver = rig.driver.clone();
        rig.driver
            .play(Playable::callback(move || {
                trace.push("outer");
                for label in ["inner1", "inner2"] {
                    let trace = trace.clone();
                    driver.play(Playable::callback(move || {
                        trace.push(label);
                        Ok(())
                    }))?;
                }
                Ok(())
            }))
            .unwrap();
    }
    {
        let trace = trace.clone();
        rig.driver
            .play(Playable::callback(move || {
                trace.push("next");
                Ok(())
            }))
            .unwrap();
    }

    rig.pump(1_000);
    assert_eq!(trace.entries(), vec!["outer", "inner1", "inner2", "next"]);
}

#[test]
fn nested_callbacks_interleave_recursively() {
    let rig = Rig::new();
    let trace = Trace::new();

    {
        let trace = trace.clone();
        let driver = rig.driver.clone();
        rig.driver
            .play(Playable::callback(move || {
                trace.push("a");
                let inner_trace = trace.clone();
                let inner_driver = driver.clone();
                driver.play(Playable::callback(move || {
                    inner_trace.push("a.1");
                    let leaf_trace = inner_trace.clone();
                    inner_driver.play(Playable::callback(move || {
                        leaf_trace.push("a.1.1");
                        Ok(())
                    }))?;
                    Ok(())
                }))?;
                let tail_trace = trace.clone();
                driver.play(Playable::callback(move || {
                    tail_trace.push("a.2");
                    Ok(())
                }))?;
                Ok(())
            }))
            .unwrap();
    }
    {
        let trace = trace.clone();
        rig.driver
            .play(Playable::callback(move || {
                trace.push("b");
                Ok(())
            }))
            .unwrap();
    }

    rig.pump(1_000);
    assert_eq!(trace.entries(), vec!["a", "a.1", "a.1.1", "a.2", "b"]);
}

#[test]
fn back_reference_targets_bind_at_enqueue() {
    let (rig, button) = rig_with_button();

    rig.driver
        .play(
            Playable::event(EventType::Click).with_target(TargetSpec::selector("#btn")),
        )
        .unwrap();
    rig.driver
        .play(Playable::event(EventType::Focus).with_back_ref(1))
        .unwrap();

    rig.pump(1_000);

    let captured = rig.injector.captured();
    assert_eq!(captured.len(), 2);
    assert_eq!(captured[0].target, button);
    assert_eq!(captured[1].target, button);
}

#[test]
fn back_reference_past_queue_head_is_rejected() {
    let rig = Rig::new();
    let result = rig
        .driver
        .play(Playable::event(EventType::Click).with_back_ref(3));
    assert!(result.is_err());
}

#[test]
fn pause_unshifts_the_pending_playable() {
    let (rig, _button) = rig_with_button();
    let trace = Trace::new();

    let handle = {
        let trace = trace.clone();
        rig.driver
            .play(
                Playable::callback(move || {
                    trace.push("played");
                    Ok(())
                })
                .with_delay(50),
            )
            .unwrap()
    };

    // Let the drain pick the playable up, then pause before its delay
    // timer fires.
    rig.driver.timers().run_due();
    rig.driver.player().pause();
    assert_eq!(handle.borrow().state, PlayState::Queued);

    rig.pump(1_000);
    assert!(trace.entries().is_empty(), "paused player must not play");

    rig.driver.player().resume();
    rig.pump(1_000);
    assert_eq!(trace.entries(), vec!["played"]);
}

#[test]
fn pause_from_inside_a_callback_does_not_unshift() {
    let rig = Rig::new();
    let trace = Trace::new();

    {
        let trace = trace.clone();
        let player = rig.driver.player().clone();
        rig.driver
            .play(Playable::callback(move || {
                player.pause();
                trace.push("ran");
                Ok(())
            }))
            .unwrap();
    }
    {
        let trace = trace.clone();
        rig.driver
            .play(Playable::callback(move || {
                trace.push("after");
                Ok(())
            }))
            .unwrap();
    }

    rig.pump(1_000);
    assert_eq!(trace.entries(), vec!["ran"], "queue stays paused");

    rig.driver.player().resume();
    rig.pump(1_000);
    assert_eq!(trace.entries(), vec!["ran", "after"]);
}

#[test]
fn stop_empties_the_queue_and_signals_end() {
    let rig = Rig::new();
    let trace = Trace::new();

    {
        let trace = trace.clone();
        rig.driver
            .play(Playable::wait_ms(10_000))
            .unwrap();
        rig.driver
            .play(Playable::callback(move || {
                trace.push("never");
                Ok(())
            }))
            .unwrap();
    }

    let ended = capture_end(rig.driver.player());
    let errors = capture_errors(rig.driver.player());

    rig.driver.player().stop();
    rig.pump(100);

    assert!(*ended.borrow());
    assert!(errors.borrow().is_empty());
    assert!(trace.entries().is_empty());
    assert!(!rig.driver.player().has_pending());
}

#[test]
fn queue_drain_emits_end_once() {
    let rig = Rig::new();
    let ended = capture_end(rig.driver.player());

    rig.driver.play(Playable::wait_ms(5)).unwrap();
    rig.pump(1_000);

    assert!(*ended.borrow());
    assert!(!rig.driver.player().has_pending());
}

#[test]
fn every_playable_reaches_a_terminal_state() {
    let (rig, _button) = rig_with_button();

    let handles = vec![
        rig.driver.play(Playable::wait_ms(3)).unwrap(),
        rig.driver
            .play(Playable::event(EventType::Click).with_target(TargetSpec::selector("#btn")))
            .unwrap(),
        rig.driver.play(Playable::callback(|| Ok(()))).unwrap(),
        rig.driver
            .play(Playable::predicate(|_cx, p| {
                p.clear_waiting();
                true
            }))
            .unwrap(),
    ];

    rig.pump(5_000);
    for handle in handles {
        assert_eq!(handle.borrow().state, PlayState::Done);
    }
}
