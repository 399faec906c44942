//! Shared helpers for the integration suites.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use stagehand::testing::Rig;
use stagehand::{Outcome, Player};

/// A shared label log for ordering assertions.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    entries: Rc<RefCell<Vec<String>>>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, label: &str) {
        self.entries.borrow_mut().push(label.to_owned());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.borrow().clone()
    }
}

/// Capture player error messages for assertions.
pub fn capture_errors(player: &Player) -> Rc<RefCell<Vec<String>>> {
    let errors = Rc::new(RefCell::new(Vec::new()));
    let sink = errors.clone();
    player.on_error(move |message| sink.borrow_mut().push(message.to_owned()));
    errors
}

/// Capture the end-of-run signal.
pub fn capture_end(player: &Player) -> Rc<RefCell<bool>> {
    let ended = Rc::new(RefCell::new(false));
    let sink = ended.clone();
    player.on_end_once(move || *sink.borrow_mut() = true);
    ended
}

/// Capture a block outcome.
pub fn outcome_slot() -> (Rc<RefCell<Option<Outcome>>>, impl FnOnce(Outcome)) {
    let slot = Rc::new(RefCell::new(None));
    let sink = slot.clone();
    (slot, move |outcome| *sink.borrow_mut() = Some(outcome))
}

/// A rig with a visible, attached `#btn` button already in the document.
pub fn rig_with_button() -> (Rig, stagehand::NodeId) {
    let rig = Rig::new();
    let button = rig.dom.add_node("button", Some("btn"));
    (rig, button)
}
