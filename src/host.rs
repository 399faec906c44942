//! Host collaborator contracts: event injection, animation probing, visual
//! feedback, gesture completion.
//!
//! All of these are optional surfaces of the embedding page; the no-op
//! implementations here are legitimate production choices, not test stubs.

use crate::dom::NodeId;
use crate::playable::{EventPayload, EventType};

/// Synthesises and dispatches a DOM event against a resolved target.
pub trait Injector {
    /// Dispatch one event. `related` carries the resolved related target
    /// for event types that use one.
    fn inject(
        &self,
        event: EventType,
        payload: &EventPayload,
        target: NodeId,
        related: Option<NodeId>,
    );
}

/// Answers whether the page currently runs animations the player should
/// wait out before dispatching.
pub trait AnimationProbe {
    fn any_active(&self) -> bool;
}

/// On-screen pointer and gesture indicators shown while events play.
pub trait PointerFeedback {
    fn show_pointer(&self, x: f64, y: f64);
    fn hide_pointer(&self);
    fn show_gesture(&self);
    fn hide_gesture(&self);
}

/// Framework hook consulted by the tail of a tap expansion: the gesture
/// recognizer of the page may need extra ticks after `click` before the
/// gesture is fully processed.
pub trait GestureProbe {
    fn activate(&self);
    fn deactivate(&self);
    /// True once the named gesture has completed against the target.
    fn complete(&self, target: NodeId, gesture: &str) -> bool;
}

/// Animation probe for pages without animations.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAnimations;

impl AnimationProbe for NoAnimations {
    fn any_active(&self) -> bool {
        false
    }
}

/// Pointer feedback that draws nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPointerFeedback;

impl PointerFeedback for NoPointerFeedback {
    fn show_pointer(&self, _x: f64, _y: f64) {}
    fn hide_pointer(&self) {}
    fn show_gesture(&self) {}
    fn hide_gesture(&self) {}
}

/// Injector that drops every event.
///
/// Useful when a driver is constructed only to evaluate wait states.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullInjector;

impl Injector for NullInjector {
    fn inject(
        &self,
        event: EventType,
        _payload: &EventPayload,
        target: NodeId,
        _related: Option<NodeId>,
    ) {
        tracing::debug!(
            event = "injector.drop",
            dom_event = event.name(),
            %target,
            "NullInjector dropped event"
        );
    }
}
