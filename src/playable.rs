//! The unit of scheduled work.
//!
//! A playable either dispatches a DOM event, invokes a callback, sleeps, or
//! polls a predicate. It carries its own readiness policy, delay, timeout,
//! and diagnostic bookkeeping, and moves through a strict state machine:
//!
//! ```text
//! queued ── shift ──▶ pending ── ready? ──yes──▶ playing ──▶ done
//!                        │                           │
//!                        └── not ready & deadline ───┴──▶ timed-out
//!                        └── callback fails ─────────────▶ errored
//! ```
//!
//! # Invariants
//!
//! - A playable enters `queued` exactly once and terminates exactly once.
//! - Back-references are rewritten to shared references at enqueue time.
//! - Readiness bookkeeping (`waiting`) drives diagnostics, not correctness.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::block::Done;
use crate::dom::{Dom, Element};
use crate::error::Result;
use crate::host::AnimationProbe;
use crate::locator::TargetSpec;
use crate::toolkit::Toolkit;

/// Shared handle to a queued playable.
pub type PlayableHandle = Rc<RefCell<Playable>>;

/// Monotonic per-player identifier, used for relative references and
/// diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlayableId(pub u64);

impl fmt::Display for PlayableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "playable:{}", self.0)
    }
}

/// DOM event types the player can inject, plus the two composites it
/// expands itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    PointerDown,
    PointerUp,
    MouseDown,
    MouseUp,
    Click,
    DoubleClick,
    ContextMenu,
    KeyDown,
    KeyUp,
    Input,
    Focus,
    Blur,
    /// Composite: pointerdown → pointerup → click → gesture wait.
    Tap,
    /// Composite: keydown/keyup per character of `text`, or one pair for a
    /// bare `key`.
    Type,
}

impl EventType {
    /// Lower-case DOM event name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::PointerDown => "pointerdown",
            Self::PointerUp => "pointerup",
            Self::MouseDown => "mousedown",
            Self::MouseUp => "mouseup",
            Self::Click => "click",
            Self::DoubleClick => "dblclick",
            Self::ContextMenu => "contextmenu",
            Self::KeyDown => "keydown",
            Self::KeyUp => "keyup",
            Self::Input => "input",
            Self::Focus => "focus",
            Self::Blur => "blur",
            Self::Tap => "tap",
            Self::Type => "type",
        }
    }

    /// Whether the player expands this type instead of dispatching it.
    #[must_use]
    pub const fn is_composite(self) -> bool {
        matches!(self, Self::Tap | Self::Type)
    }

    /// Whether dispatching this event begins a gesture.
    #[must_use]
    pub const fn is_gesture_start(self) -> bool {
        matches!(self, Self::PointerDown | Self::MouseDown)
    }

    /// Whether dispatching this event ends a gesture.
    #[must_use]
    pub const fn is_gesture_end(self) -> bool {
        matches!(self, Self::PointerUp | Self::MouseUp)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Type-specific event fields handed to the injector.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventPayload {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub button: Option<u8>,
    pub detail: Option<u32>,
    pub key: Option<String>,
    pub text: Option<String>,
    pub caret: Option<usize>,
    pub meta: bool,
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

impl EventPayload {
    /// Copy modifier state and button/detail from a composite's payload
    /// onto a sub-event, unless the sub-event already carries them.
    pub fn inherit(&mut self, from: &EventPayload) {
        self.meta |= from.meta;
        self.shift |= from.shift;
        self.ctrl |= from.ctrl;
        self.alt |= from.alt;
        if self.button.is_none() {
            self.button = from.button;
        }
        if self.detail.is_none() {
            self.detail = from.detail;
        }
    }
}

/// Attachment requirement for a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Availability {
    /// The element must be part of the document (default).
    #[default]
    Attached,
    /// The element must have left the document.
    Detached,
    /// Attachment is irrelevant.
    Ignore,
}

/// Visibility requirement for a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisibilityPolicy {
    /// The element must render (default).
    #[default]
    Visible,
    /// The element must not render.
    Hidden,
    /// Visibility is irrelevant.
    Ignore,
}

/// Whether readiness waits for page animations to go idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnimationPolicy {
    /// Wait until no animations run (default).
    #[default]
    Settled,
    /// Dispatch regardless of running animations.
    Ignore,
}

/// Lifecycle of a playable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Queued,
    Pending,
    Playing,
    Done,
    TimedOut,
    Errored,
}

impl PlayState {
    /// Whether the playable has finished, one way or another.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::TimedOut | Self::Errored)
    }
}

impl fmt::Display for PlayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Queued => "queued",
            Self::Pending => "pending",
            Self::Playing => "playing",
            Self::Done => "done",
            Self::TimedOut => "timed-out",
            Self::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Which of a playable's two element slots a readiness check concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRole {
    Target,
    RelatedTarget,
}

impl TargetRole {
    const fn label(self) -> &'static str {
        match self {
            Self::Target => "target",
            Self::RelatedTarget => "related target",
        }
    }
}

/// Diagnostic tags describing what a not-ready playable is waiting on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Waiting {
    /// What is being waited for ("target", a wait label, ...).
    pub subject: String,
    /// The awaited condition ("available", "visible", "expanded", ...).
    pub state: String,
    /// Human identifier of the element involved, when known.
    pub selector: Option<String>,
}

/// User work attached to a callback playable.
#[derive(Clone)]
pub enum Callback {
    /// Completes when the function returns.
    Sync(Rc<dyn Fn() -> Result<()>>),
    /// Completes when the supplied [`Done`] is invoked.
    Async(Rc<dyn Fn(Done) -> Result<()>>),
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("Callback::Sync"),
            Self::Async(_) => f.write_str("Callback::Async"),
        }
    }
}

/// What a playable does once it is ready.
#[derive(Clone)]
pub enum PlayKind {
    /// Ask the injector to dispatch a DOM event.
    Event(EventType),
    /// Invoke a user callback.
    Callback(Callback),
    /// Sleep for `delay` and complete.
    Delay,
    /// Complete once the readiness predicate holds; dispatch nothing.
    Predicate,
}

impl fmt::Debug for PlayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event(event) => write!(f, "Event({event})"),
            Self::Callback(callback) => callback.fmt(f),
            Self::Delay => f.write_str("Delay"),
            Self::Predicate => f.write_str("Predicate"),
        }
    }
}

/// Collaborators available to readiness predicates.
pub struct ReadyCx<'a> {
    pub dom: &'a dyn Dom,
    pub toolkit: &'a dyn Toolkit,
    pub animations: &'a dyn AnimationProbe,
    pub now_ms: u64,
}

/// Custom readiness predicate.
///
/// By contract a custom predicate replaces the composite check entirely and
/// maintains the waiting tags itself: call
/// [`Playable::clear_waiting`] on success and [`Playable::set_waiting`] on
/// failure so timeouts stay diagnosable.
pub type ReadyFn = Rc<dyn Fn(&ReadyCx<'_>, &mut Playable) -> bool>;

/// One queued scheduling unit.
pub struct Playable {
    pub id: PlayableId,
    pub kind: PlayKind,
    pub target: Option<TargetSpec>,
    pub related_target: Option<TargetSpec>,
    pub resolved_target: Option<Element>,
    pub resolved_related_target: Option<Element>,
    pub availability: Availability,
    pub visibility: VisibilityPolicy,
    pub animation: AnimationPolicy,
    pub ready: Option<ReadyFn>,
    /// Post-previous-playable wait before the first readiness check.
    /// `None` until the player applies its configured default.
    pub delay: Option<u64>,
    /// Wall-clock budget from the first not-ready observation. `None`
    /// defers to the player default; `Some(0)` disables.
    pub timeout: Option<u64>,
    pub state: PlayState,
    pub wait_started_ms: Option<u64>,
    pub waiting: Option<Waiting>,
    pub payload: EventPayload,
    cleanup: Vec<Box<dyn FnOnce()>>,
}

impl Playable {
    fn bare(kind: PlayKind) -> Self {
        Self {
            id: PlayableId(0),
            kind,
            target: None,
            related_target: None,
            resolved_target: None,
            resolved_related_target: None,
            availability: Availability::default(),
            visibility: VisibilityPolicy::default(),
            animation: AnimationPolicy::default(),
            ready: None,
            delay: None,
            timeout: None,
            state: PlayState::Queued,
            wait_started_ms: None,
            waiting: None,
            payload: EventPayload::default(),
            cleanup: Vec::new(),
        }
    }

    /// An injected-event playable.
    #[must_use]
    pub fn event(event: EventType) -> Self {
        Self::bare(PlayKind::Event(event))
    }

    /// A callback playable completing on return.
    #[must_use]
    pub fn callback(f: impl Fn() -> Result<()> + 'static) -> Self {
        let mut playable = Self::bare(PlayKind::Callback(Callback::Sync(Rc::new(f))));
        playable.animation = AnimationPolicy::Ignore;
        playable
    }

    /// A callback playable completing when its [`Done`] is invoked.
    #[must_use]
    pub fn callback_done(f: impl Fn(Done) -> Result<()> + 'static) -> Self {
        let mut playable = Self::bare(PlayKind::Callback(Callback::Async(Rc::new(f))));
        playable.animation = AnimationPolicy::Ignore;
        playable
    }

    /// A pure delay.
    #[must_use]
    pub fn wait_ms(ms: u64) -> Self {
        let mut playable = Self::bare(PlayKind::Delay);
        playable.delay = Some(ms);
        playable.animation = AnimationPolicy::Ignore;
        playable
    }

    /// A root-binding playable: completes once its target exists. Only
    /// attachment is checked; visibility and animations are ignored.
    #[must_use]
    pub fn resolve(spec: TargetSpec) -> Self {
        let mut playable = Self::bare(PlayKind::Predicate);
        playable.target = Some(spec);
        playable.visibility = VisibilityPolicy::Ignore;
        playable.animation = AnimationPolicy::Ignore;
        playable
    }

    /// A polled predicate with no dispatch.
    #[must_use]
    pub fn predicate(f: impl Fn(&ReadyCx<'_>, &mut Playable) -> bool + 'static) -> Self {
        let mut playable = Self::bare(PlayKind::Predicate);
        playable.ready = Some(Rc::new(f));
        playable.animation = AnimationPolicy::Ignore;
        playable
    }

    pub fn with_target(mut self, spec: TargetSpec) -> Self {
        self.target = Some(spec);
        self
    }

    pub fn with_related_target(mut self, spec: TargetSpec) -> Self {
        self.related_target = Some(spec);
        self
    }

    /// Target the playable `offset` positions earlier in the queue.
    pub fn with_back_ref(self, offset: usize) -> Self {
        self.with_target(TargetSpec::BackRef(offset))
    }

    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay = Some(ms);
        self
    }

    pub fn with_timeout(mut self, ms: u64) -> Self {
        self.timeout = Some(ms);
        self
    }

    pub fn with_payload(mut self, payload: EventPayload) -> Self {
        self.payload = payload;
        self
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.payload.x = Some(x);
        self.payload.y = Some(y);
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.payload.key = Some(key.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.payload.text = Some(text.into());
        self
    }

    pub fn with_caret(mut self, caret: usize) -> Self {
        self.payload.caret = Some(caret);
        self
    }

    pub fn with_availability(mut self, availability: Availability) -> Self {
        self.availability = availability;
        self
    }

    pub fn with_visibility(mut self, visibility: VisibilityPolicy) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_animation(mut self, animation: AnimationPolicy) -> Self {
        self.animation = animation;
        self
    }

    /// Replace the composite readiness check.
    pub fn with_ready(mut self, ready: ReadyFn) -> Self {
        self.ready = Some(ready);
        self
    }

    /// Register teardown to run when the playable reaches a terminal state.
    pub fn add_cleanup(&mut self, teardown: impl FnOnce() + 'static) {
        self.cleanup.push(Box::new(teardown));
    }

    pub(crate) fn take_cleanup(&mut self) -> Vec<Box<dyn FnOnce()>> {
        std::mem::take(&mut self.cleanup)
    }

    /// Record a state transition.
    pub(crate) fn transition(&mut self, next: PlayState) {
        tracing::debug!(
            event = "playable.transition",
            id = %self.id,
            from = %self.state,
            to = %next,
            kind = ?self.kind,
            "Playable state change"
        );
        self.state = next;
    }

    /// Set the waiting tags for diagnostics.
    pub fn set_waiting(&mut self, subject: impl Into<String>, state: impl Into<String>) {
        self.waiting = Some(Waiting {
            subject: subject.into(),
            state: state.into(),
            selector: None,
        });
    }

    /// Set the waiting tags including the element identifier.
    pub fn set_waiting_on(
        &mut self,
        subject: impl Into<String>,
        state: impl Into<String>,
        selector: impl Into<String>,
    ) {
        self.waiting = Some(Waiting {
            subject: subject.into(),
            state: state.into(),
            selector: Some(selector.into()),
        });
    }

    /// Clear the waiting tags after a successful check.
    pub fn clear_waiting(&mut self) {
        self.waiting = None;
    }

    /// Evaluate readiness: the custom predicate when present, the composite
    /// check otherwise.
    pub(crate) fn is_ready(&mut self, cx: &ReadyCx<'_>) -> bool {
        if let Some(ready) = self.ready.clone() {
            return ready(cx, self);
        }
        self.composite_ready(cx)
    }

    /// The default composite readiness: animations idle, then both element
    /// slots resolved and conforming to their availability and visibility
    /// policies.
    pub fn composite_ready(&mut self, cx: &ReadyCx<'_>) -> bool {
        if self.animation == AnimationPolicy::Settled && cx.animations.any_active() {
            self.set_waiting("animations", "settled");
            return false;
        }
        if !self.role_ready(cx, TargetRole::Target) {
            return false;
        }
        if !self.role_ready(cx, TargetRole::RelatedTarget) {
            return false;
        }
        self.clear_waiting();
        true
    }

    /// Check one element slot against the readiness policies.
    pub fn role_ready(&mut self, cx: &ReadyCx<'_>, role: TargetRole) -> bool {
        let spec = match role {
            TargetRole::Target => self.target.clone(),
            TargetRole::RelatedTarget => self.related_target.clone(),
        };
        let Some(spec) = spec else {
            return true;
        };

        let element = self.resolve_role(cx.dom, &spec, role);

        let Some(element) = element else {
            // A vanished element satisfies a pure detachment wait.
            if self.availability == Availability::Detached
                && self.visibility != VisibilityPolicy::Visible
            {
                return true;
            }
            self.set_waiting_on(role.label(), "available", spec.describe(cx.dom));
            return false;
        };

        let node = element.node();
        let describe = || cx.dom.describe(node);
        let attached = cx.dom.is_attached(node);

        match self.availability {
            Availability::Attached if !attached => {
                self.set_waiting_on(role.label(), "available", describe());
                return false;
            }
            Availability::Detached if attached => {
                self.set_waiting_on(role.label(), "detached", describe());
                return false;
            }
            _ => {}
        }

        match self.visibility {
            VisibilityPolicy::Visible if !cx.dom.is_visible(node) => {
                self.set_waiting_on(role.label(), "visible", describe());
                return false;
            }
            VisibilityPolicy::Hidden if cx.dom.is_visible(node) => {
                self.set_waiting_on(role.label(), "hidden", describe());
                return false;
            }
            _ => {}
        }

        true
    }

    /// Resolve one slot, maintaining the cached wrapper: a replacement node
    /// rebinds the existing wrapper in place, a shared spec adopts the
    /// upstream playable's wrapper so both observe future rebinds.
    fn resolve_role(&mut self, dom: &dyn Dom, spec: &TargetSpec, role: TargetRole) -> Option<Element> {
        let slot = match role {
            TargetRole::Target => &mut self.resolved_target,
            TargetRole::RelatedTarget => &mut self.resolved_related_target,
        };

        if let TargetSpec::Shared(upstream) = spec {
            let element = upstream.borrow().resolved_target.clone()?;
            *slot = Some(element.clone());
            return Some(element);
        }

        match spec.resolve(dom) {
            Some(node) => {
                let element = match slot {
                    Some(existing) => {
                        existing.rebind(node);
                        existing.clone()
                    }
                    None => {
                        let element = Element::new(node);
                        *slot = Some(element.clone());
                        element
                    }
                };
                Some(element)
            }
            None => {
                // A resolver that stops returning a node re-enters not-ready
                // without dropping the cached wrapper.
                None
            }
        }
    }
}

impl fmt::Debug for Playable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Playable")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("target", &self.target)
            .field("delay", &self.delay)
            .field("timeout", &self.timeout)
            .field("waiting", &self.waiting)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_types_expose_dom_names() {
        assert_eq!(EventType::PointerDown.name(), "pointerdown");
        assert_eq!(EventType::DoubleClick.name(), "dblclick");
        assert!(EventType::Tap.is_composite());
        assert!(!EventType::Click.is_composite());
        assert!(EventType::PointerDown.is_gesture_start());
        assert!(EventType::MouseUp.is_gesture_end());
    }

    #[test]
    fn payload_inherit_respects_existing_fields() {
        let mut sub = EventPayload {
            button: Some(2),
            ..EventPayload::default()
        };
        let parent = EventPayload {
            button: Some(0),
            detail: Some(1),
            shift: true,
            ..EventPayload::default()
        };

        sub.inherit(&parent);
        assert_eq!(sub.button, Some(2));
        assert_eq!(sub.detail, Some(1));
        assert!(sub.shift);
        assert!(!sub.meta);
    }

    #[test]
    fn terminal_states() {
        assert!(PlayState::Done.is_terminal());
        assert!(PlayState::TimedOut.is_terminal());
        assert!(PlayState::Errored.is_terminal());
        assert!(!PlayState::Pending.is_terminal());
    }

    #[test]
    fn waiting_tags_round_trip() {
        let mut playable = Playable::event(EventType::Click);
        playable.set_waiting_on("target", "visible", "#btn");
        let waiting = playable.waiting.clone().unwrap();
        assert_eq!(waiting.subject, "target");
        assert_eq!(waiting.state, "visible");
        assert_eq!(waiting.selector.as_deref(), Some("#btn"));

        playable.clear_waiting();
        assert!(playable.waiting.is_none());
    }
}
