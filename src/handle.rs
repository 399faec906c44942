//! Fluent handle core.
//!
//! A handle is a deferred reference to an element or component. Creating
//! one enqueues a single root playable that resolves the element and caches
//! it; every chained method enqueues further playables that share the root's
//! resolved element. Handles are cheap to clone and may outlive any single
//! playable.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::block::Done;
use crate::dom::{Direction, Dom, Element, NodeId};
use crate::driver::Driver;
use crate::error::Error;
use crate::item::RecordBinding;
use crate::locator::TargetSpec;
use crate::playable::{
    Availability, EventPayload, EventType, PlayState, Playable, PlayableHandle, VisibilityPolicy,
};
use crate::toolkit::{Toolkit, ToolkitVariant};

/// The widget classes the fluent layer distinguishes. States are registered
/// per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetClass {
    Element,
    Component,
    Button,
    Field,
    Container,
    List,
    Grid,
    Item,
    Row,
    Cell,
}

impl WidgetClass {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Element => "element",
            Self::Component => "component",
            Self::Button => "button",
            Self::Field => "field",
            Self::Container => "container",
            Self::List => "list",
            Self::Grid => "grid",
            Self::Item => "item",
            Self::Row => "row",
            Self::Cell => "cell",
        }
    }
}

impl fmt::Display for WidgetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Arguments to a parameterised state (`value_like("foo")`).
#[derive(Debug, Clone, Default)]
pub struct StateArgs(Vec<Value>);

impl StateArgs {
    #[must_use]
    pub const fn none() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn one(value: impl Into<Value>) -> Self {
        Self(vec![value.into()])
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    #[must_use]
    pub fn first_str(&self) -> Option<&str> {
        self.0.first().and_then(Value::as_str)
    }
}

/// Collaborators available to a state predicate.
pub struct StateCx<'a> {
    pub dom: &'a dyn Dom,
    pub toolkit: &'a dyn Toolkit,
    pub node: NodeId,
}

/// How a wait-state learns that it should re-check its predicate.
#[derive(Clone)]
pub enum WaitStrategy {
    /// Re-check on the player's poll interval only.
    Poll,
    /// Subscribe to these toolkit events; each fire schedules a re-check
    /// after the configured debounce. Polling remains as a backstop.
    Events(&'static [&'static str]),
    /// Custom arming: the function subscribes however it needs to, invokes
    /// the notifier on change, and returns a teardown.
    Armed(Rc<dyn Fn(Rc<dyn Toolkit>, NodeId, Rc<dyn Fn()>) -> Box<dyn FnOnce()>>),
}

impl fmt::Debug for WaitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Poll => f.write_str("Poll"),
            Self::Events(names) => write!(f, "Events({names:?})"),
            Self::Armed(_) => f.write_str("Armed"),
        }
    }
}

/// A declaratively registered wait-state for a widget class.
pub struct StateDescriptor {
    pub name: &'static str,
    /// Synchronous predicate over the resolved target.
    pub is: Rc<dyn Fn(&StateCx<'_>, &StateArgs) -> bool>,
    pub wait: WaitStrategy,
    /// Readiness overrides; `None` inherits the state defaults (attached,
    /// visibility ignored).
    pub availability: Option<Availability>,
    pub visibility: Option<VisibilityPolicy>,
}

impl fmt::Debug for StateDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateDescriptor")
            .field("name", &self.name)
            .field("wait", &self.wait)
            .finish_non_exhaustive()
    }
}

/// Per-class state table, built once for the resolved toolkit variant.
#[derive(Debug, Default)]
pub struct StateRegistry {
    map: HashMap<(WidgetClass, &'static str), Rc<StateDescriptor>>,
    variant: ToolkitVariant,
}

impl StateRegistry {
    #[must_use]
    pub fn new(variant: ToolkitVariant) -> Self {
        Self {
            map: HashMap::new(),
            variant,
        }
    }

    /// The variant this registry was built for.
    #[must_use]
    pub const fn variant(&self) -> ToolkitVariant {
        self.variant
    }

    /// Register a state for several classes. Later registrations replace
    /// earlier ones, which is how variant tables patch the base table.
    pub fn register(&mut self, classes: &[WidgetClass], descriptor: StateDescriptor) {
        let descriptor = Rc::new(descriptor);
        for class in classes {
            self.map.insert((*class, descriptor.name), descriptor.clone());
        }
    }

    #[must_use]
    pub fn lookup(&self, class: WidgetClass, name: &str) -> Option<Rc<StateDescriptor>> {
        self.map.get(&(class, name)).cloned()
    }
}

/// Where the value handed to inspection callbacks comes from.
#[derive(Clone)]
pub(crate) enum ValueSource {
    /// The element itself; the value is null.
    Element,
    /// The component value read from the toolkit.
    Component,
    /// The bound collection record.
    Record(Rc<RecordBinding>),
}

/// What an inspection callback sees: the resolved element and the handle's
/// value attribute.
#[derive(Debug, Clone)]
pub struct Subject {
    pub element: Element,
    pub value: Value,
}

impl Subject {
    /// The node currently backing the subject.
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.element.node()
    }
}

/// A fully assembled wait condition, ready to enqueue.
pub(crate) struct WaitState {
    pub label: String,
    pub is: Rc<dyn Fn(&StateCx<'_>) -> bool>,
    pub wait: WaitStrategy,
    pub availability: Availability,
    pub visibility: VisibilityPolicy,
}

pub(crate) struct HandleInner {
    driver: Driver,
    class: WidgetClass,
    root: PlayableHandle,
    timeout: Cell<Option<u64>>,
    and_timeout: Cell<Option<u64>>,
    value_source: ValueSource,
    wait_label: RefCell<Option<String>>,
}

/// Shared core of every fluent handle.
#[derive(Clone)]
pub struct Handle {
    inner: Rc<HandleInner>,
}

impl Handle {
    /// Create a handle and enqueue its root-binding playable. The root only
    /// waits for existence: visibility and animation checks are disabled.
    pub(crate) fn bind_root(
        driver: &Driver,
        class: WidgetClass,
        locator: TargetSpec,
        timeout: Option<u64>,
        value_source: ValueSource,
    ) -> Self {
        let mut root = Playable::resolve(locator);
        if let Some(ms) = timeout {
            root.timeout = Some(ms);
        }
        let root = driver.player().enqueue_known(root);
        tracing::debug!(
            event = "handle.bind",
            class = class.name(),
            root = %root.borrow().id,
            "Handle bound"
        );
        Self {
            inner: Rc::new(HandleInner {
                driver: driver.clone(),
                class,
                root,
                timeout: Cell::new(timeout),
                and_timeout: Cell::new(None),
                value_source,
                wait_label: RefCell::new(None),
            }),
        }
    }

    /// Create a handle around an already-enqueued root playable. Used by
    /// collection item handles whose roots do record resolution.
    pub(crate) fn from_root(
        driver: &Driver,
        class: WidgetClass,
        root: PlayableHandle,
        timeout: Option<u64>,
        value_source: ValueSource,
    ) -> Self {
        Self {
            inner: Rc::new(HandleInner {
                driver: driver.clone(),
                class,
                root,
                timeout: Cell::new(timeout),
                and_timeout: Cell::new(None),
                value_source,
                wait_label: RefCell::new(None),
            }),
        }
    }

    /// The driver this handle enqueues against.
    #[must_use]
    pub fn driver(&self) -> &Driver {
        &self.inner.driver
    }

    /// The widget class states are resolved against.
    #[must_use]
    pub fn class(&self) -> WidgetClass {
        self.inner.class
    }

    /// The root-binding playable whose resolution all chained playables
    /// share.
    #[must_use]
    pub fn root(&self) -> &PlayableHandle {
        &self.inner.root
    }

    /// The resolved element, once the root playable has played.
    #[must_use]
    pub fn element(&self) -> Option<Element> {
        self.inner.root.borrow().resolved_target.clone()
    }

    pub(crate) fn set_timeout(&self, ms: u64) {
        self.inner.timeout.set(Some(ms));
        // A timeout set right after construction also governs the root
        // binding, as long as the root has not been picked up yet.
        let mut root = self.inner.root.borrow_mut();
        if root.state == PlayState::Queued && root.timeout.is_none() {
            root.timeout = Some(ms);
        }
    }

    pub(crate) fn set_and_timeout(&self, ms: u64) {
        self.inner.and_timeout.set(Some(ms));
    }

    pub(crate) fn set_wait_label(&self, label: &str) {
        *self.inner.wait_label.borrow_mut() = Some(label.to_owned());
    }

    fn take_wait_label(&self) -> Option<String> {
        self.inner.wait_label.borrow_mut().take()
    }

    fn apply_timeout(&self, mut playable: Playable) -> Playable {
        if playable.timeout.is_none() {
            playable.timeout = self.inner.timeout.get();
        }
        playable
    }

    /// Enqueue an injected event against the root's resolved element.
    pub(crate) fn enqueue_action(&self, event: EventType, payload: EventPayload) -> PlayableHandle {
        let playable = Playable::event(event)
            .with_target(TargetSpec::Shared(self.inner.root.clone()))
            .with_payload(payload);
        self.inner.driver.player().enqueue_known(self.apply_timeout(playable))
    }

    /// Enqueue a wait condition with subscription-accelerated readiness.
    pub(crate) fn enqueue_wait_state(&self, wait_state: WaitState) -> PlayableHandle {
        let WaitState {
            label,
            is,
            wait,
            availability,
            visibility,
        } = wait_state;

        let toolkit = self.inner.driver.toolkit_rc();
        let timers = self.inner.driver.timers().clone();
        let weak = self.inner.driver.player().downgrade();
        let debounce = self.inner.driver.config().debounce_ms;
        let armed = Rc::new(Cell::new(false));

        let mut playable = Playable::predicate(move |cx, p| {
            if !p.composite_ready(cx) {
                return false;
            }
            let Some(node) = p.resolved_target.as_ref().map(Element::node) else {
                // The composite passed with no element, which only happens
                // for detachment waits; the state holds vacuously.
                p.clear_waiting();
                return true;
            };

            if !armed.get() {
                armed.set(true);
                match &wait {
                    WaitStrategy::Poll => {}
                    WaitStrategy::Events(names) => {
                        for name in *names {
                            let timers = timers.clone();
                            let weak = weak.clone();
                            let notify: Rc<dyn Fn()> = Rc::new(move || {
                                let weak = weak.clone();
                                timers.defer(debounce, move || {
                                    if let Some(player) = weak.upgrade() {
                                        player.poke();
                                    }
                                });
                            });
                            let subscription = toolkit.subscribe(node, name, notify);
                            let toolkit = toolkit.clone();
                            p.add_cleanup(move || toolkit.unsubscribe(subscription));
                        }
                    }
                    WaitStrategy::Armed(arm) => {
                        let timers = timers.clone();
                        let weak = weak.clone();
                        let notify: Rc<dyn Fn()> = Rc::new(move || {
                            let weak = weak.clone();
                            timers.defer(debounce, move || {
                                if let Some(player) = weak.upgrade() {
                                    player.poke();
                                }
                            });
                        });
                        let teardown = arm(toolkit.clone(), node, notify);
                        p.add_cleanup(teardown);
                    }
                }
            }

            let satisfied = is(&StateCx {
                dom: cx.dom,
                toolkit: cx.toolkit,
                node,
            });
            if satisfied {
                p.clear_waiting();
            } else {
                p.set_waiting_on("target", label.clone(), cx.dom.describe(node));
            }
            satisfied
        })
        .with_target(TargetSpec::Shared(self.inner.root.clone()));
        playable.availability = availability;
        playable.visibility = visibility;

        self.inner.driver.player().enqueue_known(self.apply_timeout(playable))
    }

    /// Enqueue a registered state by name. Unknown names are programmer
    /// errors and panic.
    pub(crate) fn enqueue_state(&self, name: &str, args: StateArgs) -> PlayableHandle {
        let Some(descriptor) = self.inner.driver.states().lookup(self.inner.class, name) else {
            panic!(
                "no state {name:?} registered for widget class {}",
                self.inner.class
            );
        };

        let is = descriptor.is.clone();
        self.enqueue_wait_state(WaitState {
            label: descriptor.name.to_owned(),
            is: Rc::new(move |cx| is(cx, &args)),
            wait: descriptor.wait.clone(),
            availability: descriptor.availability.unwrap_or_default(),
            visibility: descriptor.visibility.unwrap_or(VisibilityPolicy::Ignore),
        })
    }

    /// Build the subject handed to inspection callbacks.
    fn subject(&self) -> Result<Subject, Error> {
        let element = self.element().ok_or_else(|| {
            Error::Callback("inspection ran before the handle's element resolved".to_owned())
        })?;
        let value = match &self.inner.value_source {
            ValueSource::Element => Value::Null,
            ValueSource::Component => self.inner.driver.toolkit_rc().value(element.node()),
            ValueSource::Record(binding) => binding
                .record
                .borrow()
                .as_ref()
                .map_or(Value::Null, |record| record.value.clone()),
        };
        Ok(Subject { element, value })
    }

    /// Enqueue a synchronous inspection callback.
    pub(crate) fn enqueue_inspect(&self, f: impl Fn(&Subject) + 'static) -> PlayableHandle {
        let this = self.clone();
        let playable = Playable::callback(move || {
            let subject = this.subject()?;
            f(&subject);
            Ok(())
        });
        self.inner.driver.player().enqueue_known(self.apply_timeout(playable))
    }

    /// Enqueue an asynchronous inspection callback completing through its
    /// [`Done`].
    pub(crate) fn enqueue_inspect_done(
        &self,
        f: impl Fn(&Subject, Done) + 'static,
    ) -> PlayableHandle {
        let this = self.clone();
        let mut playable = Playable::callback_done(move |done| {
            let subject = this.subject()?;
            f(&subject, done);
            Ok(())
        });
        playable.timeout = self.inner.and_timeout.get();
        self.inner.driver.player().enqueue_known(self.apply_timeout(playable))
    }

    /// Enqueue a pure delay.
    pub(crate) fn enqueue_delay(&self, ms: u64) -> PlayableHandle {
        self.inner
            .driver
            .player()
            .enqueue_known(Playable::wait_ms(ms))
    }

    /// Enqueue a polled wait predicate, labelled with the most recent
    /// diagnostic label.
    pub(crate) fn enqueue_wait_until(&self, f: impl Fn() -> bool + 'static) -> PlayableHandle {
        let label = self.take_wait_label().unwrap_or_else(|| "condition".to_owned());
        let playable = Playable::predicate(move |_cx, p| {
            if f() {
                p.clear_waiting();
                true
            } else {
                p.set_waiting(label.clone(), "satisfied");
                false
            }
        });
        self.inner.driver.player().enqueue_known(self.apply_timeout(playable))
    }

    /// Create a relationally navigated handle rooted at this one.
    pub(crate) fn relational(&self, expr: &str, direction: Direction) -> Handle {
        let locator = TargetSpec::scoped(expr, self.inner.root.clone(), direction);
        Handle::bind_root(
            &self.inner.driver,
            WidgetClass::Element,
            locator,
            self.inner.timeout.get(),
            ValueSource::Element,
        )
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("class", &self.inner.class)
            .field("root", &self.inner.root.borrow().id)
            .field("timeout", &self.inner.timeout.get())
            .finish_non_exhaustive()
    }
}

/// The chainable surface shared by every handle type.
///
/// Methods enqueue playables and return a clone of the handle so chains
/// read in source order; nothing blocks.
pub trait Fluent: Sized + Clone {
    /// The shared handle core.
    fn handle(&self) -> &Handle;

    /// Set the readiness timeout for subsequent playables in this chain.
    fn timeout(&self, ms: u64) -> Self {
        self.handle().set_timeout(ms);
        self.clone()
    }

    /// Click the element.
    fn click(&self) -> Self {
        self.handle()
            .enqueue_action(EventType::Click, EventPayload::default());
        self.clone()
    }

    /// Tap the element: expands to pointerdown, pointerup, click, and a
    /// gesture-completion wait.
    fn tap(&self) -> Self {
        self.handle()
            .enqueue_action(EventType::Tap, EventPayload::default());
        self.clone()
    }

    /// Tap at page coordinates.
    fn tap_at(&self, x: f64, y: f64) -> Self {
        let payload = EventPayload {
            x: Some(x),
            y: Some(y),
            ..EventPayload::default()
        };
        self.handle().enqueue_action(EventType::Tap, payload);
        self.clone()
    }

    /// Double-click the element.
    fn double_click(&self) -> Self {
        self.handle()
            .enqueue_action(EventType::DoubleClick, EventPayload::default());
        self.clone()
    }

    /// Open the context menu on the element.
    fn context_menu(&self) -> Self {
        self.handle()
            .enqueue_action(EventType::ContextMenu, EventPayload::default());
        self.clone()
    }

    /// Focus the element.
    fn focus(&self) -> Self {
        self.handle()
            .enqueue_action(EventType::Focus, EventPayload::default());
        self.clone()
    }

    /// Blur the element.
    fn blur(&self) -> Self {
        self.handle()
            .enqueue_action(EventType::Blur, EventPayload::default());
        self.clone()
    }

    /// Press and release a single key.
    fn press_key(&self, key: &str) -> Self {
        let payload = EventPayload {
            key: Some(key.to_owned()),
            ..EventPayload::default()
        };
        self.handle().enqueue_action(EventType::Type, payload);
        self.clone()
    }

    /// Type text: expands to a keydown/keyup pair per character.
    fn type_text(&self, text: &str) -> Self {
        let payload = EventPayload {
            text: Some(text.to_owned()),
            ..EventPayload::default()
        };
        self.handle().enqueue_action(EventType::Type, payload);
        self.clone()
    }

    /// Type text with the caret placed first.
    fn type_text_at(&self, text: &str, caret: usize) -> Self {
        let payload = EventPayload {
            text: Some(text.to_owned()),
            caret: Some(caret),
            ..EventPayload::default()
        };
        self.handle().enqueue_action(EventType::Type, payload);
        self.clone()
    }

    /// Wait for a registered state by name.
    fn state(&self, name: &str) -> Self {
        self.handle().enqueue_state(name, StateArgs::none());
        self.clone()
    }

    /// Wait for a registered state with arguments.
    fn state_with(&self, name: &str, args: StateArgs) -> Self {
        self.handle().enqueue_state(name, args);
        self.clone()
    }

    /// Wait for the element to render.
    fn visible(&self) -> Self {
        self.state("visible")
    }

    /// Wait for the element to stop rendering.
    fn hidden(&self) -> Self {
        self.state("hidden")
    }

    /// Wait for the element to leave the document.
    fn destroyed(&self) -> Self {
        self.state("destroyed")
    }

    /// Inspect the resolved value synchronously.
    fn and(&self, f: impl Fn(&Subject) + 'static) -> Self {
        self.handle().enqueue_inspect(f);
        self.clone()
    }

    /// Inspect asynchronously; the callback must invoke its [`Done`].
    fn and_done(&self, f: impl Fn(&Subject, Done) + 'static) -> Self {
        self.handle().enqueue_inspect_done(f);
        self.clone()
    }

    /// Set the timeout for subsequent asynchronous inspections.
    fn and_timeout(&self, ms: u64) -> Self {
        self.handle().set_and_timeout(ms);
        self.clone()
    }

    /// Insert a pure delay into the chain.
    fn wait_ms(&self, ms: u64) -> Self {
        self.handle().enqueue_delay(ms);
        self.clone()
    }

    /// Set the diagnostic label for the next [`Fluent::wait_until`].
    fn label(&self, label: &str) -> Self {
        self.handle().set_wait_label(label);
        self.clone()
    }

    /// Insert a polled wait; the chain proceeds once `f` returns true.
    fn wait_until(&self, f: impl Fn() -> bool + 'static) -> Self {
        self.handle().enqueue_wait_until(f);
        self.clone()
    }

    /// A new handle for a descendant of this element.
    fn down(&self, expr: &str) -> crate::controls::ElementHandle {
        crate::controls::ElementHandle::from_handle(self.handle().relational(expr, Direction::Down))
    }

    /// A new handle for an ancestor of this element.
    fn up(&self, expr: &str) -> crate::controls::ElementHandle {
        crate::controls::ElementHandle::from_handle(self.handle().relational(expr, Direction::Up))
    }

    /// A new handle for a direct child of this element.
    fn child(&self, expr: &str) -> crate::controls::ElementHandle {
        crate::controls::ElementHandle::from_handle(self.handle().relational(expr, Direction::Child))
    }
}
