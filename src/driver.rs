//! The driver context object: collaborators, configuration, the player,
//! and the handle factories.
//!
//! Everything the fluent layer needs travels through an injected [`Driver`]
//! instance; there are no process globals.

use std::fmt;
use std::rc::Rc;

use crate::block::Block;
use crate::config::DriverConfig;
use crate::controls::{ButtonHandle, ComponentHandle, ContainerHandle, ElementHandle, FieldHandle};
use crate::dom::{Dom, NodeId};
use crate::error::Result;
use crate::handle::{Handle, StateRegistry, ValueSource, WidgetClass};
use crate::host::{
    AnimationProbe, GestureProbe, Injector, NoAnimations, NoPointerFeedback, NullInjector,
    PointerFeedback,
};
use crate::list::{GridHandle, ListHandle};
use crate::locator::TargetSpec;
use crate::playable::{Playable, PlayableHandle};
use crate::player::{Player, PlayerCtx};
use crate::states::builtin_registry;
use crate::timer::{Clock, Timers, WallClock};
use crate::toolkit::Toolkit;

/// Assembles a [`Driver`] from its collaborators.
///
/// The DOM and toolkit contracts are mandatory; every other collaborator
/// defaults to a no-op implementation.
pub struct DriverBuilder {
    dom: Rc<dyn Dom>,
    toolkit: Rc<dyn Toolkit>,
    injector: Rc<dyn Injector>,
    animations: Rc<dyn AnimationProbe>,
    pointer: Rc<dyn PointerFeedback>,
    gesture: Option<Rc<dyn GestureProbe>>,
    clock: Rc<dyn Clock>,
    config: DriverConfig,
}

impl DriverBuilder {
    #[must_use]
    pub fn new(dom: Rc<dyn Dom>, toolkit: Rc<dyn Toolkit>) -> Self {
        Self {
            dom,
            toolkit,
            injector: Rc::new(NullInjector),
            animations: Rc::new(NoAnimations),
            pointer: Rc::new(NoPointerFeedback),
            gesture: None,
            clock: Rc::new(WallClock::new()),
            config: DriverConfig::default(),
        }
    }

    #[must_use]
    pub fn injector(mut self, injector: Rc<dyn Injector>) -> Self {
        self.injector = injector;
        self
    }

    #[must_use]
    pub fn animations(mut self, animations: Rc<dyn AnimationProbe>) -> Self {
        self.animations = animations;
        self
    }

    #[must_use]
    pub fn pointer(mut self, pointer: Rc<dyn PointerFeedback>) -> Self {
        self.pointer = pointer;
        self
    }

    #[must_use]
    pub fn gesture(mut self, gesture: Rc<dyn GestureProbe>) -> Self {
        self.gesture = Some(gesture);
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn build(self) -> Driver {
        let timers = Timers::new(self.clock);
        let states = Rc::new(builtin_registry(self.config.variant));
        let player = Player::new(PlayerCtx {
            timers: timers.clone(),
            dom: self.dom.clone(),
            toolkit: self.toolkit.clone(),
            injector: self.injector,
            animations: self.animations,
            pointer: self.pointer,
            gesture: self.gesture,
            config: self.config.clone(),
        });
        tracing::debug!(
            event = "driver.build",
            variant = %self.config.variant,
            "Driver assembled"
        );
        Driver {
            inner: Rc::new(DriverInner {
                player,
                timers,
                dom: self.dom,
                toolkit: self.toolkit,
                config: self.config,
                states,
            }),
        }
    }
}

struct DriverInner {
    player: Player,
    timers: Timers,
    dom: Rc<dyn Dom>,
    toolkit: Rc<dyn Toolkit>,
    config: DriverConfig,
    states: Rc<StateRegistry>,
}

/// Shared context handed to every fluent handle. Cheap to clone.
#[derive(Clone)]
pub struct Driver {
    inner: Rc<DriverInner>,
}

impl Driver {
    /// Start assembling a driver.
    #[must_use]
    pub fn builder(dom: Rc<dyn Dom>, toolkit: Rc<dyn Toolkit>) -> DriverBuilder {
        DriverBuilder::new(dom, toolkit)
    }

    // ---- handle factories ----------------------------------------------

    fn bind(&self, class: WidgetClass, locator: TargetSpec, source: ValueSource) -> Handle {
        Handle::bind_root(self, class, locator, None, source)
    }

    /// Handle to the element matching a query expression.
    #[must_use]
    pub fn element(&self, expr: &str) -> ElementHandle {
        ElementHandle::from_handle(self.bind(
            WidgetClass::Element,
            TargetSpec::selector(expr),
            ValueSource::Element,
        ))
    }

    /// Handle to a concrete node.
    #[must_use]
    pub fn element_at(&self, node: NodeId) -> ElementHandle {
        ElementHandle::from_handle(self.bind(
            WidgetClass::Element,
            TargetSpec::Node(node),
            ValueSource::Element,
        ))
    }

    /// Handle resolved by a function evaluated on each readiness tick.
    #[must_use]
    pub fn element_by(
        &self,
        resolver: impl Fn(&dyn Dom) -> Option<NodeId> + 'static,
    ) -> ElementHandle {
        ElementHandle::from_handle(self.bind(
            WidgetClass::Element,
            TargetSpec::resolver(resolver),
            ValueSource::Element,
        ))
    }

    /// Handle to a generic component.
    #[must_use]
    pub fn component(&self, expr: &str) -> ComponentHandle {
        ComponentHandle::from_handle(self.bind(
            WidgetClass::Component,
            TargetSpec::selector(expr),
            ValueSource::Component,
        ))
    }

    /// Handle to a button.
    #[must_use]
    pub fn button(&self, expr: &str) -> ButtonHandle {
        ButtonHandle::from_handle(self.bind(
            WidgetClass::Button,
            TargetSpec::selector(expr),
            ValueSource::Component,
        ))
    }

    /// Handle to an input field.
    #[must_use]
    pub fn field(&self, expr: &str) -> FieldHandle {
        FieldHandle::from_handle(self.bind(
            WidgetClass::Field,
            TargetSpec::selector(expr),
            ValueSource::Component,
        ))
    }

    /// Handle to an expandable container.
    #[must_use]
    pub fn container(&self, expr: &str) -> ContainerHandle {
        ContainerHandle::from_handle(self.bind(
            WidgetClass::Container,
            TargetSpec::selector(expr),
            ValueSource::Component,
        ))
    }

    /// Handle to a list-like collection.
    #[must_use]
    pub fn list(&self, expr: &str) -> ListHandle {
        ListHandle::from_handle(self.bind(
            WidgetClass::List,
            TargetSpec::selector(expr),
            ValueSource::Component,
        ))
    }

    /// Handle to a tabular collection.
    #[must_use]
    pub fn grid(&self, expr: &str) -> GridHandle {
        GridHandle::from_handle(self.bind(
            WidgetClass::Grid,
            TargetSpec::selector(expr),
            ValueSource::Component,
        ))
    }

    // ---- direct scheduling ---------------------------------------------

    /// Enqueue one playable built by hand.
    pub fn play(&self, playable: Playable) -> Result<PlayableHandle> {
        self.inner.player.enqueue(playable)
    }

    /// Create a block wrapping one user test body.
    #[must_use]
    pub fn block(&self, timeout_ms: Option<u64>) -> Block {
        Block::new(self.inner.player.clone(), self.inner.timers.clone(), timeout_ms)
    }

    // ---- accessors -----------------------------------------------------

    #[must_use]
    pub fn player(&self) -> &Player {
        &self.inner.player
    }

    #[must_use]
    pub fn timers(&self) -> &Timers {
        &self.inner.timers
    }

    #[must_use]
    pub fn config(&self) -> &DriverConfig {
        &self.inner.config
    }

    pub(crate) fn dom_rc(&self) -> Rc<dyn Dom> {
        self.inner.dom.clone()
    }

    pub(crate) fn toolkit_rc(&self) -> Rc<dyn Toolkit> {
        self.inner.toolkit.clone()
    }

    pub(crate) fn states(&self) -> &StateRegistry {
        &self.inner.states
    }
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("player", &self.inner.player)
            .field("variant", &self.inner.config.variant)
            .finish_non_exhaustive()
    }
}
