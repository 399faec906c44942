//! Browser-side UI test automation driver core.
//!
//! Given symbolic descriptions of widgets and user intentions, the engine
//! synthesises low-level input events against a live document and suspends
//! a surrounding test until asynchronous UI preconditions hold. It is built
//! from three coupled subsystems:
//!
//! - **Playable queue and [`Player`]** — an ordered, cooperatively
//!   scheduled queue of playables (injected events, callbacks, delays,
//!   polled predicates) with readiness gating, per-item timeouts, and
//!   tap/type expansion into lower-level primitives.
//! - **Fluent handle layer** — builders over symbolic locators that enqueue
//!   playables, a registry of parameterised wait-states and actions, and
//!   collection/item/row/cell handles with a selection mixin.
//! - **[`Block`] / [`WatchDog`] harness** — wraps a user test body,
//!   interleaves with the player's queue drain, and reports pass or fail
//!   through an abstract [`Reporter`].
//!
//! The engine owns no document. The page under test is reached through
//! collaborator traits ([`Dom`], [`Toolkit`], [`Injector`], probes), and
//! all waiting is deterministic: suspension points are timer callbacks on a
//! [`Timers`] queue, never host sleeps. The [`testing`] module ships
//! hermetic doubles for every contract.
//!
//! ```no_run
//! use std::rc::Rc;
//! use stagehand::{Driver, Fluent, Selectable, Address};
//! # use stagehand::testing::{MockDom, MockToolkit};
//!
//! # let (dom, toolkit) = (Rc::new(MockDom::new()), Rc::new(MockToolkit::new()));
//! let ui = Driver::builder(dom, toolkit).build();
//!
//! ui.button("#save").tap().visible();
//! ui.grid("#orders")
//!     .select(Address::keys([1i64, 3]))
//!     .selected(Address::keys([1i64, 3]))
//!     .row(3i64)
//!     .reveal()
//!     .cell("total")
//!     .and(|cell| assert!(cell.value.is_number()));
//! ```

pub mod block;
pub mod config;
pub mod controls;
pub mod dom;
pub mod driver;
pub mod error;
pub mod handle;
pub mod host;
pub mod item;
pub mod list;
pub mod locator;
pub mod playable;
pub mod player;
pub mod report;
pub mod states;
pub mod testing;
pub mod timer;
pub mod toolkit;

pub use block::{Block, Done, Outcome, TestBody, WatchDog};
pub use config::DriverConfig;
pub use controls::{ButtonHandle, ComponentHandle, ContainerHandle, ElementHandle, FieldHandle};
pub use dom::{Direction, Dom, Element, NodeId};
pub use driver::{Driver, DriverBuilder};
pub use error::{Error, Result};
pub use handle::{Fluent, Handle, StateArgs, Subject, WidgetClass};
pub use host::{AnimationProbe, GestureProbe, Injector, PointerFeedback};
pub use item::{CellHandle, ColumnLocator, ItemHandle, RecordLocator, RowHandle};
pub use list::{Address, GridHandle, ListHandle, Selectable};
pub use locator::TargetSpec;
pub use playable::{
    Availability, EventPayload, EventType, PlayKind, PlayState, Playable, PlayableHandle,
    PlayableId, VisibilityPolicy,
};
pub use player::{Player, WeakPlayer};
pub use report::{Expectation, Reporter, Runner, TestResult};
pub use timer::{Clock, ManualClock, Timers, WallClock};
pub use toolkit::{Column, Record, RecordKey, Toolkit, ToolkitVariant, WidgetFlag};
