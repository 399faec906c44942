//! Hermetic collaborator doubles and a deterministic test rig.
//!
//! The engine's contracts are all traits, so the whole scheduler can run
//! against an in-memory document, a scripted widget library, a capturing
//! injector, and a manually advanced clock. Integration tests advance
//! virtual time to the next timer deadline instead of sleeping.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::Value;

use crate::config::DriverConfig;
use crate::dom::{Direction, Dom, NodeId};
use crate::driver::Driver;
use crate::host::{AnimationProbe, GestureProbe, Injector};
use crate::playable::{EventPayload, EventType};
use crate::timer::{Clock, ManualClock, Timers};
use crate::toolkit::{
    Column, Record, RecordKey, SubscriptionId, Toolkit, ToolkitVariant, WidgetFlag,
};

// ---- document double ---------------------------------------------------

#[derive(Debug, Clone)]
struct MockNode {
    tag: String,
    css_id: Option<String>,
    classes: Vec<String>,
    text: String,
    attrs: BTreeMap<String, String>,
    parent: Option<NodeId>,
    attached: bool,
    visible: bool,
}

#[derive(Debug, Default)]
struct MockDomInner {
    nodes: BTreeMap<NodeId, MockNode>,
    next_id: u64,
}

/// In-memory document implementing the [`Dom`] contract.
///
/// Queries understand three expression shapes: `#id`, `.class`, and a bare
/// tag name. Detached nodes are not findable.
#[derive(Debug, Default)]
pub struct MockDom {
    inner: RefCell<MockDomInner>,
}

impl MockDom {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a root-level node, attached and visible.
    pub fn add_node(&self, tag: &str, css_id: Option<&str>) -> NodeId {
        self.insert(tag, css_id, None)
    }

    /// Add a child node, attached and visible.
    pub fn add_child(&self, parent: NodeId, tag: &str, css_id: Option<&str>) -> NodeId {
        self.insert(tag, css_id, Some(parent))
    }

    fn insert(&self, tag: &str, css_id: Option<&str>, parent: Option<NodeId>) -> NodeId {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = NodeId(inner.next_id);
        inner.nodes.insert(
            id,
            MockNode {
                tag: tag.to_owned(),
                css_id: css_id.map(str::to_owned),
                classes: Vec::new(),
                text: String::new(),
                attrs: BTreeMap::new(),
                parent,
                attached: true,
                visible: true,
            },
        );
        id
    }

    pub fn set_visible(&self, node: NodeId, visible: bool) {
        if let Some(n) = self.inner.borrow_mut().nodes.get_mut(&node) {
            n.visible = visible;
        }
    }

    pub fn set_attached(&self, node: NodeId, attached: bool) {
        if let Some(n) = self.inner.borrow_mut().nodes.get_mut(&node) {
            n.attached = attached;
        }
    }

    pub fn set_text(&self, node: NodeId, text: &str) {
        if let Some(n) = self.inner.borrow_mut().nodes.get_mut(&node) {
            n.text = text.to_owned();
        }
    }

    pub fn add_class(&self, node: NodeId, class: &str) {
        if let Some(n) = self.inner.borrow_mut().nodes.get_mut(&node) {
            n.classes.push(class.to_owned());
        }
    }

    pub fn set_attr(&self, node: NodeId, name: &str, value: &str) {
        if let Some(n) = self.inner.borrow_mut().nodes.get_mut(&node) {
            n.attrs.insert(name.to_owned(), value.to_owned());
        }
    }

    /// Remove a node entirely, as if replaced; queries stop resolving it.
    pub fn remove(&self, node: NodeId) {
        self.inner.borrow_mut().nodes.remove(&node);
    }

    fn matches(node: &MockNode, expr: &str) -> bool {
        if let Some(id) = expr.strip_prefix('#') {
            node.css_id.as_deref() == Some(id)
        } else if let Some(class) = expr.strip_prefix('.') {
            node.classes.iter().any(|c| c == class)
        } else {
            node.tag == expr
        }
    }

    fn is_descendant(inner: &MockDomInner, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = inner.nodes.get(&node).and_then(|n| n.parent);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = inner.nodes.get(&parent).and_then(|n| n.parent);
        }
        false
    }
}

impl Dom for MockDom {
    fn find(&self, expr: &str, root: Option<NodeId>, direction: Direction) -> Option<NodeId> {
        let inner = self.inner.borrow();
        inner
            .nodes
            .iter()
            .filter(|(_, node)| node.attached && Self::matches(node, expr))
            .filter(|(id, node)| match (root, direction) {
                (None, _) => true,
                (Some(root), Direction::Down) => Self::is_descendant(&inner, **id, root),
                (Some(root), Direction::Up) => Self::is_descendant(&inner, root, **id),
                (Some(root), Direction::Child) => node.parent == Some(root),
            })
            .map(|(id, _)| *id)
            .next()
    }

    fn is_attached(&self, node: NodeId) -> bool {
        self.inner
            .borrow()
            .nodes
            .get(&node)
            .is_some_and(|n| n.attached)
    }

    fn is_visible(&self, node: NodeId) -> bool {
        self.inner
            .borrow()
            .nodes
            .get(&node)
            .is_some_and(|n| n.visible)
    }

    fn text(&self, node: NodeId) -> String {
        self.inner
            .borrow()
            .nodes
            .get(&node)
            .map(|n| n.text.clone())
            .unwrap_or_default()
    }

    fn contains(&self, ancestor: NodeId, descendant: NodeId) -> bool {
        Self::is_descendant(&self.inner.borrow(), descendant, ancestor)
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.inner
            .borrow()
            .nodes
            .get(&node)
            .is_some_and(|n| n.classes.iter().any(|c| c == class))
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<String> {
        self.inner
            .borrow()
            .nodes
            .get(&node)
            .and_then(|n| n.attrs.get(name).cloned())
    }

    fn describe(&self, node: NodeId) -> String {
        let inner = self.inner.borrow();
        match inner.nodes.get(&node) {
            Some(n) => match &n.css_id {
                Some(id) => format!("#{id}"),
                None => format!("<{}>", n.tag),
            },
            None => format!("{node}"),
        }
    }
}

// ---- toolkit double ----------------------------------------------------

#[derive(Default)]
struct MockToolkitInner {
    variant: ToolkitVariant,
    flags: BTreeMap<(NodeId, u8), bool>,
    values: BTreeMap<NodeId, Value>,
    subscriptions: BTreeMap<u64, (NodeId, String, Rc<dyn Fn()>)>,
    next_subscription: u64,
    records: BTreeMap<NodeId, Vec<Record>>,
    selected: BTreeMap<NodeId, Vec<RecordKey>>,
    record_nodes: BTreeMap<(NodeId, usize), NodeId>,
    columns: BTreeMap<NodeId, Vec<Column>>,
    cell_nodes: BTreeMap<(NodeId, usize, usize), NodeId>,
    async_scroll: bool,
    pending_scrolls: Vec<Box<dyn FnOnce()>>,
    scroll_log: Vec<(NodeId, usize)>,
}

const fn flag_tag(flag: WidgetFlag) -> u8 {
    match flag {
        WidgetFlag::Checked => 0,
        WidgetFlag::Expanded => 1,
        WidgetFlag::Selected => 2,
        WidgetFlag::Destroyed => 3,
        WidgetFlag::ViewReady => 4,
        WidgetFlag::Disabled => 5,
    }
}

/// Scripted widget library implementing the [`Toolkit`] contract.
///
/// Selection mutations update record-node `Selected` flags and fire
/// `selectionchange`, mirroring what a real collection widget does.
#[derive(Default)]
pub struct MockToolkit {
    inner: RefCell<MockToolkitInner>,
}

impl MockToolkit {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_variant(&self, variant: ToolkitVariant) {
        self.inner.borrow_mut().variant = variant;
    }

    pub fn set_flag(&self, node: NodeId, flag: WidgetFlag, value: bool) {
        self.inner.borrow_mut().flags.insert((node, flag_tag(flag)), value);
    }

    pub fn seed_value(&self, node: NodeId, value: Value) {
        self.inner.borrow_mut().values.insert(node, value);
    }

    /// Seed a collection's records; indexes follow iteration order.
    pub fn seed_records<I, K>(&self, collection: NodeId, rows: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<RecordKey>,
    {
        let records = rows
            .into_iter()
            .enumerate()
            .map(|(index, (key, value))| Record {
                key: key.into(),
                index,
                value,
            })
            .collect();
        self.inner.borrow_mut().records.insert(collection, records);
    }

    pub fn seed_columns(&self, collection: NodeId, columns: Vec<Column>) {
        self.inner.borrow_mut().columns.insert(collection, columns);
    }

    pub fn set_record_node(&self, collection: NodeId, record_index: usize, node: NodeId) {
        self.inner
            .borrow_mut()
            .record_nodes
            .insert((collection, record_index), node);
    }

    pub fn set_cell_node(
        &self,
        collection: NodeId,
        record_index: usize,
        column_index: usize,
        node: NodeId,
    ) {
        self.inner
            .borrow_mut()
            .cell_nodes
            .insert((collection, record_index, column_index), node);
    }

    /// Make `scroll_to` complete only when [`MockToolkit::flush_scrolls`]
    /// runs.
    pub fn set_async_scroll(&self, enabled: bool) {
        self.inner.borrow_mut().async_scroll = enabled;
    }

    /// Complete every pending asynchronous scroll.
    pub fn flush_scrolls(&self) -> usize {
        let pending: Vec<_> = self.inner.borrow_mut().pending_scrolls.drain(..).collect();
        let count = pending.len();
        for done in pending {
            done();
        }
        count
    }

    /// Scrolls requested so far, in order.
    #[must_use]
    pub fn scroll_log(&self) -> Vec<(NodeId, usize)> {
        self.inner.borrow().scroll_log.clone()
    }

    /// Fire a widget event, invoking matching subscriptions.
    pub fn fire(&self, node: NodeId, event: &str) {
        let callbacks: Vec<Rc<dyn Fn()>> = self
            .inner
            .borrow()
            .subscriptions
            .values()
            .filter(|(n, e, _)| *n == node && e == event)
            .map(|(_, _, cb)| cb.clone())
            .collect();
        for callback in callbacks {
            callback();
        }
    }

    /// Number of live subscriptions, for teardown assertions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.inner.borrow().subscriptions.len()
    }

    fn record_node_for_key(inner: &MockToolkitInner, collection: NodeId, key: &RecordKey) -> Option<NodeId> {
        let records = inner.records.get(&collection)?;
        let record = records.iter().find(|r| &r.key == key)?;
        inner.record_nodes.get(&(collection, record.index)).copied()
    }

    fn apply_selection(&self, collection: NodeId, keys: &[RecordKey], select: bool) {
        {
            let mut inner = self.inner.borrow_mut();
            let current = inner.selected.entry(collection).or_default();
            if select {
                for key in keys {
                    if !current.contains(key) {
                        current.push(key.clone());
                    }
                }
            } else {
                current.retain(|key| !keys.contains(key));
            }

            let nodes: Vec<NodeId> = keys
                .iter()
                .filter_map(|key| Self::record_node_for_key(&inner, collection, key))
                .collect();
            for node in nodes {
                inner.flags.insert((node, flag_tag(WidgetFlag::Selected)), select);
            }
        }
        self.fire(collection, "selectionchange");
    }
}

impl Toolkit for MockToolkit {
    fn variant(&self) -> ToolkitVariant {
        self.inner.borrow().variant
    }

    fn flag(&self, node: NodeId, flag: WidgetFlag) -> bool {
        self.inner
            .borrow()
            .flags
            .get(&(node, flag_tag(flag)))
            .copied()
            .unwrap_or(false)
    }

    fn value(&self, node: NodeId) -> Value {
        self.inner
            .borrow()
            .values
            .get(&node)
            .cloned()
            .unwrap_or(Value::Null)
    }

    fn set_value(&self, node: NodeId, value: Value) {
        self.inner.borrow_mut().values.insert(node, value);
        self.fire(node, "change");
        self.fire(node, "input");
    }

    fn subscribe(&self, node: NodeId, event: &str, callback: Rc<dyn Fn()>) -> SubscriptionId {
        let mut inner = self.inner.borrow_mut();
        inner.next_subscription += 1;
        let id = inner.next_subscription;
        inner
            .subscriptions
            .insert(id, (node, event.to_owned(), callback));
        SubscriptionId(id)
    }

    fn unsubscribe(&self, subscription: SubscriptionId) {
        self.inner.borrow_mut().subscriptions.remove(&subscription.0);
    }

    fn records(&self, collection: NodeId) -> Vec<Record> {
        self.inner
            .borrow()
            .records
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    fn selected_keys(&self, collection: NodeId) -> Vec<RecordKey> {
        self.inner
            .borrow()
            .selected
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    fn select(&self, collection: NodeId, keys: &[RecordKey]) {
        self.apply_selection(collection, keys, true);
    }

    fn deselect(&self, collection: NodeId, keys: &[RecordKey]) {
        self.apply_selection(collection, keys, false);
    }

    fn record_node(&self, collection: NodeId, record_index: usize) -> Option<NodeId> {
        self.inner
            .borrow()
            .record_nodes
            .get(&(collection, record_index))
            .copied()
    }

    fn columns(&self, collection: NodeId) -> Vec<Column> {
        self.inner
            .borrow()
            .columns
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    fn cell_node(
        &self,
        collection: NodeId,
        record_index: usize,
        column_index: usize,
    ) -> Option<NodeId> {
        self.inner
            .borrow()
            .cell_nodes
            .get(&(collection, record_index, column_index))
            .copied()
    }

    fn scroll_to(&self, collection: NodeId, record_index: usize, done: Box<dyn FnOnce()>) {
        let settle_now = {
            let mut inner = self.inner.borrow_mut();
            inner.scroll_log.push((collection, record_index));
            if inner.async_scroll {
                inner.pending_scrolls.push(done);
                None
            } else {
                Some(done)
            }
        };
        // Collections without an asynchronous scroller settle inline.
        if let Some(done) = settle_now {
            done();
        }
    }
}

// ---- injector double ---------------------------------------------------

/// One event the injector received.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedEvent {
    pub event: EventType,
    pub payload: EventPayload,
    pub target: NodeId,
    pub related: Option<NodeId>,
}

/// Injector that records every dispatch instead of touching a DOM.
#[derive(Debug, Default)]
pub struct CapturingInjector {
    events: RefCell<Vec<CapturedEvent>>,
}

impl CapturingInjector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Event names in dispatch order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.events.borrow().iter().map(|e| e.event.name()).collect()
    }

    /// Everything captured so far.
    #[must_use]
    pub fn captured(&self) -> Vec<CapturedEvent> {
        self.events.borrow().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl Injector for CapturingInjector {
    fn inject(
        &self,
        event: EventType,
        payload: &EventPayload,
        target: NodeId,
        related: Option<NodeId>,
    ) {
        self.events.borrow_mut().push(CapturedEvent {
            event,
            payload: payload.clone(),
            target,
            related,
        });
    }
}

// ---- probe doubles -----------------------------------------------------

/// Animation probe with a switchable answer.
#[derive(Debug, Default)]
pub struct AnimationSwitch {
    active: Cell<bool>,
}

impl AnimationSwitch {
    pub fn set_active(&self, active: bool) {
        self.active.set(active);
    }
}

impl AnimationProbe for AnimationSwitch {
    fn any_active(&self) -> bool {
        self.active.get()
    }
}

/// Gesture probe that reports completion after a fixed number of checks.
#[derive(Debug, Default)]
pub struct CountdownGesture {
    remaining: Cell<u32>,
    activations: Cell<u32>,
    deactivations: Cell<u32>,
}

impl CountdownGesture {
    #[must_use]
    pub fn new(checks_until_complete: u32) -> Self {
        Self {
            remaining: Cell::new(checks_until_complete),
            activations: Cell::new(0),
            deactivations: Cell::new(0),
        }
    }

    #[must_use]
    pub fn activations(&self) -> u32 {
        self.activations.get()
    }

    #[must_use]
    pub fn deactivations(&self) -> u32 {
        self.deactivations.get()
    }
}

impl GestureProbe for CountdownGesture {
    fn activate(&self) {
        self.activations.set(self.activations.get() + 1);
    }

    fn deactivate(&self) {
        self.deactivations.set(self.deactivations.get() + 1);
    }

    fn complete(&self, _target: NodeId, _gesture: &str) -> bool {
        let remaining = self.remaining.get();
        if remaining == 0 {
            true
        } else {
            self.remaining.set(remaining - 1);
            false
        }
    }
}

// ---- rig ---------------------------------------------------------------

/// Drive the timer queue until idle or until the virtual-time budget runs
/// out, advancing the clock to each next deadline.
pub fn pump(timers: &Timers, clock: &ManualClock, budget_ms: u64) {
    let deadline = clock.now_ms().saturating_add(budget_ms);
    loop {
        timers.run_due();
        match timers.next_deadline() {
            None => break,
            Some(next) if next > deadline => break,
            Some(next) => clock.set(next),
        }
    }
}

/// A fully wired deterministic driver over the collaborator doubles.
pub struct Rig {
    pub clock: Rc<ManualClock>,
    pub dom: Rc<MockDom>,
    pub toolkit: Rc<MockToolkit>,
    pub injector: Rc<CapturingInjector>,
    pub driver: Driver,
}

impl Rig {
    /// A rig with instant delays and tight polling.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DriverConfig::immediate())
    }

    #[must_use]
    pub fn with_config(config: DriverConfig) -> Self {
        let clock = Rc::new(ManualClock::new(0));
        let dom = Rc::new(MockDom::new());
        let toolkit = Rc::new(MockToolkit::new());
        let injector = Rc::new(CapturingInjector::new());
        let driver = Driver::builder(dom.clone(), toolkit.clone())
            .injector(injector.clone())
            .clock(clock.clone())
            .config(config)
            .build();
        Self {
            clock,
            dom,
            toolkit,
            injector,
            driver,
        }
    }

    /// Pump the driver's timers for up to `budget_ms` of virtual time.
    pub fn pump(&self, budget_ms: u64) {
        pump(self.driver.timers(), &self.clock, budget_ms);
    }
}

impl Default for Rig {
    fn default() -> Self {
        Self::new()
    }
}
