//! Widget-library collaborator contract.
//!
//! Component semantics (checked/expanded flags, field values, collection
//! records, selection sets, scrollers, change events) belong to the widget
//! library under test. The engine reaches them through the [`Toolkit`]
//! trait so state descriptors and the selection mixin stay library-neutral.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dom::NodeId;

/// Major variant of the widget library, resolved once at startup.
///
/// State and action implementations may differ per variant; the state
/// registry is built for exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolkitVariant {
    /// The long-lived widget generation.
    #[default]
    Classic,
    /// The rewritten widget generation with a changed event surface.
    Modern,
}

impl fmt::Display for ToolkitVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classic => f.write_str("classic"),
            Self::Modern => f.write_str("modern"),
        }
    }
}

/// Boolean component states readable from the widget library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetFlag {
    Checked,
    Expanded,
    Selected,
    Destroyed,
    ViewReady,
    Disabled,
}

/// Identity of a record inside a collection widget.
///
/// Keys are whatever the collection's store uses: numbers, strings, or
/// structured values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(pub Value);

impl From<i64> for RecordKey {
    fn from(v: i64) -> Self {
        Self(Value::from(v))
    }
}

impl From<u64> for RecordKey {
    fn from(v: u64) -> Self {
        Self(Value::from(v))
    }
}

impl From<&str> for RecordKey {
    fn from(v: &str) -> Self {
        Self(Value::from(v))
    }
}

impl From<String> for RecordKey {
    fn from(v: String) -> Self {
        Self(Value::from(v))
    }
}

impl From<Value> for RecordKey {
    fn from(v: Value) -> Self {
        Self(v)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One record of a collection widget, as exposed by its store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Store identity.
    pub key: RecordKey,
    /// Position in the store at read time.
    pub index: usize,
    /// Field values.
    pub value: Value,
}

impl Record {
    /// Read a field off the record value.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.value.get(name)
    }
}

/// One column of a tabular widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column id.
    pub key: String,
    /// Position at read time.
    pub index: usize,
    /// Column metadata for property queries (header text, data field, ...).
    pub meta: Value,
}

/// Handle for tearing down a toolkit event subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Contract the engine consumes from the widget library.
pub trait Toolkit {
    /// The variant the page under test runs.
    fn variant(&self) -> ToolkitVariant;

    /// Read a boolean component state.
    fn flag(&self, node: NodeId, flag: WidgetFlag) -> bool;

    /// Current component value (field text, picker selection, ...).
    fn value(&self, node: NodeId) -> Value;

    /// Write a component value through the widget API.
    fn set_value(&self, node: NodeId, value: Value);

    /// Subscribe to a widget event; the callback fires on the scheduling
    /// thread. Returns a handle for [`Toolkit::unsubscribe`].
    fn subscribe(&self, node: NodeId, event: &str, callback: Rc<dyn Fn()>) -> SubscriptionId;

    /// Tear down a subscription.
    fn unsubscribe(&self, subscription: SubscriptionId);

    /// Records of a collection widget, in store order.
    fn records(&self, collection: NodeId) -> Vec<Record>;

    /// Keys of the currently selected records.
    fn selected_keys(&self, collection: NodeId) -> Vec<RecordKey>;

    /// Add the given records to the selection.
    fn select(&self, collection: NodeId, keys: &[RecordKey]);

    /// Remove the given records from the selection.
    fn deselect(&self, collection: NodeId, keys: &[RecordKey]);

    /// Node rendering the record at `record_index`, if materialized.
    fn record_node(&self, collection: NodeId, record_index: usize) -> Option<NodeId>;

    /// Columns of a tabular widget.
    fn columns(&self, collection: NodeId) -> Vec<Column>;

    /// Node rendering one cell, if materialized.
    fn cell_node(
        &self,
        collection: NodeId,
        record_index: usize,
        column_index: usize,
    ) -> Option<NodeId>;

    /// Scroll the record into view. `done` must be called when the
    /// collection's scroller settles; collections without an asynchronous
    /// scroller call it before returning.
    fn scroll_to(&self, collection: NodeId, record_index: usize, done: Box<dyn FnOnce()>);
}
