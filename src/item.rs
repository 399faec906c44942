//! Item, row, and cell handles: members of a collection addressed by
//! record (and, for cells, column) locators.
//!
//! Their root playables resolve the owning collection first, search its
//! records, remember the match, and then obtain the rendering node through
//! the collection's node-lookup contract.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::dom::Element;
use crate::driver::Driver;
use crate::error::Error;
use crate::handle::{Fluent, Handle, ValueSource, WidgetClass};
use crate::list::{GridHandle, ListHandle};
use crate::playable::{Playable, PlayableHandle, ReadyCx};
use crate::toolkit::{Column, Record, RecordKey};

/// How an item or row names its record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordLocator {
    /// By position in the store.
    Index(usize),
    /// By store identity.
    Key(RecordKey),
    /// By a simple property/value query.
    Where { property: String, value: Value },
}

impl RecordLocator {
    /// Locate by a property/value query.
    #[must_use]
    pub fn query(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Where {
            property: property.into(),
            value: value.into(),
        }
    }

    fn matches<'a>(&self, records: &'a [Record]) -> Option<&'a Record> {
        match self {
            Self::Index(index) => records.iter().find(|r| r.index == *index),
            Self::Key(key) => records.iter().find(|r| &r.key == key),
            Self::Where { property, value } => {
                records.iter().find(|r| r.field(property) == Some(value))
            }
        }
    }
}

impl fmt::Display for RecordLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "index {index}"),
            Self::Key(key) => write!(f, "key {key}"),
            Self::Where { property, value } => write!(f, "{property} = {value}"),
        }
    }
}

impl From<usize> for RecordLocator {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<RecordKey> for RecordLocator {
    fn from(key: RecordKey) -> Self {
        Self::Key(key)
    }
}

impl From<i64> for RecordLocator {
    fn from(key: i64) -> Self {
        Self::Key(RecordKey::from(key))
    }
}

impl From<&str> for RecordLocator {
    fn from(key: &str) -> Self {
        Self::Key(RecordKey::from(key))
    }
}

/// How a cell names its column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnLocator {
    /// By ordinal position.
    Index(usize),
    /// By column id.
    Key(String),
    /// By a property/value query over column metadata.
    Where { property: String, value: Value },
}

impl ColumnLocator {
    /// Locate by a metadata property/value query.
    #[must_use]
    pub fn query(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Where {
            property: property.into(),
            value: value.into(),
        }
    }

    fn matches<'a>(&self, columns: &'a [Column]) -> Option<&'a Column> {
        match self {
            Self::Index(index) => columns.iter().find(|c| c.index == *index),
            Self::Key(key) => columns.iter().find(|c| &c.key == key),
            Self::Where { property, value } => {
                columns.iter().find(|c| c.meta.get(property) == Some(value))
            }
        }
    }
}

impl fmt::Display for ColumnLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "column {index}"),
            Self::Key(key) => write!(f, "column {key:?}"),
            Self::Where { property, value } => write!(f, "column {property} = {value}"),
        }
    }
}

impl From<usize> for ColumnLocator {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for ColumnLocator {
    fn from(key: &str) -> Self {
        Self::Key(key.to_owned())
    }
}

/// The record an item/row handle resolved to, shared with its playables.
#[derive(Debug, Default)]
pub(crate) struct RecordBinding {
    pub(crate) index: Cell<Option<usize>>,
    pub(crate) record: RefCell<Option<Record>>,
}

/// Root readiness shared by item and row handles: resolve the collection,
/// find the record, and obtain the rendering node.
fn member_ready(
    collection_root: &PlayableHandle,
    locator: &RecordLocator,
    binding: &Rc<RecordBinding>,
    cx: &ReadyCx<'_>,
    p: &mut Playable,
) -> bool {
    let Some(collection) = collection_root.borrow().resolved_target.clone() else {
        p.set_waiting("collection", "available");
        return false;
    };
    let collection_node = collection.node();

    let records = cx.toolkit.records(collection_node);
    let Some(record) = locator.matches(&records) else {
        p.set_waiting_on("record", "present", locator.to_string());
        return false;
    };
    binding.index.set(Some(record.index));
    *binding.record.borrow_mut() = Some(record.clone());

    let Some(node) = cx.toolkit.record_node(collection_node, record.index) else {
        p.set_waiting_on("item", "rendered", locator.to_string());
        return false;
    };

    match &p.resolved_target {
        Some(element) => element.rebind(node),
        None => p.resolved_target = Some(Element::new(node)),
    }

    if !cx.dom.is_attached(node) {
        p.set_waiting_on("item", "available", cx.dom.describe(node));
        return false;
    }

    p.clear_waiting();
    true
}

/// Enqueue a reveal: scroll the bound record into view and complete once
/// the collection's scroller settles.
fn enqueue_reveal(
    driver: &Driver,
    collection_root: &PlayableHandle,
    binding: &Rc<RecordBinding>,
) {
    let collection_root = collection_root.clone();
    let binding = binding.clone();
    let toolkit = driver.toolkit_rc();
    let playable = Playable::callback_done(move |done| {
        let collection = collection_root.borrow().resolved_target.clone().ok_or_else(|| {
            Error::Callback("reveal ran before the collection resolved".to_owned())
        })?;
        let index = binding.index.get().ok_or_else(|| {
            Error::Callback("reveal ran before the record resolved".to_owned())
        })?;
        toolkit.scroll_to(collection.node(), index, Box::new(move || done.ok()));
        Ok(())
    });
    driver.player().enqueue_known(playable);
}

/// Handle to one item of a list.
#[derive(Debug, Clone)]
pub struct ItemHandle {
    handle: Handle,
    binding: Rc<RecordBinding>,
    owner: ListHandle,
}

impl ItemHandle {
    pub(crate) fn bind(owner: &ListHandle, locator: RecordLocator) -> Self {
        let driver = owner.handle().driver().clone();
        let binding = Rc::new(RecordBinding::default());
        let collection_root = owner.handle().root().clone();

        let ready_binding = binding.clone();
        let root = Playable::predicate(move |cx, p| {
            member_ready(&collection_root, &locator, &ready_binding, cx, p)
        });
        let root = driver.player().enqueue_known(root);

        let handle = Handle::from_root(
            &driver,
            WidgetClass::Item,
            root,
            None,
            ValueSource::Record(binding.clone()),
        );
        Self {
            handle,
            binding,
            owner: owner.clone(),
        }
    }

    /// Return to the owning list so a chain can continue on it.
    #[must_use]
    pub fn list(&self) -> ListHandle {
        self.owner.clone()
    }

    /// Scroll the item into view; completes when the scroller settles.
    pub fn reveal(&self) -> Self {
        enqueue_reveal(self.handle.driver(), self.owner.handle().root(), &self.binding);
        self.clone()
    }

    /// Wait until the item's record is selected.
    pub fn selected(&self) -> Self {
        self.state("selected")
    }

    /// Wait until the item's record is deselected.
    pub fn deselected(&self) -> Self {
        self.state("deselected")
    }

    /// The record index resolved by the root playable, once known.
    #[must_use]
    pub fn record_index(&self) -> Option<usize> {
        self.binding.index.get()
    }
}

impl Fluent for ItemHandle {
    fn handle(&self) -> &Handle {
        &self.handle
    }
}

/// Handle to one row of a grid.
#[derive(Debug, Clone)]
pub struct RowHandle {
    handle: Handle,
    binding: Rc<RecordBinding>,
    owner: GridHandle,
}

impl RowHandle {
    pub(crate) fn bind(owner: &GridHandle, locator: RecordLocator) -> Self {
        let driver = owner.handle().driver().clone();
        let binding = Rc::new(RecordBinding::default());
        let collection_root = owner.handle().root().clone();

        let ready_binding = binding.clone();
        let root = Playable::predicate(move |cx, p| {
            member_ready(&collection_root, &locator, &ready_binding, cx, p)
        });
        let root = driver.player().enqueue_known(root);

        let handle = Handle::from_root(
            &driver,
            WidgetClass::Row,
            root,
            None,
            ValueSource::Record(binding.clone()),
        );
        Self {
            handle,
            binding,
            owner: owner.clone(),
        }
    }

    /// Return to the owning grid.
    #[must_use]
    pub fn grid(&self) -> GridHandle {
        self.owner.clone()
    }

    /// Handle to one cell of this row.
    #[must_use]
    pub fn cell(&self, locator: impl Into<ColumnLocator>) -> CellHandle {
        CellHandle::bind(self, locator.into())
    }

    /// Scroll the row into view; completes when the scroller settles.
    pub fn reveal(&self) -> Self {
        enqueue_reveal(self.handle.driver(), self.owner.handle().root(), &self.binding);
        self.clone()
    }

    pub fn selected(&self) -> Self {
        self.state("selected")
    }

    pub fn deselected(&self) -> Self {
        self.state("deselected")
    }

    /// The record index resolved by the root playable, once known.
    #[must_use]
    pub fn record_index(&self) -> Option<usize> {
        self.binding.index.get()
    }
}

impl Fluent for RowHandle {
    fn handle(&self) -> &Handle {
        &self.handle
    }
}

/// Handle to one cell of a grid row.
#[derive(Debug, Clone)]
pub struct CellHandle {
    handle: Handle,
    owner: RowHandle,
}

impl CellHandle {
    pub(crate) fn bind(owner: &RowHandle, locator: ColumnLocator) -> Self {
        let driver = owner.handle().driver().clone();
        let collection_root = owner.grid().handle().root().clone();
        let row_binding = owner.binding.clone();

        let root = Playable::predicate(move |cx, p| {
            let Some(collection) = collection_root.borrow().resolved_target.clone() else {
                p.set_waiting("collection", "available");
                return false;
            };
            let collection_node = collection.node();

            let Some(record_index) = row_binding.index.get() else {
                p.set_waiting("row", "resolved");
                return false;
            };

            let columns = cx.toolkit.columns(collection_node);
            let Some(column) = locator.matches(&columns) else {
                p.set_waiting_on("column", "present", locator.to_string());
                return false;
            };

            let Some(node) = cx.toolkit.cell_node(collection_node, record_index, column.index)
            else {
                p.set_waiting_on("cell", "rendered", locator.to_string());
                return false;
            };

            match &p.resolved_target {
                Some(element) => element.rebind(node),
                None => p.resolved_target = Some(Element::new(node)),
            }

            if !cx.dom.is_attached(node) {
                p.set_waiting_on("cell", "available", cx.dom.describe(node));
                return false;
            }

            p.clear_waiting();
            true
        });
        let root = driver.player().enqueue_known(root);

        let handle = Handle::from_root(
            &driver,
            WidgetClass::Cell,
            root,
            None,
            ValueSource::Record(owner.binding.clone()),
        );
        Self {
            handle,
            owner: owner.clone(),
        }
    }

    /// Return to the owning row.
    #[must_use]
    pub fn row(&self) -> RowHandle {
        self.owner.clone()
    }

    pub fn selected(&self) -> Self {
        self.state("selected")
    }
}

impl Fluent for CellHandle {
    fn handle(&self) -> &Handle {
        &self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records() -> Vec<Record> {
        vec![
            Record {
                key: RecordKey::from("a"),
                index: 0,
                value: json!({"name": "alpha"}),
            },
            Record {
                key: RecordKey::from("b"),
                index: 1,
                value: json!({"name": "beta"}),
            },
        ]
    }

    #[test]
    fn record_locator_modes() {
        let records = records();
        assert_eq!(
            RecordLocator::from(1usize).matches(&records).unwrap().key,
            RecordKey::from("b")
        );
        assert_eq!(
            RecordLocator::from("a").matches(&records).unwrap().index,
            0
        );
        assert_eq!(
            RecordLocator::query("name", "beta")
                .matches(&records)
                .unwrap()
                .index,
            1
        );
        assert!(RecordLocator::query("name", "gamma").matches(&records).is_none());
    }

    #[test]
    fn column_locator_modes() {
        let columns = vec![
            Column {
                key: "name".to_owned(),
                index: 0,
                meta: json!({"title": "Name"}),
            },
            Column {
                key: "age".to_owned(),
                index: 1,
                meta: json!({"title": "Age"}),
            },
        ];

        assert_eq!(ColumnLocator::from(1usize).matches(&columns).unwrap().key, "age");
        assert_eq!(ColumnLocator::from("name").matches(&columns).unwrap().index, 0);
        assert_eq!(
            ColumnLocator::query("title", "Age")
                .matches(&columns)
                .unwrap()
                .index,
            1
        );
    }
}
