//! Collection handles and the selection mixin.
//!
//! List-like widgets share one `select`/`deselect` verb family with four
//! addressing modes (keys, indexes/ranges, property query, all) and a
//! matching `selected`/`deselected` wait-state family using the same modes.

use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::error::Error;
use crate::handle::{Fluent, Handle, WaitState, WaitStrategy};
use crate::item::{ItemHandle, RecordLocator, RowHandle};
use crate::playable::{Availability, Playable, VisibilityPolicy};
use crate::toolkit::{Record, RecordKey};

/// How a selection verb names its records.
#[derive(Debug, Clone, PartialEq)]
pub enum Address {
    /// By store identity, one or many.
    Keys(Vec<RecordKey>),
    /// By position, one or many.
    Indexes(Vec<usize>),
    /// By inclusive positional range; an omitted end means through the
    /// last available record.
    Range { start: usize, end: Option<usize> },
    /// By a simple property/value query over record fields.
    Where { property: String, value: Value },
    /// Every record.
    All,
}

impl Address {
    /// Address records by store identity.
    #[must_use]
    pub fn keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<RecordKey>,
    {
        Self::Keys(keys.into_iter().map(Into::into).collect())
    }

    /// Address a single record by position.
    #[must_use]
    pub fn index(index: usize) -> Self {
        Self::Indexes(vec![index])
    }

    /// Address several records by position.
    #[must_use]
    pub fn indexes(indexes: impl IntoIterator<Item = usize>) -> Self {
        Self::Indexes(indexes.into_iter().collect())
    }

    /// Address an inclusive positional range.
    #[must_use]
    pub const fn range(start: usize, end: usize) -> Self {
        Self::Range {
            start,
            end: Some(end),
        }
    }

    /// Address every record from `start` through the last.
    #[must_use]
    pub const fn through_end(start: usize) -> Self {
        Self::Range { start, end: None }
    }

    /// Address records whose `property` field equals `value`.
    #[must_use]
    pub fn query(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Where {
            property: property.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keys(keys) => {
                let keys: Vec<String> = keys.iter().map(ToString::to_string).collect();
                write!(f, "keys [{}]", keys.join(", "))
            }
            Self::Indexes(indexes) => write!(f, "indexes {indexes:?}"),
            Self::Range { start, end } => match end {
                Some(end) => write!(f, "range {start}..={end}"),
                None => write!(f, "range {start}.."),
            },
            Self::Where { property, value } => write!(f, "{property} = {value}"),
            Self::All => f.write_str("all"),
        }
    }
}

/// Whether a wait-state validates selection or deselection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectMode {
    Select,
    Deselect,
}

/// Resolve an address against the collection's records.
///
/// Returns `None` on a requested-count mismatch (fewer resolved records
/// than requested keys or indexes), which short-circuits validation to
/// false before any element comparison.
pub(crate) fn resolve_records(records: &[Record], address: &Address) -> Option<Vec<Record>> {
    match address {
        Address::Keys(keys) => {
            let resolved: Vec<Record> = keys
                .iter()
                .filter_map(|key| records.iter().find(|r| &r.key == key).cloned())
                .collect();
            (resolved.len() == keys.len()).then_some(resolved)
        }
        Address::Indexes(indexes) => {
            let resolved: Vec<Record> = indexes
                .iter()
                .filter_map(|&index| records.iter().find(|r| r.index == index).cloned())
                .collect();
            (resolved.len() == indexes.len()).then_some(resolved)
        }
        Address::Range { start, end } => {
            if records.is_empty() {
                return None;
            }
            let last = records.iter().map(|r| r.index).max().unwrap_or(0);
            let end = end.unwrap_or(last);
            if *start > end || end > last {
                return None;
            }
            let resolved: Vec<Record> = records
                .iter()
                .filter(|r| r.index >= *start && r.index <= end)
                .cloned()
                .collect();
            (resolved.len() == end - start + 1).then_some(resolved)
        }
        Address::Where { property, value } => Some(
            records
                .iter()
                .filter(|r| r.field(property) == Some(value))
                .cloned()
                .collect(),
        ),
        Address::All => Some(records.to_vec()),
    }
}

/// Compare the current selection set against the requested record set.
///
/// Select mode requires every requested record selected and the counts to
/// match; deselect mode requires none of the requested records selected.
pub(crate) fn selection_satisfied(
    mode: SelectMode,
    requested: &[Record],
    selected: &[RecordKey],
) -> bool {
    match mode {
        SelectMode::Select => {
            requested.len() == selected.len()
                && requested.iter().all(|r| selected.contains(&r.key))
        }
        SelectMode::Deselect => requested.iter().all(|r| !selected.contains(&r.key)),
    }
}

/// The selection verb and wait-state family shared by list-like handles.
pub trait Selectable: Fluent {
    /// Select the addressed records through the widget API.
    fn select(&self, address: Address) -> Self {
        self.enqueue_selection(address, SelectMode::Select);
        self.clone()
    }

    /// Deselect the addressed records through the widget API.
    fn deselect(&self, address: Address) -> Self {
        self.enqueue_selection(address, SelectMode::Deselect);
        self.clone()
    }

    /// Wait until exactly the addressed records are selected.
    fn selected(&self, address: Address) -> Self {
        self.enqueue_selection_state(address, SelectMode::Select);
        self.clone()
    }

    /// Wait until none of the addressed records is selected.
    fn deselected(&self, address: Address) -> Self {
        self.enqueue_selection_state(address, SelectMode::Deselect);
        self.clone()
    }

    #[doc(hidden)]
    fn enqueue_selection(&self, address: Address, mode: SelectMode) {
        let root = self.handle().root().clone();
        let toolkit = self.handle().driver().toolkit_rc();
        let playable = Playable::callback(move || {
            let element = root.borrow().resolved_target.clone().ok_or_else(|| {
                Error::Callback("selection ran before the collection resolved".to_owned())
            })?;
            let node = element.node();
            let records = toolkit.records(node);
            let requested = resolve_records(&records, &address).ok_or_else(|| {
                Error::Callback(format!(
                    "selection by {address} did not match the collection's records"
                ))
            })?;
            let keys: Vec<RecordKey> = requested.iter().map(|r| r.key.clone()).collect();
            match mode {
                SelectMode::Select => toolkit.select(node, &keys),
                SelectMode::Deselect => toolkit.deselect(node, &keys),
            }
            Ok(())
        });
        self.handle().driver().player().enqueue_known(playable);
    }

    #[doc(hidden)]
    fn enqueue_selection_state(&self, address: Address, mode: SelectMode) {
        let label = match mode {
            SelectMode::Select => format!("selected ({address})"),
            SelectMode::Deselect => format!("deselected ({address})"),
        };
        self.handle().enqueue_wait_state(WaitState {
            label,
            is: Rc::new(move |cx| {
                let records = cx.toolkit.records(cx.node);
                let Some(requested) = resolve_records(&records, &address) else {
                    return false;
                };
                let selected = cx.toolkit.selected_keys(cx.node);
                selection_satisfied(mode, &requested, &selected)
            }),
            wait: WaitStrategy::Events(&["selectionchange"]),
            availability: Availability::Attached,
            visibility: VisibilityPolicy::Ignore,
        });
    }
}

/// Handle to a list-like collection widget.
#[derive(Debug, Clone)]
pub struct ListHandle {
    handle: Handle,
}

impl ListHandle {
    pub(crate) fn from_handle(handle: Handle) -> Self {
        Self { handle }
    }

    /// Handle to one item of the collection.
    #[must_use]
    pub fn item(&self, locator: impl Into<RecordLocator>) -> ItemHandle {
        ItemHandle::bind(self, locator.into())
    }
}

impl Fluent for ListHandle {
    fn handle(&self) -> &Handle {
        &self.handle
    }
}

impl Selectable for ListHandle {}

/// Handle to a tabular collection widget.
#[derive(Debug, Clone)]
pub struct GridHandle {
    handle: Handle,
}

impl GridHandle {
    pub(crate) fn from_handle(handle: Handle) -> Self {
        Self { handle }
    }

    /// Handle to one row of the grid.
    #[must_use]
    pub fn row(&self, locator: impl Into<RecordLocator>) -> RowHandle {
        RowHandle::bind(self, locator.into())
    }
}

impl Fluent for GridHandle {
    fn handle(&self) -> &Handle {
        &self.handle
    }
}

impl Selectable for GridHandle {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records() -> Vec<Record> {
        (0..4)
            .map(|i| Record {
                key: RecordKey::from(i as i64 + 1),
                index: i,
                value: json!({"name": format!("row-{}", i + 1), "group": i % 2}),
            })
            .collect()
    }

    #[test]
    fn keys_resolve_in_request_order() {
        let records = records();
        let resolved =
            resolve_records(&records, &Address::keys([3i64, 1])).unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].key, RecordKey::from(3i64));
        assert_eq!(resolved[1].key, RecordKey::from(1i64));
    }

    #[test]
    fn missing_key_short_circuits() {
        let records = records();
        assert!(resolve_records(&records, &Address::keys([1i64, 99])).is_none());
    }

    #[test]
    fn missing_index_short_circuits() {
        let records = records();
        assert!(resolve_records(&records, &Address::indexes([0, 9])).is_none());
    }

    #[test]
    fn range_endpoints_are_inclusive() {
        let records = records();
        let resolved = resolve_records(&records, &Address::range(1, 2)).unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].index, 1);
        assert_eq!(resolved[1].index, 2);
    }

    #[test]
    fn omitted_range_end_runs_through_last() {
        let records = records();
        let resolved = resolve_records(&records, &Address::through_end(2)).unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[1].index, 3);
    }

    #[test]
    fn out_of_bounds_range_short_circuits() {
        let records = records();
        assert!(resolve_records(&records, &Address::range(2, 9)).is_none());
        assert!(resolve_records(&records, &Address::through_end(0)).is_some());
        assert!(resolve_records(&[], &Address::through_end(0)).is_none());
    }

    #[test]
    fn query_matches_by_field() {
        let records = records();
        let resolved =
            resolve_records(&records, &Address::query("group", 0)).unwrap();
        assert_eq!(resolved.len(), 2);
        assert!(resolved.iter().all(|r| r.field("group") == Some(&json!(0))));
    }

    #[test]
    fn select_validator_requires_exact_set() {
        let records = records();
        let requested = resolve_records(&records, &Address::keys([1i64, 3])).unwrap();

        let exact = vec![RecordKey::from(1i64), RecordKey::from(3i64)];
        assert!(selection_satisfied(SelectMode::Select, &requested, &exact));

        let superset = vec![
            RecordKey::from(1i64),
            RecordKey::from(2i64),
            RecordKey::from(3i64),
        ];
        assert!(!selection_satisfied(SelectMode::Select, &requested, &superset));

        let partial = vec![RecordKey::from(1i64)];
        assert!(!selection_satisfied(SelectMode::Select, &requested, &partial));
    }

    #[test]
    fn deselect_validator_requires_disjoint_set() {
        let records = records();
        let requested = resolve_records(&records, &Address::keys([2i64])).unwrap();

        assert!(selection_satisfied(
            SelectMode::Deselect,
            &requested,
            &[RecordKey::from(1i64), RecordKey::from(3i64)],
        ));
        assert!(!selection_satisfied(
            SelectMode::Deselect,
            &requested,
            &[RecordKey::from(2i64)],
        ));
    }
}
