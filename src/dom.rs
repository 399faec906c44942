//! DOM collaborator contract and the element wrapper.
//!
//! The engine never owns a document. Everything it knows about the page
//! flows through the [`Dom`] trait: query resolution, attachment,
//! visibility, text. Nodes are opaque [`NodeId`] handles minted by the
//! embedder.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Opaque handle to a node owned by the embedder's document.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

/// Search direction for scoped queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    /// Search descendants of the scope root.
    #[default]
    Down,
    /// Search ancestors of the scope root.
    Up,
    /// Search direct children of the scope root.
    Child,
}

/// Query and inspection surface over the embedder's document.
pub trait Dom {
    /// Resolve a query expression to a node, optionally scoped.
    fn find(&self, expr: &str, root: Option<NodeId>, direction: Direction) -> Option<NodeId>;

    /// Whether the node is currently part of the document.
    fn is_attached(&self, node: NodeId) -> bool;

    /// Whether the node currently renders.
    fn is_visible(&self, node: NodeId) -> bool;

    /// Text content of the node.
    fn text(&self, node: NodeId) -> String;

    /// Whether `ancestor` contains `descendant`.
    fn contains(&self, ancestor: NodeId, descendant: NodeId) -> bool;

    /// Whether the node carries the given class.
    fn has_class(&self, node: NodeId, class: &str) -> bool;

    /// Attribute value, if present.
    fn attr(&self, node: NodeId, name: &str) -> Option<String>;

    /// Short human identifier for diagnostics: an id selector when the node
    /// has one, the tag name otherwise.
    fn describe(&self, node: NodeId) -> String;
}

/// Wrapper around a resolved node.
///
/// The backing pointer is shared and mutable: when a query re-resolves to a
/// replacement node, [`Element::rebind`] swaps the pointer in place and
/// every clone of the wrapper (chained handles, downstream playables)
/// observes the new node. A swap is an ordinary event, not a failure.
#[derive(Clone)]
pub struct Element {
    node: Rc<Cell<NodeId>>,
}

impl Element {
    /// Wrap a node.
    #[must_use]
    pub fn new(node: NodeId) -> Self {
        Self {
            node: Rc::new(Cell::new(node)),
        }
    }

    /// The node currently backing this wrapper.
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node.get()
    }

    /// Swap the backing node in place, preserving wrapper identity.
    pub fn rebind(&self, node: NodeId) {
        let old = self.node.replace(node);
        if old != node {
            tracing::debug!(
                event = "element.rebind",
                %old,
                new = %node,
                "Element rebound to replacement node"
            );
        }
    }

    /// Whether two wrappers share the same backing pointer.
    #[must_use]
    pub fn shares_binding(&self, other: &Element) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Element({})", self.node.get())
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.node.get() == other.node.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebind_is_visible_through_clones() {
        let element = Element::new(NodeId(1));
        let alias = element.clone();

        element.rebind(NodeId(2));
        assert_eq!(alias.node(), NodeId(2));
        assert!(alias.shares_binding(&element));
    }

    #[test]
    fn fresh_wrappers_do_not_share_binding() {
        let a = Element::new(NodeId(1));
        let b = Element::new(NodeId(1));
        assert_eq!(a, b);
        assert!(!a.shares_binding(&b));
    }
}
