//! Symbolic target specifications and their resolution rules.
//!
//! A playable's target is symbolic until the moment of use: a query
//! expression, a concrete node, a resolver function, a back-reference to an
//! earlier queue position, or a share of another playable's resolved
//! element. Back-references are rewritten into [`TargetSpec::Shared`] at
//! enqueue time so they survive queue head removals.

use std::fmt;
use std::rc::Rc;

use crate::dom::{Direction, Dom, NodeId};
use crate::playable::PlayableHandle;

/// Scope for a relative query: resolve against the element cached by
/// another playable, searching in the given direction.
#[derive(Clone)]
pub struct Scope {
    /// Playable whose resolved element roots the search.
    pub root: PlayableHandle,
    /// Search direction from the root.
    pub direction: Direction,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("root", &self.root.borrow().id)
            .field("direction", &self.direction)
            .finish()
    }
}

/// How a playable names the element it acts on.
#[derive(Clone)]
pub enum TargetSpec {
    /// Query expression in the host system's dialect, optionally scoped.
    Selector {
        expr: String,
        scope: Option<Scope>,
    },
    /// A concrete node, wrapped unchanged.
    Node(NodeId),
    /// Invoked on each readiness tick; `None` means not ready yet.
    Resolver(Rc<dyn Fn(&dyn Dom) -> Option<NodeId>>),
    /// N positions earlier in the queue at enqueue time. Only valid while
    /// enqueueing; the player rewrites it into [`TargetSpec::Shared`].
    BackRef(usize),
    /// Share the resolved element of another playable.
    Shared(PlayableHandle),
}

impl TargetSpec {
    /// Unscoped query expression.
    #[must_use]
    pub fn selector(expr: impl Into<String>) -> Self {
        Self::Selector {
            expr: expr.into(),
            scope: None,
        }
    }

    /// Query expression scoped to another playable's resolved element.
    #[must_use]
    pub fn scoped(expr: impl Into<String>, root: PlayableHandle, direction: Direction) -> Self {
        Self::Selector {
            expr: expr.into(),
            scope: Some(Scope { root, direction }),
        }
    }

    /// Resolver function evaluated on each readiness tick.
    #[must_use]
    pub fn resolver(f: impl Fn(&dyn Dom) -> Option<NodeId> + 'static) -> Self {
        Self::Resolver(Rc::new(f))
    }

    /// Short description of the spec for diagnostics, following shared
    /// references back to the originating locator.
    #[must_use]
    pub fn describe(&self, dom: &dyn Dom) -> String {
        match self {
            Self::Selector { expr, .. } => expr.clone(),
            Self::Node(node) => dom.describe(*node),
            Self::Resolver(_) => "<resolver>".to_owned(),
            Self::BackRef(offset) => format!("<back-reference {offset}>"),
            Self::Shared(upstream) => {
                let upstream = upstream.borrow();
                if let Some(element) = &upstream.resolved_target {
                    dom.describe(element.node())
                } else if let Some(spec) = &upstream.target {
                    spec.describe(dom)
                } else {
                    format!("<{}>", upstream.id)
                }
            }
        }
    }

    /// Resolve the spec to a node right now. Shared specs read the
    /// upstream playable's cache; a miss anywhere yields `None`.
    #[must_use]
    pub fn resolve(&self, dom: &dyn Dom) -> Option<NodeId> {
        match self {
            Self::Selector { expr, scope } => {
                let (root, direction) = match scope {
                    Some(scope) => {
                        let upstream = scope.root.borrow();
                        let element = upstream.resolved_target.as_ref()?;
                        (Some(element.node()), scope.direction)
                    }
                    None => (None, Direction::Down),
                };
                dom.find(expr, root, direction)
            }
            Self::Node(node) => Some(*node),
            Self::Resolver(f) => f(dom),
            Self::BackRef(_) => None,
            Self::Shared(upstream) => upstream
                .borrow()
                .resolved_target
                .as_ref()
                .map(crate::dom::Element::node),
        }
    }
}

impl fmt::Debug for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Selector { expr, scope } => f
                .debug_struct("Selector")
                .field("expr", expr)
                .field("scoped", &scope.is_some())
                .finish(),
            Self::Node(node) => write!(f, "Node({node})"),
            Self::Resolver(_) => f.write_str("Resolver"),
            Self::BackRef(offset) => write!(f, "BackRef({offset})"),
            Self::Shared(upstream) => write!(f, "Shared({})", upstream.borrow().id),
        }
    }
}
