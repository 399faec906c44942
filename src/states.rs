//! Built-in wait-states, registered per widget class.
//!
//! The base table covers both toolkit variants; a variant pass then patches
//! the entries whose event surface differs. The registry is assembled once
//! when the driver is built, never per chain.

use std::rc::Rc;

use crate::handle::{StateArgs, StateCx, StateDescriptor, StateRegistry, WaitStrategy, WidgetClass};
use crate::playable::{Availability, VisibilityPolicy};
use crate::toolkit::{ToolkitVariant, WidgetFlag};

const ALL_CLASSES: &[WidgetClass] = &[
    WidgetClass::Element,
    WidgetClass::Component,
    WidgetClass::Button,
    WidgetClass::Field,
    WidgetClass::Container,
    WidgetClass::List,
    WidgetClass::Grid,
    WidgetClass::Item,
    WidgetClass::Row,
    WidgetClass::Cell,
];

const COMPONENT_CLASSES: &[WidgetClass] = &[
    WidgetClass::Component,
    WidgetClass::Button,
    WidgetClass::Field,
    WidgetClass::Container,
    WidgetClass::List,
    WidgetClass::Grid,
];

fn flag_is(flag: WidgetFlag) -> Rc<dyn Fn(&StateCx<'_>, &StateArgs) -> bool> {
    Rc::new(move |cx, _args| cx.toolkit.flag(cx.node, flag))
}

fn flag_is_not(flag: WidgetFlag) -> Rc<dyn Fn(&StateCx<'_>, &StateArgs) -> bool> {
    Rc::new(move |cx, _args| !cx.toolkit.flag(cx.node, flag))
}

fn always() -> Rc<dyn Fn(&StateCx<'_>, &StateArgs) -> bool> {
    Rc::new(|_cx, _args| true)
}

/// Substring match of the component value against the first argument.
fn value_like(cx: &StateCx<'_>, args: &StateArgs) -> bool {
    let Some(needle) = args.first_str() else {
        return false;
    };
    let value = cx.toolkit.value(cx.node);
    let haystack = match value.as_str() {
        Some(s) => s.to_owned(),
        None => value.to_string(),
    };
    haystack.contains(needle)
}

/// Build the state table for the resolved toolkit variant.
#[must_use]
pub fn builtin_registry(variant: ToolkitVariant) -> StateRegistry {
    let mut registry = StateRegistry::new(variant);

    // Presence and rendering states hold for every class; the policies do
    // the checking, the predicate is trivial.
    registry.register(
        ALL_CLASSES,
        StateDescriptor {
            name: "visible",
            is: always(),
            wait: WaitStrategy::Poll,
            availability: Some(Availability::Attached),
            visibility: Some(VisibilityPolicy::Visible),
        },
    );
    registry.register(
        ALL_CLASSES,
        StateDescriptor {
            name: "hidden",
            is: always(),
            wait: WaitStrategy::Poll,
            availability: Some(Availability::Ignore),
            visibility: Some(VisibilityPolicy::Hidden),
        },
    );
    registry.register(
        ALL_CLASSES,
        StateDescriptor {
            name: "destroyed",
            is: always(),
            wait: WaitStrategy::Poll,
            availability: Some(Availability::Detached),
            visibility: Some(VisibilityPolicy::Ignore),
        },
    );

    registry.register(
        COMPONENT_CLASSES,
        StateDescriptor {
            name: "view_ready",
            is: flag_is(WidgetFlag::ViewReady),
            wait: WaitStrategy::Events(&["viewready"]),
            availability: None,
            visibility: None,
        },
    );
    registry.register(
        COMPONENT_CLASSES,
        StateDescriptor {
            name: "enabled",
            is: flag_is_not(WidgetFlag::Disabled),
            wait: WaitStrategy::Events(&["enable", "disable"]),
            availability: None,
            visibility: None,
        },
    );
    registry.register(
        COMPONENT_CLASSES,
        StateDescriptor {
            name: "disabled",
            is: flag_is(WidgetFlag::Disabled),
            wait: WaitStrategy::Events(&["enable", "disable"]),
            availability: None,
            visibility: None,
        },
    );

    registry.register(
        &[WidgetClass::Field],
        StateDescriptor {
            name: "checked",
            is: flag_is(WidgetFlag::Checked),
            wait: WaitStrategy::Events(&["check", "uncheck"]),
            availability: None,
            visibility: None,
        },
    );
    registry.register(
        &[WidgetClass::Field],
        StateDescriptor {
            name: "unchecked",
            is: flag_is_not(WidgetFlag::Checked),
            wait: WaitStrategy::Events(&["check", "uncheck"]),
            availability: None,
            visibility: None,
        },
    );
    registry.register(
        &[WidgetClass::Field],
        StateDescriptor {
            name: "value_like",
            is: Rc::new(value_like),
            wait: WaitStrategy::Events(&["change", "input"]),
            availability: None,
            visibility: None,
        },
    );

    registry.register(
        &[WidgetClass::Container],
        StateDescriptor {
            name: "expanded",
            is: flag_is(WidgetFlag::Expanded),
            wait: WaitStrategy::Events(&["expand", "collapse"]),
            availability: None,
            visibility: None,
        },
    );
    registry.register(
        &[WidgetClass::Container],
        StateDescriptor {
            name: "collapsed",
            is: flag_is_not(WidgetFlag::Expanded),
            wait: WaitStrategy::Events(&["expand", "collapse"]),
            availability: None,
            visibility: None,
        },
    );

    registry.register(
        &[WidgetClass::Item, WidgetClass::Row, WidgetClass::Cell],
        StateDescriptor {
            name: "selected",
            is: flag_is(WidgetFlag::Selected),
            wait: WaitStrategy::Events(&["selectionchange"]),
            availability: None,
            visibility: None,
        },
    );
    registry.register(
        &[WidgetClass::Item, WidgetClass::Row, WidgetClass::Cell],
        StateDescriptor {
            name: "deselected",
            is: flag_is_not(WidgetFlag::Selected),
            wait: WaitStrategy::Events(&["selectionchange"]),
            availability: None,
            visibility: None,
        },
    );

    patch_variant(&mut registry, variant);
    registry
}

/// Patch the base table with variant-specific implementations. Runs once,
/// before any chain executes.
fn patch_variant(registry: &mut StateRegistry, variant: ToolkitVariant) {
    match variant {
        ToolkitVariant::Classic => {}
        ToolkitVariant::Modern => {
            // The rewritten toolkit collapsed check/uncheck into a single
            // change event and renders views through an observer API.
            registry.register(
                &[WidgetClass::Field],
                StateDescriptor {
                    name: "checked",
                    is: flag_is(WidgetFlag::Checked),
                    wait: WaitStrategy::Events(&["change"]),
                    availability: None,
                    visibility: None,
                },
            );
            registry.register(
                &[WidgetClass::Field],
                StateDescriptor {
                    name: "unchecked",
                    is: flag_is_not(WidgetFlag::Checked),
                    wait: WaitStrategy::Events(&["change"]),
                    availability: None,
                    visibility: None,
                },
            );
            registry.register(
                &[WidgetClass::Field],
                StateDescriptor {
                    name: "value_like",
                    is: Rc::new(value_like),
                    wait: WaitStrategy::Events(&["input"]),
                    availability: None,
                    visibility: None,
                },
            );
            registry.register(
                COMPONENT_CLASSES,
                StateDescriptor {
                    name: "view_ready",
                    is: flag_is(WidgetFlag::ViewReady),
                    wait: WaitStrategy::Armed(Rc::new(|toolkit, node, notify| {
                        let subscription = toolkit.subscribe(node, "render", {
                            let notify = notify.clone();
                            Rc::new(move || notify())
                        });
                        Box::new(move || toolkit.unsubscribe(subscription))
                    })),
                    availability: None,
                    visibility: None,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_registry_covers_every_class_for_visible() {
        let registry = builtin_registry(ToolkitVariant::Classic);
        for class in ALL_CLASSES {
            assert!(
                registry.lookup(*class, "visible").is_some(),
                "visible missing for {class}"
            );
        }
    }

    #[test]
    fn field_states_are_field_only() {
        let registry = builtin_registry(ToolkitVariant::Classic);
        assert!(registry.lookup(WidgetClass::Field, "checked").is_some());
        assert!(registry.lookup(WidgetClass::Button, "checked").is_none());
    }

    #[test]
    fn modern_variant_patches_check_events() {
        let classic = builtin_registry(ToolkitVariant::Classic);
        let modern = builtin_registry(ToolkitVariant::Modern);

        let classic_checked = classic.lookup(WidgetClass::Field, "checked").unwrap();
        let modern_checked = modern.lookup(WidgetClass::Field, "checked").unwrap();

        match (&classic_checked.wait, &modern_checked.wait) {
            (WaitStrategy::Events(a), WaitStrategy::Events(b)) => {
                assert_eq!(a.to_vec(), vec!["check", "uncheck"]);
                assert_eq!(b.to_vec(), vec!["change"]);
            }
            other => unreachable!("expected event strategies, got {other:?}"),
        }
    }

    #[test]
    fn modern_view_ready_uses_custom_arming() {
        let registry = builtin_registry(ToolkitVariant::Modern);
        let descriptor = registry
            .lookup(WidgetClass::Component, "view_ready")
            .unwrap();
        assert!(matches!(descriptor.wait, WaitStrategy::Armed(_)));
    }
}
