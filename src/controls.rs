//! Handles for single widgets: plain elements, generic components, buttons,
//! fields, and expandable containers.

use serde_json::Value;

use crate::error::Error;
use crate::handle::{Fluent, Handle, StateArgs};
use crate::playable::Playable;

/// Handle to a plain DOM element.
#[derive(Debug, Clone)]
pub struct ElementHandle {
    handle: Handle,
}

impl ElementHandle {
    pub(crate) fn from_handle(handle: Handle) -> Self {
        Self { handle }
    }
}

impl Fluent for ElementHandle {
    fn handle(&self) -> &Handle {
        &self.handle
    }
}

/// Handle to a generic widget-library component.
#[derive(Debug, Clone)]
pub struct ComponentHandle {
    handle: Handle,
}

impl ComponentHandle {
    pub(crate) fn from_handle(handle: Handle) -> Self {
        Self { handle }
    }

    /// Wait for the component's view to finish rendering.
    pub fn view_ready(&self) -> Self {
        self.state("view_ready")
    }

    /// Wait for the component to accept interaction.
    pub fn enabled(&self) -> Self {
        self.state("enabled")
    }

    /// Wait for the component to reject interaction.
    pub fn disabled(&self) -> Self {
        self.state("disabled")
    }
}

impl Fluent for ComponentHandle {
    fn handle(&self) -> &Handle {
        &self.handle
    }
}

/// Handle to a button component.
#[derive(Debug, Clone)]
pub struct ButtonHandle {
    handle: Handle,
}

impl ButtonHandle {
    pub(crate) fn from_handle(handle: Handle) -> Self {
        Self { handle }
    }

    /// Press the button (a tap).
    pub fn press(&self) -> Self {
        self.tap()
    }

    pub fn enabled(&self) -> Self {
        self.state("enabled")
    }

    pub fn disabled(&self) -> Self {
        self.state("disabled")
    }
}

impl Fluent for ButtonHandle {
    fn handle(&self) -> &Handle {
        &self.handle
    }
}

/// Handle to an input field component.
#[derive(Debug, Clone)]
pub struct FieldHandle {
    handle: Handle,
}

impl FieldHandle {
    pub(crate) fn from_handle(handle: Handle) -> Self {
        Self { handle }
    }

    /// Write a value through the widget API rather than key events.
    pub fn set_value(&self, value: impl Into<Value>) -> Self {
        let value = value.into();
        let root = self.handle.root().clone();
        let toolkit = self.handle.driver().toolkit_rc();
        let playable = Playable::callback(move || {
            let element = root.borrow().resolved_target.clone().ok_or_else(|| {
                Error::Callback("set_value ran before the field resolved".to_owned())
            })?;
            toolkit.set_value(element.node(), value.clone());
            Ok(())
        });
        self.handle.driver().player().enqueue_known(playable);
        self.clone()
    }

    /// Wait until the field value contains the given text.
    pub fn value_like(&self, needle: &str) -> Self {
        self.state_with("value_like", StateArgs::one(needle))
    }

    pub fn checked(&self) -> Self {
        self.state("checked")
    }

    pub fn unchecked(&self) -> Self {
        self.state("unchecked")
    }
}

impl Fluent for FieldHandle {
    fn handle(&self) -> &Handle {
        &self.handle
    }
}

/// Handle to an expandable container (panel, fieldset, tree node).
#[derive(Debug, Clone)]
pub struct ContainerHandle {
    handle: Handle,
}

impl ContainerHandle {
    pub(crate) fn from_handle(handle: Handle) -> Self {
        Self { handle }
    }

    pub fn expanded(&self) -> Self {
        self.state("expanded")
    }

    pub fn collapsed(&self) -> Self {
        self.state("collapsed")
    }
}

impl Fluent for ContainerHandle {
    fn handle(&self) -> &Handle {
        &self.handle
    }
}
