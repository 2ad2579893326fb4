//! Widget component registry
//!
//! Sub-views of the explorer (controllers, chart panes, geometry views)
//! register callbacks here. Dispatch preserves registration order, and
//! names are unique: a second registration under the same name is an
//! error and leaves the first untouched.

use crate::error::{Result, SysVisError};
use crate::widget::{Action, UiChannel};
use tracing::debug;

/// Invoked for every inbound action, in registration order
pub type MessageHandler = Box<dyn FnMut(&Action, &UiChannel) + Send>;

/// Invoked after each completed run
pub type ComputedCallback = Box<dyn FnMut(&UiChannel) + Send>;

/// Proof of registration; names the component it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentToken {
    name: String,
}

impl ComponentToken {
    pub fn name(&self) -> &str {
        &self.name
    }
}

struct ComponentEntry {
    name: String,
    on_message: Option<MessageHandler>,
    on_computed: Option<ComputedCallback>,
}

/// Ordered callback fan-out with duplicate-name detection
#[derive(Default)]
pub struct ComponentRegistry {
    entries: Vec<ComponentEntry>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component by unique name
    pub fn register(
        &mut self,
        name: impl Into<String>,
        on_message: Option<MessageHandler>,
        on_computed: Option<ComputedCallback>,
    ) -> Result<ComponentToken> {
        let name = name.into();
        if self.entries.iter().any(|e| e.name == name) {
            return Err(SysVisError::DuplicateComponent { name });
        }
        debug!("Registered widget component '{name}'");
        self.entries.push(ComponentEntry {
            name: name.clone(),
            on_message,
            on_computed,
        });
        Ok(ComponentToken { name })
    }

    /// Remove a component by its registration token
    pub fn unregister(&mut self, token: &ComponentToken) {
        self.entries.retain(|e| e.name != token.name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    /// Fan an inbound action out to every message handler
    pub fn dispatch(&mut self, action: &Action, ui: &UiChannel) {
        for entry in &mut self.entries {
            if let Some(handler) = &mut entry.on_message {
                handler(action, ui);
            }
        }
    }

    /// Notify every component that a run completed
    pub fn notify_computed(&mut self, ui: &UiChannel) {
        for entry in &mut self.entries {
            if let Some(callback) = &mut entry.on_computed {
                callback(ui);
            }
        }
    }
}
