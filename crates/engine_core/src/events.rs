//! Synchronous publish/subscribe event bus.
//!
//! The bus knows nothing about entities or components; it carries opaque
//! JSON payloads between listeners registered under an event name. Listeners
//! for one name run in subscription order.
//!
//! Dispatch is done by [`SystemContext::emit`](crate::SystemContext::emit),
//! which takes a [`EventBus::snapshot`] of the listeners before invoking any
//! of them. Subscriptions added or removed by a listener therefore only
//! affect later emits.

use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

use crate::context::SystemContext;

/// An event listener.
pub type Listener = Rc<dyn Fn(&mut SystemContext<'_>, &Value) -> anyhow::Result<()>>;

/// Event emitted by the engine when a system update fails.
pub const SYSTEM_FAILED: &str = "system.failed";

/// Identifies one subscription; returned by `on`, consumed by `off`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    event: String,
    id: u64,
}

impl SubscriptionHandle {
    /// The event name this subscription listens to.
    #[must_use]
    pub fn event(&self) -> &str {
        &self.event
    }
}

/// Listener storage keyed by event name.
#[derive(Default)]
pub struct EventBus {
    listeners: HashMap<String, Vec<(u64, Listener)>>,
    next_id: u64,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener for `event`.
    pub fn subscribe(&mut self, event: impl Into<String>, listener: Listener) -> SubscriptionHandle {
        let event = event.into();
        self.next_id += 1;
        let id = self.next_id;
        self.listeners
            .entry(event.clone())
            .or_default()
            .push((id, listener));
        SubscriptionHandle { event, id }
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, handle: &SubscriptionHandle) -> bool {
        let Some(listeners) = self.listeners.get_mut(&handle.event) else {
            return false;
        };
        let Some(pos) = listeners.iter().position(|(id, _)| *id == handle.id) else {
            return false;
        };
        listeners.remove(pos);
        if listeners.is_empty() {
            self.listeners.remove(&handle.event);
        }
        true
    }

    /// The listeners subscribed to `event` right now, in subscription order.
    #[must_use]
    pub fn snapshot(&self, event: &str) -> Vec<Listener> {
        self.listeners
            .get(event)
            .map(|listeners| listeners.iter().map(|(_, l)| Rc::clone(l)).collect())
            .unwrap_or_default()
    }

    /// Number of listeners subscribed to `event`.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.get(event).map_or(0, Vec::len)
    }

    /// Event names with at least one listener, sorted.
    #[must_use]
    pub fn events(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.listeners.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<&str, usize> = self
            .listeners
            .iter()
            .map(|(event, listeners)| (event.as_str(), listeners.len()))
            .collect();
        f.debug_struct("EventBus").field("listeners", &counts).finish()
    }
}
