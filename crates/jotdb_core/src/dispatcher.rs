//! Event dispatcher.

use crate::error::CoreResult;
use crate::keys::{listener_id_of, listener_key, listener_prefix};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::warn;
use uuid::Uuid;

/// A listener callback.
///
/// Receives the event payload, if any. Callbacks run synchronously on the
/// dispatching caller's stack; a callback that returns an error is logged
/// and ignored, and never aborts dispatch for the remaining listeners.
pub type Listener = Rc<dyn Fn(Option<&Value>) -> CoreResult<()>>;

/// A flat map from structured listener keys to callbacks.
///
/// Listener keys have the shape `"_Event:<b64url(event_name)>:<id>"`, so one
/// event's listeners all share a key prefix and the free-form event name
/// cannot collide with the `:` delimiter.
///
/// Dispatch iterates a snapshot of the matching listeners, so a callback may
/// register or remove listeners (including itself) without invalidating the
/// iteration. Ordering across listeners is unspecified.
#[derive(Default)]
pub struct EventDispatcher {
    listeners: RwLock<HashMap<String, Listener>>,
}

impl EventDispatcher {
    /// Creates an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback under an event name.
    ///
    /// A fresh UUID is minted when no listener id is given. Registering with
    /// an existing id overwrites that listener. Returns the listener id.
    pub fn set_listener(
        &self,
        event_name: &str,
        listener: Listener,
        listener_id: Option<String>,
    ) -> String {
        let id = listener_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let key = listener_key(event_name, &id);
        self.listeners.write().insert(key, listener);
        id
    }

    /// Registers a plain closure under an event name with a fresh id.
    pub fn on<F>(&self, event_name: &str, callback: F) -> String
    where
        F: Fn(Option<&Value>) -> CoreResult<()> + 'static,
    {
        self.set_listener(event_name, Rc::new(callback), None)
    }

    /// Removes every listener registered under a raw listener id (the value
    /// returned by [`EventDispatcher::set_listener`]). Returns how many were
    /// removed.
    pub fn remove_listener(&self, listener_id: &str) -> usize {
        let mut listeners = self.listeners.write();
        let keys: Vec<String> = listeners
            .keys()
            .filter(|k| listener_id_of(k) == Some(listener_id))
            .cloned()
            .collect();
        for key in &keys {
            listeners.remove(key);
        }
        keys.len()
    }

    /// Returns every callback registered under a raw listener id.
    #[must_use]
    pub fn get_event(&self, listener_id: &str) -> Vec<Listener> {
        self.listeners
            .read()
            .iter()
            .filter(|(k, _)| listener_id_of(k) == Some(listener_id))
            .map(|(_, cb)| Rc::clone(cb))
            .collect()
    }

    /// Returns every listener key, sorted. Callbacks are opaque.
    #[must_use]
    pub fn listeners(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.listeners.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Returns true if no listeners are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Invokes every listener whose key matches the event name.
    ///
    /// Each callback receives the payload. A failing callback is logged and
    /// skipped; the rest still run.
    pub fn dispatch(&self, event_name: &str, payload: Option<&Value>) {
        let prefix = listener_prefix(event_name);
        // Snapshot under the lock, invoke outside it, so callbacks may
        // mutate the listener table re-entrantly.
        let snapshot: Vec<(String, Listener)> = self
            .listeners
            .read()
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(key, cb)| (key.clone(), Rc::clone(cb)))
            .collect();

        for (key, callback) in snapshot {
            if let Err(error) = callback(payload) {
                warn!(listener = %key, event = %event_name, %error, "listener failed");
            }
        }
    }

    /// Removes every listener.
    pub fn clear(&self) {
        self.listeners.write().clear();
    }
}
