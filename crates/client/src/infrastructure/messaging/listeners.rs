//! Listener registry for inbound room events.
//!
//! Listeners are keyed by event name and invoked in registration order. The
//! registry belongs to the connection manager, not to a physical socket, so
//! registrations survive reconnects.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

/// Callback invoked with the raw payload of an event.
pub type EventCallback = Arc<dyn Fn(&Value) + Send + Sync + 'static>;

/// Handle returned by [`ListenerRegistry::register`]; pass it back to unregister.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerHandle {
    event: String,
    id: u64,
}

impl ListenerHandle {
    pub fn event(&self) -> &str {
        &self.event
    }
}

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    by_event: HashMap<String, Vec<(u64, EventCallback)>>,
}

#[derive(Clone, Default)]
pub struct ListenerRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn register(
        &self,
        event: &str,
        callback: impl Fn(&Value) + Send + Sync + 'static,
    ) -> ListenerHandle {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner
            .by_event
            .entry(event.to_string())
            .or_default()
            .push((id, Arc::new(callback)));

        ListenerHandle {
            event: event.to_string(),
            id,
        }
    }

    /// Remove exactly the registration behind `handle`.
    ///
    /// Returns false if it was already gone.
    pub fn unregister(&self, handle: &ListenerHandle) -> bool {
        let mut inner = self.lock();
        let Some(listeners) = inner.by_event.get_mut(&handle.event) else {
            return false;
        };

        let before = listeners.len();
        listeners.retain(|(id, _)| *id != handle.id);
        let removed = listeners.len() != before;

        if listeners.is_empty() {
            inner.by_event.remove(&handle.event);
        }
        removed
    }

    /// Invoke every listener registered for `event`. Returns how many ran.
    ///
    /// The lock is released before callbacks run, so a callback may register or
    /// unregister listeners; such changes apply from the next event on.
    pub fn dispatch(&self, event: &str, payload: &Value) -> usize {
        let callbacks: Vec<EventCallback> = {
            let inner = self.lock();
            match inner.by_event.get(event) {
                Some(listeners) => listeners.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
                None => return 0,
            }
        };

        for callback in &callbacks {
            callback(payload);
        }
        callbacks.len()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.lock().by_event.get(event).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dispatch_in_registration_order() {
        let registry = ListenerRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            registry.register("new_notification", move |_| {
                seen.lock().unwrap().push(tag);
            });
        }

        assert_eq!(registry.dispatch("new_notification", &json!({})), 3);
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_unregister_removes_only_matching_registration() {
        let registry = ListenerRegistry::new();
        let a = registry.register("new_notification", |_| {});
        let _b = registry.register("new_notification", |_| {});
        let other = registry.register("order_updated", |_| {});

        assert!(registry.unregister(&a));
        assert_eq!(registry.listener_count("new_notification"), 1);
        assert_eq!(registry.listener_count("order_updated"), 1);

        // Second removal is a no-op
        assert!(!registry.unregister(&a));
        assert!(registry.unregister(&other));
        assert_eq!(registry.listener_count("order_updated"), 0);
    }

    #[test]
    fn test_dispatch_without_listeners() {
        let registry = ListenerRegistry::new();
        assert_eq!(registry.dispatch("nobody_listens", &json!(null)), 0);
    }

    #[test]
    fn test_callback_may_unregister_itself() {
        let registry = ListenerRegistry::new();
        let slot: Arc<Mutex<Option<ListenerHandle>>> = Arc::new(Mutex::new(None));

        let registry_clone = registry.clone();
        let slot_clone = Arc::clone(&slot);
        let handle = registry.register("once", move |_| {
            if let Some(h) = slot_clone.lock().unwrap().take() {
                registry_clone.unregister(&h);
            }
        });
        *slot.lock().unwrap() = Some(handle);

        assert_eq!(registry.dispatch("once", &json!(1)), 1);
        assert_eq!(registry.dispatch("once", &json!(2)), 0);
    }
}
