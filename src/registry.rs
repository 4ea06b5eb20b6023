//! Handler registration keyed by plugin name or instance id.
//!
//! Two independent keyspaces back the dual-keyed dispatch: an inbound
//! envelope may match a name handler, an instance handler, or both. Each
//! key holds exactly one callback - registering again replaces the previous
//! handler rather than fanning out.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::envelope::Envelope;

/// Callback invoked with an independent copy of each matching envelope.
///
/// An `Err` return is logged by the receive loop and isolated to that
/// message; it never tears down the connection.
pub type Handler = Arc<dyn Fn(Envelope) -> anyhow::Result<()> + Send + Sync>;

/// Registry of message handlers, keyed by plugin name and by instance id.
#[derive(Default)]
pub struct HandlerRegistry {
    by_name: RwLock<HashMap<String, Handler>>,
    by_instance: RwLock<HashMap<String, Handler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a plugin name. Last registration wins.
    ///
    /// Empty keys are rejected: they can never match an inbound envelope.
    pub fn register_name(&self, name: impl Into<String>, handler: Handler) {
        let name = name.into();
        if name.is_empty() {
            log::warn!("[Registry] ignoring registration with empty plugin name");
            return;
        }
        self.by_name
            .write()
            .expect("registry lock poisoned")
            .insert(name, handler);
    }

    /// Register a handler for a plugin instance id. Last registration wins.
    pub fn register_instance(&self, instance_id: impl Into<String>, handler: Handler) {
        let instance_id = instance_id.into();
        if instance_id.is_empty() {
            log::warn!("[Registry] ignoring registration with empty instance id");
            return;
        }
        self.by_instance
            .write()
            .expect("registry lock poisoned")
            .insert(instance_id, handler);
    }

    /// Remove the handler for a plugin name.
    ///
    /// Returns `true` if a handler was registered under the key.
    pub fn unregister_name(&self, name: &str) -> bool {
        self.by_name
            .write()
            .expect("registry lock poisoned")
            .remove(name)
            .is_some()
    }

    /// Remove the handler for a plugin instance id.
    ///
    /// Returns `true` if a handler was registered under the key.
    pub fn unregister_instance(&self, instance_id: &str) -> bool {
        self.by_instance
            .write()
            .expect("registry lock poisoned")
            .remove(instance_id)
            .is_some()
    }

    /// Look up the handler for a plugin name.
    pub fn name_handler(&self, name: &str) -> Option<Handler> {
        self.by_name
            .read()
            .expect("registry lock poisoned")
            .get(name)
            .cloned()
    }

    /// Look up the handler for a plugin instance id.
    pub fn instance_handler(&self, instance_id: &str) -> Option<Handler> {
        self.by_instance
            .read()
            .expect("registry lock poisoned")
            .get(instance_id)
            .cloned()
    }

    /// Number of registered name handlers.
    pub fn name_count(&self) -> usize {
        self.by_name.read().expect("registry lock poisoned").len()
    }

    /// Number of registered instance handlers.
    pub fn instance_count(&self) -> usize {
        self.by_instance
            .read()
            .expect("registry lock poisoned")
            .len()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("name_count", &self.name_count())
            .field("instance_count", &self.instance_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_handler(counter: Arc<AtomicUsize>) -> Handler {
        Arc::new(move |_envelope| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn test_keyspaces_are_independent() {
        let registry = HandlerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));

        registry.register_name("p1", counting_handler(Arc::clone(&counter)));

        assert!(registry.name_handler("p1").is_some());
        // Same key in the other keyspace stays empty
        assert!(registry.instance_handler("p1").is_none());
    }

    #[test]
    fn test_last_registration_wins() {
        let registry = HandlerRegistry::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        registry.register_name("p1", counting_handler(Arc::clone(&first)));
        registry.register_name("p1", counting_handler(Arc::clone(&second)));
        assert_eq!(registry.name_count(), 1);

        let handler = registry.name_handler("p1").expect("handler");
        handler(Envelope::keep_alive()).unwrap();

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unregister() {
        let registry = HandlerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));

        registry.register_instance("i1", counting_handler(Arc::clone(&counter)));
        assert!(registry.unregister_instance("i1"));
        assert!(registry.instance_handler("i1").is_none());

        // Unregistering an unknown key is a no-op
        assert!(!registry.unregister_instance("i1"));
        assert!(!registry.unregister_name("never-registered"));
    }

    #[test]
    fn test_empty_keys_rejected() {
        let registry = HandlerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));

        registry.register_name("", counting_handler(Arc::clone(&counter)));
        registry.register_instance("", counting_handler(Arc::clone(&counter)));

        assert_eq!(registry.name_count(), 0);
        assert_eq!(registry.instance_count(), 0);
    }
}
