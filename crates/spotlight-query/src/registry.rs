//! Instance registry
//!
//! Maps observer identities back to the query instances that own them.
//! Entries hold weak references, so a dropped instance is never dispatched
//! to even if its entry has not been removed yet.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use spotlight_core::ObserverId;

use crate::router::QueryObserver;

#[derive(Default)]
pub struct InstanceRegistry {
    entries: RwLock<HashMap<ObserverId, Weak<dyn QueryObserver>>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unconditionally, replacing any entry with the same identity
    pub fn register(&self, id: ObserverId, instance: &Arc<dyn QueryObserver>) {
        let previous = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::downgrade(instance));
        if previous.is_some() {
            tracing::warn!("Observer {} registered twice; previous instance replaced", id);
        }
    }

    /// Resolve an identity to a live instance
    pub fn lookup(&self, id: ObserverId) -> Option<Arc<dyn QueryObserver>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .and_then(Weak::upgrade)
    }

    pub fn unregister(&self, id: ObserverId) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }

    pub fn contains(&self, id: ObserverId) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    /// Drop entries whose instance no longer exists
    pub fn prune(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, instance| instance.strong_count() > 0);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spotlight_core::Notification;

    struct Inert;

    impl QueryObserver for Inert {
        fn query_did_update(&self, _notification: &Notification) {}
        fn query_did_finish_gathering(&self, _notification: &Notification) {}
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = InstanceRegistry::new();
        let id = ObserverId::new();
        let instance: Arc<dyn QueryObserver> = Arc::new(Inert);

        registry.register(id, &instance);
        assert!(registry.contains(id));
        assert!(registry.lookup(id).is_some());
        assert!(registry.lookup(ObserverId::new()).is_none());
    }

    #[test]
    fn test_dropped_instance_is_not_resolved() {
        let registry = InstanceRegistry::new();
        let id = ObserverId::new();
        let instance: Arc<dyn QueryObserver> = Arc::new(Inert);
        registry.register(id, &instance);
        drop(instance);

        assert!(registry.lookup(id).is_none());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.prune(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unregister() {
        let registry = InstanceRegistry::new();
        let id = ObserverId::new();
        let instance: Arc<dyn QueryObserver> = Arc::new(Inert);
        registry.register(id, &instance);

        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert!(registry.lookup(id).is_none());
    }
}
