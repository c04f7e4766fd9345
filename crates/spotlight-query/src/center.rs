//! Notification center
//!
//! Holds `(observer, kind, source object)` subscriptions. Posting a
//! notification hands it, together with each matching observer identity,
//! to the single listener the center was built with.

use std::sync::{Arc, PoisonError, RwLock};

use spotlight_core::{Notification, NotificationKind, ObserverId, QueryObjectId};

/// Receives every delivery the center makes
pub trait NotificationListener: Send + Sync {
    fn deliver(&self, observer: ObserverId, notification: &Notification);
}

/// One observer registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    pub observer: ObserverId,
    pub kind: NotificationKind,
    /// Only notifications from this object match; `None` matches any source
    pub object: Option<QueryObjectId>,
}

impl Subscription {
    fn matches(&self, notification: &Notification) -> bool {
        self.kind == notification.kind
            && self.object.map_or(true, |object| object == notification.object)
    }
}

pub struct NotificationCenter {
    subscriptions: RwLock<Vec<Subscription>>,
    listener: Arc<dyn NotificationListener>,
}

impl NotificationCenter {
    pub fn new(listener: Arc<dyn NotificationListener>) -> Self {
        Self {
            subscriptions: RwLock::new(Vec::new()),
            listener,
        }
    }

    /// Subscribe `observer` to `kind` notifications from `object`.
    ///
    /// Returns false if the identical subscription already exists.
    pub fn add_observer(
        &self,
        observer: ObserverId,
        kind: NotificationKind,
        object: Option<QueryObjectId>,
    ) -> bool {
        let subscription = Subscription {
            observer,
            kind,
            object,
        };
        let mut subscriptions = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if subscriptions.contains(&subscription) {
            return false;
        }
        tracing::trace!("Observer {} subscribed to {}", observer, kind);
        subscriptions.push(subscription);
        true
    }

    /// Remove every subscription held by `observer`
    pub fn remove_observer(&self, observer: ObserverId) -> usize {
        let mut subscriptions = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscriptions.len();
        subscriptions.retain(|s| s.observer != observer);
        before - subscriptions.len()
    }

    /// Deliver `notification` to every matching observer.
    ///
    /// Returns the number of deliveries made.
    pub fn post(&self, notification: &Notification) -> usize {
        let observers: Vec<ObserverId> = self
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.matches(notification))
            .map(|s| s.observer)
            .collect();

        if observers.is_empty() {
            tracing::trace!("No observers for {} from {}", notification.kind, notification.object);
        }

        // Deliveries happen without the subscription lock held; handlers may
        // add or remove observers.
        for observer in &observers {
            self.listener.deliver(*observer, notification);
        }
        observers.len()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn subscriptions_for(&self, observer: ObserverId) -> Vec<Subscription> {
        self.subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.observer == observer)
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(ObserverId, Notification)>>,
    }

    impl NotificationListener for Recorder {
        fn deliver(&self, observer: ObserverId, notification: &Notification) {
            self.seen.lock().unwrap().push((observer, *notification));
        }
    }

    #[test]
    fn test_post_matches_kind_and_object() {
        let recorder = Arc::new(Recorder::default());
        let center = NotificationCenter::new(recorder.clone());
        let observer = ObserverId::new();
        let object = QueryObjectId::next();
        let other = QueryObjectId::next();

        center.add_observer(observer, NotificationKind::FinishedGathering, Some(object));

        assert_eq!(center.post(&Notification::finished_gathering(object)), 1);
        assert_eq!(center.post(&Notification::update(object)), 0);
        assert_eq!(center.post(&Notification::finished_gathering(other)), 0);

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], (observer, Notification::finished_gathering(object)));
    }

    #[test]
    fn test_wildcard_object() {
        let recorder = Arc::new(Recorder::default());
        let center = NotificationCenter::new(recorder.clone());
        let observer = ObserverId::new();
        center.add_observer(observer, NotificationKind::Update, None);

        assert_eq!(center.post(&Notification::update(QueryObjectId::next())), 1);
        assert_eq!(center.post(&Notification::update(QueryObjectId::next())), 1);
    }

    #[test]
    fn test_duplicate_and_remove() {
        let recorder = Arc::new(Recorder::default());
        let center = NotificationCenter::new(recorder);
        let observer = ObserverId::new();
        let object = QueryObjectId::next();

        assert!(center.add_observer(observer, NotificationKind::Update, Some(object)));
        assert!(!center.add_observer(observer, NotificationKind::Update, Some(object)));
        assert!(center.add_observer(observer, NotificationKind::FinishedGathering, Some(object)));
        assert_eq!(center.subscriptions_for(observer).len(), 2);

        assert_eq!(center.remove_observer(observer), 2);
        assert_eq!(center.subscription_count(), 0);
        assert_eq!(center.remove_observer(observer), 0);
    }
}
