//! Notification router
//!
//! The router is the notification center's listener. Every delivery carries
//! the identity of the observer it was addressed to; the router resolves
//! that identity through the [`InstanceRegistry`] and calls the handler
//! matching the notification kind. Deliveries for unknown identities are
//! dropped, since the substrate may post late or stray notifications.

use std::sync::{Arc, OnceLock};

use spotlight_core::{Notification, NotificationKind, ObserverId};

use crate::center::NotificationListener;
use crate::registry::InstanceRegistry;

/// Handlers a query instance exposes to the router
pub trait QueryObserver: Send + Sync {
    fn query_did_update(&self, notification: &Notification);

    fn query_did_finish_gathering(&self, notification: &Notification);
}

#[derive(Default)]
pub struct NotificationRouter {
    registry: Arc<InstanceRegistry>,
}

static SHARED: OnceLock<Arc<NotificationRouter>> = OnceLock::new();

impl NotificationRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: Arc<InstanceRegistry>) -> Self {
        Self { registry }
    }

    /// The process-wide router
    pub fn shared() -> Arc<NotificationRouter> {
        SHARED.get_or_init(|| Arc::new(NotificationRouter::new())).clone()
    }

    pub fn registry(&self) -> &Arc<InstanceRegistry> {
        &self.registry
    }

    /// Route one notification. Returns whether a handler was invoked.
    pub fn dispatch(&self, observer: ObserverId, notification: &Notification) -> bool {
        let Some(instance) = self.registry.lookup(observer) else {
            tracing::trace!(
                "Dropping {} for unknown observer {}",
                notification.kind,
                observer
            );
            return false;
        };

        tracing::trace!(
            "Routing {} from {} to observer {}",
            notification.kind.handler_name(),
            notification.object,
            observer
        );
        match notification.kind {
            NotificationKind::Update => instance.query_did_update(notification),
            NotificationKind::FinishedGathering => instance.query_did_finish_gathering(notification),
        }
        true
    }
}

impl NotificationListener for NotificationRouter {
    fn deliver(&self, observer: ObserverId, notification: &Notification) {
        self.dispatch(observer, notification);
    }
}
