//! Host lifecycle notifications: memory warnings and backgrounding.
//!
//! The host side is abstracted behind [`NotificationCenter`].  A center
//! hands out a [`SubscriptionId`] per registration; callers own that id
//! through a [`Subscription`] guard, which unregisters exactly once when it
//! is dropped.  [`LifecycleObserver`] bundles the two subscriptions a cache
//! needs.
//!
//! [`LocalNotificationCenter`] is an in-process broadcast center.  Platform
//! glue forwards OS events into it with [`LocalNotificationCenter::post`].

mod local;
mod observer;

pub use local::LocalNotificationCenter;
pub use observer::LifecycleObserver;

use std::fmt;
use std::sync::Arc;

/// A lifecycle event broadcast by the host.  Events carry no payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// The process received a low-memory warning.
    LowMemory,
    /// The application moved to the background.
    EnteredBackground,
}

impl LifecycleEvent {
    pub const ALL: [LifecycleEvent; 2] = [LifecycleEvent::LowMemory, LifecycleEvent::EnteredBackground];
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::LowMemory => f.write_str("low-memory"),
            LifecycleEvent::EnteredBackground => f.write_str("entered-background"),
        }
    }
}

/// How a subscriber wants events delivered while the center is suspended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Delivery {
    /// Deliver as soon as the event is posted, suspended or not.
    #[default]
    Immediate,
    /// Hold events while suspended; deliver each pending event once on
    /// resume.
    Deferred,
}

/// Handler invoked for each delivered event.
pub type Handler = Arc<dyn Fn() + Send + Sync + 'static>;

/// Opaque registration handle issued by a [`NotificationCenter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("notification center is closed")]
    Closed,
    #[error("lifecycle notifications unsupported: {0}")]
    Unsupported(&'static str),
}

/// A source of lifecycle notifications.
///
/// Implementations must tolerate `unsubscribe` being called from inside a
/// handler, and must not invoke a handler while holding a lock that
/// `subscribe`/`unsubscribe` need.
pub trait NotificationCenter: Send + Sync + 'static {
    fn subscribe(
        &self,
        event: LifecycleEvent,
        delivery: Delivery,
        handler: Handler,
    ) -> Result<SubscriptionId, LifecycleError>;

    /// Removes a registration.  Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Owned registration with a [`NotificationCenter`].
///
/// Dropping the guard unregisters the handler.  The guard is not `Clone`,
/// so the deregistration happens exactly once.
pub struct Subscription {
    center: Arc<dyn NotificationCenter>,
    event: LifecycleEvent,
    id: Option<SubscriptionId>,
}

impl Subscription {
    /// Registers `handler` for `event` on `center`.
    pub fn register(
        center: Arc<dyn NotificationCenter>,
        event: LifecycleEvent,
        delivery: Delivery,
        handler: Handler,
    ) -> Result<Self, LifecycleError> {
        let id = center.subscribe(event, delivery, handler)?;
        tracing::trace!(%event, id = id.0, "lifecycle subscription registered");
        Ok(Subscription {
            center,
            event,
            id: Some(id),
        })
    }

    pub fn event(&self) -> LifecycleEvent {
        self.event
    }

    pub fn id(&self) -> Option<SubscriptionId> {
        self.id
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.event)
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.center.unsubscribe(id);
            tracing::trace!(event = %self.event, id = id.0, "lifecycle subscription released");
        }
    }
}
