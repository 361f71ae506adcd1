use std::fmt;
use std::sync::Arc;

use super::{Delivery, LifecycleError, LifecycleEvent, NotificationCenter, Subscription};

/// Bridges host lifecycle notifications to two callbacks.
///
/// Both subscriptions use [`Delivery::Immediate`]: a memory warning has to
/// reach the cache before the host escalates, so nothing is held back while
/// the center is suspended.  The observer does no locking of its own; the
/// callbacks are responsible for synchronising with whatever they touch.
///
/// Dropping the observer unregisters both subscriptions.
pub struct LifecycleObserver {
    low_memory: Subscription,
    enter_background: Subscription,
}

impl LifecycleObserver {
    pub fn new<L, B>(
        center: Arc<dyn NotificationCenter>,
        on_low_memory: L,
        on_enter_background: B,
    ) -> Result<Self, LifecycleError>
    where
        L: Fn() + Send + Sync + 'static,
        B: Fn() + Send + Sync + 'static,
    {
        let low_memory = Subscription::register(
            Arc::clone(&center),
            LifecycleEvent::LowMemory,
            Delivery::Immediate,
            Arc::new(on_low_memory),
        )?;
        // If this fails, `low_memory` is dropped on the way out and released.
        let enter_background = Subscription::register(
            center,
            LifecycleEvent::EnteredBackground,
            Delivery::Immediate,
            Arc::new(on_enter_background),
        )?;
        Ok(LifecycleObserver {
            low_memory,
            enter_background,
        })
    }
}

impl fmt::Debug for LifecycleObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleObserver")
            .field("low_memory", &self.low_memory)
            .field("enter_background", &self.enter_background)
            .finish()
    }
}
