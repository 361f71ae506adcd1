use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use super::{Delivery, Handler, LifecycleError, LifecycleEvent, NotificationCenter, SubscriptionId};

struct Registration {
    id: SubscriptionId,
    event: LifecycleEvent,
    delivery: Delivery,
    handler: Handler,
    /// Cleared on unsubscribe so a handler already picked up by a
    /// concurrent `post` is skipped.
    active: Arc<AtomicBool>,
}

#[derive(Default)]
struct State {
    registrations: Vec<Registration>,
    suspended: bool,
    /// Events held for `Deferred` subscribers, at most one per event.
    pending: Vec<LifecycleEvent>,
    closed: bool,
}

type Batch = Vec<(Handler, Arc<AtomicBool>)>;

/// In-process broadcast center for lifecycle events.
///
/// Handlers run synchronously on the thread that calls [`post`] or
/// [`resume`], after the center's lock has been released, so handlers may
/// subscribe or unsubscribe freely.
///
/// # Example
/// ```
/// use layoutcache::lifecycle::{Delivery, LifecycleEvent, LocalNotificationCenter, NotificationCenter};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let center = LocalNotificationCenter::new();
/// let hits = Arc::new(AtomicUsize::new(0));
/// let h = Arc::clone(&hits);
/// let id = center
///     .subscribe(LifecycleEvent::LowMemory, Delivery::Immediate, Arc::new(move || {
///         h.fetch_add(1, Ordering::SeqCst);
///     }))
///     .unwrap();
///
/// center.post(LifecycleEvent::LowMemory);
/// center.unsubscribe(id);
/// center.post(LifecycleEvent::LowMemory);
/// assert_eq!(hits.load(Ordering::SeqCst), 1);
/// ```
///
/// [`post`]: LocalNotificationCenter::post
/// [`resume`]: LocalNotificationCenter::resume
pub struct LocalNotificationCenter {
    next_id: AtomicU64,
    state: Mutex<State>,
}

static GLOBAL: OnceLock<Arc<LocalNotificationCenter>> = OnceLock::new();

impl LocalNotificationCenter {
    pub fn new() -> Self {
        LocalNotificationCenter {
            next_id: AtomicU64::new(1),
            state: Mutex::new(State::default()),
        }
    }

    /// The process-wide center used by caches that are not given one.
    pub fn global() -> Arc<LocalNotificationCenter> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(LocalNotificationCenter::new())))
    }

    /// Broadcasts `event`.  Returns the number of handlers invoked.
    ///
    /// While suspended only `Immediate` subscribers are notified; the event
    /// is remembered for `Deferred` subscribers.
    pub fn post(&self, event: LifecycleEvent) -> usize {
        let batch = {
            let mut state = self.state.lock();
            if state.closed {
                return 0;
            }
            if state.suspended && !state.pending.contains(&event) {
                state.pending.push(event);
            }
            let suspended = state.suspended;
            collect(&state, event, |d| !suspended || d == Delivery::Immediate)
        };
        tracing::trace!(%event, handlers = batch.len(), "posting lifecycle event");
        dispatch(batch)
    }

    /// Starts holding events back from `Deferred` subscribers.
    pub fn suspend(&self) {
        self.state.lock().suspended = true;
    }

    /// Stops suspension and delivers each held event once to `Deferred`
    /// subscribers.  Returns the number of handlers invoked.
    pub fn resume(&self) -> usize {
        let batch = {
            let mut state = self.state.lock();
            state.suspended = false;
            let pending = std::mem::take(&mut state.pending);
            let mut batch = Vec::new();
            for event in pending {
                batch.extend(collect(&state, event, |d| d == Delivery::Deferred));
            }
            batch
        };
        dispatch(batch)
    }

    pub fn is_suspended(&self) -> bool {
        self.state.lock().suspended
    }

    /// Drops every registration and refuses new ones.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.pending.clear();
        for reg in state.registrations.drain(..) {
            reg.active.store(false, Ordering::Release);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Number of live registrations for `event`.
    pub fn subscriber_count(&self, event: LifecycleEvent) -> usize {
        self.state
            .lock()
            .registrations
            .iter()
            .filter(|r| r.event == event)
            .count()
    }
}

impl Default for LocalNotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationCenter for LocalNotificationCenter {
    fn subscribe(
        &self,
        event: LifecycleEvent,
        delivery: Delivery,
        handler: Handler,
    ) -> Result<SubscriptionId, LifecycleError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(LifecycleError::Closed);
        }
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        state.registrations.push(Registration {
            id,
            event,
            delivery,
            handler,
            active: Arc::new(AtomicBool::new(true)),
        });
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        let mut state = self.state.lock();
        if let Some(pos) = state.registrations.iter().position(|r| r.id == id) {
            let reg = state.registrations.swap_remove(pos);
            reg.active.store(false, Ordering::Release);
        }
    }
}

fn collect(state: &State, event: LifecycleEvent, wanted: impl Fn(Delivery) -> bool) -> Batch {
    state
        .registrations
        .iter()
        .filter(|r| r.event == event && wanted(r.delivery))
        .map(|r| (Arc::clone(&r.handler), Arc::clone(&r.active)))
        .collect()
}

fn dispatch(batch: Batch) -> usize {
    let mut invoked = 0;
    for (handler, active) in batch {
        if active.load(Ordering::Acquire) {
            handler();
            invoked += 1;
        }
    }
    invoked
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, Handler) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let handler: Handler = Arc::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (count, handler)
    }

    #[test]
    fn post_reaches_only_matching_event() {
        let center = LocalNotificationCenter::new();
        let (low, h) = counter();
        center
            .subscribe(LifecycleEvent::LowMemory, Delivery::Immediate, h)
            .unwrap();
        assert_eq!(center.post(LifecycleEvent::EnteredBackground), 0);
        assert_eq!(center.post(LifecycleEvent::LowMemory), 1);
        assert_eq!(low.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn immediate_delivery_ignores_suspension() {
        let center = LocalNotificationCenter::new();
        let (immediate, h1) = counter();
        let (deferred, h2) = counter();
        center
            .subscribe(LifecycleEvent::LowMemory, Delivery::Immediate, h1)
            .unwrap();
        center
            .subscribe(LifecycleEvent::LowMemory, Delivery::Deferred, h2)
            .unwrap();

        center.suspend();
        center.post(LifecycleEvent::LowMemory);
        center.post(LifecycleEvent::LowMemory);
        assert_eq!(immediate.load(Ordering::SeqCst), 2);
        assert_eq!(deferred.load(Ordering::SeqCst), 0);

        // Held events coalesce into one delivery.
        assert_eq!(center.resume(), 1);
        assert_eq!(deferred.load(Ordering::SeqCst), 1);
        assert!(!center.is_suspended());
    }

    #[test]
    fn handler_may_unsubscribe_itself() {
        let center = Arc::new(LocalNotificationCenter::new());
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));
        let (c2, s2) = (Arc::clone(&center), Arc::clone(&slot));
        let id = center
            .subscribe(
                LifecycleEvent::EnteredBackground,
                Delivery::Immediate,
                Arc::new(move || {
                    if let Some(id) = s2.lock().take() {
                        c2.unsubscribe(id);
                    }
                }),
            )
            .unwrap();
        *slot.lock() = Some(id);

        assert_eq!(center.post(LifecycleEvent::EnteredBackground), 1);
        assert_eq!(center.subscriber_count(LifecycleEvent::EnteredBackground), 0);
        assert_eq!(center.post(LifecycleEvent::EnteredBackground), 0);
    }

    #[test]
    fn handler_removed_mid_dispatch_is_skipped() {
        let center = Arc::new(LocalNotificationCenter::new());
        let (second, h2) = counter();
        let later: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));
        let (c1, l1) = (Arc::clone(&center), Arc::clone(&later));
        center
            .subscribe(
                LifecycleEvent::LowMemory,
                Delivery::Immediate,
                Arc::new(move || {
                    if let Some(id) = *l1.lock() {
                        c1.unsubscribe(id);
                    }
                }),
            )
            .unwrap();
        let id = center
            .subscribe(LifecycleEvent::LowMemory, Delivery::Immediate, h2)
            .unwrap();
        *later.lock() = Some(id);

        assert_eq!(center.post(LifecycleEvent::LowMemory), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn closed_center_refuses_subscriptions() {
        let center = LocalNotificationCenter::new();
        let (_, h) = counter();
        center
            .subscribe(LifecycleEvent::LowMemory, Delivery::Immediate, Arc::clone(&h))
            .unwrap();
        center.close();
        assert_eq!(center.subscriber_count(LifecycleEvent::LowMemory), 0);
        assert_eq!(
            center.subscribe(LifecycleEvent::LowMemory, Delivery::Immediate, h),
            Err(LifecycleError::Closed)
        );
        assert_eq!(center.post(LifecycleEvent::LowMemory), 0);
    }
}
