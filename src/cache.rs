use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::builder::CacheBuilder;
use crate::error::Result;
use crate::key::Key;
use crate::lifecycle::{LifecycleObserver, NotificationCenter};
use crate::listener::{EvictionCause, EvictionListener};
use crate::metrics::stats::{Metrics, StatsCounter};
use crate::store::{CostStore, Evicted};

/// A cache of rendered text artifacts keyed by [`Key`].
pub type RendererCache<A, V> = Cache<Key<A>, V>;

// ---------------------------------------------------------------------------
// Cache interior
// ---------------------------------------------------------------------------

/// Shared interior of a [`Cache`].
pub(crate) struct Inner<K, V> {
    name: String,
    /// The only shared mutable state; every store call holds this lock.
    store: Mutex<Box<dyn CostStore<K, V>>>,
    max_cost: u64,
    compaction_factor: f64,
    low_memory_fraction: f64,
    listener: Option<Box<dyn EvictionListener<K, V>>>,
    metrics: StatsCounter,
    /// Cleared when teardown starts; lifecycle callbacks check it first.
    alive: AtomicBool,
    observer: Option<LifecycleObserver>,
}

impl<K: 'static, V: 'static> Inner<K, V> {
    fn compact(&self, fraction: f64) {
        let (evicted, remaining) = {
            let mut store = self.store.lock();
            let evicted = store.compact(fraction);
            (evicted, store.total_cost())
        };
        self.metrics.record_compaction();
        tracing::debug!(
            cache = %self.name,
            fraction,
            evicted = evicted.len(),
            remaining_cost = remaining,
            "compacted cache"
        );
        self.dispatch(evicted, EvictionCause::Compacted);
    }

    fn remove_all(&self) {
        let evicted = self.store.lock().remove_all();
        self.metrics.record_clear();
        tracing::debug!(cache = %self.name, evicted = evicted.len(), "cleared cache");
        self.dispatch(evicted, EvictionCause::Cleared);
    }

    fn on_low_memory(&self) {
        self.metrics.record_low_memory_signal();
        tracing::debug!(cache = %self.name, "low-memory warning received");
        self.compact(self.low_memory_fraction);
    }

    fn on_enter_background(&self) {
        self.metrics.record_background_signal();
        tracing::debug!(cache = %self.name, "application entered background");
        self.remove_all();
    }

    /// Records and reports evictions.  Must be called without the store
    /// lock held; evicted values are released here.
    fn dispatch(&self, evicted: Vec<Evicted<K, V>>, cause: EvictionCause) {
        self.metrics.record_eviction(evicted.len() as u64);
        if let Some(listener) = &self.listener {
            for e in evicted {
                listener.on_evict(&e.key, e.value, cause);
            }
        }
    }
}

impl<K, V> Drop for Inner<K, V> {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
        // Unsubscribe before the store goes away.
        drop(self.observer.take());
        tracing::trace!(cache = %self.name, "cache torn down");
    }
}

/// Upgrades a callback's back-reference if the cache is still live.
fn live<K, V>(weak: &Weak<Inner<K, V>>) -> Option<Arc<Inner<K, V>>> {
    let inner = weak.upgrade()?;
    if inner.alive.load(Ordering::Acquire) {
        Some(inner)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Cache handle
// ---------------------------------------------------------------------------

/// A thread-safe, cost-bounded cache that sheds entries on memory warnings
/// and empties itself when the application is backgrounded.
///
/// Every operation takes the store's mutex for its whole critical section
/// and can be called from any thread.  A low-memory notification compacts
/// the cache to 95% of its budget (see
/// [`CacheBuilder::low_memory_fraction`]); an entered-background
/// notification removes everything.
///
/// `Cache` is a cheap handle: clones share the same entries, and the
/// lifecycle subscriptions are released when the last handle is dropped.
///
/// # Example
/// ```
/// use layoutcache::{Cache, InterfaceStyle, Key, Size};
/// use std::sync::Arc;
///
/// let cache: Cache<Key<&str>, String> = Cache::new("labels", 1_000, 0.8).unwrap();
/// let key = Key::new(InterfaceStyle::Light, "Menlo 12", Size::new(200.0, 16.0));
///
/// assert!(cache.lookup(&key).is_none());
/// cache.insert(key.clone(), "laid out".to_string(), 42);
/// assert_eq!(cache.lookup(&key), Some(Arc::new("laid out".to_string())));
/// ```
pub struct Cache<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for Cache<K, V> {
    fn clone(&self) -> Self {
        Cache {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> Cache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Creates a cache named `name` bounded by `max_cost`, compacting to
    /// `compaction_factor * max_cost` whenever an insert overflows.
    ///
    /// Subscribes to the process-wide
    /// [`LocalNotificationCenter`](crate::lifecycle::LocalNotificationCenter).
    pub fn new(name: impl Into<String>, max_cost: u64, compaction_factor: f64) -> Result<Self> {
        CacheBuilder::new(name, max_cost)
            .compaction_factor(compaction_factor)
            .try_build()
    }

    /// Returns a [`CacheBuilder`] for constructing a new cache.
    pub fn builder(name: impl Into<String>, max_cost: u64) -> CacheBuilder<K, V> {
        CacheBuilder::new(name, max_cost)
    }

    pub(crate) fn from_parts(
        name: String,
        store: Box<dyn CostStore<K, V>>,
        low_memory_fraction: f64,
        listener: Option<Box<dyn EvictionListener<K, V>>>,
        center: Arc<dyn NotificationCenter>,
    ) -> Result<Self> {
        let max_cost = store.max_cost();
        let compaction_factor = store.compaction_factor();
        let mut failure = None;

        let inner = Arc::new_cyclic(|weak: &Weak<Inner<K, V>>| {
            let low = weak.clone();
            let background = weak.clone();
            let observer = LifecycleObserver::new(
                center,
                move || {
                    if let Some(inner) = live(&low) {
                        inner.on_low_memory();
                    }
                },
                move || {
                    if let Some(inner) = live(&background) {
                        inner.on_enter_background();
                    }
                },
            );
            let observer = match observer {
                Ok(observer) => Some(observer),
                Err(err) => {
                    failure = Some(err);
                    None
                }
            };
            Inner {
                name,
                store: Mutex::new(store),
                max_cost,
                compaction_factor,
                low_memory_fraction,
                listener,
                metrics: StatsCounter::new(),
                alive: AtomicBool::new(true),
                observer,
            }
        });

        if let Some(err) = failure {
            tracing::error!(cache = %inner.name, error = %err, "lifecycle registration failed");
            return Err(err.into());
        }
        tracing::debug!(cache = %inner.name, max_cost, compaction_factor, "cache created");
        Ok(Cache { inner })
    }

    // -----------------------------------------------------------------------
    // Hot path
    // -----------------------------------------------------------------------

    /// Returns the value for `key`, if present.  A hit marks the entry as
    /// recently used.
    pub fn lookup(&self, key: &K) -> Option<Arc<V>> {
        let found = self.inner.store.lock().find(key);
        if found.is_some() {
            self.inner.metrics.record_hit();
        } else {
            self.inner.metrics.record_miss();
        }
        found
    }

    /// Stores `value` under `key` with the given `cost`, replacing any
    /// previous value.  May evict other entries to stay within budget.
    ///
    /// An entry whose cost exceeds the whole budget is not stored.
    pub fn insert(&self, key: K, value: V, cost: u64) {
        let outcome = self.inner.store.lock().insert(key, Arc::new(value), cost);

        if let Some(rejected) = outcome.rejected {
            tracing::debug!(
                cache = %self.inner.name,
                cost = rejected.cost,
                max_cost = self.inner.max_cost,
                "entry exceeds cache budget, not stored"
            );
            if let Some(listener) = &self.inner.listener {
                listener.on_evict(&rejected.key, rejected.value, EvictionCause::Rejected);
            }
            if let Some(displaced) = outcome.displaced {
                self.inner.dispatch(vec![displaced], EvictionCause::Displaced);
            }
        } else {
            self.inner.metrics.record_insertion();
        }

        if !outcome.evicted.is_empty() {
            tracing::trace!(
                cache = %self.inner.name,
                evicted = outcome.evicted.len(),
                "insert overflowed budget"
            );
        }
        self.inner.dispatch(outcome.evicted, EvictionCause::Capacity);
    }

    /// Removes the entry for `key`, if present.
    pub fn invalidate(&self, key: &K) {
        let removed = self.inner.store.lock().remove(key);
        if let Some(entry) = removed {
            self.inner.dispatch(vec![entry], EvictionCause::Explicit);
        }
    }

    // -----------------------------------------------------------------------
    // Eviction policy
    // -----------------------------------------------------------------------

    /// Evicts entries until the total cost is at most
    /// `fraction * max_cost`.
    ///
    /// # Panics
    /// If `fraction` is not in `(0, 1]`.
    pub fn compact(&self, fraction: f64) {
        assert!(
            fraction > 0.0 && fraction <= 1.0,
            "compaction fraction must be in (0, 1]"
        );
        self.inner.compact(fraction);
    }

    /// Removes all entries.
    pub fn remove_all(&self) {
        self.inner.remove_all();
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn max_cost(&self) -> u64 {
        self.inner.max_cost
    }

    pub fn compaction_factor(&self) -> f64 {
        self.inner.compaction_factor
    }

    /// Sum of the costs of all resident entries.
    pub fn total_cost(&self) -> u64 {
        self.inner.store.lock().total_cost()
    }

    pub fn entry_count(&self) -> usize {
        self.inner.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.store.lock().is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.store.lock().contains(key)
    }

    pub fn stats(&self) -> Metrics {
        self.inner.metrics.snapshot()
    }
}

impl<K, V> fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (entries, total_cost) = {
            let store = self.inner.store.lock();
            (store.len(), store.total_cost())
        };
        f.debug_struct("Cache")
            .field("name", &self.inner.name)
            .field("max_cost", &self.inner.max_cost)
            .field("entries", &entries)
            .field("total_cost", &total_cost)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{LifecycleEvent, LocalNotificationCenter};

    fn cache_on(center: &Arc<LocalNotificationCenter>, max_cost: u64) -> Cache<u32, String> {
        CacheBuilder::new("unit", max_cost)
            .notification_center(center.clone())
            .build()
    }

    #[test]
    fn low_memory_compacts_to_95_percent() {
        let center = Arc::new(LocalNotificationCenter::new());
        let cache = cache_on(&center, 100);
        for i in 0..10 {
            cache.insert(i, i.to_string(), 10);
        }
        assert_eq!(cache.total_cost(), 100);

        center.post(LifecycleEvent::LowMemory);
        assert!(cache.total_cost() <= 95);
        assert_eq!(cache.entry_count(), 9);
        assert!(!cache.contains(&0), "least recently used entry goes first");
        assert_eq!(cache.stats().low_memory_signals, 1);
    }

    #[test]
    fn background_clears_everything() {
        let center = Arc::new(LocalNotificationCenter::new());
        let cache = cache_on(&center, 100);
        cache.insert(1, "a".into(), 10);
        cache.insert(2, "b".into(), 10);

        center.post(LifecycleEvent::EnteredBackground);
        assert!(cache.is_empty());
        assert_eq!(cache.total_cost(), 0);
        assert_eq!(cache.stats().clears, 1);
    }

    #[test]
    fn clones_share_one_subscription_pair() {
        let center = Arc::new(LocalNotificationCenter::new());
        let cache = cache_on(&center, 10);
        let clone = cache.clone();
        assert_eq!(center.subscriber_count(LifecycleEvent::LowMemory), 1);
        drop(cache);
        assert_eq!(center.subscriber_count(LifecycleEvent::LowMemory), 1);
        drop(clone);
        assert_eq!(center.subscriber_count(LifecycleEvent::LowMemory), 0);
        assert_eq!(center.subscriber_count(LifecycleEvent::EnteredBackground), 0);
    }

    #[test]
    fn callback_after_teardown_is_a_no_op() {
        let inner_weak = {
            let center = Arc::new(LocalNotificationCenter::new());
            let cache = cache_on(&center, 10);
            Arc::downgrade(&cache.inner)
        };
        assert!(live(&inner_weak).is_none());
    }

    #[test]
    fn closed_center_fails_construction() {
        let center = Arc::new(LocalNotificationCenter::new());
        center.close();
        let result: Result<Cache<u32, u32>> = CacheBuilder::new("closed", 10)
            .notification_center(center)
            .try_build();
        assert!(matches!(
            result,
            Err(crate::Error::Lifecycle(crate::lifecycle::LifecycleError::Closed))
        ));
    }
}
