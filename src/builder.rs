use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use crate::cache::Cache;
use crate::error::Result;
use crate::lifecycle::{LocalNotificationCenter, NotificationCenter};
use crate::listener::{EvictionListener, FnListener};
use crate::store::lru::LruStore;
use crate::store::CostStore;

/// Fraction of the budget an overflowing insert compacts down to.
pub const DEFAULT_COMPACTION_FACTOR: f64 = 0.8;

/// Fraction of the budget kept when a low-memory warning arrives.
pub const LOW_MEMORY_COMPACTION_FRACTION: f64 = 0.95;

/// Builder for configuring and constructing a [`Cache`].
///
/// # Example
/// ```
/// use layoutcache::CacheBuilder;
/// use layoutcache::lifecycle::LocalNotificationCenter;
/// use std::sync::Arc;
///
/// let center = Arc::new(LocalNotificationCenter::new());
/// let cache: layoutcache::Cache<String, Vec<u8>> = CacheBuilder::new("raster", 4 * 1024 * 1024)
///     .compaction_factor(0.75)
///     .notification_center(center)
///     .build();
/// assert_eq!(cache.max_cost(), 4 * 1024 * 1024);
/// ```
pub struct CacheBuilder<K, V> {
    name: String,
    max_cost: u64,
    compaction_factor: f64,
    low_memory_fraction: f64,
    center: Option<Arc<dyn NotificationCenter>>,
    store: Option<Box<dyn CostStore<K, V>>>,
    listener: Option<Box<dyn EvictionListener<K, V>>>,
}

impl<K: 'static, V: 'static> CacheBuilder<K, V> {
    /// `name` is a diagnostic label; it appears in log events only.
    pub fn new(name: impl Into<String>, max_cost: u64) -> Self {
        assert!(max_cost > 0, "max_cost must be greater than 0");
        CacheBuilder {
            name: name.into(),
            max_cost,
            compaction_factor: DEFAULT_COMPACTION_FACTOR,
            low_memory_fraction: LOW_MEMORY_COMPACTION_FRACTION,
            center: None,
            store: None,
            listener: None,
        }
    }

    /// Fraction of `max_cost` to compact down to when an insert overflows
    /// the budget (default: 0.8).
    pub fn compaction_factor(mut self, factor: f64) -> Self {
        assert!(
            factor > 0.0 && factor <= 1.0,
            "compaction_factor must be in (0, 1]"
        );
        self.compaction_factor = factor;
        self
    }

    /// Fraction of `max_cost` kept on a low-memory warning (default: 0.95).
    pub fn low_memory_fraction(mut self, fraction: f64) -> Self {
        assert!(
            fraction > 0.0 && fraction <= 1.0,
            "low_memory_fraction must be in (0, 1]"
        );
        self.low_memory_fraction = fraction;
        self
    }

    /// Where lifecycle notifications come from (default:
    /// [`LocalNotificationCenter::global`]).
    pub fn notification_center(mut self, center: Arc<dyn NotificationCenter>) -> Self {
        self.center = Some(center);
        self
    }

    /// Use a custom store.  Its own `max_cost` and `compaction_factor`
    /// replace the ones configured on the builder.
    pub fn store<S: CostStore<K, V> + 'static>(mut self, store: S) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    /// Register an eviction listener closure.
    ///
    /// The closure runs on whichever thread caused the eviction, including
    /// lifecycle notification threads.
    pub fn eviction_listener<F>(mut self, f: F) -> Self
    where
        F: Fn(&K, Arc<V>, crate::listener::EvictionCause) + Send + Sync + 'static,
    {
        self.listener = Some(Box::new(FnListener(f)));
        self
    }

    /// Register an eviction listener via the [`EvictionListener`] trait.
    pub fn eviction_listener_impl<L: EvictionListener<K, V>>(mut self, l: L) -> Self {
        self.listener = Some(Box::new(l));
        self
    }
}

impl<K, V> CacheBuilder<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Builds the cache, returning an error if the lifecycle subscriptions
    /// cannot be registered.
    pub fn try_build(self) -> Result<Cache<K, V>> {
        let store = LruStore::new(self.max_cost, self.compaction_factor);
        self.finish(store)
    }

    /// Like [`try_build`](Self::try_build) but hashes keys with `hasher`.
    ///
    /// Pair with [`KeyBuildHasher`](crate::key::KeyBuildHasher) for caches
    /// keyed by [`Key`](crate::key::Key).
    pub fn build_with_hasher<S>(self, hasher: S) -> Result<Cache<K, V>>
    where
        S: BuildHasher + Send + 'static,
    {
        let store = LruStore::with_hasher(self.max_cost, self.compaction_factor, hasher);
        self.finish(store)
    }

    /// Builds the cache.
    ///
    /// # Panics
    /// If the lifecycle subscriptions cannot be registered.  A cache that
    /// cannot hear memory warnings is a configuration error.
    pub fn build(self) -> Cache<K, V> {
        let name = self.name.clone();
        match self.try_build() {
            Ok(cache) => cache,
            Err(err) => panic!("cache `{name}`: {err}"),
        }
    }

    fn finish<S: CostStore<K, V> + 'static>(self, default_store: S) -> Result<Cache<K, V>> {
        let store = self.store.unwrap_or_else(|| Box::new(default_store));
        let center = self
            .center
            .unwrap_or_else(|| LocalNotificationCenter::global() as Arc<dyn NotificationCenter>);
        Cache::from_parts(
            self.name,
            store,
            self.low_memory_fraction,
            self.listener,
            center,
        )
    }
}
