//! Eviction listener: a callback invoked whenever an entry leaves the cache.
//!
//! Listeners run on the thread that caused the eviction, after the cache
//! lock has been released.  That thread may be a lifecycle notification
//! thread when a memory warning or backgrounding signal triggers the
//! eviction.
//!
//! # Example
//! ```
//! use layoutcache::listener::EvictionCause;
//! use layoutcache::CacheBuilder;
//! use std::sync::{Arc, Mutex};
//!
//! let log: Arc<Mutex<Vec<(u64, EvictionCause)>>> = Arc::new(Mutex::new(Vec::new()));
//! let log2 = Arc::clone(&log);
//!
//! let cache: layoutcache::Cache<u64, u64> = CacheBuilder::new("doc", 2)
//!     .compaction_factor(1.0)
//!     .eviction_listener(move |key: &u64, _val, cause| {
//!         log2.lock().unwrap().push((*key, cause));
//!     })
//!     .build();
//!
//! cache.insert(1, 10, 1);
//! cache.insert(2, 20, 1);
//! cache.insert(3, 30, 1); // over budget, evicts key 1
//! assert_eq!(log.lock().unwrap()[0], (1, EvictionCause::Capacity));
//! ```

use std::sync::Arc;

// ---------------------------------------------------------------------------
// EvictionCause
// ---------------------------------------------------------------------------

/// The reason an entry was removed from the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvictionCause {
    /// An insert pushed the total cost over budget and the store compacted
    /// itself.
    Capacity,
    /// Removed by [`Cache::compact`], including the compaction triggered by
    /// a low-memory signal.
    ///
    /// [`Cache::compact`]: crate::Cache::compact
    Compacted,
    /// Removed by [`Cache::remove_all`], including the clear triggered by a
    /// backgrounding signal.
    ///
    /// [`Cache::remove_all`]: crate::Cache::remove_all
    Cleared,
    /// Removed explicitly via [`Cache::invalidate`].
    ///
    /// [`Cache::invalidate`]: crate::Cache::invalidate
    Explicit,
    /// The entry's cost alone exceeded the cache budget, so it was never
    /// stored.
    Rejected,
    /// The value previously stored under a key, dropped because a
    /// replacement for it was rejected.
    Displaced,
}

// ---------------------------------------------------------------------------
// EvictionListener trait
// ---------------------------------------------------------------------------

/// A callback invoked each time an entry is evicted, cleared or rejected.
///
/// Implementations must be `Send + Sync + 'static` because evictions can be
/// triggered from any thread.  Calling back into the same cache from the
/// listener is allowed; the store lock is not held.
pub trait EvictionListener<K, V>: Send + Sync + 'static {
    fn on_evict(&self, key: &K, value: Arc<V>, cause: EvictionCause);
}

/// An [`EvictionListener`] backed by a closure.
///
/// Created via [`CacheBuilder::eviction_listener`](crate::CacheBuilder::eviction_listener).
pub struct FnListener<F>(pub F);

impl<K, V, F> EvictionListener<K, V> for FnListener<F>
where
    F: Fn(&K, Arc<V>, EvictionCause) + Send + Sync + 'static,
{
    fn on_evict(&self, key: &K, value: Arc<V>, cause: EvictionCause) {
        (self.0)(key, value, cause)
    }
}
