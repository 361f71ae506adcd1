pub mod lru;

use std::sync::Arc;

/// An entry that left the store, handed back so the caller can notify
/// listeners and release the value outside the cache lock.
#[derive(Debug)]
pub struct Evicted<K, V> {
    pub key: K,
    pub value: Arc<V>,
    pub cost: u64,
}

/// Result of [`CostStore::insert`].
#[derive(Debug)]
pub struct InsertOutcome<K, V> {
    /// The value previously mapped to the key, if any.
    pub replaced: Option<Arc<V>>,
    /// Entries evicted to bring the store back under budget.
    pub evicted: Vec<Evicted<K, V>>,
    /// Set when the entry alone exceeds the store's budget and was refused.
    pub rejected: Option<Evicted<K, V>>,
    /// The older entry under the same key, removed because the new value
    /// was refused.
    pub displaced: Option<Evicted<K, V>>,
}

impl<K, V> InsertOutcome<K, V> {
    pub fn stored(replaced: Option<Arc<V>>, evicted: Vec<Evicted<K, V>>) -> Self {
        InsertOutcome {
            replaced,
            evicted,
            rejected: None,
            displaced: None,
        }
    }

    pub fn refused(rejected: Evicted<K, V>, displaced: Option<Evicted<K, V>>) -> Self {
        InsertOutcome {
            replaced: None,
            evicted: Vec::new(),
            rejected: Some(rejected),
            displaced,
        }
    }
}

/// Cost-bounded associative store.
///
/// All methods are called **single-threadedly**: the cache wraps the store
/// in a `Mutex` and holds it for the whole call.  Implementors only need to
/// be `Send`.
///
/// Conforming stores keep `total_cost() <= max_cost()` after every insert
/// and `total_cost() <= fraction * max_cost()` after `compact(fraction)`.
/// Which entries go first is up to the implementation.
pub trait CostStore<K, V>: Send {
    /// Upserts `value` under `key`.  Replacing releases the old value and
    /// accounts only the new `cost`.
    fn insert(&mut self, key: K, value: Arc<V>, cost: u64) -> InsertOutcome<K, V>;

    /// Looks up `key`.  A hit counts as a use for the eviction order.
    fn find(&mut self, key: &K) -> Option<Arc<V>>;

    /// Removes `key`, returning the removed entry.
    fn remove(&mut self, key: &K) -> Option<Evicted<K, V>>;

    fn contains(&self, key: &K) -> bool;

    /// Evicts entries until `total_cost() <= fraction * max_cost()`.
    fn compact(&mut self, fraction: f64) -> Vec<Evicted<K, V>>;

    /// Evicts every entry.
    fn remove_all(&mut self) -> Vec<Evicted<K, V>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of the costs of all resident entries.
    fn total_cost(&self) -> u64;

    fn max_cost(&self) -> u64;

    /// Fraction of `max_cost` the store compacts down to when an insert
    /// overflows the budget.
    fn compaction_factor(&self) -> f64;
}
