use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use ahash::RandomState;

use super::{CostStore, Evicted, InsertOutcome};

/// Sentinel indices in the `nodes` arena.
const HEAD: usize = 0; // most-recently-used end
const TAIL: usize = 1; // least-recently-used end
const NULL: usize = usize::MAX;

struct LruNode<K, V> {
    /// `None` for the HEAD and TAIL sentinels and for freed slots.
    key: Option<K>,
    value: Option<Arc<V>>,
    cost: u64,
    /// Index toward HEAD (more recently used).
    prev: usize,
    /// Index toward TAIL (less recently used).
    next: usize,
}

impl<K, V> LruNode<K, V> {
    fn sentinel(prev: usize, next: usize) -> Self {
        LruNode {
            key: None,
            value: None,
            cost: 0,
            prev,
            next,
        }
    }
}

/// Recency-ordered, cost-bounded store backed by an index-arena
/// doubly-linked list.
///
/// * `find` moves the entry to the most-recently-used end.
/// * An insert that pushes the total above `max_cost` compacts down to
///   `compaction_factor * max_cost`, least-recently-used first.  The entry
///   that was just written is never chosen by that pass.
/// * An entry whose own cost exceeds `max_cost` is refused, and any older
///   value under the same key is dropped with it.
pub struct LruStore<K, V, S = RandomState> {
    /// Index 0 = HEAD sentinel, 1 = TAIL sentinel, 2+ = real entries.
    nodes: Vec<LruNode<K, V>>,
    /// Maps a key to its index in `nodes`.
    map: HashMap<K, usize, S>,
    /// Indices of freed (reusable) slots.
    free_list: Vec<usize>,
    total_cost: u64,
    max_cost: u64,
    compaction_factor: f64,
}

impl<K: Hash + Eq + Clone + Send, V> LruStore<K, V> {
    /// Creates a store bounded by `max_cost` that compacts to
    /// `compaction_factor * max_cost` on overflow.
    pub fn new(max_cost: u64, compaction_factor: f64) -> Self {
        Self::with_hasher(max_cost, compaction_factor, RandomState::new())
    }
}

impl<K, V, S> LruStore<K, V, S>
where
    K: Hash + Eq + Clone + Send,
    S: BuildHasher,
{
    pub fn with_hasher(max_cost: u64, compaction_factor: f64, hasher: S) -> Self {
        assert!(max_cost > 0, "max_cost must be greater than 0");
        assert!(
            compaction_factor > 0.0 && compaction_factor <= 1.0,
            "compaction_factor must be in (0, 1]"
        );
        LruStore {
            nodes: Self::sentinels(),
            map: HashMap::with_hasher(hasher),
            free_list: Vec::new(),
            total_cost: 0,
            max_cost,
            compaction_factor,
        }
    }

    fn sentinels() -> Vec<LruNode<K, V>> {
        let mut nodes = Vec::with_capacity(16);
        nodes.push(LruNode::sentinel(NULL, TAIL));
        nodes.push(LruNode::sentinel(HEAD, NULL));
        nodes
    }

    /// Cost ceiling for a compaction to `fraction` of the budget.
    #[inline]
    fn target_cost(&self, fraction: f64) -> u64 {
        (self.max_cost as f64 * fraction).floor() as u64
    }

    /// Links `idx` immediately after the HEAD sentinel (marks it most-recently-used).
    fn link_after_head(&mut self, idx: usize) {
        let old_first = self.nodes[HEAD].next;
        self.nodes[idx].prev = HEAD;
        self.nodes[idx].next = old_first;
        self.nodes[HEAD].next = idx;
        self.nodes[old_first].prev = idx;
    }

    /// Detaches `idx` from its current position in the list.
    fn unlink(&mut self, idx: usize) {
        let prev = self.nodes[idx].prev;
        let next = self.nodes[idx].next;
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
        self.nodes[idx].prev = NULL;
        self.nodes[idx].next = NULL;
    }

    fn touch(&mut self, idx: usize) {
        if self.nodes[HEAD].next != idx {
            self.unlink(idx);
            self.link_after_head(idx);
        }
    }

    /// Allocates a new node (reusing from the free list when available).
    fn alloc_node(&mut self, key: K, value: Arc<V>, cost: u64) -> usize {
        let node = LruNode {
            key: Some(key),
            value: Some(value),
            cost,
            prev: NULL,
            next: NULL,
        };
        if let Some(idx) = self.free_list.pop() {
            self.nodes[idx] = node;
            idx
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        }
    }

    /// Unlinks `idx`, frees its slot and returns its contents.
    fn release(&mut self, idx: usize) -> Option<Evicted<K, V>> {
        self.unlink(idx);
        let key = self.nodes[idx].key.take()?;
        let value = self.nodes[idx].value.take()?;
        let cost = self.nodes[idx].cost;
        self.map.remove(&key);
        self.free_list.push(idx);
        self.total_cost -= cost;
        Some(Evicted { key, value, cost })
    }

    /// Evicts from the LRU end until `total_cost <= target`.
    ///
    /// With `spare_mru` the most-recently-used entry is left in place even
    /// if the target is not reached.
    fn evict_until(&mut self, target: u64, spare_mru: bool) -> Vec<Evicted<K, V>> {
        let mut evicted = Vec::new();
        while self.total_cost > target {
            let lru_idx = self.nodes[TAIL].prev;
            if lru_idx == HEAD || (spare_mru && lru_idx == self.nodes[HEAD].next) {
                break;
            }
            match self.release(lru_idx) {
                Some(e) => evicted.push(e),
                None => break,
            }
        }
        evicted
    }
}

impl<K, V, S> CostStore<K, V> for LruStore<K, V, S>
where
    K: Hash + Eq + Clone + Send,
    V: Send + Sync,
    S: BuildHasher + Send,
{
    fn insert(&mut self, key: K, value: Arc<V>, cost: u64) -> InsertOutcome<K, V> {
        if cost > self.max_cost {
            let displaced = CostStore::remove(self, &key);
            return InsertOutcome::refused(Evicted { key, value, cost }, displaced);
        }

        // `total_cost` leaves the new entry out until room has been made, so
        // the sum never exceeds `max_cost`.
        let replaced = if let Some(&idx) = self.map.get(&key) {
            self.total_cost -= self.nodes[idx].cost;
            self.nodes[idx].cost = cost;
            let old = self.nodes[idx].value.replace(value);
            self.touch(idx);
            old
        } else {
            let idx = self.alloc_node(key.clone(), value, cost);
            self.map.insert(key, idx);
            self.link_after_head(idx);
            None
        };

        let evicted = if cost > self.max_cost - self.total_cost {
            let target = self.target_cost(self.compaction_factor).saturating_sub(cost);
            self.evict_until(target, true)
        } else {
            Vec::new()
        };
        self.total_cost += cost;
        InsertOutcome::stored(replaced, evicted)
    }

    fn find(&mut self, key: &K) -> Option<Arc<V>> {
        let idx = *self.map.get(key)?;
        self.touch(idx);
        self.nodes[idx].value.clone()
    }

    fn remove(&mut self, key: &K) -> Option<Evicted<K, V>> {
        let idx = *self.map.get(key)?;
        self.release(idx)
    }

    fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    fn compact(&mut self, fraction: f64) -> Vec<Evicted<K, V>> {
        assert!(
            fraction > 0.0 && fraction <= 1.0,
            "compaction fraction must be in (0, 1]"
        );
        self.evict_until(self.target_cost(fraction), false)
    }

    fn remove_all(&mut self) -> Vec<Evicted<K, V>> {
        let mut evicted = Vec::with_capacity(self.map.len());
        let mut idx = self.nodes[TAIL].prev;
        while idx != HEAD {
            let prev = self.nodes[idx].prev;
            let node = &mut self.nodes[idx];
            if let (Some(key), Some(value)) = (node.key.take(), node.value.take()) {
                evicted.push(Evicted {
                    key,
                    value,
                    cost: node.cost,
                });
            }
            idx = prev;
        }
        self.nodes = Self::sentinels();
        self.map.clear();
        self.free_list.clear();
        self.total_cost = 0;
        evicted
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn total_cost(&self) -> u64 {
        self.total_cost
    }

    fn max_cost(&self) -> u64 {
        self.max_cost
    }

    fn compaction_factor(&self) -> f64 {
        self.compaction_factor
    }
}
