//! # Eviction Policy
//!
//! Decouples recency tracking from the key/value map so alternative
//! policies (LFU, random) can be dropped in without touching the map
//! implementation.
//!
//! ## Design
//!
//! `LruPolicy` uses the same index-based intrusive list the map shards use
//! for node storage: a dense arena of nodes linked by index instead of
//! pointer, plus a free-list for slot reuse. The policy owns its own lock so
//! the map never holds two locks at once to make a single decision.

use parking_lot::Mutex;
use std::collections::HashMap;

/// Capability surface eviction policies must provide.
///
/// The map calls these without holding its own lock; every method here must
/// be safe to call concurrently with itself.
pub trait EvictionPolicy: Send + Sync {
    /// Marks `key` as most-recently-used. Called on every read hit.
    fn record_access(&self, key: &[u8]);

    /// Marks `key` as most-recently-used, tracking it if new. Called on put.
    fn record_put(&self, key: &[u8]);

    /// Stops tracking `key`. Called on delete, rename, and eviction.
    fn record_remove(&self, key: &[u8]);

    /// If `current_size` exceeds capacity, evicts and returns the least
    /// recently used tracked key. Returns `None` if under capacity or if no
    /// keys are tracked.
    fn evict_if_needed(&self, current_size: usize) -> Option<Box<[u8]>>;

    /// The configured capacity (clamped to at least 1).
    fn capacity(&self) -> usize;

    /// Stops tracking every key. Called on `FLUSHALL`.
    fn clear(&self);
}

#[derive(Debug)]
struct Node {
    key: Box<[u8]>,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug)]
struct LruState {
    index: HashMap<Box<[u8]>, usize>,
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl LruState {
    fn new() -> Self {
        LruState {
            index: HashMap::new(),
            nodes: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
        }
    }

    fn lru_remove(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.nodes[idx].as_ref().expect("node exists");
            (node.prev, node.next)
        };

        if let Some(prev_idx) = prev {
            if let Some(prev_node) = self.nodes[prev_idx].as_mut() {
                prev_node.next = next;
            }
        } else {
            self.head = next;
        }

        if let Some(next_idx) = next {
            if let Some(next_node) = self.nodes[next_idx].as_mut() {
                next_node.prev = prev;
            }
        } else {
            self.tail = prev;
        }

        if let Some(node) = self.nodes[idx].as_mut() {
            node.prev = None;
            node.next = None;
        }
    }

    fn lru_push_back(&mut self, idx: usize) {
        let tail = self.tail;
        if let Some(node) = self.nodes[idx].as_mut() {
            node.prev = tail;
            node.next = None;
        }

        if let Some(tail_idx) = tail {
            if let Some(tail_node) = self.nodes[tail_idx].as_mut() {
                tail_node.next = Some(idx);
            }
        } else {
            self.head = Some(idx);
        }

        self.tail = Some(idx);
    }

    fn touch(&mut self, idx: usize) {
        if self.tail == Some(idx) {
            return;
        }
        self.lru_remove(idx);
        self.lru_push_back(idx);
    }

    fn insert_new(&mut self, key: Box<[u8]>) {
        let idx = self.free.pop().unwrap_or_else(|| {
            self.nodes.push(None);
            self.nodes.len() - 1
        });

        self.nodes[idx] = Some(Node {
            key: key.clone(),
            prev: None,
            next: None,
        });
        self.lru_push_back(idx);
        self.index.insert(key, idx);
    }

    fn remove_key(&mut self, key: &[u8]) {
        if let Some(idx) = self.index.remove(key) {
            self.lru_remove(idx);
            self.nodes[idx] = None;
            self.free.push(idx);
        }
    }

    fn pop_lru(&mut self) -> Option<Box<[u8]>> {
        let idx = self.head?;
        let key = self.nodes[idx].as_ref()?.key.clone();
        self.remove_key(&key);
        Some(key)
    }
}

/// Least-recently-used eviction policy with O(1) touch and O(1) victim pop.
pub struct LruPolicy {
    capacity: usize,
    state: Mutex<LruState>,
}

impl LruPolicy {
    pub fn new(capacity: usize) -> Self {
        LruPolicy {
            capacity: capacity.max(1),
            state: Mutex::new(LruState::new()),
        }
    }
}

impl EvictionPolicy for LruPolicy {
    fn record_access(&self, key: &[u8]) {
        let mut state = self.state.lock();
        if let Some(&idx) = state.index.get(key) {
            state.touch(idx);
        }
    }

    fn record_put(&self, key: &[u8]) {
        let mut state = self.state.lock();
        if let Some(&idx) = state.index.get(key) {
            state.touch(idx);
        } else {
            state.insert_new(key.into());
        }
    }

    fn record_remove(&self, key: &[u8]) {
        self.state.lock().remove_key(key);
    }

    fn evict_if_needed(&self, current_size: usize) -> Option<Box<[u8]>> {
        if current_size <= self.capacity {
            return None;
        }
        self.state.lock().pop_lru()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn clear(&self) {
        *self.state.lock() = LruState::new();
    }
}
