//! LRU cache mapping normalized chunk text to its content hash
//!
//! Structurally a scaled-down cousin of an embedding cache: instead of
//! caching vectors keyed by bytes, it caches `u32` hashes keyed by entry
//! count, since a hash is four bytes and the expensive part is the
//! normalization + hash computation, not the storage.

use std::collections::HashMap;
use std::sync::Mutex;

use once_cell::sync::Lazy;

use crate::types::ContentHash;

/// Default capacity for `GLOBAL_HASH_CACHE`.
pub const DEFAULT_CAPACITY: usize = 10_000;

struct LruNode {
    hash: ContentHash,
    prev: Option<String>,
    next: Option<String>,
}

struct CacheState {
    entries: HashMap<String, LruNode>,
    head: Option<String>,
    tail: Option<String>,
}

impl CacheState {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            head: None,
            tail: None,
        }
    }

    fn move_to_front(&mut self, key: &str) {
        if self.head.as_deref() == Some(key) {
            return;
        }

        if let Some(node) = self.entries.get(key) {
            let prev = node.prev.clone();
            let next = node.next.clone();

            if let Some(ref prev_key) = prev {
                if let Some(prev_node) = self.entries.get_mut(prev_key) {
                    prev_node.next = next.clone();
                }
            }
            if let Some(ref next_key) = next {
                if let Some(next_node) = self.entries.get_mut(next_key) {
                    next_node.prev = prev.clone();
                }
            }
            if self.tail.as_deref() == Some(key) {
                self.tail = prev;
            }
        }

        if let Some(node) = self.entries.get_mut(key) {
            node.prev = None;
            node.next = self.head.clone();
        }

        if let Some(ref old_head) = self.head {
            if let Some(head_node) = self.entries.get_mut(old_head) {
                head_node.prev = Some(key.to_string());
            }
        }

        self.head = Some(key.to_string());
        if self.tail.is_none() {
            self.tail = self.head.clone();
        }
    }

    fn evict_lru(&mut self) {
        let Some(tail_key) = self.tail.take() else {
            return;
        };

        if let Some(node) = self.entries.remove(&tail_key) {
            self.tail = node.prev.clone();
            if let Some(ref new_tail_key) = self.tail {
                if let Some(new_tail) = self.entries.get_mut(new_tail_key) {
                    new_tail.next = None;
                }
            }
            if self.head.as_deref() == Some(&tail_key) {
                self.head = None;
            }
        }
    }
}

/// Thread-safe LRU cache from normalized text to content hash.
pub struct HashCache {
    state: Mutex<CacheState>,
    capacity: usize,
}

impl HashCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(CacheState::new()),
            capacity,
        }
    }

    pub fn get(&self, key: &str) -> Option<ContentHash> {
        let mut state = self.state.lock().unwrap();
        if state.entries.contains_key(key) {
            state.move_to_front(key);
            state.entries.get(key).map(|n| n.hash)
        } else {
            None
        }
    }

    pub fn put(&self, key: String, hash: ContentHash) {
        let mut state = self.state.lock().unwrap();

        if let Some(old) = state.entries.remove(&key) {
            if let Some(ref prev_key) = old.prev {
                if let Some(prev_node) = state.entries.get_mut(prev_key) {
                    prev_node.next = old.next.clone();
                }
            }
            if let Some(ref next_key) = old.next {
                if let Some(next_node) = state.entries.get_mut(next_key) {
                    next_node.prev = old.prev.clone();
                }
            }
            if state.head.as_deref() == Some(&key) {
                state.head = old.next.clone();
            }
            if state.tail.as_deref() == Some(&key) {
                state.tail = old.prev.clone();
            }
        }

        while state.entries.len() >= self.capacity {
            state.evict_lru();
        }

        let old_head = state.head.clone();
        if let Some(ref old_head_key) = old_head {
            if let Some(head_node) = state.entries.get_mut(old_head_key) {
                head_node.prev = Some(key.clone());
            }
        }

        state.entries.insert(
            key.clone(),
            LruNode {
                hash,
                prev: None,
                next: old_head,
            },
        );
        state.head = Some(key);
        if state.tail.is_none() {
            state.tail = state.head.clone();
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.entries.clear();
        state.head = None;
        state.tail = None;
    }
}

impl Default for HashCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Process-wide singleton. Tests that care about isolation call
/// `reset_global_cache` rather than constructing their own `HashCache`.
pub static GLOBAL_HASH_CACHE: Lazy<HashCache> = Lazy::new(HashCache::default);

/// Reset the global cache. Intended for test isolation only.
pub fn reset_global_cache() {
    GLOBAL_HASH_CACHE.clear();
}
