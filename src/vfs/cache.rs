//! Read-through caches backing one `VirtualFileSystem` instance.
//!
//! Keys are populated at most once and never invalidated; stale remote
//! state stays visible until the whole filesystem instance is evicted.
//! A failed population inserts nothing, so a retried lookup can still
//! succeed. Two tasks racing on an unpopulated key may both fetch; the
//! write is idempotent and the last writer wins.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct ReadThroughCache<K, V> {
    map: Mutex<HashMap<K, V>>,
    populations: AtomicU64,
}

impl<K: Eq + Hash, V: Clone> ReadThroughCache<K, V> {
    pub fn new() -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
            populations: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.map.lock().unwrap().get(key).cloned()
    }

    /// Record a successful population. Only called with fetched values;
    /// errors never reach here.
    pub fn put(&self, key: K, value: V) {
        self.map.lock().unwrap().insert(key, value);
        self.populations.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of successful populations, for tests.
    pub fn populations(&self) -> u64 {
        self.populations.load(Ordering::Relaxed)
    }
}

impl<K: Eq + Hash, V: Clone> Default for ReadThroughCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
