//! Injectable clock and the rolling-idle map used by both registries.
//!
//! Eviction is driven by explicit `sweep` calls rather than per-entry wall
//! clock timers, so tests can advance a `ManualClock` and assert exactly
//! when an entry disappears.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock, used outside tests.
#[derive(Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Test clock: starts at construction time and only moves when advanced.
#[derive(Clone)]
pub struct ManualClock {
    start: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + *self.offset.lock().unwrap()
    }
}

struct Slot<V> {
    value: V,
    last_used: Instant,
}

/// Map with a rolling idle timeout per entry.
///
/// Every successful `get` (and every insert) refreshes the entry's timer;
/// `sweep` removes and returns entries idle for at least the ttl so the
/// caller can dispose of them. Entries are handed out by clone, so values
/// are typically `Arc`s.
pub struct IdleMap<K, V> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<K, Slot<V>>>,
}

impl<K: Eq + Hash + Clone, V: Clone> IdleMap<K, V> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up an entry, refreshing its idle timer on hit.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().unwrap();
        let slot = entries.get_mut(key)?;
        slot.last_used = self.clock.now();
        Some(slot.value.clone())
    }

    pub fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key,
            Slot {
                value,
                last_used: self.clock.now(),
            },
        );
    }

    pub fn get_or_insert_with(&self, key: &K, make: impl FnOnce() -> V) -> V {
        let mut entries = self.entries.lock().unwrap();
        let now = self.clock.now();
        let slot = entries.entry(key.clone()).or_insert_with(|| Slot {
            value: make(),
            last_used: now,
        });
        slot.last_used = now;
        slot.value.clone()
    }

    /// Remove an entry without waiting for eviction.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.lock().unwrap().remove(key).map(|s| s.value)
    }

    /// Remove and return every entry idle for at least the ttl.
    pub fn sweep(&self) -> Vec<(K, V)> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap();
        let expired: Vec<K> = entries
            .iter()
            .filter(|(_, slot)| now.duration_since(slot.last_used) >= self.ttl)
            .map(|(k, _)| k.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|k| entries.remove(&k).map(|s| (k, s.value)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}
