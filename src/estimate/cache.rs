//! Bounded count cache
//!
//! Entries are never evicted one by one: once the cache is full, the next
//! new key clears it wholesale. Concurrent inserts racing the clear may
//! leave it a few entries over capacity until the next overflow.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::observability::{log_event_with_fields, Event};

/// Default number of cached counts
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Storage for selectivity counts, shared by concurrently compiling queries
pub trait EstimateCache: Send + Sync {
    fn get(&self, key: &str) -> Option<u64>;
    fn insert(&self, key: String, count: u64);
    fn clear(&self);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cache counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub clears: u64,
    pub entries: usize,
}

/// `DashMap`-backed cache with clear-on-overflow
#[derive(Debug)]
pub struct SharedCountCache {
    entries: DashMap<String, u64>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    clears: AtomicU64,
}

impl Default for SharedCountCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl SharedCountCache {
    /// A cache holding at most `capacity` counts (at least one)
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            clears: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            clears: self.clears.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}

impl EstimateCache for SharedCountCache {
    fn get(&self, key: &str) -> Option<u64> {
        match self.entries.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(*entry)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn insert(&self, key: String, count: u64) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.clear();
            let capacity = self.capacity.to_string();
            log_event_with_fields(Event::EstimateCacheCleared, &[("capacity", capacity.as_str())]);
        }
        self.entries.insert(key, count);
    }

    fn clear(&self) {
        self.entries.clear();
        self.clears.fetch_add(1, Ordering::Relaxed);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_hit_and_miss() {
        let cache = SharedCountCache::new(4);
        assert_eq!(cache.get("a"), None);
        cache.insert("a".into(), 7);
        assert_eq!(cache.get("a"), Some(7));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
    }

    #[test]
    fn test_clears_wholesale_on_overflow() {
        let cache = SharedCountCache::new(2);
        cache.insert("a".into(), 1);
        cache.insert("b".into(), 2);
        cache.insert("a".into(), 3);
        assert_eq!(cache.len(), 2);

        cache.insert("c".into(), 4);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("c"), Some(4));
        assert_eq!(cache.stats().clears, 1);
    }

    #[test]
    fn test_concurrent_inserts_stay_near_capacity() {
        let cache = Arc::new(SharedCountCache::new(50));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..200 {
                        cache.insert(format!("{}-{}", t, i), i);
                        cache.get(&format!("{}-{}", t, i / 2));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= 50 + 4);
        assert!(cache.stats().clears > 0);
    }
}
