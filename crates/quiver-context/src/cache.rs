//! Assembly cache.
//!
//! A concurrent map from [`Fingerprint`] to [`AssemblyResult`]. The map sits
//! behind an `RwLock<Arc<..>>` so [`invalidate_all`](AssemblyCache::invalidate_all)
//! can replace it in one swap; readers holding the old map finish against it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::RwLock;
use quiver_settings::CacheSettings;
use serde::Serialize;
use tracing::debug;

use crate::types::{AssemblyResult, Fingerprint};

type Entries = DashMap<Fingerprint, Arc<AssemblyResult>>;

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups that found an entry.
    pub hits: u64,
    /// Lookups that did not.
    pub misses: u64,
    /// Whole-cache invalidations.
    pub invalidations: u64,
    /// Current entry count.
    pub entries: usize,
}

/// Fingerprint-keyed memo of assembly results.
#[derive(Debug)]
pub struct AssemblyCache {
    entries: RwLock<Arc<Entries>>,
    enabled: bool,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl AssemblyCache {
    /// Create a cache from settings.
    pub fn new(settings: &CacheSettings) -> Self {
        Self {
            entries: RwLock::new(Arc::new(DashMap::new())),
            enabled: settings.enabled,
            max_entries: settings.max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    fn current(&self) -> Arc<Entries> {
        Arc::clone(&self.entries.read())
    }

    /// Cached result for `fingerprint`.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Arc<AssemblyResult>> {
        if !self.enabled {
            return None;
        }
        let found = self.current().get(fingerprint).map(|e| Arc::clone(e.value()));
        if found.is_some() {
            let _ = self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            let _ = self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Store `result` under `fingerprint`.
    ///
    /// Reaching `max_entries` clears the map first.
    pub fn put(&self, fingerprint: Fingerprint, result: Arc<AssemblyResult>) {
        if !self.enabled || self.max_entries == 0 {
            return;
        }
        let entries = self.current();
        if entries.len() >= self.max_entries && !entries.contains_key(&fingerprint) {
            debug!(entries = entries.len(), "Assembly cache full, clearing");
            entries.clear();
        }
        let _ = entries.insert(fingerprint, result);
    }

    /// Drop every entry.
    pub fn invalidate_all(&self) {
        *self.entries.write() = Arc::new(DashMap::new());
        let _ = self.invalidations.fetch_add(1, Ordering::Relaxed);
        debug!("Assembly cache invalidated");
    }

    /// Number of cached results.
    pub fn len(&self) -> usize {
        self.current().len()
    }

    /// Whether the cache holds no results.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(max_entries: usize) -> AssemblyCache {
        AssemblyCache::new(&CacheSettings {
            enabled: true,
            max_entries,
        })
    }

    fn result(budget: u64) -> Arc<AssemblyResult> {
        Arc::new(AssemblyResult {
            budget,
            ..AssemblyResult::default()
        })
    }

    fn fp(s: &str) -> Fingerprint {
        Fingerprint::new(s)
    }

    #[test]
    fn get_after_put() {
        let cache = cache(8);
        assert!(cache.get(&fp("a")).is_none());
        cache.put(fp("a"), result(10));
        assert_eq!(cache.get(&fp("a")).unwrap().budget, 10);
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                invalidations: 0,
                entries: 1
            }
        );
    }

    #[test]
    fn invalidate_all_clears() {
        let cache = cache(8);
        cache.put(fp("a"), result(1));
        cache.put(fp("b"), result(2));
        assert_eq!(cache.len(), 2);
        cache.invalidate_all();
        assert!(cache.is_empty());
        assert!(cache.get(&fp("a")).is_none());
        assert_eq!(cache.stats().invalidations, 1);
    }

    #[test]
    fn bound_clears_when_full() {
        let cache = cache(2);
        cache.put(fp("a"), result(1));
        cache.put(fp("b"), result(2));
        cache.put(fp("b"), result(3));
        assert_eq!(cache.len(), 2);
        cache.put(fp("c"), result(4));
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&fp("c")).is_some());
    }

    #[test]
    fn disabled_cache_stores_nothing() {
        let cache = AssemblyCache::new(&CacheSettings {
            enabled: false,
            max_entries: 8,
        });
        cache.put(fp("a"), result(1));
        assert!(cache.get(&fp("a")).is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().misses, 0);
    }

    #[test]
    fn concurrent_puts_and_gets() {
        let cache = Arc::new(cache(1024));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let key = fp(&format!("{t}-{i}"));
                        cache.put(key.clone(), result(i));
                        assert!(cache.get(&key).is_some());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len(), 400);
        assert_eq!(cache.stats().hits, 400);
    }
}
