//! Per-node memoization of module exclusion results.
//!
//! Every composite node owns one cache mapping a module coordinate to the
//! result of `excludes_module`. Specs are immutable once interned, so an
//! entry never needs invalidation.
//!
//! ## Modes
//!
//! | Mode | Storage | Notes |
//! |------|---------|-------|
//! | Unbounded (default) | `DashMap` of once-slots | Computed at most once per module, outside the shard lock |
//! | Bounded | LRU behind a `Mutex` | Evicted entries are recomputed on demand |
//! | Disabled | none | Every query re-evaluates the children |
//!
//! A one-shot build session sees a bounded number of distinct modules, so
//! the unbounded map is the default. Long-lived hosts should set
//! `max_entries`.

use std::num::NonZeroUsize;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::ModuleId;

/// Configuration for the per-node query cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryCacheConfig {
    /// Whether composite nodes memoize module results at all.
    pub enabled: bool,
    /// Maximum entries per node. `None` means unbounded.
    pub max_entries: Option<usize>,
}

impl Default for QueryCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: None,
        }
    }
}

impl QueryCacheConfig {
    /// Unbounded cache (the default).
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// LRU-bounded cache holding at most `max_entries` modules per node.
    pub fn bounded(max_entries: usize) -> Self {
        Self {
            enabled: true,
            max_entries: Some(max_entries),
        }
    }

    /// No memoization.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            max_entries: None,
        }
    }
}

pub(crate) enum QueryCache {
    Disabled,
    Unbounded(DashMap<ModuleId, Arc<OnceLock<bool>>>),
    Bounded(Mutex<LruCache<ModuleId, bool>>),
}

impl QueryCache {
    pub(crate) fn new(config: &QueryCacheConfig) -> Self {
        if !config.enabled {
            return Self::Disabled;
        }
        match config.max_entries {
            None => Self::Unbounded(DashMap::new()),
            Some(max) => match NonZeroUsize::new(max) {
                Some(cap) => Self::Bounded(Mutex::new(LruCache::new(cap))),
                None => Self::Disabled,
            },
        }
    }

    /// Return the cached result for `module`, computing it on a miss.
    pub(crate) fn get_or_compute(&self, module: &ModuleId, compute: impl FnOnce() -> bool) -> bool {
        match self {
            Self::Disabled => compute(),
            Self::Unbounded(map) => {
                if let Some(hit) = map.get(module).and_then(|slot| slot.value().get().copied()) {
                    return hit;
                }
                // The shard guard is released before computing; only threads
                // asking for this same module wait on the slot.
                let slot = map.entry(module.clone()).or_default().value().clone();
                *slot.get_or_init(compute)
            }
            Self::Bounded(lru) => {
                if let Some(&hit) = lru.lock().get(module) {
                    return hit;
                }
                let result = compute();
                lru.lock().put(module.clone(), result);
                result
            }
        }
    }

    /// Number of resident entries.
    pub(crate) fn len(&self) -> usize {
        match self {
            Self::Disabled => 0,
            Self::Unbounded(map) => map.len(),
            Self::Bounded(lru) => lru.lock().len(),
        }
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self {
            Self::Disabled => "disabled",
            Self::Unbounded(_) => "unbounded",
            Self::Bounded(_) => "bounded",
        };
        f.debug_struct("QueryCache")
            .field("mode", &mode)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn id(n: u32) -> ModuleId {
        ModuleId::new("g", format!("m{}", n))
    }

    #[test]
    fn test_unbounded_computes_once() {
        let cache = QueryCache::new(&QueryCacheConfig::default());
        let calls = Cell::new(0);

        for _ in 0..5 {
            let result = cache.get_or_compute(&id(1), || {
                calls.set(calls.get() + 1);
                true
            });
            assert!(result);
        }

        assert_eq!(calls.get(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cached_reads_proceed_during_computation() {
        let cache = QueryCache::new(&QueryCacheConfig::default());
        cache.get_or_compute(&id(2), || true);

        // Every other module, on any shard, stays readable while a
        // computation is in flight.
        let result = cache.get_or_compute(&id(1), || {
            (0..64).all(|n| n == 1 || cache.get_or_compute(&id(n), || n % 2 == 0) == (n % 2 == 0))
        });
        assert!(result);
        assert!(cache.get_or_compute(&id(2), || false));
        assert_eq!(cache.len(), 64);
    }

    #[test]
    fn test_negative_results_are_cached() {
        let cache = QueryCache::new(&QueryCacheConfig::default());
        assert!(!cache.get_or_compute(&id(1), || false));
        // A second compute closure returning true must not be consulted.
        assert!(!cache.get_or_compute(&id(1), || true));
    }

    #[test]
    fn test_bounded_evicts_least_recently_used() {
        let cache = QueryCache::new(&QueryCacheConfig::bounded(2));
        cache.get_or_compute(&id(1), || true);
        cache.get_or_compute(&id(2), || true);
        cache.get_or_compute(&id(3), || true);
        assert_eq!(cache.len(), 2);

        // id(1) was evicted, so it is recomputed.
        let calls = Cell::new(0);
        cache.get_or_compute(&id(1), || {
            calls.set(calls.get() + 1);
            true
        });
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_disabled_always_computes() {
        let cache = QueryCache::new(&QueryCacheConfig::disabled());
        let calls = Cell::new(0);
        for _ in 0..3 {
            cache.get_or_compute(&id(1), || {
                calls.set(calls.get() + 1);
                false
            });
        }
        assert_eq!(calls.get(), 3);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_zero_capacity_disables() {
        let cache = QueryCache::new(&QueryCacheConfig::bounded(0));
        assert!(matches!(cache, QueryCache::Disabled));
    }
}
