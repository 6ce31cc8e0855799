//! Combinator result cache.
//!
//! Dependency resolution combines the same pairs of excludes over and over
//! while walking a graph. This decorator remembers the result of each binary
//! `any_of`/`all_of` by the operands' canonical indices, skipping the
//! normalizer entirely on a repeat request.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::ExcludeError;
use crate::spec::ExcludeSpec;
use crate::types::{ArtifactName, ExcludeIndex, ModuleId};

use super::{Combinator, ExcludeFactory};

/// Combinator cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cached results.
    pub size: usize,
    /// Requests answered from the cache.
    pub hits: u64,
    /// Requests forwarded to the wrapped factory.
    pub misses: u64,
}

/// Both operand orders share one key.
type PairKey = (Combinator, ExcludeIndex, ExcludeIndex);

fn pair_key(combinator: Combinator, one: &ExcludeSpec, two: &ExcludeSpec) -> PairKey {
    let (a, b) = (one.index(), two.index());
    if a <= b {
        (combinator, a, b)
    } else {
        (combinator, b, a)
    }
}

/// Memoizing decorator for binary combinators.
#[derive(Debug)]
pub struct CachingFactory<F> {
    delegate: F,
    enabled: bool,
    results: DashMap<PairKey, ExcludeSpec>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<F: ExcludeFactory> CachingFactory<F> {
    /// Wrap `delegate`. When `enabled` is false every call is forwarded.
    pub fn new(delegate: F, enabled: bool) -> Self {
        Self {
            delegate,
            enabled,
            results: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// The wrapped factory.
    pub fn delegate(&self) -> &F {
        &self.delegate
    }

    /// Whether results are cached.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.results.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn combine(
        &self,
        combinator: Combinator,
        one: &ExcludeSpec,
        two: &ExcludeSpec,
        compute: impl FnOnce() -> ExcludeSpec,
    ) -> ExcludeSpec {
        if !self.enabled {
            return compute();
        }
        let key = pair_key(combinator, one, two);
        if let Some(hit) = self.results.get(&key).map(|entry| entry.value().clone()) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return hit;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        // Racing threads may both compute; interning makes their results
        // identical, so the second insert is a no-op in effect.
        let result = compute();
        self.results.insert(key, result.clone());
        result
    }
}

impl<F: ExcludeFactory> ExcludeFactory for CachingFactory<F> {
    fn nothing(&self) -> ExcludeSpec {
        self.delegate.nothing()
    }

    fn everything(&self) -> ExcludeSpec {
        self.delegate.everything()
    }

    fn group(&self, group: &str) -> ExcludeSpec {
        self.delegate.group(group)
    }

    fn module(&self, module: &str) -> ExcludeSpec {
        self.delegate.module(module)
    }

    fn module_id(&self, id: &ModuleId) -> ExcludeSpec {
        self.delegate.module_id(id)
    }

    fn module_set(&self, ids: BTreeSet<ModuleId>) -> ExcludeSpec {
        self.delegate.module_set(ids)
    }

    fn artifact(&self, module: &ModuleId, artifact: &ArtifactName) -> ExcludeSpec {
        self.delegate.artifact(module, artifact)
    }

    fn ivy_pattern_exclude(
        &self,
        module: &ModuleId,
        artifact: Option<&ArtifactName>,
        matcher: &str,
    ) -> Result<ExcludeSpec, ExcludeError> {
        self.delegate.ivy_pattern_exclude(module, artifact, matcher)
    }

    fn any_of(&self, one: &ExcludeSpec, two: &ExcludeSpec) -> ExcludeSpec {
        self.combine(Combinator::AnyOf, one, two, || self.delegate.any_of(one, two))
    }

    fn all_of(&self, one: &ExcludeSpec, two: &ExcludeSpec) -> ExcludeSpec {
        self.combine(Combinator::AllOf, one, two, || self.delegate.all_of(one, two))
    }

    fn any_of_list(&self, specs: &[ExcludeSpec]) -> ExcludeSpec {
        match specs {
            [one, two] => self.any_of(one, two),
            _ => self.delegate.any_of_list(specs),
        }
    }

    fn all_of_list(&self, specs: &[ExcludeSpec]) -> ExcludeSpec {
        match specs {
            [one, two] => self.all_of(one, two),
            _ => self.delegate.all_of_list(specs),
        }
    }
}
