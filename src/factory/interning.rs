//! Interning factory.
//!
//! Guarantees that every distinct predicate is constructed, indexed and
//! registered exactly once per session. Each leaf or composite kind has its
//! own lookup table keyed by the kind's defining parameters; composite keys
//! are the *set* of child indices, so request order never matters.
//!
//! ## Registration protocol
//!
//! 1. Fast path: a shared `DashMap` read. Hits never block one another.
//! 2. Miss: a compute-once slot (`Arc<OnceLock<_>>`) is reserved for the key
//!    under the shard lock, which is released immediately.
//! 3. The first thread to reach the slot registers the spec (index
//!    reservation, construction and append under the registry write lock)
//!    and publishes it. Racing threads wait on the slot and receive the
//!    winner's instance.

use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::composite::CompositeExclude;
use crate::error::ExcludeError;
use crate::matcher::MatcherRegistry;
use crate::optimize;
use crate::query_cache::{QueryCache, QueryCacheConfig};
use crate::registry::Registry;
use crate::spec::ExcludeSpec;
use crate::types::{ArtifactName, ChildSet, ExcludeIndex, ExcludeLeaf, IvyPatternExclude, ModuleId};

use super::{Combinator, ExcludeFactory};

/// Interning lookup statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterningStats {
    /// Requests answered with an existing instance.
    pub hits: u64,
    /// Requests that registered a new instance.
    pub misses: u64,
}

impl InterningStats {
    /// Fraction of requests answered from the lookup tables.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// One lookup table, from a kind's defining key to its interned spec.
struct Indexer<K: Hash + Eq> {
    slots: DashMap<K, Arc<OnceLock<ExcludeSpec>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K: Hash + Eq + Clone> Indexer<K> {
    fn new() -> Self {
        Self {
            slots: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Already-published spec for `key`, if any.
    fn get<Q>(&self, key: &Q) -> Option<ExcludeSpec>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hit = self.slots.get(key).and_then(|slot| slot.value().get().cloned());
        if hit.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    /// Return the spec for `key`, registering it with `build` on a miss.
    fn intern<Q>(
        &self,
        key: &Q,
        registry: &Registry,
        build: impl FnOnce(ExcludeIndex) -> ExcludeSpec,
    ) -> ExcludeSpec
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        if let Some(spec) = self.get(key) {
            return spec;
        }
        // The shard guard is dropped at the end of this statement, before
        // anything is registered.
        let slot = self.slots.entry(key.to_owned()).or_default().value().clone();

        let mut registered = false;
        let spec = slot
            .get_or_init(|| {
                registered = true;
                registry.register(build)
            })
            .clone();
        if registered {
            self.misses.fetch_add(1, Ordering::Relaxed);
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        spec
    }

    fn stats(&self) -> InterningStats {
        InterningStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct IvyPatternKey {
    module: ModuleId,
    artifact: Option<ArtifactName>,
    matcher: String,
}

/// Raw construction with canonical interning.
///
/// Binary combinators apply the pairwise optimizer before building a
/// composite; list combinators build exactly what they are given.
pub struct InterningFactory {
    registry: Arc<Registry>,
    matchers: MatcherRegistry,
    query_cache: QueryCacheConfig,
    groups: Indexer<String>,
    modules: Indexer<String>,
    module_ids: Indexer<ModuleId>,
    module_sets: Indexer<BTreeSet<ModuleId>>,
    artifacts: Indexer<(ModuleId, ArtifactName)>,
    ivy_patterns: Indexer<IvyPatternKey>,
    any_of: Indexer<ChildSet>,
    all_of: Indexer<ChildSet>,
}

impl InterningFactory {
    /// Create an interning factory registering into `registry`.
    ///
    /// Composite nodes built by this factory get a query cache configured
    /// by `query_cache`.
    pub fn new(registry: Arc<Registry>, matchers: MatcherRegistry, query_cache: QueryCacheConfig) -> Self {
        Self {
            registry,
            matchers,
            query_cache,
            groups: Indexer::new(),
            modules: Indexer::new(),
            module_ids: Indexer::new(),
            module_sets: Indexer::new(),
            artifacts: Indexer::new(),
            ivy_patterns: Indexer::new(),
            any_of: Indexer::new(),
            all_of: Indexer::new(),
        }
    }

    /// Registry this factory interns into.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Matchers available to pattern excludes.
    pub fn matchers(&self) -> &MatcherRegistry {
        &self.matchers
    }

    /// Lookup statistics summed over every kind.
    pub fn stats(&self) -> InterningStats {
        [
            self.groups.stats(),
            self.modules.stats(),
            self.module_ids.stats(),
            self.module_sets.stats(),
            self.artifacts.stats(),
            self.ivy_patterns.stats(),
            self.any_of.stats(),
            self.all_of.stats(),
        ]
        .into_iter()
        .fold(InterningStats::default(), |total, stats| InterningStats {
            hits: total.hits + stats.hits,
            misses: total.misses + stats.misses,
        })
    }

    fn intern_leaf<K, Q>(&self, indexer: &Indexer<K>, key: &Q, leaf: impl FnOnce() -> ExcludeLeaf) -> ExcludeSpec
    where
        K: Hash + Eq + Clone + Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        let session = self.registry.session();
        indexer.intern(key, &self.registry, |index| ExcludeSpec::leaf(index, session, leaf()))
    }

    fn composite(&self, combinator: Combinator, specs: &[ExcludeSpec]) -> ExcludeSpec {
        for spec in specs {
            self.registry.assert_owns(spec);
        }
        let children = ChildSet::from_indices(specs.iter().map(ExcludeSpec::index));
        if let Some(only) = children.single() {
            return self.registry.get(only);
        }
        let indexer = match combinator {
            Combinator::AnyOf if children.len() == 0 => return self.registry.nothing(),
            Combinator::AllOf if children.len() == 0 => return self.registry.everything(),
            Combinator::AnyOf => &self.any_of,
            Combinator::AllOf => &self.all_of,
        };
        if let Some(spec) = indexer.get(&children) {
            return spec;
        }

        // Computed before registering: children resolve through the registry,
        // which is write-locked while the node is built.
        let may_exclude_artifacts = match combinator {
            Combinator::AnyOf => specs.iter().any(ExcludeSpec::may_exclude_artifacts),
            Combinator::AllOf => specs.iter().all(ExcludeSpec::may_exclude_artifacts),
        };
        let session = self.registry.session();
        indexer.intern(&children, &self.registry, |index| {
            let node = CompositeExclude::new(
                children.clone(),
                &self.registry,
                may_exclude_artifacts,
                QueryCache::new(&self.query_cache),
            );
            match combinator {
                Combinator::AnyOf => ExcludeSpec::any_of(index, session, node),
                Combinator::AllOf => ExcludeSpec::all_of(index, session, node),
            }
        })
    }
}

impl ExcludeFactory for InterningFactory {
    fn nothing(&self) -> ExcludeSpec {
        self.registry.nothing()
    }

    fn everything(&self) -> ExcludeSpec {
        self.registry.everything()
    }

    fn group(&self, group: &str) -> ExcludeSpec {
        self.intern_leaf(&self.groups, group, || ExcludeLeaf::Group(group.to_string()))
    }

    fn module(&self, module: &str) -> ExcludeSpec {
        self.intern_leaf(&self.modules, module, || ExcludeLeaf::Module(module.to_string()))
    }

    fn module_id(&self, id: &ModuleId) -> ExcludeSpec {
        self.intern_leaf(&self.module_ids, id, || ExcludeLeaf::ModuleId(id.clone()))
    }

    fn module_set(&self, ids: BTreeSet<ModuleId>) -> ExcludeSpec {
        self.intern_leaf(&self.module_sets, &ids, || ExcludeLeaf::ModuleIdSet(ids.clone()))
    }

    fn artifact(&self, module: &ModuleId, artifact: &ArtifactName) -> ExcludeSpec {
        let key = (module.clone(), artifact.clone());
        self.intern_leaf(&self.artifacts, &key, || ExcludeLeaf::Artifact {
            module: module.clone(),
            artifact: artifact.clone(),
        })
    }

    fn ivy_pattern_exclude(
        &self,
        module: &ModuleId,
        artifact: Option<&ArtifactName>,
        matcher: &str,
    ) -> Result<ExcludeSpec, ExcludeError> {
        let key = IvyPatternKey {
            module: module.clone(),
            artifact: artifact.cloned(),
            matcher: matcher.to_string(),
        };
        if let Some(spec) = self.ivy_patterns.get(&key) {
            return Ok(spec);
        }
        // Compiled before any index is reserved, so a rejected pattern
        // leaves the registry untouched.
        let pattern = IvyPatternExclude::compile(&self.matchers, module.clone(), artifact.cloned(), matcher)?;
        Ok(self.intern_leaf(&self.ivy_patterns, &key, || ExcludeLeaf::IvyPattern(pattern)))
    }

    fn any_of(&self, one: &ExcludeSpec, two: &ExcludeSpec) -> ExcludeSpec {
        self.registry.assert_owns(one);
        self.registry.assert_owns(two);
        match optimize::union_pair(one, two) {
            Some(spec) => spec,
            None => self.composite(Combinator::AnyOf, &[one.clone(), two.clone()]),
        }
    }

    fn all_of(&self, one: &ExcludeSpec, two: &ExcludeSpec) -> ExcludeSpec {
        self.registry.assert_owns(one);
        self.registry.assert_owns(two);
        match optimize::intersection_pair(one, two) {
            Some(spec) => spec,
            None => self.composite(Combinator::AllOf, &[one.clone(), two.clone()]),
        }
    }

    fn any_of_list(&self, specs: &[ExcludeSpec]) -> ExcludeSpec {
        self.composite(Combinator::AnyOf, specs)
    }

    fn all_of_list(&self, specs: &[ExcludeSpec]) -> ExcludeSpec {
        self.composite(Combinator::AllOf, specs)
    }
}

impl std::fmt::Debug for InterningFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterningFactory")
            .field("registry", &self.registry)
            .field("matchers", &self.matchers)
            .field("stats", &self.stats())
            .finish()
    }
}
