//! Indexed composite nodes (`AnyOf` / `AllOf`).
//!
//! A composite stores its children as a set of canonical indices plus a weak
//! back-reference to the registry, never as direct references. Children are
//! resolved through the registry on the first iteration and kept for the
//! life of the node, so later iterations never touch the registry lock.
//! Module-level evaluation results are memoized per node.

use std::iter::FusedIterator;
use std::sync::{Arc, OnceLock, Weak};

use crate::query_cache::QueryCache;
use crate::registry::{Registry, SessionId};
use crate::spec::ExcludeSpec;
use crate::types::{ChildSet, ExcludeIndex, ModuleId};

/// Children and query cache of an `AnyOf` or `AllOf` node.
pub struct CompositeExclude {
    children: ChildSet,
    session: SessionId,
    registry: Weak<Registry>,
    resolved: OnceLock<Box<[ExcludeSpec]>>,
    may_exclude_artifacts: bool,
    cache: QueryCache,
}

impl CompositeExclude {
    pub(crate) fn new(
        children: ChildSet,
        registry: &Arc<Registry>,
        may_exclude_artifacts: bool,
        cache: QueryCache,
    ) -> Self {
        Self {
            children,
            session: registry.session(),
            registry: Arc::downgrade(registry),
            resolved: OnceLock::new(),
            may_exclude_artifacts,
            cache,
        }
    }

    /// Number of children.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Always false for an interned composite, which has at least two children.
    pub fn is_empty(&self) -> bool {
        self.children.len() == 0
    }

    /// Children in canonical index order.
    ///
    /// Each call starts a fresh iteration.
    ///
    /// # Panics
    /// Panics if the owning session has been dropped.
    pub fn components(&self) -> Components<'_> {
        if self.registry.strong_count() == 0 {
            self.dropped();
        }
        let resolved = self.resolved.get_or_init(|| {
            let registry = self.registry();
            self.children.as_slice().iter().map(|&index| registry.get(index)).collect()
        });
        Components {
            specs: resolved.iter(),
        }
    }

    /// O(1) membership test.
    ///
    /// # Panics
    /// Panics if `spec` was interned by a different session.
    pub fn contains(&self, spec: &ExcludeSpec) -> bool {
        assert!(
            spec.session() == self.session,
            "membership test with exclude spec {} from session {}",
            spec.index(),
            spec.session()
        );
        self.children.contains(spec.index())
    }

    /// Number of modules with a memoized result.
    pub fn cached_results(&self) -> usize {
        self.cache.len()
    }

    pub(crate) fn child_indices(&self) -> &[ExcludeIndex] {
        self.children.as_slice()
    }

    pub(crate) fn may_exclude_artifacts(&self) -> bool {
        self.may_exclude_artifacts
    }

    pub(crate) fn memoized(&self, module: &ModuleId, compute: impl FnOnce() -> bool) -> bool {
        self.cache.get_or_compute(module, compute)
    }

    /// Ordered, pairwise comparison of the two component sequences.
    pub(crate) fn components_equal_ignore_artifact(&self, other: &CompositeExclude) -> bool {
        if self.children == other.children {
            return true;
        }
        if self.len() != other.len() {
            return false;
        }
        self.components()
            .zip(other.components())
            .all(|(mine, theirs)| theirs.equals_ignore_artifact(&mine))
    }

    fn registry(&self) -> Arc<Registry> {
        match self.registry.upgrade() {
            Some(registry) => registry,
            None => self.dropped(),
        }
    }

    fn dropped(&self) -> ! {
        panic!("exclude session {} was dropped while its specs were still in use", self.session)
    }
}

impl std::fmt::Debug for CompositeExclude {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeExclude")
            .field("children", &self.children)
            .field("may_exclude_artifacts", &self.may_exclude_artifacts)
            .field("cache", &self.cache)
            .finish()
    }
}

/// Iterator over a composite's children.
pub struct Components<'a> {
    specs: std::slice::Iter<'a, ExcludeSpec>,
}

impl Iterator for Components<'_> {
    type Item = ExcludeSpec;

    fn next(&mut self) -> Option<Self::Item> {
        self.specs.next().cloned()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.specs.size_hint()
    }
}

impl ExactSizeIterator for Components<'_> {}

impl FusedIterator for Components<'_> {}
