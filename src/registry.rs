//! Append-only registry of interned exclude specs.
//!
//! The registry is the arena behind one resolution session. It maps every
//! canonical [`ExcludeIndex`] to its spec, never shrinks and never reuses an
//! index. Composite nodes hold a weak back-reference to it and resolve their
//! children through [`Registry::get`].
//!
//! ## Concurrency
//!
//! - Registration is serialized by a write lock that covers index
//!   reservation, construction and append.
//! - Lookups take a shared lock only for the duration of one index read.
//! - Composites resolve their children here once and keep them, so
//!   evaluating an interned spec never waits on a registration.

use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::spec::ExcludeSpec;
use crate::types::{ExcludeIndex, ExcludeLeaf};

/// Identifier of the session that owns a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub(crate) fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The arena of interned specs for one session.
pub struct Registry {
    session: SessionId,
    entries: RwLock<Vec<ExcludeSpec>>,
}

impl Registry {
    /// Create a registry holding the two reserved specs.
    ///
    /// `capacity` pre-sizes the arena; it is not a limit.
    pub fn new(capacity: usize) -> Arc<Self> {
        let session = SessionId::random();
        let registry = Arc::new(Self {
            session,
            entries: RwLock::new(Vec::with_capacity(capacity.max(2))),
        });
        let nothing = registry.register(|index| ExcludeSpec::leaf(index, session, ExcludeLeaf::Nothing));
        let everything = registry.register(|index| ExcludeSpec::leaf(index, session, ExcludeLeaf::Everything));
        debug_assert_eq!(nothing.index(), ExcludeIndex::NOTHING);
        debug_assert_eq!(everything.index(), ExcludeIndex::EVERYTHING);
        registry
    }

    /// Session that owns this registry.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Reserve the next index, build the spec for it, and append it.
    ///
    /// `build` runs under the registry write lock and must not call back
    /// into the registry.
    pub(crate) fn register(&self, build: impl FnOnce(ExcludeIndex) -> ExcludeSpec) -> ExcludeSpec {
        let mut entries = self.entries.write();
        let raw = u32::try_from(entries.len())
            .unwrap_or_else(|_| panic!("exclude registry exhausted the index space"));
        let index = ExcludeIndex::new(raw);
        let spec = build(index);
        assert_eq!(spec.index(), index, "spec built with a foreign index");
        entries.push(spec.clone());
        drop(entries);

        tracing::trace!(session = %self.session, index = %index, kind = %spec.kind(), "interned exclude spec");
        spec
    }

    /// Resolve an index issued by this registry.
    ///
    /// # Panics
    /// Panics if the index was never issued by this registry.
    pub fn get(&self, index: ExcludeIndex) -> ExcludeSpec {
        match self.entries.read().get(index.as_usize()) {
            Some(spec) => spec.clone(),
            None => panic!("index {} was not issued by registry of session {}", index, self.session),
        }
    }

    /// The spec that excludes nothing.
    pub fn nothing(&self) -> ExcludeSpec {
        self.get(ExcludeIndex::NOTHING)
    }

    /// The spec that excludes everything.
    pub fn everything(&self) -> ExcludeSpec {
        self.get(ExcludeIndex::EVERYTHING)
    }

    /// Number of registered specs, including the two reserved ones.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Always false: the reserved specs are registered at construction.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Snapshot of all registered specs, in index order.
    pub fn entries(&self) -> Vec<ExcludeSpec> {
        self.entries.read().clone()
    }

    /// Panic unless `spec` was interned by this registry.
    #[inline]
    pub(crate) fn assert_owns(&self, spec: &ExcludeSpec) {
        assert!(
            spec.session() == self.session,
            "exclude spec {} belongs to session {}, not {}",
            spec.index(),
            spec.session(),
            self.session
        );
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("session", &self.session)
            .field("len", &self.len())
            .finish()
    }
}
