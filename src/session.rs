//! Resolution sessions.
//!
//! An [`ExcludeSession`] owns the registry and the full factory chain for one
//! dependency resolution. Specs from one session must never be combined with
//! specs from another. Everything is released together when the session is
//! dropped.
//!
//! ## Usage
//!
//! ```rust
//! use exclude_kernel::{EngineConfig, ExcludeFactory, ExcludeSession, ModuleId};
//!
//! let session = ExcludeSession::new(EngineConfig::default());
//! let spec = session.all_of(
//!     &session.group("com.foo"),
//!     &session.module_id(&ModuleId::new("com.bar", "baz")),
//! );
//! assert!(!spec.excludes_module(&ModuleId::new("com.bar", "baz")));
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh64::xxh64;

use crate::config::EngineConfig;
use crate::error::ExcludeError;
use crate::factory::{CacheStats, CachingFactory, ExcludeFactory, InterningFactory, InterningStats, NormalizingFactory};
use crate::matcher::MatcherRegistry;
use crate::registry::{Registry, SessionId};
use crate::spec::ExcludeSpec;
use crate::types::{ArtifactName, ExcludeIndex, ExcludeKind, ModuleId};
use crate::EXCLUDE_KERNEL_SCHEMA_VERSION;

type FactoryChain = CachingFactory<NormalizingFactory<InterningFactory>>;

/// One resolution session: a registry plus its factory chain.
pub struct ExcludeSession {
    config: EngineConfig,
    registry: Arc<Registry>,
    factory: FactoryChain,
    started_at: DateTime<Utc>,
}

impl ExcludeSession {
    /// Start a session with the built-in Ivy matchers.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_matchers(config, MatcherRegistry::with_builtins())
    }

    /// Start a session with a custom set of matchers.
    pub fn with_matchers(config: EngineConfig, matchers: MatcherRegistry) -> Self {
        let registry = Registry::new(config.registry_capacity);
        let interning = InterningFactory::new(Arc::clone(&registry), matchers, config.query_cache.clone());
        let factory = CachingFactory::new(NormalizingFactory::new(interning), config.combinator_cache);

        tracing::debug!(
            session = %registry.session(),
            query_cache = config.query_cache.enabled,
            query_cache_max_entries = ?config.query_cache.max_entries,
            combinator_cache = config.combinator_cache,
            "Exclude session started"
        );

        Self {
            config,
            registry,
            factory,
            started_at: Utc::now(),
        }
    }

    /// Identifier of this session.
    pub fn id(&self) -> SessionId {
        self.registry.session()
    }

    /// When the session was started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Configuration the session was started with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The session's registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Resolve an index issued by this session.
    ///
    /// # Panics
    /// Panics if the index was not issued by this session.
    pub fn resolve(&self, index: ExcludeIndex) -> ExcludeSpec {
        self.registry.get(index)
    }

    /// Counters for this session.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            session_id: self.id(),
            started_at: self.started_at,
            registered: self.registry.len(),
            interning: self.factory.delegate().delegate().stats(),
            combinator_cache: self.factory.stats(),
        }
    }

    /// Describe every registered spec, in index order, with a deterministic
    /// fingerprint.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let entries: Vec<SnapshotEntry> = self
            .registry
            .entries()
            .iter()
            .map(|spec| SnapshotEntry {
                kind: spec.kind(),
                description: spec.to_string(),
            })
            .collect();
        let fingerprint = RegistrySnapshot::fingerprint_of(&entries);

        RegistrySnapshot {
            fingerprint,
            session_id: self.id(),
            schema_version: EXCLUDE_KERNEL_SCHEMA_VERSION.to_string(),
            taken_at: Utc::now(),
            entries,
        }
    }
}

impl Default for ExcludeSession {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Drop for ExcludeSession {
    fn drop(&mut self) {
        let stats = self.stats();
        tracing::debug!(
            session = %stats.session_id,
            registered = stats.registered,
            interning_hits = stats.interning.hits,
            interning_misses = stats.interning.misses,
            combinator_hits = stats.combinator_cache.hits,
            combinator_misses = stats.combinator_cache.misses,
            elapsed_ms = (Utc::now() - self.started_at).num_milliseconds(),
            "Exclude session closed"
        );
    }
}

impl std::fmt::Debug for ExcludeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExcludeSession")
            .field("id", &self.id())
            .field("started_at", &self.started_at)
            .field("config", &self.config)
            .field("registered", &self.registry.len())
            .finish()
    }
}

impl ExcludeFactory for ExcludeSession {
    fn nothing(&self) -> ExcludeSpec {
        self.factory.nothing()
    }

    fn everything(&self) -> ExcludeSpec {
        self.factory.everything()
    }

    fn group(&self, group: &str) -> ExcludeSpec {
        self.factory.group(group)
    }

    fn module(&self, module: &str) -> ExcludeSpec {
        self.factory.module(module)
    }

    fn module_id(&self, id: &ModuleId) -> ExcludeSpec {
        self.factory.module_id(id)
    }

    fn module_set(&self, ids: BTreeSet<ModuleId>) -> ExcludeSpec {
        self.factory.module_set(ids)
    }

    fn artifact(&self, module: &ModuleId, artifact: &ArtifactName) -> ExcludeSpec {
        self.factory.artifact(module, artifact)
    }

    fn ivy_pattern_exclude(
        &self,
        module: &ModuleId,
        artifact: Option<&ArtifactName>,
        matcher: &str,
    ) -> Result<ExcludeSpec, ExcludeError> {
        self.factory.ivy_pattern_exclude(module, artifact, matcher)
    }

    fn any_of(&self, one: &ExcludeSpec, two: &ExcludeSpec) -> ExcludeSpec {
        self.registry.assert_owns(one);
        self.registry.assert_owns(two);
        self.factory.any_of(one, two)
    }

    fn all_of(&self, one: &ExcludeSpec, two: &ExcludeSpec) -> ExcludeSpec {
        self.registry.assert_owns(one);
        self.registry.assert_owns(two);
        self.factory.all_of(one, two)
    }

    fn any_of_list(&self, specs: &[ExcludeSpec]) -> ExcludeSpec {
        specs.iter().for_each(|spec| self.registry.assert_owns(spec));
        self.factory.any_of_list(specs)
    }

    fn all_of_list(&self, specs: &[ExcludeSpec]) -> ExcludeSpec {
        specs.iter().for_each(|spec| self.registry.assert_owns(spec));
        self.factory.all_of_list(specs)
    }
}

/// Session counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Session identifier.
    pub session_id: SessionId,
    /// When the session was started.
    pub started_at: DateTime<Utc>,
    /// Registered specs, including the two reserved ones.
    pub registered: usize,
    /// Interning lookups.
    pub interning: InterningStats,
    /// Binary combinator cache.
    pub combinator_cache: CacheStats,
}

/// One registry entry in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Variant of the spec.
    pub kind: ExcludeKind,
    /// Human-readable form.
    pub description: String,
}

/// Diagnostic dump of a session's registry.
///
/// The fingerprint covers the schema version and the entries only, so the
/// same request sequence in two sessions yields the same fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// xxh64 of the canonical entry list.
    pub fingerprint: String,
    /// Session the snapshot was taken from.
    pub session_id: SessionId,
    /// Schema version of the snapshot format.
    pub schema_version: String,
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
    /// Entries in index order.
    pub entries: Vec<SnapshotEntry>,
}

impl RegistrySnapshot {
    /// Fingerprint of `entries` under the current schema version: the hex
    /// xxh64 of the canonical JSON of `{ schema_version, entries }`.
    pub fn fingerprint_of(entries: &[SnapshotEntry]) -> String {
        let input = FingerprintInput {
            schema_version: EXCLUDE_KERNEL_SCHEMA_VERSION,
            entries,
        };
        format!("{:016x}", xxh64(&canonical_json(&input), 0))
    }

    /// Serialize to canonical JSON bytes.
    pub fn to_canonical_bytes(&self) -> Vec<u8> {
        canonical_json(self)
    }
}

/// Struct fields serialize in declaration order and entries in index order,
/// so equal snapshots always produce equal bytes.
fn canonical_json<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).expect("snapshot types always serialize")
}

#[derive(Serialize)]
struct FingerprintInput<'a> {
    schema_version: &'a str,
    entries: &'a [SnapshotEntry],
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(group: &str, name: &str) -> ModuleId {
        ModuleId::new(group, name)
    }

    fn build(session: &ExcludeSession) -> ExcludeSpec {
        let a = session.group("a");
        let b = session.module_id(&id("b", "1"));
        let c = session.module_id(&id("b", "2"));
        session.any_of_list(&[a, b, c])
    }

    #[test]
    fn test_session_builds_normalized_specs() {
        let session = ExcludeSession::default();
        let spec = build(&session);

        assert!(spec.excludes_module(&id("a", "x")));
        assert!(spec.excludes_module(&id("b", "2")));
        assert!(!spec.excludes_module(&id("b", "3")));
        assert_eq!(spec.as_any_of().map(|c| c.len()), Some(2));
    }

    #[test]
    fn test_resolve_round_trips_indices() {
        let session = ExcludeSession::default();
        let spec = build(&session);
        assert_eq!(session.resolve(spec.index()), spec);
    }

    #[test]
    fn test_snapshot_is_deterministic_across_sessions() {
        let first = ExcludeSession::default();
        let second = ExcludeSession::default();
        build(&first);
        build(&second);

        let a = first.snapshot();
        let b = second.snapshot();
        assert_ne!(a.session_id, b.session_id);
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(a.entries.len(), first.registry().len());
        assert_eq!(a.entries[0].kind, ExcludeKind::Nothing);
        assert_eq!(a.entries[1].kind, ExcludeKind::Everything);
    }

    #[test]
    fn test_snapshot_fingerprint_tracks_content() {
        let first = ExcludeSession::default();
        let second = ExcludeSession::default();
        first.group("a");
        second.group("b");
        assert_ne!(first.snapshot().fingerprint, second.snapshot().fingerprint);
    }

    #[test]
    fn test_fingerprint_depends_on_kind_and_order() {
        let group = SnapshotEntry {
            kind: ExcludeKind::Group,
            description: "{ group = a }".into(),
        };
        let module = SnapshotEntry {
            kind: ExcludeKind::Module,
            description: "{ group = a }".into(),
        };

        let forward = RegistrySnapshot::fingerprint_of(&[group.clone(), module.clone()]);
        assert_eq!(forward, RegistrySnapshot::fingerprint_of(&[group.clone(), module.clone()]));
        assert_eq!(forward.len(), 16);
        assert_ne!(forward, RegistrySnapshot::fingerprint_of(&[module, group.clone()]));
        assert_ne!(forward, RegistrySnapshot::fingerprint_of(&[group]));
    }

    #[test]
    fn test_stats() {
        let session = ExcludeSession::default();
        let a = session.group("a");
        let b = session.module("b");
        session.any_of(&a, &b);
        session.any_of(&a, &b);

        let stats = session.stats();
        assert_eq!(stats.registered, 5);
        assert_eq!(stats.combinator_cache.hits, 1);
        assert_eq!(stats.combinator_cache.misses, 1);
        assert_eq!(stats.interning.misses, 3);
    }

    #[test]
    fn test_stats_serialize() {
        let session = ExcludeSession::default();
        let json = serde_json::to_value(session.stats()).unwrap();
        assert_eq!(json["registered"], 2);
        assert!(json["session_id"].is_string());
    }

    #[test]
    fn test_config_is_applied() {
        let config = EngineConfig {
            combinator_cache: false,
            ..EngineConfig::default()
        };
        let session = ExcludeSession::new(config);
        let a = session.group("a");
        let b = session.module("b");
        session.any_of(&a, &b);
        assert_eq!(session.stats().combinator_cache, CacheStats::default());
    }

    #[test]
    #[should_panic(expected = "belongs to session")]
    fn test_mixing_sessions_panics() {
        let ours = ExcludeSession::default();
        let theirs = ExcludeSession::default();
        ours.any_of(&ours.group("a"), &theirs.group("b"));
    }
}
