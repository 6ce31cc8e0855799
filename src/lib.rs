//! # exclude-kernel
//!
//! Interned, self-normalizing exclusion predicates for dependency-graph
//! resolution.
//!
//! The kernel answers one question for a resolver walking a module graph:
//!
//! > Given the exclude rules in effect on this path, is this module (or this
//! > artifact of it) excluded?
//!
//! ## Core Contract
//!
//! 1. Every distinct predicate is built once per session and identified by a
//!    canonical index, so equality is an index comparison
//! 2. Unions and intersections are normalized before construction, so
//!    equivalent requests share one node
//! 3. Composite nodes memoize module results, so repeated queries are cheap
//!
//! ## Architecture
//!
//! ```text
//! ExcludeSession → CachingFactory → NormalizingFactory → InterningFactory
//!                                          ↓                    ↓
//!                                  pairwise optimizer        Registry
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same request sequence → same indices and same snapshot fingerprint
//! - Composite identity depends on the set of children, not their order
//! - Cached evaluation results never change once computed

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod composite;
pub mod config;
pub mod error;
pub mod factory;
pub mod matcher;
mod optimize;
pub mod query_cache;
pub mod registry;
pub mod session;
pub mod spec;
pub mod types;

// Re-exports
pub use types::{ArtifactName, CoordinateError, ExcludeIndex, ExcludeKind, ExcludeLeaf, IvyPatternExclude, ModuleId};
pub use composite::{CompositeExclude, Components};
pub use config::{ConfigError, EngineConfig};
pub use error::ExcludeError;
pub use factory::{
    CacheStats, CachingFactory, Combinator, ExcludeFactory, InterningFactory, InterningStats,
    NormalizingFactory,
};
pub use matcher::{
    CompiledPattern, MatcherRegistry, PatternMatcher, ANY_EXPRESSION, EXACT, EXACT_OR_REGEXP, GLOB, REGEXP,
};
pub use query_cache::QueryCacheConfig;
pub use registry::{Registry, SessionId};
pub use session::{ExcludeSession, RegistrySnapshot, SessionStats, SnapshotEntry};
pub use spec::ExcludeSpec;

/// Schema version of serialized diagnostics.
/// Increment on breaking changes to any snapshot type.
pub const EXCLUDE_KERNEL_SCHEMA_VERSION: &str = "1.0.0";
