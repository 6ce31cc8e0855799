//! Exclude spec factories.
//!
//! Construction goes through a chain of decorators sharing one contract:
//!
//! ```text
//! CachingFactory → NormalizingFactory → InterningFactory → Registry
//! ```
//!
//! - [`InterningFactory`] assigns canonical indices and guarantees one
//!   instance per distinct predicate.
//! - [`NormalizingFactory`] rewrites union and intersection requests into a
//!   minimal equivalent form before they reach the interner.
//! - [`CachingFactory`] memoizes binary combinator results by operand index.
//!
//! All specs passed to a factory must come from the same session. Mixing
//! sessions is a programming error and panics.

mod caching;
mod interning;
mod normalizing;

pub use caching::{CacheStats, CachingFactory};
pub use interning::{InterningFactory, InterningStats};
pub use normalizing::NormalizingFactory;

use std::collections::BTreeSet;

use crate::error::ExcludeError;
use crate::spec::ExcludeSpec;
use crate::types::{ArtifactName, ModuleId};

/// Binary combinators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Combinator {
    /// Union.
    AnyOf,
    /// Intersection.
    AllOf,
}

/// Builds interned exclude specs.
///
/// Implementations are shared across resolution threads.
pub trait ExcludeFactory: Send + Sync {
    /// The spec that excludes nothing.
    fn nothing(&self) -> ExcludeSpec;

    /// The spec that excludes everything.
    fn everything(&self) -> ExcludeSpec;

    /// Excludes every module of `group`.
    fn group(&self, group: &str) -> ExcludeSpec;

    /// Excludes every module named `module`, whatever its group.
    fn module(&self, module: &str) -> ExcludeSpec;

    /// Excludes exactly one module.
    fn module_id(&self, id: &ModuleId) -> ExcludeSpec;

    /// Excludes any module of the set.
    fn module_set(&self, ids: BTreeSet<ModuleId>) -> ExcludeSpec;

    /// Excludes one artifact of one module.
    fn artifact(&self, module: &ModuleId, artifact: &ArtifactName) -> ExcludeSpec;

    /// Excludes modules, or artifacts when `artifact` is given, matching Ivy
    /// patterns compiled with the named matcher.
    ///
    /// # Errors
    /// Fails if the matcher is unknown or a pattern does not compile.
    fn ivy_pattern_exclude(
        &self,
        module: &ModuleId,
        artifact: Option<&ArtifactName>,
        matcher: &str,
    ) -> Result<ExcludeSpec, ExcludeError>;

    /// Union of two specs.
    fn any_of(&self, one: &ExcludeSpec, two: &ExcludeSpec) -> ExcludeSpec;

    /// Intersection of two specs.
    fn all_of(&self, one: &ExcludeSpec, two: &ExcludeSpec) -> ExcludeSpec;

    /// Union of any number of specs. An empty list gives `nothing()`.
    fn any_of_list(&self, specs: &[ExcludeSpec]) -> ExcludeSpec;

    /// Intersection of any number of specs. An empty list gives `everything()`.
    fn all_of_list(&self, specs: &[ExcludeSpec]) -> ExcludeSpec;
}
