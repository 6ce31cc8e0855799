//! Core types for the exclude kernel.

pub mod coordinates;
pub mod index;
pub mod leaf;

pub use coordinates::{ArtifactName, CoordinateError, ModuleId};
pub use index::ExcludeIndex;
pub use leaf::{ExcludeKind, ExcludeLeaf, IvyPatternExclude};

pub(crate) use index::ChildSet;
