//! The interned exclude spec handle.
//!
//! An [`ExcludeSpec`] is a cheap, cloneable handle to a node registered in a
//! session's [`Registry`](crate::registry::Registry). Because every distinct
//! predicate is registered exactly once, equality and hashing only look at
//! the canonical index.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::composite::CompositeExclude;
use crate::registry::SessionId;
use crate::types::{ArtifactName, ExcludeIndex, ExcludeKind, ExcludeLeaf, ModuleId};

/// An interned exclusion predicate.
#[derive(Clone)]
pub struct ExcludeSpec(Arc<IndexedExclude>);

struct IndexedExclude {
    index: ExcludeIndex,
    session: SessionId,
    body: Body,
}

enum Body {
    Leaf(ExcludeLeaf),
    AnyOf(CompositeExclude),
    AllOf(CompositeExclude),
}

impl ExcludeSpec {
    pub(crate) fn leaf(index: ExcludeIndex, session: SessionId, leaf: ExcludeLeaf) -> Self {
        Self::with_body(index, session, Body::Leaf(leaf))
    }

    pub(crate) fn any_of(index: ExcludeIndex, session: SessionId, composite: CompositeExclude) -> Self {
        Self::with_body(index, session, Body::AnyOf(composite))
    }

    pub(crate) fn all_of(index: ExcludeIndex, session: SessionId, composite: CompositeExclude) -> Self {
        Self::with_body(index, session, Body::AllOf(composite))
    }

    fn with_body(index: ExcludeIndex, session: SessionId, body: Body) -> Self {
        Self(Arc::new(IndexedExclude { index, session, body }))
    }

    /// Canonical index of this spec within its session.
    pub fn index(&self) -> ExcludeIndex {
        self.0.index
    }

    /// Session whose registry interned this spec.
    pub fn session(&self) -> SessionId {
        self.0.session
    }

    /// Variant of this spec.
    pub fn kind(&self) -> ExcludeKind {
        match &self.0.body {
            Body::Leaf(leaf) => leaf.kind(),
            Body::AnyOf(_) => ExcludeKind::AnyOf,
            Body::AllOf(_) => ExcludeKind::AllOf,
        }
    }

    /// Whether this is the spec that excludes nothing.
    pub fn is_nothing(&self) -> bool {
        self.0.index == ExcludeIndex::NOTHING
    }

    /// Whether this is the spec that excludes everything.
    pub fn is_everything(&self) -> bool {
        self.0.index == ExcludeIndex::EVERYTHING
    }

    /// The leaf predicate, if this is not a composite.
    pub fn as_leaf(&self) -> Option<&ExcludeLeaf> {
        match &self.0.body {
            Body::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    /// The composite node, if this is an `AnyOf`.
    pub fn as_any_of(&self) -> Option<&CompositeExclude> {
        match &self.0.body {
            Body::AnyOf(composite) => Some(composite),
            _ => None,
        }
    }

    /// The composite node, if this is an `AllOf`.
    pub fn as_all_of(&self) -> Option<&CompositeExclude> {
        match &self.0.body {
            Body::AllOf(composite) => Some(composite),
            _ => None,
        }
    }

    /// The composite node, if this is an `AnyOf` or an `AllOf`.
    pub fn as_composite(&self) -> Option<&CompositeExclude> {
        match &self.0.body {
            Body::AnyOf(composite) | Body::AllOf(composite) => Some(composite),
            Body::Leaf(_) => None,
        }
    }

    /// Whether the whole module is excluded.
    ///
    /// Composite results are memoized per node.
    pub fn excludes_module(&self, module: &ModuleId) -> bool {
        match &self.0.body {
            Body::Leaf(leaf) => leaf.excludes_module(module),
            Body::AnyOf(composite) => composite.memoized(module, || {
                composite.components().any(|child| child.excludes_module(module))
            }),
            Body::AllOf(composite) => composite.memoized(module, || {
                composite.components().all(|child| child.excludes_module(module))
            }),
        }
    }

    /// Whether this artifact of the module is excluded.
    pub fn excludes_artifact(&self, module: &ModuleId, artifact: &ArtifactName) -> bool {
        match &self.0.body {
            Body::Leaf(leaf) => leaf.excludes_artifact(module, artifact),
            Body::AnyOf(composite) => composite
                .components()
                .any(|child| child.excludes_artifact(module, artifact)),
            Body::AllOf(composite) => composite
                .components()
                .all(|child| child.excludes_artifact(module, artifact)),
        }
    }

    /// Whether this spec can ever express an artifact-specific restriction.
    ///
    /// When false, the resolver may evaluate modules only.
    pub fn may_exclude_artifacts(&self) -> bool {
        match &self.0.body {
            Body::Leaf(leaf) => leaf.may_exclude_artifacts(),
            Body::AnyOf(composite) | Body::AllOf(composite) => composite.may_exclude_artifacts(),
        }
    }

    /// Equality that treats two specs as equal when they exclude the same
    /// modules, whatever their artifact-level refinements.
    ///
    /// Composites compare their components position by position, so two
    /// composites holding equivalent components in a different order are
    /// not equal.
    pub fn equals_ignore_artifact(&self, other: &ExcludeSpec) -> bool {
        if self == other {
            return true;
        }
        match (&self.0.body, &other.0.body) {
            (Body::Leaf(a), Body::Leaf(b)) => a.equals_ignore_artifact(b),
            (Body::AnyOf(a), Body::AnyOf(b)) | (Body::AllOf(a), Body::AllOf(b)) => {
                a.components_equal_ignore_artifact(b)
            }
            _ => false,
        }
    }
}

impl PartialEq for ExcludeSpec {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || (self.0.index == other.0.index && self.0.session == other.0.session)
    }
}

impl Eq for ExcludeSpec {}

impl Hash for ExcludeSpec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.index.hash(state);
    }
}

impl fmt::Display for ExcludeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (label, composite) = match &self.0.body {
            Body::Leaf(leaf) => return write!(f, "{}", leaf),
            Body::AnyOf(composite) => ("exclude any of", composite),
            Body::AllOf(composite) => ("exclude all of", composite),
        };
        write!(f, "{{{} [", label)?;
        for (i, child) in composite.components().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", child)?;
        }
        write!(f, "]}}")
    }
}

impl fmt::Debug for ExcludeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.body {
            Body::Leaf(leaf) => write!(f, "At {}, {}", self.0.index, leaf),
            Body::AnyOf(composite) => write!(f, "At {} any of {:?}", self.0.index, composite.child_indices()),
            Body::AllOf(composite) => write!(f, "At {} all of {:?}", self.0.index, composite.child_indices()),
        }
    }
}
