//! Canonical indices and composite child sets.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use xxhash_rust::xxh64::Xxh64;

/// Canonical index of an interned exclude spec.
///
/// Opaque outside the crate: an index can only be resolved through the
/// registry that issued it. Ordering follows registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExcludeIndex(u32);

impl ExcludeIndex {
    /// Index reserved for the spec that excludes nothing.
    pub const NOTHING: ExcludeIndex = ExcludeIndex(0);
    /// Index reserved for the spec that excludes everything.
    pub const EVERYTHING: ExcludeIndex = ExcludeIndex(1);

    pub(crate) const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub(crate) const fn as_usize(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub(crate) const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ExcludeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Set of child indices that defines a composite node.
///
/// Indices are kept sorted and unique, so two sets built from the same
/// children in any order compare equal. The xxh64 fingerprint is computed
/// once and used as the hash. Clones share storage.
#[derive(Clone)]
pub(crate) struct ChildSet(Arc<ChildSetInner>);

struct ChildSetInner {
    sorted: Box<[ExcludeIndex]>,
    members: HashSet<ExcludeIndex>,
    fingerprint: u64,
}

impl ChildSet {
    pub(crate) fn from_indices(indices: impl IntoIterator<Item = ExcludeIndex>) -> Self {
        let mut sorted: Vec<ExcludeIndex> = indices.into_iter().collect();
        sorted.sort_unstable();
        sorted.dedup();

        let mut hasher = Xxh64::new(0);
        hasher.write_usize(sorted.len());
        for index in &sorted {
            hasher.write_u32(index.as_u32());
        }
        let fingerprint = hasher.finish();
        let members = sorted.iter().copied().collect();

        Self(Arc::new(ChildSetInner {
            sorted: sorted.into_boxed_slice(),
            members,
            fingerprint,
        }))
    }

    pub(crate) fn len(&self) -> usize {
        self.0.sorted.len()
    }

    pub(crate) fn contains(&self, index: ExcludeIndex) -> bool {
        self.0.members.contains(&index)
    }

    /// Indices in canonical (ascending) order.
    pub(crate) fn as_slice(&self) -> &[ExcludeIndex] {
        &self.0.sorted
    }

    /// Single remaining index, if the set has exactly one.
    pub(crate) fn single(&self) -> Option<ExcludeIndex> {
        match &*self.0.sorted {
            [only] => Some(*only),
            _ => None,
        }
    }
}

impl PartialEq for ChildSet {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.0.fingerprint == other.0.fingerprint && self.0.sorted == other.0.sorted)
    }
}

impl Eq for ChildSet {}

impl Hash for ChildSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.fingerprint);
    }
}

impl fmt::Debug for ChildSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.sorted.iter()).finish()
    }
}
