//! Pairwise optimizer.
//!
//! A small, exact rule table applied to two interned operands. When one
//! operand provably subsumes the other, the combination collapses to the
//! dominant operand; otherwise the pair is left alone and the caller builds
//! a composite. Results are interned and reused for the rest of the
//! session, so every rule here must be an exact equivalence.
//!
//! ## Union rules (`a ∪ b`)
//!
//! | Condition | Result |
//! |-----------|--------|
//! | `a == b` | `a` |
//! | either is `Everything` | `Everything` |
//! | `a` is `Nothing` | `b` |
//! | `a ∈ AnyOf b` | `b` |
//! | `a ∈ AllOf b` | `a` |
//! | `a ⇒ b`, granularity unchanged | `b` |
//!
//! Intersection is the dual. "Granularity unchanged" means the collapse
//! leaves `may_exclude_artifacts` as the full composite would report it.

use crate::spec::ExcludeSpec;
use crate::types::ExcludeLeaf;

/// Collapse `one ∪ two` to one operand when that is provably exact.
pub(crate) fn union_pair(one: &ExcludeSpec, two: &ExcludeSpec) -> Option<ExcludeSpec> {
    if one == two || one.is_everything() || two.is_nothing() {
        return Some(one.clone());
    }
    if two.is_everything() || one.is_nothing() {
        return Some(two.clone());
    }
    union_dominant(one, two).or_else(|| union_dominant(two, one))
}

/// `Some` if `wide ∪ narrow` collapses to one of them, checking rules in
/// one direction only.
fn union_dominant(narrow: &ExcludeSpec, wide: &ExcludeSpec) -> Option<ExcludeSpec> {
    if wide.as_any_of().is_some_and(|c| c.contains(narrow)) {
        return Some(wide.clone());
    }
    // X ∪ (X ∩ Y) = X
    if wide.as_all_of().is_some_and(|c| c.contains(narrow)) {
        return Some(narrow.clone());
    }
    if implies(narrow, wide) && (wide.may_exclude_artifacts() || !narrow.may_exclude_artifacts()) {
        return Some(wide.clone());
    }
    None
}

/// Collapse `one ∩ two` to one operand when that is provably exact.
pub(crate) fn intersection_pair(one: &ExcludeSpec, two: &ExcludeSpec) -> Option<ExcludeSpec> {
    if one == two || one.is_nothing() || two.is_everything() {
        return Some(one.clone());
    }
    if two.is_nothing() || one.is_everything() {
        return Some(two.clone());
    }
    intersection_dominant(one, two).or_else(|| intersection_dominant(two, one))
}

fn intersection_dominant(narrow: &ExcludeSpec, wide: &ExcludeSpec) -> Option<ExcludeSpec> {
    if wide.as_all_of().is_some_and(|c| c.contains(narrow)) {
        return Some(wide.clone());
    }
    // X ∩ (X ∪ Y) = X
    if wide.as_any_of().is_some_and(|c| c.contains(narrow)) {
        return Some(narrow.clone());
    }
    if implies(narrow, wide) && (!narrow.may_exclude_artifacts() || wide.may_exclude_artifacts()) {
        return Some(narrow.clone());
    }
    None
}

/// Whether everything `narrow` excludes, `wide` excludes too, for both
/// module and artifact queries.
///
/// Only cases that can be decided from leaf parameters are recognized.
pub(crate) fn implies(narrow: &ExcludeSpec, wide: &ExcludeSpec) -> bool {
    if narrow == wide || narrow.is_nothing() || wide.is_everything() {
        return true;
    }
    let (Some(narrow), Some(wide)) = (narrow.as_leaf(), wide.as_leaf()) else {
        return false;
    };
    // A leaf without artifact granularity answers artifact queries with its
    // module answer, so excluding the module covers every artifact of it.
    if wide.may_exclude_artifacts() {
        return false;
    }
    match narrow {
        ExcludeLeaf::ModuleId(id) => wide.excludes_module(id),
        ExcludeLeaf::Artifact { module, .. } => wide.excludes_module(module),
        ExcludeLeaf::ModuleIdSet(ids) => ids.iter().all(|id| wide.excludes_module(id)),
        _ => false,
    }
}
