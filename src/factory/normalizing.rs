//! Algebraic normalizer.
//!
//! Rewrites union and intersection requests into a minimal equivalent list
//! before delegating construction. Structurally different requests for the
//! same predicate therefore share one canonical node.
//!
//! ## Union pipeline
//!
//! 1. Flatten nested `AnyOf` operands and drop duplicates.
//! 2. `Everything` absorbs the whole list.
//! 3. `ModuleId` and `ModuleIdSet` leaves merge into one set, minus the ids
//!    another module-granular leaf already excludes.
//! 4. Absorption: `X ∪ (X ∩ Y) = X`, and `X ∩ Y` also goes when the rest of
//!    the union already excludes everything `X` does.
//! 5. Pairwise optimization to a fixpoint.
//!
//! Intersection runs the dual pipeline. Its merged set keeps only the ids
//! common to every id operand and excluded by every module-granular leaf.

use std::collections::{BTreeSet, HashSet};

use crate::composite::CompositeExclude;
use crate::error::ExcludeError;
use crate::optimize;
use crate::spec::ExcludeSpec;
use crate::types::{ArtifactName, ExcludeLeaf, ModuleId};

use super::{Combinator, ExcludeFactory};

/// Normalizing decorator over another factory.
#[derive(Debug)]
pub struct NormalizingFactory<F> {
    delegate: F,
}

impl<F: ExcludeFactory> NormalizingFactory<F> {
    /// Wrap `delegate`.
    pub fn new(delegate: F) -> Self {
        Self { delegate }
    }

    /// The wrapped factory.
    pub fn delegate(&self) -> &F {
        &self.delegate
    }

    fn union(&self, specs: &[ExcludeSpec]) -> ExcludeSpec {
        let flat = flatten(specs, ExcludeSpec::as_any_of);
        if flat.iter().any(ExcludeSpec::is_everything) {
            return self.delegate.everything();
        }
        let flat: Vec<ExcludeSpec> = flat.into_iter().filter(|spec| !spec.is_nothing()).collect();

        let (ids, mut rest) = split_module_ids(flat);
        let all_ids: BTreeSet<ModuleId> = ids.iter().flat_map(module_ids_of).collect();
        // Ids already covered by a module-granular leaf add nothing.
        let merged: BTreeSet<ModuleId> = all_ids
            .iter()
            .filter(|id| !module_leaves(&rest).any(|leaf| leaf.excludes_module(id)))
            .cloned()
            .collect();
        if !merged.is_empty() {
            rest.push(self.module_set(merged));
        }

        let rest = absorb(rest, Combinator::AnyOf, |specs, owner, component| {
            covered_by_union(&all_ids, specs, owner, component)
        });
        let reduced = reduce_pairwise(rest, optimize::union_pair);
        self.delegate.any_of_list(&reduced)
    }

    fn intersection(&self, specs: &[ExcludeSpec]) -> ExcludeSpec {
        let flat = flatten(specs, ExcludeSpec::as_all_of);
        if flat.iter().any(ExcludeSpec::is_nothing) {
            return self.delegate.nothing();
        }
        let flat: Vec<ExcludeSpec> = flat.into_iter().filter(|spec| !spec.is_everything()).collect();

        let (ids, mut rest) = split_module_ids(flat);
        if !ids.is_empty() {
            let mut sets = ids.iter().map(module_ids_of);
            let first = sets.next().unwrap_or_default();
            let common: BTreeSet<ModuleId> = sets
                .fold(first, |acc, set| acc.intersection(&set).cloned().collect())
                .into_iter()
                .filter(|id| module_leaves(&rest).all(|leaf| leaf.excludes_module(id)))
                .collect();
            if common.is_empty() {
                tracing::trace!(operands = ids.len(), "disjoint module ids intersect to nothing");
                return self.delegate.nothing();
            }
            rest.push(self.module_set(common));
        }

        let rest = absorb(rest, Combinator::AllOf, covered_by_intersection);
        let reduced = reduce_pairwise(rest, optimize::intersection_pair);
        self.delegate.all_of_list(&reduced)
    }
}

/// Expand nested composites selected by `select`, preserving first-seen
/// order and dropping duplicates.
fn flatten(specs: &[ExcludeSpec], select: fn(&ExcludeSpec) -> Option<&CompositeExclude>) -> Vec<ExcludeSpec> {
    let mut seen = HashSet::with_capacity(specs.len());
    let mut flat = Vec::with_capacity(specs.len());
    let mut pending: Vec<ExcludeSpec> = specs.iter().rev().cloned().collect();

    while let Some(spec) = pending.pop() {
        match select(&spec) {
            Some(composite) => {
                let children: Vec<ExcludeSpec> = composite.components().collect();
                pending.extend(children.into_iter().rev());
            }
            None => {
                if seen.insert(spec.index()) {
                    flat.push(spec);
                }
            }
        }
    }
    flat
}

/// Split off the `ModuleId` and `ModuleIdSet` leaves.
fn split_module_ids(specs: Vec<ExcludeSpec>) -> (Vec<ExcludeSpec>, Vec<ExcludeSpec>) {
    specs.into_iter().partition(|spec| {
        matches!(
            spec.as_leaf(),
            Some(ExcludeLeaf::ModuleId(_)) | Some(ExcludeLeaf::ModuleIdSet(_))
        )
    })
}

fn module_ids_of(spec: &ExcludeSpec) -> BTreeSet<ModuleId> {
    match spec.as_leaf() {
        Some(ExcludeLeaf::ModuleId(id)) => BTreeSet::from([id.clone()]),
        Some(ExcludeLeaf::ModuleIdSet(ids)) => ids.iter().cloned().collect(),
        _ => BTreeSet::new(),
    }
}

/// Leaves whose artifact answers follow their module answers.
fn module_leaves(specs: &[ExcludeSpec]) -> impl Iterator<Item = &ExcludeLeaf> {
    specs
        .iter()
        .filter_map(ExcludeSpec::as_leaf)
        .filter(|leaf| !leaf.may_exclude_artifacts())
}

/// Drop composites of the dual kind that the rest of the list already
/// decides, judged by `covered` on each of their components.
///
/// `covered(specs, owner, component)` sees the whole list, the composite
/// being tested and one of its components.
fn absorb(
    specs: Vec<ExcludeSpec>,
    combinator: Combinator,
    covered: impl Fn(&[ExcludeSpec], &ExcludeSpec, &ExcludeSpec) -> bool,
) -> Vec<ExcludeSpec> {
    let dual = |spec: &ExcludeSpec| match combinator {
        Combinator::AnyOf => spec.as_all_of().is_some(),
        Combinator::AllOf => spec.as_any_of().is_some(),
    };
    if !specs.iter().any(dual) {
        return specs;
    }

    let absorbed: HashSet<usize> = specs
        .iter()
        .enumerate()
        .filter_map(|(i, spec)| {
            let composite = spec.as_composite().filter(|_| dual(spec))?;
            composite
                .components()
                .any(|component| covered(specs.as_slice(), spec, &component))
                .then_some(i)
        })
        .collect();

    for i in &absorbed {
        tracing::trace!(index = %specs[*i].index(), ?combinator, "absorbed composite operand");
    }
    specs
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !absorbed.contains(i))
        .map(|(_, spec)| spec)
        .collect()
}

/// `X ∩ Y` inside a union goes when `X` is contained in what the union
/// already excludes: another operand, or modules covered by the union's ids
/// and module-granular leaves together.
fn covered_by_union(
    ids: &BTreeSet<ModuleId>,
    specs: &[ExcludeSpec],
    owner: &ExcludeSpec,
    component: &ExcludeSpec,
) -> bool {
    if specs.iter().any(|other| other != owner && optimize::implies(component, other)) {
        return true;
    }
    let excluded = |id: &ModuleId| ids.contains(id) || module_leaves(specs).any(|leaf| leaf.excludes_module(id));
    match component.as_leaf() {
        Some(ExcludeLeaf::ModuleId(id)) | Some(ExcludeLeaf::Artifact { module: id, .. }) => excluded(id),
        Some(ExcludeLeaf::ModuleIdSet(members)) => members.iter().all(excluded),
        _ => false,
    }
}

/// `X ∪ Y` inside an intersection goes when another operand implies `X`.
fn covered_by_intersection(specs: &[ExcludeSpec], owner: &ExcludeSpec, component: &ExcludeSpec) -> bool {
    specs.iter().any(|other| other != owner && optimize::implies(other, component))
}

/// Fold every operand into the first kept operand it combines with, until
/// no pair collapses.
fn reduce_pairwise(
    mut specs: Vec<ExcludeSpec>,
    combine: fn(&ExcludeSpec, &ExcludeSpec) -> Option<ExcludeSpec>,
) -> Vec<ExcludeSpec> {
    loop {
        if specs.len() < 2 {
            return specs;
        }
        let before = specs.len();
        let mut kept: Vec<ExcludeSpec> = Vec::with_capacity(before);
        'next: for spec in specs {
            for slot in kept.iter_mut() {
                if let Some(merged) = combine(slot, &spec) {
                    *slot = merged;
                    continue 'next;
                }
            }
            kept.push(spec);
        }
        if kept.len() == before {
            return kept;
        }
        specs = kept;
    }
}

impl<F: ExcludeFactory> ExcludeFactory for NormalizingFactory<F> {
    fn nothing(&self) -> ExcludeSpec {
        self.delegate.nothing()
    }

    fn everything(&self) -> ExcludeSpec {
        self.delegate.everything()
    }

    fn group(&self, group: &str) -> ExcludeSpec {
        self.delegate.group(group)
    }

    fn module(&self, module: &str) -> ExcludeSpec {
        self.delegate.module(module)
    }

    fn module_id(&self, id: &ModuleId) -> ExcludeSpec {
        self.delegate.module_id(id)
    }

    fn module_set(&self, ids: BTreeSet<ModuleId>) -> ExcludeSpec {
        let mut iter = ids.iter();
        match (iter.next(), iter.next()) {
            (None, _) => self.delegate.nothing(),
            (Some(only), None) => self.delegate.module_id(only),
            _ => self.delegate.module_set(ids),
        }
    }

    fn artifact(&self, module: &ModuleId, artifact: &ArtifactName) -> ExcludeSpec {
        self.delegate.artifact(module, artifact)
    }

    fn ivy_pattern_exclude(
        &self,
        module: &ModuleId,
        artifact: Option<&ArtifactName>,
        matcher: &str,
    ) -> Result<ExcludeSpec, ExcludeError> {
        self.delegate.ivy_pattern_exclude(module, artifact, matcher)
    }

    fn any_of(&self, one: &ExcludeSpec, two: &ExcludeSpec) -> ExcludeSpec {
        self.union(&[one.clone(), two.clone()])
    }

    fn all_of(&self, one: &ExcludeSpec, two: &ExcludeSpec) -> ExcludeSpec {
        self.intersection(&[one.clone(), two.clone()])
    }

    fn any_of_list(&self, specs: &[ExcludeSpec]) -> ExcludeSpec {
        self.union(specs)
    }

    fn all_of_list(&self, specs: &[ExcludeSpec]) -> ExcludeSpec {
        self.intersection(specs)
    }
}
