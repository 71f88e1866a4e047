/*
 * Constraint kit
 *
 * Owns the element arena and, per named kind, an append-only constraint
 * list. Solving a kind locks it: later insertions into that kind are
 * errors. Solutions are cached per kind and direction; once both
 * directions exist for a kind, its raw constraint list is released and only
 * the compact propagation maps remain.
 *
 * Insertion normalizes constraints to join-free form: a join on the left is
 * expanded into one constraint per member, a join on the right is rejected.
 */

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use super::partial_solution::PartialSolution;
use crate::errors::{InfoflowError, Result};
use crate::features::constraints::domain::{
    ConsElem, Constraint, ElemArena, KIND_DEFAULT, KIND_IMPLICIT, VarId,
};

/// Store and solver front end for one constraint system.
#[derive(Debug, Default)]
pub struct ConstraintKit {
    arena: ElemArena,
    kinds: FxHashMap<String, Vec<Constraint>>,
    locked: FxHashSet<String>,
    least: FxHashMap<String, Arc<PartialSolution>>,
    greatest: FxHashMap<String, Arc<PartialSolution>>,
    explicit_constraints: usize,
    implicit_constraints: usize,
}

impl ConstraintKit {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Element algebra (delegated to the arena)
    // ------------------------------------------------------------------

    pub fn new_var(&mut self, description: impl Into<String>) -> VarId {
        self.arena.new_var(description)
    }

    pub fn low(&self) -> ConsElem {
        ConsElem::low()
    }

    pub fn high(&self) -> ConsElem {
        ConsElem::high()
    }

    pub fn upper_bound(&mut self, e1: ConsElem, e2: ConsElem) -> ConsElem {
        self.arena.upper_bound(e1, e2)
    }

    pub fn upper_bound_opt(
        &mut self,
        e1: Option<ConsElem>,
        e2: Option<ConsElem>,
    ) -> Option<ConsElem> {
        self.arena.upper_bound_opt(e1, e2)
    }

    pub fn upper_bound_all(
        &mut self,
        elems: impl IntoIterator<Item = ConsElem>,
    ) -> Result<ConsElem> {
        self.arena.upper_bound_all(elems)
    }

    pub fn arena(&self) -> &ElemArena {
        &self.arena
    }

    // ------------------------------------------------------------------
    // Constraint store
    // ------------------------------------------------------------------

    /// Append `lhs ⊑ rhs` to a kind. Joins on the left expand into one
    /// constraint per member; joins on the right are rejected.
    pub fn add_constraint(&mut self, kind: &str, lhs: ConsElem, rhs: ConsElem) -> Result<()> {
        if self.locked.contains(kind) {
            return Err(InfoflowError::locked(kind));
        }
        if rhs.is_join() {
            return Err(InfoflowError::JoinOnRhs);
        }

        if kind == KIND_DEFAULT {
            self.explicit_constraints += 1;
        } else if kind == KIND_IMPLICIT {
            self.implicit_constraints += 1;
        }

        let set = self.kinds.entry(kind.to_string()).or_default();
        match lhs {
            ConsElem::Join(j) => {
                for member in self.arena.join_members(j) {
                    set.push(Constraint::new(*member, rhs));
                }
            }
            other => set.push(Constraint::new(other, rhs)),
        }
        Ok(())
    }

    /// Does a kind exist (has it ever received a constraint)?
    pub fn has_kind(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    pub fn is_locked(&self, kind: &str) -> bool {
        self.locked.contains(kind)
    }

    /// Read-only peek at the stored constraints of a kind (empty once the
    /// kind's list has been released).
    pub fn constraints(&self, kind: &str) -> Option<&[Constraint]> {
        self.kinds.get(kind).map(|v| v.as_slice())
    }

    /// Lock a kind and take its accumulated constraint list, for callers
    /// that run their own solver over it. The kind accepts no further
    /// constraints afterwards.
    pub fn lock_and_take(&mut self, kind: &str) -> Result<Vec<Constraint>> {
        if !self.kinds.contains_key(kind) {
            return Err(InfoflowError::unknown(kind));
        }
        if !self.locked.insert(kind.to_string()) {
            return Err(InfoflowError::locked(kind));
        }
        Ok(self.kinds.get_mut(kind).map(std::mem::take).unwrap_or_default())
    }

    /// Number of constraints added to the explicit (`default`) kind.
    pub fn explicit_count(&self) -> usize {
        self.explicit_constraints
    }

    /// Number of constraints added to the `implicit` kind.
    pub fn implicit_count(&self) -> usize {
        self.implicit_constraints
    }

    // ------------------------------------------------------------------
    // Solving
    // ------------------------------------------------------------------

    fn kind_constraints(&self, kind: &str) -> Result<&[Constraint]> {
        self.kinds
            .get(kind)
            .map(|v| v.as_slice())
            .ok_or_else(|| InfoflowError::unknown(kind))
    }

    /// Solve (and cache) one direction of one kind, locking it.
    fn ensure_solved(&mut self, kind: &str, initial_high: bool) -> Result<Arc<PartialSolution>> {
        let cache_hit = if initial_high {
            self.greatest.contains_key(kind)
        } else {
            self.least.contains_key(kind)
        };
        if !cache_hit {
            if !self.kinds.contains_key(kind) {
                return Err(InfoflowError::unknown(kind));
            }
            self.locked.insert(kind.to_string());
            let solved = {
                let constraints = self.kind_constraints(kind)?;
                Arc::new(PartialSolution::solve(constraints, initial_high))
            };
            debug!(
                kind,
                greatest = initial_high,
                changed = solved.changed_count(),
                "solved constraint kind"
            );
            if initial_high {
                self.greatest.insert(kind.to_string(), solved);
            } else {
                self.least.insert(kind.to_string(), solved);
            }
            self.free_unneeded_constraints(kind);
        }
        let cache = if initial_high { &self.greatest } else { &self.least };
        Ok(Arc::clone(cache.get(kind).expect("just inserted")))
    }

    fn combined_solution(
        &mut self,
        kinds: &BTreeSet<String>,
        initial_high: bool,
    ) -> Result<PartialSolution> {
        let mut merged: Option<PartialSolution> = None;
        for kind in kinds {
            let solved = self.ensure_solved(kind, initial_high)?;
            match merged.as_mut() {
                None => merged = Some(PartialSolution::fork(&solved)),
                Some(m) => m.merge_in(&solved),
            }
        }
        merged.ok_or(InfoflowError::NoKinds)
    }

    /// Least fixpoint over the union of the kinds' constraints.
    /// Unconstrained variables evaluate to Low.
    pub fn least_solution(&mut self, kinds: &BTreeSet<String>) -> Result<PartialSolution> {
        self.combined_solution(kinds, false)
    }

    /// Greatest fixpoint over the union of the kinds' constraints.
    /// Unconstrained variables evaluate to High.
    pub fn greatest_solution(&mut self, kinds: &BTreeSet<String>) -> Result<PartialSolution> {
        self.combined_solution(kinds, true)
    }

    /// Cached single-kind solutions, for the bulk mode.
    pub(crate) fn cached_least(&self, kind: &str) -> Option<Arc<PartialSolution>> {
        self.least.get(kind).cloned()
    }

    pub(crate) fn lock(&mut self, kind: &str) -> bool {
        self.locked.insert(kind.to_string())
    }

    pub(crate) fn cache_least(&mut self, kind: &str, solved: Arc<PartialSolution>) {
        self.least.insert(kind.to_string(), solved);
    }

    pub(crate) fn cache_greatest(&mut self, kind: &str, solved: Arc<PartialSolution>) {
        self.greatest.insert(kind.to_string(), solved);
    }

    /// Once both directions exist for a locked kind, the raw constraint
    /// list is no longer needed; only the propagation maps survive.
    pub(crate) fn free_unneeded_constraints(&mut self, kind: &str) {
        if self.locked.contains(kind)
            && self.least.contains_key(kind)
            && self.greatest.contains_key(kind)
        {
            if let Some(set) = self.kinds.get_mut(kind) {
                set.clear();
                set.shrink_to_fit();
            }
        }
    }
}
