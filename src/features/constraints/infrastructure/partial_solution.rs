/*
 * Propagation solver ("partial solution")
 *
 * A compact fixpoint representation built for cheap forking and merging.
 * For the least solution, each constraint is read as "if lhs is High,
 * every variable on the rhs becomes High"; for the greatest solution the
 * sides flip and the tracked change is a drop to Low. The solution is the
 * transitive closure of the seeded change set over the propagation map.
 *
 * Chaining: a partial solution may reference other, already-solved partial
 * solutions. Its change set is semantically the union across the chain, and
 * propagation walks every chained propagation map. This lets a large
 * baseline (the `default` kind) be solved once and forked cheaply for every
 * per-source variant, which is what the bulk parallel mode does.
 *
 * Stored constraints are join-free (the store expands joins on insertion),
 * so substitution only ever sees constants and variables and seeding only
 * inspects constants, in both directions.
 */

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::sync::Arc;

use crate::features::constraints::domain::{ConsElem, Constraint, SecLevel, VarId};

/// A chainable fixpoint of one constraint set.
#[derive(Debug, Clone, Default)]
pub struct PartialSolution {
    /// Do variables default to High (greatest solution)?
    initial_high: bool,
    /// Propagation map: source variable → variables forced when it changes
    pmap: FxHashMap<VarId, Vec<VarId>>,
    /// Variables holding the non-default value
    vset: FxHashSet<VarId>,
    /// Chained, already-solved solutions (shared, read-only)
    chained: Vec<Arc<PartialSolution>>,
}

impl PartialSolution {
    /// Solve a constraint set from scratch.
    pub fn solve(constraints: &[Constraint], initial_high: bool) -> Self {
        let mut ps = Self { initial_high, ..Self::default() };
        ps.initialize(constraints);
        ps.propagate();
        ps
    }

    /// Fork a solved solution: the copy chains to `base` (and everything
    /// `base` chains to) and starts with no local state of its own.
    pub fn fork(base: &Arc<PartialSolution>) -> Self {
        let mut chained = Vec::with_capacity(base.chained.len() + 1);
        chained.push(Arc::clone(base));
        for link in &base.chained {
            chained.push(Arc::clone(link));
        }
        Self {
            initial_high: base.initial_high,
            pmap: FxHashMap::default(),
            vset: FxHashSet::default(),
            chained,
        }
    }

    pub fn initial_high(&self) -> bool {
        self.initial_high
    }

    /// Merge another solved solution into this one and re-propagate over
    /// the combined seeds and propagation maps.
    pub fn merge_in(&mut self, other: &Arc<PartialSolution>) {
        debug_assert_eq!(
            self.initial_high, other.initial_high,
            "cannot merge solutions of opposite polarity"
        );
        self.chain(Arc::clone(other));
        for link in &other.chained {
            self.chain(Arc::clone(link));
        }
        self.propagate();
    }

    fn chain(&mut self, link: Arc<PartialSolution>) {
        if !self.chained.iter().any(|c| Arc::ptr_eq(c, &link)) {
            self.chained.push(link);
        }
    }

    /// Build the propagation map and seed the change set.
    fn initialize(&mut self, constraints: &[Constraint]) {
        for c in constraints {
            let (from, to) = if self.initial_high {
                (c.rhs, c.lhs)
            } else {
                (c.lhs, c.rhs)
            };

            let targets = match to {
                ConsElem::Var(v) => vec![v],
                _ => continue,
            };

            if let ConsElem::Var(src) = from {
                self.pmap.entry(src).or_default().extend(targets.iter().copied());
            }

            // Immediate evidence: a constant on the propagation source that
            // already forces the non-default value.
            if self.subst(from) != self.default_level() {
                self.vset.extend(targets);
            }
        }
    }

    fn default_level(&self) -> SecLevel {
        if self.initial_high {
            SecLevel::High
        } else {
            SecLevel::Low
        }
    }

    /// Transitive closure of the change set over all chained propagation
    /// maps. New changes always land in this solution's own set; chained
    /// solutions are never mutated.
    fn propagate(&mut self) {
        let mut worklist: VecDeque<VarId> = self.vset.iter().copied().collect();
        for link in &self.chained {
            worklist.extend(link.vset.iter().copied());
        }

        let mut targets = Vec::new();
        while let Some(var) = worklist.pop_front() {
            targets.clear();
            if let Some(ts) = self.pmap.get(&var) {
                targets.extend_from_slice(ts);
            }
            for link in &self.chained {
                if let Some(ts) = link.pmap.get(&var) {
                    targets.extend_from_slice(ts);
                }
            }
            for target in targets.drain(..) {
                if !self.is_changed(target) {
                    self.vset.insert(target);
                    worklist.push_back(target);
                }
            }
        }
    }

    /// Does any change set in the chain hold this variable?
    fn is_changed(&self, var: VarId) -> bool {
        self.vset.contains(&var) || self.chained.iter().any(|c| c.vset.contains(&var))
    }

    /// Evaluate an element under this solution.
    pub fn subst(&self, elem: ConsElem) -> SecLevel {
        match elem {
            ConsElem::Const(level) => level,
            ConsElem::Var(v) => {
                if self.is_changed(v) {
                    self.default_level().flipped()
                } else {
                    self.default_level()
                }
            }
            ConsElem::Join(_) => unreachable!("stored constraints are join-free"),
        }
    }

    /// Level of a single variable.
    pub fn value_of(&self, var: VarId) -> SecLevel {
        self.subst(ConsElem::Var(var))
    }

    pub fn is_high(&self, var: VarId) -> bool {
        self.value_of(var).is_high()
    }

    /// Number of variables holding the non-default value in this link of
    /// the chain alone.
    pub fn changed_count(&self) -> usize {
        self.vset.len()
    }
}
