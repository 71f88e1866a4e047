/*
 * Classical worklist solver
 *
 * Kildall-style FIFO fixpoint over a frozen constraint list. The least
 * solution starts every variable at Low and lifts variables to High when a
 * violated constraint forces it; the greatest solution is the dual. A
 * constraint re-enters the queue only when a variable it reads from
 * changed, indexed up front ("invalid if increased/decreased").
 *
 * Termination: the changed set only grows and is bounded by the variable
 * count; the fixpoint is unique regardless of dequeue order.
 *
 * The propagation solver (`PartialSolution`) computes the same assignment
 * with a representation built for forking and merging; the equivalence of
 * the two is pinned by tests.
 */

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

use crate::features::constraints::domain::{ConsElem, Constraint, SecLevel, VarId};

/// Which fixpoint to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Least,
    Greatest,
}

/// A solved assignment produced by the classical algorithm.
#[derive(Debug)]
pub struct WorklistSolution {
    direction: Direction,
    changed: FxHashSet<VarId>,
}

impl WorklistSolution {
    /// Solve a frozen, join-free constraint list to its fixpoint.
    pub fn solve(constraints: &[Constraint], direction: Direction) -> Self {
        let mut soln = Self { direction, changed: FxHashSet::default() };

        // Index: variable → constraints invalidated when it changes.
        // For the least solution a constraint can only be invalidated by its
        // lhs increasing; for the greatest, by its rhs decreasing.
        let mut invalid: FxHashMap<VarId, Vec<usize>> = FxHashMap::default();
        for (i, c) in constraints.iter().enumerate() {
            let watched = match direction {
                Direction::Least => c.lhs,
                Direction::Greatest => c.rhs,
            };
            if let ConsElem::Var(v) = watched {
                invalid.entry(v).or_default().push(i);
            }
        }

        let mut queue: VecDeque<usize> = VecDeque::new();
        let mut queued: FxHashSet<usize> = FxHashSet::default();
        for i in 0..constraints.len() {
            if queued.insert(i) {
                queue.push_back(i);
            }
        }

        let mut iterations = 0usize;
        while let Some(i) = queue.pop_front() {
            queued.remove(&i);
            iterations += 1;

            let c = &constraints[i];
            let left = soln.subst(c.lhs);
            let right = soln.subst(c.rhs);
            if left.leq(&right) {
                continue;
            }

            // Need to satisfy the constraint by moving a variable towards
            // the non-default value.
            let adjusted = match direction {
                Direction::Least => c.rhs,
                Direction::Greatest => c.lhs,
            };
            if let ConsElem::Var(v) = adjusted {
                if soln.changed.insert(v) {
                    #[cfg(feature = "trace")]
                    eprintln!("[worklist] {:?} flipped at iteration {}", v, iterations);
                    if let Some(deps) = invalid.get(&v) {
                        for dep in deps {
                            if queued.insert(*dep) {
                                queue.push_back(*dep);
                            }
                        }
                    }
                }
            }
        }

        #[cfg(feature = "trace")]
        eprintln!(
            "[worklist] solved {} constraints in {} iterations ({} changed)",
            constraints.len(),
            iterations,
            soln.changed.len()
        );
        let _ = iterations;

        soln
    }

    fn default_level(&self) -> SecLevel {
        match self.direction {
            Direction::Least => SecLevel::Low,
            Direction::Greatest => SecLevel::High,
        }
    }

    /// Evaluate an element under the solved assignment.
    pub fn subst(&self, elem: ConsElem) -> SecLevel {
        match elem {
            ConsElem::Const(level) => level,
            ConsElem::Var(v) => {
                if self.changed.contains(&v) {
                    self.default_level().flipped()
                } else {
                    self.default_level()
                }
            }
            ConsElem::Join(_) => unreachable!("stored constraints are join-free"),
        }
    }

    pub fn value_of(&self, var: VarId) -> SecLevel {
        self.subst(ConsElem::Var(var))
    }

    /// Every stored constraint must evaluate to true under the fixpoint.
    pub fn satisfies(&self, constraints: &[Constraint]) -> bool {
        constraints
            .iter()
            .all(|c| self.subst(c.lhs).leq(&self.subst(c.rhs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::constraints::domain::ElemArena;
    use crate::features::constraints::infrastructure::PartialSolution;

    #[test]
    fn test_least_solution_basic() {
        let mut arena = ElemArena::new();
        let a = arena.new_var("a");
        let b = arena.new_var("b");
        // a ⊑ b, H ⊑ a  →  both High
        let cs = vec![
            Constraint::new(ConsElem::Var(a), ConsElem::Var(b)),
            Constraint::new(ConsElem::high(), ConsElem::Var(a)),
        ];
        let soln = WorklistSolution::solve(&cs, Direction::Least);
        assert_eq!(soln.value_of(a), SecLevel::High);
        assert_eq!(soln.value_of(b), SecLevel::High);
        assert!(soln.satisfies(&cs));
    }

    #[test]
    fn test_greatest_solution_basic() {
        let mut arena = ElemArena::new();
        let a = arena.new_var("a");
        let b = arena.new_var("b");
        // a ⊑ b, a ⊑ L  →  a Low, b stays High
        let cs = vec![
            Constraint::new(ConsElem::Var(a), ConsElem::Var(b)),
            Constraint::new(ConsElem::Var(a), ConsElem::low()),
        ];
        let soln = WorklistSolution::solve(&cs, Direction::Greatest);
        assert_eq!(soln.value_of(a), SecLevel::Low);
        assert_eq!(soln.value_of(b), SecLevel::High);
        assert!(soln.satisfies(&cs));
    }

    #[test]
    fn test_greatest_propagates_lowering_backwards() {
        let mut arena = ElemArena::new();
        let a = arena.new_var("a");
        let b = arena.new_var("b");
        let c = arena.new_var("c");
        // a ⊑ b ⊑ c, c ⊑ L  →  all Low
        let cs = vec![
            Constraint::new(ConsElem::Var(a), ConsElem::Var(b)),
            Constraint::new(ConsElem::Var(b), ConsElem::Var(c)),
            Constraint::new(ConsElem::Var(c), ConsElem::low()),
        ];
        let soln = WorklistSolution::solve(&cs, Direction::Greatest);
        for v in [a, b, c] {
            assert_eq!(soln.value_of(v), SecLevel::Low);
        }
    }

    #[test]
    fn test_equivalence_with_propagation_solver() {
        let mut arena = ElemArena::new();
        let vars: Vec<VarId> = (0..8).map(|i| arena.new_var(format!("v{i}"))).collect();

        // A little graph with a cycle, a seeded source, and a sink chain.
        let mut cs = vec![
            Constraint::new(ConsElem::high(), ConsElem::Var(vars[0])),
            Constraint::new(ConsElem::Var(vars[0]), ConsElem::Var(vars[1])),
            Constraint::new(ConsElem::Var(vars[1]), ConsElem::Var(vars[2])),
            Constraint::new(ConsElem::Var(vars[2]), ConsElem::Var(vars[1])),
            Constraint::new(ConsElem::Var(vars[3]), ConsElem::Var(vars[4])),
            Constraint::new(ConsElem::Var(vars[5]), ConsElem::low()),
            Constraint::new(ConsElem::Var(vars[6]), ConsElem::Var(vars[5])),
            Constraint::new(ConsElem::Var(vars[2]), ConsElem::Var(vars[7])),
        ];
        // Expanded join: join(v0, v3) ⊑ v4 becomes two constraints
        cs.push(Constraint::new(ConsElem::Var(vars[0]), ConsElem::Var(vars[4])));
        cs.push(Constraint::new(ConsElem::Var(vars[3]), ConsElem::Var(vars[4])));

        let least_wl = WorklistSolution::solve(&cs, Direction::Least);
        let least_ps = PartialSolution::solve(&cs, false);
        let greatest_wl = WorklistSolution::solve(&cs, Direction::Greatest);
        let greatest_ps = PartialSolution::solve(&cs, true);

        for v in &vars {
            assert_eq!(
                least_wl.value_of(*v),
                least_ps.value_of(*v),
                "least solutions diverge on {:?}",
                v
            );
            assert_eq!(
                greatest_wl.value_of(*v),
                greatest_ps.value_of(*v),
                "greatest solutions diverge on {:?}",
                v
            );
        }
    }

    #[test]
    fn test_monotonicity_of_least() {
        let mut arena = ElemArena::new();
        let a = arena.new_var("a");
        let b = arena.new_var("b");
        let cs = vec![Constraint::new(ConsElem::Var(a), ConsElem::Var(b))];
        let before = WorklistSolution::solve(&cs, Direction::Least);

        let mut more = cs.clone();
        more.push(Constraint::new(ConsElem::high(), ConsElem::Var(a)));
        let after = WorklistSolution::solve(&more, Direction::Least);

        // Adding a constraint never decreases the least solution.
        for v in [a, b] {
            assert!(before.value_of(v).leq(&after.value_of(v)));
        }
    }
}
