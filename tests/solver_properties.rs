//! Property tests for the constraint solvers: algorithm equivalence,
//! fixpoint validity, monotonicity/antitonicity, and chaining.

use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;

use infoflow_ir::features::constraints::domain::{ConsElem, Constraint, ElemArena, SecLevel, VarId};
use infoflow_ir::features::constraints::infrastructure::worklist_solver::Direction;
use infoflow_ir::{ConstraintKit, PartialSolution, WorklistSolution};

const NUM_VARS: u32 = 8;

/// Encoded element: 0..NUM_VARS are variables, NUM_VARS is Low,
/// NUM_VARS + 1 is High.
fn decode(code: u32) -> ConsElem {
    if code < NUM_VARS {
        ConsElem::Var(VarId(code))
    } else if code == NUM_VARS {
        ConsElem::low()
    } else {
        ConsElem::high()
    }
}

fn arena_with_vars() -> ElemArena {
    let mut arena = ElemArena::new();
    for i in 0..NUM_VARS {
        arena.new_var(format!("v{i}"));
    }
    arena
}

/// Arbitrary join-free constraint sets: lhs may be a constant or variable,
/// rhs a variable or Low (the normalized store shape).
fn constraint_set() -> impl Strategy<Value = Vec<Constraint>> {
    prop::collection::vec(
        (0..NUM_VARS + 2, 0..NUM_VARS + 1).prop_map(|(lhs, rhs)| {
            Constraint::new(decode(lhs), decode(rhs))
        }),
        0..40,
    )
}

proptest! {
    /// The worklist solver and the propagation solver compute the same
    /// assignment, in both directions.
    #[test]
    fn worklist_equals_propagation(constraints in constraint_set()) {
        let _arena = arena_with_vars();

        let least_wl = WorklistSolution::solve(&constraints, Direction::Least);
        let least_ps = PartialSolution::solve(&constraints, false);
        let greatest_wl = WorklistSolution::solve(&constraints, Direction::Greatest);
        let greatest_ps = PartialSolution::solve(&constraints, true);

        for i in 0..NUM_VARS {
            let v = VarId(i);
            prop_assert_eq!(least_wl.value_of(v), least_ps.value_of(v));
            prop_assert_eq!(greatest_wl.value_of(v), greatest_ps.value_of(v));
        }
    }

    /// Every satisfiable stored constraint holds under the least fixpoint.
    /// (Constraints like H ⊑ L or H ⊑ x with x forced low are impossible
    /// to satisfy by raising rhs variables and are skipped, matching the
    /// solver's treatment.)
    #[test]
    fn least_fixpoint_satisfies_var_constraints(constraints in constraint_set()) {
        let soln = WorklistSolution::solve(&constraints, Direction::Least);
        for c in &constraints {
            if matches!(c.rhs, ConsElem::Var(_)) {
                prop_assert!(
                    soln.subst(c.lhs).leq(&soln.subst(c.rhs)),
                    "unsatisfied: {:?}",
                    c
                );
            }
        }
    }

    /// Adding a constraint never decreases the least solution and never
    /// increases the greatest solution.
    #[test]
    fn monotone_least_antitone_greatest(
        constraints in constraint_set(),
        extra in (0..NUM_VARS + 2, 0..NUM_VARS + 1),
    ) {
        let least_before = PartialSolution::solve(&constraints, false);
        let greatest_before = PartialSolution::solve(&constraints, true);

        let mut extended = constraints.clone();
        extended.push(Constraint::new(decode(extra.0), decode(extra.1)));
        let least_after = PartialSolution::solve(&extended, false);
        let greatest_after = PartialSolution::solve(&extended, true);

        for i in 0..NUM_VARS {
            let v = VarId(i);
            prop_assert!(
                least_before.value_of(v).leq(&least_after.value_of(v)),
                "least solution shrank at v{i}"
            );
            prop_assert!(
                greatest_after.value_of(v).leq(&greatest_before.value_of(v)),
                "greatest solution grew at v{i}"
            );
        }
    }

    /// Merging a solved baseline into a variant is observationally the
    /// same as solving the union of both constraint sets from scratch.
    #[test]
    fn chaining_equals_union(
        base in constraint_set(),
        variant in constraint_set(),
    ) {
        let baseline = Arc::new(PartialSolution::solve(&base, false));
        let mut merged = PartialSolution::solve(&variant, false);
        merged.merge_in(&baseline);

        let mut union = base.clone();
        union.extend_from_slice(&variant);
        let fresh = PartialSolution::solve(&union, false);

        for i in 0..NUM_VARS {
            let v = VarId(i);
            prop_assert_eq!(merged.value_of(v), fresh.value_of(v), "diverged at v{}", i);
        }
    }
}

/// Round trip through the kit: a join on the left expands, solves, and
/// reports the expected assignment in both directions.
#[test]
fn kit_round_trip_with_joins() {
    let mut kit = ConstraintKit::new();
    let a = kit.new_var("a");
    let b = kit.new_var("b");
    let c = kit.new_var("c");

    let join = kit.upper_bound(ConsElem::Var(a), ConsElem::Var(b));
    kit.add_constraint("k", join, ConsElem::Var(c)).unwrap();
    kit.add_constraint("k", ConsElem::high(), ConsElem::Var(a)).unwrap();

    let kinds: BTreeSet<String> = ["k".to_string()].into();
    let least = kit.least_solution(&kinds).unwrap();
    assert_eq!(least.value_of(a), SecLevel::High);
    assert_eq!(least.value_of(c), SecLevel::High, "taint flows through the join member");
    assert_eq!(least.value_of(b), SecLevel::Low);

    let greatest = kit.greatest_solution(&kinds).unwrap();
    assert_eq!(greatest.value_of(b), SecLevel::High, "unconstrained stays high");
}
