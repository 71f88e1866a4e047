/*
 * Multithreaded solve entry points
 *
 * Two parallel shapes, both confined to this module:
 *
 * - `solve_mt`: both fixpoints of one kind at once (two rayon jobs over the
 *   same frozen constraint list), after which the kind's raw constraints
 *   are released.
 *
 * - `solve_least_mt`: the bulk mode. Requires the `default` baseline (and
 *   `default-sinks` when requested) to be solved already. Each requested
 *   kind is locked and solved from its own constraints single-threaded,
 *   then a forked copy per kind is handed to a bounded worker pool in
 *   round-robin batches; every worker merges the shared baseline into its
 *   own copies. Workers mutate only their disjoint copies; the baseline is
 *   shared read-only.
 */

use rayon::prelude::*;
use std::sync::Arc;
use tracing::debug;

use super::kit::ConstraintKit;
use super::partial_solution::PartialSolution;
use crate::errors::{InfoflowError, Result};
use crate::features::constraints::domain::{KIND_DEFAULT, KIND_DEFAULT_SINKS};

impl ConstraintKit {
    /// Compute least and greatest solutions for one kind on two workers,
    /// then release the kind's raw constraint list.
    pub fn solve_mt(&mut self, kind: &str) -> Result<()> {
        if !self.has_kind(kind) {
            return Err(InfoflowError::unknown(kind));
        }
        if !self.lock(kind) {
            return Err(InfoflowError::locked(kind));
        }

        let (greatest, least) = {
            let constraints = self.constraints(kind).expect("kind checked above");
            rayon::join(
                || PartialSolution::solve(constraints, true),
                || PartialSolution::solve(constraints, false),
            )
        };

        debug!(kind, "solved both fixpoints");
        self.cache_greatest(kind, Arc::new(greatest));
        self.cache_least(kind, Arc::new(least));
        self.free_unneeded_constraints(kind);
        Ok(())
    }

    /// Bulk parallel least solve: one merged solution per requested kind,
    /// all sharing the pre-solved `default` baseline (and `default-sinks`
    /// if `use_default_sinks`). Results are returned in input order.
    pub fn solve_least_mt(
        &mut self,
        kinds: &[String],
        use_default_sinks: bool,
        workers: usize,
    ) -> Result<Vec<PartialSolution>> {
        let baseline = self
            .cached_least(KIND_DEFAULT)
            .ok_or_else(|| InfoflowError::unknown(KIND_DEFAULT))?;
        let default_sinks = if use_default_sinks {
            Some(
                self.cached_least(KIND_DEFAULT_SINKS)
                    .ok_or_else(|| InfoflowError::unknown(KIND_DEFAULT_SINKS))?,
            )
        } else {
            None
        };

        // Lock and solve each kind from its local constraints alone, then
        // fork the chained copy that the workers will merge into.
        let mut copies: Vec<PartialSolution> = Vec::with_capacity(kinds.len());
        for kind in kinds {
            if !self.has_kind(kind) {
                return Err(InfoflowError::unknown(kind));
            }
            if !self.lock(kind) {
                return Err(InfoflowError::locked(kind));
            }
            let solved = {
                let constraints = self.constraints(kind).expect("kind checked above");
                Arc::new(PartialSolution::solve(constraints, false))
            };
            copies.push(PartialSolution::fork(&solved));
            self.cache_least(kind, solved);
        }

        if copies.is_empty() {
            return Ok(copies);
        }

        let workers = workers.max(1).min(copies.len());
        let batch = copies.len().div_ceil(workers);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| InfoflowError::Solver(e.to_string()))?;

        debug!(
            kinds = kinds.len(),
            workers,
            batch,
            use_default_sinks,
            "bulk merge against baseline"
        );

        pool.install(|| {
            copies.par_chunks_mut(batch).for_each(|chunk| {
                for copy in chunk {
                    copy.merge_in(&baseline);
                    if let Some(ds) = &default_sinks {
                        copy.merge_in(ds);
                    }
                }
            });
        });

        Ok(copies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::constraints::domain::{ConsElem, SecLevel};
    use std::collections::BTreeSet;

    #[test]
    fn test_solve_mt_produces_both_directions() {
        let mut kit = ConstraintKit::new();
        let a = kit.new_var("a");
        let b = kit.new_var("b");
        kit.add_constraint("default", ConsElem::high(), ConsElem::Var(a)).unwrap();
        kit.add_constraint("default", ConsElem::Var(a), ConsElem::Var(b)).unwrap();

        kit.solve_mt("default").unwrap();

        // Raw constraints are gone, both solutions answer.
        assert!(kit.constraints("default").unwrap().is_empty());
        let kinds: BTreeSet<String> = ["default".to_string()].into();
        let least = kit.least_solution(&kinds).unwrap();
        let greatest = kit.greatest_solution(&kinds).unwrap();
        assert_eq!(least.value_of(b), SecLevel::High);
        assert_eq!(greatest.value_of(b), SecLevel::High);
    }

    #[test]
    fn test_solve_mt_twice_is_an_error() {
        let mut kit = ConstraintKit::new();
        let a = kit.new_var("a");
        kit.add_constraint("default", ConsElem::high(), ConsElem::Var(a)).unwrap();
        kit.solve_mt("default").unwrap();
        assert!(matches!(kit.solve_mt("default"), Err(InfoflowError::LockedKind { .. })));
    }

    #[test]
    fn test_bulk_requires_default_baseline() {
        let mut kit = ConstraintKit::new();
        let a = kit.new_var("a");
        kit.add_constraint("k0", ConsElem::high(), ConsElem::Var(a)).unwrap();
        let err = kit.solve_least_mt(&["k0".to_string()], false, 4).unwrap_err();
        assert!(matches!(err, InfoflowError::UnknownKind { .. }));
    }

    #[test]
    fn test_bulk_matches_individual_solves() {
        // Baseline: chain v0 → v1 → ... → v9. Each query kind taints one
        // distinct head; the bulk answers must match per-kind fresh solves.
        let mut kit = ConstraintKit::new();
        let vars: Vec<_> = (0..10).map(|i| kit.new_var(format!("v{i}"))).collect();
        for w in vars.windows(2) {
            kit.add_constraint("default", ConsElem::Var(w[0]), ConsElem::Var(w[1])).unwrap();
        }
        kit.solve_mt("default").unwrap();

        let mut kinds = Vec::new();
        for (i, v) in vars.iter().enumerate().take(4) {
            let kind = format!("src{i}");
            kit.add_constraint(&kind, ConsElem::high(), ConsElem::Var(*v)).unwrap();
            kinds.push(kind);
        }

        let solutions = kit.solve_least_mt(&kinds, false, 16).unwrap();
        assert_eq!(solutions.len(), 4);

        for (i, soln) in solutions.iter().enumerate() {
            for (j, v) in vars.iter().enumerate() {
                let expected = j >= i; // taint flows down-chain from v_i
                assert_eq!(
                    soln.is_high(*v),
                    expected,
                    "kind {i}: variable v{j} expected {}",
                    if expected { "High" } else { "Low" }
                );
            }
        }
    }

    #[test]
    fn test_bulk_with_default_sinks_baseline() {
        let mut kit = ConstraintKit::new();
        let a = kit.new_var("a");
        let b = kit.new_var("b");
        // default: empty-ish baseline; default-sinks carries the edge a → b
        kit.add_constraint("default", ConsElem::low(), ConsElem::Var(a)).unwrap();
        kit.add_constraint("default-sinks", ConsElem::Var(a), ConsElem::Var(b)).unwrap();
        kit.solve_mt("default").unwrap();
        kit.solve_mt("default-sinks").unwrap();

        kit.add_constraint("q", ConsElem::high(), ConsElem::Var(a)).unwrap();

        let without = kit.solve_least_mt(&["q".to_string()], false, 2).unwrap();
        assert!(!without[0].is_high(b), "sink edge must not apply");

        let mut kit2 = ConstraintKit::new();
        let a2 = kit2.new_var("a");
        let b2 = kit2.new_var("b");
        kit2.add_constraint("default", ConsElem::low(), ConsElem::Var(a2)).unwrap();
        kit2.add_constraint("default-sinks", ConsElem::Var(a2), ConsElem::Var(b2)).unwrap();
        kit2.solve_mt("default").unwrap();
        kit2.solve_mt("default-sinks").unwrap();
        kit2.add_constraint("q", ConsElem::high(), ConsElem::Var(a2)).unwrap();

        let with = kit2.solve_least_mt(&["q".to_string()], true, 2).unwrap();
        assert!(with[0].is_high(b2), "sink edge applies when requested");
    }
}
