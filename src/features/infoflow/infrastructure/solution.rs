/*
 * Solution queries
 *
 * An InfoflowSolution bundles a solved (merged) partial solution with the
 * maps from values, abstract locations, and functions to their constraint
 * variables, plus the policy for entities the solution never saw: the
 * least solution reports them untainted, the greatest tainted.
 *
 * The pointer predicates answer true when *any* abstract location in the
 * corresponding points-to set evaluates High.
 */

use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::debug;

use crate::features::constraints::domain::VarId;
use crate::features::constraints::infrastructure::PartialSolution;
use crate::features::infoflow::ports::{AbstractLoc, PointsToProvider};
use crate::shared::models::{FuncId, ValueId};

/// A solved constraint system, queryable by IR entity.
pub struct InfoflowSolution {
    soln: PartialSolution,
    /// Policy for entities with no variable in the solution
    default_tainted: bool,
    value_map: FxHashMap<ValueId, VarId>,
    loc_map: FxHashMap<AbstractLoc, VarId>,
    varg_map: FxHashMap<FuncId, VarId>,
    pti: Arc<dyn PointsToProvider>,
}

impl InfoflowSolution {
    pub(crate) fn new(
        soln: PartialSolution,
        default_tainted: bool,
        value_map: FxHashMap<ValueId, VarId>,
        loc_map: FxHashMap<AbstractLoc, VarId>,
        varg_map: FxHashMap<FuncId, VarId>,
        pti: Arc<dyn PointsToProvider>,
    ) -> Self {
        Self { soln, default_tainted, value_map, loc_map, varg_map, pti }
    }

    /// Is the security level of the value High?
    pub fn is_tainted(&self, value: ValueId) -> bool {
        match self.value_map.get(&value) {
            Some(var) => self.soln.is_high(*var),
            None => {
                debug!(?value, "value not in solution");
                self.default_tainted
            }
        }
    }

    fn loc_is_tainted(&self, loc: AbstractLoc) -> bool {
        match self.loc_map.get(&loc) {
            Some(var) => self.soln.is_high(*var),
            None => {
                debug!(loc, "abstract location not in solution");
                self.default_tainted
            }
        }
    }

    /// Is any memory the value points to directly tainted?
    pub fn is_direct_ptr_tainted(&self, value: ValueId) -> bool {
        self.pti.direct(value).iter().any(|loc| self.loc_is_tainted(*loc))
    }

    /// Is any memory reachable from the value tainted?
    pub fn is_reach_ptr_tainted(&self, value: ValueId) -> bool {
        self.pti.reachable(value).iter().any(|loc| self.loc_is_tainted(*loc))
    }

    /// Is the varargs structure of the function tainted?
    pub fn is_varg_tainted(&self, func: FuncId) -> bool {
        match self.varg_map.get(&func) {
            Some(var) => self.soln.is_high(*var),
            None => {
                debug!(?func, "varargs not in solution");
                self.default_tainted
            }
        }
    }

    /// The unmapped-entity policy of this solution.
    pub fn default_tainted(&self) -> bool {
        self.default_tainted
    }
}
