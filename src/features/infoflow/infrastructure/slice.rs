/*
 * Slices
 *
 * A slice relates concrete sources to concrete sinks: seed taint from the
 * sources, solve the least fixpoint (forward reachability); seed untaint
 * at the sinks, solve the greatest fixpoint (backward reachability). A
 * value is in the slice when it is forward-reachable and not
 * backward-untainted: `forward ∧ ¬backward`.
 *
 * MultiSlice varies only the source across many queries. Each candidate
 * source gets its own uniquely numbered kind, and all of them are solved
 * at once with the bulk parallel solver against the shared baseline.
 */

use rustc_hash::FxHashMap;

use super::engine::Infoflow;
use super::solution::InfoflowSolution;
use crate::errors::Result;
use crate::features::signatures::domain::FlowRecord;
use crate::shared::models::{FuncId, ValueId};

/// Forward/backward solution pair for one source/sink record.
pub struct Slice {
    forward: InfoflowSolution,
    backward: InfoflowSolution,
}

impl Slice {
    /// Seed the record's sources as tainted (under `<name>-sources`) and
    /// its sinks as untainted (under `<name>-sinks`), then solve both
    /// directions. With `cut_after_sinks`, the forward solution excludes
    /// the `default-sinks` constraints so taint stops at declared sinks.
    pub fn build(
        infoflow: &mut Infoflow,
        name: &str,
        record: &FlowRecord,
        cut_after_sinks: bool,
    ) -> Result<Self> {
        let source_kind = format!("{name}-sources");
        let sink_kind = format!("{name}-sinks");

        for value in record.source_values() {
            infoflow.set_tainted(&source_kind, value)?;
        }
        for value in record.source_direct_ptrs() {
            infoflow.set_direct_ptr_tainted(&source_kind, value)?;
        }
        for value in record.source_reach_ptrs() {
            infoflow.set_reach_ptr_tainted(&source_kind, value)?;
        }
        for func in record.source_vargs() {
            infoflow.set_varg_tainted(&source_kind, func)?;
        }

        for value in record.sink_values() {
            infoflow.set_untainted(&sink_kind, value)?;
        }
        for value in record.sink_direct_ptrs() {
            infoflow.set_direct_ptr_untainted(&sink_kind, value)?;
        }
        for value in record.sink_reach_ptrs() {
            infoflow.set_reach_ptr_untainted(&sink_kind, value)?;
        }
        for func in record.sink_vargs() {
            infoflow.set_varg_untainted(&sink_kind, func)?;
        }

        let forward = infoflow.least_solution([source_kind], false, !cut_after_sinks)?;
        let backward = infoflow.greatest_solution([sink_kind], false)?;

        Ok(Self { forward, backward })
    }

    pub fn value_in_slice(&self, value: ValueId) -> bool {
        self.forward.is_tainted(value) && !self.backward.is_tainted(value)
    }

    pub fn direct_ptr_in_slice(&self, value: ValueId) -> bool {
        self.forward.is_direct_ptr_tainted(value) && !self.backward.is_direct_ptr_tainted(value)
    }

    pub fn reach_ptr_in_slice(&self, value: ValueId) -> bool {
        self.forward.is_reach_ptr_tainted(value) && !self.backward.is_reach_ptr_tainted(value)
    }

    pub fn varg_in_slice(&self, func: FuncId) -> bool {
        self.forward.is_varg_tainted(func) && !self.backward.is_varg_tainted(func)
    }

    pub fn forward(&self) -> &InfoflowSolution {
        &self.forward
    }

    pub fn backward(&self) -> &InfoflowSolution {
        &self.backward
    }
}

/// Many forward slices sharing one backward solution, solved in bulk.
pub struct MultiSlice {
    forward: FxHashMap<ValueId, InfoflowSolution>,
    backward: InfoflowSolution,
}

impl MultiSlice {
    /// One forward solution per candidate source, all against the shared
    /// baseline. The `default` kind (and `default-sinks` when
    /// `cut_after_sinks` is off) must already be solved via `solve_mt`.
    pub fn build(
        infoflow: &mut Infoflow,
        backward: InfoflowSolution,
        kind_prefix: &str,
        sources: &[ValueId],
        cut_after_sinks: bool,
    ) -> Result<Self> {
        let mut kinds = Vec::with_capacity(sources.len());
        for source in sources {
            let kind = format!("{kind_prefix}-sources{}", infoflow.next_slice_id());
            infoflow.set_tainted(&kind, *source)?;
            kinds.push(kind);
        }

        let solutions = infoflow.solve_least_mt(&kinds, !cut_after_sinks)?;
        let forward = sources.iter().copied().zip(solutions).collect();

        Ok(Self { forward, backward })
    }

    /// Is any source endpoint of the record reachable from `source`?
    pub fn source_reachable(&self, source: ValueId, record: &FlowRecord) -> bool {
        record.source_values().any(|v| self.value_in_slice(v, source))
            || record.source_direct_ptrs().any(|v| self.direct_ptr_in_slice(v, source))
            || record.source_reach_ptrs().any(|v| self.reach_ptr_in_slice(v, source))
            || record.source_vargs().any(|f| self.varg_in_slice(f, source))
    }

    pub fn value_in_slice(&self, value: ValueId, source: ValueId) -> bool {
        let forward = self.forward.get(&source).expect("unknown slice source");
        forward.is_tainted(value) && !self.backward.is_tainted(value)
    }

    pub fn direct_ptr_in_slice(&self, value: ValueId, source: ValueId) -> bool {
        let forward = self.forward.get(&source).expect("unknown slice source");
        forward.is_direct_ptr_tainted(value) && !self.backward.is_direct_ptr_tainted(value)
    }

    pub fn reach_ptr_in_slice(&self, value: ValueId, source: ValueId) -> bool {
        let forward = self.forward.get(&source).expect("unknown slice source");
        forward.is_reach_ptr_tainted(value) && !self.backward.is_reach_ptr_tainted(value)
    }

    pub fn varg_in_slice(&self, func: FuncId, source: ValueId) -> bool {
        let forward = self.forward.get(&source).expect("unknown slice source");
        forward.is_varg_tainted(func) && !self.backward.is_varg_tainted(func)
    }
}
