/*
 * Application layer: the one-call analysis façade
 *
 * Wires a module and its providers into the engine, runs the
 * interprocedural fixpoint, and exposes the taint/untaint, solve, and
 * slicing surface plus aggregate statistics.
 */

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::infrastructure::{Infoflow, InfoflowSolution, MultiSlice, Slice};
use super::ports::{CallGraphProvider, PointsToProvider, PostDominatorProvider};
use crate::config::InfoflowConfig;
use crate::errors::Result;
use crate::features::signatures::domain::FlowRecord;
use crate::shared::models::{FuncId, Module, ValueId};

/// Aggregate counters of one analysis run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisStats {
    /// Analysis units processed (function × context, with re-runs)
    pub units_processed: usize,
    /// Distinct interned contexts
    pub contexts: usize,
    /// Constraints added to the explicit (default) kind
    pub explicit_constraints: usize,
    /// Constraints added to the implicit kind
    pub implicit_constraints: usize,
}

/// High-level driver for a whole-module information flow analysis.
pub struct InfoflowAnalysis {
    engine: Infoflow,
}

impl InfoflowAnalysis {
    /// Analysis over a module with the default in-memory providers.
    pub fn new(module: Arc<Module>, config: InfoflowConfig) -> Self {
        Self { engine: Infoflow::new(module, config) }
    }

    /// Analysis with explicit providers.
    pub fn with_providers(
        module: Arc<Module>,
        config: InfoflowConfig,
        pti: Arc<dyn PointsToProvider>,
        cg: Arc<dyn CallGraphProvider>,
        pdt: Arc<dyn PostDominatorProvider>,
    ) -> Self {
        Self { engine: Infoflow::with_providers(module, config, pti, cg, pdt) }
    }

    /// Run the interprocedural fixpoint, generating the default, sink,
    /// and implicit constraint sets.
    pub fn run(&mut self) -> Result<()> {
        self.engine.run()
    }

    pub fn engine(&self) -> &Infoflow {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Infoflow {
        &mut self.engine
    }

    /// The module-level sources and sinks found by the pre-scan.
    pub fn sources_and_sinks(&self) -> &FlowRecord {
        self.engine.source_sink().sources_and_sinks()
    }

    // ------------------------------------------------------------------
    // Taint seeding (delegated)
    // ------------------------------------------------------------------

    pub fn set_tainted(&mut self, kind: &str, value: ValueId) -> Result<()> {
        self.engine.set_tainted(kind, value)
    }

    pub fn set_untainted(&mut self, kind: &str, value: ValueId) -> Result<()> {
        self.engine.set_untainted(kind, value)
    }

    pub fn set_direct_ptr_tainted(&mut self, kind: &str, value: ValueId) -> Result<()> {
        self.engine.set_direct_ptr_tainted(kind, value)
    }

    pub fn set_direct_ptr_untainted(&mut self, kind: &str, value: ValueId) -> Result<()> {
        self.engine.set_direct_ptr_untainted(kind, value)
    }

    pub fn set_reach_ptr_tainted(&mut self, kind: &str, value: ValueId) -> Result<()> {
        self.engine.set_reach_ptr_tainted(kind, value)
    }

    pub fn set_reach_ptr_untainted(&mut self, kind: &str, value: ValueId) -> Result<()> {
        self.engine.set_reach_ptr_untainted(kind, value)
    }

    pub fn set_varg_tainted(&mut self, kind: &str, func: FuncId) -> Result<()> {
        self.engine.set_varg_tainted(kind, func)
    }

    pub fn set_varg_untainted(&mut self, kind: &str, func: FuncId) -> Result<()> {
        self.engine.set_varg_untainted(kind, func)
    }

    // ------------------------------------------------------------------
    // Solving (delegated)
    // ------------------------------------------------------------------

    pub fn least_solution(
        &mut self,
        kinds: impl IntoIterator<Item = String>,
        implicit: bool,
        sinks: bool,
    ) -> Result<InfoflowSolution> {
        self.engine.least_solution(kinds, implicit, sinks)
    }

    pub fn greatest_solution(
        &mut self,
        kinds: impl IntoIterator<Item = String>,
        implicit: bool,
    ) -> Result<InfoflowSolution> {
        self.engine.greatest_solution(kinds, implicit)
    }

    pub fn solve_mt(&mut self, kind: &str) -> Result<()> {
        self.engine.solve_mt(kind)
    }

    pub fn solve_least_mt(
        &mut self,
        kinds: &[String],
        use_default_sinks: bool,
    ) -> Result<Vec<InfoflowSolution>> {
        self.engine.solve_least_mt(kinds, use_default_sinks)
    }

    /// Build a slice from one source/sink record.
    pub fn slice(
        &mut self,
        name: &str,
        record: &FlowRecord,
        cut_after_sinks: bool,
    ) -> Result<Slice> {
        Slice::build(&mut self.engine, name, record, cut_after_sinks)
    }

    /// Build a multi-source slice sharing one backward solution.
    pub fn multi_slice(
        &mut self,
        backward: InfoflowSolution,
        kind_prefix: &str,
        sources: &[ValueId],
        cut_after_sinks: bool,
    ) -> Result<MultiSlice> {
        MultiSlice::build(&mut self.engine, backward, kind_prefix, sources, cut_after_sinks)
    }

    /// Aggregate statistics of the run so far.
    pub fn stats(&self) -> AnalysisStats {
        AnalysisStats {
            units_processed: self.engine.units_processed(),
            contexts: self.engine.context_count(),
            explicit_constraints: self.engine.kit().explicit_count(),
            implicit_constraints: self.engine.kit().implicit_count(),
        }
    }
}
