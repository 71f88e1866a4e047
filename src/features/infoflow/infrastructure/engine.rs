/*
 * Infoflow engine
 *
 * Owns the constraint kit, the per-entity variable pools, and the driver
 * state; lowers flow records into constraints; exposes the taint/untaint
 * API and the solution entry points.
 *
 * Variable pools:
 * - one variable per (context, value)      - context-sensitive
 * - one variable per abstract location     - context-insensitive
 * - one variable per (context, function)   - the varargs structure
 * - per value/function, two context-insensitive summary variables linked
 *   by `summary-source ⊑ ctx-var ⊑ summary-sink` in the default kind;
 *   these are the context-insensitive public surface that solutions and
 *   the taint/untaint API read and write.
 */

use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use super::driver::DriverState;
use super::providers::{MapPointsTo, ModuleCallGraph, PostDoms};
use super::solution::InfoflowSolution;
use crate::config::InfoflowConfig;
use crate::errors::{InfoflowError, Result};
use crate::features::constraints::domain::{
    is_reserved_kind, kind_for, ConsElem, VarId, KIND_DEFAULT, KIND_DEFAULT_SINKS, KIND_IMPLICIT,
    KIND_IMPLICIT_SINKS,
};
use crate::features::constraints::infrastructure::ConstraintKit;
use crate::features::infoflow::domain::{ContextId, ContextManager};
use crate::features::infoflow::ports::{
    AbstractLoc, AbstractLocSet, CallGraphProvider, PointsToProvider, PostDominatorProvider,
};
use crate::features::signatures::domain::FlowRecord;
use crate::features::signatures::infrastructure::SignatureRegistrar;
use crate::features::source_sink::SourceSinkAnalysis;
use crate::shared::models::{FuncId, Module, ValueId};

/// The constraint-based, context-sensitive information flow engine.
pub struct Infoflow {
    pub(super) module: Arc<Module>,
    pub(super) config: InfoflowConfig,
    pub(super) pti: Arc<dyn PointsToProvider>,
    pub(super) cg: Arc<dyn CallGraphProvider>,
    pub(super) pdt: Arc<dyn PostDominatorProvider>,
    pub(super) source_sink: SourceSinkAnalysis,
    pub(super) registrar: SignatureRegistrar,
    pub(super) kit: ConstraintKit,
    pub(super) contexts: ContextManager,
    pub(super) driver: DriverState,

    value_vars: FxHashMap<(ContextId, ValueId), VarId>,
    loc_vars: FxHashMap<AbstractLoc, VarId>,
    varg_vars: FxHashMap<(ContextId, FuncId), VarId>,

    summary_source_value: FxHashMap<ValueId, VarId>,
    summary_sink_value: FxHashMap<ValueId, VarId>,
    summary_source_varg: FxHashMap<FuncId, VarId>,
    summary_sink_varg: FxHashMap<FuncId, VarId>,

    slice_counter: u64,
}

impl Infoflow {
    /// Build an engine with the default in-memory providers.
    pub fn new(module: Arc<Module>, config: InfoflowConfig) -> Self {
        let cg = Arc::new(ModuleCallGraph::build(&module));
        let pdt = Arc::new(PostDoms::build(&module));
        Self::with_providers(module, config, Arc::new(MapPointsTo::new()), cg, pdt)
    }

    /// Build an engine against explicit providers.
    pub fn with_providers(
        module: Arc<Module>,
        config: InfoflowConfig,
        pti: Arc<dyn PointsToProvider>,
        cg: Arc<dyn CallGraphProvider>,
        pdt: Arc<dyn PostDominatorProvider>,
    ) -> Self {
        let source_sink = SourceSinkAnalysis::run(&module);
        let contexts = ContextManager::new(config.context_strategy);
        Self {
            module,
            config,
            pti,
            cg,
            pdt,
            source_sink,
            registrar: SignatureRegistrar::with_default_signatures(),
            kit: ConstraintKit::new(),
            contexts,
            driver: DriverState::new(),
            value_vars: FxHashMap::default(),
            loc_vars: FxHashMap::default(),
            varg_vars: FxHashMap::default(),
            summary_source_value: FxHashMap::default(),
            summary_sink_value: FxHashMap::default(),
            summary_source_varg: FxHashMap::default(),
            summary_sink_varg: FxHashMap::default(),
            slice_counter: 0,
        }
    }

    pub fn module(&self) -> Arc<Module> {
        Arc::clone(&self.module)
    }

    pub fn config(&self) -> &InfoflowConfig {
        &self.config
    }

    pub fn kit(&self) -> &ConstraintKit {
        &self.kit
    }

    pub fn source_sink(&self) -> &SourceSinkAnalysis {
        &self.source_sink
    }

    pub fn drop_at_sinks(&self) -> bool {
        self.config.drop_at_sinks
    }

    pub fn context_count(&self) -> usize {
        self.contexts.context_count()
    }

    pub fn units_processed(&self) -> usize {
        self.driver.units_processed
    }

    pub(super) fn current_context(&self) -> ContextId {
        self.driver.current.map(|u| u.ctx).unwrap_or(ContextId::DEFAULT)
    }

    // ------------------------------------------------------------------
    // Points-to access
    // ------------------------------------------------------------------

    pub(super) fn locs_for_value(&self, value: ValueId) -> AbstractLocSet {
        self.pti.direct(value).clone()
    }

    pub(super) fn reachable_locs_for_value(&self, value: ValueId) -> AbstractLocSet {
        self.pti.reachable(value).clone()
    }

    // ------------------------------------------------------------------
    // Variable pools
    // ------------------------------------------------------------------

    fn summary_source_value_var(&mut self, value: ValueId) -> VarId {
        if let Some(v) = self.summary_source_value.get(&value) {
            return *v;
        }
        let desc = format!("src:{}", self.module.value(value).name);
        let var = self.kit.new_var(desc);
        self.summary_source_value.insert(value, var);
        var
    }

    fn summary_sink_value_var(&mut self, value: ValueId) -> VarId {
        if let Some(v) = self.summary_sink_value.get(&value) {
            return *v;
        }
        let desc = format!("snk:{}", self.module.value(value).name);
        let var = self.kit.new_var(desc);
        self.summary_sink_value.insert(value, var);
        var
    }

    fn summary_source_varg_var(&mut self, func: FuncId) -> VarId {
        if let Some(v) = self.summary_source_varg.get(&func) {
            return *v;
        }
        let desc = format!("src:varargs:{}", self.module.function(func).name);
        let var = self.kit.new_var(desc);
        self.summary_source_varg.insert(func, var);
        var
    }

    fn summary_sink_varg_var(&mut self, func: FuncId) -> VarId {
        if let Some(v) = self.summary_sink_varg.get(&func) {
            return *v;
        }
        let desc = format!("snk:varargs:{}", self.module.function(func).name);
        let var = self.kit.new_var(desc);
        self.summary_sink_varg.insert(func, var);
        var
    }

    /// The context-sensitive variable of a value, created on first use and
    /// linked to its context-insensitive summary pair.
    pub(super) fn value_var(&mut self, ctx: ContextId, value: ValueId) -> Result<VarId> {
        if let Some(v) = self.value_vars.get(&(ctx, value)) {
            return Ok(*v);
        }
        let desc = format!("{}@{}", self.module.value(value).name, ctx.0);
        let var = self.kit.new_var(desc);
        self.value_vars.insert((ctx, value), var);

        let source = self.summary_source_value_var(value);
        let sink = self.summary_sink_value_var(value);
        self.kit
            .add_constraint(KIND_DEFAULT, ConsElem::Var(source), ConsElem::Var(var))?;
        self.kit
            .add_constraint(KIND_DEFAULT, ConsElem::Var(var), ConsElem::Var(sink))?;
        Ok(var)
    }

    /// The context-insensitive variable of an abstract location.
    pub(super) fn loc_var(&mut self, loc: AbstractLoc) -> VarId {
        if let Some(v) = self.loc_vars.get(&loc) {
            return *v;
        }
        let var = self.kit.new_var(format!("loc:{loc}"));
        self.loc_vars.insert(loc, var);
        var
    }

    /// The varargs variable of a function in a context, linked to its
    /// summary pair like value variables.
    pub(super) fn varg_var(&mut self, ctx: ContextId, func: FuncId) -> Result<VarId> {
        if let Some(v) = self.varg_vars.get(&(ctx, func)) {
            return Ok(*v);
        }
        let desc = format!("varargs:{}@{}", self.module.function(func).name, ctx.0);
        let var = self.kit.new_var(desc);
        self.varg_vars.insert((ctx, func), var);

        let source = self.summary_source_varg_var(func);
        let sink = self.summary_sink_varg_var(func);
        self.kit
            .add_constraint(KIND_DEFAULT, ConsElem::Var(source), ConsElem::Var(var))?;
        self.kit
            .add_constraint(KIND_DEFAULT, ConsElem::Var(var), ConsElem::Var(sink))?;
        Ok(var)
    }

    fn constrain_value(
        &mut self,
        implicit: bool,
        sink: bool,
        ctx: ContextId,
        value: ValueId,
        lub: ConsElem,
    ) -> Result<()> {
        let var = self.value_var(ctx, value)?;
        self.kit
            .add_constraint(kind_for(implicit, sink), lub, ConsElem::Var(var))
    }

    fn constrain_varg(
        &mut self,
        implicit: bool,
        sink: bool,
        ctx: ContextId,
        func: FuncId,
        lub: ConsElem,
    ) -> Result<()> {
        let var = self.varg_var(ctx, func)?;
        self.kit
            .add_constraint(kind_for(implicit, sink), lub, ConsElem::Var(var))
    }

    fn constrain_loc(
        &mut self,
        implicit: bool,
        sink: bool,
        loc: AbstractLoc,
        lub: ConsElem,
    ) -> Result<()> {
        let var = self.loc_var(loc);
        self.kit
            .add_constraint(kind_for(implicit, sink), lub, ConsElem::Var(var))
    }

    // ------------------------------------------------------------------
    // Flow record lowering
    // ------------------------------------------------------------------

    /// Lower one flow record: the join of all sources flows into each
    /// sink, in the kind selected by (implicit, sink-partition).
    ///
    /// With drop-at-sinks enabled, sources that are themselves declared
    /// sinks are split off into a separate join that only feeds the
    /// `*-sinks` kinds, so default taint cannot propagate past a declared
    /// sink unless a solution asks for it.
    pub(super) fn constrain_flow_record(&mut self, record: &FlowRecord) -> Result<()> {
        let drop_at_sinks = self.config.drop_at_sinks;

        let mut sources: Vec<ConsElem> = Vec::new();
        let mut sink_sources: Vec<ConsElem> = Vec::new();

        for value in record.source_values() {
            let var = self.value_var(record.source_context(), value)?;
            if !drop_at_sinks || !self.source_sink.value_is_sink(value) {
                sources.push(ConsElem::Var(var));
            } else {
                sink_sources.push(ConsElem::Var(var));
            }
        }
        for func in record.source_vargs() {
            let var = self.varg_var(record.source_context(), func)?;
            if !drop_at_sinks || !self.source_sink.varg_is_sink(func) {
                sources.push(ConsElem::Var(var));
            } else {
                sink_sources.push(ConsElem::Var(var));
            }
        }

        // Memory-based sources expand through the points-to sets.
        let mut source_locs: AbstractLocSet = AbstractLocSet::new();
        let mut sink_source_locs: AbstractLocSet = AbstractLocSet::new();
        for value in record.source_direct_ptrs() {
            let locs = self.locs_for_value(value);
            if !drop_at_sinks || !self.source_sink.direct_ptr_is_sink(value) {
                source_locs.extend(locs);
            } else {
                sink_source_locs.extend(locs);
            }
        }
        for value in record.source_reach_ptrs() {
            let locs = self.reachable_locs_for_value(value);
            if !drop_at_sinks || !self.source_sink.reach_ptr_is_sink(value) {
                source_locs.extend(locs);
            } else {
                sink_source_locs.extend(locs);
            }
        }
        for loc in source_locs {
            sources.push(ConsElem::Var(self.loc_var(loc)));
        }
        for loc in sink_source_locs {
            sink_sources.push(ConsElem::Var(self.loc_var(loc)));
        }

        let reg_flow = !sources.is_empty();
        let sink_flow = !sink_sources.is_empty();

        // Some DirectPtr sources have no corresponding abstract locations;
        // a record can legitimately end up with no sources at all.
        let source_elem = if reg_flow {
            Some(self.kit.upper_bound_all(sources)?)
        } else {
            None
        };
        let sink_source_elem = if sink_flow {
            Some(self.kit.upper_bound_all(sink_sources)?)
        } else {
            None
        };

        let implicit = record.is_implicit();

        for value in record.sink_values().collect::<Vec<_>>() {
            if let Some(src) = source_elem {
                self.constrain_value(implicit, false, record.sink_context(), value, src)?;
            }
            if let Some(src) = sink_source_elem {
                self.constrain_value(implicit, true, record.sink_context(), value, src)?;
            }
        }
        for func in record.sink_vargs().collect::<Vec<_>>() {
            if let Some(src) = source_elem {
                self.constrain_varg(implicit, false, record.sink_context(), func, src)?;
            }
            if let Some(src) = sink_source_elem {
                self.constrain_varg(implicit, true, record.sink_context(), func, src)?;
            }
        }

        // Gather sink memory locations once across both pointer channels.
        let mut sink_locs: AbstractLocSet = AbstractLocSet::new();
        for value in record.sink_direct_ptrs() {
            sink_locs.extend(self.locs_for_value(value));
        }
        for value in record.sink_reach_ptrs() {
            sink_locs.extend(self.reachable_locs_for_value(value));
        }
        for loc in sink_locs {
            if let Some(src) = source_elem {
                self.constrain_loc(implicit, false, loc, src)?;
            }
            if let Some(src) = sink_source_elem {
                self.constrain_loc(implicit, true, loc, src)?;
            }
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Taint / untaint API
    // ------------------------------------------------------------------

    fn check_user_kind(kind: &str) -> Result<()> {
        if is_reserved_kind(kind) {
            return Err(InfoflowError::reserved(kind));
        }
        Ok(())
    }

    /// Constrain `H ⊑ value` in the given kind.
    pub fn set_tainted(&mut self, kind: &str, value: ValueId) -> Result<()> {
        Self::check_user_kind(kind)?;
        let var = self.summary_source_value_var(value);
        self.kit.add_constraint(kind, ConsElem::high(), ConsElem::Var(var))
    }

    /// Constrain `value ⊑ L` in the given kind.
    pub fn set_untainted(&mut self, kind: &str, value: ValueId) -> Result<()> {
        Self::check_user_kind(kind)?;
        let var = self.summary_sink_value_var(value);
        self.kit.add_constraint(kind, ConsElem::Var(var), ConsElem::low())
    }

    /// Taint every location the value points to directly. Values with an
    /// empty points-to set are a silent no-op.
    pub fn set_direct_ptr_tainted(&mut self, kind: &str, value: ValueId) -> Result<()> {
        Self::check_user_kind(kind)?;
        let locs = self.locs_for_value(value);
        if locs.is_empty() {
            debug!(?value, "no abstract locations to taint");
        }
        for loc in locs {
            let var = self.loc_var(loc);
            self.kit.add_constraint(kind, ConsElem::high(), ConsElem::Var(var))?;
        }
        Ok(())
    }

    pub fn set_direct_ptr_untainted(&mut self, kind: &str, value: ValueId) -> Result<()> {
        Self::check_user_kind(kind)?;
        let locs = self.locs_for_value(value);
        if locs.is_empty() {
            debug!(?value, "no abstract locations to untaint");
        }
        for loc in locs {
            let var = self.loc_var(loc);
            self.kit.add_constraint(kind, ConsElem::Var(var), ConsElem::low())?;
        }
        Ok(())
    }

    /// Taint every location reachable from the value.
    pub fn set_reach_ptr_tainted(&mut self, kind: &str, value: ValueId) -> Result<()> {
        Self::check_user_kind(kind)?;
        for loc in self.reachable_locs_for_value(value) {
            let var = self.loc_var(loc);
            self.kit.add_constraint(kind, ConsElem::high(), ConsElem::Var(var))?;
        }
        Ok(())
    }

    pub fn set_reach_ptr_untainted(&mut self, kind: &str, value: ValueId) -> Result<()> {
        Self::check_user_kind(kind)?;
        for loc in self.reachable_locs_for_value(value) {
            let var = self.loc_var(loc);
            self.kit.add_constraint(kind, ConsElem::Var(var), ConsElem::low())?;
        }
        Ok(())
    }

    /// Taint the varargs structure of a function.
    pub fn set_varg_tainted(&mut self, kind: &str, func: FuncId) -> Result<()> {
        Self::check_user_kind(kind)?;
        let var = self.summary_source_varg_var(func);
        self.kit.add_constraint(kind, ConsElem::high(), ConsElem::Var(var))
    }

    pub fn set_varg_untainted(&mut self, kind: &str, func: FuncId) -> Result<()> {
        Self::check_user_kind(kind)?;
        let var = self.summary_sink_varg_var(func);
        self.kit.add_constraint(kind, ConsElem::Var(var), ConsElem::low())
    }

    // ------------------------------------------------------------------
    // Solutions
    // ------------------------------------------------------------------

    /// Least fixpoint over the default constraints plus the given kinds.
    /// Unconstrained variables are untainted; values missing from the
    /// solution report untainted.
    pub fn least_solution(
        &mut self,
        kinds: impl IntoIterator<Item = String>,
        implicit: bool,
        sinks: bool,
    ) -> Result<InfoflowSolution> {
        let mut all: BTreeSet<String> = kinds.into_iter().collect();
        all.insert(KIND_DEFAULT.to_string());
        if sinks {
            all.insert(KIND_DEFAULT_SINKS.to_string());
        }
        if implicit {
            all.insert(KIND_IMPLICIT.to_string());
        }
        if implicit && sinks {
            all.insert(KIND_IMPLICIT_SINKS.to_string());
        }
        self.ensure_reserved_kinds(&all);
        let soln = self.kit.least_solution(&all)?;
        Ok(InfoflowSolution::new(
            soln,
            false,
            self.summary_sink_value.clone(),
            self.loc_vars.clone(),
            self.summary_sink_varg.clone(),
            Arc::clone(&self.pti),
        ))
    }

    /// Greatest fixpoint over the default (and default-sinks) constraints
    /// plus the given kinds. Unconstrained variables are tainted; values
    /// missing from the solution report tainted.
    pub fn greatest_solution(
        &mut self,
        kinds: impl IntoIterator<Item = String>,
        implicit: bool,
    ) -> Result<InfoflowSolution> {
        let mut all: BTreeSet<String> = kinds.into_iter().collect();
        all.insert(KIND_DEFAULT.to_string());
        all.insert(KIND_DEFAULT_SINKS.to_string());
        if implicit {
            all.insert(KIND_IMPLICIT.to_string());
            all.insert(KIND_IMPLICIT_SINKS.to_string());
        }
        self.ensure_reserved_kinds(&all);
        let soln = self.kit.greatest_solution(&all)?;
        Ok(InfoflowSolution::new(
            soln,
            true,
            self.summary_source_value.clone(),
            self.loc_vars.clone(),
            self.summary_source_varg.clone(),
            Arc::clone(&self.pti),
        ))
    }

    /// Solve both fixpoints of one kind on two workers.
    pub fn solve_mt(&mut self, kind: &str) -> Result<()> {
        self.ensure_reserved_kind(kind);
        self.kit.solve_mt(kind)
    }

    /// Bulk parallel least solve against the pre-solved default baseline.
    pub fn solve_least_mt(
        &mut self,
        kinds: &[String],
        use_default_sinks: bool,
    ) -> Result<Vec<InfoflowSolution>> {
        let workers = self.config.parallel_workers;
        let solutions = self.kit.solve_least_mt(kinds, use_default_sinks, workers)?;
        Ok(solutions
            .into_iter()
            .map(|soln| {
                InfoflowSolution::new(
                    soln,
                    false,
                    self.summary_sink_value.clone(),
                    self.loc_vars.clone(),
                    self.summary_sink_varg.clone(),
                    Arc::clone(&self.pti),
                )
            })
            .collect())
    }

    /// A reserved kind may be empty when a trivial module produced no
    /// flows of that class; solving must still succeed.
    fn ensure_reserved_kinds(&mut self, kinds: &BTreeSet<String>) {
        for kind in kinds {
            self.ensure_reserved_kind(kind);
        }
    }

    fn ensure_reserved_kind(&mut self, kind: &str) {
        if is_reserved_kind(kind) && !self.kit.has_kind(kind) && !self.kit.is_locked(kind) {
            // Materialize the empty kind: L ⊑ L carries no information.
            let _ = self.kit.add_constraint(kind, ConsElem::low(), ConsElem::low());
        }
    }

    pub(super) fn next_slice_id(&mut self) -> u64 {
        let id = self.slice_counter;
        self.slice_counter += 1;
        id
    }
}
