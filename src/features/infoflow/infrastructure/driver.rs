/*
 * Interprocedural driver
 *
 * A worklist fixpoint over analysis units (function × context). Analyzing
 * a unit generates its constraints; call sites request callee results,
 * registering a dependency edge. A callee whose summary is not yet good
 * enough answers with its current (possibly bottom) summary and is
 * enqueued; when a unit's summary changes, every dependent unit re-enters
 * the queue.
 *
 * Entry points: the module root (main) in the default context, or every
 * externally linkable defined function when there is no root. After the
 * queue drains, a second pass enqueues defined functions that were never
 * reached so that unreachable-but-defined code is still constrained.
 */

use ahash::AHashMap;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use super::engine::Infoflow;
use crate::errors::Result;
use crate::features::infoflow::domain::{
    AnalysisRecord, AnalysisUnit, ContextId, SummaryLattice, Unit, WorkQueue,
};
use crate::shared::models::{CallSite, FuncId, Linkage, Module};

/// Worklist, records, and dependency bookkeeping of the driver.
#[derive(Debug, Default)]
pub(crate) struct DriverState {
    pub(crate) work: WorkQueue,
    pub(crate) records: AHashMap<AnalysisUnit, AnalysisRecord<Unit, Unit>>,
    pub(crate) dependencies: FxHashMap<AnalysisUnit, FxHashSet<AnalysisUnit>>,
    pub(crate) analyzed: FxHashSet<FuncId>,
    pub(crate) current: Option<AnalysisUnit>,
    pub(crate) units_processed: usize,
}

impl DriverState {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

impl Infoflow {
    /// Run the interprocedural analysis to its fixpoint: generate the
    /// default, implicit, and sink constraint sets for the whole module.
    pub fn run(&mut self) -> Result<()> {
        let module = self.module();

        self.seed_start_items(&module);
        self.drain(&module)?;

        // Second pass: unreachable-but-defined functions.
        let missed: Vec<FuncId> = module
            .functions()
            .filter(|f| !f.is_declaration() && !self.driver.analyzed.contains(&f.id))
            .map(|f| f.id)
            .collect();
        for func in missed {
            let unit = AnalysisUnit::new(func, self.contexts.initial_context(func));
            self.driver.records.entry(unit).or_insert_with(AnalysisRecord::bottom);
            self.driver.work.enqueue(unit);
        }
        self.drain(&module)?;

        self.driver.current = None;
        debug!(
            units = self.driver.units_processed,
            contexts = self.contexts.context_count(),
            explicit = self.kit.explicit_count(),
            implicit = self.kit.implicit_count(),
            "interprocedural fixpoint reached"
        );
        Ok(())
    }

    fn seed_start_items(&mut self, module: &Module) {
        let mut start: Vec<FuncId> = Vec::new();
        match self.cg.root(module) {
            Some(root) => start.push(root),
            None => {
                // No main: any externally linkable function is an entry.
                start.extend(
                    module
                        .functions()
                        .filter(|f| !f.is_declaration() && f.linkage == Linkage::External)
                        .map(|f| f.id),
                );
            }
        }
        for func in start {
            let unit = AnalysisUnit::new(func, self.contexts.initial_context(func));
            self.driver.records.insert(unit, AnalysisRecord::bottom());
            self.driver.work.enqueue(unit);
        }
    }

    fn drain(&mut self, module: &Module) -> Result<()> {
        while let Some(unit) = self.driver.work.dequeue() {
            self.process_unit(module, unit)?;
        }
        Ok(())
    }

    fn process_unit(&mut self, module: &Module, unit: AnalysisUnit) -> Result<()> {
        self.driver.current = Some(unit);
        let record = self
            .driver
            .records
            .entry(unit)
            .or_insert_with(AnalysisRecord::bottom)
            .clone();

        let output = self.run_on_context(module, unit, record.input)?;
        self.driver.analyzed.insert(unit.func);
        self.driver.units_processed += 1;
        self.driver
            .records
            .insert(unit, AnalysisRecord { input: record.input, output });

        // Re-enqueue consumers when the summary changed.
        if output != record.output {
            if let Some(deps) = self.driver.dependencies.get(&unit) {
                let deps: Vec<AnalysisUnit> = deps.iter().copied().collect();
                self.driver.work.enqueue_all(deps);
            }
        }
        Ok(())
    }

    fn run_on_context(
        &mut self,
        module: &Module,
        unit: AnalysisUnit,
        _input: Unit,
    ) -> Result<Unit> {
        debug!(
            function = %module.function(unit.func).name,
            context = %self.contexts.describe(unit.ctx),
            "analyzing unit"
        );
        self.generate_function_constraints(module, unit.func)?;
        Ok(Unit)
    }

    fn generate_function_constraints(&mut self, module: &Module, func: FuncId) -> Result<()> {
        let mut flows = Vec::new();
        for block in &module.function(func).blocks {
            for inst_id in &module.block(*block).insts {
                let inst = module.inst(*inst_id);
                self.instruction_flows_internal(module, inst, true, &mut flows)?;
            }
        }
        for flow in &flows {
            self.constrain_flow_record(flow)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Callee result requests
    // ------------------------------------------------------------------

    /// Current summary for a unit; schedules (re)analysis when the unit is
    /// new or its recorded input does not cover the requested one. Never
    /// blocks: a not-yet-good-enough answer comes back as the current
    /// summary and the caller re-runs when it improves.
    pub(super) fn get_analysis_result(&mut self, unit: AnalysisUnit, input: Unit) -> Unit {
        let known = self.driver.records.contains_key(&unit);
        let record = self
            .driver
            .records
            .entry(unit)
            .or_insert_with(AnalysisRecord::bottom)
            .clone();

        if known && input.leq(&record.input) {
            return record.output;
        }
        // Not good enough yet: schedule (re)analysis and answer with the
        // current summary. The caller re-runs if it improves.
        self.request_processing(unit, input);
        self.driver.records.get(&unit).map(|r| r.output).unwrap_or_default()
    }

    /// Join the requested input into the unit's record, register the
    /// dependency of the currently analyzed unit, and enqueue.
    fn request_processing(&mut self, unit: AnalysisUnit, input: Unit) {
        let record = self
            .driver
            .records
            .entry(unit)
            .or_insert_with(AnalysisRecord::bottom);
        record.input = input.join(&record.input);

        if let Some(current) = self.driver.current {
            self.driver.dependencies.entry(unit).or_default().insert(current);
        }
        self.driver.work.enqueue(unit);
    }

    /// Arity compatibility of a candidate callee.
    pub(super) fn function_is_callable(&self, module: &Module, cs: &CallSite<'_>, func: FuncId) -> bool {
        let f = module.function(func);
        if cs.arg_count() < f.params.len() {
            return false;
        }
        if !f.varargs && cs.arg_count() != f.params.len() {
            return false;
        }
        true
    }

    /// Analyze all possible callees of a call site and join their
    /// summaries.
    pub(super) fn get_call_result(&mut self, module: &Module, cs: &CallSite<'_>) -> Result<Unit> {
        // Intrinsics go straight to their signatures.
        if cs.is_intrinsic() {
            return self.signature_for_external_call(module, cs);
        }

        let current = self.current_context();
        let new_ctx = self.contexts.update_context(current, cs.caller, cs.inst);

        // Fast-path direct calls.
        if let Some(func) = cs.called_function(module) {
            if !module.function(func).is_declaration() {
                return Ok(self.get_analysis_result(AnalysisUnit::new(func, new_ctx), Unit));
            }
            return self.signature_for_external_call(module, cs);
        }

        let targets = self.cg.callees(module, cs.inst);
        let indirect_ctx = self.indirect_context(current, cs, new_ctx, true);
        let external_ctx = self.indirect_context(current, cs, new_ctx, false);

        let mut output = Unit::bottom();
        let mut use_signature = targets.calls_external;

        for func in &targets.functions {
            if !self.function_is_callable(module, cs, *func) {
                continue;
            }
            if module.function(*func).is_declaration() {
                use_signature = true;
            } else {
                let unit = AnalysisUnit::new(*func, indirect_ctx);
                output = output.join(&self.get_analysis_result(unit, Unit));
            }
        }

        if targets.external_calling {
            for func in self.cg.external_calling_candidates(module) {
                if !self.function_is_callable(module, cs, func) {
                    continue;
                }
                if module.function(func).is_declaration() {
                    use_signature = true;
                } else {
                    let unit = AnalysisUnit::new(func, external_ctx);
                    output = output.join(&self.get_analysis_result(unit, Unit));
                }
            }
        }

        if use_signature {
            output = output.join(&self.signature_for_external_call(module, cs)?);
        }
        Ok(output)
    }

    fn indirect_context(
        &mut self,
        current: ContextId,
        cs: &CallSite<'_>,
        new_ctx: ContextId,
        indirect: bool,
    ) -> ContextId {
        let collapse = if indirect {
            self.config.collapse_indirect_context
        } else {
            self.config.collapse_external_context
        };
        if collapse {
            self.contexts.update_indirect_context(current, cs.inst)
        } else {
            new_ctx
        }
    }

    /// Defined code that `get_call_result` would analyze for this call
    /// site, with the contexts it would use.
    pub(super) fn invokable_code(
        &mut self,
        module: &Module,
        cs: &CallSite<'_>,
    ) -> Vec<(FuncId, ContextId)> {
        if cs.is_intrinsic() {
            return Vec::new();
        }

        let current = self.current_context();
        let new_ctx = self.contexts.update_context(current, cs.caller, cs.inst);

        if let Some(func) = cs.called_function(module) {
            if !module.function(func).is_declaration() {
                return vec![(func, new_ctx)];
            }
            return Vec::new();
        }

        let targets = self.cg.callees(module, cs.inst);
        let indirect_ctx = self.indirect_context(current, cs, new_ctx, true);
        let external_ctx = self.indirect_context(current, cs, new_ctx, false);

        let mut callees = Vec::new();
        for func in &targets.functions {
            if self.function_is_callable(module, cs, *func)
                && !module.function(*func).is_declaration()
            {
                callees.push((*func, indirect_ctx));
            }
        }
        if targets.external_calling {
            for func in self.cg.external_calling_candidates(module) {
                if self.function_is_callable(module, cs, func)
                    && !module.function(func).is_declaration()
                {
                    callees.push((func, external_ctx));
                }
            }
        }
        callees.sort();
        callees.dedup();
        callees
    }

    /// Will this call site consult the signature registrar?
    pub(super) fn uses_external_signature(&self, module: &Module, cs: &CallSite<'_>) -> bool {
        if cs.is_intrinsic() {
            return true;
        }
        if let Some(func) = cs.called_function(module) {
            return module.function(func).is_declaration();
        }

        let targets = self.cg.callees(module, cs.inst);
        if targets.calls_external {
            return true;
        }
        let declared_candidate = |func: &FuncId| {
            self.function_is_callable(module, cs, *func) && module.function(*func).is_declaration()
        };
        if targets.functions.iter().any(declared_candidate) {
            return true;
        }
        if targets.external_calling {
            return self
                .cg
                .external_calling_candidates(module)
                .iter()
                .any(declared_candidate);
        }
        false
    }

    /// Summarize an external call through the signature registrar and
    /// lower the resulting flow records.
    pub(super) fn signature_for_external_call(
        &mut self,
        module: &Module,
        cs: &CallSite<'_>,
    ) -> Result<Unit> {
        let flows = self.registrar.process(module, self.current_context(), cs)?;
        for record in &flows {
            self.constrain_flow_record(record)?;
        }
        Ok(Unit)
    }
}
