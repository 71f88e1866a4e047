/*
 * Module scan for sources and sinks
 *
 * Walks every instruction once and accumulates one global FlowRecord:
 *
 * - external calls matching the source table taint their returns/arguments
 * - external calls matching the sink table protect their arguments
 * - memcpy/memmove/memset intrinsics sink their first three operands
 * - the size operand of a non-static alloca is a sink
 * - every parameter of main is a source; pointer parameters additionally
 *   source their reachable memory
 * - C++ operator new/delete symbols sink all their arguments
 * - the `____jf_check` helpers are exempt from the tables
 */

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::features::infoflow::domain::ContextId;
use crate::features::signatures::domain::FlowRecord;
use crate::features::source_sink::domain::tables::{
    find_entry, CallTaintSummary, CXX_ALLOC_SINKS, SINK_TAINT_SUMMARIES, SOURCE_TAINT_SUMMARIES,
};
use crate::shared::models::{CallSite, FuncId, Intrinsic, Module, Opcode, Type, ValueId};

/// Accumulated taint endpoints of one call or function.
#[derive(Debug, Default)]
struct TaintSets {
    values: FxHashSet<ValueId>,
    direct_ptrs: FxHashSet<ValueId>,
    reach_ptrs: FxHashSet<ValueId>,
}

/// The module-wide source/sink record and its membership queries.
#[derive(Debug, Default)]
pub struct SourceSinkAnalysis {
    record: FlowRecord,
}

impl SourceSinkAnalysis {
    /// Scan a module once.
    pub fn run(module: &Module) -> Self {
        let mut sources = TaintSets::default();
        let mut sinks = TaintSets::default();

        for function in module.functions() {
            Self::identify_sources_for_function(module, function.id, &mut sources);

            for block in &function.blocks {
                for inst in module.block_insts(*block) {
                    match &inst.op {
                        Opcode::Call { .. } | Opcode::Invoke { .. } => {
                            let cs = module.call_site(inst.id).expect("call opcode");
                            Self::visit_call(module, &cs, &mut sources, &mut sinks);
                        }
                        Opcode::Alloca { size, is_static } => {
                            // The size of a dynamic stack allocation is a
                            // sensitive sink.
                            if !is_static {
                                sinks.values.insert(*size);
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        let mut record = FlowRecord::explicit(ContextId::DEFAULT);
        record.add_source_values(sources.values.iter().copied());
        record.add_source_direct_ptrs(sources.direct_ptrs.iter().copied());
        record.add_source_reach_ptrs(sources.reach_ptrs.iter().copied());
        record.add_sink_values(sinks.values.iter().copied());
        record.add_sink_direct_ptrs(sinks.direct_ptrs.iter().copied());
        record.add_sink_reach_ptrs(sinks.reach_ptrs.iter().copied());

        debug!(
            value_sources = record.source_values().count(),
            value_sinks = record.sink_values().count(),
            "source/sink scan complete"
        );

        Self { record }
    }

    fn visit_call(
        module: &Module,
        cs: &CallSite<'_>,
        sources: &mut TaintSets,
        sinks: &mut TaintSets,
    ) {
        // Intrinsic memory transfers are handled here rather than through
        // the tables.
        if let Some(intr) = cs.intrinsic {
            match intr {
                Intrinsic::MemCpy | Intrinsic::MemMove | Intrinsic::MemSet => {
                    // Destination, source/value, and length operands.
                    for i in 0..3 {
                        if let Some(arg) = cs.arg(i) {
                            sinks.values.insert(arg);
                        }
                    }
                }
                _ => {}
            }
            return;
        }

        Self::identify_sources_for_call(module, cs, sources);
        Self::identify_sinks_for_call(module, cs, sinks);
    }

    fn called_external_name<'m>(module: &'m Module, cs: &CallSite<'_>) -> Option<&'m str> {
        let func = cs.called_function(module)?;
        let f = module.function(func);
        // Only external functions are summarized by the tables.
        if !f.is_declaration() {
            return None;
        }
        Some(f.name.as_str())
    }

    fn identify_sources_for_call(module: &Module, cs: &CallSite<'_>, sources: &mut TaintSets) {
        let Some(name) = Self::called_external_name(module, cs) else {
            return;
        };
        if name.starts_with("____jf_check") {
            return;
        }
        let Some(entry) = find_entry(&SOURCE_TAINT_SUMMARIES, name) else {
            return;
        };

        Self::apply_summary(module, cs, &entry.value, &mut sources.values, false);
        Self::apply_summary(module, cs, &entry.direct, &mut sources.direct_ptrs, true);
        Self::apply_summary(module, cs, &entry.reach, &mut sources.reach_ptrs, true);
    }

    fn identify_sinks_for_call(module: &Module, cs: &CallSite<'_>, sinks: &mut TaintSets) {
        let Some(name) = Self::called_external_name(module, cs) else {
            return;
        };
        if name.starts_with("____jf_check") {
            return;
        }

        // C++ allocation/free operators: every argument is a sink, pointer
        // arguments also sink their direct memory.
        if CXX_ALLOC_SINKS.contains(&name) {
            for arg in cs.args {
                sinks.values.insert(*arg);
                if module.value(*arg).ty.is_pointer() {
                    sinks.direct_ptrs.insert(*arg);
                }
            }
            return;
        }

        let Some(entry) = find_entry(&SINK_TAINT_SUMMARIES, name) else {
            return;
        };
        Self::apply_summary(module, cs, &entry.value, &mut sinks.values, false);
        Self::apply_summary(module, cs, &entry.direct, &mut sinks.direct_ptrs, true);
        Self::apply_summary(module, cs, &entry.reach, &mut sinks.reach_ptrs, true);
    }

    /// Resolve one summary against a concrete call. `pointers_only` filters
    /// to pointer-typed values (the memory channels).
    fn apply_summary(
        module: &Module,
        cs: &CallSite<'_>,
        summary: &CallTaintSummary,
        into: &mut FxHashSet<ValueId>,
        pointers_only: bool,
    ) {
        let mut add = |v: ValueId| {
            if !pointers_only || module.value(v).ty.is_pointer() {
                into.insert(v);
            }
        };

        if summary.ret && cs.returns_value(module) {
            add(cs.value);
        }
        for index in summary.args {
            if let Some(arg) = cs.arg(*index) {
                add(arg);
            }
        }
        if summary.varargs {
            let fixed = match &module.value(cs.callee).ty {
                Type::Func { params, .. } => *params,
                _ => cs.args.len(),
            };
            for arg in cs.args.iter().skip(fixed) {
                add(*arg);
            }
        }
    }

    /// Internal functions contribute sources only for `main`: all its
    /// parameters, with reachable memory for the pointer ones.
    fn identify_sources_for_function(module: &Module, func: FuncId, sources: &mut TaintSets) {
        let f = module.function(func);
        if f.name != "main" {
            return;
        }
        for param in &f.params {
            sources.values.insert(*param);
            if module.value(*param).ty.is_pointer() {
                sources.reach_ptrs.insert(*param);
            }
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn sources_and_sinks(&self) -> &FlowRecord {
        &self.record
    }

    pub fn value_is_sink(&self, v: ValueId) -> bool {
        self.record.value_is_sink(v)
    }

    pub fn direct_ptr_is_sink(&self, v: ValueId) -> bool {
        self.record.direct_ptr_is_sink(v)
    }

    pub fn reach_ptr_is_sink(&self, v: ValueId) -> bool {
        self.record.reach_ptr_is_sink(v)
    }

    pub fn varg_is_sink(&self, f: FuncId) -> bool {
        self.record.varg_is_sink(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::ModuleBuilder;

    #[test]
    fn test_getenv_return_is_a_source() {
        let mut mb = ModuleBuilder::new("m");
        let getenv = mb.declare_function("getenv", &[Type::Ptr], Type::Ptr, false);
        let f = mb.begin_function("f", &[], Type::Void, false);
        let bb = mb.add_block(f, "entry");
        let name = mb.constant("FOO", Type::Ptr);
        let callee = mb.function_value(getenv);
        let ret = mb.call(bb, callee, vec![name], Type::Ptr);
        mb.ret(bb, None);
        let m = mb.finish();

        let ssa = SourceSinkAnalysis::run(&m);
        assert!(ssa.sources_and_sinks().source_values().any(|v| v == ret));
        assert!(ssa.sources_and_sinks().source_direct_ptrs().any(|v| v == ret));
    }

    #[test]
    fn test_system_argument_is_a_sink() {
        let mut mb = ModuleBuilder::new("m");
        let system = mb.declare_function("system", &[Type::Ptr], Type::Int, false);
        let f = mb.begin_function("f", &[("cmd", Type::Ptr)], Type::Void, false);
        let bb = mb.add_block(f, "entry");
        let cmd = mb.param(f, 0);
        let callee = mb.function_value(system);
        mb.call(bb, callee, vec![cmd], Type::Int);
        mb.ret(bb, None);
        let m = mb.finish();

        let ssa = SourceSinkAnalysis::run(&m);
        assert!(ssa.value_is_sink(cmd));
        assert!(ssa.direct_ptr_is_sink(cmd));
    }

    #[test]
    fn test_main_params_are_sources() {
        let mut mb = ModuleBuilder::new("m");
        let main = mb.begin_function(
            "main",
            &[("argc", Type::Int), ("argv", Type::Ptr)],
            Type::Int,
            false,
        );
        let bb = mb.add_block(main, "entry");
        let zero = mb.constant("0", Type::Int);
        mb.ret(bb, Some(zero));
        let m = mb.finish();

        let ssa = SourceSinkAnalysis::run(&m);
        let argc = m.function_by_name("main").unwrap().params[0];
        let argv = m.function_by_name("main").unwrap().params[1];
        assert!(ssa.sources_and_sinks().source_values().any(|v| v == argc));
        assert!(ssa.sources_and_sinks().source_values().any(|v| v == argv));
        assert!(ssa.sources_and_sinks().source_reach_ptrs().any(|v| v == argv));
        assert!(!ssa.sources_and_sinks().source_reach_ptrs().any(|v| v == argc));
    }

    #[test]
    fn test_dynamic_alloca_size_is_a_sink() {
        let mut mb = ModuleBuilder::new("m");
        let f = mb.begin_function("f", &[("n", Type::Int)], Type::Void, false);
        let bb = mb.add_block(f, "entry");
        let n = mb.param(f, 0);
        mb.alloca(bb, n, false);
        let k = mb.constant("16", Type::Int);
        mb.alloca(bb, k, true);
        mb.ret(bb, None);
        let m = mb.finish();

        let ssa = SourceSinkAnalysis::run(&m);
        assert!(ssa.value_is_sink(n), "dynamic alloca size is a sink");
        assert!(!ssa.value_is_sink(k), "static alloca size is not");
    }

    #[test]
    fn test_memcpy_intrinsic_operands_are_sinks() {
        let mut mb = ModuleBuilder::new("m");
        let memcpy = mb.declare_function(
            "llvm.memcpy.p0.p0.i64",
            &[Type::Ptr, Type::Ptr, Type::Int, Type::Int],
            Type::Void,
            false,
        );
        let f = mb.begin_function(
            "f",
            &[("d", Type::Ptr), ("s", Type::Ptr), ("n", Type::Int)],
            Type::Void,
            false,
        );
        let bb = mb.add_block(f, "entry");
        let (d, s, n) = (mb.param(f, 0), mb.param(f, 1), mb.param(f, 2));
        let align = mb.constant("1", Type::Int);
        let callee = mb.function_value(memcpy);
        mb.call_intrinsic(bb, callee, vec![d, s, n, align], Type::Void, Intrinsic::MemCpy);
        mb.ret(bb, None);
        let m = mb.finish();

        let ssa = SourceSinkAnalysis::run(&m);
        assert!(ssa.value_is_sink(d));
        assert!(ssa.value_is_sink(s));
        assert!(ssa.value_is_sink(n));
        assert!(!ssa.value_is_sink(align));
    }

    #[test]
    fn test_cxx_operator_new_args_are_sinks() {
        let mut mb = ModuleBuilder::new("m");
        let opnew = mb.declare_function("_Znwm", &[Type::Int], Type::Ptr, false);
        let f = mb.begin_function("f", &[("sz", Type::Int)], Type::Void, false);
        let bb = mb.add_block(f, "entry");
        let sz = mb.param(f, 0);
        let callee = mb.function_value(opnew);
        mb.call(bb, callee, vec![sz], Type::Ptr);
        mb.ret(bb, None);
        let m = mb.finish();

        let ssa = SourceSinkAnalysis::run(&m);
        assert!(ssa.value_is_sink(sz));
    }
}
