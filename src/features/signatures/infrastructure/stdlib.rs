/*
 * Table-driven stdlib signatures
 *
 * Each entry names an external function and declares which parts of the
 * call act as sources and sinks, on which channel:
 *
 * - specifier: Ret, Arg0..Arg4, AllArgs, VarArgs
 * - channel:   V (the value), D (direct pointee), R (reachable memory)
 *
 * The table is sorted by name once and dispatched with binary search. An
 * entry with no sources (or a call with no arguments) summarizes to no
 * flows; symbols like the C++ runtime hooks are listed exactly so the
 * catch-all signature never invents flows for them.
 */

use lazy_static::lazy_static;
use tracing::debug;

use super::registrar::Signature;
use crate::features::infoflow::domain::ContextId;
use crate::features::signatures::domain::FlowRecord;
use crate::shared::models::{CallSite, Module, Type, ValueId};

/// Which part of the call a declaration talks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TSpec {
    Ret,
    Arg0,
    Arg1,
    Arg2,
    Arg3,
    Arg4,
    AllArgs,
    VarArgs,
}

/// Value-only, direct pointee, or all reachable memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TClass {
    V,
    D,
    R,
}

#[derive(Debug, Clone, Copy)]
pub struct TaintDecl {
    pub which: TSpec,
    pub class: TClass,
}

/// Summary of one stdlib call: its sources and its sinks.
#[derive(Debug, Clone)]
pub struct CallSummary {
    pub name: &'static str,
    pub sources: Vec<TaintDecl>,
    pub sinks: Vec<TaintDecl>,
}

fn src(which: TSpec, class: TClass) -> TaintDecl {
    TaintDecl { which, class }
}

fn snk(which: TSpec, class: TClass) -> TaintDecl {
    TaintDecl { which, class }
}

fn entry(name: &'static str, sources: &[TaintDecl], sinks: &[TaintDecl]) -> CallSummary {
    CallSummary { name, sources: sources.to_vec(), sinks: sinks.to_vec() }
}

/// A function known to induce no flows.
fn flowless(name: &'static str) -> CallSummary {
    CallSummary { name, sources: Vec::new(), sinks: Vec::new() }
}

use TClass::{D, R, V};
use TSpec::{AllArgs, Arg0, Arg1, Ret};

lazy_static! {
    /// Name-sorted call summaries.
    static ref CALL_TABLE: Vec<CallSummary> = {
        let mut table = vec![
            // Allocation
            entry("calloc", &[src(AllArgs, V)], &[snk(Ret, V), snk(Ret, D)]),
            flowless("free"),
            entry("malloc", &[src(AllArgs, V)], &[snk(Ret, V), snk(Ret, D)]),
            entry("realloc", &[src(AllArgs, D)], &[snk(AllArgs, D), snk(Ret, D)]),
            // I/O
            entry("_IO_getc", &[src(AllArgs, V)], &[snk(Ret, V)]),
            entry("_IO_putc", &[src(AllArgs, V)], &[snk(Ret, V)]),
            entry("close", &[src(AllArgs, V)], &[snk(Ret, V)]),
            entry("fclose", &[src(AllArgs, V)], &[snk(Ret, V)]),
            entry("feof", &[src(AllArgs, V)], &[snk(Ret, V)]),
            entry("ferror", &[src(AllArgs, V)], &[snk(Ret, V)]),
            entry("fflush", &[src(Arg0, V)], &[snk(Ret, V)]),
            entry("fgetc", &[src(AllArgs, V)], &[snk(Ret, V)]),
            entry("fileno", &[src(AllArgs, V)], &[snk(Ret, V)]),
            entry("fopen", &[src(AllArgs, D), src(AllArgs, V)], &[snk(Ret, V)]),
            entry("fprintf", &[src(AllArgs, D), src(AllArgs, V)], &[snk(Ret, V)]),
            entry("fputc", &[src(AllArgs, V)], &[snk(Ret, V)]),
            entry("fputs", &[src(AllArgs, D), src(AllArgs, V)], &[snk(Ret, V)]),
            entry("fread", &[src(AllArgs, V)], &[snk(Ret, V), snk(Arg0, D)]),
            entry("fwrite", &[src(Arg0, D), src(AllArgs, V)], &[snk(Ret, V)]),
            entry("getc", &[src(AllArgs, V)], &[snk(Ret, V)]),
            entry("open", &[src(AllArgs, V)], &[snk(Ret, V)]),
            entry("printf", &[src(AllArgs, D), src(AllArgs, V)], &[snk(Ret, V)]),
            entry("putc", &[src(AllArgs, V)], &[snk(Ret, V)]),
            entry("putchar", &[src(AllArgs, V)], &[snk(Ret, V)]),
            entry("puts", &[src(Arg0, D)], &[snk(Ret, V)]),
            entry("read", &[src(AllArgs, V)], &[snk(Ret, V), snk(Arg1, D)]),
            entry("ungetc", &[src(AllArgs, V)], &[snk(Ret, V)]),
            entry("vprintf", &[src(AllArgs, V), src(AllArgs, D)], &[snk(Ret, V)]),
            flowless("fseek"),
            flowless("ftell"),
            flowless("lseek"),
            flowless("write"),
            // String/memory
            entry("strlen", &[src(AllArgs, D)], &[snk(Ret, V)]),
            entry("strcpy", &[src(Arg1, D)], &[snk(Arg0, D)]),
            entry("strcmp", &[src(AllArgs, D)], &[snk(Ret, V)]),
            entry("strncmp", &[src(AllArgs, D)], &[snk(Ret, V)]),
            entry("strchr", &[src(AllArgs, D)], &[snk(Ret, V)]),
            entry("strrchr", &[src(AllArgs, D)], &[snk(Ret, V)]),
            entry("memchr", &[src(AllArgs, D)], &[snk(Ret, V)]),
            entry("sprintf", &[src(AllArgs, D)], &[snk(Arg0, R), snk(Ret, V)]),
            entry("snprintf", &[src(AllArgs, D)], &[snk(Arg0, R), snk(Ret, V)]),
            entry("strtod", &[src(AllArgs, D)], &[snk(Arg1, R)]),
            flowless("atof"),
            flowless("memcmp"),
            flowless("strcat"),
            flowless("strcspn"),
            flowless("strerror"),
            flowless("strncat"),
            flowless("strncpy"),
            flowless("strpbrk"),
            flowless("strspn"),
            flowless("strstr"),
            flowless("strtok"),
            flowless("strtol"),
            flowless("strtoul"),
            flowless("vsprintf"),
            // System
            flowless("abort"),
            flowless("clock"),
            flowless("exit"),
            flowless("_exit"),
            flowless("fork"),
            flowless("signal"),
            flowless("unlink"),
            flowless("time"),
            flowless("getcwd"),
            flowless("getenv"),
            flowless("getpagesize"),
            flowless("getpwd"),
            flowless("localtime"),
            flowless("strftime"),
            // Math
            entry("ceil", &[src(AllArgs, V)], &[snk(Ret, V)]),
            entry("cos", &[src(AllArgs, V)], &[snk(Ret, V)]),
            entry("exp", &[src(AllArgs, V)], &[snk(Ret, V)]),
            entry("floor", &[src(AllArgs, V)], &[snk(Ret, V)]),
            entry("log", &[src(AllArgs, V)], &[snk(Ret, V)]),
            entry("pow", &[src(AllArgs, V)], &[snk(Ret, V)]),
            entry("powf", &[src(AllArgs, V)], &[snk(Ret, V)]),
            entry("sin", &[src(AllArgs, V)], &[snk(Ret, V)]),
            entry("sqrt", &[src(AllArgs, V)], &[snk(Ret, V)]),
            entry("tan", &[src(AllArgs, V)], &[snk(Ret, V)]),
            flowless("exp2"),
            flowless("fabs"),
            flowless("ldexp"),
            flowless("log10"),
            // Misc
            flowless("__errno_location"),
            flowless("qsort"),
            entry("____jf_return_arg", &[src(AllArgs, V)], &[snk(Ret, V)]),
            // C++ runtime symbols treated as flow-less
            flowless("_ZNSo3putEc"),
            flowless("_ZNSo5flushEv"),
            flowless("_ZNSolsEi"),
            flowless("_ZSt17__throw_bad_allocv"),
            flowless("_ZSt9terminatev"),
            flowless("_ZdaPv"),
            flowless("_Znam"),
            flowless("__cxa_allocate_exception"),
            flowless("__cxa_begin_catch"),
            flowless("__cxa_end_catch"),
            flowless("__cxa_free_exception"),
            flowless("__cxa_throw"),
            // Not sure
            flowless("__isoc99_fscanf"),
            flowless("__ctype_b_loc"),
            // Exceptions
            flowless("_setjmp"),
            flowless("longjmp"),
            flowless("setjmp"),
        ];
        table.sort_by(|a, b| a.name.cmp(b.name));
        table
    };
}

/// Table-driven signature for common stdlib and runtime calls.
pub struct StdLib;

impl StdLib {
    pub fn new() -> Self {
        StdLib
    }

    fn find_entry(&self, module: &Module, cs: &CallSite<'_>) -> Option<&'static CallSummary> {
        let func = cs.called_function(module)?;
        let name = module.function(func).name.as_str();
        CALL_TABLE
            .binary_search_by(|e| e.name.cmp(name))
            .ok()
            .map(|i| &CALL_TABLE[i])
    }

    /// Resolve a specifier to the concrete values it names at this call.
    /// Out-of-range specifiers resolve to nothing.
    fn values_for(
        &self,
        module: &Module,
        cs: &CallSite<'_>,
        which: TSpec,
    ) -> Vec<ValueId> {
        match which {
            TSpec::Ret => {
                if cs.returns_value(module) {
                    vec![cs.value]
                } else {
                    Vec::new()
                }
            }
            TSpec::Arg0 => cs.arg(0).into_iter().collect(),
            TSpec::Arg1 => cs.arg(1).into_iter().collect(),
            TSpec::Arg2 => cs.arg(2).into_iter().collect(),
            TSpec::Arg3 => cs.arg(3).into_iter().collect(),
            TSpec::Arg4 => cs.arg(4).into_iter().collect(),
            TSpec::AllArgs => cs.args.to_vec(),
            TSpec::VarArgs => {
                let fixed = match &module.value(cs.callee).ty {
                    Type::Func { params, .. } => *params,
                    _ => return Vec::new(),
                };
                cs.args.iter().skip(fixed).copied().collect()
            }
        }
    }

    fn apply(
        &self,
        module: &Module,
        cs: &CallSite<'_>,
        decl: &TaintDecl,
        record: &mut FlowRecord,
        is_source: bool,
    ) {
        let values = self.values_for(module, cs, decl.which);
        match (is_source, decl.class) {
            (true, TClass::V) => record.add_source_values(values),
            (true, TClass::D) => record.add_source_direct_ptrs(values),
            (true, TClass::R) => record.add_source_reach_ptrs(values),
            (false, TClass::V) => record.add_sink_values(values),
            (false, TClass::D) => record.add_sink_direct_ptrs(values),
            (false, TClass::R) => record.add_sink_reach_ptrs(values),
        };
    }
}

impl Default for StdLib {
    fn default() -> Self {
        Self::new()
    }
}

impl Signature for StdLib {
    fn name(&self) -> &'static str {
        "stdlib"
    }

    fn accept(&self, module: &Module, _ctxt: ContextId, cs: &CallSite<'_>) -> bool {
        self.find_entry(module, cs).is_some()
    }

    fn process(&self, module: &Module, ctxt: ContextId, cs: &CallSite<'_>) -> Vec<FlowRecord> {
        let summary = self.find_entry(module, cs).expect("accept checked the entry");
        debug!(callee = summary.name, "using stdlib signature");

        // No declared sources, or nothing to read them from: no flows.
        if summary.sources.is_empty() || cs.args.is_empty() {
            return Vec::new();
        }

        let mut flow = FlowRecord::explicit(ctxt);
        for decl in &summary.sources {
            self.apply(module, cs, decl, &mut flow, true);
        }
        for decl in &summary.sinks {
            self.apply(module, cs, decl, &mut flow, false);
        }
        vec![flow]
    }
}
