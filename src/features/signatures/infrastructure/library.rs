/*
 * Built-in signature library
 *
 * - OverflowChecks: the `____jf_check` family of overflow check helpers.
 *   All argument values flow into the return explicitly, the calling block
 *   implicitly; no memory flows.
 * - ArgsToRet: catch-all. If the callee returns a value, all argument
 *   values flow into it.
 * - TaintReachable: conservative signature tainting everything reachable
 *   from pointer arguments in both directions. Available but not part of
 *   the default registration; too expensive against real call loads.
 * - NoFlows: assumes calls induce nothing. Available for experiments.
 */

use tracing::debug;

use super::registrar::Signature;
use crate::features::infoflow::domain::ContextId;
use crate::features::signatures::domain::FlowRecord;
use crate::shared::models::{CallSite, Module};

/// Signature for the `____jf_check` overflow check family.
pub struct OverflowChecks;

impl Signature for OverflowChecks {
    fn name(&self) -> &'static str {
        "overflow-checks"
    }

    fn accept(&self, module: &Module, _ctxt: ContextId, cs: &CallSite<'_>) -> bool {
        cs.called_function(module)
            .map(|f| module.function(f).name.starts_with("____jf_check"))
            .unwrap_or(false)
    }

    fn process(&self, module: &Module, ctxt: ContextId, cs: &CallSite<'_>) -> Vec<FlowRecord> {
        let mut exp = FlowRecord::explicit(ctxt);
        let mut imp = FlowRecord::implicit(ctxt);

        imp.add_source_value(module.block_value(cs.block));
        for arg in cs.args {
            exp.add_source_value(*arg);
        }
        debug_assert!(cs.returns_value(module), "overflow check returning void");

        exp.add_sink_value(cs.value);
        imp.add_sink_value(cs.value);

        vec![imp, exp]
    }
}

/// Catch-all: every argument value flows into the return value.
pub struct ArgsToRet;

impl Signature for ArgsToRet {
    fn name(&self) -> &'static str {
        "args-to-ret"
    }

    fn accept(&self, _module: &Module, _ctxt: ContextId, _cs: &CallSite<'_>) -> bool {
        true
    }

    fn process(&self, module: &Module, ctxt: ContextId, cs: &CallSite<'_>) -> Vec<FlowRecord> {
        debug!(callee = %module.value(cs.callee).name, "using args-to-ret signature");
        let mut flows = Vec::new();
        if cs.returns_value(module) {
            let mut exp = FlowRecord::explicit(ctxt);
            for arg in cs.args {
                exp.add_source_value(*arg);
            }
            exp.add_sink_value(cs.value);
            flows.push(exp);
        }
        flows
    }
}

/// Conservative signature: all arguments and everything reachable from
/// pointer arguments are sources; reachable memory and the return value
/// are sinks.
pub struct TaintReachable;

impl Signature for TaintReachable {
    fn name(&self) -> &'static str {
        "taint-reachable"
    }

    fn accept(&self, _module: &Module, _ctxt: ContextId, _cs: &CallSite<'_>) -> bool {
        true
    }

    fn process(&self, module: &Module, ctxt: ContextId, cs: &CallSite<'_>) -> Vec<FlowRecord> {
        debug!(callee = %module.value(cs.callee).name, "using taint-reachable signature");
        let mut exp = FlowRecord::explicit(ctxt);
        let mut imp = FlowRecord::implicit(ctxt);

        // Implicit from the pc of the call site and the function pointer.
        imp.add_source_value(module.block_value(cs.block));
        imp.add_source_value(cs.callee);

        for arg in cs.args {
            exp.add_source_value(*arg);
            if module.value(*arg).ty.is_pointer() {
                exp.add_source_reach_ptr(*arg);
                imp.add_source_value(*arg);

                exp.add_sink_reach_ptr(*arg);
                imp.add_sink_reach_ptr(*arg);
            }
        }

        if cs.returns_value(module) {
            imp.add_sink_value(cs.value);
            exp.add_sink_value(cs.value);
        }

        vec![imp, exp]
    }
}

/// Assumes no flows happen as a result of the call.
pub struct NoFlows;

impl Signature for NoFlows {
    fn name(&self) -> &'static str {
        "no-flows"
    }

    fn accept(&self, _module: &Module, _ctxt: ContextId, _cs: &CallSite<'_>) -> bool {
        true
    }

    fn process(&self, _module: &Module, _ctxt: ContextId, _cs: &CallSite<'_>) -> Vec<FlowRecord> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{InstId, ModuleBuilder, Type};

    fn module_with_call(callee_name: &str, ret: Type) -> (Module, InstId) {
        let mut mb = ModuleBuilder::new("m");
        let ext = mb.declare_function(callee_name, &[Type::Int, Type::Ptr], ret.clone(), false);
        let f = mb.begin_function("caller", &[("x", Type::Int), ("p", Type::Ptr)], Type::Void, false);
        let bb = mb.add_block(f, "entry");
        let x = mb.param(f, 0);
        let p = mb.param(f, 1);
        let callee = mb.function_value(ext);
        mb.call(bb, callee, vec![x, p], ret);
        mb.ret(bb, None);
        let m = mb.finish();
        let site = m.call_sites_in(m.function_by_name("caller").unwrap().id)[0];
        (m, site)
    }

    #[test]
    fn test_overflow_checks_accepts_by_prefix() {
        let (m, site) = module_with_call("____jf_check_mul", Type::Int);
        let cs = m.call_site(site).unwrap();
        assert!(OverflowChecks.accept(&m, ContextId::DEFAULT, &cs));

        let (m2, site2) = module_with_call("memfrob", Type::Int);
        let cs2 = m2.call_site(site2).unwrap();
        assert!(!OverflowChecks.accept(&m2, ContextId::DEFAULT, &cs2));
    }

    #[test]
    fn test_args_to_ret_skips_void_callees() {
        let (m, site) = module_with_call("log_it", Type::Void);
        let cs = m.call_site(site).unwrap();
        assert!(ArgsToRet.process(&m, ContextId::DEFAULT, &cs).is_empty());

        let (m2, site2) = module_with_call("compute", Type::Int);
        let cs2 = m2.call_site(site2).unwrap();
        let flows = ArgsToRet.process(&m2, ContextId::DEFAULT, &cs2);
        assert_eq!(flows.len(), 1);
        let rec = &flows[0];
        assert!(!rec.is_implicit());
        assert!(rec.value_is_sink(cs2.value));
        assert_eq!(rec.source_values().count(), 2);
    }

    #[test]
    fn test_taint_reachable_marks_pointer_args_both_ways() {
        let (m, site) = module_with_call("mystery", Type::Int);
        let cs = m.call_site(site).unwrap();
        let flows = TaintReachable.process(&m, ContextId::DEFAULT, &cs);
        assert_eq!(flows.len(), 2);
        let exp = &flows[1];
        let p = cs.args[1];
        assert!(exp.source_reach_ptrs().any(|v| v == p));
        assert!(exp.reach_ptr_is_sink(p));
    }

    #[test]
    fn test_no_flows_is_empty() {
        let (m, site) = module_with_call("whatever", Type::Int);
        let cs = m.call_site(site).unwrap();
        assert!(NoFlows.process(&m, ContextId::DEFAULT, &cs).is_empty());
    }
}
