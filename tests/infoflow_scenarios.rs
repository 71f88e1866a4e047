//! End-to-end scenarios over small SSA modules: explicit propagation,
//! sanitization, context sensitivity, indirect calls, implicit flows,
//! memory intrinsics, sink partitioning, slicing, and the bulk solver.

use std::sync::Arc;

use infoflow_ir::{InfoflowAnalysis, InfoflowConfig, Intrinsic, ModuleBuilder, Type, ValueId};
use infoflow_ir::features::infoflow::infrastructure::{MapPointsTo, ModuleCallGraph, PostDoms};
use infoflow_ir::FlowRecord;

fn kinds(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// int x = getenv("FOO"); int y = x + 1; use(y);
#[test]
fn getenv_taint_reaches_use() {
    let mut mb = ModuleBuilder::new("scenario1");
    let getenv = mb.declare_function("getenv", &[Type::Ptr], Type::Ptr, false);
    let use_fn = mb.declare_function("use_value", &[Type::Ptr], Type::Int, false);

    let main = mb.begin_function("main", &[], Type::Int, false);
    let bb = mb.add_block(main, "entry");
    let foo = mb.constant("FOO", Type::Ptr);
    let one = mb.constant("1", Type::Int);
    let getenv_v = mb.function_value(getenv);
    let use_v = mb.function_value(use_fn);
    let x = mb.call(bb, getenv_v, vec![foo], Type::Ptr);
    let y = mb.binary(bb, x, one, Type::Ptr);
    let used = mb.call(bb, use_v, vec![y], Type::Int);
    let zero = mb.constant("0", Type::Int);
    mb.ret(bb, Some(zero));
    let module = Arc::new(mb.finish());

    let mut analysis = InfoflowAnalysis::new(Arc::clone(&module), InfoflowConfig::default());
    analysis.run().unwrap();

    // Seed the module-level sources found by the scan (getenv's return).
    let sources: Vec<ValueId> = analysis.sources_and_sinks().source_values().collect();
    assert!(sources.contains(&x), "getenv return must be a scanned source");
    for v in sources {
        analysis.set_tainted("env", v).unwrap();
    }

    let least = analysis.least_solution(kinds(&["env"]), false, false).unwrap();
    assert!(least.is_tainted(x), "x flows from getenv");
    assert!(least.is_tainted(y), "y = x + 1 inherits the taint");
    assert!(least.is_tainted(used), "use's result sees the tainted argument");
    assert!(!least.is_tainted(zero), "unrelated constant stays clean");

    // Sanitizing y removes it from the greatest (may-be-tainted) view
    // without touching the least view of x.
    analysis.set_untainted("sanitize", y).unwrap();
    let greatest = analysis.greatest_solution(kinds(&["sanitize"]), false).unwrap();
    assert!(!greatest.is_tainted(y), "y is sanitized");

    let least_again = analysis.least_solution(kinds(&["env"]), false, false).unwrap();
    assert!(least_again.is_tainted(x), "x keeps its taint");
}

/// A helper returning its argument, called with a tainted value from one
/// function and a clean value from another: only the tainted caller's
/// result may be tainted under k=1 caller sensitivity.
#[test]
fn context_sensitive_returns() {
    let mut mb = ModuleBuilder::new("ctx");
    let helper = mb.begin_function("helper", &[("a", Type::Int)], Type::Int, false);
    let hb = mb.add_block(helper, "entry");
    let a = mb.param(helper, 0);
    mb.ret(hb, Some(a));

    let f1 = mb.begin_function("caller_hot", &[], Type::Int, false);
    let b1 = mb.add_block(f1, "entry");
    let t = mb.constant("secret", Type::Int);
    let hv = mb.function_value(helper);
    let r1 = mb.call(b1, hv, vec![t], Type::Int);
    mb.ret(b1, Some(r1));

    let f2 = mb.begin_function("caller_cold", &[], Type::Int, false);
    let b2 = mb.add_block(f2, "entry");
    let u = mb.constant("benign", Type::Int);
    let r2 = mb.call(b2, hv, vec![u], Type::Int);
    mb.ret(b2, Some(r2));

    let main = mb.begin_function("main", &[], Type::Int, false);
    let bm = mb.add_block(main, "entry");
    let c1 = mb.call(bm, mb.function_value(f1), vec![], Type::Int);
    let _c2 = mb.call(bm, mb.function_value(f2), vec![], Type::Int);
    mb.ret(bm, Some(c1));
    let module = Arc::new(mb.finish());

    let mut analysis = InfoflowAnalysis::new(module, InfoflowConfig::default());
    analysis.run().unwrap();
    analysis.set_tainted("src", t).unwrap();

    let least = analysis.least_solution(kinds(&["src"]), false, false).unwrap();
    assert!(least.is_tainted(r1), "tainted caller's result is tainted");
    assert!(
        !least.is_tainted(r2),
        "clean caller's result stays clean under k=1 contexts"
    );
}

/// Indirect call through a function pointer with one defined and one
/// external candidate: the defined callee is analyzed, the external one
/// goes through its signature, and the call result joins both.
#[test]
fn indirect_call_joins_defined_and_external() {
    let mut mb = ModuleBuilder::new("indirect");
    let f = mb.begin_function("identity", &[("a", Type::Int)], Type::Int, false);
    let fb = mb.add_block(f, "entry");
    let fa = mb.param(f, 0);
    mb.ret(fb, Some(fa));

    let ext = mb.declare_function("transform", &[Type::Int], Type::Int, false);

    let start = mb.begin_function("start", &[("fp", Type::Ptr)], Type::Int, false);
    let sb = mb.add_block(start, "entry");
    let x = mb.constant("x", Type::Int);
    // Take both candidates' addresses so the call graph sees them.
    let slot = mb.global("slot");
    let fv = mb.function_value(f);
    let ev = mb.function_value(ext);
    mb.store(sb, fv, slot);
    mb.store(sb, ev, slot);
    let fp = mb.param(start, 0);
    let r = mb.call(sb, fp, vec![x], Type::Int);
    mb.ret(sb, Some(r));
    let module = Arc::new(mb.finish());

    let mut analysis = InfoflowAnalysis::new(Arc::clone(&module), InfoflowConfig::default());
    analysis.run().unwrap();
    analysis.set_tainted("src", x).unwrap();

    let least = analysis.least_solution(kinds(&["src"]), false, false).unwrap();
    assert!(least.is_tainted(r), "call result joins both candidate flows");
    assert!(
        least.is_tainted(fa),
        "defined candidate was analyzed with the tainted argument"
    );
}

/// if (c) { y = 1 } else { y = 2 } with tainted c: the phi is tainted only
/// when the implicit kind participates.
#[test]
fn implicit_flow_through_branch() {
    let mut mb = ModuleBuilder::new("implicit");
    let f = mb.begin_function("choose", &[("c", Type::Int)], Type::Int, false);
    let entry = mb.add_block(f, "entry");
    let then_bb = mb.add_block(f, "then");
    let else_bb = mb.add_block(f, "else");
    let merge = mb.add_block(f, "merge");

    let c = mb.param(f, 0);
    let one = mb.constant("1", Type::Int);
    let two = mb.constant("2", Type::Int);
    mb.branch(entry, Some(c), vec![then_bb, else_bb]);
    mb.branch(then_bb, None, vec![merge]);
    mb.branch(else_bb, None, vec![merge]);
    let y = mb.phi(merge, vec![(one, then_bb), (two, else_bb)], Type::Int);
    mb.ret(merge, Some(y));
    let module = Arc::new(mb.finish());

    let mut analysis = InfoflowAnalysis::new(module, InfoflowConfig::default());
    analysis.run().unwrap();
    analysis.set_tainted("cond", c).unwrap();

    let explicit_only = analysis.least_solution(kinds(&["cond"]), false, false).unwrap();
    assert!(
        !explicit_only.is_tainted(y),
        "no explicit path from c to the phi"
    );

    let with_implicit = analysis.least_solution(kinds(&["cond"]), true, false).unwrap();
    assert!(
        with_implicit.is_tainted(y),
        "control dependence taints the phi under the implicit kind"
    );
}

/// memcpy(dst, src, n) with tainted *src: the destination's direct memory
/// becomes tainted, and the length operand is a scanned sink.
#[test]
fn memcpy_propagates_memory_taint() {
    let mut mb = ModuleBuilder::new("memcpy");
    let memcpy = mb.declare_function(
        "llvm.memcpy.p0.p0.i64",
        &[Type::Ptr, Type::Ptr, Type::Int, Type::Int],
        Type::Void,
        false,
    );
    let f = mb.begin_function(
        "copy",
        &[("dst", Type::Ptr), ("src", Type::Ptr), ("n", Type::Int)],
        Type::Void,
        false,
    );
    let bb = mb.add_block(f, "entry");
    let (dst, src, n) = (mb.param(f, 0), mb.param(f, 1), mb.param(f, 2));
    let align = mb.constant("1", Type::Int);
    let mv = mb.function_value(memcpy);
    mb.call_intrinsic(bb, mv, vec![dst, src, n, align], Type::Void, Intrinsic::MemCpy);
    mb.ret(bb, None);
    let module = Arc::new(mb.finish());

    let pti = Arc::new(
        MapPointsTo::new().with_direct(dst, [1]).with_direct(src, [2]),
    );
    let cg = Arc::new(ModuleCallGraph::build(&module));
    let pdt = Arc::new(PostDoms::build(&module));
    let mut analysis = InfoflowAnalysis::with_providers(
        Arc::clone(&module),
        InfoflowConfig::default(),
        pti,
        cg,
        pdt,
    );
    analysis.run().unwrap();

    assert!(
        analysis.engine().source_sink().value_is_sink(n),
        "memcpy length operand is a declared sink"
    );

    analysis.set_direct_ptr_tainted("src", src).unwrap();
    let least = analysis.least_solution(kinds(&["src"]), false, false).unwrap();
    assert!(least.is_direct_ptr_tainted(dst), "dst memory receives src memory");
    assert!(least.is_direct_ptr_tainted(src));
}

/// With drop_at_sinks, taint does not propagate past a declared sink
/// unless the sink kinds are requested.
#[test]
fn drop_at_sinks_partitions_flows() {
    let mut mb = ModuleBuilder::new("dropsinks");
    let system = mb.declare_function("system", &[Type::Int], Type::Int, false);
    let f = mb.begin_function("f", &[("a", Type::Int)], Type::Int, false);
    let bb = mb.add_block(f, "entry");
    let a = mb.param(f, 0);
    let one = mb.constant("1", Type::Int);
    let sv = mb.function_value(system);
    mb.call(bb, sv, vec![a], Type::Int);
    let b = mb.binary(bb, a, one, Type::Int);
    mb.ret(bb, Some(b));
    let module = Arc::new(mb.finish());

    let config = InfoflowConfig::default().with_drop_at_sinks(true);
    let mut analysis = InfoflowAnalysis::new(module, config);
    analysis.run().unwrap();
    analysis.set_tainted("t", a).unwrap();

    let cut = analysis.least_solution(kinds(&["t"]), false, false).unwrap();
    assert!(
        !cut.is_tainted(b),
        "a is a declared sink: its taint is cut from the default kinds"
    );

    let full = analysis.least_solution(kinds(&["t"]), false, true).unwrap();
    assert!(full.is_tainted(b), "the sink kinds restore the flow");
}

/// Slice over a chain source -> v -> w -> sink: the intermediates are in
/// the slice, values past the sink are not.
#[test]
fn slice_contains_exactly_the_chain() {
    let mut mb = ModuleBuilder::new("slice");
    let f = mb.begin_function("f", &[("s", Type::Int)], Type::Int, false);
    let bb = mb.add_block(f, "entry");
    let s = mb.param(f, 0);
    let one = mb.constant("1", Type::Int);
    let v = mb.binary(bb, s, one, Type::Int);
    let w = mb.binary(bb, v, one, Type::Int);
    let past = mb.binary(bb, w, one, Type::Int);
    let unrelated = mb.binary(bb, one, one, Type::Int);
    mb.ret(bb, Some(past));
    let module = Arc::new(mb.finish());

    let mut analysis = InfoflowAnalysis::new(module, InfoflowConfig::default());
    analysis.run().unwrap();

    let mut record = FlowRecord::default();
    record.add_source_value(s);
    record.add_sink_value(w);

    let slice = analysis.slice("chain", &record, false).unwrap();
    assert!(slice.value_in_slice(s), "the source itself is in the slice");
    assert!(slice.value_in_slice(v), "intermediate value is in the slice");
    assert!(
        !slice.value_in_slice(past),
        "values past the sink are forward-tainted but sink-unreachable"
    );
    assert!(!slice.value_in_slice(unrelated), "unrelated values are out");
}

/// Bulk parallel solve: per-source solutions match individual combined
/// solves over the same seeds.
#[test]
fn bulk_solve_matches_individual_solutions() {
    let mut mb = ModuleBuilder::new("bulk");
    let f = mb.begin_function("f", &[("a", Type::Int), ("b", Type::Int)], Type::Int, false);
    let bb = mb.add_block(f, "entry");
    let a = mb.param(f, 0);
    let b = mb.param(f, 1);
    let one = mb.constant("1", Type::Int);
    let x1 = mb.binary(bb, a, one, Type::Int);
    let x2 = mb.binary(bb, x1, one, Type::Int);
    let y1 = mb.binary(bb, b, one, Type::Int);
    let z = mb.binary(bb, x2, y1, Type::Int);
    mb.ret(bb, Some(z));
    let module = Arc::new(mb.finish());

    let mut analysis = InfoflowAnalysis::new(module, InfoflowConfig::default());
    analysis.run().unwrap();

    // Seed the same sources under bulk kinds and under reference kinds.
    analysis.set_tainted("bulk0", a).unwrap();
    analysis.set_tainted("bulk1", b).unwrap();
    analysis.set_tainted("ref0", a).unwrap();
    analysis.set_tainted("ref1", b).unwrap();

    analysis.solve_mt("default").unwrap();
    let bulk = analysis
        .solve_least_mt(&kinds(&["bulk0", "bulk1"]), false)
        .unwrap();

    let ref0 = analysis.least_solution(kinds(&["ref0"]), false, false).unwrap();
    let ref1 = analysis.least_solution(kinds(&["ref1"]), false, false).unwrap();

    for value in [a, b, x1, x2, y1, z] {
        assert_eq!(
            bulk[0].is_tainted(value),
            ref0.is_tainted(value),
            "bulk[0] diverges on {value:?}"
        );
        assert_eq!(
            bulk[1].is_tainted(value),
            ref1.is_tainted(value),
            "bulk[1] diverges on {value:?}"
        );
    }
    assert!(bulk[0].is_tainted(z) && bulk[1].is_tainted(z));
    assert!(!bulk[1].is_tainted(x1), "b's taint does not reach a's chain");
}

/// Loads and stores route taint through abstract locations.
#[test]
fn store_load_round_trip_through_memory() {
    let mut mb = ModuleBuilder::new("memory");
    let f = mb.begin_function("f", &[("p", Type::Ptr), ("t", Type::Int)], Type::Int, false);
    let bb = mb.add_block(f, "entry");
    let p = mb.param(f, 0);
    let t = mb.param(f, 1);
    mb.store(bb, t, p);
    let loaded = mb.load(bb, p, Type::Int);
    mb.ret(bb, Some(loaded));
    let module = Arc::new(mb.finish());

    let pti = Arc::new(MapPointsTo::new().with_direct(p, [42]));
    let cg = Arc::new(ModuleCallGraph::build(&module));
    let pdt = Arc::new(PostDoms::build(&module));
    let mut analysis = InfoflowAnalysis::with_providers(
        Arc::clone(&module),
        InfoflowConfig::default(),
        pti,
        cg,
        pdt,
    );
    analysis.run().unwrap();
    analysis.set_tainted("src", t).unwrap();

    let least = analysis.least_solution(kinds(&["src"]), false, false).unwrap();
    assert!(least.is_direct_ptr_tainted(p), "store taints the pointee");
    assert!(least.is_tainted(loaded), "load reads the tainted cell");
}

/// Varargs: trailing arguments flow into the callee's vararg structure
/// and out through va_arg.
#[test]
fn varargs_flow_through_va_arg() {
    let mut mb = ModuleBuilder::new("varargs");
    let sum = mb.begin_function("sum", &[("count", Type::Int)], Type::Int, true);
    let sb = mb.add_block(sum, "entry");
    let ap = mb.alloca(sb, mb.param(sum, 0), true);
    let got = mb.va_arg(sb, ap, Type::Int);
    mb.ret(sb, Some(got));

    let main = mb.begin_function("main", &[], Type::Int, false);
    let bm = mb.add_block(main, "entry");
    let n = mb.constant("2", Type::Int);
    let secret = mb.constant("secret", Type::Int);
    let r = mb.call(bm, mb.function_value(sum), vec![n, secret], Type::Int);
    mb.ret(bm, Some(r));
    let module = Arc::new(mb.finish());

    let mut analysis = InfoflowAnalysis::new(module, InfoflowConfig::default());
    analysis.run().unwrap();
    analysis.set_tainted("src", secret).unwrap();

    let least = analysis.least_solution(kinds(&["src"]), false, true).unwrap();
    let sum_id = analysis.engine().module().function_by_name("sum").unwrap().id;
    assert!(least.is_varg_tainted(sum_id), "trailing argument taints the varargs");
}

/// Statistics reflect the run.
#[test]
fn stats_count_work() {
    let mut mb = ModuleBuilder::new("stats");
    let f = mb.begin_function("main", &[], Type::Int, false);
    let bb = mb.add_block(f, "entry");
    let one = mb.constant("1", Type::Int);
    let two = mb.binary(bb, one, one, Type::Int);
    mb.ret(bb, Some(two));
    let module = Arc::new(mb.finish());

    let mut analysis = InfoflowAnalysis::new(module, InfoflowConfig::default());
    analysis.run().unwrap();

    let stats = analysis.stats();
    assert!(stats.units_processed >= 1);
    assert!(stats.explicit_constraints > 0);
    assert!(stats.implicit_constraints > 0);
}
