/*
 * Per-instruction flow rules
 *
 * Each instruction yields flow records, typically one explicit and one
 * implicit. The backbone rule is operand/pc-to-value: all operand values
 * flow explicitly into the instruction's value, the enclosing block's pc
 * flows implicitly. Memory, control, call, and vararg instructions have
 * specialized rules; intrinsics are dispatched here rather than through
 * the signature library.
 *
 * Conditional terminators flow, implicitly, from the pc and the condition
 * into every successor block in the immediate control-dependence region:
 * BFS from the successors, pruning blocks that post-dominate the
 * terminator's own block.
 */

use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use tracing::debug;

use super::engine::Infoflow;
use crate::errors::{InfoflowError, Result};
use crate::features::signatures::domain::FlowRecord;
use crate::shared::models::{
    BlockId, CallSite, FuncId, InstId, Instruction, Intrinsic, Module, Opcode, ValueId,
};
use crate::features::infoflow::domain::ContextId;

impl Infoflow {
    /// Flow records of one instruction, without analyzing callees (call
    /// sites still pick up their signature flows).
    pub fn instruction_flows(&mut self, inst_id: InstId) -> Result<Vec<FlowRecord>> {
        let module = self.module();
        let mut flows = Vec::new();
        let inst = module.inst(inst_id);
        self.instruction_flows_internal(&module, inst, false, &mut flows)?;
        Ok(flows)
    }

    pub(super) fn instruction_flows_internal(
        &mut self,
        module: &Module,
        inst: &Instruction,
        callees: bool,
        flows: &mut Vec<FlowRecord>,
    ) -> Result<()> {
        match &inst.op {
            // Operand/pc-to-value family
            Opcode::Binary { .. }
            | Opcode::Cmp { .. }
            | Opcode::Cast { .. }
            | Opcode::Select { .. }
            | Opcode::GetElementPtr { .. }
            | Opcode::Alloca { .. }
            | Opcode::InsertElement { .. }
            | Opcode::ExtractElement { .. }
            | Opcode::ShuffleVector { .. }
            | Opcode::InsertValue { .. }
            | Opcode::ExtractValue { .. }
            | Opcode::LandingPad
            | Opcode::Resume { .. } => {
                self.operands_and_pc_to_value(module, inst, flows);
            }

            Opcode::Phi { incoming } => {
                let ctx = self.current_context();
                let mut exp = FlowRecord::explicit(ctx);
                let mut imp = FlowRecord::implicit(ctx);
                imp.add_source_value(module.block_value(inst.block));
                for (value, block) in incoming {
                    exp.add_source_value(*value);
                    // The incoming edge is an operand too: which
                    // predecessor ran decides which value arrives.
                    exp.add_source_value(module.block_value(*block));
                }
                exp.add_sink_value(inst.value);
                imp.add_sink_value(inst.value);
                flows.push(exp);
                flows.push(imp);
            }

            Opcode::Return { value } => {
                if value.is_some() {
                    self.operands_and_pc_to_value(module, inst, flows);
                }
            }

            Opcode::Load { ptr } => self.constrain_load(module, inst, *ptr, flows),
            Opcode::Store { value, ptr } => self.constrain_store(module, inst, *value, *ptr, flows),
            Opcode::AtomicRmw { ptr, value } => {
                self.constrain_atomic_rmw(module, inst, *ptr, *value, flows)
            }
            Opcode::AtomicCmpXchg { ptr, cmp, new } => {
                self.constrain_cmpxchg(module, inst, *ptr, *cmp, *new, flows)
            }
            Opcode::VaArg { ptr } => self.constrain_va_arg(module, inst, *ptr, flows),

            Opcode::Branch { cond, .. } => {
                // Only conditional branches leak control information.
                if let Some(cond) = cond {
                    let mut rec = FlowRecord::implicit(self.current_context());
                    rec.add_source_value(module.block_value(inst.block));
                    rec.add_source_value(*cond);
                    self.constrain_conditional_successors(module, inst, &mut rec);
                    flows.push(rec);
                }
            }
            Opcode::Switch { cond, .. } => {
                let mut rec = FlowRecord::implicit(self.current_context());
                rec.add_source_value(module.block_value(inst.block));
                rec.add_source_value(*cond);
                self.constrain_conditional_successors(module, inst, &mut rec);
                flows.push(rec);
            }
            Opcode::IndirectBr { addr, .. } => {
                let mut rec = FlowRecord::implicit(self.current_context());
                rec.add_source_value(module.block_value(inst.block));
                rec.add_source_value(*addr);
                self.constrain_conditional_successors(module, inst, &mut rec);
                flows.push(rec);
            }

            Opcode::Call { call } => {
                let cs = module.call_site(inst.id).ok_or_else(|| {
                    InfoflowError::UnsupportedInstruction { opcode: inst.op.mnemonic().into() }
                })?;
                if let Some(intr) = &call.intrinsic {
                    self.constrain_intrinsic(module, inst, &cs, intr, flows);
                } else {
                    self.constrain_call_site(module, &cs, callees, flows)?;
                }
            }
            Opcode::Invoke { .. } => {
                let cs = module.call_site(inst.id).ok_or_else(|| {
                    InfoflowError::UnsupportedInstruction { opcode: inst.op.mnemonic().into() }
                })?;
                self.constrain_call_site(module, &cs, callees, flows)?;

                // An invoke may resume at more than one program point:
                // implicit flow from pc and the callee pointer to every
                // successor not post-dominating this block.
                let mut rec = FlowRecord::implicit(self.current_context());
                rec.add_source_value(module.block_value(inst.block));
                rec.add_source_value(cs.callee);
                self.constrain_conditional_successors(module, inst, &mut rec);
                flows.push(rec);
            }

            // No flow: never executed, or a pure memory fence.
            Opcode::Unreachable | Opcode::Fence => {}
        }
        Ok(())
    }

    /// Explicit flow from all operands, implicit flow from the pc, into
    /// the instruction's value.
    fn operands_and_pc_to_value(
        &mut self,
        module: &Module,
        inst: &Instruction,
        flows: &mut Vec<FlowRecord>,
    ) {
        let ctx = self.current_context();
        let mut exp = FlowRecord::explicit(ctx);
        let mut imp = FlowRecord::implicit(ctx);

        imp.add_source_value(module.block_value(inst.block));
        for op in inst.op.operands() {
            exp.add_source_value(op);
        }
        exp.add_sink_value(inst.value);
        imp.add_sink_value(inst.value);

        flows.push(exp);
        flows.push(imp);
    }

    // ------------------------------------------------------------------
    // Memory operations
    // ------------------------------------------------------------------

    fn constrain_load(
        &mut self,
        module: &Module,
        inst: &Instruction,
        ptr: ValueId,
        flows: &mut Vec<FlowRecord>,
    ) {
        let ctx = self.current_context();
        let mut exp = FlowRecord::explicit(ctx);
        let mut imp = FlowRecord::implicit(ctx);

        imp.add_source_value(module.block_value(inst.block));
        imp.add_source_value(ptr);
        exp.add_source_direct_ptr(ptr);
        exp.add_sink_value(inst.value);
        imp.add_sink_value(inst.value);

        flows.push(exp);
        flows.push(imp);
    }

    fn constrain_store(
        &mut self,
        module: &Module,
        inst: &Instruction,
        value: ValueId,
        ptr: ValueId,
        flows: &mut Vec<FlowRecord>,
    ) {
        let ctx = self.current_context();
        let mut exp = FlowRecord::explicit(ctx);
        let mut imp = FlowRecord::implicit(ctx);

        imp.add_source_value(module.block_value(inst.block));
        imp.add_source_value(ptr);
        exp.add_source_value(value);
        exp.add_sink_direct_ptr(ptr);
        imp.add_sink_direct_ptr(ptr);

        flows.push(imp);
        flows.push(exp);
    }

    /// Atomically applies an operation to a memory cell: pc, pointer, and
    /// the operand flow into the pointee (the current cell value is
    /// already accounted for by the location variable itself).
    fn constrain_atomic_rmw(
        &mut self,
        module: &Module,
        inst: &Instruction,
        ptr: ValueId,
        value: ValueId,
        flows: &mut Vec<FlowRecord>,
    ) {
        let ctx = self.current_context();
        let mut exp = FlowRecord::explicit(ctx);
        let mut imp = FlowRecord::implicit(ctx);

        imp.add_source_value(module.block_value(inst.block));
        exp.add_source_value(value);
        imp.add_source_value(ptr);
        imp.add_sink_direct_ptr(ptr);
        exp.add_sink_direct_ptr(ptr);

        flows.push(imp);
        flows.push(exp);
    }

    /// cmpxchg has two flows: the conditional store of `new` into memory
    /// (guarded by pc, pointer, and the comparison), and the read of the
    /// old cell value into the result.
    fn constrain_cmpxchg(
        &mut self,
        module: &Module,
        inst: &Instruction,
        ptr: ValueId,
        cmp: ValueId,
        new: ValueId,
        flows: &mut Vec<FlowRecord>,
    ) {
        let ctx = self.current_context();

        // Into memory.
        let mut exp_to_mem = FlowRecord::explicit(ctx);
        let mut imp_to_mem = FlowRecord::implicit(ctx);
        imp_to_mem.add_source_value(module.block_value(inst.block));
        imp_to_mem.add_source_value(ptr);
        exp_to_mem.add_source_value(cmp);
        exp_to_mem.add_source_value(new);
        exp_to_mem.add_sink_direct_ptr(ptr);
        imp_to_mem.add_sink_direct_ptr(ptr);

        // Out of memory.
        let mut exp_from_mem = FlowRecord::explicit(ctx);
        let mut imp_from_mem = FlowRecord::implicit(ctx);
        imp_from_mem.add_source_value(module.block_value(inst.block));
        imp_from_mem.add_source_value(ptr);
        exp_from_mem.add_source_direct_ptr(ptr);
        exp_from_mem.add_sink_value(inst.value);
        imp_from_mem.add_sink_value(inst.value);

        flows.push(exp_to_mem);
        flows.push(imp_to_mem);
        flows.push(exp_from_mem);
        flows.push(imp_from_mem);
    }

    /// va_arg reads the next vararg and advances the list: pointer memory
    /// flows into the result, and the pc/pointer/vararg structure flow
    /// into the result, the list, and the structure itself.
    fn constrain_va_arg(
        &mut self,
        module: &Module,
        inst: &Instruction,
        ptr: ValueId,
        flows: &mut Vec<FlowRecord>,
    ) {
        let ctx = self.current_context();
        let mut exp = FlowRecord::explicit(ctx);
        let mut imp = FlowRecord::implicit(ctx);

        imp.add_source_value(module.block_value(inst.block));
        imp.add_source_value(ptr);
        exp.add_source_direct_ptr(ptr);
        imp.add_source_varg(inst.func);

        exp.add_sink_value(inst.value);
        imp.add_sink_value(inst.value);
        imp.add_sink_direct_ptr(ptr);
        imp.add_sink_varg(inst.func);

        flows.push(exp);
        flows.push(imp);
    }

    // ------------------------------------------------------------------
    // Control flow
    // ------------------------------------------------------------------

    /// Add, as sinks, the pc of every successor block reachable from this
    /// terminator that does not post-dominate the terminator's block: the
    /// immediate control-dependence region of the branch.
    fn constrain_conditional_successors(
        &mut self,
        module: &Module,
        inst: &Instruction,
        rec: &mut FlowRecord,
    ) {
        let block = inst.block;
        let func = inst.func;

        let mut visited: FxHashSet<BlockId> = FxHashSet::default();
        let mut queue: VecDeque<BlockId> = VecDeque::new();
        for succ in inst.op.successors() {
            if visited.insert(succ) {
                queue.push_back(succ);
            }
        }

        while let Some(cur) = queue.pop_front() {
            if self.pdt.dominates(func, cur, block) {
                continue;
            }
            rec.add_sink_value(module.block_value(cur));
            if let Some(term) = module.terminator(cur) {
                for succ in term.op.successors() {
                    if visited.insert(succ) {
                        queue.push_back(succ);
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    fn constrain_call_site(
        &mut self,
        module: &Module,
        cs: &CallSite<'_>,
        callees: bool,
        flows: &mut Vec<FlowRecord>,
    ) -> Result<()> {
        // Analyzing callees schedules their units (and emits signature
        // flows straight into the store); otherwise signature flows are
        // surfaced to the caller.
        if callees {
            self.get_call_result(module, cs)?;
        } else if self.uses_external_signature(module, cs) {
            let records = self.registrar.process(module, self.current_context(), cs)?;
            flows.extend(records);
        }

        for (func, ctx) in self.invokable_code(module, cs) {
            self.constrain_callee(module, ctx, func, cs, flows);
        }
        Ok(())
    }

    /// Constraints tying one defined callee to this call site:
    /// 1. implicit pc flow from caller pc and callee pointer into the
    ///    callee's entry block
    /// 2. explicit argument-to-parameter flows (trailing arguments bound
    ///    the vararg structure)
    /// 3. explicit return flows back into the call's value
    fn constrain_callee(
        &mut self,
        module: &Module,
        callee_ctx: ContextId,
        callee: FuncId,
        cs: &CallSite<'_>,
        flows: &mut Vec<FlowRecord>,
    ) {
        let caller_ctx = self.current_context();
        let f = module.function(callee);
        let Some(entry) = f.entry() else {
            return;
        };

        let mut pc_flow = FlowRecord::with_contexts(true, caller_ctx, callee_ctx);
        pc_flow.add_source_value(module.block_value(cs.block));
        pc_flow.add_source_value(cs.callee);
        pc_flow.add_sink_value(module.block_value(entry));
        flows.push(pc_flow);

        let num_params = f.params.len();
        let num_args = cs.arg_count();
        debug_assert!(
            !f.varargs || num_args >= num_params,
            "vararg function called with too few arguments"
        );
        debug_assert!(
            f.varargs || num_args == num_params,
            "function called with the wrong number of arguments"
        );

        for i in 0..num_params.min(num_args) {
            let mut arg_flow = FlowRecord::with_contexts(false, caller_ctx, callee_ctx);
            arg_flow.add_source_value(cs.args[i]);
            arg_flow.add_sink_value(f.params[i]);
            flows.push(arg_flow);
        }

        if num_args > num_params {
            let mut vararg_flow = FlowRecord::with_contexts(false, caller_ctx, callee_ctx);
            for arg in &cs.args[num_params..] {
                vararg_flow.add_source_value(*arg);
            }
            vararg_flow.add_sink_varg(callee);
            flows.push(vararg_flow);
        }

        for block in &f.blocks {
            if let Some(term) = module.terminator(*block) {
                if let Opcode::Return { value: Some(_) } = &term.op {
                    // The return instruction's own value carries its
                    // operand and pc flows; source from it, not the
                    // operand.
                    let mut ret_flow = FlowRecord::with_contexts(false, callee_ctx, caller_ctx);
                    ret_flow.add_source_value(term.value);
                    ret_flow.add_sink_value(cs.value);
                    flows.push(ret_flow);
                }
            }
        }
    }

    /// Intrinsics dispatched by opcode rather than through signatures.
    fn constrain_intrinsic(
        &mut self,
        module: &Module,
        inst: &Instruction,
        cs: &CallSite<'_>,
        intrinsic: &Intrinsic,
        flows: &mut Vec<FlowRecord>,
    ) {
        let ctx = self.current_context();
        match intrinsic {
            // The actual flows happen at call sites and va_arg.
            Intrinsic::VaStart | Intrinsic::VaEnd | Intrinsic::VaCopy => {}

            Intrinsic::MemCpy | Intrinsic::MemMove => {
                let mut exp = FlowRecord::explicit(ctx);
                let mut imp = FlowRecord::implicit(ctx);
                // Data at the source pointer, length, and alignment flow
                // into the data at the destination pointer.
                if let (Some(dst), Some(src)) = (cs.arg(0), cs.arg(1)) {
                    exp.add_source_direct_ptr(src);
                    imp.add_source_value(src);
                    for extra in [cs.arg(2), cs.arg(3)].into_iter().flatten() {
                        imp.add_source_value(extra);
                    }
                    exp.add_sink_direct_ptr(dst);
                    imp.add_sink_direct_ptr(dst);
                    flows.push(exp);
                    flows.push(imp);
                }
            }
            Intrinsic::MemSet => {
                let mut exp = FlowRecord::explicit(ctx);
                let mut imp = FlowRecord::implicit(ctx);
                if let (Some(dst), Some(byte)) = (cs.arg(0), cs.arg(1)) {
                    exp.add_source_value(byte);
                    for extra in [cs.arg(2), cs.arg(3)].into_iter().flatten() {
                        imp.add_source_value(extra);
                    }
                    exp.add_sink_direct_ptr(dst);
                    imp.add_sink_direct_ptr(dst);
                    flows.push(exp);
                    flows.push(imp);
                }
            }

            Intrinsic::Sqrt
            | Intrinsic::Powi
            | Intrinsic::Sin
            | Intrinsic::Cos
            | Intrinsic::Pow
            | Intrinsic::Exp
            | Intrinsic::Log
            | Intrinsic::Fma => {
                self.operands_and_pc_to_value(module, inst, flows);
            }

            Intrinsic::Other(name) => {
                debug!(intrinsic = %name, "unsupported intrinsic, no constraints emitted");
            }
        }
    }
}
