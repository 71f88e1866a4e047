/*
 * Fluent construction API for SSA modules.
 *
 * Used by tests and by embedders that translate an existing IR into the
 * analysis's model. The builder hands out the same arena ids the finished
 * module uses, so values created here can be fed straight into taint and
 * points-to APIs.
 */

use super::ir::{
    BasicBlock, BlockId, CallSiteInfo, FuncId, Function, GlobalId, GlobalVar, InstId, Instruction,
    Intrinsic, Linkage, Module, Opcode, Type, ValueDef, ValueId, ValueKind,
};

/// Builder for a whole module.
#[derive(Debug, Default)]
pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            module: Module { name: name.into(), ..Module::default() },
        }
    }

    fn new_value(&mut self, name: impl Into<String>, ty: Type, kind: ValueKind) -> ValueId {
        let id = ValueId(self.module.values.len() as u32);
        self.module.values.push(ValueDef { name: name.into(), ty, kind });
        id
    }

    /// Declare an external function (no body).
    pub fn declare_function(
        &mut self,
        name: impl Into<String>,
        params: &[Type],
        ret_ty: Type,
        varargs: bool,
    ) -> FuncId {
        let name = name.into();
        let id = FuncId(self.module.functions.len() as u32);
        let fn_ty = Type::Func { params: params.len(), varargs };
        let value = self.new_value(name.clone(), fn_ty, ValueKind::Function(id));
        let param_vals = params
            .iter()
            .enumerate()
            .map(|(index, ty)| {
                self.new_value(format!("{name}.arg{index}"), ty.clone(), ValueKind::Arg {
                    func: id,
                    index,
                })
            })
            .collect();
        self.module.functions.push(Function {
            id,
            name,
            value,
            params: param_vals,
            ret_ty,
            varargs,
            linkage: Linkage::External,
            blocks: Vec::new(),
        });
        id
    }

    /// Begin a function definition. Blocks and instructions are added with
    /// the block-level methods below.
    pub fn begin_function(
        &mut self,
        name: impl Into<String>,
        params: &[(&str, Type)],
        ret_ty: Type,
        varargs: bool,
    ) -> FuncId {
        let name = name.into();
        let id = FuncId(self.module.functions.len() as u32);
        let fn_ty = Type::Func { params: params.len(), varargs };
        let value = self.new_value(name.clone(), fn_ty, ValueKind::Function(id));
        let param_vals = params
            .iter()
            .enumerate()
            .map(|(index, (pname, ty))| {
                self.new_value(*pname, ty.clone(), ValueKind::Arg { func: id, index })
            })
            .collect();
        self.module.functions.push(Function {
            id,
            name,
            value,
            params: param_vals,
            ret_ty,
            varargs,
            linkage: Linkage::External,
            blocks: Vec::new(),
        });
        id
    }

    /// Mark a defined function as internal (not externally linkable).
    pub fn set_internal(&mut self, func: FuncId) {
        self.module.functions[func.0 as usize].linkage = Linkage::Internal;
    }

    pub fn add_block(&mut self, func: FuncId, name: impl Into<String>) -> BlockId {
        let name = name.into();
        let id = BlockId(self.module.blocks.len() as u32);
        let value = self.new_value(
            format!("{}.{name}", self.module.functions[func.0 as usize].name),
            Type::Void,
            ValueKind::Block { func, block: id },
        );
        self.module.blocks.push(BasicBlock { id, func, name, value, insts: Vec::new() });
        self.module.functions[func.0 as usize].blocks.push(id);
        id
    }

    pub fn param(&self, func: FuncId, index: usize) -> ValueId {
        self.module.functions[func.0 as usize].params[index]
    }

    pub fn function_value(&self, func: FuncId) -> ValueId {
        self.module.functions[func.0 as usize].value
    }

    /// Create a program constant.
    pub fn constant(&mut self, name: impl Into<String>, ty: Type) -> ValueId {
        self.new_value(name, ty, ValueKind::Const)
    }

    /// Create a global variable; its value is pointer-typed.
    pub fn global(&mut self, name: impl Into<String>) -> ValueId {
        let id = GlobalId(self.module.globals.len() as u32);
        let name = name.into();
        let value = self.new_value(name.clone(), Type::Ptr, ValueKind::Global(id));
        self.module.globals.push(GlobalVar { id, name, value });
        value
    }

    fn push_inst(&mut self, block: BlockId, ty: Type, op: Opcode) -> ValueId {
        let func = self.module.blocks[block.0 as usize].func;
        let id = InstId(self.module.insts.len() as u32);
        let value = self.new_value(format!("%{}", id.0), ty, ValueKind::Inst(id));
        self.module.insts.push(Instruction { id, value, func, block, op });
        self.module.blocks[block.0 as usize].insts.push(id);
        value
    }

    // ------------------------------------------------------------------
    // Value operations
    // ------------------------------------------------------------------

    pub fn binary(&mut self, block: BlockId, lhs: ValueId, rhs: ValueId, ty: Type) -> ValueId {
        self.push_inst(block, ty, Opcode::Binary { lhs, rhs })
    }

    pub fn cmp(&mut self, block: BlockId, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.push_inst(block, Type::Int, Opcode::Cmp { lhs, rhs })
    }

    pub fn cast(&mut self, block: BlockId, operand: ValueId, ty: Type) -> ValueId {
        self.push_inst(block, ty, Opcode::Cast { operand })
    }

    pub fn select(
        &mut self,
        block: BlockId,
        cond: ValueId,
        then_val: ValueId,
        else_val: ValueId,
        ty: Type,
    ) -> ValueId {
        self.push_inst(block, ty, Opcode::Select { cond, then_val, else_val })
    }

    pub fn phi(&mut self, block: BlockId, incoming: Vec<(ValueId, BlockId)>, ty: Type) -> ValueId {
        self.push_inst(block, ty, Opcode::Phi { incoming })
    }

    pub fn gep(
        &mut self,
        block: BlockId,
        base: ValueId,
        indices: Vec<ValueId>,
    ) -> ValueId {
        self.push_inst(block, Type::Ptr, Opcode::GetElementPtr { base, indices })
    }

    pub fn alloca(&mut self, block: BlockId, size: ValueId, is_static: bool) -> ValueId {
        self.push_inst(block, Type::Ptr, Opcode::Alloca { size, is_static })
    }

    // ------------------------------------------------------------------
    // Memory operations
    // ------------------------------------------------------------------

    pub fn load(&mut self, block: BlockId, ptr: ValueId, ty: Type) -> ValueId {
        self.push_inst(block, ty, Opcode::Load { ptr })
    }

    pub fn store(&mut self, block: BlockId, value: ValueId, ptr: ValueId) {
        self.push_inst(block, Type::Void, Opcode::Store { value, ptr });
    }

    pub fn atomic_rmw(&mut self, block: BlockId, ptr: ValueId, value: ValueId, ty: Type) -> ValueId {
        self.push_inst(block, ty, Opcode::AtomicRmw { ptr, value })
    }

    pub fn cmpxchg(
        &mut self,
        block: BlockId,
        ptr: ValueId,
        cmp: ValueId,
        new: ValueId,
        ty: Type,
    ) -> ValueId {
        self.push_inst(block, ty, Opcode::AtomicCmpXchg { ptr, cmp, new })
    }

    pub fn va_arg(&mut self, block: BlockId, ptr: ValueId, ty: Type) -> ValueId {
        self.push_inst(block, ty, Opcode::VaArg { ptr })
    }

    // ------------------------------------------------------------------
    // Vector / aggregate operations
    // ------------------------------------------------------------------

    pub fn insert_element(
        &mut self,
        block: BlockId,
        vec: ValueId,
        elt: ValueId,
        idx: ValueId,
    ) -> ValueId {
        self.push_inst(block, Type::Vector, Opcode::InsertElement { vec, elt, idx })
    }

    pub fn extract_element(&mut self, block: BlockId, vec: ValueId, idx: ValueId, ty: Type) -> ValueId {
        self.push_inst(block, ty, Opcode::ExtractElement { vec, idx })
    }

    pub fn shuffle_vector(
        &mut self,
        block: BlockId,
        v1: ValueId,
        v2: ValueId,
        mask: ValueId,
    ) -> ValueId {
        self.push_inst(block, Type::Vector, Opcode::ShuffleVector { v1, v2, mask })
    }

    pub fn insert_value(&mut self, block: BlockId, agg: ValueId, elt: ValueId) -> ValueId {
        self.push_inst(block, Type::Aggregate, Opcode::InsertValue { agg, elt })
    }

    pub fn extract_value(&mut self, block: BlockId, agg: ValueId, ty: Type) -> ValueId {
        self.push_inst(block, ty, Opcode::ExtractValue { agg })
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    pub fn call(
        &mut self,
        block: BlockId,
        callee: ValueId,
        args: Vec<ValueId>,
        ret_ty: Type,
    ) -> ValueId {
        self.push_inst(block, ret_ty, Opcode::Call {
            call: CallSiteInfo { callee, args, intrinsic: None },
        })
    }

    pub fn call_intrinsic(
        &mut self,
        block: BlockId,
        callee: ValueId,
        args: Vec<ValueId>,
        ret_ty: Type,
        intrinsic: Intrinsic,
    ) -> ValueId {
        self.push_inst(block, ret_ty, Opcode::Call {
            call: CallSiteInfo { callee, args, intrinsic: Some(intrinsic) },
        })
    }

    pub fn invoke(
        &mut self,
        block: BlockId,
        callee: ValueId,
        args: Vec<ValueId>,
        ret_ty: Type,
        normal: BlockId,
        unwind: BlockId,
    ) -> ValueId {
        self.push_inst(block, ret_ty, Opcode::Invoke {
            call: CallSiteInfo { callee, args, intrinsic: None },
            normal,
            unwind,
        })
    }

    // ------------------------------------------------------------------
    // Terminators and exception handling
    // ------------------------------------------------------------------

    pub fn branch(&mut self, block: BlockId, cond: Option<ValueId>, targets: Vec<BlockId>) {
        self.push_inst(block, Type::Void, Opcode::Branch { cond, targets });
    }

    pub fn switch(
        &mut self,
        block: BlockId,
        cond: ValueId,
        default: BlockId,
        cases: Vec<(ValueId, BlockId)>,
    ) {
        self.push_inst(block, Type::Void, Opcode::Switch { cond, default, cases });
    }

    pub fn indirect_br(&mut self, block: BlockId, addr: ValueId, dests: Vec<BlockId>) {
        self.push_inst(block, Type::Void, Opcode::IndirectBr { addr, dests });
    }

    pub fn ret(&mut self, block: BlockId, value: Option<ValueId>) {
        self.push_inst(block, Type::Void, Opcode::Return { value });
    }

    pub fn landing_pad(&mut self, block: BlockId, ty: Type) -> ValueId {
        self.push_inst(block, ty, Opcode::LandingPad)
    }

    pub fn resume(&mut self, block: BlockId, value: ValueId) {
        self.push_inst(block, Type::Void, Opcode::Resume { value });
    }

    pub fn unreachable(&mut self, block: BlockId) {
        self.push_inst(block, Type::Void, Opcode::Unreachable);
    }

    pub fn fence(&mut self, block: BlockId) {
        self.push_inst(block, Type::Void, Opcode::Fence);
    }

    pub fn finish(self) -> Module {
        self.module
    }
}
