/*
 * SSA IR model
 *
 * An owned, arena-indexed representation of the low-level SSA program the
 * analysis runs over. Parsing and lowering are out of scope; embedders build
 * modules through `ModuleBuilder` or translate from their own front end.
 *
 * Everything that can participate in an information flow is addressed by a
 * `ValueId`: instruction results, function arguments, constants, globals,
 * functions themselves, and basic blocks (a block's value stands for the
 * program counter of that block).
 */

use serde::{Deserialize, Serialize};

// ============================================================================
// Ids
// ============================================================================

/// Identity of any value in a module (instruction result, argument, constant,
/// global, function, or basic block).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueId(pub u32);

/// Identity of a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FuncId(pub u32);

/// Identity of a basic block (module-wide).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

/// Identity of an instruction (module-wide).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstId(pub u32);

/// Identity of a global variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GlobalId(pub u32);

// ============================================================================
// Types
// ============================================================================

/// Minimal type language. The analysis only consults pointer-ness, void-ness,
/// and function arities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Type {
    Void,
    Int,
    Float,
    Ptr,
    Vector,
    Aggregate,
    Func { params: usize, varargs: bool },
}

impl Type {
    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Ptr)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }
}

// ============================================================================
// Values
// ============================================================================

/// What a `ValueId` refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    /// Result of an instruction
    Inst(InstId),
    /// Formal parameter of a function
    Arg { func: FuncId, index: usize },
    /// Program constant
    Const,
    /// Global variable
    Global(GlobalId),
    /// A function used as a value (callee or function pointer)
    Function(FuncId),
    /// A basic block (stands for the pc of the block)
    Block { func: FuncId, block: BlockId },
}

/// Per-value metadata.
#[derive(Debug, Clone)]
pub struct ValueDef {
    pub name: String,
    pub ty: Type,
    pub kind: ValueKind,
}

// ============================================================================
// Instructions
// ============================================================================

/// Intrinsic calls dispatched directly by the constraint generator rather
/// than by the signature library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intrinsic {
    MemCpy,
    MemMove,
    MemSet,
    VaStart,
    VaEnd,
    VaCopy,
    Sqrt,
    Powi,
    Sin,
    Cos,
    Pow,
    Exp,
    Log,
    Fma,
    Other(String),
}

/// Callee, actual arguments, and intrinsic classification of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSiteInfo {
    pub callee: ValueId,
    pub args: Vec<ValueId>,
    pub intrinsic: Option<Intrinsic>,
}

/// The supported opcode set. Operand roles are explicit so the per-opcode
/// flow rules can name pointer operands, stored values, conditions, etc.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opcode {
    Binary { lhs: ValueId, rhs: ValueId },
    Cmp { lhs: ValueId, rhs: ValueId },
    Cast { operand: ValueId },
    Select { cond: ValueId, then_val: ValueId, else_val: ValueId },
    Phi { incoming: Vec<(ValueId, BlockId)> },
    GetElementPtr { base: ValueId, indices: Vec<ValueId> },
    Alloca { size: ValueId, is_static: bool },
    InsertElement { vec: ValueId, elt: ValueId, idx: ValueId },
    ExtractElement { vec: ValueId, idx: ValueId },
    ShuffleVector { v1: ValueId, v2: ValueId, mask: ValueId },
    InsertValue { agg: ValueId, elt: ValueId },
    ExtractValue { agg: ValueId },
    LandingPad,
    Resume { value: ValueId },
    Load { ptr: ValueId },
    Store { value: ValueId, ptr: ValueId },
    AtomicRmw { ptr: ValueId, value: ValueId },
    AtomicCmpXchg { ptr: ValueId, cmp: ValueId, new: ValueId },
    VaArg { ptr: ValueId },
    Branch { cond: Option<ValueId>, targets: Vec<BlockId> },
    Switch { cond: ValueId, default: BlockId, cases: Vec<(ValueId, BlockId)> },
    IndirectBr { addr: ValueId, dests: Vec<BlockId> },
    Call { call: CallSiteInfo },
    Invoke { call: CallSiteInfo, normal: BlockId, unwind: BlockId },
    Return { value: Option<ValueId> },
    Unreachable,
    Fence,
}

impl Opcode {
    /// All value operands, in order. Used by the operand/pc-to-value rule.
    pub fn operands(&self) -> Vec<ValueId> {
        match self {
            Opcode::Binary { lhs, rhs } | Opcode::Cmp { lhs, rhs } => vec![*lhs, *rhs],
            Opcode::Cast { operand } => vec![*operand],
            Opcode::Select { cond, then_val, else_val } => vec![*cond, *then_val, *else_val],
            Opcode::Phi { incoming } => incoming.iter().map(|(v, _)| *v).collect(),
            Opcode::GetElementPtr { base, indices } => {
                let mut ops = vec![*base];
                ops.extend_from_slice(indices);
                ops
            }
            Opcode::Alloca { size, .. } => vec![*size],
            Opcode::InsertElement { vec, elt, idx } => vec![*vec, *elt, *idx],
            Opcode::ExtractElement { vec, idx } => vec![*vec, *idx],
            Opcode::ShuffleVector { v1, v2, mask } => vec![*v1, *v2, *mask],
            Opcode::InsertValue { agg, elt } => vec![*agg, *elt],
            Opcode::ExtractValue { agg } => vec![*agg],
            Opcode::LandingPad => Vec::new(),
            Opcode::Resume { value } => vec![*value],
            Opcode::Load { ptr } => vec![*ptr],
            Opcode::Store { value, ptr } => vec![*value, *ptr],
            Opcode::AtomicRmw { ptr, value } => vec![*ptr, *value],
            Opcode::AtomicCmpXchg { ptr, cmp, new } => vec![*ptr, *cmp, *new],
            Opcode::VaArg { ptr } => vec![*ptr],
            Opcode::Branch { cond, .. } => cond.iter().copied().collect(),
            Opcode::Switch { cond, .. } => vec![*cond],
            Opcode::IndirectBr { addr, .. } => vec![*addr],
            Opcode::Call { call } | Opcode::Invoke { call, .. } => {
                let mut ops = vec![call.callee];
                ops.extend_from_slice(&call.args);
                ops
            }
            Opcode::Return { value } => value.iter().copied().collect(),
            Opcode::Unreachable | Opcode::Fence => Vec::new(),
        }
    }

    /// Successor blocks of a terminator (empty for non-terminators and for
    /// terminators that leave the function).
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Opcode::Branch { targets, .. } => targets.clone(),
            Opcode::Switch { default, cases, .. } => {
                let mut succs = vec![*default];
                succs.extend(cases.iter().map(|(_, b)| *b));
                succs
            }
            Opcode::IndirectBr { dests, .. } => dests.clone(),
            Opcode::Invoke { normal, unwind, .. } => vec![*normal, *unwind],
            _ => Vec::new(),
        }
    }

    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Opcode::Branch { .. }
                | Opcode::Switch { .. }
                | Opcode::IndirectBr { .. }
                | Opcode::Invoke { .. }
                | Opcode::Return { .. }
                | Opcode::Resume { .. }
                | Opcode::Unreachable
        )
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::Binary { .. } => "binary",
            Opcode::Cmp { .. } => "cmp",
            Opcode::Cast { .. } => "cast",
            Opcode::Select { .. } => "select",
            Opcode::Phi { .. } => "phi",
            Opcode::GetElementPtr { .. } => "getelementptr",
            Opcode::Alloca { .. } => "alloca",
            Opcode::InsertElement { .. } => "insertelement",
            Opcode::ExtractElement { .. } => "extractelement",
            Opcode::ShuffleVector { .. } => "shufflevector",
            Opcode::InsertValue { .. } => "insertvalue",
            Opcode::ExtractValue { .. } => "extractvalue",
            Opcode::LandingPad => "landingpad",
            Opcode::Resume { .. } => "resume",
            Opcode::Load { .. } => "load",
            Opcode::Store { .. } => "store",
            Opcode::AtomicRmw { .. } => "atomicrmw",
            Opcode::AtomicCmpXchg { .. } => "cmpxchg",
            Opcode::VaArg { .. } => "va_arg",
            Opcode::Branch { .. } => "br",
            Opcode::Switch { .. } => "switch",
            Opcode::IndirectBr { .. } => "indirectbr",
            Opcode::Call { .. } => "call",
            Opcode::Invoke { .. } => "invoke",
            Opcode::Return { .. } => "ret",
            Opcode::Unreachable => "unreachable",
            Opcode::Fence => "fence",
        }
    }
}

/// A single SSA instruction. Every instruction owns a result `ValueId`;
/// void-typed results simply never appear as operands.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub id: InstId,
    pub value: ValueId,
    pub func: FuncId,
    pub block: BlockId,
    pub op: Opcode,
}

// ============================================================================
// Functions, blocks, module
// ============================================================================

/// Linkage of a function: whether it is reachable from outside the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Linkage {
    External,
    Internal,
}

#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: BlockId,
    pub func: FuncId,
    pub name: String,
    /// The block-as-value (pc variable of the block)
    pub value: ValueId,
    pub insts: Vec<InstId>,
}

#[derive(Debug, Clone)]
pub struct Function {
    pub id: FuncId,
    pub name: String,
    /// The function-as-value (callee operands, function pointers)
    pub value: ValueId,
    pub params: Vec<ValueId>,
    pub ret_ty: Type,
    pub varargs: bool,
    pub linkage: Linkage,
    /// Blocks in layout order; empty for declarations
    pub blocks: Vec<BlockId>,
}

impl Function {
    /// A declaration has no body to analyze.
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn entry(&self) -> Option<BlockId> {
        self.blocks.first().copied()
    }
}

#[derive(Debug, Clone)]
pub struct GlobalVar {
    pub id: GlobalId,
    pub name: String,
    pub value: ValueId,
}

/// A whole program, arena-indexed.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub name: String,
    pub(crate) values: Vec<ValueDef>,
    pub(crate) functions: Vec<Function>,
    pub(crate) blocks: Vec<BasicBlock>,
    pub(crate) insts: Vec<Instruction>,
    pub(crate) globals: Vec<GlobalVar>,
}

/// A borrowed view of a call or invoke instruction.
#[derive(Debug, Clone, Copy)]
pub struct CallSite<'m> {
    pub inst: InstId,
    /// Result value of the call instruction
    pub value: ValueId,
    pub caller: FuncId,
    pub block: BlockId,
    pub callee: ValueId,
    pub args: &'m [ValueId],
    pub intrinsic: Option<&'m Intrinsic>,
}

impl<'m> CallSite<'m> {
    /// The statically known callee function, if the called value is a
    /// function (as opposed to a function pointer).
    pub fn called_function(&self, module: &Module) -> Option<FuncId> {
        match module.value(self.callee).kind {
            ValueKind::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    pub fn arg(&self, index: usize) -> Option<ValueId> {
        self.args.get(index).copied()
    }

    /// Does the call produce a usable value?
    pub fn returns_value(&self, module: &Module) -> bool {
        !module.value(self.value).ty.is_void()
    }

    pub fn is_intrinsic(&self) -> bool {
        self.intrinsic.is_some()
    }
}

impl Module {
    pub fn value(&self, id: ValueId) -> &ValueDef {
        &self.values[id.0 as usize]
    }

    pub fn function(&self, id: FuncId) -> &Function {
        &self.functions[id.0 as usize]
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.0 as usize]
    }

    pub fn inst(&self, id: InstId) -> &Instruction {
        &self.insts[id.0 as usize]
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter()
    }

    pub fn globals(&self) -> impl Iterator<Item = &GlobalVar> {
        self.globals.iter()
    }

    pub fn function_by_name(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// The pc value of a block.
    pub fn block_value(&self, id: BlockId) -> ValueId {
        self.block(id).value
    }

    /// Instructions of a block, in order.
    pub fn block_insts(&self, id: BlockId) -> impl Iterator<Item = &Instruction> {
        self.block(id).insts.iter().map(|i| self.inst(*i))
    }

    /// The terminator of a block, if the block is well formed.
    pub fn terminator(&self, id: BlockId) -> Option<&Instruction> {
        self.block(id)
            .insts
            .last()
            .map(|i| self.inst(*i))
            .filter(|i| i.op.is_terminator())
    }

    /// View a call or invoke instruction as a call site.
    pub fn call_site(&self, id: InstId) -> Option<CallSite<'_>> {
        let inst = self.inst(id);
        let call = match &inst.op {
            Opcode::Call { call } => call,
            Opcode::Invoke { call, .. } => call,
            _ => return None,
        };
        Some(CallSite {
            inst: id,
            value: inst.value,
            caller: inst.func,
            block: inst.block,
            callee: call.callee,
            args: &call.args,
            intrinsic: call.intrinsic.as_ref(),
        })
    }

    /// All call sites in a function.
    pub fn call_sites_in(&self, func: FuncId) -> Vec<InstId> {
        let mut sites = Vec::new();
        for block in &self.function(func).blocks {
            for inst in &self.block(*block).insts {
                if matches!(self.inst(*inst).op, Opcode::Call { .. } | Opcode::Invoke { .. }) {
                    sites.push(*inst);
                }
            }
        }
        sites
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::ModuleBuilder;

    #[test]
    fn test_operands_cover_named_roles() {
        let op = Opcode::Store { value: ValueId(1), ptr: ValueId(2) };
        assert_eq!(op.operands(), vec![ValueId(1), ValueId(2)]);
        assert!(!op.is_terminator());

        let br = Opcode::Branch { cond: Some(ValueId(3)), targets: vec![BlockId(0), BlockId(1)] };
        assert_eq!(br.operands(), vec![ValueId(3)]);
        assert_eq!(br.successors(), vec![BlockId(0), BlockId(1)]);
        assert!(br.is_terminator());
    }

    #[test]
    fn test_call_site_view() {
        let mut mb = ModuleBuilder::new("m");
        let callee = mb.declare_function("ext", &[Type::Int], Type::Int, false);
        let f = mb.begin_function("caller", &[("x", Type::Int)], Type::Int, false);
        let bb = mb.add_block(f, "entry");
        let x = mb.param(f, 0);
        let r = mb.call(bb, mb.function_value(callee), vec![x], Type::Int);
        mb.ret(bb, Some(r));
        let m = mb.finish();

        let caller = m.function_by_name("caller").unwrap();
        let sites = m.call_sites_in(caller.id);
        assert_eq!(sites.len(), 1);
        let cs = m.call_site(sites[0]).unwrap();
        assert_eq!(cs.arg_count(), 1);
        assert!(cs.returns_value(&m));
        assert_eq!(cs.called_function(&m), Some(m.function_by_name("ext").unwrap().id));
    }

    #[test]
    fn test_declaration_has_no_body() {
        let mut mb = ModuleBuilder::new("m");
        let ext = mb.declare_function("ext", &[], Type::Void, false);
        let m = mb.finish();
        assert!(m.function(ext).is_declaration());
        assert_eq!(m.function(ext).entry(), None);
    }
}
