//! Shared data model: the SSA IR consumed by the analysis, a fluent builder
//! for constructing modules, and CFG / post-dominator utilities.

pub mod builder;
pub mod cfg;
pub mod ir;

pub use builder::ModuleBuilder;
pub use cfg::{FunctionCfg, PostDomCache, PostDominatorTree};
pub use ir::{
    BasicBlock, BlockId, CallSite, CallSiteInfo, FuncId, Function, GlobalId, GlobalVar, InstId,
    Instruction, Intrinsic, Linkage, Module, Opcode, Type, ValueDef, ValueId, ValueKind,
};
