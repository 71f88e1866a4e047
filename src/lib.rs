/*
 * infoflow-ir - Whole-program information flow analysis
 *
 * A constraint-based, context-sensitive (k=1 call-site) taint analysis over
 * a low-level SSA IR. Every value and abstract memory location is assigned a
 * level in the two-point security lattice {Low, High}; instruction rules,
 * call summaries, and library signatures emit inequality constraints that a
 * fixpoint solver resolves into least (must-taint) and greatest (may-not-be-
 * untainted) solutions. Intersecting both yields program slices relating
 * concrete sources to concrete sinks.
 *
 * Feature-First Hexagonal Architecture:
 * - shared/      : SSA IR model, IR builder, CFG + post-dominators
 * - features/    : Vertical slices (constraints -> signatures -> source_sink -> infoflow)
 * - config/      : Analysis configuration
 *
 * The IR itself, the points-to analysis, and the call graph are inputs; this
 * crate consumes their answers through provider traits and ships simple
 * in-memory defaults for embedding and testing.
 */

pub mod config;
pub mod errors;
pub mod features;
pub mod shared;

pub use config::{ContextStrategy, InfoflowConfig};
pub use errors::{InfoflowError, Result};

// Constraint system (lattice, store, solvers)
pub use features::constraints::domain::{ConsElem, Constraint, SecLevel, VarId};
pub use features::constraints::infrastructure::{ConstraintKit, PartialSolution, WorklistSolution};

// Flow records and signatures
pub use features::signatures::domain::FlowRecord;
pub use features::signatures::infrastructure::{Signature, SignatureRegistrar};

// Source/sink identification
pub use features::source_sink::SourceSinkAnalysis;

// The analysis engine and its public surface
pub use features::infoflow::application::{AnalysisStats, InfoflowAnalysis};
pub use features::infoflow::domain::{AnalysisUnit, ContextId, ContextManager, Unit};
pub use features::infoflow::infrastructure::{
    Infoflow, InfoflowSolution, MultiSlice, Slice,
};
pub use features::infoflow::ports::{
    AbstractLoc, AbstractLocSet, CallGraphProvider, CallTargets, PointsToProvider,
    PostDominatorProvider,
};

// IR model
pub use shared::models::{
    BasicBlock, BlockId, FuncId, Function, InstId, Instruction, Intrinsic, Module, ModuleBuilder,
    Opcode, Type, ValueId,
};
