//! Engine infrastructure: the constraint generator and interprocedural
//! driver, per-opcode flow rules, solution queries, slices, and the
//! default provider implementations.

pub mod driver;
pub mod engine;
pub mod flows;
pub mod providers;
pub mod slice;
pub mod solution;

pub use engine::Infoflow;
pub use providers::{MapPointsTo, ModuleCallGraph, PostDoms};
pub use slice::{MultiSlice, Slice};
pub use solution::InfoflowSolution;
