//! Interprocedural-analysis domain types: interned call contexts, analysis
//! units and records, the deduplicating work queue, and the zero-information
//! `Unit` summary lattice.

pub mod context;
pub mod unit;

pub use context::{ContextId, ContextManager, CtxStep};
pub use unit::{AnalysisRecord, AnalysisUnit, SummaryLattice, Unit, WorkQueue};
