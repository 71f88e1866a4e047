// Source/sink identification
//
// One pass over the module, before constraint generation, producing a
// single global FlowRecord of every module-level source and sink: returns
// of input-producing calls, arguments of dangerous calls, destinations of
// memory intrinsics, sizes of dynamic allocas, and the parameters of main.

pub mod domain;
pub mod infrastructure;

pub use infrastructure::SourceSinkAnalysis;
