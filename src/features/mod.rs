//! Vertical feature slices, bottom-up: the constraint system, the signature
//! library, source/sink identification, and the interprocedural engine.

pub mod constraints;
pub mod infoflow;
pub mod signatures;
pub mod source_sink;
