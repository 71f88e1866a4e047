//! Signature infrastructure: the registrar and the built-in signature
//! library, including the table-driven stdlib summaries.

pub mod library;
pub mod registrar;
pub mod stdlib;

pub use library::{ArgsToRet, NoFlows, OverflowChecks, TaintReachable};
pub use registrar::{Signature, SignatureRegistrar};
pub use stdlib::StdLib;
