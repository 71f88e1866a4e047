// Information flow signatures for external code
//
// When a call leaves the analyzed module, a registered signature summarizes
// the flows the call induces as `FlowRecord`s. Signatures are consulted in
// registration order; the first one accepting a call site wins.

pub mod domain;
pub mod infrastructure;

pub use domain::FlowRecord;
pub use infrastructure::{
    ArgsToRet, NoFlows, OverflowChecks, Signature, SignatureRegistrar, StdLib, TaintReachable,
};
