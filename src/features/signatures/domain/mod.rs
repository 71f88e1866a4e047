//! Signature domain types.

pub mod flow_record;

pub use flow_record::FlowRecord;
