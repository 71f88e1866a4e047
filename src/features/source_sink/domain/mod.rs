//! Source/sink summary tables for external calls.

pub mod tables;

pub use tables::{CallTaintEntry, CallTaintSummary, SINK_TAINT_SUMMARIES, SOURCE_TAINT_SUMMARIES};
