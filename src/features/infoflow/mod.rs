// Constraint generation and the context-sensitive interprocedural driver
//
// Hexagonal layout:
// - domain: call contexts, analysis units, the work queue, Unit summaries
// - ports: provider traits for the external collaborators (points-to,
//   call graph, post-dominators)
// - infrastructure: the engine (variable pools, flow-record lowering,
//   per-opcode rules, driver loop), solutions, slices, default providers
// - application: one-call façade and analysis statistics

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod ports;
