// Constraint system for the two-point security lattice
//
// Hexagonal layout:
// - domain: lattice levels, constraint elements, interning, constraints
// - infrastructure: constraint kit (store), worklist solver, propagation
//   solver with chaining, multithreaded solve entry points

pub mod domain;
pub mod infrastructure;

pub use domain::{ConsElem, Constraint, ElemArena, JoinId, SecLevel, VarId};
pub use infrastructure::{ConstraintKit, PartialSolution, WorklistSolution};
