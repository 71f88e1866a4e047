//! Constraint-system infrastructure: the kind-keyed store, the classical
//! worklist solver, the propagation solver with chaining, and the
//! multithreaded solve entry points.

pub mod kit;
pub mod mt_solve;
pub mod partial_solution;
pub mod worklist_solver;

pub use kit::ConstraintKit;
pub use partial_solution::PartialSolution;
pub use worklist_solver::{Direction, WorklistSolution};
