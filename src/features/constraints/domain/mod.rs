//! Constraint-system domain types: the security lattice, constraint
//! elements with interned joins, and the constraints themselves.

pub mod constraint;
pub mod element;
pub mod lattice;

pub use constraint::{
    kind_for, is_reserved_kind, Constraint, KIND_DEFAULT, KIND_DEFAULT_SINKS, KIND_IMPLICIT,
    KIND_IMPLICIT_SINKS,
};
pub use element::{ConsElem, ElemArena, JoinId, VarId};
pub use lattice::SecLevel;
