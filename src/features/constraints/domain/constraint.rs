/*
 * Constraints and constraint kinds
 *
 * A constraint is the immutable inequality `lhs ⊑ rhs`. Constraints are
 * collected under named kinds; four kinds are reserved for the analysis
 * itself, split along two axes: explicit vs. implicit flow, and ordinary
 * flow vs. flow into declared sinks.
 */

use super::element::ConsElem;

/// An immutable inequality `lhs ⊑ rhs` between constraint elements.
///
/// Invariant (enforced by the store): neither side of a *stored* constraint
/// is a join. Joins on the left are expanded into one constraint per member
/// at insertion; joins on the right are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constraint {
    pub lhs: ConsElem,
    pub rhs: ConsElem,
}

impl Constraint {
    pub fn new(lhs: ConsElem, rhs: ConsElem) -> Self {
        Self { lhs, rhs }
    }
}

/// Explicit flows.
pub const KIND_DEFAULT: &str = "default";
/// Explicit flows whose source is itself a declared sink.
pub const KIND_DEFAULT_SINKS: &str = "default-sinks";
/// Implicit (control-dependence) flows.
pub const KIND_IMPLICIT: &str = "implicit";
/// Implicit flows whose source is itself a declared sink.
pub const KIND_IMPLICIT_SINKS: &str = "implicit-sinks";

/// Select the reserved kind for a flow.
pub fn kind_for(implicit: bool, sink: bool) -> &'static str {
    match (implicit, sink) {
        (true, true) => KIND_IMPLICIT_SINKS,
        (true, false) => KIND_IMPLICIT,
        (false, true) => KIND_DEFAULT_SINKS,
        (false, false) => KIND_DEFAULT,
    }
}

/// Reserved kinds may not receive user constraints.
pub fn is_reserved_kind(kind: &str) -> bool {
    matches!(
        kind,
        KIND_DEFAULT | KIND_DEFAULT_SINKS | KIND_IMPLICIT | KIND_IMPLICIT_SINKS
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_selection() {
        assert_eq!(kind_for(false, false), "default");
        assert_eq!(kind_for(false, true), "default-sinks");
        assert_eq!(kind_for(true, false), "implicit");
        assert_eq!(kind_for(true, true), "implicit-sinks");
    }

    #[test]
    fn test_reserved_kinds() {
        assert!(is_reserved_kind("default"));
        assert!(is_reserved_kind("implicit-sinks"));
        assert!(!is_reserved_kind("sanitize"));
        assert!(!is_reserved_kind("overflow-sources3"));
    }
}
