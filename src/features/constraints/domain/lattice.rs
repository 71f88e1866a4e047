/*
 * Two-point security lattice
 *
 * Low (untainted) ⊑ High (tainted). Join is the pointwise maximum. The
 * least fixpoint of a constraint system defaults unconstrained variables to
 * Low; the greatest defaults them to High.
 *
 * References:
 * - Denning (1976): "A Lattice Model of Secure Information Flow"
 * - Sabelfeld & Myers (2003): "Language-based Information-Flow Security"
 */

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Security level of a value or memory location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecLevel {
    /// Untainted
    Low,
    /// Tainted
    High,
}

impl SecLevel {
    fn rank(&self) -> u8 {
        match self {
            SecLevel::Low => 0,
            SecLevel::High => 1,
        }
    }

    /// Least upper bound: ⊔
    pub fn join(&self, other: &Self) -> Self {
        if self.rank() >= other.rank() {
            *self
        } else {
            *other
        }
    }

    /// Flows-to relation: self ⊑ other
    pub fn leq(&self, other: &Self) -> bool {
        self.rank() <= other.rank()
    }

    /// Bottom of the lattice
    pub fn bottom() -> Self {
        SecLevel::Low
    }

    /// Top of the lattice
    pub fn top() -> Self {
        SecLevel::High
    }

    /// The other endpoint of the lattice.
    pub fn flipped(&self) -> Self {
        match self {
            SecLevel::Low => SecLevel::High,
            SecLevel::High => SecLevel::Low,
        }
    }

    pub fn is_high(&self) -> bool {
        matches!(self, SecLevel::High)
    }
}

impl PartialOrd for SecLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SecLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl Default for SecLevel {
    fn default() -> Self {
        SecLevel::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order() {
        assert!(SecLevel::Low.leq(&SecLevel::High));
        assert!(SecLevel::Low.leq(&SecLevel::Low));
        assert!(SecLevel::High.leq(&SecLevel::High));
        assert!(!SecLevel::High.leq(&SecLevel::Low));
    }

    #[test]
    fn test_join_is_commutative_associative_idempotent() {
        let levels = [SecLevel::Low, SecLevel::High];
        for a in levels {
            assert_eq!(a.join(&a), a, "idempotence failed for {:?}", a);
            for b in levels {
                assert_eq!(a.join(&b), b.join(&a), "commutativity failed");
                for c in levels {
                    assert_eq!(
                        a.join(&b).join(&c),
                        a.join(&b.join(&c)),
                        "associativity failed"
                    );
                }
            }
        }
    }

    #[test]
    fn test_bounds() {
        assert_eq!(SecLevel::bottom(), SecLevel::Low);
        assert_eq!(SecLevel::top(), SecLevel::High);
        assert_eq!(SecLevel::Low.join(&SecLevel::High), SecLevel::High);
        assert_eq!(SecLevel::Low.flipped(), SecLevel::High);
    }
}
