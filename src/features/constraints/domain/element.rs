/*
 * Constraint elements
 *
 * A `ConsElem` is a constant, a variable, or the join of a set of
 * non-join elements. Joins are content-addressed: building a join from the
 * same member set always yields the same `JoinId`, so interned identity
 * doubles as structural equality for the lifetime of the arena.
 *
 * Elements are small `Copy` handles into an `ElemArena` owned by the
 * constraint kit; identity comparison of handles replaces the pointer
 * identity the analysis semantics rely on.
 */

use rustc_hash::FxHashMap;
use std::collections::BTreeSet;

use super::lattice::SecLevel;
use crate::errors::{InfoflowError, Result};

/// Handle of a constraint variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u32);

/// Handle of an interned join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JoinId(pub u32);

/// A term that may appear in a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConsElem {
    Const(SecLevel),
    Var(VarId),
    Join(JoinId),
}

impl ConsElem {
    pub const fn low() -> Self {
        ConsElem::Const(SecLevel::Low)
    }

    pub const fn high() -> Self {
        ConsElem::Const(SecLevel::High)
    }

    pub fn is_join(&self) -> bool {
        matches!(self, ConsElem::Join(_))
    }

    pub fn as_var(&self) -> Option<VarId> {
        match self {
            ConsElem::Var(v) => Some(*v),
            _ => None,
        }
    }
}

/// Arena owning all variables and interned joins of one constraint system.
#[derive(Debug, Default)]
pub struct ElemArena {
    /// Variable descriptions, indexed by `VarId`
    var_descs: Vec<String>,
    /// Join member sets, indexed by `JoinId`; members are never joins
    joins: Vec<BTreeSet<ConsElem>>,
    /// Content-addressing index for joins
    join_index: FxHashMap<BTreeSet<ConsElem>, JoinId>,
}

impl ElemArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh constraint variable.
    pub fn new_var(&mut self, description: impl Into<String>) -> VarId {
        let id = VarId(self.var_descs.len() as u32);
        self.var_descs.push(description.into());
        id
    }

    pub fn var_description(&self, var: VarId) -> &str {
        &self.var_descs[var.0 as usize]
    }

    pub fn var_count(&self) -> usize {
        self.var_descs.len()
    }

    /// Members of a join.
    pub fn join_members(&self, join: JoinId) -> &BTreeSet<ConsElem> {
        &self.joins[join.0 as usize]
    }

    fn intern(&mut self, members: BTreeSet<ConsElem>) -> ConsElem {
        if members.len() == 1 {
            return *members.iter().next().expect("non-empty");
        }
        if let Some(id) = self.join_index.get(&members) {
            return ConsElem::Join(*id);
        }
        let id = JoinId(self.joins.len() as u32);
        self.joins.push(members.clone());
        self.join_index.insert(members, id);
        ConsElem::Join(id)
    }

    fn collect_members(&self, elem: ConsElem, into: &mut BTreeSet<ConsElem>) {
        match elem {
            ConsElem::Join(j) => {
                into.extend(self.join_members(j).iter().copied());
            }
            other => {
                into.insert(other);
            }
        }
    }

    /// Upper bound of two elements. Commutative, associative, idempotent;
    /// nested joins are flattened.
    pub fn upper_bound(&mut self, e1: ConsElem, e2: ConsElem) -> ConsElem {
        if e1 == e2 {
            return e1;
        }
        let mut members = BTreeSet::new();
        self.collect_members(e1, &mut members);
        self.collect_members(e2, &mut members);
        self.intern(members)
    }

    /// Upper bound where either side may be absent.
    pub fn upper_bound_opt(
        &mut self,
        e1: Option<ConsElem>,
        e2: Option<ConsElem>,
    ) -> Option<ConsElem> {
        match (e1, e2) {
            (None, e2) => e2,
            (e1, None) => e1,
            (Some(a), Some(b)) => Some(self.upper_bound(a, b)),
        }
    }

    /// Upper bound of a non-empty set of elements.
    pub fn upper_bound_all(
        &mut self,
        elems: impl IntoIterator<Item = ConsElem>,
    ) -> Result<ConsElem> {
        let mut members = BTreeSet::new();
        for elem in elems {
            self.collect_members(elem, &mut members);
        }
        if members.is_empty() {
            return Err(InfoflowError::EmptyJoin);
        }
        Ok(self.intern(members))
    }

    /// All variables occurring in an element.
    pub fn variables(&self, elem: ConsElem) -> Vec<VarId> {
        match elem {
            ConsElem::Const(_) => Vec::new(),
            ConsElem::Var(v) => vec![v],
            ConsElem::Join(j) => self
                .join_members(j)
                .iter()
                .filter_map(|e| e.as_var())
                .collect(),
        }
    }

    /// Element-level ⊑, independent of any solution: constants compare by
    /// level, variables compare to nothing but themselves through a
    /// solution, and a join is ⊑ an element iff all members are.
    pub fn leq(&self, a: ConsElem, b: ConsElem) -> bool {
        match (a, b) {
            (ConsElem::Const(la), ConsElem::Const(lb)) => la.leq(&lb),
            (ConsElem::Join(j), other) => self
                .join_members(j)
                .iter()
                .all(|m| self.leq(*m, other)),
            _ => false,
        }
    }
}
