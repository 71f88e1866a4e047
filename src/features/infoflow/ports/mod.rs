/*
 * Provider ports
 *
 * The external collaborators of the analysis, expressed as traits:
 * the points-to analysis, the call graph, and post-dominator trees. The
 * engine consumes only their answers; default in-memory implementations
 * live in the infrastructure layer.
 */

use std::collections::BTreeSet;

use crate::shared::models::{BlockId, FuncId, InstId, Module, ValueId};

/// Opaque identity of an abstract memory location. The analysis never
/// inspects these beyond set membership.
pub type AbstractLoc = u64;

/// A may-point-to set.
pub type AbstractLocSet = BTreeSet<AbstractLoc>;

/// Points-to analysis interface: two queries per SSA value, both of which
/// may answer the empty set. Results must be stable for the lifetime of
/// the analysis.
pub trait PointsToProvider: Send + Sync {
    /// Abstract locations the value may point to directly.
    fn direct(&self, v: ValueId) -> &AbstractLocSet;

    /// All abstract locations reachable from the value.
    fn reachable(&self, v: ValueId) -> &AbstractLocSet;
}

/// What a call site may invoke.
#[derive(Debug, Clone, Default)]
pub struct CallTargets {
    /// Known candidate callee functions (defined or declared)
    pub functions: Vec<FuncId>,
    /// The call may reach code outside the module (needs a signature)
    pub calls_external: bool,
    /// The call is indirect: candidates are the externally callable set
    pub external_calling: bool,
}

/// Call graph interface.
pub trait CallGraphProvider: Send + Sync {
    /// The module's root function, if it has one (e.g. `main`).
    fn root(&self, module: &Module) -> Option<FuncId>;

    /// Candidate callees of a call site.
    fn callees(&self, module: &Module, site: InstId) -> CallTargets;

    /// Functions an indirect call could reach (the externally callable /
    /// address-taken set).
    fn external_calling_candidates(&self, module: &Module) -> Vec<FuncId>;
}

/// Post-dominator tree interface, per function.
pub trait PostDominatorProvider: Send + Sync {
    /// Does `a` post-dominate `b` within `func`?
    fn dominates(&self, func: FuncId, a: BlockId, b: BlockId) -> bool;
}
