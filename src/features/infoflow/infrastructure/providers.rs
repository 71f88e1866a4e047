/*
 * Default provider implementations
 *
 * - MapPointsTo: explicit per-value direct/reachable sets; absent entries
 *   answer the empty set, and reachable falls back to the direct set.
 * - ModuleCallGraph: direct edges from call instructions; indirect calls
 *   resolve to the address-taken function set, filtered by arity at use.
 * - PostDoms: post-dominator trees from the shared CFG cache.
 */

use rustc_hash::{FxHashMap, FxHashSet};

use super::super::ports::{
    AbstractLoc, AbstractLocSet, CallGraphProvider, CallTargets, PointsToProvider,
    PostDominatorProvider,
};
use crate::shared::models::{BlockId, FuncId, InstId, Module, Opcode, PostDomCache, ValueId, ValueKind};

// ============================================================================
// Points-to
// ============================================================================

/// Explicitly populated points-to sets.
#[derive(Debug, Default)]
pub struct MapPointsTo {
    direct: FxHashMap<ValueId, AbstractLocSet>,
    reachable: FxHashMap<ValueId, AbstractLocSet>,
    empty: AbstractLocSet,
}

impl MapPointsTo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_direct(mut self, v: ValueId, locs: impl IntoIterator<Item = AbstractLoc>) -> Self {
        self.add_direct(v, locs);
        self
    }

    pub fn with_reachable(
        mut self,
        v: ValueId,
        locs: impl IntoIterator<Item = AbstractLoc>,
    ) -> Self {
        self.add_reachable(v, locs);
        self
    }

    pub fn add_direct(&mut self, v: ValueId, locs: impl IntoIterator<Item = AbstractLoc>) {
        self.direct.entry(v).or_default().extend(locs);
    }

    pub fn add_reachable(&mut self, v: ValueId, locs: impl IntoIterator<Item = AbstractLoc>) {
        self.reachable.entry(v).or_default().extend(locs);
    }

    /// Alias two values to the same location set.
    pub fn alias(&mut self, a: ValueId, b: ValueId) {
        let locs: AbstractLocSet = self.direct.get(&a).cloned().unwrap_or_default();
        self.direct.entry(b).or_default().extend(locs);
    }
}

impl PointsToProvider for MapPointsTo {
    fn direct(&self, v: ValueId) -> &AbstractLocSet {
        self.direct.get(&v).unwrap_or(&self.empty)
    }

    fn reachable(&self, v: ValueId) -> &AbstractLocSet {
        self.reachable
            .get(&v)
            .or_else(|| self.direct.get(&v))
            .unwrap_or(&self.empty)
    }
}

// ============================================================================
// Call graph
// ============================================================================

/// Call graph derived from the module: direct edges from call sites, plus
/// the address-taken set as indirect candidates.
#[derive(Debug, Default)]
pub struct ModuleCallGraph {
    address_taken: Vec<FuncId>,
}

impl ModuleCallGraph {
    /// Build from a module. A function is address-taken when its value
    /// appears anywhere other than the callee slot of a call.
    pub fn build(module: &Module) -> Self {
        let mut taken: FxHashSet<FuncId> = FxHashSet::default();
        let fn_of_value = |v: ValueId| match module.value(v).kind {
            ValueKind::Function(f) => Some(f),
            _ => None,
        };

        for function in module.functions() {
            for block in &function.blocks {
                for inst in module.block_insts(*block) {
                    let (operands, callee) = match &inst.op {
                        Opcode::Call { call } => (inst.op.operands(), Some(call.callee)),
                        Opcode::Invoke { call, .. } => (inst.op.operands(), Some(call.callee)),
                        _ => (inst.op.operands(), None),
                    };
                    for op in operands {
                        if Some(op) == callee {
                            continue;
                        }
                        if let Some(f) = fn_of_value(op) {
                            taken.insert(f);
                        }
                    }
                }
            }
        }

        let mut address_taken: Vec<FuncId> = taken.into_iter().collect();
        address_taken.sort();
        Self { address_taken }
    }
}

impl CallGraphProvider for ModuleCallGraph {
    fn root(&self, module: &Module) -> Option<FuncId> {
        module
            .function_by_name("main")
            .filter(|f| !f.is_declaration())
            .map(|f| f.id)
    }

    fn callees(&self, module: &Module, site: InstId) -> CallTargets {
        let Some(cs) = module.call_site(site) else {
            return CallTargets::default();
        };
        match cs.called_function(module) {
            Some(f) => CallTargets {
                functions: vec![f],
                calls_external: module.function(f).is_declaration(),
                external_calling: false,
            },
            None => CallTargets {
                functions: Vec::new(),
                // An indirect call may always escape to code we cannot see.
                calls_external: true,
                external_calling: true,
            },
        }
    }

    fn external_calling_candidates(&self, _module: &Module) -> Vec<FuncId> {
        self.address_taken.clone()
    }
}

// ============================================================================
// Post-dominators
// ============================================================================

/// Post-dominator provider backed by the shared per-function tree cache.
#[derive(Debug)]
pub struct PostDoms {
    cache: PostDomCache,
}

impl PostDoms {
    pub fn build(module: &Module) -> Self {
        Self { cache: PostDomCache::build(module) }
    }
}

impl PostDominatorProvider for PostDoms {
    fn dominates(&self, func: FuncId, a: BlockId, b: BlockId) -> bool {
        self.cache.dominates(func, a, b)
    }
}
