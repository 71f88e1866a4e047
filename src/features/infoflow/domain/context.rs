/*
 * Call contexts
 *
 * A context is a bounded call string: the most recent K callers (or call
 * sites, depending on the configured strategy) on the path into the
 * function under analysis. K is fixed at 1. Contexts are interned by a
 * canonicalizing manager and addressed by small integers; `ContextId(0)` is
 * the empty context, reused for indirect and external calls when context
 * collapsing is configured.
 */

use rustc_hash::FxHashMap;

use crate::config::ContextStrategy;
use crate::shared::models::{FuncId, InstId};

/// Call-site sensitivity depth.
pub const CONTEXT_DEPTH: usize = 1;

/// Canonical handle of an interned call context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ContextId(pub u32);

impl ContextId {
    /// The empty/default context.
    pub const DEFAULT: ContextId = ContextId(0);

    pub fn is_default(&self) -> bool {
        self.0 == 0
    }
}

/// One step of a call string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CtxStep {
    /// Calling function (CallerContext strategy)
    Caller(FuncId),
    /// Call instruction (CallSiteContext strategy)
    Site(InstId),
}

/// Interning manager for call contexts.
#[derive(Debug)]
pub struct ContextManager {
    strategy: ContextStrategy,
    k: usize,
    contexts: Vec<Vec<CtxStep>>,
    index: FxHashMap<Vec<CtxStep>, ContextId>,
}

impl ContextManager {
    pub fn new(strategy: ContextStrategy) -> Self {
        Self::with_depth(strategy, CONTEXT_DEPTH)
    }

    pub fn with_depth(strategy: ContextStrategy, k: usize) -> Self {
        let empty: Vec<CtxStep> = Vec::new();
        let mut index = FxHashMap::default();
        index.insert(empty.clone(), ContextId::DEFAULT);
        Self { strategy, k, contexts: vec![empty], index }
    }

    fn intern(&mut self, steps: Vec<CtxStep>) -> ContextId {
        if let Some(id) = self.index.get(&steps) {
            return *id;
        }
        let id = ContextId(self.contexts.len() as u32);
        self.contexts.push(steps.clone());
        self.index.insert(steps, id);
        id
    }

    /// Extend a context with a call and truncate the front to K entries.
    pub fn update_context(&mut self, ctx: ContextId, caller: FuncId, site: InstId) -> ContextId {
        let mut steps = self.context_for(ctx).to_vec();
        steps.push(match self.strategy {
            ContextStrategy::Caller => CtxStep::Caller(caller),
            ContextStrategy::CallSite => CtxStep::Site(site),
        });
        while steps.len() > self.k {
            steps.remove(0);
        }
        self.intern(steps)
    }

    /// The context used for collapsed indirect and external calls.
    pub fn update_indirect_context(&mut self, _ctx: ContextId, _site: InstId) -> ContextId {
        ContextId::DEFAULT
    }

    /// The initial context of an entry function.
    pub fn initial_context(&self, _func: FuncId) -> ContextId {
        ContextId::DEFAULT
    }

    pub fn context_for(&self, ctx: ContextId) -> &[CtxStep] {
        &self.contexts[ctx.0 as usize]
    }

    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    /// Human-readable rendering for logging.
    pub fn describe(&self, ctx: ContextId) -> String {
        let steps = self.context_for(ctx);
        if steps.is_empty() {
            return "<default>".to_string();
        }
        steps
            .iter()
            .map(|s| match s {
                CtxStep::Caller(f) => format!("fn#{}", f.0),
                CtxStep::Site(i) => format!("site#{}", i.0),
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}
