/*
 * Analysis configuration
 *
 * A small flag surface: context collapsing for indirect and external
 * calls, sink partitioning, the bulk-solver worker cap, and the call
 * context flavor. Defaults mirror the production defaults of the analysis
 * this engine is modeled on: collapse both indirect and external contexts,
 * keep sink flows in the default kinds, sixteen workers.
 */

use serde::{Deserialize, Serialize};

/// Which component of a call extends the context string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ContextStrategy {
    /// The calling function
    #[default]
    Caller,
    /// The call instruction itself
    CallSite,
}

/// Configuration recognized by the analysis core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoflowConfig {
    /// Use the default context for callees reached through the call graph's
    /// external-calling node.
    pub collapse_external_context: bool,

    /// Use the default context for indirect callees.
    pub collapse_indirect_context: bool,

    /// Cut dependencies at declared sinks: sources that are themselves
    /// sinks feed the `*-sinks` kinds instead of the default kinds.
    pub drop_at_sinks: bool,

    /// Cap on worker threads in the bulk solver.
    pub parallel_workers: usize,

    /// Call context flavor (K = 1 either way).
    pub context_strategy: ContextStrategy,
}

impl Default for InfoflowConfig {
    fn default() -> Self {
        Self {
            collapse_external_context: true,
            collapse_indirect_context: true,
            drop_at_sinks: false,
            parallel_workers: 16,
            context_strategy: ContextStrategy::Caller,
        }
    }
}

impl InfoflowConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_drop_at_sinks(mut self, drop_at_sinks: bool) -> Self {
        self.drop_at_sinks = drop_at_sinks;
        self
    }

    pub fn with_collapse_indirect(mut self, collapse: bool) -> Self {
        self.collapse_indirect_context = collapse;
        self
    }

    pub fn with_collapse_external(mut self, collapse: bool) -> Self {
        self.collapse_external_context = collapse;
        self
    }

    pub fn with_parallel_workers(mut self, workers: usize) -> Self {
        self.parallel_workers = workers;
        self
    }

    pub fn with_context_strategy(mut self, strategy: ContextStrategy) -> Self {
        self.context_strategy = strategy;
        self
    }
}
