/*
 * CFG and post-dominator utilities
 *
 * Post-dominance drives the implicit-flow rule for conditional terminators:
 * a successor that post-dominates the branching block learns nothing from
 * the branch condition.
 *
 * Trees are computed per function with petgraph's dominator algorithm
 * (Cooper/Harvey/Kennedy "simple fast") over the reversed CFG, rooted at a
 * synthetic exit node that all function-leaving blocks feed into. The
 * module-wide cache computes every defined function once up front so
 * repeated queries during constraint generation are map lookups.
 */

use petgraph::algo::dominators::{self, Dominators};
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashMap;

use super::ir::{BlockId, FuncId, Module};

/// Per-function control flow graph over block ids.
#[derive(Debug, Clone)]
pub struct FunctionCfg {
    graph: DiGraph<BlockId, ()>,
    nodes: FxHashMap<BlockId, NodeIndex>,
}

impl FunctionCfg {
    pub fn build(module: &Module, func: FuncId) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = FxHashMap::default();
        for block in &module.function(func).blocks {
            nodes.insert(*block, graph.add_node(*block));
        }
        for block in &module.function(func).blocks {
            if let Some(term) = module.terminator(*block) {
                for succ in term.op.successors() {
                    graph.add_edge(nodes[block], nodes[&succ], ());
                }
            }
        }
        Self { graph, nodes }
    }

    pub fn successors(&self, block: BlockId) -> Vec<BlockId> {
        self.graph
            .neighbors(self.nodes[&block])
            .map(|n| self.graph[n])
            .collect()
    }
}

/// Post-dominator tree of one function.
#[derive(Debug, Clone)]
pub struct PostDominatorTree {
    /// Immediate post-dominator of each block; the synthetic exit is the
    /// tree root and is not represented.
    ipdom: FxHashMap<BlockId, BlockId>,
}

impl PostDominatorTree {
    pub fn build(module: &Module, func: FuncId) -> Self {
        let mut graph: DiGraph<Option<BlockId>, ()> = DiGraph::new();
        let mut nodes: FxHashMap<BlockId, NodeIndex> = FxHashMap::default();

        let exit = graph.add_node(None);
        for block in &module.function(func).blocks {
            nodes.insert(*block, graph.add_node(Some(*block)));
        }
        for block in &module.function(func).blocks {
            let succs = module
                .terminator(*block)
                .map(|t| t.op.successors())
                .unwrap_or_default();
            if succs.is_empty() {
                // Function-leaving block: reverse edge from the exit
                graph.add_edge(exit, nodes[block], ());
            } else {
                for succ in succs {
                    // Reversed CFG edge
                    graph.add_edge(nodes[&succ], nodes[block], ());
                }
            }
        }

        let doms: Dominators<NodeIndex> = dominators::simple_fast(&graph, exit);

        let mut ipdom = FxHashMap::default();
        for (block, node) in &nodes {
            if let Some(idom) = doms.immediate_dominator(*node) {
                if let Some(parent) = graph[idom] {
                    ipdom.insert(*block, parent);
                }
                // Parent is the synthetic exit: the block's post-dominator
                // chain ends here.
            }
            // Blocks that cannot reach the exit (infinite loops) have no
            // post-dominator information; nothing post-dominates them.
        }
        Self { ipdom }
    }

    /// Does `a` post-dominate `b`?
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        if a == b {
            return true;
        }
        let mut cur = b;
        while let Some(parent) = self.ipdom.get(&cur) {
            if *parent == a {
                return true;
            }
            cur = *parent;
        }
        false
    }
}

/// Module-wide cache of post-dominator trees, computed once per function.
#[derive(Debug, Default)]
pub struct PostDomCache {
    trees: FxHashMap<FuncId, PostDominatorTree>,
}

impl PostDomCache {
    pub fn build(module: &Module) -> Self {
        let mut trees = FxHashMap::default();
        for function in module.functions() {
            if !function.is_declaration() {
                trees.insert(function.id, PostDominatorTree::build(module, function.id));
            }
        }
        Self { trees }
    }

    pub fn tree(&self, func: FuncId) -> Option<&PostDominatorTree> {
        self.trees.get(&func)
    }

    pub fn dominates(&self, func: FuncId, a: BlockId, b: BlockId) -> bool {
        self.trees.get(&func).map(|t| t.dominates(a, b)).unwrap_or(false)
    }
}
