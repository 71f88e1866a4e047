/*
 * Flow records
 *
 * A FlowRecord relates information flow sources to sinks. It is the
 * declarative currency between instruction rules, signatures, the
 * source/sink scanner, and the constraint generator: the generator lowers
 * each record into `join(sources) ⊑ sink` constraints.
 *
 * Four channels on each side:
 * - Value: the SSA value itself
 * - DirectPtr: the memory directly pointed to by a pointer value
 * - ReachPtr: all memory reachable from a pointer value
 * - Varg: the varargs structure of a function
 *
 * A record also carries the contexts its sources and sinks live in (they
 * differ across call boundaries) and whether the flow is implicit.
 */

use rustc_hash::FxHashSet;

use crate::features::infoflow::domain::ContextId;
use crate::shared::models::{FuncId, ValueId};

/// A bundle of sources and sinks describing one induced flow.
#[derive(Debug, Clone, Default)]
pub struct FlowRecord {
    implicit: bool,
    source_ctx: ContextId,
    sink_ctx: ContextId,

    value_sources: FxHashSet<ValueId>,
    direct_ptr_sources: FxHashSet<ValueId>,
    reach_ptr_sources: FxHashSet<ValueId>,
    varg_sources: FxHashSet<FuncId>,

    value_sinks: FxHashSet<ValueId>,
    direct_ptr_sinks: FxHashSet<ValueId>,
    reach_ptr_sinks: FxHashSet<ValueId>,
    varg_sinks: FxHashSet<FuncId>,
}

impl FlowRecord {
    /// An explicit flow within one context.
    pub fn explicit(ctx: ContextId) -> Self {
        Self::with_contexts(false, ctx, ctx)
    }

    /// An implicit flow within one context.
    pub fn implicit(ctx: ContextId) -> Self {
        Self::with_contexts(true, ctx, ctx)
    }

    pub fn with_contexts(implicit: bool, source_ctx: ContextId, sink_ctx: ContextId) -> Self {
        Self { implicit, source_ctx, sink_ctx, ..Self::default() }
    }

    pub fn is_implicit(&self) -> bool {
        self.implicit
    }

    pub fn source_context(&self) -> ContextId {
        self.source_ctx
    }

    pub fn sink_context(&self) -> ContextId {
        self.sink_ctx
    }

    // ------------------------------------------------------------------
    // Sources
    // ------------------------------------------------------------------

    pub fn add_source_value(&mut self, v: ValueId) -> &mut Self {
        self.value_sources.insert(v);
        self
    }

    pub fn add_source_direct_ptr(&mut self, v: ValueId) -> &mut Self {
        self.direct_ptr_sources.insert(v);
        self
    }

    pub fn add_source_reach_ptr(&mut self, v: ValueId) -> &mut Self {
        self.reach_ptr_sources.insert(v);
        self
    }

    pub fn add_source_varg(&mut self, f: FuncId) -> &mut Self {
        self.varg_sources.insert(f);
        self
    }

    pub fn add_source_values(&mut self, vs: impl IntoIterator<Item = ValueId>) -> &mut Self {
        self.value_sources.extend(vs);
        self
    }

    pub fn add_source_direct_ptrs(&mut self, vs: impl IntoIterator<Item = ValueId>) -> &mut Self {
        self.direct_ptr_sources.extend(vs);
        self
    }

    pub fn add_source_reach_ptrs(&mut self, vs: impl IntoIterator<Item = ValueId>) -> &mut Self {
        self.reach_ptr_sources.extend(vs);
        self
    }

    pub fn source_values(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.value_sources.iter().copied()
    }

    pub fn source_direct_ptrs(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.direct_ptr_sources.iter().copied()
    }

    pub fn source_reach_ptrs(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.reach_ptr_sources.iter().copied()
    }

    pub fn source_vargs(&self) -> impl Iterator<Item = FuncId> + '_ {
        self.varg_sources.iter().copied()
    }

    // ------------------------------------------------------------------
    // Sinks
    // ------------------------------------------------------------------

    pub fn add_sink_value(&mut self, v: ValueId) -> &mut Self {
        self.value_sinks.insert(v);
        self
    }

    pub fn add_sink_direct_ptr(&mut self, v: ValueId) -> &mut Self {
        self.direct_ptr_sinks.insert(v);
        self
    }

    pub fn add_sink_reach_ptr(&mut self, v: ValueId) -> &mut Self {
        self.reach_ptr_sinks.insert(v);
        self
    }

    pub fn add_sink_varg(&mut self, f: FuncId) -> &mut Self {
        self.varg_sinks.insert(f);
        self
    }

    pub fn add_sink_values(&mut self, vs: impl IntoIterator<Item = ValueId>) -> &mut Self {
        self.value_sinks.extend(vs);
        self
    }

    pub fn add_sink_direct_ptrs(&mut self, vs: impl IntoIterator<Item = ValueId>) -> &mut Self {
        self.direct_ptr_sinks.extend(vs);
        self
    }

    pub fn add_sink_reach_ptrs(&mut self, vs: impl IntoIterator<Item = ValueId>) -> &mut Self {
        self.reach_ptr_sinks.extend(vs);
        self
    }

    pub fn sink_values(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.value_sinks.iter().copied()
    }

    pub fn sink_direct_ptrs(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.direct_ptr_sinks.iter().copied()
    }

    pub fn sink_reach_ptrs(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.reach_ptr_sinks.iter().copied()
    }

    pub fn sink_vargs(&self) -> impl Iterator<Item = FuncId> + '_ {
        self.varg_sinks.iter().copied()
    }

    // ------------------------------------------------------------------
    // Sink membership (used by drop-at-sinks partitioning)
    // ------------------------------------------------------------------

    pub fn value_is_sink(&self, v: ValueId) -> bool {
        self.value_sinks.contains(&v)
    }

    pub fn direct_ptr_is_sink(&self, v: ValueId) -> bool {
        self.direct_ptr_sinks.contains(&v)
    }

    pub fn reach_ptr_is_sink(&self, v: ValueId) -> bool {
        self.reach_ptr_sinks.contains(&v)
    }

    pub fn varg_is_sink(&self, f: FuncId) -> bool {
        self.varg_sinks.contains(&f)
    }

    /// No sources on any channel?
    pub fn has_no_sources(&self) -> bool {
        self.value_sources.is_empty()
            && self.direct_ptr_sources.is_empty()
            && self.reach_ptr_sources.is_empty()
            && self.varg_sources.is_empty()
    }

    /// No sinks on any channel?
    pub fn has_no_sinks(&self) -> bool {
        self.value_sinks.is_empty()
            && self.direct_ptr_sinks.is_empty()
            && self.reach_ptr_sinks.is_empty()
            && self.varg_sinks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_are_independent() {
        let mut rec = FlowRecord::explicit(ContextId::DEFAULT);
        rec.add_source_value(ValueId(1))
            .add_source_direct_ptr(ValueId(2))
            .add_sink_value(ValueId(3))
            .add_sink_reach_ptr(ValueId(4));

        assert_eq!(rec.source_values().collect::<Vec<_>>(), vec![ValueId(1)]);
        assert_eq!(rec.source_direct_ptrs().collect::<Vec<_>>(), vec![ValueId(2)]);
        assert!(rec.value_is_sink(ValueId(3)));
        assert!(rec.reach_ptr_is_sink(ValueId(4)));
        assert!(!rec.value_is_sink(ValueId(4)));
        assert!(!rec.is_implicit());
    }

    #[test]
    fn test_contexts_travel_with_the_record() {
        let rec = FlowRecord::with_contexts(true, ContextId(2), ContextId(3));
        assert!(rec.is_implicit());
        assert_eq!(rec.source_context(), ContextId(2));
        assert_eq!(rec.sink_context(), ContextId(3));
    }

    #[test]
    fn test_emptiness_queries() {
        let mut rec = FlowRecord::explicit(ContextId::DEFAULT);
        assert!(rec.has_no_sources());
        assert!(rec.has_no_sinks());
        rec.add_source_varg(FuncId(0));
        assert!(!rec.has_no_sources());
    }
}
