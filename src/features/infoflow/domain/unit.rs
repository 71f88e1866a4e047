/*
 * Analysis units, records, and the work queue
 *
 * An analysis unit is a (function, context) pair; the same function is
 * analyzed once per context in which it is reached. The driver remembers,
 * per unit, the most recent input it used and the most recent summary it
 * produced, and re-enqueues dependent units when a summary changes.
 *
 * The summary lattice is generic; the taint analysis instantiates it with
 * the zero-information `Unit` (constraint generation carries everything),
 * but the fixpoint machinery is written against the lattice operations.
 */

use rustc_hash::FxHashSet;
use std::collections::VecDeque;

use super::context::ContextId;
use crate::shared::models::FuncId;

/// Join-semilattice interface for driver inputs and summaries.
pub trait SummaryLattice: Clone + PartialEq {
    fn bottom() -> Self;
    fn leq(&self, other: &Self) -> bool;
    fn join(&self, other: &Self) -> Self;
}

/// The zero-information summary: every element is bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Unit;

impl SummaryLattice for Unit {
    fn bottom() -> Self {
        Unit
    }

    fn leq(&self, _other: &Self) -> bool {
        true
    }

    fn join(&self, _other: &Self) -> Self {
        Unit
    }
}

/// A function to analyze and the context to analyze it in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnalysisUnit {
    pub func: FuncId,
    pub ctx: ContextId,
}

impl AnalysisUnit {
    pub fn new(func: FuncId, ctx: ContextId) -> Self {
        Self { func, ctx }
    }
}

/// Input/output pair remembered per analysis unit.
#[derive(Debug, Clone, Default)]
pub struct AnalysisRecord<I, O> {
    pub input: I,
    pub output: O,
}

impl<I: SummaryLattice, O: SummaryLattice> AnalysisRecord<I, O> {
    pub fn bottom() -> Self {
        Self { input: I::bottom(), output: O::bottom() }
    }
}

/// FIFO of analysis units with set-backed deduplication: a unit is in the
/// queue at most once, but may be re-enqueued after it has been dequeued.
#[derive(Debug, Default)]
pub struct WorkQueue {
    queue: VecDeque<AnalysisUnit>,
    queued: FxHashSet<AnalysisUnit>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn enqueue(&mut self, unit: AnalysisUnit) {
        if self.queued.insert(unit) {
            self.queue.push_back(unit);
        }
    }

    pub fn enqueue_all(&mut self, units: impl IntoIterator<Item = AnalysisUnit>) {
        for unit in units {
            self.enqueue(unit);
        }
    }

    pub fn dequeue(&mut self) -> Option<AnalysisUnit> {
        let unit = self.queue.pop_front()?;
        self.queued.remove(&unit);
        Some(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_lattice_is_trivial() {
        assert_eq!(Unit::bottom(), Unit);
        assert!(Unit.leq(&Unit));
        assert_eq!(Unit.join(&Unit), Unit);
    }

    #[test]
    fn test_queue_deduplicates_while_pending() {
        let mut q = WorkQueue::new();
        let u = AnalysisUnit::new(FuncId(0), ContextId::DEFAULT);
        q.enqueue(u);
        q.enqueue(u);
        assert_eq!(q.len(), 1);

        assert_eq!(q.dequeue(), Some(u));
        assert!(q.dequeue().is_none());

        // Re-enqueue after dequeue is allowed.
        q.enqueue(u);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_queue_is_fifo() {
        let mut q = WorkQueue::new();
        let a = AnalysisUnit::new(FuncId(0), ContextId::DEFAULT);
        let b = AnalysisUnit::new(FuncId(1), ContextId::DEFAULT);
        q.enqueue(a);
        q.enqueue(b);
        assert_eq!(q.dequeue(), Some(a));
        assert_eq!(q.dequeue(), Some(b));
    }
}
