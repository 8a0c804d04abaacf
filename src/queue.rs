//! Pending and finished sequences for a run.
//!
//! The queue only tracks unit ids. It never touches the units themselves; the scheduler owns that, and is the only
//! caller of [`RunQueue::dequeue_next`].

use std::collections::VecDeque;

use framerunner_core::TestResult;
use serde::{Deserialize, Serialize};

use crate::unit::UnitId;

/// A completed run, with the result as it was at completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishedEntry {
    pub unit: UnitId,
    pub path: String,
    pub result: TestResult,
}

#[derive(Debug, Clone, Default)]
pub struct RunQueue {
    pending: VecDeque<UnitId>,
    /// Most recent first.
    finished: VecDeque<FinishedEntry>,
    history_limit: Option<usize>,
}

impl RunQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `limit` finished entries, dropping the oldest.
    pub fn with_history_limit(mut self, limit: Option<usize>) -> Self {
        self.history_limit = limit;
        self.truncate_history();
        self
    }

    /// Append to the pending sequence. No-op when already pending.
    ///
    /// ## Returns
    /// - (`bool`): whether the unit was added.
    pub fn enqueue(&mut self, unit: UnitId) -> bool {
        if self.pending.contains(&unit) {
            return false;
        }
        self.pending.push_back(unit);
        true
    }

    pub fn dequeue_next(&mut self) -> Option<UnitId> {
        self.pending.pop_front()
    }

    /// Remove a unit from the pending sequence. Absent units are ignored.
    pub fn remove(&mut self, unit: UnitId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|pending| *pending != unit);
        before != self.pending.len()
    }

    /// Move a pending unit to `index`, clamped into the pending range.
    ///
    /// ## Returns
    /// - (`Option<usize>`): the index the unit ended up at, or `None` if it was not pending.
    pub fn reorder(&mut self, unit: UnitId, index: usize) -> Option<usize> {
        let from = self.position(unit)?;
        self.pending.remove(from)?;
        let to = index.min(self.pending.len());
        self.pending.insert(to, unit);
        Some(to)
    }

    /// Record a completed run at the front of the finished sequence.
    pub fn finish(&mut self, unit: UnitId, path: &str, result: TestResult) {
        self.remove(unit);
        self.finished.push_front(FinishedEntry {
            unit,
            path: path.to_string(),
            result,
        });
        self.truncate_history();
    }

    /// Drop every finished entry for `unit`.
    pub fn remove_finished(&mut self, unit: UnitId) -> bool {
        let before = self.finished.len();
        self.finished.retain(|entry| entry.unit != unit);
        before != self.finished.len()
    }

    pub fn clear_finished(&mut self) {
        self.finished.clear();
    }

    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    pub fn position(&self, unit: UnitId) -> Option<usize> {
        self.pending.iter().position(|pending| *pending == unit)
    }

    pub fn contains(&self, unit: UnitId) -> bool {
        self.pending.contains(&unit)
    }

    pub fn pending(&self) -> impl ExactSizeIterator<Item = UnitId> + '_ {
        self.pending.iter().copied()
    }

    pub fn finished(&self) -> impl ExactSizeIterator<Item = &FinishedEntry> + '_ {
        self.finished.iter()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn finished_len(&self) -> usize {
        self.finished.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn truncate_history(&mut self) {
        if let Some(limit) = self.history_limit {
            self.finished.truncate(limit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(queue: &RunQueue) -> Vec<u32> {
        queue.pending().map(UnitId::index).collect()
    }

    #[test]
    fn test_enqueue_ignores_duplicates() {
        let mut queue = RunQueue::new();
        assert!(queue.enqueue(UnitId(1)));
        assert!(queue.enqueue(UnitId(2)));
        assert!(!queue.enqueue(UnitId(1)));
        assert_eq!(ids(&queue), [1, 2]);
        assert_eq!(queue.dequeue_next(), Some(UnitId(1)));
        assert_eq!(queue.dequeue_next(), Some(UnitId(2)));
        assert_eq!(queue.dequeue_next(), None);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut queue = RunQueue::new();
        queue.enqueue(UnitId(1));
        assert!(queue.remove(UnitId(1)));
        assert!(!queue.remove(UnitId(1)));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_reorder_clamps() {
        let mut queue = RunQueue::new();
        for id in 0..4 {
            queue.enqueue(UnitId(id));
        }
        assert_eq!(queue.reorder(UnitId(0), 99), Some(3));
        assert_eq!(ids(&queue), [1, 2, 3, 0]);
        assert_eq!(queue.reorder(UnitId(3), 0), Some(0));
        assert_eq!(ids(&queue), [3, 1, 2, 0]);
        assert_eq!(queue.reorder(UnitId(9), 0), None);
    }

    #[test]
    fn test_finish_is_most_recent_first() {
        let mut queue = RunQueue::new();
        queue.finish(UnitId(1), "a", TestResult::Passed);
        queue.finish(UnitId(2), "b", TestResult::Failed);
        let order: Vec<_> = queue.finished().map(|entry| entry.path.as_str()).collect();
        assert_eq!(order, ["b", "a"]);
    }

    #[test]
    fn test_history_limit_drops_oldest() {
        let mut queue = RunQueue::new().with_history_limit(Some(2));
        queue.finish(UnitId(1), "a", TestResult::Passed);
        queue.finish(UnitId(2), "b", TestResult::Passed);
        queue.finish(UnitId(3), "c", TestResult::Skipped);
        let order: Vec<_> = queue.finished().map(|entry| entry.unit.index()).collect();
        assert_eq!(order, [3, 2]);
        assert!(queue.remove_finished(UnitId(2)));
        assert_eq!(queue.finished_len(), 1);
        queue.clear_finished();
        assert_eq!(queue.finished_len(), 0);
    }
}
