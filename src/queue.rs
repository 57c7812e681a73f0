//! Pending update queue with backlog coalescing.
//!
//! Snapshots are drained one at a time, but a backlog is never replayed:
//! when more than one snapshot is waiting at drain time, everything except
//! the newest is discarded and the newest is rendered instantly. Each
//! snapshot supersedes its predecessors wholesale, so nothing is lost.

use std::collections::VecDeque;

use tracing::debug;

use crate::model::DiscussionSnapshot;

/// How the drained snapshot must be rendered.
#[derive(Debug, Clone, PartialEq)]
pub enum Drain {
    /// Normal path: one snapshot, rendered with animation.
    Animated(DiscussionSnapshot),
    /// Backlog collapsed to its newest snapshot; render without animation.
    Instant {
        snapshot: DiscussionSnapshot,
        discarded: usize,
    },
}

impl Drain {
    pub fn snapshot(&self) -> &DiscussionSnapshot {
        match self {
            Drain::Animated(s) => s,
            Drain::Instant { snapshot, .. } => snapshot,
        }
    }
}

/// A drain was requested while another one is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainBusy;

impl std::fmt::Display for DrainBusy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "a drain is already in progress")
    }
}

impl std::error::Error for DrainBusy {}

#[derive(Debug, Default)]
pub struct UpdateQueue {
    pending: VecDeque<DiscussionSnapshot>,
    draining: bool,
}

impl UpdateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, snapshot: DiscussionSnapshot) {
        self.pending.push_back(snapshot);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_draining(&self) -> bool {
        self.draining
    }

    /// Drop everything pending (new poll session, or superseded by a
    /// terminal snapshot). Returns how many snapshots were dropped.
    pub fn clear(&mut self) -> usize {
        let n = self.pending.len();
        self.pending.clear();
        n
    }

    /// Take the next unit of work.
    ///
    /// Returns `Err(DrainBusy)` while a previous drain has not been
    /// finished, `Ok(None)` when nothing is pending. On `Ok(Some(_))` the
    /// caller must call [`finish_drain`](Self::finish_drain) once rendering
    /// is done.
    pub fn begin_drain(&mut self) -> Result<Option<Drain>, DrainBusy> {
        if self.draining {
            return Err(DrainBusy);
        }
        let drain = if self.pending.len() > 1 {
            let discarded = self.pending.len() - 1;
            let snapshot = self.pending.pop_back();
            self.pending.clear();
            debug!(discarded, "coalescing update backlog");
            snapshot.map(|snapshot| Drain::Instant { snapshot, discarded })
        } else {
            self.pending.pop_front().map(Drain::Animated)
        };
        if drain.is_some() {
            self.draining = true;
        }
        Ok(drain)
    }

    pub fn finish_drain(&mut self) {
        self.draining = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DiscussionStatus, Turn};

    fn snap(turns: usize) -> DiscussionSnapshot {
        let mut s = DiscussionSnapshot::new("d1", DiscussionStatus::Running);
        s.transcript = (0..turns).map(|i| Turn::new("A", format!("m{i}"))).collect();
        s
    }

    #[test]
    fn empty_queue_yields_nothing() {
        let mut q = UpdateQueue::new();
        assert_eq!(q.begin_drain(), Ok(None));
        assert!(!q.is_draining());
    }

    #[test]
    fn single_snapshot_is_animated() {
        let mut q = UpdateQueue::new();
        q.push(snap(1));
        let d = q.begin_drain().unwrap().unwrap();
        assert!(matches!(d, Drain::Animated(_)));
        assert!(q.is_empty());
    }

    #[test]
    fn backlog_collapses_to_latest_instant() {
        let mut q = UpdateQueue::new();
        q.push(snap(1));
        q.push(snap(2));
        q.push(snap(3));
        match q.begin_drain().unwrap().unwrap() {
            Drain::Instant { snapshot, discarded } => {
                assert_eq!(snapshot.transcript.len(), 3);
                assert_eq!(discarded, 2);
            }
            other => panic!("expected instant drain, got {other:?}"),
        }
        assert!(q.is_empty());
    }

    #[test]
    fn reentrant_drain_rejected_until_finished() {
        let mut q = UpdateQueue::new();
        q.push(snap(1));
        q.push(snap(2));
        let _first = q.begin_drain().unwrap().unwrap();
        q.push(snap(3));
        assert_eq!(q.begin_drain(), Err(DrainBusy));
        q.finish_drain();
        let next = q.begin_drain().unwrap().unwrap();
        assert_eq!(next.snapshot().transcript.len(), 3);
    }

    #[test]
    fn clear_reports_dropped() {
        let mut q = UpdateQueue::new();
        q.push(snap(1));
        q.push(snap(2));
        assert_eq!(q.clear(), 2);
        assert!(q.is_empty());
    }

    #[test]
    fn fifo_when_draining_one_at_a_time() {
        let mut q = UpdateQueue::new();
        q.push(snap(1));
        let a = q.begin_drain().unwrap().unwrap();
        q.finish_drain();
        q.push(snap(2));
        let b = q.begin_drain().unwrap().unwrap();
        assert_eq!(a.snapshot().transcript.len(), 1);
        assert_eq!(b.snapshot().transcript.len(), 2);
    }
}
