//! Time-ordered deletion queue.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tokio::time::Instant;

use super::handle::ArchiveHandle;

/// One scheduled deletion.
///
/// Ordering is reversed so `BinaryHeap` pops the earliest deadline first.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Deadline {
    due: Instant,
    handle: ArchiveHandle,
}

impl PartialOrd for Deadline {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Deadline {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.handle.cmp(&self.handle))
    }
}

/// Min-heap of deletion deadlines.
///
/// A handle may appear more than once (max-age entry plus a post-download
/// entry). Entries are hints: the owner re-checks the artifact's current
/// deadline when one pops and ignores stale ones.
#[derive(Debug, Default)]
pub struct ExpiryQueue {
    heap: BinaryHeap<Deadline>,
}

impl ExpiryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `handle` for deletion at `due`.
    pub fn push(&mut self, handle: ArchiveHandle, due: Instant) {
        self.heap.push(Deadline { due, handle });
    }

    /// Earliest pending deadline.
    pub fn next_due(&self) -> Option<Instant> {
        self.heap.peek().map(|d| d.due)
    }

    /// Remove and return every entry due at or before `now`, earliest first.
    pub fn pop_due(&mut self, now: Instant) -> Vec<ArchiveHandle> {
        let mut due = Vec::new();
        while let Some(entry) = self.heap.peek() {
            if entry.due > now {
                break;
            }
            if let Some(entry) = self.heap.pop() {
                due.push(entry.handle);
            }
        }
        due
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
