//! Heap entry for the deadline heap.

use std::cmp::Ordering;

use tokio::time::Instant;

use crate::domain::DelayedItem;

/// One deadline in the heap.
///
/// `sequence` ties the entry to the membership slot it was armed with. An
/// entry whose sequence no longer matches its slot is a tombstone.
///
/// We use reverse ordering so `BinaryHeap` acts as a min-heap (earliest first).
#[derive(Debug)]
pub(super) struct Scheduled<T> {
    pub(super) deadline: Instant,
    pub(super) sequence: u64,
    pub(super) item: DelayedItem<T>,
}

impl<T> Scheduled<T> {
    pub(super) fn new(sequence: u64, item: DelayedItem<T>) -> Self {
        Self {
            deadline: item.deadline(),
            sequence,
            item,
        }
    }
}

impl<T> PartialEq for Scheduled<T> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.sequence == other.sequence
    }
}

impl<T> Eq for Scheduled<T> {}

impl<T> PartialOrd for Scheduled<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Scheduled<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Earlier deadline wins; among equal deadlines the older arm wins.
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}
