use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Point-in-time view of an expiry queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Ids currently live.
    pub live: usize,
    /// Heap entries, tombstones included.
    pub pending_entries: usize,
    pub added: u64,
    pub rejected_duplicates: u64,
    pub removed: u64,
    pub requeued: u64,
    pub delivered: u64,
    pub tombstones_discarded: u64,
}

impl QueueStats {
    /// Heap entries that no longer back a live item.
    pub fn stale_entries(&self) -> usize {
        self.pending_entries.saturating_sub(self.live)
    }
}

/// Running totals kept by the queue.
#[derive(Debug, Default)]
pub(super) struct Counters {
    pub(super) added: AtomicU64,
    pub(super) rejected_duplicates: AtomicU64,
    pub(super) removed: AtomicU64,
    pub(super) requeued: AtomicU64,
    pub(super) delivered: AtomicU64,
    pub(super) tombstones_discarded: AtomicU64,
}

impl Counters {
    pub(super) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn snapshot(&self, live: usize, pending_entries: usize) -> QueueStats {
        QueueStats {
            live,
            pending_entries,
            added: self.added.load(Ordering::Relaxed),
            rejected_duplicates: self.rejected_duplicates.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            tombstones_discarded: self.tombstones_discarded.load(Ordering::Relaxed),
        }
    }
}
