//! Expiry-ordered queue with a live-membership guard.
//!
//! Design:
//! - The deadline heap and the membership map are separate structures. The
//!   heap has its own mutex, so inserts made under the shared membership lock
//!   stay safe.
//! - `remove_request` only touches membership. The heap entry stays behind as
//!   a tombstone and is dropped when a consumer pops it.
//! - Every heap entry carries the sequence it was armed with; an entry is live
//!   only while its id's slot still holds that sequence. This makes tombstones
//!   of removed items and superseded re-arm entries look the same.
//! - Lock order is membership, then heap. Neither lock is held across an await.

use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::sync::{Notify, watch};
use tokio::time::Instant;
use tracing::{debug, trace};

use super::membership::Membership;
use super::scheduled::Scheduled;
use super::stats::{Counters, QueueStats};
use crate::domain::{DelayedItem, RequestContext};
use crate::error::{LapseError, Result};

/// What a non-blocking look at the heap found.
enum Next<T> {
    Ready(DelayedItem<T>),
    WaitUntil(Instant),
    Empty,
}

/// Expiry queue.
///
/// Producers call [`add_request`](Self::add_request),
/// [`remove_request`](Self::remove_request) and
/// [`requeue_request`](Self::requeue_request); none of them wait on anything
/// but lock contention. Consumers await [`process_next`](Self::process_next),
/// which hands out each live item once, earliest deadline first.
///
/// Share it with `Arc`; there is no global instance.
///
/// # Example
/// ```ignore
/// let queue = Arc::new(ExpiryQueue::new());
/// queue.add_request(DelayedItem::new(request, Duration::from_secs(10)));
/// let hung = queue.process_next().await;
/// ```
pub struct ExpiryQueue<T> {
    membership: RwLock<Membership>,
    heap: Mutex<BinaryHeap<Scheduled<T>>>,
    sequence: AtomicU64,
    notify: Notify,
    counters: Counters,
}

impl<T> ExpiryQueue<T> {
    pub fn new() -> Self {
        Self {
            membership: RwLock::new(Membership::default()),
            heap: Mutex::new(BinaryHeap::new()),
            sequence: AtomicU64::new(1),
            notify: Notify::new(),
            counters: Counters::default(),
        }
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    fn members(&self) -> RwLockReadGuard<'_, Membership> {
        self.membership
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn members_mut(&self) -> RwLockWriteGuard<'_, Membership> {
        self.membership
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn heap(&self) -> MutexGuard<'_, BinaryHeap<Scheduled<T>>> {
        self.heap.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push an entry; returns whether it became the earliest deadline.
    fn push_entry(&self, entry: Scheduled<T>) -> bool {
        let sequence = entry.sequence;
        let mut heap = self.heap();
        heap.push(entry);
        heap.peek().is_some_and(|head| head.sequence == sequence)
    }

    /// Empty both the heap and the membership set.
    pub fn clear(&self) {
        let mut members = self.members_mut();
        let dropped = {
            let mut heap = self.heap();
            let n = heap.len();
            heap.clear();
            n
        };
        members.clear();
        debug!(dropped, "expiry queue cleared");
    }

    pub fn is_live(&self, id: &str) -> bool {
        self.members().contains(id)
    }

    pub fn live_len(&self) -> usize {
        self.members().len()
    }

    /// Heap entries, tombstones included.
    pub fn pending_entries(&self) -> usize {
        self.heap().len()
    }

    pub fn stats(&self) -> QueueStats {
        let live = self.live_len();
        let pending = self.pending_entries();
        self.counters.snapshot(live, pending)
    }

    /// Cancel the item with `id`. Unknown ids are ignored.
    ///
    /// Returns whether the id was live. The heap entry is left in place and
    /// is skipped by consumers.
    pub fn remove_request(&self, id: &str) -> bool {
        let was_live = self.members_mut().remove(id);
        if was_live {
            Counters::bump(&self.counters.removed);
            debug!(id, "request removed");
        }
        was_live
    }
}

impl<T> Default for ExpiryQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: RequestContext> ExpiryQueue<T> {
    /// Start tracking `item`.
    ///
    /// Returns `false`, and changes nothing, when an item with the same id is
    /// already live.
    pub fn add_request(&self, item: DelayedItem<T>) -> bool {
        let mut members = self.members_mut();
        let sequence = self.next_sequence();
        if !members.insert(item.id(), sequence) {
            Counters::bump(&self.counters.rejected_duplicates);
            debug!(id = item.id(), "request already live, add refused");
            return false;
        }
        debug!(id = item.id(), delay_ms = item.delay().as_millis() as u64, "request added");
        let became_head = self.push_entry(Scheduled::new(sequence, item));
        drop(members);

        Counters::bump(&self.counters.added);
        if became_head {
            self.notify.notify_waiters();
        }
        true
    }

    /// Re-arm a live item with the deadline carried by `item`.
    ///
    /// Ids that are not live are ignored. The previous heap entry becomes a
    /// tombstone. Returns whether the item was re-armed.
    pub fn requeue_request(&self, item: DelayedItem<T>) -> bool {
        let members = self.members();
        let sequence = self.next_sequence();
        if !members.rearm(item.id(), sequence) {
            trace!(id = item.id(), "requeue of non-live request ignored");
            return false;
        }
        debug!(id = item.id(), delay_ms = item.delay().as_millis() as u64, "request re-armed");
        let became_head = self.push_entry(Scheduled::new(sequence, item));
        drop(members);

        Counters::bump(&self.counters.requeued);
        if became_head {
            self.notify.notify_waiters();
        }
        true
    }

    /// Wait for the next live item whose deadline has passed.
    ///
    /// Tombstones met on the way are discarded. The returned item is no longer
    /// live. Waits forever on an empty queue.
    ///
    /// Cancel safe: dropping the future never loses an item.
    pub async fn process_next(&self) -> DelayedItem<T> {
        self.next_with(None).await
    }

    /// [`process_next`](Self::process_next), abandoned once `shutdown` turns
    /// `true` or its sender is dropped.
    pub async fn process_next_or_shutdown(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<DelayedItem<T>> {
        interruptible(shutdown, self.process_next()).await
    }

    async fn next_with(&self, follow_up: Option<&FollowUp<T>>) -> DelayedItem<T> {
        loop {
            // Register before looking at the heap so a push in between wakes us.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.try_take(follow_up) {
                Next::Ready(item) => return item,
                Next::Empty => notified.await,
                Next::WaitUntil(deadline) => {
                    tokio::select! {
                        _ = notified.as_mut() => {}
                        _ = tokio::time::sleep_until(deadline) => {}
                    }
                }
            }
        }
    }

    /// Pop due entries until one is live, without waiting.
    fn try_take(&self, follow_up: Option<&FollowUp<T>>) -> Next<T> {
        loop {
            let entry = {
                let mut heap = self.heap();
                match heap.peek() {
                    None => return Next::Empty,
                    Some(head) if head.deadline > Instant::now() => {
                        return Next::WaitUntil(head.deadline);
                    }
                    Some(_) => {}
                }
                match heap.pop() {
                    Some(entry) => entry,
                    None => return Next::Empty,
                }
            };

            let claimed = match follow_up {
                None => self.claim(&entry),
                Some(follow_up) => self.claim_and_rearm(&entry, follow_up),
            };
            if claimed {
                Counters::bump(&self.counters.delivered);
                debug!(id = entry.item.id(), "request expired");
                return Next::Ready(entry.item);
            }
            Counters::bump(&self.counters.tombstones_discarded);
            trace!(id = entry.item.id(), sequence = entry.sequence, "tombstone discarded");
        }
    }

    fn claim(&self, entry: &Scheduled<T>) -> bool {
        let id = entry.item.id();
        if !self.members().claim(id, entry.sequence) {
            return false;
        }
        self.members_mut().purge_retired(id);
        true
    }

    /// Claim `entry` but keep its id live, armed with the item `follow_up`
    /// builds.
    fn claim_and_rearm(&self, entry: &Scheduled<T>, follow_up: &FollowUp<T>) -> bool {
        let members = self.members();
        let sequence = self.next_sequence();
        if !members.advance(entry.item.id(), entry.sequence, sequence) {
            return false;
        }
        let became_head = self.push_entry(Scheduled::new(sequence, follow_up(&entry.item)));
        drop(members);

        if became_head {
            self.notify.notify_waiters();
        }
        true
    }
}

impl<T: RequestContext + Clone> ExpiryQueue<T> {
    /// Like [`process_next`](Self::process_next), but the delivered item stays
    /// live and comes due again `every` later, until it is removed.
    pub async fn process_next_and_rearm(&self, every: Duration) -> DelayedItem<T> {
        let follow_up: &FollowUp<T> =
            &move |item: &DelayedItem<T>| DelayedItem::new(item.payload().clone(), every);
        self.next_with(Some(follow_up)).await
    }
}

/// Builds the entry that replaces a delivered one.
type FollowUp<T> = dyn Fn(&DelayedItem<T>) -> DelayedItem<T> + Send + Sync;

/// Run `fut` unless `shutdown` turns `true` (or its sender is dropped) first.
pub async fn interruptible<F: Future>(
    shutdown: &mut watch::Receiver<bool>,
    fut: F,
) -> Result<F::Output> {
    if *shutdown.borrow() {
        return Err(LapseError::Interrupted);
    }
    tokio::select! {
        output = fut => Ok(output),
        _ = shutdown.wait_for(|stop| *stop) => Err(LapseError::Interrupted),
    }
}
