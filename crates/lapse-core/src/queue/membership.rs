//! Live-membership set.
//!
//! Each live id owns a slot holding the sequence number of the heap entry that
//! currently represents it. Slots are atomics so that the read-locked paths
//! (re-arm, delivery claim) can move them without taking the write lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Slot value of an item that has been claimed for delivery but not yet
/// dropped from the map. Sequences start at 1, so no entry ever matches it.
pub(super) const RETIRED: u64 = 0;

#[derive(Debug, Default)]
pub(super) struct Membership {
    slots: HashMap<String, AtomicU64>,
}

impl Membership {
    pub(super) fn contains(&self, id: &str) -> bool {
        self.slots
            .get(id)
            .is_some_and(|slot| slot.load(Ordering::Acquire) != RETIRED)
    }

    /// Mark `id` live with `sequence`. Refuses ids that are already live.
    /// A retired slot counts as absent and is replaced.
    pub(super) fn insert(&mut self, id: &str, sequence: u64) -> bool {
        if let Some(slot) = self.slots.get_mut(id) {
            if *slot.get_mut() != RETIRED {
                return false;
            }
            *slot.get_mut() = sequence;
            return true;
        }
        self.slots.insert(id.to_owned(), AtomicU64::new(sequence));
        true
    }

    /// Returns whether `id` was live.
    pub(super) fn remove(&mut self, id: &str) -> bool {
        self.slots
            .remove(id)
            .is_some_and(|slot| slot.into_inner() != RETIRED)
    }

    /// Point a live slot at a new sequence. No-op for absent or retired ids.
    pub(super) fn rearm(&self, id: &str, sequence: u64) -> bool {
        let Some(slot) = self.slots.get(id) else {
            return false;
        };
        let mut current = slot.load(Ordering::Acquire);
        loop {
            if current == RETIRED {
                return false;
            }
            match slot.compare_exchange_weak(
                current,
                sequence,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Claim the entry armed with `sequence` for delivery. At most one caller
    /// wins a given sequence.
    pub(super) fn claim(&self, id: &str, sequence: u64) -> bool {
        self.slots.get(id).is_some_and(|slot| {
            slot.compare_exchange(sequence, RETIRED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        })
    }

    /// Move a slot from `from` to `to`, keeping the id live. Used when a
    /// delivered entry is replaced by its next occurrence.
    pub(super) fn advance(&self, id: &str, from: u64, to: u64) -> bool {
        self.slots.get(id).is_some_and(|slot| {
            slot.compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        })
    }

    /// Drop a slot left behind by a successful claim. Slots re-used by a
    /// fresh insert in the meantime are kept.
    pub(super) fn purge_retired(&mut self, id: &str) {
        if self
            .slots
            .get_mut(id)
            .is_some_and(|slot| *slot.get_mut() == RETIRED)
        {
            self.slots.remove(id);
        }
    }

    pub(super) fn clear(&mut self) {
        self.slots.clear();
    }

    /// Number of live ids.
    pub(super) fn len(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| slot.load(Ordering::Acquire) != RETIRED)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_refuses_live_ids() {
        let mut m = Membership::default();
        assert!(m.insert("r1", 1));
        assert!(!m.insert("r1", 2));
        assert!(m.contains("r1"));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut m = Membership::default();
        m.insert("r1", 1);
        assert!(m.remove("r1"));
        assert!(!m.remove("r1"));
        assert!(!m.contains("r1"));
    }

    #[test]
    fn rearm_moves_slot_and_stales_old_sequence() {
        let mut m = Membership::default();
        m.insert("r1", 1);
        assert!(m.rearm("r1", 5));

        assert!(!m.claim("r1", 1));
        assert!(m.claim("r1", 5));
    }

    #[test]
    fn rearm_ignores_absent_ids() {
        let m = Membership::default();
        assert!(!m.rearm("ghost", 3));
        assert!(!m.contains("ghost"));
    }

    #[test]
    fn claim_wins_once_then_retires() {
        let mut m = Membership::default();
        m.insert("r1", 1);

        assert!(m.claim("r1", 1));
        assert!(!m.claim("r1", 1));
        assert!(!m.contains("r1"));
        assert!(!m.rearm("r1", 2));

        m.purge_retired("r1");
        assert!(!m.remove("r1"));
    }

    #[test]
    fn advance_only_from_current_sequence() {
        let mut m = Membership::default();
        m.insert("r1", 1);

        assert!(!m.advance("r1", 9, 10));
        assert!(m.advance("r1", 1, 2));
        assert!(m.contains("r1"));
        assert!(!m.claim("r1", 1));
        assert!(m.claim("r1", 2));
    }

    #[test]
    fn purge_keeps_slot_reused_after_claim() {
        let mut m = Membership::default();
        m.insert("r1", 1);
        assert!(m.claim("r1", 1));

        assert!(m.insert("r1", 2));
        m.purge_retired("r1");
        assert!(m.contains("r1"));
    }
}
