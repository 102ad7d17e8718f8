// Copyright 2025 Simbrain Developers
// SPDX-License-Identifier: Apache-2.0

//! # Membership Tracking
//!
//! The authoritative set of neurons the engine updates. Mutations are applied
//! to the set immediately and counted as pending operations; the partition
//! used for dispatch catches up when the reconciliation collector rebuilds it.
//!
//! The pending counter is only ever changed while the membership lock is held,
//! so a [`MembershipSnapshot`] pairs a neuron list with exactly the number of
//! operations it reflects. Operations that land after the snapshot stay
//! pending for the next rebuild.

use crate::collector::ReconcileSignal;
use crate::tracing_mutex::TracingMutex;
use ahash::AHashMap;
use simbrain_network::{NetworkListener, NeuronHandle, NeuronId};
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Neuron list plus the pending-operation count it accounts for
#[derive(Debug)]
pub struct MembershipSnapshot {
    pub neurons: Vec<NeuronHandle>,
    pub pending_seen: usize,
}

pub struct MembershipTracker {
    members: TracingMutex<AHashMap<NeuronId, NeuronHandle>>,
    pending: AtomicUsize,
    signal: Arc<ReconcileSignal>,
}

impl MembershipTracker {
    pub fn new() -> Self {
        Self {
            members: TracingMutex::new(AHashMap::new(), "membership"),
            pending: AtomicUsize::new(0),
            signal: Arc::new(ReconcileSignal::default()),
        }
    }

    /// Track `neuron`. Returns false (and records nothing) if its id was
    /// already tracked; the tracked handle is kept.
    pub fn add(&self, neuron: NeuronHandle) -> bool {
        let added = {
            let mut members = self.members.lock();
            let added = insert_new(&mut members, neuron);
            if added {
                self.pending.fetch_add(1, Ordering::AcqRel);
            }
            added
        };
        if added {
            self.signal.notify_pending();
        }
        added
    }

    /// Stop tracking `id`. Returns false if it was not tracked.
    pub fn remove(&self, id: NeuronId) -> bool {
        let removed = {
            let mut members = self.members.lock();
            let removed = members.remove(&id).is_some();
            if removed {
                self.pending.fetch_add(1, Ordering::AcqRel);
            }
            removed
        };
        if removed {
            self.signal.notify_pending();
        }
        removed
    }

    /// Track many neurons under one lock acquisition; returns how many were new.
    pub fn add_all(&self, neurons: impl IntoIterator<Item = NeuronHandle>) -> usize {
        let added = {
            let mut members = self.members.lock();
            let mut added = 0;
            for neuron in neurons {
                if insert_new(&mut members, neuron) {
                    added += 1;
                }
            }
            self.pending.fetch_add(added, Ordering::AcqRel);
            added
        };
        if added > 0 {
            trace!("[MEMBERSHIP] Batch add of {} neurons", added);
            self.signal.notify_pending();
        }
        added
    }

    pub fn remove_all(&self, ids: impl IntoIterator<Item = NeuronId>) -> usize {
        let removed = {
            let mut members = self.members.lock();
            let mut removed = 0;
            for id in ids {
                if members.remove(&id).is_some() {
                    removed += 1;
                }
            }
            self.pending.fetch_add(removed, Ordering::AcqRel);
            removed
        };
        if removed > 0 {
            trace!("[MEMBERSHIP] Batch remove of {} neurons", removed);
            self.signal.notify_pending();
        }
        removed
    }

    /// Populate without recording pending operations. Used when attaching,
    /// where the initial partition is built synchronously right after.
    ///
    /// `is_live` is checked under the membership lock: a neuron whose removal
    /// was already announced is no longer live, and one removed afterwards is
    /// dropped again by its removal event.
    pub(crate) fn seed(
        &self,
        neurons: impl IntoIterator<Item = NeuronHandle>,
        is_live: impl Fn(NeuronId) -> bool,
    ) {
        let mut members = self.members.lock();
        for neuron in neurons {
            if is_live(neuron.id()) {
                insert_new(&mut members, neuron);
            }
        }
    }

    pub fn contains(&self, id: NeuronId) -> bool {
        self.members.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.members.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mutations not yet reflected in the partition
    pub fn pending_operations(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> MembershipSnapshot {
        let members = self.members.lock();
        MembershipSnapshot {
            pending_seen: self.pending.load(Ordering::Acquire),
            neurons: members.values().cloned().collect(),
        }
    }

    /// Retire the operations a successfully installed snapshot accounted for.
    pub(crate) fn acknowledge(&self, seen: usize) {
        self.pending.fetch_sub(seen, Ordering::AcqRel);
    }

    pub(crate) fn signal(&self) -> &Arc<ReconcileSignal> {
        &self.signal
    }
}

/// Insert unless the id is already tracked
fn insert_new(members: &mut AHashMap<NeuronId, NeuronHandle>, neuron: NeuronHandle) -> bool {
    match members.entry(neuron.id()) {
        Entry::Vacant(slot) => {
            slot.insert(neuron);
            true
        }
        Entry::Occupied(_) => false,
    }
}

impl Default for MembershipTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkListener for MembershipTracker {
    fn neuron_added(&self, neuron: &NeuronHandle) {
        self.add(Arc::clone(neuron));
    }

    fn neuron_removed(&self, neuron: &NeuronHandle) {
        self.remove(neuron.id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simbrain_network::{LinearRule, Neuron};

    fn neuron(id: u32) -> NeuronHandle {
        Arc::new(Neuron::new(NeuronId(id), Arc::new(LinearRule::default())))
    }

    #[test]
    fn test_effective_mutations_are_counted() {
        let tracker = MembershipTracker::new();
        assert!(tracker.add(neuron(1)));
        assert!(!tracker.add(neuron(1)));
        assert!(tracker.remove(NeuronId(1)));
        assert!(!tracker.remove(NeuronId(1)));
        assert_eq!(tracker.pending_operations(), 2);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_batch_operations() {
        let tracker = MembershipTracker::new();
        assert_eq!(tracker.add_all((0..10).map(neuron)), 10);
        assert_eq!(tracker.remove_all([NeuronId(2), NeuronId(3), NeuronId(99)]), 2);
        assert_eq!(tracker.len(), 8);
        assert_eq!(tracker.pending_operations(), 12);
        assert!(!tracker.contains(NeuronId(2)));
    }

    #[test]
    fn test_acknowledge_keeps_later_operations() {
        let tracker = MembershipTracker::new();
        tracker.add_all((0..3).map(neuron));
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.pending_seen, 3);
        tracker.add(neuron(3));
        tracker.acknowledge(snapshot.pending_seen);
        assert_eq!(tracker.pending_operations(), 1);
    }

    #[test]
    fn test_duplicate_add_keeps_tracked_handle() {
        let tracker = MembershipTracker::new();
        let first = neuron(7);
        assert!(tracker.add(Arc::clone(&first)));
        tracker.acknowledge(tracker.snapshot().pending_seen);

        assert!(!tracker.add(neuron(7)));
        assert_eq!(tracker.add_all([neuron(7)]), 0);
        assert_eq!(tracker.pending_operations(), 0);
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.neurons.len(), 1);
        assert!(Arc::ptr_eq(&snapshot.neurons[0], &first));
    }

    #[test]
    fn test_seed_records_no_pending_operations() {
        let tracker = MembershipTracker::new();
        tracker.seed((0..5).map(neuron), |_| true);
        assert_eq!(tracker.len(), 5);
        assert_eq!(tracker.pending_operations(), 0);
    }

    #[test]
    fn test_seed_skips_neurons_no_longer_live() {
        let tracker = MembershipTracker::new();
        // Removal announced before seeding: the event found nothing to remove
        assert!(!tracker.remove(NeuronId(3)));
        tracker.seed((0..5).map(neuron), |id| id != NeuronId(3));
        assert_eq!(tracker.len(), 4);
        assert!(!tracker.contains(NeuronId(3)));

        // An addition announced before seeding keeps its handle and pending op
        let early = neuron(10);
        tracker.add(Arc::clone(&early));
        tracker.seed([neuron(10)], |_| true);
        assert_eq!(tracker.pending_operations(), 1);
        let snapshot = tracker.snapshot();
        let tracked = snapshot.neurons.iter().find(|n| n.id() == NeuronId(10)).unwrap();
        assert!(Arc::ptr_eq(tracked, &early));
    }
}
