// Copyright 2025 Simbrain Developers
// SPDX-License-Identifier: Apache-2.0

//! # Reconciliation Collector
//!
//! Background thread that folds membership changes into a fresh partition.
//!
//! ```text
//! Idle --(pending op)--> Debouncing --(window elapsed)--> Reconciling --+
//!  ^                                                                    |
//!  +--------------------------(rebuild installed or failed)------------+
//! ```
//!
//! The debounce window starts at the first pending operation, so a burst of
//! additions costs one rebuild. A failed rebuild is logged and retried on the
//! next cycle; the pending operations it saw stay pending.

use crate::error::{PartitionError, TickError};
use crate::membership::MembershipTracker;
use crate::partition::{PartitionSlot, TaskPartition};
use parking_lot::{Condvar, Mutex};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Default delay between the first pending operation and the rebuild
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectorPhase {
    #[default]
    Idle,
    Debouncing,
    Reconciling,
    Stopped,
}

#[derive(Debug, Clone, Default)]
pub struct CollectorStatus {
    pub phase: CollectorPhase,
    pub reconciliations: u64,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    shutdown: bool,
}

/// Wakeups shared by the tracker, the collector thread and ticking threads.
#[derive(Default)]
pub struct ReconcileSignal {
    status: Mutex<CollectorStatus>,
    /// Collector waits here for pending operations
    wake: Condvar,
    /// Ticking threads wait here for a rebuild to finish
    reconciled: Condvar,
    /// Serializes snapshot, rebuild and acknowledge
    rebuild: Mutex<()>,
}

impl ReconcileSignal {
    pub(crate) fn notify_pending(&self) {
        let _status = self.status.lock();
        self.wake.notify_one();
    }

    pub fn status(&self) -> CollectorStatus {
        self.status.lock().clone()
    }

    /// Block until `tracker` has no pending operations.
    ///
    /// Returns `Ok(false)` if `deadline` passes first. Fails once the
    /// collector has failed more than `max_retries` consecutive times or has
    /// been shut down with work outstanding.
    pub(crate) fn wait_reconciled(
        &self,
        tracker: &MembershipTracker,
        max_retries: u32,
        deadline: Option<Instant>,
    ) -> Result<bool, TickError> {
        let mut status = self.status.lock();
        loop {
            if tracker.pending_operations() == 0 {
                return Ok(true);
            }
            if status.shutdown {
                return Err(TickError::ShutDown);
            }
            if status.consecutive_failures > max_retries {
                return Err(TickError::Reconciliation {
                    attempts: status.consecutive_failures,
                    last_error: status.last_error.clone().unwrap_or_default(),
                });
            }
            match deadline {
                Some(deadline) => {
                    if self.reconciled.wait_until(&mut status, deadline).timed_out() {
                        return Ok(tracker.pending_operations() == 0);
                    }
                }
                None => self.reconciled.wait(&mut status),
            }
        }
    }

    fn request_shutdown(&self) {
        let mut status = self.status.lock();
        status.shutdown = true;
        self.wake.notify_all();
        self.reconciled.notify_all();
    }
}

/// Snapshot the tracker, rebuild the partition and retire the operations the
/// snapshot covered.
pub(crate) fn reconcile(
    tracker: &MembershipTracker,
    slot: &PartitionSlot,
) -> Result<Arc<TaskPartition>, PartitionError> {
    let signal = tracker.signal();
    let _serial = signal.rebuild.lock();
    let snapshot = tracker.snapshot();
    let result = slot.rebuild(snapshot.neurons);

    let mut status = signal.status.lock();
    match &result {
        Ok(partition) => {
            tracker.acknowledge(snapshot.pending_seen);
            status.reconciliations += 1;
            status.consecutive_failures = 0;
            status.last_error = None;
            debug!(
                "[COLLECTOR] Installed partition: {} neurons in {} units ({} ops applied)",
                partition.neuron_count(),
                partition.unit_count(),
                snapshot.pending_seen
            );
        }
        Err(err) => {
            status.consecutive_failures += 1;
            status.last_error = Some(err.to_string());
            warn!(
                "[COLLECTOR] Rebuild failed (attempt {}): {}",
                status.consecutive_failures, err
            );
        }
    }
    signal.reconciled.notify_all();
    result
}

pub struct ReconciliationCollector {
    signal: Arc<ReconcileSignal>,
    thread: Option<JoinHandle<()>>,
}

impl ReconciliationCollector {
    pub fn spawn(
        tracker: Arc<MembershipTracker>,
        slot: Arc<PartitionSlot>,
        debounce: Duration,
    ) -> io::Result<Self> {
        let signal = Arc::clone(tracker.signal());
        let thread = thread::Builder::new()
            .name("simbrain-reconcile".to_string())
            .spawn(move || collector_loop(tracker, slot, debounce))?;
        Ok(Self {
            signal,
            thread: Some(thread),
        })
    }

    pub fn status(&self) -> CollectorStatus {
        self.signal.status()
    }

    /// Current phase of the collector thread
    pub fn state(&self) -> CollectorPhase {
        self.signal.status().phase
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Stop the thread and wait for it. Safe to call more than once.
    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.signal.request_shutdown();
        if thread.join().is_err() {
            error!("[COLLECTOR] Collector thread panicked");
        }
    }
}

impl Drop for ReconciliationCollector {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn collector_loop(tracker: Arc<MembershipTracker>, slot: Arc<PartitionSlot>, debounce: Duration) {
    let signal = Arc::clone(tracker.signal());
    info!("[COLLECTOR] Started (debounce {:?})", debounce);

    loop {
        {
            let mut status = signal.status.lock();
            while !status.shutdown && tracker.pending_operations() == 0 {
                status.phase = CollectorPhase::Idle;
                signal.wake.wait(&mut status);
            }
            if status.shutdown {
                break;
            }

            status.phase = CollectorPhase::Debouncing;
            let deadline = Instant::now() + debounce;
            while !status.shutdown {
                if signal.wake.wait_until(&mut status, deadline).timed_out() {
                    break;
                }
            }
            if status.shutdown {
                break;
            }
            status.phase = CollectorPhase::Reconciling;
        }

        // Failures are recorded in the status; pending stays > 0 so the next
        // pass retries after another debounce window.
        let _ = reconcile(&tracker, &slot);
    }

    signal.status.lock().phase = CollectorPhase::Stopped;
    signal.reconciled.notify_all();
    info!("[COLLECTOR] Stopped");
}
