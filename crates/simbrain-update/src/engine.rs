// Copyright 2025 Simbrain Developers
// SPDX-License-Identifier: Apache-2.0

//! # Parallel Buffered Update Engine
//!
//! One tick:
//! 1. wait for any pending membership change to be reconciled
//! 2. input groups pull their next values
//! 3. every update unit computes in parallel (staging `next` activations)
//! 4. join: all units finish, failed or not
//! 5. if no unit failed, every unit commits (`next` -> `current`)
//! 6. wait for reconciliation again so the next tick sees current membership
//! 7. output groups flush
//!
//! A tick that fails leaves every neuron's committed activation untouched;
//! input groups that already pulled are rolled back so their row is applied
//! again by the next tick.
//!
//! The engine owns a dedicated rayon pool sized to the configured worker
//! count, so its parallelism never competes with rayon's global pool.

use crate::action::NetworkUpdateAction;
use crate::collector::{self, CollectorStatus, ReconciliationCollector};
use crate::error::{EngineError, TickError, UnitExecutionError};
use crate::membership::MembershipTracker;
use crate::partition::{PartitionConfig, PartitionSlot, TaskPartition, TaskPartitioner};
use crate::UpdateEngineStats;
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use simbrain_network::{ListenerId, Network, NetworkListener, NeuronHandle, NeuronId, UpdatableGroup};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Ticks slower than this are logged at warn level
const SLOW_TICK_WARN_MS: u128 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Always dispatch units to the worker pool
    Concurrent,
    /// Run every unit on the calling thread
    Serial,
    /// Serial below the configured neuron threshold, concurrent above it
    Auto,
}

impl FromStr for UpdateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "concurrent" | "parallel" => Ok(UpdateMode::Concurrent),
            "serial" => Ok(UpdateMode::Serial),
            "auto" => Ok(UpdateMode::Auto),
            other => Err(format!("unknown update mode '{}'", other)),
        }
    }
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpdateMode::Concurrent => "concurrent",
            UpdateMode::Serial => "serial",
            UpdateMode::Auto => "auto",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub mode: UpdateMode,
    /// Worker threads; 0 means one per available CPU
    pub worker_threads: usize,
    pub partition: PartitionConfig,
    /// Populations below this run serially in `Auto` mode
    pub serial_threshold: usize,
    pub debounce: Duration,
    /// Consecutive failed rebuilds tolerated before ticks fail
    pub max_reconcile_retries: u32,
    /// Block ticks until pending membership changes are reconciled
    pub wait_for_reconciliation: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: UpdateMode::Auto,
            worker_threads: 0,
            partition: PartitionConfig::default(),
            serial_threshold: 256,
            debounce: collector::DEFAULT_DEBOUNCE,
            max_reconcile_retries: 5,
            wait_for_reconciliation: true,
        }
    }
}

impl EngineConfig {
    pub fn resolved_worker_threads(&self) -> usize {
        resolve_workers(self.worker_threads)
    }
}

fn resolve_workers(requested: usize) -> usize {
    if requested > 0 {
        return requested;
    }
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Cooperative stop request for [`UpdateEngine::run`], checked between ticks.
#[derive(Debug, Clone)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

pub struct UpdateEngine {
    network: Arc<Network>,
    config: EngineConfig,
    tracker: Arc<MembershipTracker>,
    listener_id: ListenerId,
    slot: Arc<PartitionSlot>,
    collector: Mutex<Option<ReconciliationCollector>>,
    pool: RwLock<Option<Arc<ThreadPool>>>,
    input_groups: RwLock<Vec<Arc<dyn UpdatableGroup>>>,
    output_groups: RwLock<Vec<Arc<dyn UpdatableGroup>>>,
    /// Held for the duration of a tick; ticks never overlap
    tick_lock: Mutex<()>,
    tick_count: AtomicU64,
    stats: Mutex<UpdateEngineStats>,
    stop: Arc<AtomicBool>,
    shut_down: AtomicBool,
}

impl UpdateEngine {
    /// Attach to `network`: track its current neurons, subscribe to its
    /// membership events, build the initial partition and start the
    /// reconciliation collector.
    pub fn attach(network: Arc<Network>, config: EngineConfig) -> Result<Self, EngineError> {
        let workers = config.resolved_worker_threads();
        let partitioner = TaskPartitioner::new(config.partition, workers)?;
        let slot = Arc::new(PartitionSlot::new(partitioner));
        let tracker = Arc::new(MembershipTracker::new());

        // Subscribe before seeding so no addition falls between the two;
        // seeding skips neurons whose removal was already announced.
        let listener: Arc<dyn NetworkListener> = tracker.clone();
        let weak: Weak<dyn NetworkListener> = Arc::downgrade(&listener);
        let listener_id = network.add_listener(weak);
        tracker.seed(network.neurons(), |id| network.neuron(id).is_some());
        let initial = collector::reconcile(&tracker, &slot)?;

        let pool = match config.mode {
            UpdateMode::Serial => None,
            _ => Some(Arc::new(build_pool(workers)?)),
        };

        let collector = ReconciliationCollector::spawn(Arc::clone(&tracker), Arc::clone(&slot), config.debounce)?;

        info!(
            "[UPDATE-ENGINE] Attached: {} neurons, {} units, {} workers, mode {}",
            initial.neuron_count(),
            initial.unit_count(),
            workers,
            config.mode
        );

        Ok(Self {
            network,
            config,
            tracker,
            listener_id,
            slot,
            collector: Mutex::new(Some(collector)),
            pool: RwLock::new(pool),
            input_groups: RwLock::new(Vec::new()),
            output_groups: RwLock::new(Vec::new()),
            tick_lock: Mutex::new(()),
            tick_count: AtomicU64::new(0),
            stats: Mutex::new(UpdateEngineStats::default()),
            stop: Arc::new(AtomicBool::new(false)),
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn network(&self) -> &Arc<Network> {
        &self.network
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ═══════════════════════════════════════════════════════════
    // Ticking
    // ═══════════════════════════════════════════════════════════

    /// Run one buffered update of every tracked neuron.
    pub fn tick(&self) -> Result<(), TickError> {
        let _tick_guard = self.tick_lock.lock();
        if self.shut_down.load(Ordering::Acquire) {
            return Err(TickError::ShutDown);
        }
        let tick = self.tick_count.load(Ordering::Acquire) + 1;
        if self.stop.load(Ordering::Acquire) {
            return Err(TickError::Stopped(tick));
        }

        let started = Instant::now();
        let mut waited = Duration::ZERO;
        let result = self.run_tick(tick, &mut waited);
        // Reconciliation waits are reported on their own, not as tick work
        let busy = started.elapsed().saturating_sub(waited);

        let mut stats = self.stats.lock();
        stats.total_reconcile_wait_us += waited.as_micros() as u64;
        match &result {
            Ok(updated) => {
                self.tick_count.store(tick, Ordering::Release);
                stats.total_ticks += 1;
                stats.total_neuron_updates += *updated as u64;
                stats.total_processing_time_us += busy.as_micros() as u64;
                if busy.as_millis() > SLOW_TICK_WARN_MS {
                    warn!(
                        "[UPDATE-ENGINE] Slow tick {}: {:.2}ms for {} neurons",
                        tick,
                        busy.as_secs_f64() * 1000.0,
                        updated
                    );
                } else {
                    trace!("[UPDATE-ENGINE] Tick {} updated {} neurons in {:?}", tick, updated, busy);
                }
            }
            Err(err) => {
                stats.failed_ticks += 1;
                error!("[UPDATE-ENGINE] Tick {} failed: {}", tick, err);
            }
        }
        result.map(|_| ())
    }

    fn run_tick(&self, tick: u64, waited: &mut Duration) -> Result<usize, TickError> {
        if self.config.wait_for_reconciliation {
            *waited += self.await_reconciled()?;
        }

        let inputs = self.input_groups.read().clone();
        for (pulled, group) in inputs.iter().enumerate() {
            if let Err(source) = group.pull_inputs() {
                rollback_inputs(&inputs[..pulled]);
                return Err(TickError::InputPull {
                    group: group.label().to_string(),
                    source,
                });
            }
        }

        let partition = self.slot.load();
        let time_step = self.network.time_step();
        let pool = self.dispatch_pool(&partition);

        let failures = match &pool {
            Some(pool) => pool.install(|| {
                partition
                    .units()
                    .par_iter()
                    .map(|unit| unit.compute(time_step))
                    .filter_map(Result::err)
                    .collect::<Vec<UnitExecutionError>>()
            }),
            None => partition
                .units()
                .iter()
                .map(|unit| unit.compute(time_step))
                .filter_map(Result::err)
                .collect(),
        };

        if !failures.is_empty() {
            rollback_inputs(&inputs);
            let mut failures = failures;
            failures.sort_by_key(|f| f.unit);
            return Err(TickError::UnitFailures { tick, failures });
        }

        match &pool {
            Some(pool) => pool.install(|| partition.units().par_iter().for_each(|unit| unit.commit())),
            None => partition.units().iter().for_each(|unit| unit.commit()),
        }

        if self.config.wait_for_reconciliation {
            *waited += self.await_reconciled()?;
        }

        for group in self.output_groups.read().iter() {
            group.flush_outputs().map_err(|source| TickError::OutputFlush {
                group: group.label().to_string(),
                source,
            })?;
        }

        Ok(partition.neuron_count())
    }

    /// Pool to dispatch on, or `None` to run units on the calling thread
    fn dispatch_pool(&self, partition: &TaskPartition) -> Option<Arc<ThreadPool>> {
        let concurrent = match self.config.mode {
            UpdateMode::Concurrent => true,
            UpdateMode::Serial => false,
            UpdateMode::Auto => partition.neuron_count() >= self.config.serial_threshold,
        };
        if !concurrent || partition.unit_count() < 2 {
            return None;
        }
        self.pool.read().clone()
    }

    /// Block until membership is reconciled; returns how long that took.
    fn await_reconciled(&self) -> Result<Duration, TickError> {
        if self.tracker.pending_operations() == 0 {
            return Ok(Duration::ZERO);
        }
        let started = Instant::now();
        debug!(
            "[UPDATE-ENGINE] Waiting for {} pending membership operations",
            self.tracker.pending_operations()
        );
        self.tracker
            .signal()
            .wait_reconciled(&self.tracker, self.config.max_reconcile_retries, None)?;
        let waited = started.elapsed();
        debug!("[UPDATE-ENGINE] Reconciliation wait took {:?}", waited);
        Ok(waited)
    }

    /// Tick until `max_ticks` complete (or forever with `None`), a tick fails,
    /// or a stop is requested. Returns the number of ticks completed.
    pub fn run(&self, max_ticks: Option<u64>) -> Result<u64, TickError> {
        let mut completed = 0;
        while max_ticks.map_or(true, |max| completed < max) {
            if self.stop.load(Ordering::Acquire) {
                info!("[UPDATE-ENGINE] Stop requested after {} ticks", completed);
                break;
            }
            self.tick()?;
            completed += 1;
        }
        Ok(completed)
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            flag: Arc::clone(&self.stop),
        }
    }

    /// Clear a previous stop request
    pub fn resume(&self) {
        self.stop.store(false, Ordering::Release);
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count.load(Ordering::Acquire)
    }

    // ═══════════════════════════════════════════════════════════
    // Membership
    // ═══════════════════════════════════════════════════════════

    pub fn notify_neuron_added(&self, neuron: NeuronHandle) -> bool {
        self.tracker.add(neuron)
    }

    pub fn notify_neuron_removed(&self, id: NeuronId) -> bool {
        self.tracker.remove(id)
    }

    pub fn notify_neurons_added(&self, neurons: impl IntoIterator<Item = NeuronHandle>) -> usize {
        self.tracker.add_all(neurons)
    }

    pub fn notify_neurons_removed(&self, ids: impl IntoIterator<Item = NeuronId>) -> usize {
        self.tracker.remove_all(ids)
    }

    pub fn tracked_neuron_count(&self) -> usize {
        self.tracker.len()
    }

    pub fn pending_operations(&self) -> usize {
        self.tracker.pending_operations()
    }

    /// The partition the next tick will dispatch, unless a rebuild lands first
    pub fn partition(&self) -> Arc<TaskPartition> {
        self.slot.load()
    }

    /// Block until all pending membership changes are reconciled or `timeout`
    /// passes. Returns whether the engine is reconciled.
    pub fn wait_for_reconciliation(&self, timeout: Duration) -> Result<bool, TickError> {
        self.tracker.signal().wait_reconciled(
            &self.tracker,
            self.config.max_reconcile_retries,
            Some(Instant::now() + timeout),
        )
    }

    pub fn collector_status(&self) -> CollectorStatus {
        self.tracker.signal().status()
    }

    // ═══════════════════════════════════════════════════════════
    // Groups
    // ═══════════════════════════════════════════════════════════

    pub fn register_input_group(&self, group: Arc<dyn UpdatableGroup>) {
        debug!("[UPDATE-ENGINE] Registered input group '{}'", group.label());
        self.input_groups.write().push(group);
    }

    pub fn register_output_group(&self, group: Arc<dyn UpdatableGroup>) {
        debug!("[UPDATE-ENGINE] Registered output group '{}'", group.label());
        self.output_groups.write().push(group);
    }

    /// Remove every input and output group with `label`; returns how many
    /// registrations were dropped.
    pub fn unregister_group(&self, label: &str) -> usize {
        let mut removed = 0;
        for groups in [&self.input_groups, &self.output_groups] {
            let mut groups = groups.write();
            let before = groups.len();
            groups.retain(|g| g.label() != label);
            removed += before - groups.len();
        }
        removed
    }

    // ═══════════════════════════════════════════════════════════
    // Configuration and lifecycle
    // ═══════════════════════════════════════════════════════════

    /// Resize the worker pool and rebuild the partition for the new count.
    /// Waits for any in-flight tick to finish first.
    pub fn set_worker_threads(&self, threads: usize) -> Result<(), EngineError> {
        let _tick_guard = self.tick_lock.lock();
        if self.shut_down.load(Ordering::Acquire) {
            return Err(EngineError::ShutDown);
        }
        let workers = resolve_workers(threads);
        let partitioner = TaskPartitioner::new(self.config.partition, workers)?;
        if self.config.mode != UpdateMode::Serial {
            *self.pool.write() = Some(Arc::new(build_pool(workers)?));
        }
        self.slot.set_partitioner(partitioner);
        collector::reconcile(&self.tracker, &self.slot)?;
        info!("[UPDATE-ENGINE] Worker threads set to {}", workers);
        Ok(())
    }

    pub fn worker_threads(&self) -> usize {
        self.slot.parallelism()
    }

    pub fn stats(&self) -> UpdateEngineStats {
        let mut stats = self.stats.lock().clone();
        stats.reconciliations = self.tracker.signal().status().reconciliations;
        stats
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Stop the collector, release the worker pool and unsubscribe from the
    /// network. Safe to call more than once; also runs on drop.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.stop.store(true, Ordering::Release);
        if let Some(mut collector) = self.collector.lock().take() {
            collector.shutdown();
        }
        // Wait out any tick still holding the pool
        let _tick_guard = self.tick_lock.lock();
        self.pool.write().take();
        self.network.remove_listener(self.listener_id);
        info!("[UPDATE-ENGINE] Shut down after {} ticks", self.tick_count());
    }
}

impl NetworkUpdateAction for UpdateEngine {
    fn invoke(&self) -> Result<(), TickError> {
        self.tick()
    }

    fn description(&self) -> &str {
        "Parallel Buffered Update"
    }

    fn long_description(&self) -> &str {
        "Parallel Buffered Update (All Neurons)"
    }
}

impl Drop for UpdateEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Undo this tick's input pulls, most recent first
fn rollback_inputs(groups: &[Arc<dyn UpdatableGroup>]) {
    for group in groups.iter().rev() {
        group.rollback_inputs();
    }
}

fn build_pool(workers: usize) -> Result<ThreadPool, EngineError> {
    Ok(ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("simbrain-update-{}", i))
        .build()?)
}
