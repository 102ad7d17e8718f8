// Copyright 2025 Simbrain Developers
// SPDX-License-Identifier: Apache-2.0

//! # Task Partitioning
//!
//! Splits the tracked neuron population into [`UpdateUnit`]s, the pieces of
//! work handed to the worker pool.
//!
//! ## Chunk sizing
//! ```text
//! chunks = ceil(N / base)
//! if chunks <= oversubscription * P:   chunk = base
//! else:                                chunk = base * 2 * floor(log2(chunks / P))
//! ```
//! Small populations keep the base chunk size so every worker gets work; large
//! populations grow the chunk geometrically so the number of dispatched units
//! stays near the worker count instead of drowning the pool in tiny tasks.
//!
//! Partitions are immutable once built. A membership change produces a new
//! partition which replaces the old one in a [`PartitionSlot`]; ticks keep
//! using the `Arc` they loaded at tick start.

use crate::error::{NeuronFailure, PartitionError, UnitExecutionError};
use ahash::AHashSet;
use parking_lot::RwLock;
use simbrain_network::{NeuronHandle, NeuronId};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Default number of neurons per unit for small populations
pub const DEFAULT_BASE_CHUNK_SIZE: usize = 64;

/// Default number of base-sized units allowed per worker before chunks grow
pub const DEFAULT_OVERSUBSCRIPTION: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionConfig {
    pub base_chunk_size: usize,
    pub oversubscription: usize,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            base_chunk_size: DEFAULT_BASE_CHUNK_SIZE,
            oversubscription: DEFAULT_OVERSUBSCRIPTION,
        }
    }
}

/// The smallest schedulable piece of work: a fixed list of neurons updated by
/// one worker, each together with its afferent synapses.
#[derive(Clone)]
pub struct UpdateUnit {
    index: usize,
    neurons: Arc<[NeuronHandle]>,
}

impl UpdateUnit {
    pub fn new(index: usize, neurons: Vec<NeuronHandle>) -> Self {
        Self {
            index,
            neurons: neurons.into(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn neurons(&self) -> &[NeuronHandle] {
        &self.neurons
    }

    pub fn len(&self) -> usize {
        self.neurons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neurons.is_empty()
    }

    /// Compute phase: stage the next activation of every neuron in the unit.
    ///
    /// Every neuron is attempted even after a failure so the whole unit's
    /// failures are reported together. Panics raised by update rules are
    /// caught and reported as failures of the offending neuron.
    pub fn compute(&self, time_step: f64) -> Result<usize, UnitExecutionError> {
        let mut failures = Vec::new();
        for neuron in self.neurons.iter() {
            match panic::catch_unwind(AssertUnwindSafe(|| neuron.compute_next(time_step))) {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => failures.push(NeuronFailure {
                    neuron: neuron.id(),
                    reason: err.to_string(),
                }),
                Err(payload) => failures.push(NeuronFailure {
                    neuron: neuron.id(),
                    reason: format!("update panicked: {}", panic_message(payload.as_ref())),
                }),
            }
        }
        trace!(
            "[PARTITION] Unit {} computed {} neurons ({} failed)",
            self.index,
            self.neurons.len(),
            failures.len()
        );
        if failures.is_empty() {
            Ok(self.neurons.len())
        } else {
            Err(UnitExecutionError {
                unit: self.index,
                failures,
            })
        }
    }

    /// Commit phase: publish every staged activation.
    pub fn commit(&self) {
        for neuron in self.neurons.iter() {
            neuron.commit();
        }
    }
}

impl fmt::Debug for UpdateUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateUnit")
            .field("index", &self.index)
            .field("neurons", &self.neurons.len())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Complete division of the tracked neurons into units for one tick.
#[derive(Debug, Clone)]
pub struct TaskPartition {
    units: Vec<UpdateUnit>,
    parallelism: usize,
    chunk_size: usize,
}

impl TaskPartition {
    pub fn empty(parallelism: usize) -> Self {
        Self {
            units: Vec::new(),
            parallelism,
            chunk_size: 0,
        }
    }

    pub fn units(&self) -> &[UpdateUnit] {
        &self.units
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Number of neurons covered, counted from the units themselves
    pub fn neuron_count(&self) -> usize {
        self.units.iter().map(UpdateUnit::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Ids covered by the partition, in unit order
    pub fn neuron_ids(&self) -> Vec<NeuronId> {
        self.units
            .iter()
            .flat_map(|u| u.neurons().iter().map(|n| n.id()))
            .collect()
    }

    pub fn contains(&self, id: NeuronId) -> bool {
        self.units
            .iter()
            .any(|u| u.neurons().iter().any(|n| n.id() == id))
    }

    /// Check that the units are pairwise disjoint and cover exactly `expected`.
    pub fn verify(&self, expected: &AHashSet<NeuronId>) -> Result<(), PartitionError> {
        let mut seen = AHashSet::with_capacity(expected.len());
        for unit in &self.units {
            for neuron in unit.neurons() {
                if !seen.insert(neuron.id()) {
                    return Err(PartitionError::DuplicateNeuron(neuron.id()));
                }
            }
        }
        if seen.len() != expected.len() || !seen.iter().all(|id| expected.contains(id)) {
            return Err(PartitionError::CoverageMismatch {
                expected: expected.len(),
                covered: seen.len(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for TaskPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Task list contains {} neurons across {} processors",
            self.neuron_count(),
            self.parallelism
        )?;
        for (i, unit) in self.units.iter().enumerate() {
            writeln!(f, "Task {} handles {} neurons", i + 1, unit.len())?;
        }
        Ok(())
    }
}

/// Builds [`TaskPartition`]s for a fixed parallelism.
#[derive(Debug, Clone)]
pub struct TaskPartitioner {
    config: PartitionConfig,
    parallelism: usize,
}

impl TaskPartitioner {
    pub fn new(config: PartitionConfig, parallelism: usize) -> Result<Self, PartitionError> {
        if parallelism == 0 {
            return Err(PartitionError::ZeroParallelism);
        }
        if config.base_chunk_size == 0 {
            return Err(PartitionError::ZeroChunkSize);
        }
        if config.oversubscription == 0 {
            return Err(PartitionError::ZeroOversubscription);
        }
        Ok(Self { config, parallelism })
    }

    pub fn config(&self) -> PartitionConfig {
        self.config
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Neurons per unit for a population of `neuron_count`
    pub fn chunk_size(&self, neuron_count: usize) -> usize {
        let base = self.config.base_chunk_size;
        let chunks = neuron_count.div_ceil(base);
        if chunks <= self.config.oversubscription * self.parallelism {
            return base;
        }
        // chunks > P here, so the ratio is at least 1
        let ratio = chunks / self.parallelism;
        let factor = (2 * ratio.ilog2() as usize).max(1);
        base * factor
    }

    /// Partition `neurons` into id-ordered, contiguous units.
    pub fn partition(&self, mut neurons: Vec<NeuronHandle>) -> Result<TaskPartition, PartitionError> {
        if neurons.is_empty() {
            return Ok(TaskPartition::empty(self.parallelism));
        }

        neurons.sort_unstable_by_key(|n| n.id());
        if let Some(pair) = neurons.windows(2).find(|w| w[0].id() == w[1].id()) {
            return Err(PartitionError::DuplicateNeuron(pair[0].id()));
        }
        let expected: AHashSet<NeuronId> = neurons.iter().map(|n| n.id()).collect();

        let chunk_size = self.chunk_size(neurons.len());
        let units: Vec<UpdateUnit> = neurons
            .chunks(chunk_size)
            .enumerate()
            .map(|(index, chunk)| UpdateUnit::new(index, chunk.to_vec()))
            .collect();

        let partition = TaskPartition {
            units,
            parallelism: self.parallelism,
            chunk_size,
        };
        partition.verify(&expected)?;

        debug!(
            "[PARTITION] {} neurons -> {} units of <= {} (P={})",
            expected.len(),
            partition.unit_count(),
            chunk_size,
            self.parallelism
        );
        Ok(partition)
    }
}

/// Holder for the current partition and the partitioner that rebuilds it.
///
/// Readers take a cheap `Arc` snapshot; a rebuild builds the replacement
/// off to the side and swaps it in, so a tick iterating the old snapshot is
/// never disturbed.
pub struct PartitionSlot {
    partitioner: RwLock<TaskPartitioner>,
    current: RwLock<Arc<TaskPartition>>,
    /// Rebuilds left to fail on purpose (tests only set this)
    injected_failures: AtomicU32,
}

impl PartitionSlot {
    pub fn new(partitioner: TaskPartitioner) -> Self {
        let empty = TaskPartition::empty(partitioner.parallelism());
        Self {
            partitioner: RwLock::new(partitioner),
            current: RwLock::new(Arc::new(empty)),
            injected_failures: AtomicU32::new(0),
        }
    }

    pub fn load(&self) -> Arc<TaskPartition> {
        Arc::clone(&self.current.read())
    }

    pub fn parallelism(&self) -> usize {
        self.partitioner.read().parallelism()
    }

    /// Build a partition from `neurons` and swap it in.
    pub fn rebuild(&self, neurons: Vec<NeuronHandle>) -> Result<Arc<TaskPartition>, PartitionError> {
        if self.take_injected_failure() {
            return Err(PartitionError::CoverageMismatch {
                expected: neurons.len(),
                covered: 0,
            });
        }
        let partition = Arc::new(self.partitioner.read().partition(neurons)?);
        *self.current.write() = Arc::clone(&partition);
        Ok(partition)
    }

    fn take_injected_failure(&self) -> bool {
        self.injected_failures
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Make the next `count` rebuilds fail without touching the installed
    /// partition.
    #[cfg(test)]
    pub(crate) fn fail_next_rebuilds(&self, count: u32) {
        self.injected_failures.store(count, Ordering::Release);
    }

    /// Replace the partitioner; the caller is expected to rebuild afterwards.
    pub fn set_partitioner(&self, partitioner: TaskPartitioner) {
        *self.partitioner.write() = partitioner;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simbrain_network::{LinearRule, Neuron};

    fn neurons(n: u32) -> Vec<NeuronHandle> {
        (0..n)
            .map(|i| Arc::new(Neuron::new(NeuronId(i), Arc::new(LinearRule::default()))))
            .collect()
    }

    fn partitioner(p: usize) -> TaskPartitioner {
        TaskPartitioner::new(PartitionConfig::default(), p).unwrap()
    }

    #[test]
    fn test_empty_population() {
        let partition = partitioner(4).partition(Vec::new()).unwrap();
        assert!(partition.is_empty());
        assert_eq!(partition.neuron_count(), 0);
    }

    #[test]
    fn test_small_population_uses_base_chunk() {
        let p = partitioner(4);
        assert_eq!(p.chunk_size(1), 64);
        assert_eq!(p.chunk_size(512), 64); // 8 chunks == 2 * P
        let partition = p.partition(neurons(130)).unwrap();
        assert_eq!(partition.unit_count(), 3);
        assert_eq!(partition.units()[2].len(), 2);
    }

    #[test]
    fn test_large_population_grows_chunks() {
        let p = partitioner(4);
        // 1000 neurons: 16 base chunks, ratio 4, log2 = 2 -> 4 * 64
        assert_eq!(p.chunk_size(1000), 256);
        assert_eq!(p.partition(neurons(1000)).unwrap().unit_count(), 4);
        // 10_000 neurons: 157 chunks, ratio 39, log2 = 5 -> 10 * 64
        assert_eq!(p.chunk_size(10_000), 640);
    }

    #[test]
    fn test_units_are_id_ordered_and_contiguous() {
        let mut input = neurons(200);
        input.reverse();
        let partition = partitioner(1).partition(input).unwrap();
        let ids: Vec<u32> = partition.neuron_ids().iter().map(|id| id.0).collect();
        assert_eq!(ids, (0..200).collect::<Vec<_>>());
    }

    #[test]
    fn test_duplicate_input_rejected() {
        let mut input = neurons(3);
        input.push(Arc::clone(&input[1]));
        assert_eq!(
            partitioner(2).partition(input).unwrap_err(),
            PartitionError::DuplicateNeuron(NeuronId(1))
        );
    }

    #[test]
    fn test_invalid_partitioner_config() {
        assert_eq!(
            TaskPartitioner::new(PartitionConfig::default(), 0).unwrap_err(),
            PartitionError::ZeroParallelism
        );
        let config = PartitionConfig {
            base_chunk_size: 0,
            ..Default::default()
        };
        assert_eq!(
            TaskPartitioner::new(config, 1).unwrap_err(),
            PartitionError::ZeroChunkSize
        );
    }

    #[test]
    fn test_verify_detects_missing_neuron() {
        let partition = partitioner(2).partition(neurons(10)).unwrap();
        let mut expected: AHashSet<NeuronId> = (0..10).map(NeuronId).collect();
        expected.insert(NeuronId(42));
        assert!(matches!(
            partition.verify(&expected),
            Err(PartitionError::CoverageMismatch { expected: 11, covered: 10 })
        ));
    }

    #[test]
    fn test_display_summary() {
        let partition = partitioner(2).partition(neurons(70)).unwrap();
        let text = partition.to_string();
        assert!(text.starts_with("Task list contains 70 neurons across 2 processors"));
        assert!(text.contains("Task 2 handles 6 neurons"));
    }

    #[test]
    fn test_slot_swap_leaves_old_snapshot_intact() {
        let slot = PartitionSlot::new(partitioner(2));
        slot.rebuild(neurons(10)).unwrap();
        let before = slot.load();
        slot.rebuild(neurons(3)).unwrap();
        assert_eq!(before.neuron_count(), 10);
        assert_eq!(slot.load().neuron_count(), 3);
    }

    #[test]
    fn test_unit_reports_every_failing_neuron() {
        struct Exploding;
        impl simbrain_network::NeuronUpdateRule for Exploding {
            fn name(&self) -> &str {
                "Exploding"
            }
            fn apply(&self, _: f64, _: f64, _: f64) -> Result<f64, simbrain_network::RuleError> {
                panic!("boom")
            }
        }

        let mut list = neurons(3);
        list.push(Arc::new(Neuron::new(NeuronId(3), Arc::new(Exploding))));
        list.push(Arc::new(Neuron::new(NeuronId(4), Arc::new(LinearRule::new(0.0, f64::NAN)))));
        let err = UpdateUnit::new(7, list).compute(0.1).unwrap_err();
        assert_eq!(err.unit, 7);
        let failed: Vec<NeuronId> = err.failures.iter().map(|f| f.neuron).collect();
        assert_eq!(failed, vec![NeuronId(3), NeuronId(4)]);
        assert!(err.failures[0].reason.contains("boom"));
    }
}
