// Copyright 2025 Simbrain Developers
// SPDX-License-Identifier: Apache-2.0

//! Error types for partitioning, dispatch and engine lifecycle.

use simbrain_network::{GroupError, NeuronId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartitionError {
    #[error("Parallelism must be at least 1")]
    ZeroParallelism,

    #[error("Base chunk size must be at least 1")]
    ZeroChunkSize,

    #[error("Oversubscription factor must be at least 1")]
    ZeroOversubscription,

    #[error("{0} appears in more than one update unit")]
    DuplicateNeuron(NeuronId),

    #[error("Partition covers {covered} neurons but {expected} are tracked")]
    CoverageMismatch { expected: usize, covered: usize },
}

/// One neuron's failed update
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{neuron}: {reason}")]
pub struct NeuronFailure {
    pub neuron: NeuronId,
    pub reason: String,
}

/// All failures raised while computing one update unit
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Update unit {unit} failed for {} neuron(s)", .failures.len())]
pub struct UnitExecutionError {
    pub unit: usize,
    pub failures: Vec<NeuronFailure>,
}

/// Why a tick did not complete. A tick that returns an error never commits
/// a partial state.
#[derive(Debug, Clone, Error)]
pub enum TickError {
    #[error("Tick {tick} failed in {} unit(s): {}", .failures.len(), format_failures(.failures))]
    UnitFailures {
        tick: u64,
        failures: Vec<UnitExecutionError>,
    },

    #[error("Input group '{group}' failed to pull inputs: {source}")]
    InputPull { group: String, source: GroupError },

    #[error("Output group '{group}' failed to flush outputs: {source}")]
    OutputFlush { group: String, source: GroupError },

    #[error(transparent)]
    Partition(#[from] PartitionError),

    #[error("Reconciliation failed {attempts} consecutive time(s): {last_error}")]
    Reconciliation { attempts: u32, last_error: String },

    #[error("Stop requested before tick {0}")]
    Stopped(u64),

    #[error("Update engine has been shut down")]
    ShutDown,
}

impl TickError {
    /// Ids of every neuron whose update failed, in unit order
    pub fn failed_neurons(&self) -> Vec<NeuronId> {
        match self {
            TickError::UnitFailures { failures, .. } => failures
                .iter()
                .flat_map(|u| u.failures.iter().map(|f| f.neuron))
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn format_failures(failures: &[UnitExecutionError]) -> String {
    failures
        .iter()
        .flat_map(|u| u.failures.iter().map(|f| f.to_string()))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised while attaching or reconfiguring an engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Partition(#[from] PartitionError),

    #[error("Failed to build worker pool: {0}")]
    PoolBuild(String),

    #[error("Failed to spawn reconciliation collector: {0}")]
    CollectorSpawn(#[from] std::io::Error),

    #[error("Update engine has been shut down")]
    ShutDown,
}

impl From<rayon::ThreadPoolBuildError> for EngineError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        EngineError::PoolBuild(err.to_string())
    }
}
