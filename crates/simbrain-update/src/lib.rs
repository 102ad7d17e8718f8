// Copyright 2025 Simbrain Developers
// SPDX-License-Identifier: Apache-2.0

//! # Simbrain Buffered Update Engine
//!
//! Concurrent, deterministic network updates:
//! - **Partitioning**: tracked neurons split into id-ordered update units
//! - **Dispatch**: units computed on a dedicated rayon pool, joined, then committed
//! - **Membership**: add/remove events tracked immediately, folded into the
//!   partition by a debounced background collector
//! - **Groups**: input pull before dispatch, output flush after commit
//!
//! ## Determinism
//! Neurons read only committed (`current`) activations while computing and
//! write only their own staged (`next`) slot. Commit happens after every
//! unit has joined, so results are identical for any worker count, chunk
//! size or dispatch order, and identical to [`SerialBufferedUpdate`].

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod action;
pub mod collector;
pub mod engine;
pub mod error;
pub mod membership;
pub mod partition;
pub mod serial;
mod tracing_mutex;

pub use action::NetworkUpdateAction;
pub use collector::{CollectorPhase, CollectorStatus, ReconciliationCollector, DEFAULT_DEBOUNCE};
pub use engine::{EngineConfig, StopHandle, UpdateEngine, UpdateMode};
pub use error::{EngineError, NeuronFailure, PartitionError, TickError, UnitExecutionError};
pub use membership::{MembershipSnapshot, MembershipTracker};
pub use partition::{PartitionConfig, PartitionSlot, TaskPartition, TaskPartitioner, UpdateUnit};
pub use serial::SerialBufferedUpdate;

/// Cumulative engine statistics
#[derive(Debug, Clone, Default)]
pub struct UpdateEngineStats {
    pub total_ticks: u64,
    pub failed_ticks: u64,
    pub total_neuron_updates: u64,
    /// Tick time spent computing, committing and moving group data
    pub total_processing_time_us: u64,
    /// Tick time spent blocked on membership reconciliation
    pub total_reconcile_wait_us: u64,
    pub reconciliations: u64,
}

impl UpdateEngineStats {
    /// Average neurons updated per successful tick
    pub fn avg_neurons_per_tick(&self) -> f64 {
        if self.total_ticks == 0 {
            0.0
        } else {
            self.total_neuron_updates as f64 / self.total_ticks as f64
        }
    }

    /// Average wall time per successful tick (microseconds)
    pub fn avg_processing_time_us(&self) -> f64 {
        if self.total_ticks == 0 {
            0.0
        } else {
            self.total_processing_time_us as f64 / self.total_ticks as f64
        }
    }

    pub fn failure_rate(&self) -> f64 {
        let attempted = self.total_ticks + self.failed_ticks;
        if attempted == 0 {
            0.0
        } else {
            self.failed_ticks as f64 / attempted as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_stats() {
        let stats = UpdateEngineStats {
            total_ticks: 100,
            failed_ticks: 25,
            total_neuron_updates: 10000,
            total_processing_time_us: 1000000,
            total_reconcile_wait_us: 0,
            reconciliations: 3,
        };

        assert_eq!(stats.avg_neurons_per_tick(), 100.0);
        assert_eq!(stats.avg_processing_time_us(), 10000.0);
        assert_eq!(stats.failure_rate(), 0.2);
        assert_eq!(UpdateEngineStats::default().avg_neurons_per_tick(), 0.0);
    }
}
