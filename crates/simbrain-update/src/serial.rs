// Copyright 2025 Simbrain Developers
// SPDX-License-Identifier: Apache-2.0

//! Single-threaded buffered update over every neuron in the network.
//!
//! Produces bit-identical results to the parallel engine and serves as its
//! correctness baseline.

use crate::action::NetworkUpdateAction;
use crate::error::TickError;
use crate::partition::UpdateUnit;
use simbrain_network::Network;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, trace};

pub struct SerialBufferedUpdate {
    network: Arc<Network>,
    ticks: AtomicU64,
}

impl SerialBufferedUpdate {
    pub fn new(network: Arc<Network>) -> Self {
        Self {
            network,
            ticks: AtomicU64::new(0),
        }
    }

    pub fn network(&self) -> &Arc<Network> {
        &self.network
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }

    /// Compute every neuron, then commit every neuron. Nothing is committed
    /// if any neuron fails.
    pub fn tick(&self) -> Result<(), TickError> {
        let tick = self.ticks.load(Ordering::Acquire) + 1;
        let unit = UpdateUnit::new(0, self.network.neurons());
        if let Err(failure) = unit.compute(self.network.time_step()) {
            error!("[SERIAL] Tick {} aborted: {}", tick, failure);
            return Err(TickError::UnitFailures {
                tick,
                failures: vec![failure],
            });
        }
        unit.commit();
        self.ticks.store(tick, Ordering::Release);
        trace!("[SERIAL] Tick {} updated {} neurons", tick, unit.len());
        Ok(())
    }
}

impl NetworkUpdateAction for SerialBufferedUpdate {
    fn invoke(&self) -> Result<(), TickError> {
        self.tick()
    }

    fn description(&self) -> &str {
        "Buffered Update"
    }

    fn long_description(&self) -> &str {
        "Buffered Update (All Neurons)"
    }
}
