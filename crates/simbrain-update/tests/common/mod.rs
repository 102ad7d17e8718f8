// Copyright 2025 Simbrain Developers
// SPDX-License-Identifier: Apache-2.0

//! Shared fixtures for the update engine integration tests.

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use simbrain_network::{LinearRule, Network, NeuronId, NeuronUpdateRule, RuleError, SigmoidalRule};
use simbrain_update::{EngineConfig, UpdateMode};
use std::sync::Arc;
use std::time::Duration;

/// Random network with mixed linear/sigmoidal neurons, random initial
/// activations and `density` connection probability.
pub fn random_network(neurons: usize, density: f64, seed: u64) -> Arc<Network> {
    let mut rng = StdRng::seed_from_u64(seed);
    let network = Arc::new(Network::new(0.1).unwrap());

    let mut ids = Vec::with_capacity(neurons);
    for i in 0..neurons {
        let rule: Arc<dyn NeuronUpdateRule> = if i % 2 == 0 {
            Arc::new(LinearRule::default())
        } else {
            Arc::new(SigmoidalRule::default())
        };
        let neuron = network.add_neuron(rule);
        neuron.force_set_activation(rng.gen_range(-1.0..1.0));
        ids.push(neuron.id());
    }

    for &source in &ids {
        for &target in &ids {
            if rng.gen_bool(density) {
                network
                    .connect(source, target, rng.gen_range(-1.0..1.0))
                    .unwrap();
            }
        }
    }
    network
}

/// Build two identical copies of a random network
pub fn twin_networks(neurons: usize, density: f64, seed: u64) -> (Arc<Network>, Arc<Network>) {
    (
        random_network(neurons, density, seed),
        random_network(neurons, density, seed),
    )
}

pub fn engine_config(mode: UpdateMode, workers: usize) -> EngineConfig {
    EngineConfig {
        mode,
        worker_threads: workers,
        debounce: Duration::from_millis(20),
        ..Default::default()
    }
}

/// Activations as raw bit patterns, for exact comparison
pub fn activation_bits(network: &Network) -> Vec<(NeuronId, u64)> {
    network
        .activations()
        .into_iter()
        .map(|(id, a)| (id, a.to_bits()))
        .collect()
}

/// Rule that always refuses to produce an activation
pub struct RejectingRule;

impl NeuronUpdateRule for RejectingRule {
    fn name(&self) -> &str {
        "Rejecting"
    }

    fn apply(&self, _: f64, _: f64, _: f64) -> Result<f64, RuleError> {
        Err(RuleError::Failed {
            rule: self.name().to_string(),
            reason: "refused".to_string(),
        })
    }
}
