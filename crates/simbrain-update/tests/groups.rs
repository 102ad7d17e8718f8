// Copyright 2025 Simbrain Developers
// SPDX-License-Identifier: Apache-2.0

//! # Input/Output Group Ordering
//!
//! Inputs are pulled before any neuron computes; outputs are flushed after
//! every neuron has committed.

mod common;

use common::{engine_config, RejectingRule};
use simbrain_network::{ActivationRecorder, GroupError, InputGroup, LinearRule, Network, UpdatableGroup};
use simbrain_update::{TickError, UpdateEngine, UpdateMode};
use std::sync::Arc;

/// input[0] -> relay -> output, all weights 1
fn chain() -> (Arc<Network>, Arc<InputGroup>, Arc<ActivationRecorder>) {
    let network = Arc::new(Network::new(0.1).unwrap());
    let input = network.add_neuron_group("input", 1, Arc::new(LinearRule::new(1.0, 0.0)));
    let relay = network.add_neuron_group("relay", 1, Arc::new(LinearRule::new(1.0, 0.0)));
    let output = network.add_neuron_group("output", 1, Arc::new(LinearRule::new(1.0, 0.0)));
    network
        .connect(input.neurons()[0].id(), relay.neurons()[0].id(), 1.0)
        .unwrap();
    network
        .connect(relay.neurons()[0].id(), output.neurons()[0].id(), 1.0)
        .unwrap();

    let input = Arc::new(InputGroup::new(input, vec![vec![0.2], vec![0.4], vec![0.6]], false).unwrap());
    let recorder = Arc::new(ActivationRecorder::new(output));
    (network, input, recorder)
}

#[test]
fn test_inputs_pulled_before_dispatch_outputs_after_commit() {
    let (network, input, recorder) = chain();
    let engine = UpdateEngine::attach(network, engine_config(UpdateMode::Concurrent, 2)).unwrap();
    engine.register_input_group(input.clone());
    engine.register_output_group(recorder.clone());

    engine.run(Some(3)).unwrap();

    // Each value needs two ticks to reach the output; the recorder sees the
    // committed activation of every tick.
    assert_eq!(recorder.take_records(), vec![vec![0.0], vec![0.2], vec![0.4]]);
    assert_eq!(input.group().activations(), vec![0.6]);
}

#[test]
fn test_exhausted_input_fails_tick_before_compute() {
    let (network, input, recorder) = chain();
    let engine = UpdateEngine::attach(Arc::clone(&network), engine_config(UpdateMode::Serial, 1)).unwrap();
    engine.register_input_group(input.clone());
    engine.register_output_group(recorder.clone());

    engine.run(Some(3)).unwrap();
    let before = network.activations();
    let err = engine.run(Some(1)).unwrap_err();
    assert!(matches!(
        err,
        TickError::InputPull {
            source: GroupError::InputExhausted { rows: 3, .. },
            ..
        }
    ));
    assert_eq!(network.activations(), before);
    assert_eq!(recorder.record_count(), 3);
}

#[test]
fn test_failed_tick_rolls_back_input_pull() {
    let network = Arc::new(Network::new(0.1).unwrap());
    let input = network.add_neuron_group("input", 2, Arc::new(LinearRule::default()));
    let faulty = network.add_neuron(Arc::new(RejectingRule));
    let input = Arc::new(InputGroup::new(input, vec![vec![0.7, 0.9], vec![0.1, 0.2]], false).unwrap());

    let engine = UpdateEngine::attach(Arc::clone(&network), engine_config(UpdateMode::Concurrent, 2)).unwrap();
    engine.register_input_group(input.clone());

    let before = network.activations();
    assert!(matches!(engine.tick(), Err(TickError::UnitFailures { .. })));
    assert_eq!(network.activations(), before);
    assert_eq!(input.group().activations(), vec![0.0, 0.0]);
    assert_eq!(input.cursor(), 0);

    // The retried tick applies the same row
    faulty.set_update_rule(Arc::new(LinearRule::default()));
    engine.tick().unwrap();
    assert_eq!(input.group().activations(), vec![0.7, 0.9]);
    assert_eq!(input.cursor(), 1);
}

#[test]
fn test_failed_pull_rolls_back_earlier_groups() {
    let network = Arc::new(Network::new(0.1).unwrap());
    let first = network.add_neuron_group("first", 1, Arc::new(LinearRule::default()));
    let second = network.add_neuron_group("second", 1, Arc::new(LinearRule::default()));
    let first = Arc::new(InputGroup::new(first, vec![vec![1.0], vec![2.0]], true).unwrap());
    let second = Arc::new(InputGroup::new(second, vec![vec![5.0]], false).unwrap());

    let engine = UpdateEngine::attach(Arc::clone(&network), engine_config(UpdateMode::Serial, 1)).unwrap();
    engine.register_input_group(first.clone());
    engine.register_input_group(second.clone());

    engine.tick().unwrap();
    assert!(matches!(
        engine.tick(),
        Err(TickError::InputPull {
            source: GroupError::InputExhausted { .. },
            ..
        })
    ));
    assert_eq!(first.group().activations(), vec![1.0]);
    assert_eq!(first.cursor(), 1);
    assert_eq!(second.group().activations(), vec![5.0]);
}

#[test]
fn test_unregister_group() {
    let (network, input, recorder) = chain();
    let engine = UpdateEngine::attach(network, engine_config(UpdateMode::Serial, 1)).unwrap();
    engine.register_input_group(input.clone());
    engine.register_output_group(recorder.clone());

    assert_eq!(engine.unregister_group(input.label()), 1);
    assert_eq!(engine.unregister_group("missing"), 0);
    engine.run(Some(5)).unwrap();
    assert_eq!(input.cursor(), 0);
    assert_eq!(recorder.record_count(), 5);
}
