// Copyright 2025 Simbrain Developers
// SPDX-License-Identifier: Apache-2.0

//! # Determinism Tests
//!
//! The parallel engine must produce bit-identical activations regardless of
//! worker count, chunk size or dispatch mode, and identical to the serial
//! buffered update.

mod common;

use common::{activation_bits, engine_config, random_network, twin_networks};
use simbrain_network::{LinearRule, Network};
use simbrain_update::{
    EngineConfig, NetworkUpdateAction, PartitionConfig, SerialBufferedUpdate, UpdateEngine, UpdateMode,
};
use std::sync::Arc;

// ═══════════════════════════════════════════════════════════
// Worker count independence
// ═══════════════════════════════════════════════════════════

#[test]
fn test_one_vs_many_workers_identical() {
    let (single, multi) = twin_networks(300, 0.05, 7);
    let one = UpdateEngine::attach(Arc::clone(&single), engine_config(UpdateMode::Concurrent, 1)).unwrap();
    let many = UpdateEngine::attach(Arc::clone(&multi), engine_config(UpdateMode::Concurrent, 8)).unwrap();

    for tick in 0..25 {
        one.tick().unwrap();
        many.tick().unwrap();
        assert_eq!(
            activation_bits(&single),
            activation_bits(&multi),
            "diverged at tick {}",
            tick
        );
    }
}

#[test]
fn test_thousand_neurons_hundred_ticks() {
    let (four, one) = twin_networks(1000, 0.1, 42);
    let serial_net = random_network(1000, 0.1, 42);

    let engine4 = UpdateEngine::attach(Arc::clone(&four), engine_config(UpdateMode::Concurrent, 4)).unwrap();
    let engine1 = UpdateEngine::attach(Arc::clone(&one), engine_config(UpdateMode::Concurrent, 1)).unwrap();
    let serial = SerialBufferedUpdate::new(Arc::clone(&serial_net));

    assert_eq!(engine4.run(Some(100)).unwrap(), 100);
    assert_eq!(engine1.run(Some(100)).unwrap(), 100);
    for _ in 0..100 {
        serial.invoke().unwrap();
    }

    let expected = activation_bits(&serial_net);
    assert_eq!(activation_bits(&four), expected);
    assert_eq!(activation_bits(&one), expected);
    assert_eq!(engine4.stats().total_neuron_updates, 100 * 1000);
}

#[test]
fn test_chunk_size_does_not_change_results() {
    let (a, b) = twin_networks(500, 0.05, 3);
    let tiny_chunks = EngineConfig {
        partition: PartitionConfig {
            base_chunk_size: 1,
            oversubscription: 1,
        },
        ..engine_config(UpdateMode::Concurrent, 3)
    };
    let large_chunks = EngineConfig {
        partition: PartitionConfig {
            base_chunk_size: 4096,
            oversubscription: 2,
        },
        ..engine_config(UpdateMode::Concurrent, 3)
    };
    let e1 = UpdateEngine::attach(Arc::clone(&a), tiny_chunks).unwrap();
    let e2 = UpdateEngine::attach(Arc::clone(&b), large_chunks).unwrap();
    assert_eq!(e2.partition().unit_count(), 1);

    e1.run(Some(20)).unwrap();
    e2.run(Some(20)).unwrap();
    assert_eq!(activation_bits(&a), activation_bits(&b));
}

#[test]
fn test_auto_mode_matches_concurrent() {
    let (a, b) = twin_networks(100, 0.1, 11);
    let auto = UpdateEngine::attach(Arc::clone(&a), engine_config(UpdateMode::Auto, 4)).unwrap();
    let concurrent = UpdateEngine::attach(Arc::clone(&b), engine_config(UpdateMode::Concurrent, 4)).unwrap();
    auto.run(Some(10)).unwrap();
    concurrent.run(Some(10)).unwrap();
    assert_eq!(activation_bits(&a), activation_bits(&b));
}

// ═══════════════════════════════════════════════════════════
// Buffered semantics
// ═══════════════════════════════════════════════════════════

#[test]
fn test_cycle_reads_previous_tick_values() {
    let network = Arc::new(Network::new(0.1).unwrap());
    let a = network.add_neuron(Arc::new(LinearRule::new(1.0, 0.0)));
    let b = network.add_neuron(Arc::new(LinearRule::new(1.0, 0.0)));
    network.connect(a.id(), b.id(), 1.0).unwrap();
    network.connect(b.id(), a.id(), 1.0).unwrap();
    a.force_set_activation(1.0);
    b.force_set_activation(0.0);

    let engine = UpdateEngine::attach(Arc::clone(&network), engine_config(UpdateMode::Concurrent, 2)).unwrap();

    // A sequential in-place update would leave both at 1.0 after one tick.
    engine.tick().unwrap();
    assert_eq!((a.activation(), b.activation()), (0.0, 1.0));
    engine.tick().unwrap();
    assert_eq!((a.activation(), b.activation()), (1.0, 0.0));
}

#[test]
fn test_zero_weight_self_loops_are_stable() {
    let network = Arc::new(Network::new(0.1).unwrap());
    for _ in 0..200 {
        let neuron = network.add_neuron(Arc::new(LinearRule::new(1.0, 0.3)));
        network.connect(neuron.id(), neuron.id(), 0.0).unwrap();
    }
    let engine = UpdateEngine::attach(Arc::clone(&network), engine_config(UpdateMode::Concurrent, 4)).unwrap();

    engine.tick().unwrap();
    let after_one = activation_bits(&network);
    engine.run(Some(10)).unwrap();
    assert_eq!(activation_bits(&network), after_one);
    assert!(network.activations().iter().all(|(_, a)| *a == 0.3));
}

#[test]
fn test_empty_network_ticks() {
    let network = Arc::new(Network::new(0.1).unwrap());
    let engine = UpdateEngine::attach(network, engine_config(UpdateMode::Concurrent, 4)).unwrap();
    assert!(engine.partition().is_empty());
    assert_eq!(engine.run(Some(5)).unwrap(), 5);
    assert_eq!(engine.stats().total_neuron_updates, 0);
}
