// Copyright 2025 Simbrain Developers
// SPDX-License-Identifier: Apache-2.0

//! Serial vs concurrent buffered update throughput.
//!
//! Networks are sparse and randomly connected with a fixed seed, so runs are
//! comparable across machines and commits.

use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use simbrain_network::{Network, SigmoidalRule};
use simbrain_update::{EngineConfig, SerialBufferedUpdate, UpdateEngine, UpdateMode};

fn build_network(neurons: usize, fan_in: usize) -> Arc<Network> {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let network = Arc::new(Network::new(0.1).unwrap());
    let ids: Vec<_> = (0..neurons)
        .map(|_| {
            let n = network.add_neuron(Arc::new(SigmoidalRule::default()));
            n.force_set_activation(rng.gen_range(0.0..1.0));
            n.id()
        })
        .collect();
    for &target in &ids {
        for _ in 0..fan_in {
            let source = ids[rng.gen_range(0..ids.len())];
            network.connect(source, target, rng.gen_range(-1.0..1.0)).unwrap();
        }
    }
    network
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffered_tick");
    group.measurement_time(Duration::from_secs(5));

    for &neurons in &[1_000usize, 10_000, 50_000] {
        group.throughput(Throughput::Elements(neurons as u64));

        let serial = SerialBufferedUpdate::new(build_network(neurons, 20));
        group.bench_with_input(BenchmarkId::new("serial", neurons), &neurons, |b, _| {
            b.iter(|| serial.tick().unwrap())
        });

        let engine = UpdateEngine::attach(
            build_network(neurons, 20),
            EngineConfig {
                mode: UpdateMode::Concurrent,
                ..Default::default()
            },
        )
        .unwrap();
        group.bench_with_input(BenchmarkId::new("concurrent", neurons), &neurons, |b, _| {
            b.iter(|| engine.tick().unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_tick);
criterion_main!(benches);
