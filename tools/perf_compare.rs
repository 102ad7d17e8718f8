// Copyright 2025 Simbrain Developers
// SPDX-License-Identifier: Apache-2.0

//! Serial vs concurrent buffered update comparison.
//!
//! Builds two identical random networks, runs one with the serial buffered
//! update and one with the parallel engine, prints timings and exits with
//! status 1 if the final activations differ in any bit.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use simbrain::config::{find_config_file, load_config, SimbrainConfig};
use simbrain::network::{LinearRule, Network, NeuronUpdateRule, SigmoidalRule};
use simbrain::observability::{debug_flags_help, init_logging, parse_debug_flags};
use simbrain::update::{SerialBufferedUpdate, UpdateEngine, UpdateMode};
use tracing::{info, warn};

struct Args {
    neurons: usize,
    density: f64,
    ticks: u64,
    seed: u64,
    config: Option<PathBuf>,
    log_dir: Option<PathBuf>,
    overrides: HashMap<String, String>,
}

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: perf_compare [--neurons <n>] [--density <p>] [--ticks <n>] [--seed <n>]\n\
         \x20                   [--workers <n>] [--config <path>] [--log-dir <path>]\n\n\
         Defaults:\n\
         - neurons: 1000\n\
         - density: 0.1\n\
         - ticks: 100\n\
         - seed: 42\n\n\
         {}",
        debug_flags_help()
    );
    process::exit(2);
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        neurons: 1000,
        density: 0.1,
        ticks: 100,
        seed: 42,
        config: None,
        log_dir: None,
        overrides: HashMap::new(),
    };

    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        let mut value = |name: &str| -> Result<String> {
            iter.next().with_context(|| format!("{} requires a value", name))
        };
        match arg.as_str() {
            "--neurons" => args.neurons = value("--neurons")?.parse().context("--neurons")?,
            "--density" => args.density = value("--density")?.parse().context("--density")?,
            "--ticks" => args.ticks = value("--ticks")?.parse().context("--ticks")?,
            "--seed" => args.seed = value("--seed")?.parse().context("--seed")?,
            "--workers" => {
                let workers = value("--workers")?;
                args.overrides.insert("worker_threads".to_string(), workers);
            }
            "--config" => args.config = Some(PathBuf::from(value("--config")?)),
            "--log-dir" => args.log_dir = Some(PathBuf::from(value("--log-dir")?)),
            "-h" | "--help" => usage_and_exit(),
            other if other.starts_with("--debug-") => {}
            other => {
                eprintln!("Unknown argument: {other}");
                usage_and_exit();
            }
        }
    }

    if !(0.0..=1.0).contains(&args.density) {
        bail!("--density must be within [0, 1], got {}", args.density);
    }
    Ok(args)
}

fn resolve_config(args: &Args) -> Result<SimbrainConfig> {
    let path = match &args.config {
        Some(path) => Some(path.clone()),
        None => find_config_file().ok(),
    };
    match path {
        Some(path) => load_config(Some(&path), Some(&args.overrides))
            .with_context(|| format!("Failed to load {}", path.display())),
        None => {
            let mut config = SimbrainConfig::default();
            simbrain::config::apply_environment_overrides(&mut config);
            simbrain::config::apply_cli_overrides(&mut config, &args.overrides);
            Ok(config)
        }
    }
}

fn build_network(neurons: usize, density: f64, seed: u64, time_step: f64) -> Result<Arc<Network>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let network = Arc::new(Network::new(time_step)?);

    let ids: Vec<_> = (0..neurons)
        .map(|i| {
            let rule: Arc<dyn NeuronUpdateRule> = if i % 2 == 0 {
                Arc::new(LinearRule::default())
            } else {
                Arc::new(SigmoidalRule::default())
            };
            let neuron = network.add_neuron(rule);
            neuron.force_set_activation(rng.gen_range(-1.0..1.0));
            neuron.id()
        })
        .collect();

    for &source in &ids {
        for &target in &ids {
            if rng.gen_bool(density) {
                network.connect(source, target, rng.gen_range(-1.0..1.0))?;
            }
        }
    }
    Ok(network)
}

fn per_tick(elapsed: Duration, ticks: u64) -> f64 {
    if ticks == 0 {
        0.0
    } else {
        elapsed.as_secs_f64() * 1000.0 / ticks as f64
    }
}

fn main() -> Result<()> {
    let args = parse_args()?;
    let config = resolve_config(&args)?;
    let _logging = init_logging(&parse_debug_flags(), &config.logging.level, args.log_dir.clone())?;

    let mut engine_config = simbrain::engine_config(&config)?;
    engine_config.mode = UpdateMode::Concurrent;
    let time_step = config.network.time_step;

    info!(
        "Building two networks: {} neurons, density {}, seed {}",
        args.neurons, args.density, args.seed
    );
    let serial_net = build_network(args.neurons, args.density, args.seed, time_step)?;
    let parallel_net = build_network(args.neurons, args.density, args.seed, time_step)?;
    info!("Synapses per network: {}", serial_net.synapse_count());

    let serial = SerialBufferedUpdate::new(Arc::clone(&serial_net));
    let started = Instant::now();
    for _ in 0..args.ticks {
        serial.tick()?;
    }
    let serial_elapsed = started.elapsed();

    let engine = UpdateEngine::attach(Arc::clone(&parallel_net), engine_config)?;
    let started = Instant::now();
    engine.run(Some(args.ticks))?;
    let parallel_elapsed = started.elapsed();

    println!("{}", engine.partition());
    println!(
        "serial:     {:>10.3} ms total, {:>8.3} ms/tick",
        serial_elapsed.as_secs_f64() * 1000.0,
        per_tick(serial_elapsed, args.ticks)
    );
    println!(
        "concurrent: {:>10.3} ms total, {:>8.3} ms/tick ({} workers)",
        parallel_elapsed.as_secs_f64() * 1000.0,
        per_tick(parallel_elapsed, args.ticks),
        engine.worker_threads()
    );
    if parallel_elapsed.as_secs_f64() > 0.0 {
        println!(
            "speedup:    {:>10.2}x",
            serial_elapsed.as_secs_f64() / parallel_elapsed.as_secs_f64()
        );
    }

    let mismatches: Vec<_> = serial_net
        .activations()
        .into_iter()
        .zip(parallel_net.activations())
        .filter(|((_, s), (_, p))| s.to_bits() != p.to_bits())
        .collect();

    if !mismatches.is_empty() {
        for ((id, s), (_, p)) in mismatches.iter().take(10) {
            warn!("{}: serial {} != concurrent {}", id, s, p);
        }
        eprintln!(
            "❌ {} of {} activations differ between serial and concurrent runs",
            mismatches.len(),
            args.neurons
        );
        process::exit(1);
    }

    println!("✅ Activations identical after {} ticks", args.ticks);
    Ok(())
}
