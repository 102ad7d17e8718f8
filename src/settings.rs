// Copyright 2025 Simbrain Developers
// SPDX-License-Identifier: Apache-2.0

//! Mapping from file configuration to engine and network settings.

use simbrain_config::{validate_config, ConfigError, SimbrainConfig};
use simbrain_network::{Network, NetworkError};
use simbrain_update::{EngineConfig, PartitionConfig, UpdateMode};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("Invalid update mode: {0}")]
    Mode(String),
}

/// Validate `config` and build the engine settings from its
/// `[update_engine]` section.
pub fn engine_config(config: &SimbrainConfig) -> Result<EngineConfig, SettingsError> {
    validate_config(config)?;
    let section = &config.update_engine;
    let mode: UpdateMode = section.mode.parse().map_err(SettingsError::Mode)?;

    Ok(EngineConfig {
        mode,
        worker_threads: section.worker_threads,
        partition: PartitionConfig {
            base_chunk_size: section.base_chunk_size,
            oversubscription: section.oversubscription,
        },
        serial_threshold: section.serial_threshold,
        debounce: Duration::from_millis(section.debounce_ms),
        max_reconcile_retries: section.max_reconcile_retries,
        wait_for_reconciliation: section.wait_for_reconciliation,
    })
}

/// Empty network using the configured time step
pub fn network_from_config(config: &SimbrainConfig) -> Result<Arc<Network>, SettingsError> {
    Ok(Arc::new(Network::new(config.network.time_step)?))
}
