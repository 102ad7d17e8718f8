// Copyright 2025 Simbrain Developers
// SPDX-License-Identifier: Apache-2.0

//! Configuration sections of `simbrain_configuration.toml`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SimbrainConfig {
    pub update_engine: UpdateEngineConfig,
    pub network: NetworkConfig,
    pub logging: LoggingConfig,
}

/// Buffered update engine settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct UpdateEngineConfig {
    /// "concurrent", "serial" or "auto"
    pub mode: String,
    /// 0 = available hardware parallelism
    pub worker_threads: usize,
    pub base_chunk_size: usize,
    pub oversubscription: usize,
    /// Below this many neurons, "auto" mode updates serially
    pub serial_threshold: usize,
    pub debounce_ms: u64,
    pub max_reconcile_retries: u32,
    pub wait_for_reconciliation: bool,
}

impl Default for UpdateEngineConfig {
    fn default() -> Self {
        Self {
            mode: "auto".to_string(),
            worker_threads: 0,
            base_chunk_size: 64,
            oversubscription: 2,
            serial_threshold: 256,
            debounce_ms: 1000,
            max_reconcile_retries: 5,
            wait_for_reconciliation: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub time_step: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self { time_step: 0.1 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: SimbrainConfig = toml::from_str(
            r#"
            [update_engine]
            worker_threads = 6
            "#,
        )
        .unwrap();
        assert_eq!(config.update_engine.worker_threads, 6);
        assert_eq!(config.update_engine.base_chunk_size, 64);
        assert_eq!(config.network.time_step, 0.1);
        assert_eq!(config.logging.level, "info");
    }
}
