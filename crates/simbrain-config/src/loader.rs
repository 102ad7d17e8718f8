// Copyright 2025 Simbrain Developers
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Layers, applied in order:
//! 1. TOML file (base values; missing fields take defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, SimbrainConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "simbrain_configuration.toml";

/// Directory levels searched above the working directory
const SEARCH_DEPTH: usize = 5;

/// Find the configuration file
///
/// Search order:
/// 1. `SIMBRAIN_CONFIG_PATH` environment variable
/// 2. Current working directory
/// 3. Up to five parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("SIMBRAIN_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by SIMBRAIN_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.extend(
            cwd.ancestors()
                .take(SEARCH_DEPTH + 1)
                .map(|dir| dir.join(CONFIG_FILE_NAME)),
        );
    }

    if let Some(found) = search_paths.iter().find(|p| p.exists()) {
        return Ok(found.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");
    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet SIMBRAIN_CONFIG_PATH to specify a custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from TOML and apply overrides
///
/// `config_path` of `None` searches with [`find_config_file`].
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<SimbrainConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: SimbrainConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    Ok(config)
}

/// Apply environment variable overrides
///
/// - `SIMBRAIN_WORKER_THREADS` -> `update_engine.worker_threads`
/// - `SIMBRAIN_DEBOUNCE_MS` -> `update_engine.debounce_ms`
/// - `SIMBRAIN_UPDATE_MODE` -> `update_engine.mode`
/// - `SIMBRAIN_BASE_CHUNK_SIZE` -> `update_engine.base_chunk_size`
/// - `SIMBRAIN_LOG_LEVEL` -> `logging.level`
///
/// Unparseable numeric values are ignored.
pub fn apply_environment_overrides(config: &mut SimbrainConfig) {
    if let Some(threads) = parsed_env("SIMBRAIN_WORKER_THREADS") {
        config.update_engine.worker_threads = threads;
    }
    if let Some(debounce) = parsed_env("SIMBRAIN_DEBOUNCE_MS") {
        config.update_engine.debounce_ms = debounce;
    }
    if let Some(chunk) = parsed_env("SIMBRAIN_BASE_CHUNK_SIZE") {
        config.update_engine.base_chunk_size = chunk;
    }
    if let Ok(value) = env::var("SIMBRAIN_UPDATE_MODE") {
        config.update_engine.mode = value;
    }
    if let Ok(value) = env::var("SIMBRAIN_LOG_LEVEL") {
        config.logging.level = value;
    }
}

fn parsed_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Apply CLI argument overrides
///
/// Keys: `worker_threads`, `debounce_ms`, `mode`, `base_chunk_size`,
/// `oversubscription`, `serial_threshold`, `wait_for_reconciliation`,
/// `time_step`, `log_level`.
pub fn apply_cli_overrides(config: &mut SimbrainConfig, cli_args: &HashMap<String, String>) {
    let engine = &mut config.update_engine;

    if let Some(value) = cli_args.get("worker_threads").and_then(|v| v.parse().ok()) {
        engine.worker_threads = value;
    }
    if let Some(value) = cli_args.get("debounce_ms").and_then(|v| v.parse().ok()) {
        engine.debounce_ms = value;
    }
    if let Some(value) = cli_args.get("mode") {
        engine.mode = value.clone();
    }
    if let Some(value) = cli_args.get("base_chunk_size").and_then(|v| v.parse().ok()) {
        engine.base_chunk_size = value;
    }
    if let Some(value) = cli_args.get("oversubscription").and_then(|v| v.parse().ok()) {
        engine.oversubscription = value;
    }
    if let Some(value) = cli_args.get("serial_threshold").and_then(|v| v.parse().ok()) {
        engine.serial_threshold = value;
    }
    if let Some(value) = cli_args.get("wait_for_reconciliation") {
        engine.wait_for_reconciliation = value.to_lowercase() == "true" || value == "1";
    }
    if let Some(value) = cli_args.get("time_step").and_then(|v| v.parse().ok()) {
        config.network.time_step = value;
    }
    if let Some(value) = cli_args.get("log_level") {
        config.logging.level = value.clone();
    }
}
