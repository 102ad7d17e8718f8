// Copyright 2025 Simbrain Developers
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! All problems are collected and reported together.

use crate::{ConfigError, ConfigResult, SimbrainConfig};

/// Longest accepted reconciliation debounce
pub const MAX_DEBOUNCE_MS: u64 = 60_000;

const UPDATE_MODES: [&str; 3] = ["concurrent", "serial", "auto"];
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    InvalidValue { field: String, reason: String },
    UnknownOption { field: String, value: String, allowed: &'static [&'static str] },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
            Self::UnknownOption { field, value, allowed } => {
                write!(f, "{} = '{}' is not one of {}", field, value, allowed.join(", "))
            }
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every problem found
pub fn validate_config(config: &SimbrainConfig) -> ConfigResult<()> {
    let errors = collect_errors(config);
    if errors.is_empty() {
        return Ok(());
    }

    let error_messages = errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n");
    Err(ConfigError::ValidationError(format!(
        "Configuration validation failed:\n{}",
        error_messages
    )))
}

pub fn collect_errors(config: &SimbrainConfig) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();
    validate_update_engine(config, &mut errors);
    validate_network(config, &mut errors);
    validate_logging(config, &mut errors);
    errors
}

fn validate_update_engine(config: &SimbrainConfig, errors: &mut Vec<ConfigValidationError>) {
    let engine = &config.update_engine;

    if !UPDATE_MODES.contains(&engine.mode.to_lowercase().as_str()) {
        errors.push(ConfigValidationError::UnknownOption {
            field: "update_engine.mode".to_string(),
            value: engine.mode.clone(),
            allowed: &UPDATE_MODES,
        });
    }
    if engine.base_chunk_size == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "update_engine.base_chunk_size".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    if engine.oversubscription == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "update_engine.oversubscription".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    if engine.debounce_ms > MAX_DEBOUNCE_MS {
        errors.push(ConfigValidationError::InvalidValue {
            field: "update_engine.debounce_ms".to_string(),
            reason: format!("{} exceeds the {} ms maximum", engine.debounce_ms, MAX_DEBOUNCE_MS),
        });
    }
}

fn validate_network(config: &SimbrainConfig, errors: &mut Vec<ConfigValidationError>) {
    let time_step = config.network.time_step;
    if !(time_step.is_finite() && time_step > 0.0) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "network.time_step".to_string(),
            reason: format!("{} is not a positive number", time_step),
        });
    }
}

fn validate_logging(config: &SimbrainConfig, errors: &mut Vec<ConfigValidationError>) {
    if !LOG_LEVELS.contains(&config.logging.level.to_lowercase().as_str()) {
        errors.push(ConfigValidationError::UnknownOption {
            field: "logging.level".to_string(),
            value: config.logging.level.clone(),
            allowed: &LOG_LEVELS,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_errors_reported() {
        let mut config = SimbrainConfig::default();
        config.update_engine.mode = "sideways".to_string();
        config.update_engine.base_chunk_size = 0;
        config.update_engine.oversubscription = 0;
        config.update_engine.debounce_ms = 120_000;
        config.network.time_step = 0.0;

        let errors = collect_errors(&config);
        assert_eq!(errors.len(), 5);

        let message = validate_config(&config).unwrap_err().to_string();
        assert!(message.contains("update_engine.mode = 'sideways'"));
        assert!(message.contains("network.time_step"));
    }

    #[test]
    fn test_mode_is_case_insensitive() {
        let mut config = SimbrainConfig::default();
        config.update_engine.mode = "Concurrent".to_string();
        config.logging.level = "WARN".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_nan_time_step_rejected() {
        let mut config = SimbrainConfig::default();
        config.network.time_step = f64::NAN;
        assert_eq!(collect_errors(&config).len(), 1);
    }
}
