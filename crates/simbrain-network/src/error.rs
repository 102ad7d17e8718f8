// Copyright 2025 Simbrain Developers
// SPDX-License-Identifier: Apache-2.0

//! Error types for the network model

use crate::ids::NeuronId;

/// Errors raised while editing the network graph
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NetworkError {
    #[error("Neuron not found: {0}")]
    NeuronNotFound(NeuronId),

    #[error("Invalid time step {0}: must be finite and > 0")]
    InvalidTimeStep(f64),
}

/// Errors raised by a neuron update rule while computing the next activation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuleError {
    #[error("{rule} produced a non-finite activation ({value})")]
    NonFinite { rule: String, value: f64 },

    #[error("{rule} failed: {reason}")]
    Failed { rule: String, reason: String },
}

/// Errors raised by input/output groups around a tick
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GroupError {
    #[error("Input group '{group}' exhausted its {rows} input rows")]
    InputExhausted { group: String, rows: usize },

    #[error("Input group '{group}' row {row} has {actual} values, expected {expected}")]
    RowWidthMismatch {
        group: String,
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Input group '{0}' has an empty input table")]
    EmptyTable(String),
}

pub type Result<T> = core::result::Result<T, NetworkError>;
