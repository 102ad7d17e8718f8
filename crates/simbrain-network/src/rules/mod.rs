// Copyright 2025 Simbrain Developers
// SPDX-License-Identifier: Apache-2.0

//! # Neuron Update Rules
//!
//! A rule maps the summed afferent input and the neuron's current activation
//! to the next activation. Rules are shared (`Arc`) across many neurons and
//! are evaluated concurrently, so they must be `Send + Sync` and must not
//! keep per-neuron mutable state.
//!
//! ## Adding a New Rule
//!
//! 1. Create `src/rules/your_rule.rs`
//! 2. Implement [`NeuronUpdateRule`]
//! 3. Add tests
//! 4. Export in `mod.rs`

pub mod binary;
pub mod linear;
pub mod sigmoidal;

pub use binary::BinaryRule;
pub use linear::LinearRule;
pub use sigmoidal::SigmoidalRule;

use crate::error::RuleError;

/// Per-neuron update logic.
pub trait NeuronUpdateRule: Send + Sync {
    /// Human readable rule name (used in error reports)
    fn name(&self) -> &str;

    /// Compute the next activation.
    ///
    /// `net_input` is the sum of the post-synaptic responses of every afferent
    /// synapse, each computed from its source's pre-tick activation.
    fn apply(&self, net_input: f64, activation: f64, time_step: f64) -> Result<f64, RuleError>;
}

/// Clip `value` into `[lower, upper]`.
#[inline]
pub(crate) fn clip(value: f64, lower: f64, upper: f64) -> f64 {
    value.max(lower).min(upper)
}
