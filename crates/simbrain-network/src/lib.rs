// Copyright 2025 Simbrain Developers
// SPDX-License-Identifier: Apache-2.0

//! # Simbrain Network Model
//!
//! The neuron/synapse graph the buffered update engine drives:
//! - **Neurons** with double-buffered (current/next) lock-free activations
//! - **Synapses** updated as part of their target neuron's update
//! - **Rules** mapping net input to the next activation
//! - **Network** registry with add/remove events for membership tracking
//! - **Groups** with optional pre-tick input pull and post-tick output flush

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod activation;
pub mod error;
pub mod groups;
pub mod ids;
pub mod network;
pub mod neuron;
pub mod rules;

pub use activation::AtomicActivation;
pub use error::{GroupError, NetworkError, Result, RuleError};
pub use groups::{ActivationRecorder, InputGroup, NeuronGroup, UpdatableGroup};
pub use ids::{ListenerId, NeuronId, SynapseId};
pub use network::{Network, NetworkListener};
pub use neuron::{Neuron, NeuronHandle, Synapse};
pub use rules::{BinaryRule, LinearRule, NeuronUpdateRule, SigmoidalRule};
