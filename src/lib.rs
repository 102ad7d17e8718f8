// Copyright 2025 Simbrain Developers
// SPDX-License-Identifier: Apache-2.0

//! # Simbrain
//!
//! Neural network simulation core with a concurrent buffered update engine.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use simbrain::prelude::*;
//! use std::sync::Arc;
//!
//! let network = Arc::new(Network::new(0.1).unwrap());
//! let a = network.add_neuron(Arc::new(LinearRule::default()));
//! let b = network.add_neuron(Arc::new(SigmoidalRule::default()));
//! network.connect(a.id(), b.id(), 0.8).unwrap();
//!
//! let engine = UpdateEngine::attach(Arc::clone(&network), EngineConfig::default()).unwrap();
//! engine.run(Some(100)).unwrap();
//! ```
//!
//! ## Feature Flags
//! - **`config`** (default): load [`EngineConfig`] from `simbrain_configuration.toml`
//! - **`observability`** (default): logging initialization and debug flags
//! - **`file-logging`**: rotating log file in addition to console output
//! - **`lock-tracing`**: log slow acquisitions of the engine's membership lock

pub use simbrain_network as network;
pub use simbrain_update as update;

#[cfg(feature = "config")]
pub use simbrain_config as config;

#[cfg(feature = "observability")]
pub use simbrain_observability as observability;

pub use simbrain_update::{EngineConfig, UpdateEngine, UpdateMode};

#[cfg(feature = "config")]
mod settings;

#[cfg(feature = "config")]
pub use settings::{engine_config, network_from_config, SettingsError};

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::network::{
        ActivationRecorder, BinaryRule, InputGroup, LinearRule, Network, NetworkListener, NeuronGroup,
        NeuronHandle, NeuronId, NeuronUpdateRule, SigmoidalRule, UpdatableGroup,
    };
    pub use crate::update::{
        EngineConfig, NetworkUpdateAction, SerialBufferedUpdate, StopHandle, TickError, UpdateEngine, UpdateMode,
    };

    #[cfg(feature = "config")]
    pub use crate::config::{load_config, validate_config, SimbrainConfig};
}
