// Copyright 2025 Simbrain Developers
// SPDX-License-Identifier: Apache-2.0

use crate::error::TickError;

/// An action a simulation driver invokes once per network update.
pub trait NetworkUpdateAction: Send + Sync {
    /// Perform one full update of the network
    fn invoke(&self) -> Result<(), TickError>;

    /// Short name shown in update-action lists
    fn description(&self) -> &str;

    fn long_description(&self) -> &str;
}
