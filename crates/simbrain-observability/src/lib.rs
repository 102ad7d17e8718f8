// Copyright 2025 Simbrain Developers
// SPDX-License-Identifier: Apache-2.0

//! # simbrain-observability
//!
//! Logging initialization shared by every Simbrain binary, with per-crate
//! debug flag support.
//!
//! ## Features
//! - `file-logging`: daily-rotated log file next to console output

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod init;

pub use cli::*;
pub use init::*;

/// Simbrain crate names accepted by `--debug-<crate>`
pub const KNOWN_CRATES: &[&str] = &[
    "simbrain",
    "simbrain-network",
    "simbrain-update",
    "simbrain-config",
    "simbrain-observability",
];
