// Copyright 2025 Simbrain Developers
// SPDX-License-Identifier: Apache-2.0

//! Per-crate debug flags
//!
//! `--debug-simbrain-update` raises one crate to debug level; `--debug-all`
//! raises every known crate.

use std::collections::BTreeSet;
use std::env;

use crate::KNOWN_CRATES;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrateDebugFlags {
    pub enabled_crates: BTreeSet<String>,
}

impl CrateDebugFlags {
    /// Collect `--debug-{crate}` and `--debug-all` arguments; others are ignored.
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut flags = CrateDebugFlags::default();
        for arg in args {
            if arg == "--debug-all" {
                flags.enable_all();
            } else if let Some(crate_name) = arg.strip_prefix("--debug-") {
                flags.enabled_crates.insert(crate_name.to_string());
            }
        }
        flags
    }

    pub fn enable_all(&mut self) {
        self.enabled_crates
            .extend(KNOWN_CRATES.iter().map(|c| c.to_string()));
    }

    pub fn is_enabled(&self, crate_name: &str) -> bool {
        self.enabled_crates.contains(crate_name)
    }

    pub fn any_enabled(&self) -> bool {
        !self.enabled_crates.is_empty()
    }

    pub fn log_level(&self, crate_name: &str) -> tracing::Level {
        if self.is_enabled(crate_name) {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// `EnvFilter` directive string: `base` for everything, `debug` for
    /// enabled crates. Crate names are mapped to their tracing targets
    /// (`simbrain-update` -> `simbrain_update`).
    pub fn to_filter_string(&self, base: &str) -> String {
        let mut directives = vec![base.to_string()];
        directives.extend(
            self.enabled_crates
                .iter()
                .map(|c| format!("{}=debug", c.replace('-', "_"))),
        );
        directives.join(",")
    }
}

/// Debug flags from the process arguments plus `SIMBRAIN_DEBUG`
/// (comma-separated crate names, or `all`).
pub fn parse_debug_flags() -> CrateDebugFlags {
    let mut flags = CrateDebugFlags::from_args(env::args());
    if let Ok(value) = env::var("SIMBRAIN_DEBUG") {
        apply_debug_env(&mut flags, &value);
    }
    flags
}

fn apply_debug_env(flags: &mut CrateDebugFlags, value: &str) {
    if value.trim() == "all" {
        flags.enable_all();
        return;
    }
    for crate_name in value.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        flags.enabled_crates.insert(crate_name.to_string());
    }
}

pub fn debug_flags_help() -> String {
    format!(
        r#"Debug Flags:
  --debug-all                    Enable debug logging for all crates
  --debug-{{crate-name}}          Enable debug logging for specific crate

Available crates:
  {}

Environment Variable:
  SIMBRAIN_DEBUG={{crate-name}}[,{{crate-name}}]  Enable debug for crates (comma-separated)
  SIMBRAIN_DEBUG=all                               Enable debug for all crates
"#,
        KNOWN_CRATES.join(", ")
    )
}
