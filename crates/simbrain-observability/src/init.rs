// Copyright 2025 Simbrain Developers
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;

/// Keeps background log writers alive; drop it last.
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
    log_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Run directory holding the log file, when file logging is active
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

/// Install the global subscriber: console output at `level`, with debug
/// level for crates enabled in `debug_flags`.
///
/// With the `file-logging` feature and a `log_dir`, JSON lines are also
/// written to `<log_dir>/run_<timestamp>/simbrain.log`, rotated daily.
pub fn init_logging(debug_flags: &CrateDebugFlags, level: &str, log_dir: Option<PathBuf>) -> Result<LoggingGuard> {
    let filter = debug_flags.to_filter_string(level);
    let env_filter =
        EnvFilter::try_new(&filter).with_context(|| format!("Invalid log filter '{}'", filter))?;

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_names(true)
        .with_filter(env_filter)
        .boxed();
    let mut layers = vec![console_layer];

    #[cfg(feature = "file-logging")]
    let (file_guard, run_dir) = match log_dir {
        Some(base) => {
            let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
            let run_dir = base.join(format!("run_{}", timestamp));
            std::fs::create_dir_all(&run_dir)
                .with_context(|| format!("Failed to create log directory: {}", run_dir.display()))?;

            let appender = tracing_appender::rolling::daily(&run_dir, "simbrain.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_filter = EnvFilter::try_new(&filter)
                .with_context(|| format!("Invalid log filter '{}'", filter))?;
            layers.push(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .json()
                    .with_filter(file_filter)
                    .boxed(),
            );
            (Some(guard), Some(run_dir))
        }
        None => (None, None),
    };

    #[cfg(not(feature = "file-logging"))]
    let run_dir = {
        if let Some(dir) = log_dir {
            eprintln!(
                "Log directory {} ignored: built without the file-logging feature",
                dir.display()
            );
        }
        None
    };

    Registry::default()
        .with(layers)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    Ok(LoggingGuard {
        #[cfg(feature = "file-logging")]
        _file_guard: file_guard,
        log_dir: run_dir,
    })
}

/// Console-only logging at `level`
pub fn init_logging_default(debug_flags: &CrateDebugFlags, level: &str) -> Result<LoggingGuard> {
    init_logging(debug_flags, level, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_once_then_reject() {
        let flags = CrateDebugFlags::default();
        let guard = init_logging_default(&flags, "info").unwrap();
        assert!(guard.log_dir().is_none());
        assert!(init_logging_default(&flags, "info").is_err());
    }

    #[test]
    fn test_invalid_level_rejected() {
        let flags = CrateDebugFlags::default();
        assert!(init_logging_default(&flags, "simbrain=loud").is_err());
    }
}
