// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The daemon log file
//!
//! Each start appends a marker line before tracing is installed. The CLI
//! reads back from the last marker to explain why a spawned daemon died.

use std::fmt::Display;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;

use crate::lifecycle::LifecycleError;

/// Marker prefix; the full line is "--- loyd: starting (pid: 12345) ---"
pub const STARTUP_MARKER_PREFIX: &str = "--- loyd: starting (pid: ";

/// Written synchronously so a client polling the log sees it before exit
const STARTUP_ERROR_PREFIX: &str = "ERROR Failed to start daemon: ";

pub struct DaemonLog {
    path: PathBuf,
}

impl DaemonLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn append_line(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)
    }

    pub fn mark_startup(&self) -> std::io::Result<()> {
        self.append_line(&format!(
            "{}{}) ---",
            STARTUP_MARKER_PREFIX,
            std::process::id()
        ))
    }

    /// Best effort: the daemon is exiting anyway
    pub fn record_startup_error(&self, error: &impl Display) {
        let _ = self.append_line(&format!("{}{}", STARTUP_ERROR_PREFIX, error));
    }

    /// Route `tracing` into the log file. Keep the guard alive until exit.
    pub fn install_subscriber(&self) -> Result<WorkerGuard, LifecycleError> {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let no_dir = || LifecycleError::NoLogDir(self.path.clone());
        let appender = tracing_appender::rolling::never(
            self.path.parent().ok_or_else(no_dir)?,
            self.path.file_name().ok_or_else(no_dir)?,
        );
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_ansi(false).with_writer(writer))
            .init();
        Ok(guard)
    }
}

/// Errors logged since the most recent startup marker, one per line
pub fn last_startup_error(log_path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(log_path).ok()?;
    let attempt = &content[content.rfind(STARTUP_MARKER_PREFIX)?..];

    let messages: Vec<&str> = attempt
        .lines()
        .filter_map(|line| {
            if let Some(message) = line.strip_prefix(STARTUP_ERROR_PREFIX) {
                return Some(message);
            }
            // tracing format: "<timestamp>  ERROR <target>: <message>"
            line.contains(" ERROR ")
                .then(|| line.split_once(": ").map_or(line, |(_, msg)| msg))
        })
        .collect();

    if messages.is_empty() {
        None
    } else {
        Some(messages.join("\n"))
    }
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
