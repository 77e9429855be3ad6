// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem layout shared by `loyd` and `loy`

use loy_core::LoyaltyConfig;
use std::path::{Path, PathBuf};

/// Where the daemon keeps its files.
///
/// Relative paths in the config are resolved against the directory that
/// holds the config file, so the CLI and daemon agree regardless of their
/// working directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonPaths {
    pub data_dir: PathBuf,
    pub socket_path: PathBuf,
    /// Exclusive lock, also holds the daemon PID
    pub lock_path: PathBuf,
    pub version_path: PathBuf,
    pub log_path: PathBuf,
    pub wal_path: PathBuf,
}

impl DaemonPaths {
    pub fn resolve(config_path: &Path, config: &LoyaltyConfig) -> Self {
        let base = match config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let data_dir = anchor(&base, &config.store.data_dir);
        let socket_path = config
            .daemon
            .socket_path
            .as_ref()
            .map(|p| anchor(&base, p))
            .unwrap_or_else(|| data_dir.join("loyd.sock"));
        let log_path = config
            .daemon
            .log_path
            .as_ref()
            .map(|p| anchor(&base, p))
            .unwrap_or_else(|| data_dir.join("loyd.log"));
        Self {
            socket_path,
            log_path,
            lock_path: data_dir.join("loyd.pid"),
            version_path: data_dir.join("loyd.version"),
            wal_path: data_dir.join("ledger.wal"),
            data_dir,
        }
    }
}

fn anchor(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
