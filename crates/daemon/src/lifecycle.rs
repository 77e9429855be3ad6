// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup and shutdown.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use fs2::FileExt;
use loy_adapters::{HttpCommerceAdapter, NoOpCommerceAdapter, TracedCommercePlatform};
use loy_core::{ConfigError, LoyaltyConfig, RewardCatalog, SystemClock, UuidIdGen};
use loy_engine::{sync, Engine, EngineConfig, EngineDeps, RetryPolicy, SyncWorker};
use loy_storage::{Store, StoreError};
use thiserror::Error;
use tokio::net::UnixListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::jobs;
use crate::paths::DaemonPaths;
use crate::platform::DaemonPlatform;
use crate::server::ServerContext;

/// Platform as the daemon uses it (wrapped with tracing)
pub type DaemonCommerce = TracedCommercePlatform<DaemonPlatform>;

/// Engine with the daemon's concrete types
pub type DaemonEngine = Engine<DaemonCommerce, SystemClock, UuidIdGen>;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub config_path: PathBuf,
    pub loyalty: LoyaltyConfig,
    pub paths: DaemonPaths,
}

impl Config {
    pub fn load(config_path: &Path) -> Result<Self, LifecycleError> {
        let loyalty = LoyaltyConfig::load(config_path)?;
        let paths = DaemonPaths::resolve(config_path, &loyalty);
        Ok(Self {
            config_path: config_path.to_path_buf(),
            loyalty,
            paths,
        })
    }
}

/// Daemon state during operation
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub listener: UnixListener,
    pub context: ServerContext<DaemonCommerce, SystemClock, UuidIdGen>,
    sync_worker: JoinHandle<()>,
    job_loop: JoinHandle<()>,
}

impl DaemonState {
    pub fn engine(&self) -> &DaemonEngine {
        &self.context.engine
    }

    /// Shutdown the daemon gracefully
    pub async fn shutdown(self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        self.job_loop.abort();
        let stats = self.context.engine.status();
        info!(store = ?stats.store, sync = ?stats.sync, "final counters");
        // Queued syncs are best effort; the next job run re-derives them
        self.sync_worker.abort();

        for path in [
            &self.config.paths.socket_path,
            &self.config.paths.lock_path,
            &self.config.paths.version_path,
        ] {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }

        // Lock file is released when self.lock_file is dropped
        info!("Daemon shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Log path has no parent directory: {0}")]
    NoLogDir(PathBuf),

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("platform.base_url is set but platform.access_token is missing")]
    MissingAccessToken,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config).await {
        Ok(state) => Ok(state),
        // Files belong to the daemon that holds the lock
        Err(e @ LifecycleError::LockFailed(_)) => Err(e),
        Err(e) => {
            cleanup_on_failure(config);
            Err(e)
        }
    }
}

async fn startup_inner(config: &Config) -> Result<DaemonState, LifecycleError> {
    let paths = &config.paths;
    let loyalty = &config.loyalty;

    // 1. Data directory
    std::fs::create_dir_all(&paths.data_dir)?;
    if let Some(parent) = paths.socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // 2. Acquire lock file FIRST: one writer per ledger
    let mut lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&paths.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    std::fs::write(&paths.version_path, env!("CARGO_PKG_VERSION"))?;

    // 3. Platform, before touching the store (fail fast on bad config)
    let platform = TracedCommercePlatform::new(select_platform(loyalty)?);
    if platform.inner().is_offline() {
        warn!("No platform configured; running offline (imports and redemptions will fail)");
    }

    // 4. Replay the ledger
    let store = Arc::new(Store::open(&paths.wal_path)?);
    let mut seeded = 0;
    for offer in &loyalty.offers {
        if store.upsert_offer(offer.clone())? {
            seeded += 1;
        }
    }
    let stats = store.stats();
    info!(
        customers = stats.customers,
        orders = stats.orders,
        offers = stats.offers,
        entries = stats.entries,
        offers_updated = seeded,
        "Loaded state"
    );

    // 5. Sync worker
    let (sync_handle, sync_rx) = sync::channel(loyalty.sync.queue_capacity);
    let worker = SyncWorker::new(
        Arc::clone(&store),
        platform.clone(),
        RetryPolicy::from(&loyalty.sync),
    );
    let sync_worker = tokio::spawn(worker.run(sync_rx));

    // 6. Engine
    let engine = Engine::new(
        EngineDeps {
            store,
            platform,
            catalog: RewardCatalog::new(loyalty.rewards.iter().cloned()),
            sync: sync_handle,
        },
        SystemClock,
        UuidIdGen,
        EngineConfig::from(loyalty),
    );

    // 7. Check ledgers written by previous runs (log only)
    let audit = engine.verify_ledgers();
    if !audit.violations.is_empty() {
        warn!(
            violations = audit.violations.len(),
            "ledger chain violations found; run `loy run audit` for details"
        );
    }

    // 8. Remove stale socket and bind (LAST - only after all validation passes)
    if paths.socket_path.exists() {
        std::fs::remove_file(&paths.socket_path)?;
    }
    let listener = UnixListener::bind(&paths.socket_path)
        .map_err(|e| LifecycleError::BindFailed(paths.socket_path.clone(), e))?;

    let job_loop = jobs::spawn_schedule(engine.clone(), &loyalty.jobs);

    info!(config = %config.config_path.display(), "Daemon started");

    Ok(DaemonState {
        config: config.clone(),
        lock_file,
        listener,
        context: ServerContext {
            engine,
            start_time: Instant::now(),
            shutdown: Arc::new(Notify::new()),
        },
        sync_worker,
        job_loop,
    })
}

fn select_platform(config: &LoyaltyConfig) -> Result<DaemonPlatform, LifecycleError> {
    let platform = &config.platform;
    match &platform.base_url {
        Some(base_url) => {
            let token = platform
                .access_token
                .as_deref()
                .ok_or(LifecycleError::MissingAccessToken)?;
            Ok(DaemonPlatform::Http(HttpCommerceAdapter::new(
                base_url,
                token,
                platform.timeout,
            )))
        }
        None => Ok(DaemonPlatform::Offline(NoOpCommerceAdapter::new())),
    }
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    let paths = &config.paths;
    for path in [&paths.socket_path, &paths.version_path, &paths.lock_path] {
        if path.exists() {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
