// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client for CLI commands

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use loy_core::{LedgerEntry, Order, RewardId};
use loy_daemon::protocol::{self, ProtocolError};
use loy_daemon::{last_startup_error, Config, DaemonPaths, Job, JobReport, Request, Response};
use loy_engine::{EngineStatus, ImportReport, Redemption, TierStatus};
use thiserror::Error;
use tokio::net::UnixStream;

// Timeout configuration (env vars in milliseconds)
fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Timeout for control requests (hello, status, shutdown)
pub fn timeout_ipc() -> Duration {
    parse_duration_ms("LOY_TIMEOUT_IPC_MS").unwrap_or(Duration::from_secs(5))
}

/// Timeout for requests that may call the commerce platform
pub fn timeout_request() -> Duration {
    parse_duration_ms("LOY_TIMEOUT_REQUEST_MS").unwrap_or(Duration::from_secs(60))
}

/// Timeout for on-demand batch jobs
pub fn timeout_job() -> Duration {
    parse_duration_ms("LOY_TIMEOUT_JOB_MS").unwrap_or(Duration::from_secs(600))
}

/// Timeout for waiting for daemon to start
pub fn timeout_connect() -> Duration {
    parse_duration_ms("LOY_TIMEOUT_CONNECT_MS").unwrap_or(Duration::from_secs(5))
}

/// Timeout for waiting for process to exit
pub fn timeout_exit() -> Duration {
    parse_duration_ms("LOY_TIMEOUT_EXIT_MS").unwrap_or(Duration::from_secs(2))
}

/// Polling interval for retries
pub fn poll_interval() -> Duration {
    parse_duration_ms("LOY_POLL_INTERVAL_MS").unwrap_or(Duration::from_millis(50))
}

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Daemon not running")]
    DaemonNotRunning,

    #[error("Failed to start daemon: {0}")]
    DaemonStartFailed(String),

    #[error("Connection timeout waiting for daemon to start")]
    DaemonStartTimeout,

    #[error("Config error: {0}")]
    Config(#[from] loy_daemon::LifecycleError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Redemption rejected ({reason}): {message}")]
    RedeemRejected { reason: String, message: String },

    #[error("{0}")]
    Rejected(String),

    #[error("Unexpected response from daemon")]
    UnexpectedResponse,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Daemon client
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// Connect to daemon, auto-starting if not running
    pub async fn connect_or_start(config: &Config) -> Result<Self, ClientError> {
        let paths = &config.paths;

        // Restart a daemon left behind by a different build
        if let Ok(daemon_version) = std::fs::read_to_string(&paths.version_path) {
            if daemon_version.trim() != env!("CARGO_PKG_VERSION") {
                let _ = daemon_stop(paths).await;
            }
        }

        match Self::connect(paths) {
            Ok(client) => Ok(client),
            Err(ClientError::DaemonNotRunning) => {
                let child = start_daemon_background(&config.config_path)?;
                Self::connect_with_retry(paths, timeout_connect(), child).await
            }
            Err(e) => Err(wrap_with_startup_error(e, paths)),
        }
    }

    /// Connect to existing daemon (no auto-start)
    pub fn connect(paths: &DaemonPaths) -> Result<Self, ClientError> {
        if !paths.socket_path.exists() {
            return Err(ClientError::DaemonNotRunning);
        }
        Ok(Self {
            socket_path: paths.socket_path.clone(),
        })
    }

    async fn connect_with_retry(
        paths: &DaemonPaths,
        timeout: Duration,
        mut child: std::process::Child,
    ) -> Result<Self, ClientError> {
        let start = Instant::now();
        while start.elapsed() < timeout {
            // Early exit means startup failed
            if let Ok(Some(status)) = child.try_wait() {
                // Poll for startup error in log (filesystem may need to sync)
                let poll_start = Instant::now();
                while poll_start.elapsed() < timeout_exit() {
                    if let Some(err) = last_startup_error(&paths.log_path) {
                        return Err(ClientError::DaemonStartFailed(err));
                    }
                    tokio::time::sleep(poll_interval()).await;
                }
                return Err(ClientError::DaemonStartFailed(format!(
                    "exited with {}",
                    status
                )));
            }

            match Self::connect(paths) {
                Ok(client) => match client.hello().await {
                    Ok(_) => return Ok(client),
                    // Socket file exists but the accept loop is not up yet
                    Err(ClientError::Io(_)) => tokio::time::sleep(poll_interval()).await,
                    Err(e) => return Err(e),
                },
                Err(ClientError::DaemonNotRunning) => {
                    tokio::time::sleep(poll_interval()).await;
                }
                Err(e) => return Err(wrap_with_startup_error(e, paths)),
            }
        }

        Err(wrap_with_startup_error(
            ClientError::DaemonStartTimeout,
            paths,
        ))
    }

    /// Send a request and receive a response with specific timeouts
    async fn send_with_timeout(
        &self,
        request: Request,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> Result<Response, ClientError> {
        tracing::debug!(?request, "sending request");
        let stream = UnixStream::connect(&self.socket_path).await?;
        let (mut reader, mut writer) = stream.into_split();

        let data = protocol::encode(&request)?;
        tokio::time::timeout(write_timeout, protocol::write_message(&mut writer, &data))
            .await
            .map_err(|_| ProtocolError::Timeout)??;

        let response_bytes =
            tokio::time::timeout(read_timeout, protocol::read_message(&mut reader))
                .await
                .map_err(|_| ProtocolError::Timeout)??;

        Ok(protocol::decode(&response_bytes)?)
    }

    /// Send a control request
    pub async fn send(&self, request: Request) -> Result<Response, ClientError> {
        self.send_with_timeout(request, timeout_ipc(), timeout_ipc())
            .await
    }

    async fn send_slow(&self, request: Request, timeout: Duration) -> Result<Response, ClientError> {
        self.send_with_timeout(request, timeout, timeout_ipc())
            .await
    }

    /// Get daemon protocol version via Hello handshake
    pub async fn hello(&self) -> Result<String, ClientError> {
        match self
            .send(Request::Hello {
                version: loy_daemon::PROTOCOL_VERSION.to_string(),
            })
            .await?
        {
            Response::Hello { version } => Ok(version),
            other => Err(unexpected(other)),
        }
    }

    /// Get daemon uptime and engine counters
    pub async fn status(&self) -> Result<(u64, EngineStatus), ClientError> {
        match self.send(Request::Status).await? {
            Response::Status {
                uptime_secs,
                engine,
            } => Ok((uptime_secs, engine)),
            other => Err(unexpected(other)),
        }
    }

    /// Request daemon shutdown
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        match self.send(Request::Shutdown).await? {
            Response::ShuttingDown => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    pub async fn redeem(
        &self,
        customer: &str,
        reward_id: &str,
    ) -> Result<Redemption, ClientError> {
        let request = Request::Redeem {
            customer: customer.to_string(),
            reward_id: RewardId::new(reward_id),
        };
        match self.send_slow(request, timeout_request()).await? {
            Response::Redeemed { redemption } => Ok(redemption),
            Response::RedeemRejected { reason, message } => {
                Err(ClientError::RedeemRejected { reason, message })
            }
            other => Err(unexpected(other)),
        }
    }

    pub async fn history(
        &self,
        customer: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<LedgerEntry>, ClientError> {
        let request = Request::History {
            customer: customer.to_string(),
            since,
        };
        match self.send(request).await? {
            Response::History { entries } => Ok(entries),
            other => Err(unexpected(other)),
        }
    }

    pub async fn tier(&self, customer: &str) -> Result<TierStatus, ClientError> {
        let request = Request::Tier {
            customer: customer.to_string(),
        };
        match self.send(request).await? {
            Response::Tier { status } => Ok(status),
            other => Err(unexpected(other)),
        }
    }

    pub async fn adjust(
        &self,
        customer: &str,
        change: i64,
        reason: &str,
        adjustment_id: &str,
    ) -> Result<LedgerEntry, ClientError> {
        let request = Request::Adjust {
            customer: customer.to_string(),
            change,
            reason: reason.to_string(),
            adjustment_id: adjustment_id.to_string(),
        };
        match self.send_slow(request, timeout_request()).await? {
            Response::Adjusted { entry } => Ok(entry),
            other => Err(unexpected(other)),
        }
    }

    pub async fn import(&self, customer: &str) -> Result<ImportReport, ClientError> {
        let request = Request::Import {
            customer: customer.to_string(),
        };
        match self.send_slow(request, timeout_request()).await? {
            Response::Imported { report } => Ok(report),
            other => Err(unexpected(other)),
        }
    }

    pub async fn record_order(
        &self,
        customer: &str,
        order_number: &str,
        total_minor: i64,
        currency: &str,
    ) -> Result<Order, ClientError> {
        let request = Request::RecordOrder {
            customer: customer.to_string(),
            order_number: order_number.to_string(),
            total_minor,
            currency: currency.to_string(),
        };
        match self.send_slow(request, timeout_request()).await? {
            Response::OrderRecorded { order } => Ok(order),
            other => Err(unexpected(other)),
        }
    }

    /// Run a batch job now and wait for its report
    pub async fn run_job(&self, job: Job) -> Result<JobReport, ClientError> {
        match self.send_slow(Request::RunJob { job }, timeout_job()).await? {
            Response::JobDone { report } => Ok(report),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(response: Response) -> ClientError {
    match response {
        Response::Error { message } => ClientError::Rejected(message),
        _ => ClientError::UnexpectedResponse,
    }
}

/// Start the daemon in the background, returning the child process handle
fn start_daemon_background(config_path: &Path) -> Result<std::process::Child, ClientError> {
    let loyd_path = find_loyd_binary();

    Command::new(&loyd_path)
        .arg(config_path)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map_err(|e| ClientError::DaemonStartFailed(format!("{}: {}", loyd_path.display(), e)))
}

/// Stop the daemon (graceful first, then forceful)
/// Returns true if daemon was stopped, false if it wasn't running
pub async fn daemon_stop(paths: &DaemonPaths) -> Result<bool, ClientError> {
    let client = match DaemonClient::connect(paths) {
        Ok(c) => c,
        Err(ClientError::DaemonNotRunning) => {
            cleanup_stale_pid(paths);
            return Ok(false);
        }
        Err(e) => return Err(e),
    };

    let shutdown_result = client.shutdown().await;

    if let Some(pid) = read_daemon_pid(paths) {
        if shutdown_result.is_ok() {
            wait_for_exit(pid, timeout_exit()).await;
        }

        if process_exists(pid) {
            force_kill_daemon(pid);
            wait_for_exit(pid, timeout_exit()).await;
        }
    }

    cleanup_stale_pid(paths);
    Ok(true)
}

/// Wait for a process to exit
async fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if !process_exists(pid) {
            return true;
        }
        tokio::time::sleep(poll_interval()).await;
    }
    false
}

/// Find the loyd binary
fn find_loyd_binary() -> PathBuf {
    // Explicit override (used by tests to ensure correct binary)
    if let Ok(path) = std::env::var("LOY_DAEMON_BINARY") {
        return PathBuf::from(path);
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("loyd");
            if sibling.exists() {
                return sibling;
            }
        }
    }

    PathBuf::from("loyd")
}

/// Remove a PID file left by a daemon that is no longer serving.
///
/// Only called by daemon_stop; connect() must never touch it because the
/// daemon writes it before the socket exists.
fn cleanup_stale_pid(paths: &DaemonPaths) {
    if paths.lock_path.exists() {
        let _ = std::fs::remove_file(&paths.lock_path);
    }
}

/// Get the PID from the daemon PID file, if it exists
pub fn read_daemon_pid(paths: &DaemonPaths) -> Option<u32> {
    std::fs::read_to_string(&paths.lock_path)
        .ok()
        .and_then(|content| content.trim().parse::<u32>().ok())
}

/// Run `kill -<signal> <pid>` quietly, reporting whether it succeeded
fn kill(pid: u32, signal: &str) -> bool {
    Command::new("kill")
        .arg(signal)
        .arg(pid.to_string())
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

/// Signal 0 probes for the process without delivering anything
pub fn process_exists(pid: u32) -> bool {
    kill(pid, "-0")
}

pub fn force_kill_daemon(pid: u32) -> bool {
    kill(pid, "-9")
}

/// Prefer the daemon's own startup error over a generic connect failure
fn wrap_with_startup_error(err: ClientError, paths: &DaemonPaths) -> ClientError {
    if matches!(err, ClientError::DaemonStartFailed(_)) {
        return err;
    }

    match last_startup_error(&paths.log_path) {
        Some(startup_error) => ClientError::DaemonStartFailed(startup_error),
        None => err,
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
