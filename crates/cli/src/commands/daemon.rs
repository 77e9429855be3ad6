// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon management commands

use std::fmt;

use anyhow::Result;
use clap::{Args, Subcommand};
use loy_daemon::Config;
use loy_engine::EngineStatus;
use serde::Serialize;

use crate::client::{daemon_stop, read_daemon_pid, ClientError, DaemonClient};
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct DaemonArgs {
    #[command(subcommand)]
    pub command: DaemonCommand,
}

#[derive(Subcommand)]
pub enum DaemonCommand {
    /// Start the daemon in the background if it is not running
    Start,
    /// Stop the daemon (graceful first, then forceful)
    Stop,
    /// Show uptime and engine counters
    Status,
}

#[derive(Serialize)]
struct StatusView {
    running: bool,
    pid: Option<u32>,
    uptime_secs: Option<u64>,
    engine: Option<EngineStatus>,
}

impl fmt::Display for StatusView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (Some(uptime), Some(engine)) = (self.uptime_secs, &self.engine) else {
            return write!(f, "Daemon not running");
        };
        match self.pid {
            Some(pid) => writeln!(f, "Daemon running (pid {}, up {}s)", pid, uptime)?,
            None => writeln!(f, "Daemon running (up {}s)", uptime)?,
        }
        writeln!(
            f,
            "  Store: {} customers, {} orders, {} offers, {} entries",
            engine.store.customers, engine.store.orders, engine.store.offers, engine.store.entries
        )?;
        writeln!(
            f,
            "  Sync: {} delivered, {} retried, {} dropped, {} skipped",
            engine.sync.delivered, engine.sync.retried, engine.sync.dropped, engine.sync.skipped
        )?;
        write!(f, "  Rewards: {}", engine.rewards)
    }
}

pub async fn daemon(args: DaemonArgs, config: &Config, format: OutputFormat) -> Result<()> {
    match args.command {
        DaemonCommand::Start => {
            let client = DaemonClient::connect_or_start(config).await?;
            let version = client.hello().await?;
            println!("Daemon running (protocol {})", version);
        }
        DaemonCommand::Stop => {
            if daemon_stop(&config.paths).await? {
                println!("Daemon stopped");
            } else {
                println!("Daemon not running");
            }
        }
        DaemonCommand::Status => {
            let status = match DaemonClient::connect(&config.paths) {
                Ok(client) => match client.status().await {
                    Ok((uptime, engine)) => Some((uptime, engine)),
                    // Stale socket from a daemon that died
                    Err(ClientError::Io(_)) => None,
                    Err(e) => return Err(e.into()),
                },
                Err(ClientError::DaemonNotRunning) => None,
                Err(e) => return Err(e.into()),
            };
            let view = StatusView {
                running: status.is_some(),
                pid: status.as_ref().and(read_daemon_pid(&config.paths)),
                uptime_secs: status.as_ref().map(|(uptime, _)| *uptime),
                engine: status.map(|(_, engine)| engine),
            };
            output::print(&view, format)?;
        }
    }
    Ok(())
}
