// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Loyalty Daemon (loyd)
//!
//! Owns the ledger, runs the periodic jobs and answers CLI requests.

use std::path::PathBuf;

use loy_daemon::lifecycle::{self, Config};
use loy_daemon::{server, DaemonLog};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("LOY_CONFIG").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("loyalty.toml"));

    let config = Config::load(&config_path)?;

    // Marker first so the CLI knows where this attempt begins
    let log = DaemonLog::new(&config.paths.log_path);
    log.mark_startup()?;
    let log_guard = log.install_subscriber()?;

    info!(config = %config_path.display(), "starting loyd");

    let daemon = match lifecycle::startup(&config).await {
        Ok(d) => d,
        Err(e) => {
            // tracing is non-blocking and may not flush before exit
            log.record_startup_error(&e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let shutdown = daemon.context.shutdown.clone();

    info!(socket = %config.paths.socket_path.display(), "daemon ready");

    // Signal ready for parent process (e.g., systemd, CLI waiting for startup)
    println!("READY");

    loop {
        tokio::select! {
            result = daemon.listener.accept() => match result {
                Ok((stream, _)) => {
                    let ctx = daemon.context.clone();
                    tokio::spawn(async move {
                        if let Err(e) = server::handle_connection(ctx, stream).await {
                            error!(error = %e, "connection failed");
                        }
                    });
                }
                Err(e) => error!(error = %e, "accept failed"),
            },
            _ = sigterm.recv() => {
                info!("received SIGTERM");
                break;
            }
            _ = sigint.recv() => {
                info!("received SIGINT");
                break;
            }
            _ = shutdown.notified() => {
                info!("shutdown requested by client");
                break;
            }
        }
    }

    daemon.shutdown().await?;
    drop(log_guard);
    Ok(())
}
