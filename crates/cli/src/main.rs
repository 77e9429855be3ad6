// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! loy - Loyalty ledger CLI

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{daemon, ledger, orders, run};
use loy_daemon::Config;

use crate::client::DaemonClient;
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(
    name = "loy",
    version,
    about = "Loyalty ledger - points, tiers and rewards"
)]
struct Cli {
    /// Path to the loyalty config file
    #[arg(long, global = true, env = "LOY_CONFIG", default_value = "loyalty.toml")]
    config: PathBuf,

    /// Output format
    #[arg(long, short, global = true, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Spend points on a catalog reward and issue a discount code
    Redeem(ledger::RedeemArgs),
    /// Show a customer's ledger entries
    History(ledger::HistoryArgs),
    /// Show a customer's tier, progress and balance
    Tier(ledger::TierArgs),
    /// Apply a manual point adjustment
    Adjust(ledger::AdjustArgs),
    /// Pull a customer and their orders from the commerce platform
    Import(orders::ImportArgs),
    /// Record an order placed outside the platform feed
    RecordOrder(orders::RecordOrderArgs),
    /// Run a batch job now
    Run(run::RunArgs),
    /// Daemon management
    Daemon(daemon::DaemonArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    let format = cli.output;

    // Daemon commands manage the connection themselves
    if let Commands::Daemon(args) = cli.command {
        return daemon::daemon(args, &config, format).await;
    }

    let client = DaemonClient::connect_or_start(&config).await?;

    match cli.command {
        Commands::Redeem(args) => ledger::redeem(&client, args, format).await,
        Commands::History(args) => ledger::history(&client, args, format).await,
        Commands::Tier(args) => ledger::tier(&client, args, format).await,
        Commands::Adjust(args) => ledger::adjust(&client, args, format).await,
        Commands::Import(args) => orders::import(&client, args, format).await,
        Commands::RecordOrder(args) => orders::record_order(&client, args, format).await,
        Commands::Run(args) => run::run(&client, args, format).await,
        Commands::Daemon(_) => Ok(()),
    }
}

/// Diagnostics go to stderr so `--output json` stays parseable
fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("LOY_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
