// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Balance, history, tier, redemption and manual adjustment commands

use std::fmt;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use loy_adapters::format_minor;
use loy_core::LedgerEntry;
use loy_engine::{Redemption, TierStatus};
use serde::Serialize;

use crate::client::DaemonClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct RedeemArgs {
    /// Customer id, platform id, or platform global id
    pub customer: String,
    /// Reward id from the catalog
    pub reward: String,
}

#[derive(Args)]
pub struct HistoryArgs {
    pub customer: String,
    /// Only entries at or after this RFC 3339 timestamp
    #[arg(long)]
    pub since: Option<DateTime<Utc>>,
}

#[derive(Args)]
pub struct TierArgs {
    pub customer: String,
}

#[derive(Args)]
pub struct AdjustArgs {
    pub customer: String,
    /// Signed point change, e.g. 50 or -20
    #[arg(allow_hyphen_values = true)]
    pub change: i64,
    #[arg(long)]
    pub reason: String,
    /// Caller-chosen key; retrying with the same id is refused
    #[arg(long = "id")]
    pub adjustment_id: String,
}

#[derive(Serialize)]
#[serde(transparent)]
struct EntryRow<'a>(&'a LedgerEntry);

impl fmt::Display for EntryRow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let e = self.0;
        write!(
            f,
            "{}  {:>+7}  {:>7}  {:<18} {}",
            e.created_at.format("%Y-%m-%d %H:%M"),
            e.change,
            e.balance_after,
            e.source_type,
            e.reason
        )
    }
}

#[derive(Serialize)]
#[serde(transparent)]
struct RedemptionView<'a>(&'a Redemption);

impl fmt::Display for RedemptionView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.0;
        writeln!(f, "Redeemed {} for {}", r.reward_id, r.customer_id)?;
        writeln!(f, "  Code: {}", r.code)?;
        writeln!(f, "  Redemption: {}", r.redemption_id)?;
        write!(f, "  Balance: {}", r.new_balance)
    }
}

#[derive(Serialize)]
#[serde(transparent)]
struct TierView<'a>(&'a TierStatus);

impl fmt::Display for TierView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.0;
        writeln!(f, "Customer: {}", s.customer_id)?;
        writeln!(f, "  Tier: {} (x{})", s.tier, s.multiplier)?;
        writeln!(f, "  Lifetime spend: {}", format_minor(s.lifetime_spend_minor))?;
        match (s.next_tier, s.points_to_next) {
            (Some(next), Some(remaining)) => {
                writeln!(f, "  Next: {} in {}", next, format_minor(remaining))?
            }
            _ => writeln!(f, "  Next: top tier reached")?,
        }
        write!(f, "  Balance: {}", s.balance)
    }
}

pub async fn redeem(client: &DaemonClient, args: RedeemArgs, format: OutputFormat) -> Result<()> {
    let redemption = client.redeem(&args.customer, &args.reward).await?;
    output::print(&RedemptionView(&redemption), format)?;
    Ok(())
}

pub async fn history(client: &DaemonClient, args: HistoryArgs, format: OutputFormat) -> Result<()> {
    let entries = client.history(&args.customer, args.since).await?;
    let rows: Vec<EntryRow<'_>> = entries.iter().map(EntryRow).collect();
    output::print_list(&rows, format, "No ledger entries")?;
    Ok(())
}

pub async fn tier(client: &DaemonClient, args: TierArgs, format: OutputFormat) -> Result<()> {
    let status = client.tier(&args.customer).await?;
    output::print(&TierView(&status), format)?;
    Ok(())
}

pub async fn adjust(client: &DaemonClient, args: AdjustArgs, format: OutputFormat) -> Result<()> {
    let entry = client
        .adjust(&args.customer, args.change, &args.reason, &args.adjustment_id)
        .await?;
    output::print(&EntryRow(&entry), format)?;
    Ok(())
}
