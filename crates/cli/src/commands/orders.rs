// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Customer import and order recording

use std::fmt;

use anyhow::Result;
use clap::Args;
use loy_adapters::{format_minor, parse_minor};
use loy_core::Order;
use loy_engine::ImportReport;
use serde::Serialize;

use crate::client::DaemonClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct ImportArgs {
    /// Platform id or global id (or an internal id already linked to one)
    pub customer: String,
}

#[derive(Args)]
pub struct RecordOrderArgs {
    pub customer: String,
    /// Order number as shown to the customer, e.g. #1042
    pub order_number: String,
    /// Order total as a decimal amount, e.g. 100.00
    #[arg(value_parser = parse_total)]
    pub total: i64,
    #[arg(long, default_value = "EUR")]
    pub currency: String,
}

fn parse_total(raw: &str) -> Result<i64, String> {
    parse_minor(raw).map_err(|e| e.to_string())
}

#[derive(Serialize)]
#[serde(transparent)]
struct ImportView<'a>(&'a ImportReport);

impl fmt::Display for ImportView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Imported {}: {} new orders, {} already known",
            self.0.customer_id, self.0.orders_added, self.0.orders_known
        )
    }
}

#[derive(Serialize)]
#[serde(transparent)]
struct OrderView<'a>(&'a Order);

impl fmt::Display for OrderView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.0;
        write!(
            f,
            "Order {} ({}) for {}: {} {}",
            o.order_number,
            o.id,
            o.customer_id,
            format_minor(o.total_minor),
            o.currency
        )
    }
}

pub async fn import(client: &DaemonClient, args: ImportArgs, format: OutputFormat) -> Result<()> {
    let report = client.import(&args.customer).await?;
    output::print(&ImportView(&report), format)?;
    Ok(())
}

pub async fn record_order(
    client: &DaemonClient,
    args: RecordOrderArgs,
    format: OutputFormat,
) -> Result<()> {
    let order = client
        .record_order(&args.customer, &args.order_number, args.total, &args.currency)
        .await?;
    output::print(&OrderView(&order), format)?;
    Ok(())
}
