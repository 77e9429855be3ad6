// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run a batch job on demand

use std::fmt;

use anyhow::Result;
use clap::{Args, ValueEnum};
use loy_daemon::{Job, JobReport};
use serde::Serialize;

use crate::client::DaemonClient;
use crate::output::{self, OutputFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum JobArg {
    /// Credit points for orders at the current tier
    Accrual,
    /// Grant points-minting offers to eligible customers
    Offers,
    /// Recompute stored tiers from lifetime spend
    Reconcile,
    /// Resolve platform ids for orders recorded without one
    Backfill,
    /// Verify every customer's balance chain
    Audit,
}

impl From<JobArg> for Job {
    fn from(arg: JobArg) -> Self {
        match arg {
            JobArg::Accrual => Job::Accrual,
            JobArg::Offers => Job::Offers,
            JobArg::Reconcile => Job::Reconcile,
            JobArg::Backfill => Job::Backfill,
            JobArg::Audit => Job::Audit,
        }
    }
}

#[derive(Args)]
pub struct RunArgs {
    #[arg(value_enum)]
    pub job: JobArg,
}

#[derive(Serialize)]
#[serde(transparent)]
struct ReportView(JobReport);

impl fmt::Display for ReportView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            JobReport::Accrual(r) => write!(
                f,
                "accrual: {} orders processed, {} updated, {} unchanged, {} failed",
                r.processed, r.updated, r.skipped, r.failed
            ),
            JobReport::Offers(r) => write!(
                f,
                "offers: {} applied, {} skipped, {} failed",
                r.applied_count, r.skipped, r.failed
            ),
            JobReport::Reconcile(r) => write!(
                f,
                "reconcile: {} customers checked, {} changed, {} failed",
                r.checked, r.changed, r.failed
            ),
            JobReport::Backfill(r) => write!(
                f,
                "backfill: {} orders checked, {} resolved, {} missing, {} failed",
                r.checked, r.resolved, r.missing, r.failed
            ),
            JobReport::Audit(r) => {
                write!(
                    f,
                    "audit: {} customers, {} entries, {} violations",
                    r.customers_checked,
                    r.entries_checked,
                    r.violations.len()
                )?;
                for v in &r.violations {
                    write!(
                        f,
                        "\n  {} at {}: expected balance {}, found {}",
                        v.customer_id, v.entry, v.expected, v.found
                    )?;
                }
                Ok(())
            }
        }
    }
}

pub async fn run(client: &DaemonClient, args: RunArgs, format: OutputFormat) -> Result<()> {
    let report = client.run_job(args.job.into()).await?;
    let failed = matches!(&report, JobReport::Audit(r) if !r.violations.is_empty());
    output::print(&ReportView(report), format)?;
    if failed {
        anyhow::bail!("ledger audit found violations");
    }
    Ok(())
}
