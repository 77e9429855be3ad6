// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic batch jobs

use crate::protocol::{Job, JobReport};
use loy_adapters::CommercePlatform;
use loy_core::config::JobsConfig;
use loy_core::{Clock, IdGen};
use loy_engine::Engine;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Run one job to completion
pub async fn run_job<P, C, I>(engine: &Engine<P, C, I>, job: Job) -> JobReport
where
    P: CommercePlatform,
    C: Clock,
    I: IdGen,
{
    match job {
        Job::Accrual => JobReport::Accrual(engine.run_order_accrual().await),
        Job::Offers => JobReport::Offers(engine.run_offer_eligibility().await),
        Job::Reconcile => JobReport::Reconcile(engine.reconcile_tiers().await),
        Job::Backfill => JobReport::Backfill(engine.backfill_order_ids().await),
        Job::Audit => JobReport::Audit(engine.verify_ledgers()),
    }
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut timer = interval(period.max(Duration::from_secs(1)));
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

/// Spawn the job loop. Accrual is preceded by an order id backfill so the
/// resulting metafield syncs have somewhere to go.
pub fn spawn_schedule<P, C, I>(engine: Engine<P, C, I>, config: &JobsConfig) -> JoinHandle<()>
where
    P: CommercePlatform,
    C: Clock,
    I: IdGen,
{
    let mut accrual = ticker(config.accrual_interval);
    let mut offers = ticker(config.offer_interval);
    let mut reconcile = ticker(config.reconcile_interval);

    tokio::spawn(async move {
        // First tick of an interval completes immediately
        accrual.tick().await;
        offers.tick().await;
        reconcile.tick().await;

        loop {
            tokio::select! {
                _ = accrual.tick() => {
                    run_job(&engine, Job::Backfill).await;
                    run_job(&engine, Job::Accrual).await;
                }
                _ = offers.tick() => {
                    run_job(&engine, Job::Offers).await;
                }
                _ = reconcile.tick() => {
                    run_job(&engine, Job::Reconcile).await;
                }
            }
        }
    })
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
