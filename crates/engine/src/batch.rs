// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded fan-out over customers for batch jobs
//!
//! Each unit is independent and idempotent, so dropping the returned
//! future mid-run (which aborts the `JoinSet`) leaves a valid ledger and
//! the next run picks up where this one stopped.

use crate::runtime::Engine;
use loy_adapters::CommercePlatform;
use loy_core::{Clock, IdGen};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Per-run counters that can be summed across units
pub trait BatchReport: Default + Send + 'static {
    fn merge(&mut self, other: Self);

    /// A unit task panicked or was cancelled
    fn unit_lost(&mut self);
}

impl<P, C, I> Engine<P, C, I>
where
    P: CommercePlatform,
    C: Clock,
    I: IdGen,
{
    /// Run `unit` for every item with at most `parallelism` in flight
    pub(crate) async fn run_batch<T, R, F, Fut>(&self, items: Vec<T>, unit: F) -> R
    where
        T: Send + 'static,
        R: BatchReport,
        F: Fn(Self, T) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.config.parallelism.max(1)));
        let mut tasks = JoinSet::new();
        let mut report = R::default();

        for item in items {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let engine = self.clone();
            let unit = unit.clone();
            tasks.spawn(async move {
                let _permit = permit;
                unit(engine, item).await
            });

            // Fold finished units as we go so the set stays small
            while let Some(done) = tasks.try_join_next() {
                fold(&mut report, done);
            }
        }

        while let Some(done) = tasks.join_next().await {
            fold(&mut report, done);
        }
        report
    }
}

fn fold<R: BatchReport>(report: &mut R, done: Result<R, tokio::task::JoinError>) {
    match done {
        Ok(unit) => report.merge(unit),
        Err(e) => {
            tracing::error!(error = %e, "batch unit task failed");
            report.unit_lost();
        }
    }
}
