// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-order point accrual
//!
//! Points for an order are `floor(total * multiplier)` at the customer's
//! current tier. The order remembers what it was last credited, and each
//! run appends only the difference, so re-running after a tier change
//! corrects the ledger without double-counting.

use crate::batch::BatchReport;
use crate::error::EngineError;
use crate::runtime::Engine;
use crate::sync::SyncTask;
use loy_adapters::CommercePlatform;
use loy_core::{
    classify, Clock, Customer, IdGen, LedgerEntry, Multiplier, NewEntry, Order, SourceType,
};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

/// Outcome of one accrual run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualReport {
    /// Orders examined
    pub processed: u64,
    /// Orders that received a delta entry
    pub updated: u64,
    /// Orders already credited with the computed value
    pub skipped: u64,
    pub failed: u64,
}

impl BatchReport for AccrualReport {
    fn merge(&mut self, other: Self) {
        self.processed += other.processed;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }

    fn unit_lost(&mut self) {
        self.failed += 1;
    }
}

/// Minimum number of orders before a customer accrues points
pub const MIN_ORDERS_FOR_ACCRUAL: usize = 2;

impl<P, C, I> Engine<P, C, I>
where
    P: CommercePlatform,
    C: Clock,
    I: IdGen,
{
    /// Credit every order of every customer with more than one order
    pub async fn run_order_accrual(&self) -> AccrualReport {
        let span = tracing::info_span!("accrual");
        async {
            let start = std::time::Instant::now();
            let customers = self.store.customers_with_orders(MIN_ORDERS_FOR_ACCRUAL);
            tracing::info!(customers = customers.len(), "starting");

            let report = self
                .run_batch(customers, |engine, customer| async move {
                    engine.accrue_customer(customer).await
                })
                .await;

            tracing::info!(
                processed = report.processed,
                updated = report.updated,
                skipped = report.skipped,
                failed = report.failed,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "completed"
            );
            report
        }
        .instrument(span)
        .await
    }

    async fn accrue_customer(&self, customer: Customer) -> AccrualReport {
        let mut report = AccrualReport::default();
        let _guard = self.locks.lock(&customer.id).await;

        // Spend may have moved since the batch listed customers
        let customer = self.store.customer(&customer.id).unwrap_or(customer);
        let multiplier = classify(customer.amount_spent_minor).multiplier;

        for order in self.store.orders_for(&customer.id) {
            report.processed += 1;
            match self.accrue_order(&order, multiplier) {
                Ok(Some(entry)) => {
                    report.updated += 1;
                    tracing::info!(
                        customer_id = %customer.id,
                        order_id = %order.id,
                        change = entry.change,
                        balance_after = entry.balance_after,
                        "order credited"
                    );
                    self.sync.enqueue(SyncTask::OrderPoints {
                        order_id: order.id.clone(),
                    });
                }
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        customer_id = %customer.id,
                        order_id = %order.id,
                        error = %e,
                        "order accrual failed"
                    );
                }
            }
        }

        if report.updated > 0 {
            self.refresh_customer(&customer);
        }
        report
    }

    /// Append the delta for one order; `None` when nothing changed.
    ///
    /// Caller holds the customer lock.
    fn accrue_order(
        &self,
        order: &Order,
        multiplier: Multiplier,
    ) -> Result<Option<LedgerEntry>, EngineError> {
        let computed = multiplier.points_for(order.total_minor);
        self.with_conflict_retry(|| {
            let current = self.store.order(&order.id).unwrap_or_else(|| order.clone());
            let previous = current.recorded_points();
            if previous == computed {
                return Ok(None);
            }
            let balance = self.store.latest_balance(&order.customer_id);
            let entry = NewEntry::from_balance(
                order.customer_id.clone(),
                balance,
                computed - previous,
                SourceType::Order,
                order.id.as_str(),
                format!("Order {} at x{}", order.order_number, multiplier),
            )
            .with_metadata("order_number", order.order_number.clone())
            .with_metadata("points_total", computed.to_string());
            self.store
                .append_order_accrual(&order.id, previous, computed, entry, self.clock.now())
                .map(Some)
        })
    }
}

#[cfg(test)]
#[path = "accrual_tests.rs"]
mod tests;
