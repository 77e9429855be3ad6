// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tier queries, ledger reads, audit and manual adjustments

use crate::error::EngineError;
use crate::runtime::Engine;
use crate::sync::SyncTask;
use chrono::{DateTime, Utc};
use loy_adapters::CommercePlatform;
use loy_core::{
    progress, verify_chain, Clock, CustomerId, EntryId, IdGen, LedgerEntry, Multiplier, NewEntry,
    SourceType, TierName,
};
use loy_storage::StoreError;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

/// A customer's tier standing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierStatus {
    pub customer_id: CustomerId,
    pub tier: TierName,
    pub multiplier: Multiplier,
    pub next_tier: Option<TierName>,
    /// Spend (minor units) still needed for the next tier
    pub points_to_next: Option<i64>,
    pub lifetime_spend_minor: i64,
    pub balance: i64,
}

/// Outcome of a tier reconciliation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub checked: u64,
    pub changed: u64,
    pub failed: u64,
}

/// A break in a customer's balance chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerViolation {
    pub customer_id: CustomerId,
    pub entry: EntryId,
    pub expected: i64,
    pub found: i64,
}

/// Outcome of a ledger audit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub customers_checked: u64,
    pub entries_checked: u64,
    pub violations: Vec<LedgerViolation>,
}

impl<P, C, I> Engine<P, C, I>
where
    P: CommercePlatform,
    C: Clock,
    I: IdGen,
{
    /// Tier, multiplier and distance to the next tier, from lifetime spend
    pub fn current_tier(&self, customer: &str) -> Result<TierStatus, EngineError> {
        let customer = self.resolve(customer)?;
        let standing = progress(customer.amount_spent_minor);
        Ok(TierStatus {
            balance: self.store.latest_balance(&customer.id),
            customer_id: customer.id,
            tier: standing.tier,
            multiplier: standing.multiplier,
            next_tier: standing.next,
            points_to_next: standing.to_next_minor,
            lifetime_spend_minor: customer.amount_spent_minor,
        })
    }

    /// All ledger entries for a customer, oldest first
    pub fn ledger_history(&self, customer: &str) -> Result<Vec<LedgerEntry>, EngineError> {
        let customer = self.resolve(customer)?;
        Ok(self.store.entries(&customer.id))
    }

    /// Entries created at or after `since`
    pub fn ledger_since(
        &self,
        customer: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<LedgerEntry>, EngineError> {
        let customer = self.resolve(customer)?;
        Ok(self.store.entries_since(&customer.id, since))
    }

    /// Recompute every customer's tier from lifetime spend and write back
    /// the ones that drifted. Never touches the ledger.
    pub async fn reconcile_tiers(&self) -> ReconcileReport {
        let span = tracing::info_span!("reconcile");
        async {
            let start = std::time::Instant::now();
            let mut report = ReconcileReport::default();
            for customer in self.store.customers() {
                report.checked += 1;
                let tier = loy_core::classify(customer.amount_spent_minor).tier;
                match self.store.set_customer_tier(&customer.id, tier) {
                    Ok(true) => {
                        report.changed += 1;
                        tracing::info!(
                            customer_id = %customer.id,
                            from = %customer.tier,
                            to = %tier,
                            "tier corrected"
                        );
                        self.sync.enqueue(SyncTask::CustomerProfile {
                            customer_id: customer.id.clone(),
                        });
                    }
                    Ok(false) => {}
                    Err(e) => {
                        report.failed += 1;
                        tracing::error!(customer_id = %customer.id, error = %e, "tier write failed");
                    }
                }
            }
            tracing::info!(
                checked = report.checked,
                changed = report.changed,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "completed"
            );
            report
        }
        .instrument(span)
        .await
    }

    /// Check the balance chain of every ledger
    pub fn verify_ledgers(&self) -> AuditReport {
        let mut report = AuditReport::default();
        for customer_id in self.store.ledger_customers() {
            let entries = self.store.entries(&customer_id);
            report.customers_checked += 1;
            report.entries_checked += entries.len() as u64;
            if let Err(violation) = verify_chain(&entries) {
                tracing::error!(customer_id = %customer_id, %violation, "ledger chain broken");
                report.violations.push(LedgerViolation {
                    customer_id,
                    entry: violation.entry,
                    expected: violation.expected,
                    found: violation.found,
                });
            }
        }
        tracing::info!(
            customers = report.customers_checked,
            entries = report.entries_checked,
            violations = report.violations.len(),
            "ledger audit completed"
        );
        report
    }

    /// Append a MANUAL_ADJUSTMENT entry keyed by `adjustment_id`
    pub async fn adjust_points(
        &self,
        customer: &str,
        change: i64,
        reason: &str,
        adjustment_id: &str,
    ) -> Result<LedgerEntry, EngineError> {
        if change == 0 {
            return Err(EngineError::ZeroAdjustment);
        }
        let customer = self.resolve(customer)?;
        let guard = self.locks.lock(&customer.id).await;

        let result = self.with_conflict_retry(|| {
            let balance = self.store.latest_balance(&customer.id);
            let entry = NewEntry::from_balance(
                customer.id.clone(),
                balance,
                change,
                SourceType::ManualAdjustment,
                adjustment_id,
                reason,
            );
            self.store.append(entry, self.clock.now())
        });
        drop(guard);

        let entry = match result {
            Ok(entry) => entry,
            Err(EngineError::Store(StoreError::DuplicateSource(_))) => {
                return Err(EngineError::DuplicateAdjustment(adjustment_id.to_string()));
            }
            Err(EngineError::Store(StoreError::InsufficientBalance { balance, .. })) => {
                return Err(EngineError::NegativeBalance { balance, change });
            }
            Err(e) => return Err(e),
        };

        tracing::info!(
            customer_id = %customer.id,
            adjustment_id,
            change,
            balance_after = entry.balance_after,
            "points adjusted"
        );
        self.sync.enqueue(SyncTask::CustomerProfile {
            customer_id: customer.id,
        });
        Ok(entry)
    }
}

#[cfg(test)]
#[path = "tiers_tests.rs"]
mod tests;
