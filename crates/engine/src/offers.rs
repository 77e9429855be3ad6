// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Offer eligibility batch
//!
//! Grants each point-minting offer at most once per customer. The
//! `has_entry_for` check is a fast path only: the store's unique
//! `(customer, OFFER, offer_id)` key is what actually gates the grant, so
//! overlapping runs cannot double-apply.

use crate::batch::BatchReport;
use crate::error::EngineError;
use crate::runtime::Engine;
use loy_adapters::CommercePlatform;
use loy_core::{
    classify, Clock, Customer, IdGen, LedgerEntry, NewEntry, Offer, SourceKey, SourceType,
};
use loy_storage::StoreError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::Instrument;

/// Outcome of one offer run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferReport {
    pub applied_count: u64,
    /// Pairs already granted, ineligible, or worth zero points
    pub skipped: u64,
    pub failed: u64,
}

impl BatchReport for OfferReport {
    fn merge(&mut self, other: Self) {
        self.applied_count += other.applied_count;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }

    fn unit_lost(&mut self) {
        self.failed += 1;
    }
}

enum Grant {
    Applied(LedgerEntry),
    Skipped(&'static str),
}

impl<P, C, I> Engine<P, C, I>
where
    P: CommercePlatform,
    C: Clock,
    I: IdGen,
{
    /// Evaluate every active offer against every customer with an order
    pub async fn run_offer_eligibility(&self) -> OfferReport {
        let span = tracing::info_span!("offers");
        async {
            let start = std::time::Instant::now();
            let mut report = OfferReport::default();

            let mut offers = Vec::new();
            for offer in self.store.offers() {
                if !offer.active || !offer.offer_type.mints_points() {
                    continue;
                }
                // A malformed ratio is a validation error for the whole offer
                if let Err(e) = offer.points_to_grant(0) {
                    report.failed += 1;
                    tracing::error!(offer_id = %offer.id, error = %e, "offer skipped");
                    continue;
                }
                offers.push(offer);
            }

            let customers = self.store.customers_with_orders(1);
            tracing::info!(offers = offers.len(), customers = customers.len(), "starting");

            if !offers.is_empty() {
                let offers = Arc::new(offers);
                let batch = self
                    .run_batch(customers, move |engine, customer| {
                        let offers = Arc::clone(&offers);
                        async move { engine.apply_offers(customer, &offers).await }
                    })
                    .await;
                report.merge(batch);
            }

            tracing::info!(
                applied = report.applied_count,
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

    async fn apply_offers(&self, customer: Customer, offers: &[Offer]) -> OfferReport {
        let mut report = OfferReport::default();
        let _guard = self.locks.lock(&customer.id).await;
        let customer = self.store.customer(&customer.id).unwrap_or(customer);
        let now = self.clock.now();

        for offer in offers {
            match self.grant_offer(&customer, offer, now) {
                Ok(Grant::Applied(entry)) => {
                    report.applied_count += 1;
                    tracing::info!(
                        customer_id = %customer.id,
                        offer_id = %offer.id,
                        change = entry.change,
                        balance_after = entry.balance_after,
                        "offer applied"
                    );
                }
                Ok(Grant::Skipped(why)) => {
                    report.skipped += 1;
                    tracing::trace!(customer_id = %customer.id, offer_id = %offer.id, why, "skipped");
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        customer_id = %customer.id,
                        offer_id = %offer.id,
                        error = %e,
                        "offer grant failed"
                    );
                }
            }
        }

        if report.applied_count > 0 {
            self.refresh_customer(&customer);
        }
        report
    }

    /// Caller holds the customer lock
    fn grant_offer(
        &self,
        customer: &Customer,
        offer: &Offer,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Grant, EngineError> {
        let key = SourceKey::new(customer.id.clone(), SourceType::Offer, offer.id.as_str());
        if self.store.has_entry_for(&key) {
            return Ok(Grant::Skipped("already applied"));
        }
        let tier = classify(customer.amount_spent_minor).tier;
        if let Err(why) = offer.eligibility(tier, now) {
            tracing::trace!(?why, "ineligible");
            return Ok(Grant::Skipped("ineligible"));
        }
        let points = offer
            .points_to_grant(customer.amount_spent_minor)
            .map_err(|e| EngineError::InvalidOffer(e.to_string()))?;
        if points <= 0 {
            return Ok(Grant::Skipped("nothing to grant"));
        }

        let result = self.with_conflict_retry(|| {
            let balance = self.store.latest_balance(&customer.id);
            let entry = NewEntry::from_balance(
                customer.id.clone(),
                balance,
                points,
                SourceType::Offer,
                offer.id.as_str(),
                format!("Offer: {}", offer.name),
            );
            self.store.append(entry, now)
        });
        match result {
            Ok(entry) => Ok(Grant::Applied(entry)),
            Err(EngineError::Store(StoreError::DuplicateSource(_))) => {
                Ok(Grant::Skipped("already applied"))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[path = "offers_tests.rs"]
mod tests;
