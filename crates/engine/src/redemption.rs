// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Point redemption
//!
//! ```text
//! REQUESTED -> VALIDATED -> CODE_ISSUED -> LEDGER_COMMITTED -> SYNCED
//!     \
//!      -> REJECTED
//! ```
//!
//! The customer lock is held from the balance read through the ledger
//! append, including the discount issuance call, so a concurrent request
//! for the same customer sees the post-redemption balance. The profile
//! sync is queued after the lock is released.

use crate::error::RedeemError;
use crate::runtime::Engine;
use crate::sync::SyncTask;
use loy_adapters::{CommercePlatform, DiscountRequest};
use loy_core::{
    normalize_customer_ref, Clock, CustomerId, IdGen, LedgerEntry, NewEntry, RedemptionId,
    RewardId, SourceType,
};
use loy_storage::StoreError;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

/// A completed redemption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    pub redemption_id: RedemptionId,
    pub customer_id: CustomerId,
    pub reward_id: RewardId,
    pub code: String,
    pub new_balance: i64,
    pub entry: LedgerEntry,
}

impl<P, C, I> Engine<P, C, I>
where
    P: CommercePlatform,
    C: Clock,
    I: IdGen,
{
    /// Redeem a reward for a customer identified in any accepted form
    pub async fn redeem(
        &self,
        customer: &str,
        reward_id: &RewardId,
    ) -> Result<Redemption, RedeemError> {
        let span = tracing::info_span!("redeem", customer, reward_id = %reward_id);
        async {
            tracing::info!(state = "REQUESTED", "redemption requested");
            let start = std::time::Instant::now();
            let result = self.redeem_inner(customer, reward_id).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(done) => tracing::info!(
                    state = "LEDGER_COMMITTED",
                    customer_id = %done.customer_id,
                    new_balance = done.new_balance,
                    elapsed_ms,
                    "redeemed"
                ),
                Err(e) => tracing::warn!(
                    state = "REJECTED",
                    reason = e.reason(),
                    error = %e,
                    elapsed_ms,
                    "redemption failed"
                ),
            }
            if let Ok(done) = &result {
                self.sync.enqueue(SyncTask::CustomerProfile {
                    customer_id: done.customer_id.clone(),
                });
                tracing::debug!(state = "SYNCED", "profile sync queued");
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn redeem_inner(
        &self,
        raw_customer: &str,
        reward_id: &RewardId,
    ) -> Result<Redemption, RedeemError> {
        let not_found = || RedeemError::CustomerNotFound(raw_customer.trim().to_string());
        let customer_ref = normalize_customer_ref(raw_customer).map_err(|_| not_found())?;
        let customer = self
            .store
            .resolve_customer(&customer_ref)
            .ok_or_else(not_found)?;
        let reward = self
            .catalog
            .get(reward_id)
            .cloned()
            .ok_or_else(|| RedeemError::InvalidReward(reward_id.clone()))?;

        let _guard = self.locks.lock(&customer.id).await;
        let redemption_id = self.id_gen.next_redemption();
        let budget = self.config.conflict_retries + 1;
        let mut code: Option<String> = None;

        for attempt in 1..=budget {
            let balance = self.store.latest_balance(&customer.id);
            if balance < reward.points_cost {
                if code.is_some() {
                    tracing::error!(redemption_id = %redemption_id, "issued code left unconsumed");
                }
                return Err(RedeemError::InsufficientPoints {
                    balance,
                    cost: reward.points_cost,
                });
            }
            tracing::info!(state = "VALIDATED", balance, cost = reward.points_cost);

            let issued = match &code {
                Some(existing) => existing.clone(),
                None => {
                    let request = DiscountRequest {
                        title: reward.title.clone(),
                        value_minor: reward.value_minor,
                        currency: reward.currency.clone(),
                    };
                    let fresh = self
                        .platform
                        .issue_discount_code(&request)
                        .await
                        .map_err(RedeemError::CodeIssuanceFailed)?;
                    tracing::info!(state = "CODE_ISSUED", "discount code issued");
                    code = Some(fresh.clone());
                    fresh
                }
            };

            let entry = NewEntry::from_balance(
                customer.id.clone(),
                balance,
                -reward.points_cost,
                SourceType::Redemption,
                redemption_id.as_str(),
                format!("Redeemed {}", reward.title),
            )
            .with_metadata("reward_id", reward.id.as_str())
            .with_metadata("code", issued.clone());

            match self.store.append(entry, self.clock.now()) {
                Ok(entry) => {
                    return Ok(Redemption {
                        redemption_id,
                        customer_id: customer.id.clone(),
                        reward_id: reward.id.clone(),
                        code: issued,
                        new_balance: entry.balance_after,
                        entry,
                    });
                }
                Err(e) if e.is_conflict() && attempt < budget => {
                    tracing::warn!(attempt, error = %e, "ledger conflict, re-reading balance");
                }
                Err(e) if e.is_conflict() => {
                    tracing::error!(redemption_id = %redemption_id, "issued code left unconsumed");
                    return Err(RedeemError::Conflict(attempt));
                }
                Err(StoreError::InsufficientBalance { balance, .. }) => {
                    tracing::error!(redemption_id = %redemption_id, "issued code left unconsumed");
                    return Err(RedeemError::InsufficientPoints {
                        balance,
                        cost: reward.points_cost,
                    });
                }
                Err(e) => return Err(RedeemError::Store(e)),
            }
        }
        Err(RedeemError::Conflict(budget))
    }
}

#[cfg(test)]
#[path = "redemption_tests.rs"]
mod tests;
