// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine that owns the ledger-producing operations

use crate::error::EngineError;
use crate::locks::CustomerLocks;
use crate::sync::{SyncHandle, SyncStats, SyncTask};
use loy_adapters::CommercePlatform;
use loy_core::{normalize_customer_ref, Clock, Customer, IdGen, LoyaltyConfig, RewardCatalog};
use loy_storage::{Store, StoreError, StoreStats};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Engine tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Customers processed concurrently within one batch run
    pub parallelism: usize,
    /// Shards in the per-customer lock table
    pub lock_shards: usize,
    /// Internal retries after a ledger concurrency conflict
    pub conflict_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallelism: 8,
            lock_shards: 64,
            conflict_retries: 3,
        }
    }
}

impl From<&LoyaltyConfig> for EngineConfig {
    fn from(config: &LoyaltyConfig) -> Self {
        Self {
            parallelism: config.jobs.parallelism,
            lock_shards: config.jobs.lock_shards,
            conflict_retries: config.redemption.conflict_retries,
        }
    }
}

/// Engine dependencies
pub struct EngineDeps<P> {
    pub store: Arc<Store>,
    pub platform: P,
    pub catalog: RewardCatalog,
    pub sync: SyncHandle,
}

/// Point-in-time engine counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub store: StoreStats,
    pub sync: SyncStats,
    pub rewards: usize,
}

/// The loyalty engine.
///
/// Cheap to clone; batch runs hand a clone to each customer task.
pub struct Engine<P, C, I> {
    pub(crate) store: Arc<Store>,
    pub(crate) platform: P,
    pub(crate) clock: C,
    pub(crate) id_gen: I,
    pub(crate) catalog: Arc<RewardCatalog>,
    pub(crate) locks: Arc<CustomerLocks>,
    pub(crate) sync: SyncHandle,
    pub(crate) config: EngineConfig,
}

impl<P: Clone, C: Clone, I: Clone> Clone for Engine<P, C, I> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            platform: self.platform.clone(),
            clock: self.clock.clone(),
            id_gen: self.id_gen.clone(),
            catalog: Arc::clone(&self.catalog),
            locks: Arc::clone(&self.locks),
            sync: self.sync.clone(),
            config: self.config,
        }
    }
}

impl<P, C, I> Engine<P, C, I>
where
    P: CommercePlatform,
    C: Clock,
    I: IdGen,
{
    pub fn new(deps: EngineDeps<P>, clock: C, id_gen: I, config: EngineConfig) -> Self {
        Self {
            store: deps.store,
            platform: deps.platform,
            clock,
            id_gen,
            catalog: Arc::new(deps.catalog),
            locks: Arc::new(CustomerLocks::new(config.lock_shards)),
            sync: deps.sync,
            config,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn catalog(&self) -> &RewardCatalog {
        &self.catalog
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            store: self.store.stats(),
            sync: self.sync.stats(),
            rewards: self.catalog.len(),
        }
    }

    /// Resolve a caller-supplied customer identifier in any accepted form
    pub(crate) fn resolve(&self, raw: &str) -> Result<Customer, EngineError> {
        let customer_ref = normalize_customer_ref(raw)?;
        self.store
            .resolve_customer(&customer_ref)
            .ok_or_else(|| EngineError::CustomerNotFound(raw.trim().to_string()))
    }

    /// Run a store write, retrying conflicts with a fresh read.
    ///
    /// `attempt` must re-read whatever balance or order state it depends
    /// on; it is called once per try.
    pub(crate) fn with_conflict_retry<T>(
        &self,
        mut attempt: impl FnMut() -> Result<T, StoreError>,
    ) -> Result<T, EngineError> {
        let budget = self.config.conflict_retries + 1;
        for n in 1..=budget {
            match attempt() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_conflict() && n < budget => {
                    tracing::warn!(attempt = n, error = %e, "ledger conflict, retrying");
                }
                Err(e) if e.is_conflict() => {
                    tracing::error!(attempts = n, error = %e, "ledger conflict retries exhausted");
                    return Err(EngineError::ConflictRetriesExhausted(n));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(EngineError::ConflictRetriesExhausted(budget))
    }

    /// Write back the classified tier; queue a profile sync either way
    pub(crate) fn refresh_customer(&self, customer: &Customer) {
        let tier = loy_core::classify(customer.amount_spent_minor).tier;
        match self.store.set_customer_tier(&customer.id, tier) {
            Ok(true) => tracing::info!(customer_id = %customer.id, %tier, "tier changed"),
            Ok(false) => {}
            Err(e) => tracing::warn!(customer_id = %customer.id, error = %e, "tier write-back failed"),
        }
        self.sync.enqueue(SyncTask::CustomerProfile {
            customer_id: customer.id.clone(),
        });
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
