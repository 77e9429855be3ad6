// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transactional store over the WAL and materialized state
//!
//! Every mutation validates against the current state, is appended to the
//! WAL, and only then applied in memory, all under one lock. The checks
//! here are the last line of defense for the ledger invariants; callers
//! still serialize per customer so that conflicts stay rare.

use crate::operation::Operation;
use crate::state::MaterializedState;
use crate::wal::{Wal, WalError};
use chrono::{DateTime, Utc};
use loy_core::{
    Customer, CustomerId, CustomerRef, EntryId, LedgerEntry, NewEntry, Offer, OfferId, Order,
    OrderId, SourceKey, SourceType, TierName,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Errors returned by store mutations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("wal error: {0}")]
    Wal(#[from] WalError),
    #[error("ledger conflict for {customer}: balance after should be {expected}, entry has {proposed}")]
    ConcurrencyConflict {
        customer: CustomerId,
        expected: i64,
        proposed: i64,
    },
    #[error("ledger entry already exists for {0}")]
    DuplicateSource(SourceKey),
    #[error("insufficient balance for {customer}: have {balance}, need {requested}")]
    InsufficientBalance {
        customer: CustomerId,
        balance: i64,
        requested: i64,
    },
    #[error("customer not found: {0}")]
    CustomerNotFound(CustomerId),
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),
    #[error("order {order} points changed: expected {expected}, found {found}")]
    OrderPointsConflict {
        order: OrderId,
        expected: i64,
        found: i64,
    },
    #[error("invalid ledger entry: {0}")]
    InvalidEntry(String),
}

impl StoreError {
    /// Whether retrying with a fresh read may succeed
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::ConcurrencyConflict { .. } | StoreError::OrderPointsConflict { .. }
        )
    }
}

/// Row counts for status reporting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub customers: usize,
    pub orders: usize,
    pub offers: usize,
    pub entries: usize,
    pub wal_sequence: u64,
}

struct Inner {
    wal: Option<Wal>,
    state: MaterializedState,
}

impl Inner {
    fn commit(&mut self, op: Operation) -> Result<(), StoreError> {
        if let Some(wal) = self.wal.as_mut() {
            let seq = wal.append(&op)?;
            tracing::trace!(seq, op = op.name(), "wal append");
        }
        self.state.apply(&op);
        Ok(())
    }

    fn check_chain(&self, entry: &NewEntry) -> Result<i64, StoreError> {
        let latest = self.state.latest_balance(&entry.customer_id);
        let expected = latest + entry.change;
        if entry.balance_after != expected {
            return Err(StoreError::ConcurrencyConflict {
                customer: entry.customer_id.clone(),
                expected,
                proposed: entry.balance_after,
            });
        }
        Ok(latest)
    }

    fn build(&self, entry: NewEntry, now: DateTime<Utc>) -> LedgerEntry {
        LedgerEntry {
            id: EntryId(self.state.last_entry_id + 1),
            customer_id: entry.customer_id,
            change: entry.change,
            balance_after: entry.balance_after,
            reason: entry.reason,
            source_type: entry.source_type,
            source_id: entry.source_id,
            metadata: entry.metadata,
            created_at: now,
        }
    }
}

/// Durable loyalty store
pub struct Store {
    inner: Mutex<Inner>,
}

impl Store {
    /// Open the store backed by a WAL file, replaying existing operations
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let (wal, ops) = Wal::open(path)?;
        let mut state = MaterializedState::default();
        for op in &ops {
            state.apply(op);
        }
        tracing::info!(path = %path.display(), replayed = ops.len(), "store opened");
        Ok(Self {
            inner: Mutex::new(Inner {
                wal: Some(wal),
                state,
            }),
        })
    }

    /// Store without durability, for tests and dry runs
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(Inner {
                wal: None,
                state: MaterializedState::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a ledger entry.
    ///
    /// The entry's `balance_after` must chain from the latest committed
    /// balance, and its idempotency key must be unused. ORDER entries are
    /// rejected here; they go through [`Store::append_order_accrual`].
    pub fn append(&self, entry: NewEntry, now: DateTime<Utc>) -> Result<LedgerEntry, StoreError> {
        let mut inner = self.lock();

        if entry.source_type == SourceType::Order {
            return Err(StoreError::InvalidEntry(
                "order entries must be appended with their order points".to_string(),
            ));
        }
        if !inner.state.customers.contains_key(&entry.customer_id) {
            return Err(StoreError::CustomerNotFound(entry.customer_id));
        }
        if entry.source_type.is_unique_per_source() {
            match entry.source_key() {
                Some(key) if inner.state.sources.contains(&key) => {
                    return Err(StoreError::DuplicateSource(key));
                }
                Some(_) => {}
                None => {
                    return Err(StoreError::InvalidEntry(format!(
                        "{} entry needs a source id",
                        entry.source_type
                    )));
                }
            }
        }

        let latest = inner.check_chain(&entry)?;
        let debits = matches!(
            entry.source_type,
            SourceType::Redemption | SourceType::ManualAdjustment
        );
        if debits && entry.change < 0 && entry.balance_after < 0 {
            return Err(StoreError::InsufficientBalance {
                customer: entry.customer_id,
                balance: latest,
                requested: -entry.change,
            });
        }

        let committed = inner.build(entry, now);
        inner.commit(Operation::LedgerAppend {
            entry: committed.clone(),
        })?;
        Ok(committed)
    }

    /// Append an ORDER delta entry and record the order's new points in
    /// one operation.
    ///
    /// `expected_previous` is the points value the caller computed the
    /// delta from; the write is refused if the order moved since. A
    /// negative delta is refused when it would overdraw the balance.
    pub fn append_order_accrual(
        &self,
        order_id: &OrderId,
        expected_previous: i64,
        new_points: i64,
        entry: NewEntry,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntry, StoreError> {
        let mut inner = self.lock();

        let order = inner
            .state
            .orders
            .get(order_id)
            .ok_or_else(|| StoreError::OrderNotFound(order_id.clone()))?;
        if order.customer_id != entry.customer_id || entry.source_type != SourceType::Order {
            return Err(StoreError::InvalidEntry(format!(
                "entry does not belong to order {}",
                order_id
            )));
        }
        let found = order.recorded_points();
        if found != expected_previous {
            return Err(StoreError::OrderPointsConflict {
                order: order_id.clone(),
                expected: expected_previous,
                found,
            });
        }
        if entry.change != new_points - expected_previous {
            return Err(StoreError::InvalidEntry(format!(
                "change {} is not the delta {} -> {}",
                entry.change, expected_previous, new_points
            )));
        }
        let latest = inner.check_chain(&entry)?;
        // A lowered multiplier may claw points back, but not past zero
        if entry.change < 0 && entry.balance_after < 0 {
            return Err(StoreError::InsufficientBalance {
                customer: entry.customer_id,
                balance: latest,
                requested: -entry.change,
            });
        }

        let committed = inner.build(entry, now);
        inner.commit(Operation::OrderAccrued {
            entry: committed.clone(),
            order_id: order_id.clone(),
            points: new_points,
        })?;
        Ok(committed)
    }

    pub fn latest_balance(&self, customer_id: &CustomerId) -> i64 {
        self.lock().state.latest_balance(customer_id)
    }

    pub fn has_entry_for(&self, key: &SourceKey) -> bool {
        self.lock().state.sources.contains(key)
    }

    /// All entries for a customer, in append order
    pub fn entries(&self, customer_id: &CustomerId) -> Vec<LedgerEntry> {
        self.lock()
            .state
            .ledgers
            .get(customer_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Entries created at or after `since`
    pub fn entries_since(&self, customer_id: &CustomerId, since: DateTime<Utc>) -> Vec<LedgerEntry> {
        self.lock()
            .state
            .ledgers
            .get(customer_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.created_at >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Customers that have at least one ledger entry, sorted
    pub fn ledger_customers(&self) -> Vec<CustomerId> {
        let inner = self.lock();
        let mut ids: Vec<CustomerId> = inner.state.ledgers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn customer(&self, customer_id: &CustomerId) -> Option<Customer> {
        self.lock().state.customers.get(customer_id).cloned()
    }

    pub fn resolve_customer(&self, customer: &CustomerRef) -> Option<Customer> {
        self.lock().state.resolve(customer).cloned()
    }

    /// All customers, sorted by id
    pub fn customers(&self) -> Vec<Customer> {
        let inner = self.lock();
        let mut customers: Vec<Customer> = inner.state.customers.values().cloned().collect();
        customers.sort_by(|a, b| a.id.cmp(&b.id));
        customers
    }

    /// Customers with at least `min_orders` orders, sorted by id
    pub fn customers_with_orders(&self, min_orders: usize) -> Vec<Customer> {
        let inner = self.lock();
        let mut customers: Vec<Customer> = inner
            .state
            .customers
            .values()
            .filter(|c| {
                inner
                    .state
                    .customer_orders
                    .get(&c.id)
                    .is_some_and(|orders| orders.len() >= min_orders)
            })
            .cloned()
            .collect();
        customers.sort_by(|a, b| a.id.cmp(&b.id));
        customers
    }

    pub fn orders_for(&self, customer_id: &CustomerId) -> Vec<Order> {
        self.lock()
            .state
            .orders_of(customer_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn order(&self, order_id: &OrderId) -> Option<Order> {
        self.lock().state.orders.get(order_id).cloned()
    }

    /// Orders whose platform id has not been resolved yet, sorted by id
    pub fn orders_missing_external_id(&self) -> Vec<Order> {
        let inner = self.lock();
        let mut orders: Vec<Order> = inner
            .state
            .orders
            .values()
            .filter(|o| o.external_id.is_none())
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.id.cmp(&b.id));
        orders
    }

    /// Insert or replace a customer record
    pub fn upsert_customer(&self, customer: Customer) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.state.customers.get(&customer.id) == Some(&customer) {
            return Ok(());
        }
        inner.commit(Operation::CustomerUpsert { customer })
    }

    /// Insert an order. Returns `false` when the order is already known,
    /// leaving the stored copy (and its recorded points) untouched.
    pub fn insert_order(&self, order: Order) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        if inner.state.orders.contains_key(&order.id) {
            return Ok(false);
        }
        if !inner.state.customers.contains_key(&order.customer_id) {
            return Err(StoreError::CustomerNotFound(order.customer_id));
        }
        inner.commit(Operation::OrderInsert { order })?;
        Ok(true)
    }

    /// Record an order's platform id. Set once: returns `false` if the
    /// order already has one.
    pub fn set_order_external_id(
        &self,
        order_id: &OrderId,
        external_id: impl Into<String>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let order = inner
            .state
            .orders
            .get(order_id)
            .ok_or_else(|| StoreError::OrderNotFound(order_id.clone()))?;
        if order.external_id.is_some() {
            return Ok(false);
        }
        inner.commit(Operation::OrderExternalId {
            order_id: order_id.clone(),
            external_id: external_id.into(),
        })?;
        Ok(true)
    }

    /// Write back a customer's classified tier. Returns whether it changed.
    pub fn set_customer_tier(
        &self,
        customer_id: &CustomerId,
        tier: TierName,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let customer = inner
            .state
            .customers
            .get(customer_id)
            .ok_or_else(|| StoreError::CustomerNotFound(customer_id.clone()))?;
        if customer.tier == tier {
            return Ok(false);
        }
        inner.commit(Operation::CustomerTier {
            customer_id: customer_id.clone(),
            tier,
        })?;
        Ok(true)
    }

    /// Insert or replace an offer. Returns `false` if it was unchanged.
    pub fn upsert_offer(&self, offer: Offer) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        if inner.state.offers.get(&offer.id) == Some(&offer) {
            return Ok(false);
        }
        inner.commit(Operation::OfferUpsert { offer })?;
        Ok(true)
    }

    /// All offers, sorted by id
    pub fn offers(&self) -> Vec<Offer> {
        self.lock().state.offers.values().cloned().collect()
    }

    pub fn offer(&self, offer_id: &OfferId) -> Option<Offer> {
        self.lock().state.offers.get(offer_id).cloned()
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.lock();
        StoreStats {
            customers: inner.state.customers.len(),
            orders: inner.state.orders.len(),
            offers: inner.state.offers.len(),
            entries: inner.state.ledgers.values().map(Vec::len).sum(),
            wal_sequence: inner.wal.as_ref().map(Wal::sequence).unwrap_or(0),
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
