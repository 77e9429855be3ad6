// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state from WAL replay

use crate::operation::Operation;
use loy_core::{
    Customer, CustomerId, CustomerRef, LedgerEntry, Offer, OfferId, Order, OrderId, SourceKey,
};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Materialized state built from WAL operations.
///
/// `apply` never validates: the store checks invariants before an
/// operation reaches the log, and replay trusts the log.
#[derive(Debug, Default)]
pub struct MaterializedState {
    pub customers: HashMap<CustomerId, Customer>,
    /// Platform numeric id -> internal key
    pub external_index: HashMap<String, CustomerId>,
    pub orders: HashMap<OrderId, Order>,
    /// Order ids per customer, in ingestion order
    pub customer_orders: HashMap<CustomerId, Vec<OrderId>>,
    pub offers: BTreeMap<OfferId, Offer>,
    /// Ledger entries per customer, in append order
    pub ledgers: HashMap<CustomerId, Vec<LedgerEntry>>,
    /// Idempotency keys of committed entries whose source type is unique
    pub sources: HashSet<SourceKey>,
    pub last_entry_id: u64,
}

impl MaterializedState {
    pub fn latest_balance(&self, customer_id: &CustomerId) -> i64 {
        self.ledgers
            .get(customer_id)
            .and_then(|entries| entries.last())
            .map(|e| e.balance_after)
            .unwrap_or(0)
    }

    /// Look up a customer by a normalized reference
    pub fn resolve(&self, customer: &CustomerRef) -> Option<&Customer> {
        match customer {
            CustomerRef::Internal(id) => self.customers.get(id),
            CustomerRef::External(ext) => self
                .external_index
                .get(ext)
                .and_then(|id| self.customers.get(id)),
        }
    }

    pub fn orders_of(&self, customer_id: &CustomerId) -> Vec<&Order> {
        self.customer_orders
            .get(customer_id)
            .map(|ids| ids.iter().filter_map(|id| self.orders.get(id)).collect())
            .unwrap_or_default()
    }

    /// Apply an operation to update the state
    pub fn apply(&mut self, op: &Operation) {
        match op {
            Operation::CustomerUpsert { customer } => {
                if let Some(previous) = self.customers.get(&customer.id) {
                    if let Some(old_ext) = &previous.external_id {
                        if customer.external_id.as_ref() != Some(old_ext) {
                            self.external_index.remove(old_ext);
                        }
                    }
                }
                if let Some(ext) = &customer.external_id {
                    self.external_index
                        .insert(ext.clone(), customer.id.clone());
                }
                self.customers.insert(customer.id.clone(), customer.clone());
            }

            Operation::CustomerTier { customer_id, tier } => {
                if let Some(customer) = self.customers.get_mut(customer_id) {
                    customer.tier = *tier;
                }
            }

            Operation::OrderInsert { order } => {
                if self.orders.insert(order.id.clone(), order.clone()).is_none() {
                    self.customer_orders
                        .entry(order.customer_id.clone())
                        .or_default()
                        .push(order.id.clone());
                }
            }

            Operation::OrderExternalId {
                order_id,
                external_id,
            } => {
                if let Some(order) = self.orders.get_mut(order_id) {
                    order.external_id = Some(external_id.clone());
                }
            }

            Operation::OfferUpsert { offer } => {
                self.offers.insert(offer.id.clone(), offer.clone());
            }

            Operation::LedgerAppend { entry } => {
                self.push_entry(entry);
            }

            Operation::OrderAccrued {
                entry,
                order_id,
                points,
            } => {
                self.push_entry(entry);
                if let Some(order) = self.orders.get_mut(order_id) {
                    order.points_earned = Some(*points);
                }
            }
        }
    }

    fn push_entry(&mut self, entry: &LedgerEntry) {
        if entry.source_type.is_unique_per_source() {
            if let Some(key) = entry.source_key() {
                self.sources.insert(key);
            }
        }
        self.last_entry_id = self.last_entry_id.max(entry.id.0);
        self.ledgers
            .entry(entry.customer_id.clone())
            .or_default()
            .push(entry.clone());
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
