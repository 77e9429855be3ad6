// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Customer and order ingestion from the commerce platform

use crate::error::EngineError;
use crate::runtime::Engine;
use crate::sync::SyncTask;
use loy_adapters::{CommercePlatform, PlatformOrder};
use loy_core::{
    classify, normalize_customer_ref, Clock, Customer, CustomerId, CustomerRef, IdGen, Order,
    OrderId,
};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

/// Outcome of importing one customer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub customer_id: CustomerId,
    pub orders_added: u64,
    pub orders_known: u64,
}

/// Outcome of an order id backfill run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillReport {
    pub checked: u64,
    pub resolved: u64,
    /// Orders the platform has no match for
    pub missing: u64,
    pub failed: u64,
}

fn internal_customer_id(external_id: &str) -> CustomerId {
    CustomerId::new(format!("cus-{}", external_id))
}

fn order_from_platform(customer_id: &CustomerId, order: PlatformOrder) -> Order {
    Order {
        id: OrderId::new(format!("ord-{}", order.external_id)),
        customer_id: customer_id.clone(),
        order_number: order.order_number,
        total_minor: order.total_minor,
        currency: order.currency,
        created_at: order.created_at,
        points_earned: None,
        external_id: Some(order.external_id),
    }
}

impl<P, C, I> Engine<P, C, I>
where
    P: CommercePlatform,
    C: Clock,
    I: IdGen,
{
    /// Pull a customer and their orders from the platform.
    ///
    /// Known orders are left alone so their recorded points survive.
    pub async fn import_customer(&self, customer: &str) -> Result<ImportReport, EngineError> {
        let external_id = match normalize_customer_ref(customer)? {
            CustomerRef::External(ext) => ext,
            internal @ CustomerRef::Internal(_) => self
                .store
                .resolve_customer(&internal)
                .and_then(|c| c.external_id)
                .ok_or_else(|| EngineError::CustomerNotFound(customer.trim().to_string()))?,
        };
        let span = tracing::info_span!("import", external_id = %external_id);
        async {
            let remote = self.platform.get_customer(&external_id).await?;
            let orders = self.platform.get_orders(&external_id).await?;

            let existing = self
                .store
                .resolve_customer(&CustomerRef::External(external_id.clone()));
            let customer_id = existing
                .as_ref()
                .map(|c| c.id.clone())
                .unwrap_or_else(|| internal_customer_id(&external_id));

            let _guard = self.locks.lock(&customer_id).await;
            let record = Customer {
                id: customer_id.clone(),
                external_id: Some(external_id.clone()),
                amount_spent_minor: remote.lifetime_spend_minor,
                // Tier write-back happens in refresh_customer
                tier: existing
                    .map(|c| c.tier)
                    .unwrap_or_else(|| classify(remote.lifetime_spend_minor).tier),
                tags: remote.tags,
            };
            self.store.upsert_customer(record.clone())?;

            let mut report = ImportReport {
                customer_id: customer_id.clone(),
                orders_added: 0,
                orders_known: 0,
            };
            for order in orders {
                if self.store.insert_order(order_from_platform(&customer_id, order))? {
                    report.orders_added += 1;
                } else {
                    report.orders_known += 1;
                }
            }
            self.refresh_customer(&record);

            tracing::info!(
                customer_id = %customer_id,
                orders_added = report.orders_added,
                orders_known = report.orders_known,
                "customer imported"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    /// Record a locally captured order and add it to the customer's
    /// lifetime spend. The platform id is filled in later by
    /// [`Engine::backfill_order_ids`].
    pub async fn record_order(
        &self,
        customer: &str,
        order_number: &str,
        total_minor: i64,
        currency: &str,
    ) -> Result<Order, EngineError> {
        if total_minor <= 0 {
            return Err(EngineError::InvalidAmount(total_minor));
        }
        let customer = self.resolve(customer)?;
        let _guard = self.locks.lock(&customer.id).await;
        let mut customer = self.store.customer(&customer.id).unwrap_or(customer);

        let number = order_number.trim().trim_start_matches('#');
        let order = Order {
            id: OrderId::new(format!("ord-{}-{}", customer.id, number)),
            customer_id: customer.id.clone(),
            order_number: order_number.trim().to_string(),
            total_minor,
            currency: currency.to_string(),
            created_at: self.clock.now(),
            points_earned: None,
            external_id: None,
        };
        if !self.store.insert_order(order.clone())? {
            tracing::debug!(order_id = %order.id, "order already recorded");
            return Ok(self.store.order(&order.id).unwrap_or(order));
        }

        customer.amount_spent_minor += total_minor;
        self.store.upsert_customer(customer.clone())?;
        self.refresh_customer(&customer);
        tracing::info!(
            customer_id = %customer.id,
            order_id = %order.id,
            total_minor,
            lifetime_spend_minor = customer.amount_spent_minor,
            "order recorded"
        );
        Ok(order)
    }

    /// Look up platform ids for orders recorded without one
    pub async fn backfill_order_ids(&self) -> BackfillReport {
        let span = tracing::info_span!("backfill");
        async {
            let mut report = BackfillReport::default();
            for order in self.store.orders_missing_external_id() {
                report.checked += 1;
                match self.platform.find_order_by_number(&order.order_number).await {
                    Ok(Some(external_id)) => {
                        match self.store.set_order_external_id(&order.id, external_id) {
                            Ok(true) => {
                                report.resolved += 1;
                                self.sync.enqueue(SyncTask::OrderPoints {
                                    order_id: order.id.clone(),
                                });
                            }
                            // Another run got there first
                            Ok(false) => {}
                            Err(e) => {
                                report.failed += 1;
                                tracing::error!(order_id = %order.id, error = %e, "backfill write failed");
                            }
                        }
                    }
                    Ok(None) => {
                        report.missing += 1;
                        tracing::debug!(order_id = %order.id, order_number = %order.order_number, "no platform match");
                    }
                    Err(e) => {
                        report.failed += 1;
                        tracing::warn!(order_id = %order.id, error = %e, "order lookup failed");
                    }
                }
            }
            tracing::info!(
                checked = report.checked,
                resolved = report.resolved,
                missing = report.missing,
                failed = report.failed,
                "completed"
            );
            report
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "ingest_tests.rs"]
mod tests;
