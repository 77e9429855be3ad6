// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake commerce adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{
    CommerceError, CommercePlatform, DiscountRequest, PlatformCustomer, PlatformOrder,
    ProfileUpdate,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Recorded commerce call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommerceCall {
    GetCustomer {
        external_id: String,
    },
    GetOrders {
        external_id: String,
    },
    FindOrderByNumber {
        order_number: String,
    },
    UpdateOrderMetafield {
        external_order_id: String,
        namespace: String,
        key: String,
        value: i64,
    },
    UpdateCustomerProfile {
        external_customer_id: String,
        update: ProfileUpdate,
    },
    IssueDiscountCode {
        request: DiscountRequest,
    },
}

#[derive(Default)]
struct FakeState {
    customers: HashMap<String, PlatformCustomer>,
    orders: HashMap<String, Vec<PlatformOrder>>,
    calls: Vec<CommerceCall>,
    fail_issuance: bool,
    /// Number of upcoming sync writes that fail with a 503
    sync_failures: u32,
    issue_delay: Option<Duration>,
    next_code: u64,
}

/// Fake commerce adapter for testing
#[derive(Clone, Default)]
pub struct FakeCommerceAdapter {
    state: Arc<Mutex<FakeState>>,
}

impl FakeCommerceAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a platform customer
    pub fn add_customer(&self, customer: PlatformCustomer) {
        self.lock()
            .customers
            .insert(customer.external_id.clone(), customer);
    }

    /// Register an order for a platform customer
    pub fn add_order(&self, external_customer_id: &str, order: PlatformOrder) {
        self.lock()
            .orders
            .entry(external_customer_id.to_string())
            .or_default()
            .push(order);
    }

    /// Make discount issuance fail until reset
    pub fn fail_issuance(&self, fail: bool) {
        self.lock().fail_issuance = fail;
    }

    /// Fail the next `count` sync writes with a retryable error
    pub fn fail_next_syncs(&self, count: u32) {
        self.lock().sync_failures = count;
    }

    /// Delay each discount issuance
    pub fn set_issue_delay(&self, delay: Duration) {
        self.lock().issue_delay = Some(delay);
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<CommerceCall> {
        self.lock().calls.clone()
    }

    /// Number of discount issuance calls made
    pub fn issue_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, CommerceCall::IssueDiscountCode { .. }))
            .count()
    }

    /// Last points value written to an order
    pub fn order_points(&self, external_order_id: &str) -> Option<i64> {
        self.lock().calls.iter().rev().find_map(|c| match c {
            CommerceCall::UpdateOrderMetafield {
                external_order_id: id,
                value,
                ..
            } if id == external_order_id => Some(*value),
            _ => None,
        })
    }

    /// Last profile written to a customer
    pub fn profile(&self, external_customer_id: &str) -> Option<ProfileUpdate> {
        self.lock().calls.iter().rev().find_map(|c| match c {
            CommerceCall::UpdateCustomerProfile {
                external_customer_id: id,
                update,
            } if id == external_customer_id => Some(update.clone()),
            _ => None,
        })
    }

    fn record(&self, call: CommerceCall) {
        self.lock().calls.push(call);
    }

    fn take_sync_failure(&self) -> Result<(), CommerceError> {
        let mut state = self.lock();
        if state.sync_failures > 0 {
            state.sync_failures -= 1;
            return Err(CommerceError::Status(503));
        }
        Ok(())
    }
}

#[async_trait]
impl CommercePlatform for FakeCommerceAdapter {
    async fn get_customer(&self, external_id: &str) -> Result<PlatformCustomer, CommerceError> {
        self.record(CommerceCall::GetCustomer {
            external_id: external_id.to_string(),
        });
        self.lock()
            .customers
            .get(external_id)
            .cloned()
            .ok_or_else(|| CommerceError::NotFound(format!("customer {}", external_id)))
    }

    async fn get_orders(&self, external_id: &str) -> Result<Vec<PlatformOrder>, CommerceError> {
        self.record(CommerceCall::GetOrders {
            external_id: external_id.to_string(),
        });
        let state = self.lock();
        if !state.customers.contains_key(external_id) {
            return Err(CommerceError::NotFound(format!("customer {}", external_id)));
        }
        Ok(state.orders.get(external_id).cloned().unwrap_or_default())
    }

    async fn find_order_by_number(
        &self,
        order_number: &str,
    ) -> Result<Option<String>, CommerceError> {
        self.record(CommerceCall::FindOrderByNumber {
            order_number: order_number.to_string(),
        });
        Ok(self
            .lock()
            .orders
            .values()
            .flatten()
            .find(|o| o.order_number == order_number)
            .map(|o| o.external_id.clone()))
    }

    async fn update_order_metafield(
        &self,
        external_order_id: &str,
        namespace: &str,
        key: &str,
        value: i64,
    ) -> Result<(), CommerceError> {
        self.take_sync_failure()?;
        self.record(CommerceCall::UpdateOrderMetafield {
            external_order_id: external_order_id.to_string(),
            namespace: namespace.to_string(),
            key: key.to_string(),
            value,
        });
        Ok(())
    }

    async fn update_customer_profile(
        &self,
        external_customer_id: &str,
        update: &ProfileUpdate,
    ) -> Result<(), CommerceError> {
        self.take_sync_failure()?;
        self.record(CommerceCall::UpdateCustomerProfile {
            external_customer_id: external_customer_id.to_string(),
            update: update.clone(),
        });
        Ok(())
    }

    async fn issue_discount_code(
        &self,
        request: &DiscountRequest,
    ) -> Result<String, CommerceError> {
        self.record(CommerceCall::IssueDiscountCode {
            request: request.clone(),
        });
        let delay = self.lock().issue_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        if state.fail_issuance {
            return Err(CommerceError::Status(500));
        }
        state.next_code += 1;
        Ok(format!("FAKE-{:04}", state.next_code))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
