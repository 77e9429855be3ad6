// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrapper for consistent observability

use crate::commerce::{
    CommerceError, CommercePlatform, DiscountRequest, PlatformCustomer, PlatformOrder,
    ProfileUpdate,
};
use async_trait::async_trait;
use tracing::Instrument;

/// Wrapper that adds tracing to any CommercePlatform
#[derive(Clone)]
pub struct TracedCommercePlatform<C> {
    inner: C,
}

impl<C> TracedCommercePlatform<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

fn log_outcome<T>(result: &Result<T, CommerceError>, start: std::time::Instant, what: &str) {
    let elapsed_ms = start.elapsed().as_millis() as u64;
    match result {
        Ok(_) => tracing::info!(elapsed_ms, "{} ok", what),
        Err(e) if e.is_retryable() => {
            tracing::warn!(elapsed_ms, error = %e, "{} failed (retryable)", what)
        }
        Err(e) => tracing::error!(elapsed_ms, error = %e, "{} failed", what),
    }
}

#[async_trait]
impl<C: CommercePlatform> CommercePlatform for TracedCommercePlatform<C> {
    async fn get_customer(&self, external_id: &str) -> Result<PlatformCustomer, CommerceError> {
        let span = tracing::info_span!("commerce.get_customer", external_id);
        async {
            let start = std::time::Instant::now();
            let result = self.inner.get_customer(external_id).await;
            log_outcome(&result, start, "get_customer");
            result
        }
        .instrument(span)
        .await
    }

    async fn get_orders(&self, external_id: &str) -> Result<Vec<PlatformOrder>, CommerceError> {
        let span = tracing::info_span!("commerce.get_orders", external_id);
        async {
            let start = std::time::Instant::now();
            let result = self.inner.get_orders(external_id).await;
            if let Ok(orders) = &result {
                tracing::debug!(count = orders.len(), "orders fetched");
            }
            log_outcome(&result, start, "get_orders");
            result
        }
        .instrument(span)
        .await
    }

    async fn find_order_by_number(
        &self,
        order_number: &str,
    ) -> Result<Option<String>, CommerceError> {
        let span = tracing::info_span!("commerce.find_order", order_number);
        async {
            let start = std::time::Instant::now();
            let result = self.inner.find_order_by_number(order_number).await;
            if let Ok(None) = &result {
                tracing::warn!("no platform order with this number");
            }
            log_outcome(&result, start, "find_order_by_number");
            result
        }
        .instrument(span)
        .await
    }

    async fn update_order_metafield(
        &self,
        external_order_id: &str,
        namespace: &str,
        key: &str,
        value: i64,
    ) -> Result<(), CommerceError> {
        let span = tracing::info_span!(
            "commerce.order_metafield",
            external_order_id,
            namespace,
            key
        );
        async {
            tracing::debug!(value, "writing");
            let start = std::time::Instant::now();
            let result = self
                .inner
                .update_order_metafield(external_order_id, namespace, key, value)
                .await;
            log_outcome(&result, start, "update_order_metafield");
            result
        }
        .instrument(span)
        .await
    }

    async fn update_customer_profile(
        &self,
        external_customer_id: &str,
        update: &ProfileUpdate,
    ) -> Result<(), CommerceError> {
        let span = tracing::info_span!("commerce.customer_profile", external_customer_id);
        async {
            tracing::debug!(points = update.points, tier = %update.tier, "writing");
            let start = std::time::Instant::now();
            let result = self
                .inner
                .update_customer_profile(external_customer_id, update)
                .await;
            log_outcome(&result, start, "update_customer_profile");
            result
        }
        .instrument(span)
        .await
    }

    async fn issue_discount_code(
        &self,
        request: &DiscountRequest,
    ) -> Result<String, CommerceError> {
        let span = tracing::info_span!("commerce.issue_discount", value_minor = request.value_minor);

        // A zero or negative discount would be a free-for-all code
        if request.value_minor <= 0 {
            let _guard = span.enter();
            tracing::error!("refusing non-positive discount value");
            return Err(CommerceError::Malformed(format!(
                "discount value must be positive, got {}",
                request.value_minor
            )));
        }

        async {
            let start = std::time::Instant::now();
            let result = self.inner.issue_discount_code(request).await;
            log_outcome(&result, start, "issue_discount_code");
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
