// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Commerce platform selected from configuration at startup

use async_trait::async_trait;
use loy_adapters::{
    CommerceError, CommercePlatform, DiscountRequest, HttpCommerceAdapter, NoOpCommerceAdapter,
    PlatformCustomer, PlatformOrder, ProfileUpdate,
};

/// HTTP when `[platform] base_url` is set, offline otherwise
#[derive(Clone)]
pub enum DaemonPlatform {
    Http(HttpCommerceAdapter),
    Offline(NoOpCommerceAdapter),
}

impl DaemonPlatform {
    pub fn is_offline(&self) -> bool {
        matches!(self, DaemonPlatform::Offline(_))
    }
}

#[async_trait]
impl CommercePlatform for DaemonPlatform {
    async fn get_customer(&self, external_id: &str) -> Result<PlatformCustomer, CommerceError> {
        match self {
            DaemonPlatform::Http(p) => p.get_customer(external_id).await,
            DaemonPlatform::Offline(p) => p.get_customer(external_id).await,
        }
    }

    async fn get_orders(&self, external_id: &str) -> Result<Vec<PlatformOrder>, CommerceError> {
        match self {
            DaemonPlatform::Http(p) => p.get_orders(external_id).await,
            DaemonPlatform::Offline(p) => p.get_orders(external_id).await,
        }
    }

    async fn find_order_by_number(
        &self,
        order_number: &str,
    ) -> Result<Option<String>, CommerceError> {
        match self {
            DaemonPlatform::Http(p) => p.find_order_by_number(order_number).await,
            DaemonPlatform::Offline(p) => p.find_order_by_number(order_number).await,
        }
    }

    async fn update_order_metafield(
        &self,
        external_order_id: &str,
        namespace: &str,
        key: &str,
        value: i64,
    ) -> Result<(), CommerceError> {
        match self {
            DaemonPlatform::Http(p) => {
                p.update_order_metafield(external_order_id, namespace, key, value)
                    .await
            }
            DaemonPlatform::Offline(p) => {
                p.update_order_metafield(external_order_id, namespace, key, value)
                    .await
            }
        }
    }

    async fn update_customer_profile(
        &self,
        external_customer_id: &str,
        update: &ProfileUpdate,
    ) -> Result<(), CommerceError> {
        match self {
            DaemonPlatform::Http(p) => p.update_customer_profile(external_customer_id, update).await,
            DaemonPlatform::Offline(p) => {
                p.update_customer_profile(external_customer_id, update)
                    .await
            }
        }
    }

    async fn issue_discount_code(
        &self,
        request: &DiscountRequest,
    ) -> Result<String, CommerceError> {
        match self {
            DaemonPlatform::Http(p) => p.issue_discount_code(request).await,
            DaemonPlatform::Offline(p) => p.issue_discount_code(request).await,
        }
    }
}
