// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! No-op commerce adapter for when no platform is configured.

use super::{
    CommerceError, CommercePlatform, DiscountRequest, PlatformCustomer, PlatformOrder,
    ProfileUpdate,
};
use async_trait::async_trait;

/// Commerce adapter with no platform behind it.
///
/// Sync writes succeed silently so the ledger keeps working offline;
/// reads and discount issuance fail with [`CommerceError::NotConfigured`]
/// because there is nothing to read and no code can be issued.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpCommerceAdapter;

impl NoOpCommerceAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommercePlatform for NoOpCommerceAdapter {
    async fn get_customer(&self, _external_id: &str) -> Result<PlatformCustomer, CommerceError> {
        Err(CommerceError::NotConfigured)
    }

    async fn get_orders(&self, _external_id: &str) -> Result<Vec<PlatformOrder>, CommerceError> {
        Err(CommerceError::NotConfigured)
    }

    async fn find_order_by_number(
        &self,
        _order_number: &str,
    ) -> Result<Option<String>, CommerceError> {
        Ok(None)
    }

    async fn update_order_metafield(
        &self,
        _external_order_id: &str,
        _namespace: &str,
        _key: &str,
        _value: i64,
    ) -> Result<(), CommerceError> {
        Ok(())
    }

    async fn update_customer_profile(
        &self,
        _external_customer_id: &str,
        _update: &ProfileUpdate,
    ) -> Result<(), CommerceError> {
        Ok(())
    }

    async fn issue_discount_code(
        &self,
        _request: &DiscountRequest,
    ) -> Result<String, CommerceError> {
        Err(CommerceError::NotConfigured)
    }
}
