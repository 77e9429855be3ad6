// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Commerce platform adapters

mod http;
mod noop;

pub use http::{format_minor, parse_minor, HttpCommerceAdapter};
pub use noop::NoOpCommerceAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{CommerceCall, FakeCommerceAdapter};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loy_core::TierName;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Metafield namespace for everything the engine writes
pub const METAFIELD_NAMESPACE: &str = "loyalty";
pub const POINTS_KEY: &str = "points";
pub const TIER_KEY: &str = "tier";

/// Errors from commerce platform operations
#[derive(Debug, Error)]
pub enum CommerceError {
    #[error("not found on platform: {0}")]
    NotFound(String),
    #[error("platform returned status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("commerce platform is not configured")]
    NotConfigured,
}

impl CommerceError {
    /// Whether the same call may succeed later
    pub fn is_retryable(&self) -> bool {
        match self {
            CommerceError::Status(code) => *code == 429 || *code >= 500,
            CommerceError::Transport(_) => true,
            CommerceError::NotFound(_) | CommerceError::Malformed(_) | CommerceError::NotConfigured => {
                false
            }
        }
    }
}

/// Customer as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformCustomer {
    pub external_id: String,
    pub lifetime_spend_minor: i64,
    pub tags: Vec<String>,
}

/// Order as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformOrder {
    pub external_id: String,
    pub order_number: String,
    pub total_minor: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// Tags and loyalty metafields pushed onto a customer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub tags: Vec<String>,
    pub points: i64,
    pub tier: TierName,
}

/// A single-use fixed-amount discount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountRequest {
    pub title: String,
    pub value_minor: i64,
    pub currency: String,
}

/// Outbound interface to the commerce platform
#[async_trait]
pub trait CommercePlatform: Clone + Send + Sync + 'static {
    /// Lifetime spend and tags of a customer
    async fn get_customer(&self, external_id: &str) -> Result<PlatformCustomer, CommerceError>;

    /// All orders of a customer
    async fn get_orders(&self, external_id: &str) -> Result<Vec<PlatformOrder>, CommerceError>;

    /// Platform id of the order with this number, if any
    async fn find_order_by_number(
        &self,
        order_number: &str,
    ) -> Result<Option<String>, CommerceError>;

    /// Write an integer metafield on an order
    async fn update_order_metafield(
        &self,
        external_order_id: &str,
        namespace: &str,
        key: &str,
        value: i64,
    ) -> Result<(), CommerceError>;

    /// Replace a customer's tags and loyalty metafields
    async fn update_customer_profile(
        &self,
        external_customer_id: &str,
        update: &ProfileUpdate,
    ) -> Result<(), CommerceError>;

    /// Create a discount and return its redeemable code
    async fn issue_discount_code(&self, request: &DiscountRequest)
        -> Result<String, CommerceError>;
}
