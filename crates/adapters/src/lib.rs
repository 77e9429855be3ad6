// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for the external commerce platform

pub mod commerce;
pub mod traced;

pub use commerce::{
    format_minor, parse_minor, CommerceError, CommercePlatform, DiscountRequest,
    HttpCommerceAdapter, NoOpCommerceAdapter, PlatformCustomer, PlatformOrder, ProfileUpdate,
    METAFIELD_NAMESPACE, POINTS_KEY, TIER_KEY,
};
pub use traced::TracedCommercePlatform;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use commerce::{CommerceCall, FakeCommerceAdapter};
