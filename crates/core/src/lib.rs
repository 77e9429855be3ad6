// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! loy-core: domain types for the loyalty ledger
//!
//! This crate provides:
//! - Customers, orders, offers and the reward catalog
//! - Ledger entry types and the balance chain check
//! - The pure tier classifier
//! - Clock and id abstractions, and the shared TOML configuration

pub mod clock;
pub mod config;
pub mod customer;
pub mod id;
pub mod ledger;
pub mod offer;
pub mod order;
pub mod reward;
pub mod tier;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{ConfigError, LoyaltyConfig};
pub use customer::{normalize_customer_ref, Customer, CustomerRef, MalformedCustomerRef};
pub use id::{
    CustomerId, IdGen, OfferId, OrderId, RedemptionId, RewardId, SequentialIdGen, UuidIdGen,
};
pub use ledger::{verify_chain, ChainViolation, EntryId, LedgerEntry, NewEntry, SourceKey, SourceType};
pub use offer::{parse_legacy_cashback, CashbackRatio, Ineligible, Offer, OfferError, OfferType};
pub use order::Order;
pub use reward::{Reward, RewardCatalog};
pub use tier::{classify, progress, Classification, Multiplier, TierBasis, TierName, TierProgress};
