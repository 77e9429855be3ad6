// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Loyalty engine: accrual, offers, redemption and platform sync

mod accrual;
mod batch;
mod error;
mod ingest;
mod locks;
mod offers;
mod redemption;
mod runtime;
pub mod sync;
mod tiers;

#[cfg(test)]
mod test_support;

pub use accrual::{AccrualReport, MIN_ORDERS_FOR_ACCRUAL};
pub use error::{EngineError, RedeemError};
pub use ingest::{BackfillReport, ImportReport};
pub use locks::CustomerLocks;
pub use offers::OfferReport;
pub use redemption::Redemption;
pub use runtime::{Engine, EngineConfig, EngineDeps, EngineStatus};
pub use sync::{
    channel, profile_update, RetryPolicy, SyncHandle, SyncReceiver, SyncStats, SyncTask,
    SyncWorker,
};
pub use tiers::{AuditReport, LedgerViolation, ReconcileReport, TierStatus};
