// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Durable storage for the loyalty ledger

mod operation;
mod state;
mod store;
mod wal;

pub use operation::Operation;
pub use state::MaterializedState;
pub use store::{Store, StoreError, StoreStats};
pub use wal::{Wal, WalError};
