// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Points ledger entries
//!
//! The ledger is append-only. For one customer, entries in append order
//! satisfy `balance_after[n] == balance_after[n-1] + change[n]` with an
//! implicit starting balance of zero.

use crate::id::CustomerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Store-assigned, monotonically increasing entry id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What produced a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    Order,
    Offer,
    Redemption,
    ManualAdjustment,
    CronReconcile,
}

impl SourceType {
    /// Whether `(customer, source_type, source_id)` must be unique.
    ///
    /// Order entries are deltas against the order's recorded points, so one
    /// order can own several entries; they are gated by the order record
    /// instead.
    pub fn is_unique_per_source(self) -> bool {
        !matches!(self, SourceType::Order)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Order => "ORDER",
            SourceType::Offer => "OFFER",
            SourceType::Redemption => "REDEMPTION",
            SourceType::ManualAdjustment => "MANUAL_ADJUSTMENT",
            SourceType::CronReconcile => "CRON_RECONCILE",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Idempotency key of a point-granting event
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceKey {
    pub customer_id: CustomerId,
    pub source_type: SourceType,
    pub source_id: String,
}

impl SourceKey {
    pub fn new(
        customer_id: CustomerId,
        source_type: SourceType,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            customer_id,
            source_type,
            source_id: source_id.into(),
        }
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.customer_id, self.source_type, self.source_id
        )
    }
}

/// A committed ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub customer_id: CustomerId,
    pub change: i64,
    pub balance_after: i64,
    pub reason: String,
    pub source_type: SourceType,
    pub source_id: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn source_key(&self) -> Option<SourceKey> {
        self.source_id.as_ref().map(|sid| {
            SourceKey::new(self.customer_id.clone(), self.source_type, sid.clone())
        })
    }
}

/// An entry proposed for append; the store assigns id and timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub customer_id: CustomerId,
    pub change: i64,
    /// Balance the producer computed from the balance it read
    pub balance_after: i64,
    pub reason: String,
    pub source_type: SourceType,
    pub source_id: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl NewEntry {
    /// Build an entry that moves `balance` by `change`
    pub fn from_balance(
        customer_id: CustomerId,
        balance: i64,
        change: i64,
        source_type: SourceType,
        source_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            customer_id,
            change,
            balance_after: balance + change,
            reason: reason.into(),
            source_type,
            source_id: Some(source_id.into()),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn source_key(&self) -> Option<SourceKey> {
        self.source_id.as_ref().map(|sid| {
            SourceKey::new(self.customer_id.clone(), self.source_type, sid.clone())
        })
    }
}

/// First position at which a customer's chain breaks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("ledger chain broken at entry {entry}: expected balance {expected}, found {found}")]
pub struct ChainViolation {
    pub entry: EntryId,
    pub expected: i64,
    pub found: i64,
}

/// Check the balance chain of one customer's entries, in append order.
pub fn verify_chain(entries: &[LedgerEntry]) -> Result<(), ChainViolation> {
    let mut balance = 0i64;
    for entry in entries {
        let expected = balance + entry.change;
        if entry.balance_after != expected {
            return Err(ChainViolation {
                entry: entry.id,
                expected,
                found: entry.balance_after,
            });
        }
        balance = entry.balance_after;
    }
    Ok(())
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
