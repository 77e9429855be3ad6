// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier newtypes and generators

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Canonical internal customer key
    CustomerId
);
string_id!(
    /// Internal order identifier
    OrderId
);
string_id!(
    /// Administrator-assigned offer identifier
    OfferId
);
string_id!(
    /// Reward catalog identifier
    RewardId
);
string_id!(
    /// Identifier of a single redemption request, used as its ledger source id
    RedemptionId
);

/// Generates redemption identifiers
pub trait IdGen: Clone + Send + Sync + 'static {
    fn next_redemption(&self) -> RedemptionId;
}

/// UUID-based generator for production use
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn next_redemption(&self) -> RedemptionId {
        RedemptionId(format!("rdm-{}", uuid::Uuid::new_v4()))
    }
}

/// Sequential generator for testing
#[derive(Clone, Debug)]
pub struct SequentialIdGen {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new("rdm")
    }
}

impl IdGen for SequentialIdGen {
    fn next_redemption(&self) -> RedemptionId {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        RedemptionId(format!("{}-{}", self.prefix, n))
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
