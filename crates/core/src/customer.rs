// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Customer records and identifier normalization

use crate::id::CustomerId;
use crate::tier::TierName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of the commerce platform's global customer id
const GLOBAL_ID_PREFIX: &str = "gid://shopify/Customer/";

/// Customer as stored by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    /// Numeric id on the commerce platform
    pub external_id: Option<String>,
    pub amount_spent_minor: i64,
    /// Denormalized cache of the classified tier
    pub tier: TierName,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Customer {
    pub fn new(id: impl Into<CustomerId>, amount_spent_minor: i64) -> Self {
        Self {
            id: id.into(),
            external_id: None,
            amount_spent_minor,
            tier: crate::tier::classify(amount_spent_minor).tier,
            tags: Vec::new(),
        }
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }
}

/// A customer identifier after normalization at the system boundary.
///
/// Callers hand in raw numeric platform ids, platform global ids
/// (`gid://shopify/Customer/123`) or internal keys; all of them collapse
/// to one of these two forms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CustomerRef {
    /// Internal key
    Internal(CustomerId),
    /// Numeric id on the commerce platform
    External(String),
}

impl fmt::Display for CustomerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CustomerRef::Internal(id) => write!(f, "{}", id),
            CustomerRef::External(id) => write!(f, "{}{}", GLOBAL_ID_PREFIX, id),
        }
    }
}

/// Error returned for identifiers that fit none of the accepted forms
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed customer identifier: {0:?}")]
pub struct MalformedCustomerRef(pub String);

/// Normalize an externally supplied customer identifier.
pub fn normalize_customer_ref(raw: &str) -> Result<CustomerRef, MalformedCustomerRef> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(MalformedCustomerRef(raw.to_string()));
    }

    if trimmed.starts_with("gid://") {
        let numeric = trimmed
            .strip_prefix(GLOBAL_ID_PREFIX)
            .filter(|n| is_numeric(n))
            .ok_or_else(|| MalformedCustomerRef(raw.to_string()))?;
        return Ok(CustomerRef::External(strip_leading_zeros(numeric)));
    }

    if is_numeric(trimmed) {
        return Ok(CustomerRef::External(strip_leading_zeros(trimmed)));
    }

    if trimmed.chars().any(char::is_whitespace) {
        return Err(MalformedCustomerRef(raw.to_string()));
    }
    Ok(CustomerRef::Internal(CustomerId::new(trimmed)))
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn strip_leading_zeros(s: &str) -> String {
    let stripped = s.trim_start_matches('0');
    if stripped.is_empty() {
        "0".to_string()
    } else {
        stripped.to_string()
    }
}

#[cfg(test)]
#[path = "customer_tests.rs"]
mod tests;
