// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Promotional offers
//!
//! Offers are administrator-managed and read-only to the engine. Only
//! CASHBACK and POINTS offers mint points; every other type is a benefit
//! flag for the storefront.

use crate::id::OfferId;
use crate::tier::TierName;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferType {
    Cashback,
    Points,
    Discount,
    Bogo,
    FixedAmountDiscount,
    PercentageDiscount,
    FreeShipping,
    FreeGift,
    EarlyAccess,
}

impl OfferType {
    pub fn mints_points(self) -> bool {
        matches!(self, OfferType::Cashback | OfferType::Points)
    }
}

/// "`euros_per_unit` Euro = `points_per_unit` Point"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashbackRatio {
    pub euros_per_unit: i64,
    pub points_per_unit: i64,
}

impl CashbackRatio {
    /// `floor(spend / euros) * points`, spend in minor units
    pub fn points_for(self, lifetime_spend_minor: i64) -> i64 {
        if lifetime_spend_minor <= 0 {
            return 0;
        }
        match self.minor_per_unit() {
            Some(divisor) => lifetime_spend_minor
                .checked_div(divisor)
                .unwrap_or(0)
                .saturating_mul(self.points_per_unit),
            None => 0,
        }
    }

    /// Spend in minor units that earns one unit; `None` unless positive
    /// and representable
    fn minor_per_unit(self) -> Option<i64> {
        self.euros_per_unit.checked_mul(100).filter(|d| *d > 0)
    }

    fn is_valid(self) -> bool {
        self.points_per_unit > 0 && self.minor_per_unit().is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OfferError {
    #[error("offer {0} has no cashback ratio and its description does not encode one")]
    MissingCashbackRatio(OfferId),
    #[error("offer {offer}: cashback ratio must be positive and in range (got {euros} Euro = {points} Point)")]
    InvalidCashbackRatio {
        offer: OfferId,
        euros: i64,
        points: i64,
    },
}

/// Why an offer does not apply to a customer at a given time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligible {
    Inactive,
    NotStarted,
    Ended,
    TierTooLow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub offer_type: OfferType,
    /// Points granted by POINTS offers, or the benefit's value otherwise
    #[serde(default)]
    pub points_cost: i64,
    pub active: bool,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub tier_required: Option<TierName>,
    /// Structured cashback ratio; preferred over the description text
    #[serde(default)]
    pub cashback: Option<CashbackRatio>,
}

impl Offer {
    /// Date window and tier gate check
    pub fn eligibility(&self, tier: TierName, now: DateTime<Utc>) -> Result<(), Ineligible> {
        if !self.active {
            return Err(Ineligible::Inactive);
        }
        if self.starts_at.is_some_and(|start| now < start) {
            return Err(Ineligible::NotStarted);
        }
        if self.ends_at.is_some_and(|end| now > end) {
            return Err(Ineligible::Ended);
        }
        if let Some(required) = self.tier_required {
            if !tier.satisfies(required) {
                return Err(Ineligible::TierTooLow);
            }
        }
        Ok(())
    }

    /// Cashback ratio from the structured field, falling back to the
    /// legacy description text
    pub fn cashback_ratio(&self) -> Result<CashbackRatio, OfferError> {
        let ratio = match self.cashback {
            Some(ratio) => ratio,
            None => parse_legacy_cashback(&self.description)
                .ok_or_else(|| OfferError::MissingCashbackRatio(self.id.clone()))?,
        };
        if !ratio.is_valid() {
            return Err(OfferError::InvalidCashbackRatio {
                offer: self.id.clone(),
                euros: ratio.euros_per_unit,
                points: ratio.points_per_unit,
            });
        }
        Ok(ratio)
    }

    /// Points this offer grants a customer with the given lifetime spend.
    ///
    /// `Ok(0)` means nothing to grant.
    pub fn points_to_grant(&self, lifetime_spend_minor: i64) -> Result<i64, OfferError> {
        match self.offer_type {
            OfferType::Cashback => Ok(self.cashback_ratio()?.points_for(lifetime_spend_minor)),
            OfferType::Points => Ok(self.points_cost.max(0)),
            _ => Ok(0),
        }
    }
}

#[allow(clippy::expect_used)]
static LEGACY_RATIO_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*euros?\s*=\s*(\d+)\s*points?")
        .expect("constant regex pattern is valid")
});

/// Compatibility shim for offers created before the structured ratio field:
/// extracts "`<euro> Euro = <points> Point`" from free text.
pub fn parse_legacy_cashback(description: &str) -> Option<CashbackRatio> {
    let caps = LEGACY_RATIO_PATTERN.captures(description)?;
    let euros = caps.get(1)?.as_str().parse().ok()?;
    let points = caps.get(2)?.as_str().parse().ok()?;
    Some(CashbackRatio {
        euros_per_unit: euros,
        points_per_unit: points,
    })
}

#[cfg(test)]
#[path = "offer_tests.rs"]
mod tests;
