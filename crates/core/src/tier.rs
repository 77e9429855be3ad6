// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tier classification
//!
//! Tiers are half-open intervals on lifetime spend (minor units):
//!
//! | spend            | tier     | multiplier |
//! |------------------|----------|------------|
//! | [0, 200)         | Welcomed | 0          |
//! | [200, 500)       | Bronze   | 1          |
//! | [500, 750)       | Silver   | 1.5        |
//! | [750, 1000)      | Gold     | 2          |
//! | [1000, ∞)        | Platinum | 2.5        |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Quantity a tier is computed from.
///
/// Only `LifetimeSpend` is used: tiers must not regress when points are
/// redeemed. `PointBalance` exists so records written under the older
/// balance-based rule can still be described.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierBasis {
    LifetimeSpend,
    PointBalance,
}

impl TierBasis {
    pub const CANONICAL: TierBasis = TierBasis::LifetimeSpend;
}

/// Named loyalty level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TierName {
    Welcomed,
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl TierName {
    pub const ALL: [TierName; 5] = [
        TierName::Welcomed,
        TierName::Bronze,
        TierName::Silver,
        TierName::Gold,
        TierName::Platinum,
    ];

    /// Inclusive lower bound on lifetime spend, in minor units
    pub fn threshold_minor(self) -> i64 {
        match self {
            TierName::Welcomed => 0,
            TierName::Bronze => 20_000,
            TierName::Silver => 50_000,
            TierName::Gold => 75_000,
            TierName::Platinum => 100_000,
        }
    }

    pub fn multiplier(self) -> Multiplier {
        match self {
            TierName::Welcomed => Multiplier::from_tenths(0),
            TierName::Bronze => Multiplier::from_tenths(10),
            TierName::Silver => Multiplier::from_tenths(15),
            TierName::Gold => Multiplier::from_tenths(20),
            TierName::Platinum => Multiplier::from_tenths(25),
        }
    }

    pub fn next(self) -> Option<TierName> {
        match self {
            TierName::Welcomed => Some(TierName::Bronze),
            TierName::Bronze => Some(TierName::Silver),
            TierName::Silver => Some(TierName::Gold),
            TierName::Gold => Some(TierName::Platinum),
            TierName::Platinum => None,
        }
    }

    /// Label used on the external platform (tags, metafields)
    pub fn label(self) -> &'static str {
        match self {
            TierName::Welcomed => "Welcomed",
            TierName::Bronze => "Bronze",
            TierName::Silver => "Silver",
            TierName::Gold => "Gold",
            TierName::Platinum => "Platinum",
        }
    }

    /// Whether this tier satisfies a `required` tier gate
    pub fn satisfies(self, required: TierName) -> bool {
        self >= required
    }
}

impl fmt::Display for TierName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error parsing a tier name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tier: {0}")]
pub struct UnknownTier(pub String);

impl FromStr for TierName {
    type Err = UnknownTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "welcomed" | "no tier" | "none" => Ok(TierName::Welcomed),
            "bronze" => Ok(TierName::Bronze),
            "silver" => Ok(TierName::Silver),
            "gold" => Ok(TierName::Gold),
            "platinum" => Ok(TierName::Platinum),
            _ => Err(UnknownTier(s.to_string())),
        }
    }
}

/// Point-earning multiplier, stored in tenths so arithmetic stays integral
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Multiplier(u32);

impl Multiplier {
    pub const fn from_tenths(tenths: u32) -> Self {
        Self(tenths)
    }

    pub fn tenths(self) -> u32 {
        self.0
    }

    /// `floor(amount * multiplier)` in whole points for an amount in minor units
    pub fn points_for(self, amount_minor: i64) -> i64 {
        let scaled = i128::from(amount_minor) * i128::from(self.0);
        // minor units (x100) and tenths (x10)
        let points = scaled.div_euclid(1000);
        i64::try_from(points).unwrap_or(if points.is_negative() {
            i64::MIN
        } else {
            i64::MAX
        })
    }
}

impl fmt::Display for Multiplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0 / 10, self.0 % 10)
    }
}

/// Output of [`classify`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub tier: TierName,
    pub multiplier: Multiplier,
}

/// Map lifetime spend (minor units) to a tier and multiplier.
///
/// Negative spend (refund-heavy customers) classifies as Welcomed.
pub fn classify(lifetime_spend_minor: i64) -> Classification {
    let tier = TierName::ALL
        .iter()
        .rev()
        .copied()
        .find(|t| lifetime_spend_minor >= t.threshold_minor())
        .unwrap_or(TierName::Welcomed);
    Classification {
        tier,
        multiplier: tier.multiplier(),
    }
}

/// Where a customer stands relative to the next tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierProgress {
    pub tier: TierName,
    pub multiplier: Multiplier,
    pub next: Option<TierName>,
    /// Remaining spend (minor units) until `next`; `None` at the top tier
    pub to_next_minor: Option<i64>,
}

pub fn progress(lifetime_spend_minor: i64) -> TierProgress {
    let Classification { tier, multiplier } = classify(lifetime_spend_minor);
    let next = tier.next();
    let to_next_minor = next.map(|n| n.threshold_minor() - lifetime_spend_minor.max(0));
    TierProgress {
        tier,
        multiplier,
        next,
        to_next_minor,
    }
}

#[cfg(test)]
#[path = "tier_tests.rs"]
mod tests;
