// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Customer orders

use crate::id::{CustomerId, OrderId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A customer order.
///
/// Immutable once ingested except for `points_earned` (rewritten only by
/// accrual, through a compare-and-set in the store) and `external_id`
/// (set once when resolved).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    /// External-facing order number, e.g. `#1042`
    pub order_number: String,
    pub total_minor: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub points_earned: Option<i64>,
    pub external_id: Option<String>,
}

impl Order {
    /// Points recorded so far, treating "never processed" as zero
    pub fn recorded_points(&self) -> i64 {
        self.points_earned.unwrap_or(0)
    }
}
