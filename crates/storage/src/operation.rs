// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable mutations recorded in the WAL

use loy_core::{Customer, CustomerId, LedgerEntry, Offer, Order, OrderId, TierName};
use serde::{Deserialize, Serialize};

/// A single state mutation. One operation is one WAL line, so everything
/// that must commit together lives in one variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    CustomerUpsert {
        customer: Customer,
    },
    CustomerTier {
        customer_id: CustomerId,
        tier: TierName,
    },
    OrderInsert {
        order: Order,
    },
    OrderExternalId {
        order_id: OrderId,
        external_id: String,
    },
    OfferUpsert {
        offer: Offer,
    },
    LedgerAppend {
        entry: LedgerEntry,
    },
    /// Ledger delta plus the order's new recorded points
    OrderAccrued {
        entry: LedgerEntry,
        order_id: OrderId,
        points: i64,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::CustomerUpsert { .. } => "customer_upsert",
            Operation::CustomerTier { .. } => "customer_tier",
            Operation::OrderInsert { .. } => "order_insert",
            Operation::OrderExternalId { .. } => "order_external_id",
            Operation::OfferUpsert { .. } => "offer_upsert",
            Operation::LedgerAppend { .. } => "ledger_append",
            Operation::OrderAccrued { .. } => "order_accrued",
        }
    }
}
