// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine

use loy_adapters::CommerceError;
use loy_core::{MalformedCustomerRef, RewardId};
use loy_storage::StoreError;
use thiserror::Error;

/// Errors from engine operations other than redemption
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("commerce error: {0}")]
    Commerce(#[from] CommerceError),
    #[error("invalid customer reference: {0}")]
    MalformedCustomer(#[from] MalformedCustomerRef),
    #[error("customer not found: {0}")]
    CustomerNotFound(String),
    #[error("adjustment of {change} would take balance {balance} below zero")]
    NegativeBalance { balance: i64, change: i64 },
    #[error("adjustment change must be non-zero")]
    ZeroAdjustment,
    #[error("adjustment {0} was already applied")]
    DuplicateAdjustment(String),
    #[error("invalid offer: {0}")]
    InvalidOffer(String),
    #[error("order amount must be positive, got {0}")]
    InvalidAmount(i64),
    #[error("ledger write still conflicting after {0} attempts")]
    ConflictRetriesExhausted(u32),
}

/// Reasons a redemption is rejected or fails
#[derive(Debug, Error)]
pub enum RedeemError {
    #[error("customer not found: {0}")]
    CustomerNotFound(String),
    #[error("unknown reward: {0}")]
    InvalidReward(RewardId),
    #[error("insufficient points: balance {balance}, reward costs {cost}")]
    InsufficientPoints { balance: i64, cost: i64 },
    #[error("discount code issuance failed: {0}")]
    CodeIssuanceFailed(#[source] CommerceError),
    #[error("ledger write still conflicting after {0} attempts")]
    Conflict(u32),
    #[error("store error: {0}")]
    Store(#[source] StoreError),
}

impl RedeemError {
    /// Stable machine-readable reason
    pub fn reason(&self) -> &'static str {
        match self {
            RedeemError::CustomerNotFound(_) => "customer_not_found",
            RedeemError::InvalidReward(_) => "invalid_reward",
            RedeemError::InsufficientPoints { .. } => "insufficient_points",
            RedeemError::CodeIssuanceFailed(_) => "code_issuance_failed",
            RedeemError::Conflict(_) => "conflict",
            RedeemError::Store(_) => "store",
        }
    }
}
