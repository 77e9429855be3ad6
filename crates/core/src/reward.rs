// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redemption catalog

use crate::id::RewardId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A catalog entry redeemable for a fixed point cost
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub id: RewardId,
    pub title: String,
    pub points_cost: i64,
    /// Monetary value of the issued discount, minor units
    pub value_minor: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "EUR".to_string()
}

/// Static reward catalog loaded from configuration
#[derive(Debug, Clone, Default)]
pub struct RewardCatalog {
    rewards: BTreeMap<RewardId, Reward>,
}

impl RewardCatalog {
    pub fn new(rewards: impl IntoIterator<Item = Reward>) -> Self {
        Self {
            rewards: rewards.into_iter().map(|r| (r.id.clone(), r)).collect(),
        }
    }

    pub fn get(&self, id: &RewardId) -> Option<&Reward> {
        self.rewards.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reward> {
        self.rewards.values()
    }

    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }
}
