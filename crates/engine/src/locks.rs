// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sharded per-customer lock table
//!
//! Every read-balance, compute, append sequence for a customer runs under
//! that customer's shard lock. Customers hashing to the same shard
//! serialize against each other, which is harmless; two customers never
//! need to be held at once, so there is no lock ordering to get wrong.

use loy_core::CustomerId;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tokio::sync::{Mutex, MutexGuard};

pub struct CustomerLocks {
    shards: Vec<Mutex<()>>,
}

impl CustomerLocks {
    pub fn new(shards: usize) -> Self {
        Self {
            shards: (0..shards.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn shard_of(&self, customer_id: &CustomerId) -> usize {
        let mut hasher = DefaultHasher::new();
        customer_id.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    /// Wait for the customer's shard
    pub async fn lock(&self, customer_id: &CustomerId) -> MutexGuard<'_, ()> {
        let shard = self.shard_of(customer_id);
        tracing::trace!(customer_id = %customer_id, shard, "acquiring customer lock");
        self.shards[shard].lock().await
    }
}

#[cfg(test)]
#[path = "locks_tests.rs"]
mod tests;
