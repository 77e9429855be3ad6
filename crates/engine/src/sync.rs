// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound sync of points and tiers to the commerce platform
//!
//! Producers enqueue tasks after their ledger write commits. A single
//! worker delivers them, reading the payload from the store at delivery
//! time, and reschedules retryable failures with exponential backoff.
//! Nothing here ever reports back to the producer.

use loy_adapters::{
    CommerceError, CommercePlatform, ProfileUpdate, METAFIELD_NAMESPACE, POINTS_KEY,
};
use loy_core::config::SyncConfig;
use loy_core::{classify, Customer, CustomerId, OrderId};
use loy_storage::Store;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Tag present on every enrolled customer
pub const LOYALTY_TAG: &str = "loyalty";
const TIER_TAG_PREFIX: &str = "tier:";

/// Work item for the sync worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncTask {
    /// Push tags and `{points, tier}` for a customer
    CustomerProfile { customer_id: CustomerId },
    /// Push the `loyalty.points` metafield of an order
    OrderPoints { order_id: OrderId },
}

/// Delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub delivered: u64,
    pub retried: u64,
    pub dropped: u64,
    /// Tasks with nothing to deliver to (no platform id yet)
    pub skipped: u64,
}

#[derive(Debug, Default)]
struct SyncCounters {
    delivered: AtomicU64,
    retried: AtomicU64,
    dropped: AtomicU64,
    skipped: AtomicU64,
}

impl SyncCounters {
    fn snapshot(&self) -> SyncStats {
        SyncStats {
            delivered: self.delivered.load(AtomicOrdering::Relaxed),
            retried: self.retried.load(AtomicOrdering::Relaxed),
            dropped: self.dropped.load(AtomicOrdering::Relaxed),
            skipped: self.skipped.load(AtomicOrdering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, AtomicOrdering::Relaxed);
    }
}

/// Producer side of the sync queue
#[derive(Clone)]
pub struct SyncHandle {
    tx: mpsc::Sender<SyncTask>,
    counters: Arc<SyncCounters>,
}

impl SyncHandle {
    /// Queue a task without waiting. A full or closed queue drops the task.
    pub fn enqueue(&self, task: SyncTask) {
        match self.tx.try_send(task) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(task)) => {
                SyncCounters::bump(&self.counters.dropped);
                tracing::warn!(?task, "sync queue full, dropping task");
            }
            Err(mpsc::error::TrySendError::Closed(task)) => {
                SyncCounters::bump(&self.counters.dropped);
                tracing::warn!(?task, "sync worker gone, dropping task");
            }
        }
    }

    pub fn stats(&self) -> SyncStats {
        self.counters.snapshot()
    }
}

/// Consumer side of the sync queue, handed to [`SyncWorker::run`]
pub struct SyncReceiver {
    rx: mpsc::Receiver<SyncTask>,
    counters: Arc<SyncCounters>,
}

impl SyncReceiver {
    /// Take a queued task without running it
    pub fn try_recv(&mut self) -> Option<SyncTask> {
        self.rx.try_recv().ok()
    }
}

/// Create a bounded sync queue
pub fn channel(capacity: usize) -> (SyncHandle, SyncReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let counters = Arc::new(SyncCounters::default());
    (
        SyncHandle {
            tx,
            counters: Arc::clone(&counters),
        },
        SyncReceiver { rx, counters },
    )
}

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`, given `attempt` failures so far
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl From<&SyncConfig> for RetryPolicy {
    fn from(config: &SyncConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_backoff: config.initial_backoff,
            max_backoff: config.max_backoff,
        }
    }
}

struct Pending {
    ready_at: Instant,
    seq: u64,
    attempt: u32,
    task: SyncTask,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.ready_at, self.seq).cmp(&(other.ready_at, other.seq))
    }
}

enum Delivery {
    Delivered,
    Skipped(&'static str),
}

/// Background worker delivering sync tasks
pub struct SyncWorker<P> {
    store: Arc<Store>,
    platform: P,
    policy: RetryPolicy,
}

impl<P: CommercePlatform> SyncWorker<P> {
    pub fn new(store: Arc<Store>, platform: P, policy: RetryPolicy) -> Self {
        Self {
            store,
            platform,
            policy,
        }
    }

    /// Run until every producer handle is dropped and no retries remain
    pub async fn run(self, receiver: SyncReceiver) {
        let SyncReceiver { mut rx, counters } = receiver;
        let mut pending: BinaryHeap<Reverse<Pending>> = BinaryHeap::new();
        let mut seq = 0u64;
        let mut open = true;

        loop {
            let next_ready = pending.peek().map(|Reverse(p)| p.ready_at);
            tokio::select! {
                received = rx.recv(), if open => match received {
                    Some(task) => {
                        seq += 1;
                        pending.push(Reverse(Pending { ready_at: Instant::now(), seq, attempt: 1, task }));
                    }
                    None => open = false,
                },
                _ = sleep_until(next_ready), if next_ready.is_some() => {
                    let Some(Reverse(item)) = pending.pop() else { continue };
                    if let Some(retry) = self.attempt(item, &counters).await {
                        seq += 1;
                        pending.push(Reverse(Pending { seq, ..retry }));
                    }
                }
                else => break,
            }
        }
        tracing::info!(stats = ?counters.snapshot(), "sync worker stopped");
    }

    /// Deliver one task; returns the rescheduled task if it should retry
    async fn attempt(&self, item: Pending, counters: &SyncCounters) -> Option<Pending> {
        match self.deliver(&item.task).await {
            Ok(Delivery::Delivered) => {
                SyncCounters::bump(&counters.delivered);
                tracing::debug!(task = ?item.task, attempt = item.attempt, "synced");
                None
            }
            Ok(Delivery::Skipped(why)) => {
                SyncCounters::bump(&counters.skipped);
                tracing::debug!(task = ?item.task, why, "sync skipped");
                None
            }
            Err(e) if e.is_retryable() && item.attempt < self.policy.max_attempts => {
                SyncCounters::bump(&counters.retried);
                let delay = self.policy.backoff(item.attempt);
                tracing::warn!(
                    task = ?item.task,
                    attempt = item.attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "sync failed, will retry"
                );
                Some(Pending {
                    ready_at: Instant::now() + delay,
                    seq: item.seq,
                    attempt: item.attempt + 1,
                    task: item.task,
                })
            }
            Err(e) => {
                SyncCounters::bump(&counters.dropped);
                tracing::error!(
                    task = ?item.task,
                    attempt = item.attempt,
                    error = %e,
                    "sync failed, giving up"
                );
                None
            }
        }
    }

    async fn deliver(&self, task: &SyncTask) -> Result<Delivery, CommerceError> {
        match task {
            SyncTask::CustomerProfile { customer_id } => {
                let Some(customer) = self.store.customer(customer_id) else {
                    return Ok(Delivery::Skipped("unknown customer"));
                };
                let Some(external_id) = customer.external_id.clone() else {
                    return Ok(Delivery::Skipped("customer has no platform id"));
                };
                let update = profile_update(&customer, self.store.latest_balance(customer_id));
                self.platform
                    .update_customer_profile(&external_id, &update)
                    .await?;
                Ok(Delivery::Delivered)
            }
            SyncTask::OrderPoints { order_id } => {
                let Some(order) = self.store.order(order_id) else {
                    return Ok(Delivery::Skipped("unknown order"));
                };
                let Some(external_id) = order.external_id.as_deref() else {
                    return Ok(Delivery::Skipped("order has no platform id"));
                };
                self.platform
                    .update_order_metafield(
                        external_id,
                        METAFIELD_NAMESPACE,
                        POINTS_KEY,
                        order.recorded_points(),
                    )
                    .await?;
                Ok(Delivery::Delivered)
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Profile payload: the customer's own tags with the loyalty tags
/// replaced, current balance, and tier classified from lifetime spend
pub fn profile_update(customer: &Customer, balance: i64) -> ProfileUpdate {
    let tier = classify(customer.amount_spent_minor).tier;
    let mut tags: Vec<String> = customer
        .tags
        .iter()
        .filter(|t| t.as_str() != LOYALTY_TAG && !t.starts_with(TIER_TAG_PREFIX))
        .cloned()
        .collect();
    tags.push(LOYALTY_TAG.to_string());
    tags.push(format!("{}{}", TIER_TAG_PREFIX, tier.label().to_lowercase()));
    ProfileUpdate {
        tags,
        points: balance,
        tier,
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
