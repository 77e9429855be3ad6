// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests

use crate::sync::{self, SyncReceiver, SyncTask};
use crate::{Engine, EngineConfig, EngineDeps};
use chrono::{TimeZone, Utc};
use loy_adapters::FakeCommerceAdapter;
use loy_core::{
    Customer, CustomerId, FakeClock, Offer, OfferId, OfferType, Order, OrderId, Reward,
    RewardCatalog, RewardId, SequentialIdGen,
};
use loy_storage::Store;
use std::sync::Arc;

pub(crate) type TestEngine = Engine<FakeCommerceAdapter, FakeClock, SequentialIdGen>;

pub(crate) struct Harness {
    pub engine: TestEngine,
    pub store: Arc<Store>,
    pub platform: FakeCommerceAdapter,
    pub clock: FakeClock,
    pub sync_rx: SyncReceiver,
}

impl Harness {
    /// Tasks queued so far, in order
    pub fn drain_sync(&mut self) -> Vec<SyncTask> {
        let mut tasks = Vec::new();
        while let Some(task) = self.sync_rx.try_recv() {
            tasks.push(task);
        }
        tasks
    }
}

pub(crate) fn reward(id: &str, points_cost: i64, value_minor: i64) -> Reward {
    Reward {
        id: RewardId::new(id),
        title: format!("{} off", value_minor / 100),
        points_cost,
        value_minor,
        currency: "EUR".to_string(),
    }
}

pub(crate) fn setup() -> Harness {
    setup_with(EngineConfig::default())
}

pub(crate) fn setup_with(config: EngineConfig) -> Harness {
    let store = Arc::new(Store::in_memory());
    let platform = FakeCommerceAdapter::new();
    let clock = FakeClock::new();
    let (sync, sync_rx) = sync::channel(256);
    let catalog = RewardCatalog::new([reward("five", 500, 500), reward("twenty", 2000, 2000)]);
    let engine = Engine::new(
        EngineDeps {
            store: Arc::clone(&store),
            platform: platform.clone(),
            catalog,
            sync,
        },
        clock.clone(),
        SequentialIdGen::new("rdm"),
        config,
    );
    Harness {
        engine,
        store,
        platform,
        clock,
        sync_rx,
    }
}

/// Customer `id` with platform id `ext` and the given lifetime spend
pub(crate) fn seed_customer(store: &Store, id: &str, ext: &str, spend_minor: i64) -> CustomerId {
    let customer = Customer::new(id, spend_minor).with_external_id(ext);
    let customer_id = customer.id.clone();
    store.upsert_customer(customer).unwrap();
    customer_id
}

pub(crate) fn seed_order(store: &Store, customer: &CustomerId, id: &str, total_minor: i64) -> OrderId {
    let order = Order {
        id: OrderId::new(id),
        customer_id: customer.clone(),
        order_number: format!("#{}", id),
        total_minor,
        currency: "EUR".to_string(),
        created_at: Utc.with_ymd_and_hms(2025, 12, 1, 12, 0, 0).unwrap(),
        points_earned: None,
        external_id: Some(format!("ext-{}", id)),
    };
    let order_id = order.id.clone();
    store.insert_order(order).unwrap();
    order_id
}

pub(crate) fn points_offer(id: &str, points: i64) -> Offer {
    Offer {
        id: OfferId::new(id),
        name: format!("Bonus {}", id),
        description: String::new(),
        offer_type: OfferType::Points,
        points_cost: points,
        active: true,
        starts_at: None,
        ends_at: None,
        tier_required: None,
        cashback: None,
    }
}

/// A CASHBACK offer carrying its ratio only in the description text
pub(crate) fn legacy_cashback_offer(id: &str, description: &str) -> Offer {
    Offer {
        offer_type: OfferType::Cashback,
        description: description.to_string(),
        points_cost: 0,
        ..points_offer(id, 0)
    }
}
