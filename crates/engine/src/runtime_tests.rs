// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{seed_customer, setup};
use std::cell::Cell;
use yare::parameterized;

#[parameterized(
    internal = { "cus-1" },
    numeric = { "4242" },
    global_id = { "gid://shopify/Customer/4242" },
    padded = { "  004242 " },
)]
fn resolves_every_accepted_form(raw: &str) {
    let h = setup();
    seed_customer(&h.store, "cus-1", "4242", 0);

    let customer = h.engine.resolve(raw).unwrap();
    assert_eq!(customer.id.as_str(), "cus-1");
}

#[test]
fn resolve_distinguishes_malformed_from_unknown() {
    let h = setup();
    seed_customer(&h.store, "cus-1", "4242", 0);

    assert!(matches!(
        h.engine.resolve("gid://shopify/Order/1"),
        Err(EngineError::MalformedCustomer(_))
    ));
    assert!(matches!(
        h.engine.resolve("9999"),
        Err(EngineError::CustomerNotFound(raw)) if raw == "9999"
    ));
}

#[test]
fn conflict_retry_succeeds_within_budget() {
    let h = setup();
    let calls = Cell::new(0u32);
    let result = h.engine.with_conflict_retry(|| {
        calls.set(calls.get() + 1);
        if calls.get() < 3 {
            Err(StoreError::ConcurrencyConflict {
                customer: "cus-1".into(),
                expected: 0,
                proposed: 1,
            })
        } else {
            Ok(calls.get())
        }
    });
    assert_eq!(result.unwrap(), 3);
}

#[test]
fn conflict_retry_gives_up_after_budget() {
    let h = setup();
    let calls = Cell::new(0u32);
    let result: Result<(), _> = h.engine.with_conflict_retry(|| {
        calls.set(calls.get() + 1);
        Err(StoreError::ConcurrencyConflict {
            customer: "cus-1".into(),
            expected: 0,
            proposed: 1,
        })
    });
    // one attempt plus three retries
    assert!(matches!(result, Err(EngineError::ConflictRetriesExhausted(4))));
    assert_eq!(calls.get(), 4);
}

#[test]
fn non_conflict_errors_are_not_retried() {
    let h = setup();
    let calls = Cell::new(0u32);
    let result: Result<(), _> = h.engine.with_conflict_retry(|| {
        calls.set(calls.get() + 1);
        Err(StoreError::CustomerNotFound("cus-x".into()))
    });
    assert!(matches!(
        result,
        Err(EngineError::Store(StoreError::CustomerNotFound(_)))
    ));
    assert_eq!(calls.get(), 1);
}

#[test]
fn refresh_writes_back_tier_and_queues_sync() {
    let mut h = setup();
    let id = seed_customer(&h.store, "cus-1", "4242", 10_000);
    let mut customer = h.store.customer(&id).unwrap();
    customer.amount_spent_minor = 80_000;
    h.store.upsert_customer(customer.clone()).unwrap();

    h.engine.refresh_customer(&customer);

    assert_eq!(h.store.customer(&id).unwrap().tier, loy_core::TierName::Gold);
    assert_eq!(
        h.drain_sync(),
        vec![SyncTask::CustomerProfile { customer_id: id }]
    );
}

#[test]
fn status_reports_store_and_catalog() {
    let h = setup();
    seed_customer(&h.store, "cus-1", "4242", 0);

    let status = h.engine.status();
    assert_eq!(status.store.customers, 1);
    assert_eq!(status.rewards, 2);
    assert_eq!(status.sync, SyncStats::default());
}

#[test]
fn engine_config_follows_loyalty_config() {
    let config = LoyaltyConfig::parse(
        r#"
[jobs]
parallelism = 2
lock_shards = 16

[redemption]
conflict_retries = 5
"#,
    )
    .unwrap();
    assert_eq!(
        EngineConfig::from(&config),
        EngineConfig {
            parallelism: 2,
            lock_shards: 16,
            conflict_retries: 5,
        }
    );
}
