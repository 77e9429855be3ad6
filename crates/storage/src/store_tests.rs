// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;
use loy_core::verify_chain;
use proptest::prelude::*;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

fn store_with(customer: &str) -> Store {
    let store = Store::in_memory();
    store.upsert_customer(Customer::new(customer, 60_000)).unwrap();
    store
}

fn credit(store: &Store, customer: &str, change: i64, source_id: &str) -> Result<LedgerEntry, StoreError> {
    let id = CustomerId::new(customer);
    let balance = store.latest_balance(&id);
    store.append(
        NewEntry::from_balance(id, balance, change, SourceType::Offer, source_id, "offer"),
        now(),
    )
}

fn order(id: &str, customer: &str, total_minor: i64) -> Order {
    Order {
        id: OrderId::new(id),
        customer_id: CustomerId::new(customer),
        order_number: format!("#{}", id),
        total_minor,
        currency: "EUR".to_string(),
        created_at: now(),
        points_earned: None,
        external_id: None,
    }
}

#[test]
fn latest_balance_is_zero_without_entries() {
    let store = store_with("cust-1");
    assert_eq!(store.latest_balance(&CustomerId::new("cust-1")), 0);
    assert!(store.entries(&CustomerId::new("cust-1")).is_empty());
}

#[test]
fn append_assigns_ids_and_chains_balance() {
    let store = store_with("cust-1");
    let first = credit(&store, "cust-1", 100, "offer-a").unwrap();
    let second = credit(&store, "cust-1", 50, "offer-b").unwrap();

    assert_eq!(first.id, EntryId(1));
    assert_eq!(second.id, EntryId(2));
    assert_eq!(second.balance_after, 150);
    assert_eq!(store.latest_balance(&CustomerId::new("cust-1")), 150);
    assert!(verify_chain(&store.entries(&CustomerId::new("cust-1"))).is_ok());
}

#[test]
fn append_rejects_stale_balance() {
    let store = store_with("cust-1");
    credit(&store, "cust-1", 100, "offer-a").unwrap();

    let stale = NewEntry::from_balance(
        CustomerId::new("cust-1"),
        0,
        40,
        SourceType::Offer,
        "offer-b",
        "offer",
    );
    let err = store.append(stale, now()).unwrap_err();
    assert!(err.is_conflict());
    assert!(matches!(
        err,
        StoreError::ConcurrencyConflict {
            expected: 140,
            proposed: 40,
            ..
        }
    ));
    assert_eq!(store.entries(&CustomerId::new("cust-1")).len(), 1);
}

#[test]
fn append_rejects_duplicate_source() {
    let store = store_with("cust-1");
    credit(&store, "cust-1", 100, "offer-a").unwrap();

    let err = credit(&store, "cust-1", 100, "offer-a").unwrap_err();
    assert!(matches!(err, StoreError::DuplicateSource(_)));
    assert!(!err.is_conflict());
    assert_eq!(store.latest_balance(&CustomerId::new("cust-1")), 100);
}

#[test]
fn same_source_id_is_independent_per_customer() {
    let store = store_with("cust-1");
    store.upsert_customer(Customer::new("cust-2", 0)).unwrap();
    credit(&store, "cust-1", 10, "offer-a").unwrap();
    credit(&store, "cust-2", 10, "offer-a").unwrap();

    assert!(store.has_entry_for(&SourceKey::new(
        CustomerId::new("cust-2"),
        SourceType::Offer,
        "offer-a"
    )));
}

#[test]
fn append_rejects_redemption_below_zero() {
    let store = store_with("cust-1");
    credit(&store, "cust-1", 100, "offer-a").unwrap();

    let entry = NewEntry::from_balance(
        CustomerId::new("cust-1"),
        100,
        -150,
        SourceType::Redemption,
        "rdm-1",
        "reward",
    );
    let err = store.append(entry, now()).unwrap_err();
    assert!(matches!(
        err,
        StoreError::InsufficientBalance {
            balance: 100,
            requested: 150,
            ..
        }
    ));
}

#[test]
fn append_rejects_unknown_customer_and_order_source() {
    let store = Store::in_memory();
    let err = credit(&store, "ghost", 10, "offer-a").unwrap_err();
    assert!(matches!(err, StoreError::CustomerNotFound(_)));

    let store = store_with("cust-1");
    let entry = NewEntry::from_balance(
        CustomerId::new("cust-1"),
        0,
        10,
        SourceType::Order,
        "o-1",
        "order",
    );
    assert!(matches!(
        store.append(entry, now()),
        Err(StoreError::InvalidEntry(_))
    ));
}

#[test]
fn order_accrual_commits_entry_and_points_together() {
    let store = store_with("cust-1");
    store.insert_order(order("o-1", "cust-1", 10_000)).unwrap();
    let id = CustomerId::new("cust-1");

    let entry = NewEntry::from_balance(id.clone(), 0, 150, SourceType::Order, "o-1", "order");
    store
        .append_order_accrual(&OrderId::new("o-1"), 0, 150, entry, now())
        .unwrap();

    assert_eq!(
        store.order(&OrderId::new("o-1")).unwrap().points_earned,
        Some(150)
    );
    assert_eq!(store.latest_balance(&id), 150);

    // Multiplier changed: a second delta against the same order
    let delta = NewEntry::from_balance(id.clone(), 150, 50, SourceType::Order, "o-1", "order");
    store
        .append_order_accrual(&OrderId::new("o-1"), 150, 200, delta, now())
        .unwrap();
    assert_eq!(store.latest_balance(&id), 200);
    assert_eq!(store.entries(&id).len(), 2);
}

#[test]
fn order_accrual_rejects_moved_points() {
    let store = store_with("cust-1");
    store.insert_order(order("o-1", "cust-1", 10_000)).unwrap();
    let id = CustomerId::new("cust-1");

    let entry = NewEntry::from_balance(id.clone(), 0, 150, SourceType::Order, "o-1", "order");
    store
        .append_order_accrual(&OrderId::new("o-1"), 0, 150, entry.clone(), now())
        .unwrap();

    let err = store
        .append_order_accrual(&OrderId::new("o-1"), 0, 150, entry, now())
        .unwrap_err();
    assert!(err.is_conflict());
    assert!(matches!(
        err,
        StoreError::OrderPointsConflict {
            expected: 0,
            found: 150,
            ..
        }
    ));
    assert_eq!(store.entries(&id).len(), 1);
}

#[test]
fn order_accrual_refuses_clawback_past_zero() {
    let store = store_with("cust-1");
    store.insert_order(order("o-1", "cust-1", 10_000)).unwrap();
    let id = CustomerId::new("cust-1");

    let entry = NewEntry::from_balance(id.clone(), 0, 150, SourceType::Order, "o-1", "order");
    store
        .append_order_accrual(&OrderId::new("o-1"), 0, 150, entry, now())
        .unwrap();
    let spend = NewEntry::from_balance(
        id.clone(),
        150,
        -150,
        SourceType::ManualAdjustment,
        "adj-1",
        "spent elsewhere",
    );
    store.append(spend, now()).unwrap();

    let clawback = NewEntry::from_balance(id.clone(), 0, -50, SourceType::Order, "o-1", "order");
    let err = store
        .append_order_accrual(&OrderId::new("o-1"), 150, 100, clawback, now())
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::InsufficientBalance {
            balance: 0,
            requested: 50,
            ..
        }
    ));
    assert!(!err.is_conflict());
    assert_eq!(store.latest_balance(&id), 0);
    assert_eq!(
        store.order(&OrderId::new("o-1")).unwrap().points_earned,
        Some(150)
    );
}

#[test]
fn order_accrual_rejects_wrong_delta() {
    let store = store_with("cust-1");
    store.insert_order(order("o-1", "cust-1", 10_000)).unwrap();
    let entry = NewEntry::from_balance(
        CustomerId::new("cust-1"),
        0,
        99,
        SourceType::Order,
        "o-1",
        "order",
    );
    assert!(matches!(
        store.append_order_accrual(&OrderId::new("o-1"), 0, 150, entry, now()),
        Err(StoreError::InvalidEntry(_))
    ));
}

#[test]
fn insert_order_keeps_existing_copy() {
    let store = store_with("cust-1");
    assert!(store.insert_order(order("o-1", "cust-1", 10_000)).unwrap());
    assert!(!store.insert_order(order("o-1", "cust-1", 99_999)).unwrap());
    assert_eq!(store.order(&OrderId::new("o-1")).unwrap().total_minor, 10_000);
}

#[test]
fn external_order_id_is_set_once() {
    let store = store_with("cust-1");
    store.insert_order(order("o-1", "cust-1", 10_000)).unwrap();
    assert_eq!(store.orders_missing_external_id().len(), 1);

    assert!(store.set_order_external_id(&OrderId::new("o-1"), "9001").unwrap());
    assert!(!store.set_order_external_id(&OrderId::new("o-1"), "9002").unwrap());

    let stored = store.order(&OrderId::new("o-1")).unwrap();
    assert_eq!(stored.external_id.as_deref(), Some("9001"));
    assert!(store.orders_missing_external_id().is_empty());
}

#[test]
fn set_customer_tier_reports_change() {
    let store = store_with("cust-1");
    let id = CustomerId::new("cust-1");
    assert!(!store.set_customer_tier(&id, TierName::Silver).unwrap());
    assert!(store.set_customer_tier(&id, TierName::Gold).unwrap());
    assert_eq!(store.customer(&id).unwrap().tier, TierName::Gold);
}

#[test]
fn customers_with_orders_filters_by_count() {
    let store = store_with("cust-1");
    store.upsert_customer(Customer::new("cust-2", 0)).unwrap();
    store.insert_order(order("o-1", "cust-1", 1)).unwrap();
    store.insert_order(order("o-2", "cust-1", 1)).unwrap();
    store.insert_order(order("o-3", "cust-2", 1)).unwrap();

    let ids = |min| {
        store
            .customers_with_orders(min)
            .into_iter()
            .map(|c| c.id.to_string())
            .collect::<Vec<_>>()
    };
    assert_eq!(ids(1), vec!["cust-1", "cust-2"]);
    assert_eq!(ids(2), vec!["cust-1"]);
}

#[test]
fn entries_since_filters_by_timestamp() {
    let store = store_with("cust-1");
    let id = CustomerId::new("cust-1");
    let early = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let late = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();

    store
        .append(
            NewEntry::from_balance(id.clone(), 0, 10, SourceType::Offer, "a", "offer"),
            early,
        )
        .unwrap();
    store
        .append(
            NewEntry::from_balance(id.clone(), 10, 10, SourceType::Offer, "b", "offer"),
            late,
        )
        .unwrap();

    let since = store.entries_since(&id, late);
    assert_eq!(since.len(), 1);
    assert_eq!(since[0].source_id.as_deref(), Some("b"));
}

#[test]
fn upsert_offer_skips_identical() {
    let store = Store::in_memory();
    let offer = Offer {
        id: OfferId::new("welcome"),
        name: "Welcome".to_string(),
        description: String::new(),
        offer_type: loy_core::OfferType::Points,
        points_cost: 50,
        active: true,
        starts_at: None,
        ends_at: None,
        tier_required: None,
        cashback: None,
    };
    assert!(store.upsert_offer(offer.clone()).unwrap());
    assert!(!store.upsert_offer(offer).unwrap());
    assert_eq!(store.offers().len(), 1);
}

#[test]
fn reopen_replays_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.wal");
    {
        let store = Store::open(&path).unwrap();
        store
            .upsert_customer(Customer::new("cust-1", 0).with_external_id("77"))
            .unwrap();
        credit(&store, "cust-1", 100, "offer-a").unwrap();
    }

    let store = Store::open(&path).unwrap();
    let id = CustomerId::new("cust-1");
    assert_eq!(store.latest_balance(&id), 100);
    assert!(store.has_entry_for(&SourceKey::new(id.clone(), SourceType::Offer, "offer-a")));
    assert_eq!(
        store
            .resolve_customer(&CustomerRef::External("77".to_string()))
            .map(|c| c.id),
        Some(id)
    );

    // Ids keep counting after replay
    let next = credit(&store, "cust-1", 1, "offer-b").unwrap();
    assert_eq!(next.id, EntryId(2));
    assert_eq!(store.stats().wal_sequence, 3);
}

proptest! {
    #[test]
    fn ledger_chain_holds_under_any_sequence(
        ops in proptest::collection::vec((0usize..3, -200i64..300), 1..60)
    ) {
        let store = Store::in_memory();
        let names = ["a", "b", "c"];
        for name in names {
            store.upsert_customer(Customer::new(name, 0)).unwrap();
        }

        for (i, (who, change)) in ops.iter().enumerate() {
            let id = CustomerId::new(names[*who]);
            let balance = store.latest_balance(&id);
            let source_type = if *change < 0 { SourceType::Redemption } else { SourceType::Offer };
            let entry = NewEntry::from_balance(id, balance, *change, source_type, format!("src-{}", i), "prop");
            let _ = store.append(entry, now());
        }

        for name in names {
            let entries = store.entries(&CustomerId::new(name));
            prop_assert!(verify_chain(&entries).is_ok());
            prop_assert!(entries.iter().all(|e| e.balance_after >= 0));
        }
    }
}
