// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::{TimeZone, Utc};
use loy_core::{EntryId, SourceType, TierName};

fn entry(id: u64, customer: &str, change: i64, balance_after: i64, source: SourceType) -> LedgerEntry {
    LedgerEntry {
        id: EntryId(id),
        customer_id: CustomerId::new(customer),
        change,
        balance_after,
        reason: "test".to_string(),
        source_type: source,
        source_id: Some(format!("src-{}", id)),
        metadata: BTreeMap::new(),
        created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
    }
}

fn order(id: &str, customer: &str) -> Order {
    Order {
        id: OrderId::new(id),
        customer_id: CustomerId::new(customer),
        order_number: format!("#{}", id),
        total_minor: 10_000,
        currency: "EUR".to_string(),
        created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        points_earned: None,
        external_id: None,
    }
}

#[test]
fn apply_customer_upsert_indexes_external_id() {
    let mut state = MaterializedState::default();
    state.apply(&Operation::CustomerUpsert {
        customer: Customer::new("cust-1", 0).with_external_id("42"),
    });

    let found = state.resolve(&CustomerRef::External("42".to_string()));
    assert_eq!(found.map(|c| c.id.as_str()), Some("cust-1"));
}

#[test]
fn apply_customer_upsert_drops_stale_external_id() {
    let mut state = MaterializedState::default();
    state.apply(&Operation::CustomerUpsert {
        customer: Customer::new("cust-1", 0).with_external_id("42"),
    });
    state.apply(&Operation::CustomerUpsert {
        customer: Customer::new("cust-1", 0).with_external_id("43"),
    });

    assert!(state.resolve(&CustomerRef::External("42".to_string())).is_none());
    assert!(state.resolve(&CustomerRef::External("43".to_string())).is_some());
}

#[test]
fn apply_customer_tier() {
    let mut state = MaterializedState::default();
    state.apply(&Operation::CustomerUpsert {
        customer: Customer::new("cust-1", 0),
    });
    state.apply(&Operation::CustomerTier {
        customer_id: CustomerId::new("cust-1"),
        tier: TierName::Gold,
    });
    assert_eq!(state.customers[&CustomerId::new("cust-1")].tier, TierName::Gold);
}

#[test]
fn apply_ledger_append_tracks_balance_and_sources() {
    let mut state = MaterializedState::default();
    assert_eq!(state.latest_balance(&CustomerId::new("cust-1")), 0);

    state.apply(&Operation::LedgerAppend {
        entry: entry(1, "cust-1", 100, 100, SourceType::Offer),
    });
    state.apply(&Operation::LedgerAppend {
        entry: entry(2, "cust-1", -40, 60, SourceType::Redemption),
    });

    assert_eq!(state.latest_balance(&CustomerId::new("cust-1")), 60);
    assert_eq!(state.last_entry_id, 2);
    assert!(state.sources.contains(&SourceKey::new(
        CustomerId::new("cust-1"),
        SourceType::Offer,
        "src-1"
    )));
}

#[test]
fn apply_order_accrued_updates_points_without_source_key() {
    let mut state = MaterializedState::default();
    state.apply(&Operation::OrderInsert {
        order: order("o-1", "cust-1"),
    });
    state.apply(&Operation::OrderAccrued {
        entry: entry(1, "cust-1", 150, 150, SourceType::Order),
        order_id: OrderId::new("o-1"),
        points: 150,
    });

    assert_eq!(state.orders[&OrderId::new("o-1")].points_earned, Some(150));
    assert!(state.sources.is_empty());
    assert_eq!(state.orders_of(&CustomerId::new("cust-1")).len(), 1);
}

#[test]
fn apply_order_insert_twice_keeps_single_index_entry() {
    let mut state = MaterializedState::default();
    state.apply(&Operation::OrderInsert {
        order: order("o-1", "cust-1"),
    });
    state.apply(&Operation::OrderInsert {
        order: order("o-1", "cust-1"),
    });
    assert_eq!(state.customer_orders[&CustomerId::new("cust-1")].len(), 1);
}
