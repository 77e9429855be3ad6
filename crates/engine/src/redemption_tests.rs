// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::test_support::{points_offer, seed_customer, seed_order, setup, Harness};
use crate::{RedeemError, SyncTask};
use loy_adapters::CommerceCall;
use loy_core::{verify_chain, CustomerId, RewardId, SourceType};
use std::time::Duration;

/// Seed a Bronze customer holding `balance` points
async fn customer_with_balance(h: &Harness, balance: i64) -> CustomerId {
    let id = seed_customer(&h.store, "cus-1", "4242", 30_000);
    seed_order(&h.store, &id, "1001", 30_000);
    h.store.upsert_offer(points_offer("seed", balance)).unwrap();
    h.engine.run_offer_eligibility().await;
    assert_eq!(h.store.latest_balance(&id), balance);
    id
}

#[tokio::test]
async fn redeem_spends_exact_balance() {
    let mut h = setup();
    let id = customer_with_balance(&h, 500).await;
    h.drain_sync();

    let done = h
        .engine
        .redeem("4242", &RewardId::new("five"))
        .await
        .unwrap();

    assert_eq!(done.new_balance, 0);
    assert_eq!(done.code, "FAKE-0001");
    assert_eq!(done.redemption_id.as_str(), "rdm-1");
    assert_eq!(h.platform.issue_count(), 1);
    assert_eq!(done.entry.change, -500);
    assert_eq!(done.entry.source_type, SourceType::Redemption);
    assert_eq!(done.entry.source_id.as_deref(), Some("rdm-1"));
    assert_eq!(done.entry.metadata.get("reward_id").map(String::as_str), Some("five"));
    assert_eq!(done.entry.metadata.get("code").map(String::as_str), Some("FAKE-0001"));
    assert_eq!(h.store.latest_balance(&id), 0);
    assert_eq!(
        h.drain_sync(),
        vec![SyncTask::CustomerProfile { customer_id: id }]
    );
}

#[tokio::test]
async fn discount_carries_reward_value() {
    let h = setup();
    customer_with_balance(&h, 2_000).await;

    h.engine
        .redeem("gid://shopify/Customer/4242", &RewardId::new("twenty"))
        .await
        .unwrap();

    let issued: Vec<_> = h
        .platform
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            CommerceCall::IssueDiscountCode { request } => Some(request),
            _ => None,
        })
        .collect();
    assert_eq!(issued.len(), 1);
    assert_eq!(issued[0].value_minor, 2_000);
    assert_eq!(issued[0].currency, "EUR");
}

#[tokio::test]
async fn insufficient_points_writes_nothing_and_issues_nothing() {
    let h = setup();
    let id = customer_with_balance(&h, 499).await;

    let err = h
        .engine
        .redeem("cus-1", &RewardId::new("five"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RedeemError::InsufficientPoints {
            balance: 499,
            cost: 500
        }
    ));
    assert_eq!(err.reason(), "insufficient_points");
    assert_eq!(h.platform.issue_count(), 0);
    assert_eq!(h.store.entries(&id).len(), 1);
}

#[tokio::test]
async fn issuance_failure_leaves_ledger_untouched() {
    let h = setup();
    let id = customer_with_balance(&h, 500).await;
    h.platform.fail_issuance(true);

    let err = h
        .engine
        .redeem("cus-1", &RewardId::new("five"))
        .await
        .unwrap_err();

    assert!(matches!(err, RedeemError::CodeIssuanceFailed(_)));
    assert_eq!(h.store.latest_balance(&id), 500);
    assert_eq!(h.store.entries(&id).len(), 1);
}

#[tokio::test]
async fn unknown_reward_and_customer_are_rejected() {
    let h = setup();
    customer_with_balance(&h, 500).await;

    let bad_reward = h
        .engine
        .redeem("cus-1", &RewardId::new("nope"))
        .await
        .unwrap_err();
    let bad_customer = h
        .engine
        .redeem("9999", &RewardId::new("five"))
        .await
        .unwrap_err();
    let malformed = h
        .engine
        .redeem("gid://shopify/Order/1", &RewardId::new("five"))
        .await
        .unwrap_err();

    assert_eq!(bad_reward.reason(), "invalid_reward");
    assert_eq!(bad_customer.reason(), "customer_not_found");
    assert_eq!(malformed.reason(), "customer_not_found");
    assert_eq!(h.platform.issue_count(), 0);
}

#[tokio::test]
async fn concurrent_redemptions_cannot_overdraw() {
    let h = setup();
    let id = customer_with_balance(&h, 500).await;
    h.platform.set_issue_delay(Duration::from_millis(20));

    let reward = RewardId::new("five");
    let (a, b) = tokio::join!(
        h.engine.redeem("cus-1", &reward),
        h.engine.redeem("4242", &reward)
    );

    let outcomes = [a, b];
    let succeeded = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 1);
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(RedeemError::InsufficientPoints { balance: 0, .. }))));
    assert_eq!(h.platform.issue_count(), 1);
    assert_eq!(h.store.latest_balance(&id), 0);
    assert!(verify_chain(&h.store.entries(&id)).is_ok());
}

#[tokio::test]
async fn batch_jobs_racing_a_redemption_keep_the_chain() {
    let h = setup();
    let id = customer_with_balance(&h, 500).await;
    seed_order(&h.store, &id, "1002", 10_000);
    h.store.upsert_offer(points_offer("bonus", 300)).unwrap();
    h.platform.set_issue_delay(Duration::from_millis(20));

    let reward = RewardId::new("five");
    let (redeemed, offers, accrual) = tokio::join!(
        h.engine.redeem("4242", &reward),
        h.engine.run_offer_eligibility(),
        h.engine.run_order_accrual()
    );

    assert_eq!(redeemed.unwrap().entry.change, -500);
    assert_eq!(offers.applied_count, 1);
    assert_eq!(accrual.updated, 2);
    let entries = h.store.entries(&id);
    assert_eq!(entries.len(), 5);
    assert!(verify_chain(&entries).is_ok());
    // seed 500, bonus 300, orders 300 + 100, reward -500
    assert_eq!(h.store.latest_balance(&id), 700);
}

#[tokio::test]
async fn repeated_redemptions_get_distinct_ids() {
    let h = setup();
    let id = customer_with_balance(&h, 1_000).await;
    let reward = RewardId::new("five");

    let first = h.engine.redeem("cus-1", &reward).await.unwrap();
    let second = h.engine.redeem("cus-1", &reward).await.unwrap();

    assert_ne!(first.redemption_id, second.redemption_id);
    assert_ne!(first.code, second.code);
    assert_eq!(second.new_balance, 0);
    assert_eq!(h.store.entries(&id).len(), 3);
}
