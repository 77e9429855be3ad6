// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    zero = { 0, TierName::Welcomed, 0 },
    just_below_bronze = { 19_999, TierName::Welcomed, 0 },
    bronze_boundary = { 20_000, TierName::Bronze, 10 },
    silver_boundary = { 50_000, TierName::Silver, 15 },
    silver_600 = { 60_000, TierName::Silver, 15 },
    just_below_gold = { 74_999, TierName::Silver, 15 },
    gold_boundary = { 75_000, TierName::Gold, 20 },
    platinum_boundary = { 100_000, TierName::Platinum, 25 },
    far_above = { 10_000_000, TierName::Platinum, 25 },
    negative = { -500, TierName::Welcomed, 0 },
)]
fn classify_half_open_intervals(spend: i64, tier: TierName, tenths: u32) {
    let c = classify(spend);
    assert_eq!(c.tier, tier);
    assert_eq!(c.multiplier.tenths(), tenths);
}

#[parameterized(
    silver_100_euro = { 15, 10_000, 150 },
    bronze_rounds_down = { 10, 1_999, 19 },
    gold_odd_cents = { 20, 12_345, 246 },
    platinum = { 25, 10_001, 250 },
    welcomed_earns_nothing = { 0, 99_999, 0 },
)]
fn multiplier_points_floor(tenths: u32, amount: i64, expected: i64) {
    assert_eq!(Multiplier::from_tenths(tenths).points_for(amount), expected);
}

#[test]
fn progress_reports_remaining_spend() {
    let p = progress(60_000);
    assert_eq!(p.tier, TierName::Silver);
    assert_eq!(p.next, Some(TierName::Gold));
    assert_eq!(p.to_next_minor, Some(15_000));
}

#[test]
fn progress_at_top_tier_has_no_next() {
    let p = progress(250_000);
    assert_eq!(p.tier, TierName::Platinum);
    assert_eq!(p.next, None);
    assert_eq!(p.to_next_minor, None);
}

#[test]
fn tier_gate_is_ordered() {
    assert!(TierName::Gold.satisfies(TierName::Silver));
    assert!(TierName::Silver.satisfies(TierName::Silver));
    assert!(!TierName::Bronze.satisfies(TierName::Silver));
}

#[test]
fn tier_names_parse_case_insensitively() {
    assert_eq!("gold".parse::<TierName>().unwrap(), TierName::Gold);
    assert_eq!("No Tier".parse::<TierName>().unwrap(), TierName::Welcomed);
    assert!("diamond".parse::<TierName>().is_err());
}

#[test]
fn multiplier_displays_as_decimal() {
    assert_eq!(TierName::Silver.multiplier().to_string(), "1.5");
    assert_eq!(TierName::Welcomed.multiplier().to_string(), "0.0");
}

#[test]
fn canonical_basis_is_lifetime_spend() {
    assert_eq!(TierBasis::CANONICAL, TierBasis::LifetimeSpend);
}
