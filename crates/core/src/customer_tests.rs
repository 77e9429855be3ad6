// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    raw_numeric = { "7283412", "7283412" },
    padded_numeric = { "  7283412 ", "7283412" },
    leading_zeros = { "000042", "42" },
    global_id = { "gid://shopify/Customer/7283412", "7283412" },
)]
fn external_forms_collapse_to_numeric(raw: &str, expected: &str) {
    assert_eq!(
        normalize_customer_ref(raw).unwrap(),
        CustomerRef::External(expected.to_string())
    );
}

#[test]
fn internal_key_passes_through() {
    assert_eq!(
        normalize_customer_ref("cust-19").unwrap(),
        CustomerRef::Internal(CustomerId::new("cust-19"))
    );
}

#[parameterized(
    empty = { "" },
    blank = { "   " },
    wrong_gid_kind = { "gid://shopify/Order/12" },
    gid_without_number = { "gid://shopify/Customer/" },
    embedded_space = { "cust 19" },
)]
fn malformed_refs_are_rejected(raw: &str) {
    assert!(normalize_customer_ref(raw).is_err());
}

#[test]
fn new_customer_caches_classified_tier() {
    let customer = Customer::new("cust-1", 60_000).with_external_id("99");
    assert_eq!(customer.tier, TierName::Silver);
    assert_eq!(customer.external_id.as_deref(), Some("99"));
}

#[test]
fn external_ref_displays_as_global_id() {
    let r = CustomerRef::External("5".to_string());
    assert_eq!(r.to_string(), "gid://shopify/Customer/5");
}
