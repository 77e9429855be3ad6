// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn fake_clock_starts_at_fixed_point() {
    let clock = FakeClock::new();
    assert_eq!(clock.now().to_rfc3339(), "2026-01-01T00:00:00+00:00");
}

#[test]
fn fake_clock_can_be_advanced() {
    let clock = FakeClock::new();
    let t1 = clock.now();
    clock.advance(Duration::days(3));
    assert_eq!(clock.now() - t1, Duration::days(3));
}

#[test]
fn fake_clock_is_cloneable_and_shared() {
    let clock1 = FakeClock::new();
    let clock2 = clock1.clone();
    let t1 = clock1.now();
    clock2.advance(Duration::seconds(30));
    assert_eq!(clock1.now() - t1, Duration::seconds(30));
}

#[test]
fn fake_clock_set_overrides_time() {
    let clock = FakeClock::new();
    let target = Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap();
    clock.set(target);
    assert_eq!(clock.now(), target);
}
