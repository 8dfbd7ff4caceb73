// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_is_monotonic() {
    let clock = SystemClock;
    let t1 = clock.now();
    std::thread::sleep(Duration::from_millis(1));
    assert!(clock.now() > t1);
}

#[test]
fn fake_clock_advances_both_time_sources() {
    let clock = FakeClock::new();
    let (i1, u1) = (clock.now(), clock.utc_now());

    clock.advance(Duration::from_secs(90));

    assert_eq!(clock.now().duration_since(i1), Duration::from_secs(90));
    assert_eq!((clock.utc_now() - u1).num_seconds(), 90);
}

#[test]
fn fake_clock_clones_share_time() {
    let clock = FakeClock::new();
    let other = clock.clone();
    let start = clock.now();

    other.advance(Duration::from_secs(30 * 60));

    assert!(clock.now().duration_since(start) >= Duration::from_secs(30 * 60));
}

#[test]
fn fake_clock_does_not_move_on_its_own() {
    let clock = FakeClock::new();
    let t1 = clock.now();
    std::thread::sleep(Duration::from_millis(2));
    assert_eq!(clock.now(), t1);
}
