// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn fake_clock_advance_moves_all_timebases() {
    let clock = FakeClock::new();
    let start_instant = clock.now();
    let start_epoch = clock.epoch_ms();
    let start_mono = clock.monotonic_ms();

    clock.advance(Duration::from_millis(2500));

    assert_eq!(clock.now() - start_instant, Duration::from_millis(2500));
    assert_eq!(clock.epoch_ms() - start_epoch, 2500);
    assert_eq!(clock.monotonic_ms() - start_mono, 2500);
}

#[test]
fn fake_clock_set_epoch_ms() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(42);
    assert_eq!(clock.epoch_ms(), 42);
}

#[test]
fn fake_clock_clones_share_state() {
    let clock = FakeClock::new();
    let other = clock.clone();
    clock.advance(Duration::from_secs(1));
    assert_eq!(other.monotonic_ms(), clock.monotonic_ms());
}

#[test]
fn system_clock_monotonic_never_decreases() {
    let clock = SystemClock;
    let a = clock.monotonic_ms();
    let b = clock.monotonic_ms();
    assert!(b >= a);
}
