// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn fake_clock_advances_both_instant_and_epoch() {
    let clock = FakeClock::new();
    let t0 = clock.now();
    let e0 = clock.epoch_ms();

    clock.advance(Duration::from_millis(500));

    assert_eq!(clock.now(), t0 + Duration::from_millis(500));
    assert_eq!(clock.epoch_ms(), e0 + 500);
}

#[test]
fn fake_clock_epoch_can_be_pinned() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(42);
    assert_eq!(clock.epoch_ms(), 42);
}

#[test]
fn system_clock_epoch_is_plausible() {
    let clock = SystemClock;
    // Any time after this crate was written.
    assert!(clock.epoch_ms() > 1_700_000_000_000);
}
