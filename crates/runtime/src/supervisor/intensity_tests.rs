// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn intensity(max: u32, within_ms: u64) -> RestartIntensity {
    RestartIntensity { max_restarts: max, within: Duration::from_millis(within_ms) }
}

#[test]
fn default_is_three_in_five_seconds() {
    let d = RestartIntensity::default();
    assert_eq!(d.max_restarts, 3);
    assert_eq!(d.within, Duration::from_millis(5_000));
}

#[test]
fn bound_crossed_on_max_plus_one() {
    let intensity = intensity(3, 5_000);
    let mut window = RestartWindow::default();
    assert!(window.record(1_000, &intensity));
    assert!(window.record(1_100, &intensity));
    assert!(window.record(1_200, &intensity));
    // Fourth restart within the window exceeds max_restarts = 3
    assert!(!window.record(1_300, &intensity));
    assert_eq!(window.len(), 4);
}

#[test]
fn old_restarts_age_out_of_the_window() {
    let intensity = intensity(2, 1_000);
    let mut window = RestartWindow::default();
    assert!(window.record(0, &intensity));
    assert!(window.record(100, &intensity));
    // Both prior entries fall outside the trailing window
    assert!(window.record(2_000, &intensity));
    assert_eq!(window.len(), 1);
}

#[test]
fn zero_max_restarts_fails_immediately() {
    let intensity = intensity(0, 1_000);
    let mut window = RestartWindow::default();
    assert!(!window.record(5, &intensity));
}
