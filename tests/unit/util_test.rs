//! Tests for utility functions

use std::time::Duration;

use sp_scheduler::util::{after_ms, init_tracing, now_ms};

#[test]
fn test_now_ms_is_monotonic_enough() {
    let a = now_ms();
    let b = now_ms();
    assert!(a > 1_600_000_000_000);
    assert!(b >= a);
}

#[test]
fn test_after_ms_adds_duration() {
    assert_eq!(after_ms(500, Duration::from_millis(250)), 750);
    assert_eq!(after_ms(0, Duration::from_secs(3_600)), 3_600_000);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
    tracing::info!("tracing initialised twice without panicking");
}
