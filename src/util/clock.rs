//! Wall-clock helpers shared by the scheduler.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// Add a duration to a millisecond timestamp.
pub fn after_ms(start_ms: u128, duration: Duration) -> u128 {
    start_ms.saturating_add(duration.as_millis())
}
