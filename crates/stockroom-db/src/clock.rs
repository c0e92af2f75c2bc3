//! # Write Clock
//!
//! Strictly increasing millisecond timestamps for catalog writes and delta
//! sync cursors.
//!
//! ```text
//! wall clock:  1000  1000  1000  999 (NTP step back)  1004
//! this clock:  1000  1001  1002  1003                 1004
//! ```
//!
//! Two writes in one process never share a timestamp, and a `serverTime`
//! handed to a client is strictly below every later write.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, TimeZone, Utc};

/// Process-wide monotonic millisecond clock.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: AtomicI64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        MonotonicClock::default()
    }

    /// Next timestamp: wall-clock milliseconds, or one past the previous
    /// reading if the wall clock has not moved forward.
    pub fn now_ms(&self) -> i64 {
        let wall = Utc::now().timestamp_millis();
        let mut previous = self.last.load(Ordering::Relaxed);
        loop {
            let next = wall.max(previous + 1);
            match self
                .last
                .compare_exchange_weak(previous, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => previous = actual,
            }
        }
    }

    /// Same as [`now_ms`](Self::now_ms) as a `DateTime`.
    pub fn now(&self) -> DateTime<Utc> {
        from_millis(self.now_ms())
    }
}

/// Millisecond timestamp to `DateTime`, saturating at the epoch for values
/// chrono cannot represent.
pub fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or_default()
}
