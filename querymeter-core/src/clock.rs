//! Clock abstraction
//!
//! Collection-interval throttling and elapsed-time transformers read the
//! current time through this trait so tests can drive time by hand.

use chrono::{DateTime, Duration, Utc};
use std::time::Instant;

/// Source of the current UTC time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real clock. Readings start at the wall time captured by [`new`] and
/// advance with the monotonic clock, so they never move backwards when the
/// system clock is stepped.
///
/// [`new`]: SystemClock::new
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    wall: DateTime<Utc>,
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            wall: Utc::now(),
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Duration::from_std(self.start.elapsed())
            .ok()
            .and_then(|elapsed| self.wall.checked_add_signed(elapsed))
            .unwrap_or_else(Utc::now)
    }
}
