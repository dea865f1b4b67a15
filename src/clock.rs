//! Clock seam for the domain
//!
//! Entities and the lock repository stamp timestamps through this trait so
//! tests can pin time instead of sleeping.

use chrono::{DateTime, Utc};

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Test clock that always returns the same instant.
#[cfg(test)]
pub struct FixedClock(pub DateTime<Utc>);

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
pub fn fixed_clock() -> FixedClock {
    use chrono::TimeZone;
    FixedClock(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
}
