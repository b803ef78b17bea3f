//! Time source.
//!
//! Creation and history timestamps are taken from an injected [`Clock`] so
//! tests can pin them.

use chrono::{DateTime, Utc};

/// Source of "now" for persisted timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
