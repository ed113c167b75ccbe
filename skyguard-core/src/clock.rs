//! Wall-clock abstraction
//!
//! Sample rows, history lines and the freeze stamp all carry station-local
//! time. Tests pin the clock with [`FixedClock`].

use chrono::{Local, NaiveDateTime, Timelike};

/// Source of wall-clock time
pub trait Clock {
    /// Current local time, whole seconds
    fn now(&self) -> NaiveDateTime;
}

/// The system's local clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        let now = Local::now().naive_local();
        now.with_nanosecond(0).unwrap_or(now)
    }
}

/// Settable clock for tests
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    time: NaiveDateTime,
}

impl FixedClock {
    /// Clock stopped at `time`
    pub fn new(time: NaiveDateTime) -> Self {
        Self { time }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.time
    }
}
