//! Time-of-day window containment for lunch detection and shift-start
//! auto-clear.
//!
//! Windows may wrap past midnight: `{start: 22:00, end: 03:00}` contains
//! 23:30 and 01:00 but not 10:00.

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// A daily time-of-day window. `end` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Containment with midnight wrap-around: when `start >= end` the window
    /// spans midnight and matches `t >= start || t < end`.
    pub fn contains(&self, t: NaiveTime) -> bool {
        if self.start < self.end {
            self.start <= t && t < self.end
        } else {
            t >= self.start || t < self.end
        }
    }
}

/// True when `t` falls inside any of the given windows.
pub fn in_any_window(windows: &[TimeWindow], t: NaiveTime) -> bool {
    windows.iter().any(|w| w.contains(t))
}

/// True when `t` falls inside the one-minute tolerance window of any
/// configured shift start. Minute granularity: a shift starting at 06:00
/// matches any wall-clock reading in [06:00, 06:01).
pub fn shift_clear_active(shift_starts: &[NaiveTime], t: NaiveTime) -> bool {
    let current = t.hour() * 60 + t.minute();
    shift_starts.iter().any(|start| {
        let window_start = start.hour() * 60 + start.minute();
        current >= window_start && current < window_start + 1
    })
}
