//! The worker ledger: badge id → accrued minutes and current clock state.
//!
//! The ledger is fully derivable from the scan-event log. [`WorkerLedger::
//! reconstruct`] is the pure replay used both for incremental recovery and
//! after adopting a remote log; running it twice over the same input yields
//! identical ledgers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::{ScanAction, ScanEvent};

/// Whether a worker is currently on the clock.
///
/// Modeled as a sum type so "clocked in but timestamp missing" is
/// unrepresentable; the wire form stays a nullable timestamp for
/// fleet-document compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "Option<DateTime<Utc>>", into = "Option<DateTime<Utc>>")]
pub enum ClockState {
    Off,
    On { since: DateTime<Utc> },
}

impl From<Option<DateTime<Utc>>> for ClockState {
    fn from(value: Option<DateTime<Utc>>) -> Self {
        match value {
            Some(since) => ClockState::On { since },
            None => ClockState::Off,
        }
    }
}

impl From<ClockState> for Option<DateTime<Utc>> {
    fn from(value: ClockState) -> Self {
        match value {
            ClockState::On { since } => Some(since),
            ClockState::Off => None,
        }
    }
}

impl ClockState {
    pub fn is_on(&self) -> bool {
        matches!(self, ClockState::On { .. })
    }
}

/// One worker's standing within the current session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    pub badge_id: String,
    pub clock: ClockState,
    /// Stored in minutes. Monotonically non-decreasing except through an
    /// explicit operator edit, which revokes bonus eligibility upstream.
    pub minutes_worked: f64,
}

impl Worker {
    fn new(badge_id: &str) -> Self {
        Self {
            badge_id: badge_id.to_string(),
            clock: ClockState::Off,
            minutes_worked: 0.0,
        }
    }
}

/// Badge id → worker map with explicit existence/activity queries, so
/// lookups never create entries as a side effect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerLedger {
    workers: HashMap<String, Worker>,
}

impl WorkerLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a ledger by replaying scan events.
    ///
    /// Events are replayed in ascending timestamp order regardless of input
    /// order. A clock-out with no open clock-in is a no-op; duplicated
    /// clock-ins just move the open timestamp. Pure and deterministic.
    pub fn reconstruct(events: &[ScanEvent]) -> Self {
        let mut sorted: Vec<&ScanEvent> = events.iter().collect();
        sorted.sort_by_key(|e| e.timestamp);

        let mut ledger = WorkerLedger::new();
        for event in sorted {
            let worker = ledger
                .workers
                .entry(event.badge_id.clone())
                .or_insert_with(|| Worker::new(&event.badge_id));

            match event.action {
                ScanAction::ClockIn => {
                    worker.clock = ClockState::On {
                        since: event.timestamp,
                    };
                }
                ScanAction::ClockOut => {
                    if let ClockState::On { since } = worker.clock {
                        let minutes =
                            (event.timestamp - since).num_milliseconds() as f64 / 60_000.0;
                        worker.minutes_worked += minutes;
                        worker.clock = ClockState::Off;
                    }
                }
            }
        }
        ledger
    }

    /// Opens a clock-in for the badge at `now`, creating the worker on first
    /// scan. Returns false (no-op) when the worker is already clocked in.
    pub fn clock_in(&mut self, badge_id: &str, now: DateTime<Utc>) -> bool {
        let worker = self
            .workers
            .entry(badge_id.to_string())
            .or_insert_with(|| Worker::new(badge_id));
        if worker.clock.is_on() {
            return false;
        }
        worker.clock = ClockState::On { since: now };
        true
    }

    /// Closes an open clock-in, accruing `(now - since)` as minutes. Returns
    /// the accrued minutes, or None when the badge had no open clock-in.
    pub fn clock_out(&mut self, badge_id: &str, now: DateTime<Utc>) -> Option<f64> {
        let worker = self.workers.get_mut(badge_id)?;
        let ClockState::On { since } = worker.clock else {
            return None;
        };
        let minutes = (now - since).num_milliseconds() as f64 / 60_000.0;
        worker.minutes_worked += minutes;
        worker.clock = ClockState::Off;
        Some(minutes)
    }

    /// Workers with an open clock-in. Recomputed on demand, never stored.
    pub fn headcount(&self) -> usize {
        self.workers.values().filter(|w| w.clock.is_on()).count()
    }

    pub fn contains(&self, badge_id: &str) -> bool {
        self.workers.contains_key(badge_id)
    }

    pub fn is_active(&self, badge_id: &str) -> bool {
        self.workers
            .get(badge_id)
            .map(|w| w.clock.is_on())
            .unwrap_or(false)
    }

    pub fn get(&self, badge_id: &str) -> Option<&Worker> {
        self.workers.get(badge_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Worker> {
        self.workers.values()
    }

    /// Badges currently clocked in, sorted for deterministic iteration.
    pub fn active_badges(&self) -> Vec<String> {
        let mut badges: Vec<String> = self
            .workers
            .values()
            .filter(|w| w.clock.is_on())
            .map(|w| w.badge_id.clone())
            .collect();
        badges.sort();
        badges
    }

    /// Overwrites a worker's accrued minutes. Returns false for an unknown
    /// badge; never creates one.
    pub fn set_total_minutes(&mut self, badge_id: &str, minutes: f64) -> bool {
        match self.workers.get_mut(badge_id) {
            Some(worker) => {
                worker.minutes_worked = minutes;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn clear(&mut self) {
        self.workers.clear();
    }
}
