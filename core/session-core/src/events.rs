//! Append-only event logs: badge scans and project-level events.
//!
//! The event log is the ground truth other components derive from. Scan
//! events rebuild the worker ledger (see [`crate::ledger`]); project events
//! feed the audit trail and the pause/lunch counters. Wire strings match the
//! fleet-document schema, so these types serialize directly into the shared
//! remote document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The action taken when a badge is scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanAction {
    #[serde(rename = "Clocked In")]
    ClockIn,
    #[serde(rename = "Clocked Out")]
    ClockOut,
}

/// One badge scan. Immutable once appended.
///
/// Ordering is by timestamp, not insertion order: replay and remote log
/// adoption can interleave locally- and remotely-sourced events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanEvent {
    pub badge_id: String,
    pub timestamp: DateTime<Utc>,
    pub action: ScanAction,
}

/// Project-level event categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectEventKind {
    #[serde(rename = "Pause")]
    Pause,
    #[serde(rename = "Lunch")]
    Lunch,
    #[serde(rename = "Saved")]
    Save,
    #[serde(rename = "QC (Crew)")]
    QcCrew,
    #[serde(rename = "QC (Component)")]
    QcComponent,
    #[serde(rename = "Technician")]
    Technician,
}

/// One project-level audit record. `detail` carries the machine/line name
/// for technician holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: ProjectEventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Append-only storage for both event kinds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    #[serde(default)]
    scans: Vec<ScanEvent>,
    #[serde(default)]
    project_events: Vec<ProjectEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_scan(&mut self, event: ScanEvent) {
        self.scans.push(event);
    }

    pub fn append_project(&mut self, event: ProjectEvent) {
        self.project_events.push(event);
    }

    pub fn scans(&self) -> impl Iterator<Item = &ScanEvent> {
        self.scans.iter()
    }

    pub fn project_events(&self) -> impl Iterator<Item = &ProjectEvent> {
        self.project_events.iter()
    }

    pub fn project_events_of(
        &self,
        kind: ProjectEventKind,
    ) -> impl Iterator<Item = &ProjectEvent> {
        self.project_events.iter().filter(move |e| e.kind == kind)
    }

    /// Scan events sorted ascending by timestamp, the order ledger replay
    /// expects. Equal timestamps keep their append order (stable sort), so
    /// repeated replays of the same log stay deterministic.
    pub fn scans_sorted(&self) -> Vec<ScanEvent> {
        let mut sorted = self.scans.clone();
        sorted.sort_by_key(|e| e.timestamp);
        sorted
    }

    /// The most recent scan action recorded for a badge, if any.
    pub fn last_scan_action(&self, badge_id: &str) -> Option<ScanAction> {
        self.scans
            .iter()
            .rev()
            .find(|e| e.badge_id == badge_id)
            .map(|e| e.action)
    }

    pub fn pause_count(&self) -> usize {
        self.project_events_of(ProjectEventKind::Pause).count()
    }

    pub fn lunch_count(&self) -> usize {
        self.project_events_of(ProjectEventKind::Lunch).count()
    }

    pub fn scan_len(&self) -> usize {
        self.scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty() && self.project_events.is_empty()
    }

    /// Clears all events. Only called at session teardown.
    pub fn reset(&mut self) {
        self.scans.clear();
        self.project_events.clear();
    }

    pub fn has_scans(&self) -> bool {
        !self.scans.is_empty()
    }

    pub fn has_project_events(&self) -> bool {
        !self.project_events.is_empty()
    }

    /// Replaces both logs wholesale. Used when restoring a queued job's
    /// captured history into a fresh session.
    pub fn replace(&mut self, scans: Vec<ScanEvent>, project_events: Vec<ProjectEvent>) {
        self.scans = scans;
        self.project_events = project_events;
    }

    /// Replaces only the scan log. Remote log adoption is per-array and only
    /// legal while the local side is empty; the caller enforces that.
    pub fn replace_scans(&mut self, scans: Vec<ScanEvent>) {
        self.scans = scans;
    }

    pub fn replace_project_events(&mut self, project_events: Vec<ProjectEvent>) {
        self.project_events = project_events;
    }
}
