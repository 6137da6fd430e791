//! Reconciliation of inbound fleet-document snapshots against the local
//! session: recovery adoption, log merging, and timestamp-gated command
//! acceptance.
//!
//! There is no mutual exclusion across the remote boundary. The only
//! consistency mechanisms are the rules here: commands apply once by
//! strictly-newer timestamp, remote state is adopted only into an empty
//! session, and a non-empty local log always wins over the remote one.

use chrono::{DateTime, Utc};

use crewclock_core::session::ProjectInfo;
use crewclock_core::Session;
use crewclock_fleet_protocol::{parse_remote_command, FleetDocument, RemoteCommand};

/// A command older than this on first connect is treated as consumed
/// backlog, not a fresh instruction.
const FIRST_CONNECT_FRESHNESS_SECS: i64 = 60;

/// Tracks the last-applied command timestamp so duplicate snapshots and
/// replays are no-ops.
pub struct CommandGate {
    last_applied: Option<DateTime<Utc>>,
}

impl CommandGate {
    pub fn new() -> Self {
        Self { last_applied: None }
    }

    /// Returns the command to apply, if the document carries one that is
    /// strictly newer than anything seen before. Malformed commands and
    /// timestamps never error; they are dropped with a debug log.
    pub fn accept(&mut self, doc: &FleetDocument, now: DateTime<Utc>) -> Option<RemoteCommand> {
        let raw = doc.remote_command.as_deref()?;
        if raw.is_empty() {
            return None;
        }
        let Some(stamp) = doc.command_timestamp_parsed() else {
            tracing::debug!(command = raw, "Dropping remote command without a valid timestamp");
            return None;
        };

        let apply = match self.last_applied {
            // First snapshot after connect: only a fresh command counts.
            // Anything older is backlog from before we were listening.
            None => (now - stamp).num_seconds().abs() < FIRST_CONNECT_FRESHNESS_SECS,
            Some(last) => stamp > last,
        };
        if self.last_applied.map(|last| stamp > last).unwrap_or(true) {
            self.last_applied = Some(stamp);
        }
        if !apply {
            return None;
        }

        let parsed = parse_remote_command(raw);
        if parsed.is_none() {
            tracing::debug!(command = raw, "Ignoring malformed remote command");
        }
        parsed
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct ReconcileOutcome {
    /// The local session was empty and adopted the remote snapshot.
    pub adopted: bool,
    /// Remote event logs were adopted and the ledger rebuilt.
    pub merged_logs: bool,
    /// A command passed the gate and should be applied.
    pub command: Option<RemoteCommand>,
}

/// Runs the full reconciliation pass for one inbound snapshot.
pub fn reconcile(
    session: &mut Session,
    gate: &mut CommandGate,
    doc: &FleetDocument,
    now: DateTime<Utc>,
) -> ReconcileOutcome {
    let mut outcome = ReconcileOutcome::default();

    if should_adopt(session, doc) {
        adopt(session, doc, now);
        outcome.adopted = true;
        tracing::warn!(
            seconds = doc.seconds_remaining.unwrap_or(0),
            "Local state empty; adopted active session from remote (restored paused)"
        );
    }

    outcome.merged_logs = merge_logs(session, doc);
    if outcome.merged_logs {
        tracing::info!(
            scans = doc.scan_history.len(),
            events = doc.project_events.len(),
            "Adopted remote event logs and rebuilt worker ledger"
        );
    }

    if let Some(original) = doc.original_seconds {
        session.sync_original_seconds(original);
    }

    outcome.command = gate.accept(doc, now);
    outcome
}

/// Recovery adoption fires only when this device has nothing of its own:
/// no budget, no workers, no project. Anything less strict would let a
/// stale remote clobber live local work after a connectivity blip.
fn should_adopt(session: &Session, doc: &FleetDocument) -> bool {
    session.is_empty() && doc.seconds_remaining.map(|s| s > 0).unwrap_or(false)
}

fn adopt(session: &mut Session, doc: &FleetDocument, now: DateTime<Utc>) {
    let info = ProjectInfo {
        company: doc.company_name.clone().unwrap_or_default(),
        project: doc.project_name.clone().unwrap_or_default(),
        line_leader: doc.line_leader_name.clone().unwrap_or_default(),
        category: doc.category.clone().unwrap_or_default(),
        size: doc.project_size.clone().unwrap_or_default(),
    };
    session.adopt_remote(
        info,
        doc.seconds_remaining.unwrap_or(0),
        &doc.active_workers,
        now,
    );
}

fn merge_logs(session: &mut Session, doc: &FleetDocument) -> bool {
    let scans = session.adopt_scan_history(doc.scan_history.clone());
    let events = session.adopt_project_events(doc.project_events.clone());
    scans || events
}
