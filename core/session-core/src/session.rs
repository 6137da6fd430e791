//! The session aggregate: scan intake, the pause-reason hierarchy, the
//! once-per-second countdown engine, and the lifecycle transitions that
//! bound a session's lifetime.
//!
//! All mutation goes through this type on a single logical executor; the
//! daemon owns one `Session` and drives [`Session::tick`] at 1 Hz. Every
//! guarded operation returns a typed feedback value instead of an error —
//! nothing here is fatal.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bonus::{BonusRevocation, BonusState};
use crate::config::SessionConfig;
use crate::events::{EventLog, ProjectEvent, ProjectEventKind, ScanAction, ScanEvent};
use crate::feedback::{
    EditFeedback, LunchFeedback, PauseFeedback, SaveFeedback, ScanFeedback, StartFeedback,
};
use crate::ledger::WorkerLedger;
use crate::pause::{Credential, PauseState, QcKind};
use crate::queue::QueueItem;
use crate::store::SessionSnapshot;
use crate::windows::{in_any_window, shift_clear_active};

/// A manual lunch auto-resumes after this many elapsed seconds.
const MANUAL_LUNCH_SECS: i64 = 30 * 60;

/// Project metadata strings; empty string = unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub line_leader: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub size: String,
}

/// What one tick changed. The runtime uses this to decide persistence,
/// outbound pushes, and notifier calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Labor-seconds subtracted from the budget this tick.
    pub drained: i64,
    /// The budget crossed from positive to zero-or-below. Fires once per
    /// session even though ticking continues into overrun.
    pub buzzer: bool,
    /// A lunch pause auto-resumed (timer elapsed or window exited).
    pub auto_resumed: bool,
    pub entered_auto_lunch: bool,
    pub lunch_lock_cleared: bool,
}

impl TickOutcome {
    pub fn state_changed(&self) -> bool {
        self.auto_resumed || self.entered_auto_lunch || self.lunch_lock_cleared || self.buzzer
    }
}

/// The session aggregate.
pub struct Session {
    countdown_seconds: i64,
    original_seconds: i64,
    /// Set by start, cleared by finish/reset. The tick is inert without it.
    counting: bool,
    /// Terminal latch: no further ticking, no further scans.
    finished: bool,
    pause: PauseState,
    /// Gates one lunch per shift. Cleared only by the shift-start auto-clear
    /// rule or explicit override, never by leaving lunch.
    lunch_used: bool,
    buzzer_fired: bool,
    bonus: BonusState,
    info: ProjectInfo,
    ledger: WorkerLedger,
    log: EventLog,
    scan_count: u64,
    last_tick: Option<DateTime<Utc>>,
    config: SessionConfig,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            countdown_seconds: 0,
            original_seconds: 0,
            counting: false,
            finished: false,
            pause: PauseState::Running,
            lunch_used: false,
            buzzer_fired: false,
            bonus: BonusState::Eligible,
            info: ProjectInfo::default(),
            ledger: WorkerLedger::new(),
            log: EventLog::new(),
            scan_count: 0,
            last_tick: None,
            config,
        }
    }

    // ── Read side ──────────────────────────────────────────────────────

    pub fn countdown_seconds(&self) -> i64 {
        self.countdown_seconds
    }

    pub fn original_seconds(&self) -> i64 {
        self.original_seconds
    }

    pub fn pause_state(&self) -> &PauseState {
        &self.pause
    }

    pub fn is_paused(&self) -> bool {
        self.pause.is_paused()
    }

    pub fn is_counting(&self) -> bool {
        self.counting
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn lunch_used(&self) -> bool {
        self.lunch_used
    }

    pub fn bonus(&self) -> &BonusState {
        &self.bonus
    }

    pub fn info(&self) -> &ProjectInfo {
        &self.info
    }

    pub fn ledger(&self) -> &WorkerLedger {
        &self.ledger
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn headcount(&self) -> usize {
        self.ledger.headcount()
    }

    pub fn scan_count(&self) -> u64 {
        self.scan_count
    }

    pub fn pause_count(&self) -> usize {
        self.log.pause_count()
    }

    pub fn lunch_count(&self) -> usize {
        self.log.lunch_count()
    }

    /// An empty session re-arms remote recovery adoption.
    pub fn is_empty(&self) -> bool {
        self.countdown_seconds == 0 && self.ledger.is_empty() && self.info.project.is_empty()
    }

    /// Remaining time as signed `HH:MM:SS`; overrun is visible, not clamped.
    pub fn format_remaining(&self) -> String {
        let prefix = if self.countdown_seconds < 0 { "-" } else { "" };
        let abs = self.countdown_seconds.abs();
        format!(
            "{}{:02}:{:02}:{:02}",
            prefix,
            abs / 3600,
            (abs % 3600) / 60,
            abs % 60
        )
    }

    // ── Lifecycle ──────────────────────────────────────────────────────

    /// Arms the countdown with a fresh budget and starts draining.
    pub fn start(&mut self, seconds: i64, now: DateTime<Utc>) {
        self.countdown_seconds = seconds;
        self.original_seconds = seconds;
        self.counting = true;
        self.finished = false;
        self.buzzer_fired = false;
        self.pause = PauseState::Running;
        self.last_tick = Some(now);
    }

    pub fn set_info(&mut self, info: ProjectInfo) {
        self.info = info;
    }

    /// Stages a remotely preloaded budget without starting the drain; the
    /// operator confirms it on the floor.
    pub fn preload(&mut self, seconds: i64) {
        self.countdown_seconds = seconds;
        self.original_seconds = seconds;
        self.counting = false;
        self.finished = false;
        self.buzzer_fired = false;
        self.pause = PauseState::Running;
    }

    /// Starts a queued job. The captured history is restored so the audit
    /// trail and accrued minutes survive the queue round-trip.
    pub fn start_from_queue(
        &mut self,
        item: &QueueItem,
        leader: Option<&str>,
        now: DateTime<Utc>,
    ) -> StartFeedback {
        let leader_name = leader
            .map(str::to_string)
            .filter(|l| !l.trim().is_empty())
            .or_else(|| item.line_leader_name.clone())
            .filter(|l| !l.trim().is_empty());
        let Some(leader_name) = leader_name else {
            return StartFeedback::LeaderRequired;
        };

        self.reset();
        self.info = ProjectInfo {
            company: item.company.clone(),
            project: item.project.clone(),
            line_leader: leader_name,
            category: item.category.clone(),
            size: item.size.clone(),
        };
        self.log
            .replace(item.scan_history.clone(), item.project_events.clone());
        self.ledger = WorkerLedger::reconstruct(&item.scan_history);
        self.scan_count = item.scan_history.len() as u64;
        if let Some(bonus) = item.bonus {
            self.bonus = bonus;
        }
        self.start(item.seconds, now);
        if let Some(original) = item.original_seconds {
            self.original_seconds = original;
        }
        StartFeedback::Started
    }

    /// Snapshots the session as a queue item and empties it.
    ///
    /// Steps are ordered and idempotent per precondition: force clock-out
    /// (final accrual), append the Save audit event, capture, reset.
    pub fn save_to_queue(&mut self, now: DateTime<Utc>) -> (SaveFeedback, Option<QueueItem>) {
        if self.info.company.trim().is_empty() || self.info.project.trim().is_empty() {
            return (SaveFeedback::MissingProjectInfo, None);
        }

        self.force_clock_out_all(now);
        self.log.append_project(ProjectEvent {
            timestamp: now,
            kind: ProjectEventKind::Save,
            detail: None,
        });

        let item = QueueItem {
            id: None,
            company: self.info.company.clone(),
            project: self.info.project.clone(),
            category: self.info.category.clone(),
            size: self.info.size.clone(),
            seconds: self.countdown_seconds,
            original_seconds: Some(self.original_seconds),
            line_leader_name: Some(self.info.line_leader.clone())
                .filter(|l| !l.trim().is_empty()),
            created_at: Some(now),
            scan_history: self.log.scans().cloned().collect(),
            project_events: self.log.project_events().cloned().collect(),
            bonus: Some(self.bonus),
        };

        self.reset();
        (SaveFeedback::Queued, Some(item))
    }

    /// Freezes the session: no further ticking, no further scans. Forward-
    /// only; the caller persists the final report and pushes once more.
    pub fn finish(&mut self, now: DateTime<Utc>) {
        self.force_clock_out_all(now);
        self.counting = false;
        self.finished = true;
    }

    /// Clears everything back to empty defaults (the terminal state that
    /// re-arms recovery adoption).
    pub fn reset(&mut self) {
        self.countdown_seconds = 0;
        self.original_seconds = 0;
        self.counting = false;
        self.finished = false;
        self.pause = PauseState::Running;
        self.lunch_used = false;
        self.buzzer_fired = false;
        self.bonus = BonusState::Eligible;
        self.info = ProjectInfo::default();
        self.ledger.clear();
        self.log.reset();
        self.scan_count = 0;
        self.last_tick = None;
    }

    // ── Scans and the ledger ───────────────────────────────────────────

    /// Processes a badge scan: toggles the worker's clock state and appends
    /// the matching scan event. Rejected while paused or finished.
    pub fn scan(&mut self, badge_id: &str, now: DateTime<Utc>) -> ScanFeedback {
        if self.finished {
            return ScanFeedback::IgnoredFinished;
        }
        if self.pause.is_paused() {
            return ScanFeedback::IgnoredPaused;
        }

        self.scan_count += 1;
        if self.ledger.is_active(badge_id) {
            self.clock_out_badge(badge_id, now);
            ScanFeedback::ClockedOut {
                badge_id: badge_id.to_string(),
            }
        } else {
            if self.ledger.clock_in(badge_id, now) {
                self.log.append_scan(ScanEvent {
                    badge_id: badge_id.to_string(),
                    timestamp: now,
                    action: ScanAction::ClockIn,
                });
            }
            ScanFeedback::ClockedIn {
                badge_id: badge_id.to_string(),
            }
        }
    }

    /// Clocks a worker out (scan, remote command, or force loop). Appends a
    /// ClockOut event unless the worker's most recent logged scan is already
    /// a ClockOut — that guards against duplicate manual+remote clock-outs.
    pub fn clock_out_badge(&mut self, badge_id: &str, now: DateTime<Utc>) -> bool {
        if self.ledger.clock_out(badge_id, now).is_none() {
            return false;
        }
        if self.log.last_scan_action(badge_id) != Some(ScanAction::ClockOut) {
            self.log.append_scan(ScanEvent {
                badge_id: badge_id.to_string(),
                timestamp: now,
                action: ScanAction::ClockOut,
            });
        }
        true
    }

    fn force_clock_out_all(&mut self, now: DateTime<Utc>) {
        for badge in self.ledger.active_badges() {
            self.clock_out_badge(&badge, now);
        }
    }

    /// Overwrites a worker's accrued minutes. Disqualifies the session from
    /// automatic bonuses.
    pub fn edit_worker_minutes(&mut self, badge_id: &str, minutes: f64) -> EditFeedback {
        if self.ledger.set_total_minutes(badge_id, minutes) {
            self.revoke_bonus(BonusRevocation::ManualEdit);
            EditFeedback::Updated
        } else {
            EditFeedback::UnknownWorker
        }
    }

    // ── Pause hierarchy ────────────────────────────────────────────────

    pub fn pause(&mut self, credential: &Credential, now: DateTime<Utc>) -> PauseFeedback {
        if self.finished {
            return PauseFeedback::IgnoredFinished;
        }
        if self.pause.is_paused() {
            return PauseFeedback::AlreadyPaused;
        }
        if !credential.satisfies(&self.config.codes.pause) {
            return PauseFeedback::WrongCode;
        }
        self.enter_pause(PauseState::ManualPause, now);
        PauseFeedback::Paused
    }

    /// Resume without a credential. Rejected while a credential-gated hold
    /// (QC, technician) is active.
    pub fn resume_generic(&mut self, now: DateTime<Utc>) -> PauseFeedback {
        if self.finished {
            return PauseFeedback::IgnoredFinished;
        }
        if self.pause.is_credential_gated() {
            return PauseFeedback::CredentialGated;
        }
        self.resume(now);
        PauseFeedback::Resumed
    }

    /// Manual lunch: once per shift, only while running with workers on the
    /// clock. Auto-resumes after 30 minutes.
    pub fn take_lunch(&mut self, now: DateTime<Utc>) -> LunchFeedback {
        if self.finished {
            return LunchFeedback::IgnoredFinished;
        }
        if self.pause.is_paused() {
            return LunchFeedback::IgnoredPaused;
        }
        if self.headcount() == 0 {
            return LunchFeedback::IgnoredNoWorkers;
        }
        if self.lunch_used {
            return LunchFeedback::IgnoredAlreadyUsed;
        }
        self.enter_pause(PauseState::ManualLunch { since: now }, now);
        LunchFeedback::Started
    }

    /// Enters or exits a QC hold. The same credential-gated toggle is the
    /// only exit path; a crew-oversight hold also cancels the bonus.
    pub fn toggle_qc(
        &mut self,
        kind: QcKind,
        credential: &Credential,
        now: DateTime<Utc>,
    ) -> PauseFeedback {
        if self.finished {
            return PauseFeedback::IgnoredFinished;
        }
        if !credential.satisfies(&self.config.codes.qc) {
            return PauseFeedback::WrongCode;
        }
        match self.pause {
            PauseState::QcCrew | PauseState::QcComponent => {
                self.resume(now);
                PauseFeedback::Resumed
            }
            // A technician hold does not yield to the QC code.
            PauseState::Technician { .. } => PauseFeedback::CredentialGated,
            _ => {
                if kind == QcKind::Crew {
                    self.revoke_bonus(BonusRevocation::CrewOversight);
                }
                self.enter_pause(kind.pause_state(), now);
                PauseFeedback::Paused
            }
        }
    }

    /// Enters or exits a technician hold, optionally tagged with the
    /// machine/line it was raised for.
    pub fn toggle_technician(
        &mut self,
        credential: &Credential,
        line: Option<String>,
        now: DateTime<Utc>,
    ) -> PauseFeedback {
        if self.finished {
            return PauseFeedback::IgnoredFinished;
        }
        if !credential.satisfies(&self.config.codes.technician) {
            return PauseFeedback::WrongCode;
        }
        match self.pause {
            PauseState::Technician { .. } => {
                self.resume(now);
                PauseFeedback::Resumed
            }
            PauseState::QcCrew | PauseState::QcComponent => PauseFeedback::CredentialGated,
            _ => {
                self.enter_pause(PauseState::Technician { line }, now);
                PauseFeedback::Paused
            }
        }
    }

    pub fn cancel_bonus(&mut self) {
        self.revoke_bonus(BonusRevocation::Cancelled);
    }

    fn revoke_bonus(&mut self, reason: BonusRevocation) {
        self.bonus.revoke(reason);
    }

    fn enter_pause(&mut self, state: PauseState, now: DateTime<Utc>) {
        if let Some(kind) = state.event_kind() {
            let detail = match &state {
                PauseState::Technician { line } => line.clone(),
                _ => None,
            };
            self.log.append_project(ProjectEvent {
                timestamp: now,
                kind,
                detail,
            });
        }
        if state.is_lunch() {
            self.lunch_used = true;
        }
        self.pause = state;
    }

    fn resume(&mut self, now: DateTime<Utc>) {
        self.pause = PauseState::Running;
        self.last_tick = Some(now);
    }

    // ── Countdown engine ───────────────────────────────────────────────

    /// One 1 Hz tick: lunch auto-transitions, the shift-start auto-clear,
    /// then the budget drain.
    ///
    /// The drain multiplies elapsed wall-clock time by headcount: the budget
    /// is labor-seconds, so more people drain it faster. Whenever the drain
    /// is skipped (paused, no workers) the tick baseline resets to `now` so
    /// the gap is never billed later.
    pub fn tick(&mut self, now: DateTime<Utc>, wall: NaiveTime) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        if !self.counting || self.finished {
            return outcome;
        }

        match self.pause {
            PauseState::ManualLunch { since } => {
                if (now - since).num_seconds() >= MANUAL_LUNCH_SECS {
                    self.resume(now);
                    outcome.auto_resumed = true;
                }
            }
            PauseState::AutoLunch => {
                if !in_any_window(&self.config.lunch_windows, wall) {
                    self.resume(now);
                    outcome.auto_resumed = true;
                }
            }
            _ => {}
        }

        if self.pause == PauseState::Running
            && self.headcount() > 0
            && !self.lunch_used
            && in_any_window(&self.config.lunch_windows, wall)
        {
            self.enter_pause(PauseState::AutoLunch, now);
            outcome.entered_auto_lunch = true;
        }

        if self.lunch_used && shift_clear_active(&self.config.shift_starts, wall) {
            self.lunch_used = false;
            outcome.lunch_lock_cleared = true;
        }

        if self.pause == PauseState::Running && self.headcount() > 0 {
            match self.last_tick {
                Some(last) => {
                    let elapsed = (now - last).num_milliseconds() as f64 / 1000.0;
                    self.last_tick = Some(now);

                    let people = self.headcount().max(1) as f64;
                    let drain = ((elapsed * people).round() as i64).max(1);
                    let previous = self.countdown_seconds;
                    self.countdown_seconds -= drain;
                    outcome.drained = drain;

                    if previous > 0 && self.countdown_seconds <= 0 && !self.buzzer_fired {
                        self.buzzer_fired = true;
                        outcome.buzzer = true;
                    }
                }
                None => self.last_tick = Some(now),
            }
        } else {
            self.last_tick = Some(now);
        }

        outcome
    }

    // ── Remote reconciliation hooks (called by the arbiter) ───────────

    /// Adopts a remote session snapshot after a crash or device swap.
    ///
    /// Restored **paused** and not counting, never running: an offline
    /// device must not silently resume draining a budget it did not track
    /// ticking. The placeholder clock-ins let the crew keep working; exact
    /// start times are unknown to the basic sync data.
    pub fn adopt_remote(
        &mut self,
        info: ProjectInfo,
        seconds: i64,
        active_badges: &[String],
        now: DateTime<Utc>,
    ) {
        self.info = info;
        self.countdown_seconds = seconds;
        self.original_seconds = seconds;
        self.counting = false;
        self.finished = false;
        self.pause = PauseState::ManualPause;
        for badge in active_badges {
            self.ledger.clock_in(badge, now);
        }
    }

    /// Adopts a remote scan history wholesale and rebuilds the ledger from
    /// it. Only legal while the local scan log is empty — local wins once
    /// non-empty, so two sources of truth never interleave.
    pub fn adopt_scan_history(&mut self, scans: Vec<ScanEvent>) -> bool {
        if self.log.has_scans() || scans.is_empty() {
            return false;
        }
        self.scan_count = scans.len() as u64;
        self.log.replace_scans(scans);
        self.ledger = WorkerLedger::reconstruct(&self.log.scans_sorted());
        true
    }

    /// Adopts remote project events when the local side has none.
    pub fn adopt_project_events(&mut self, events: Vec<ProjectEvent>) -> bool {
        if self.log.has_project_events() || events.is_empty() {
            return false;
        }
        self.log.replace_project_events(events);
        true
    }

    /// Accepts the remote's idea of the original budget, but only while
    /// idle; a stale document must not rewrite the budget mid-job.
    pub fn sync_original_seconds(&mut self, seconds: i64) -> bool {
        if seconds > 0 && self.countdown_seconds == 0 && self.original_seconds != seconds {
            self.original_seconds = seconds;
            return true;
        }
        false
    }

    // ── Persistence ────────────────────────────────────────────────────

    /// Captures everything the snapshot store persists. `last_tick` is
    /// deliberately left out: the baseline resets on restart so downtime is
    /// never billed.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            countdown_seconds: self.countdown_seconds,
            original_seconds: self.original_seconds,
            counting: self.counting,
            finished: self.finished,
            pause: self.pause.clone(),
            lunch_used: self.lunch_used,
            buzzer_fired: self.buzzer_fired,
            bonus: self.bonus,
            info: self.info.clone(),
            ledger: self.ledger.clone(),
            log: self.log.clone(),
            scan_count: self.scan_count,
        }
    }

    pub fn from_snapshot(snapshot: SessionSnapshot, config: SessionConfig) -> Self {
        Self {
            countdown_seconds: snapshot.countdown_seconds,
            original_seconds: snapshot.original_seconds,
            counting: snapshot.counting,
            finished: snapshot.finished,
            pause: snapshot.pause,
            lunch_used: snapshot.lunch_used,
            buzzer_fired: snapshot.buzzer_fired,
            bonus: snapshot.bonus,
            info: snapshot.info,
            ledger: snapshot.ledger,
            log: snapshot.log,
            scan_count: snapshot.scan_count,
            last_tick: None,
            config,
        }
    }
}
