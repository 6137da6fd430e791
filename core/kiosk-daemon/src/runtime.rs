//! The single-writer runtime that owns the session.
//!
//! One thread consumes a channel of [`RuntimeMsg`]s and drives the 1 Hz
//! tick with `recv_timeout`, so IPC requests, inbound fleet snapshots, and
//! ticks are totally ordered — no other thread ever touches the session.
//! Remote pushes are fire-and-forget: a transport failure is logged and the
//! tick keeps running on local authoritative state.

use std::path::PathBuf;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, Utc};
use serde_json::{json, Value};
use tracing::{info, warn};

use crewclock_core::{
    Credential, QcKind, QueueItem, SaveFeedback, Session, SnapshotStore, StartFeedback,
};
use crewclock_fleet_protocol::{
    parse_params, EditMinutesParams, FleetDocument, Method, PauseParams, QcToggleParams,
    RemoteCommand, Request, Response, ScanParams, StartFromQueueParams, StartSessionParams,
    TechnicianToggleParams, PROTOCOL_VERSION,
};

use crate::arbiter::{self, CommandGate};
use crate::fleet::FleetStore;
use crate::notify::Notifier;
use crate::queue_store::QueueStore;
use crate::report::{self, FinalReport};

/// Queue id of the remotely preloaded, to-be-confirmed job.
pub const REMOTE_PRELOAD_ID: &str = "REMOTE_PRELOAD";

const TICK_INTERVAL: Duration = Duration::from_secs(1);
const BUZZER_CUE: &str = "Buzzer";
const FINISH_CUE: &str = "Cashier";
const PAUSE_CUE: &str = "Pause";

pub enum RuntimeMsg {
    Ipc {
        request: Request,
        reply: Sender<Response>,
    },
    Fleet(FleetDocument),
    Shutdown,
}

pub struct Runtime {
    session: Session,
    snapshots: SnapshotStore,
    queue: QueueStore,
    fleet: Option<Box<dyn FleetStore>>,
    notifier: Box<dyn Notifier>,
    gate: CommandGate,
    /// Remotely preloaded job awaiting on-floor confirmation. Not persisted;
    /// the controller re-issues the preload if the kiosk restarts.
    pending_start: Option<QueueItem>,
    last_push: Option<Instant>,
    push_min_interval: Duration,
    reports_dir: PathBuf,
}

impl Runtime {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session: Session,
        snapshots: SnapshotStore,
        queue: QueueStore,
        fleet: Option<Box<dyn FleetStore>>,
        notifier: Box<dyn Notifier>,
        push_min_interval_secs: u64,
        reports_dir: PathBuf,
    ) -> Self {
        Self {
            session,
            snapshots,
            queue,
            fleet,
            notifier,
            gate: CommandGate::new(),
            pending_start: None,
            last_push: None,
            push_min_interval: Duration::from_secs(push_min_interval_secs),
            reports_dir,
        }
    }

    /// The serialized executor: everything that mutates the session flows
    /// through here, with a tick whenever the channel stays quiet past the
    /// next deadline.
    pub fn run(mut self, rx: Receiver<RuntimeMsg>) {
        let mut next_tick = Instant::now() + TICK_INTERVAL;
        loop {
            let timeout = next_tick.saturating_duration_since(Instant::now());
            match rx.recv_timeout(timeout) {
                Ok(RuntimeMsg::Ipc { request, reply }) => {
                    let response = self.handle_request(request);
                    let _ = reply.send(response);
                }
                Ok(RuntimeMsg::Fleet(doc)) => self.handle_fleet_doc(doc),
                Ok(RuntimeMsg::Shutdown) => break,
                Err(RecvTimeoutError::Timeout) => {
                    self.on_tick();
                    next_tick = Instant::now() + TICK_INTERVAL;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    // ── Tick ───────────────────────────────────────────────────────────

    fn on_tick(&mut self) {
        let now = Utc::now();
        let wall = Local::now().time();
        let outcome = self.session.tick(now, wall);

        if outcome.buzzer {
            self.notifier.play(BUZZER_CUE);
            // Persist immediately: the exhausted signal fires once per
            // session and must survive a restart.
            self.persist();
            self.push_state(true);
        } else if outcome.state_changed() {
            self.persist();
            self.push_state(true);
        } else if outcome.drained != 0 {
            self.persist();
            self.push_state(false);
        }
    }

    // ── IPC ────────────────────────────────────────────────────────────

    pub fn handle_request(&mut self, request: Request) -> Response {
        if request.protocol_version != PROTOCOL_VERSION {
            return Response::error(
                request.id,
                "unsupported_protocol",
                format!("expected protocol version {}", PROTOCOL_VERSION),
            );
        }

        let id = request.id.clone();
        let now = Utc::now();
        let result = self.dispatch(request.method, request.params, now);
        match result {
            Ok(data) => Response::ok(id, data),
            Err(err) => Response::error_with_info(id, err),
        }
    }

    fn dispatch(
        &mut self,
        method: Method,
        params: Option<Value>,
        now: DateTime<Utc>,
    ) -> Result<Value, crewclock_fleet_protocol::ErrorInfo> {
        match method {
            Method::GetHealth => Ok(json!({ "status": "ok" })),
            Method::GetStatus => Ok(self.status_json()),
            Method::Scan => {
                let params: ScanParams = parse_params(params)?;
                params.validate()?;
                let feedback = self.session.scan(&params.badge_id, now);
                self.persist();
                self.push_state(false);
                Ok(to_json(&feedback))
            }
            Method::StartSession => {
                let params: StartSessionParams = parse_params(params)?;
                let mut info = self.session.info().clone();
                if let Some(v) = params.company.clone() {
                    info.company = v;
                }
                if let Some(v) = params.project.clone() {
                    info.project = v;
                }
                if let Some(v) = params.line_leader.clone() {
                    info.line_leader = v;
                }
                if let Some(v) = params.category.clone() {
                    info.category = v;
                }
                if let Some(v) = params.size.clone() {
                    info.size = v;
                }
                self.session.set_info(info);
                self.session.start(params.total_seconds(), now);
                self.pending_start = None;
                info!(seconds = params.total_seconds(), "Session started");
                self.persist();
                self.push_state(true);
                Ok(json!({ "result": "started" }))
            }
            Method::Pause => {
                let params: PauseParams = parse_params(params)?;
                let feedback = self
                    .session
                    .pause(&Credential::Code(params.code), now);
                self.cue_on_pause(&feedback);
                self.persist();
                self.push_state(true);
                Ok(to_json(&feedback))
            }
            Method::Resume => {
                let feedback = self.session.resume_generic(now);
                self.persist();
                self.push_state(true);
                Ok(to_json(&feedback))
            }
            Method::TakeLunch => {
                let feedback = self.session.take_lunch(now);
                if feedback == crewclock_core::LunchFeedback::Started {
                    self.notifier.play(PAUSE_CUE);
                }
                self.persist();
                self.push_state(true);
                Ok(to_json(&feedback))
            }
            Method::ToggleQc => {
                let params: QcToggleParams = parse_params(params)?;
                let feedback =
                    self.session
                        .toggle_qc(params.kind, &Credential::Code(params.code), now);
                self.cue_on_pause(&feedback);
                self.persist();
                self.push_state(true);
                Ok(to_json(&feedback))
            }
            Method::ToggleTechnician => {
                let params: TechnicianToggleParams = parse_params(params)?;
                let feedback = self.session.toggle_technician(
                    &Credential::Code(params.code),
                    params.line,
                    now,
                );
                self.cue_on_pause(&feedback);
                self.persist();
                self.push_state(true);
                Ok(to_json(&feedback))
            }
            Method::SaveToQueue => {
                let (feedback, queue_id) = self.save_to_queue(now);
                self.persist();
                self.push_state(true);
                let mut data = to_json(&feedback);
                if let (Some(id), Some(obj)) = (queue_id, data.as_object_mut()) {
                    obj.insert("queue_id".to_string(), json!(id));
                }
                Ok(data)
            }
            Method::ListQueue => Ok(json!({
                "items": self.queue.list(),
                "pending_start": self.pending_start,
            })),
            Method::StartFromQueue => {
                let params: StartFromQueueParams = parse_params(params)?;
                params.validate()?;
                let item = if params.queue_id == REMOTE_PRELOAD_ID {
                    self.pending_start.clone()
                } else {
                    self.queue.get(&params.queue_id).cloned()
                };
                let Some(item) = item else {
                    return Err(crewclock_fleet_protocol::ErrorInfo::new(
                        "unknown_queue_item",
                        format!("no queue item with id {}", params.queue_id),
                    ));
                };

                let feedback =
                    self.session
                        .start_from_queue(&item, params.line_leader.as_deref(), now);
                if feedback == StartFeedback::Started {
                    if params.queue_id == REMOTE_PRELOAD_ID {
                        self.pending_start = None;
                    } else if let Err(err) = self.queue.delete(&params.queue_id) {
                        warn!(error = %err, "Failed to delete started queue item");
                    }
                    info!(queue_id = %params.queue_id, "Started session from queue");
                    self.persist();
                    self.push_state(true);
                }
                Ok(to_json(&feedback))
            }
            Method::Finish => {
                self.finish(now);
                Ok(json!({ "result": "finished" }))
            }
            Method::Reset => {
                self.session.reset();
                self.pending_start = None;
                info!("Session reset to empty defaults");
                self.persist();
                self.push_state(true);
                Ok(json!({ "result": "reset" }))
            }
            Method::EditWorkerMinutes => {
                let params: EditMinutesParams = parse_params(params)?;
                params.validate()?;
                let feedback = self.session.edit_worker_minutes(&params.badge_id, params.minutes);
                self.persist();
                self.push_state(true);
                Ok(to_json(&feedback))
            }
            Method::CancelBonus => {
                self.session.cancel_bonus();
                self.persist();
                self.push_state(true);
                Ok(json!({ "result": "bonus_cancelled" }))
            }
        }
    }

    fn status_json(&self) -> Value {
        let session = &self.session;
        let info = session.info();
        let workers: Vec<Value> = session
            .ledger()
            .iter()
            .map(|w| {
                json!({
                    "badge_id": w.badge_id,
                    "active": w.clock.is_on(),
                    "minutes_worked": w.minutes_worked,
                })
            })
            .collect();

        json!({
            "timer_text": session.format_remaining(),
            "seconds_remaining": session.countdown_seconds(),
            "original_seconds": session.original_seconds(),
            "pause_state": session.pause_state().label(),
            "is_paused": session.is_paused(),
            "counting": session.is_counting(),
            "finished": session.is_finished(),
            "headcount": session.headcount(),
            "lunch_used": session.lunch_used(),
            "bonus": session.bonus(),
            "scan_count": session.scan_count(),
            "pause_count": session.pause_count(),
            "lunch_count": session.lunch_count(),
            "company_name": info.company,
            "project_name": info.project,
            "line_leader_name": info.line_leader,
            "category": info.category,
            "project_size": info.size,
            "workers": workers,
            "pending_start": self.pending_start,
        })
    }

    // ── Fleet reconciliation ───────────────────────────────────────────

    fn handle_fleet_doc(&mut self, doc: FleetDocument) {
        let now = Utc::now();
        let outcome = arbiter::reconcile(&mut self.session, &mut self.gate, &doc, now);
        if outcome.adopted || outcome.merged_logs {
            self.persist();
        }
        if let Some(command) = outcome.command {
            info!(command = ?command, "Applying remote command");
            self.apply_remote_command(command, now);
            if let Some(fleet) = &self.fleet {
                if let Err(err) = fleet.clear_command() {
                    warn!(error = %err, "Failed to clear applied remote command");
                }
            }
            self.persist();
            self.push_state(true);
        }
    }

    fn apply_remote_command(&mut self, command: RemoteCommand, now: DateTime<Utc>) {
        match command {
            RemoteCommand::Preload(hms) => {
                self.session.preload(hms.total_seconds());
                let info = self.session.info();
                self.pending_start = Some(QueueItem {
                    id: Some(REMOTE_PRELOAD_ID.to_string()),
                    company: info.company.clone(),
                    project: info.project.clone(),
                    category: info.category.clone(),
                    size: info.size.clone(),
                    seconds: hms.total_seconds(),
                    original_seconds: Some(hms.total_seconds()),
                    line_leader_name: Some(info.line_leader.clone())
                        .filter(|l| !l.trim().is_empty()),
                    created_at: Some(now),
                    scan_history: self.session.log().scans().cloned().collect(),
                    project_events: self.session.log().project_events().cloned().collect(),
                    bonus: Some(*self.session.bonus()),
                });
            }
            RemoteCommand::Toggle => {
                if self.session.is_paused() {
                    self.session.resume_generic(now);
                } else {
                    let feedback = self.session.pause(&Credential::Remote, now);
                    self.cue_on_pause(&feedback);
                }
            }
            RemoteCommand::Lunch => {
                if self.session.take_lunch(now) == crewclock_core::LunchFeedback::Started {
                    self.notifier.play(PAUSE_CUE);
                }
            }
            RemoteCommand::SaveToQueue => {
                self.save_to_queue(now);
            }
            RemoteCommand::Reset(None) => {
                self.session.reset();
                self.pending_start = None;
            }
            RemoteCommand::Reset(Some(hms)) | RemoteCommand::SetTime(hms) => {
                self.session.start(hms.total_seconds(), now);
            }
            RemoteCommand::Finish => self.finish(now),
            RemoteCommand::ClockOut { badge_id } => {
                self.session.clock_out_badge(&badge_id, now);
            }
            RemoteCommand::EditMinutes { badge_id, minutes } => {
                self.session.edit_worker_minutes(&badge_id, minutes);
            }
            RemoteCommand::CancelBonus => self.session.cancel_bonus(),
            RemoteCommand::QcCrew => {
                let feedback = self.session.toggle_qc(QcKind::Crew, &Credential::Remote, now);
                self.cue_on_pause(&feedback);
            }
            RemoteCommand::QcComponent => {
                let feedback = self
                    .session
                    .toggle_qc(QcKind::Component, &Credential::Remote, now);
                self.cue_on_pause(&feedback);
            }
            RemoteCommand::Technician { line } => {
                let feedback = self
                    .session
                    .toggle_technician(&Credential::Remote, line, now);
                self.cue_on_pause(&feedback);
            }
        }
    }

    fn cue_on_pause(&self, feedback: &crewclock_core::PauseFeedback) {
        if *feedback == crewclock_core::PauseFeedback::Paused {
            self.notifier.play(PAUSE_CUE);
        }
    }

    // ── Lifecycle helpers ──────────────────────────────────────────────

    fn save_to_queue(&mut self, now: DateTime<Utc>) -> (SaveFeedback, Option<String>) {
        let (feedback, item) = self.session.save_to_queue(now);
        let Some(item) = item else {
            return (feedback, None);
        };
        match self.queue.insert(item) {
            Ok(id) => {
                info!(queue_id = %id, "Session saved to queue");
                (feedback, Some(id))
            }
            Err(err) => {
                warn!(error = %err, "Failed to persist queue item");
                (feedback, None)
            }
        }
    }

    /// Best-effort forward-only finish: ledger mutation, cue, report, final
    /// push. A failure in a later step never rolls back an earlier one.
    fn finish(&mut self, now: DateTime<Utc>) {
        self.session.finish(now);
        self.notifier.play(FINISH_CUE);

        let final_report = FinalReport::from_session(&self.session, now);
        match report::write_report(&self.reports_dir, &final_report) {
            Ok(path) => info!(path = %path.display(), "Final report written"),
            Err(err) => warn!(error = %err, "Failed to write final report"),
        }

        info!("Session finished");
        self.persist();
        self.push_state(true);
    }

    // ── Persistence and pushes ─────────────────────────────────────────

    fn persist(&self) {
        if let Err(err) = self.snapshots.save(&self.session.snapshot()) {
            warn!(error = %err, "Failed to persist session snapshot");
        }
    }

    /// Throttled steady-state pushes; discrete user-visible actions force
    /// an immediate one to keep control-plane latency low.
    fn push_state(&mut self, force: bool) {
        let Some(fleet) = &self.fleet else {
            return;
        };
        if !force {
            if let Some(last) = self.last_push {
                if last.elapsed() < self.push_min_interval {
                    return;
                }
            }
        }

        let doc = self.outbound_document();
        if let Err(err) = fleet.push(&doc) {
            warn!(error = %err, "Fleet push failed; continuing on local state");
        }
        self.last_push = Some(Instant::now());
    }

    fn outbound_document(&self) -> FleetDocument {
        let session = &self.session;
        let info = session.info();
        FleetDocument {
            is_paused: Some(session.is_paused()),
            seconds_remaining: Some(session.countdown_seconds()),
            original_seconds: Some(session.original_seconds()),
            timer_text: Some(session.format_remaining()),
            worker_count: Some(session.headcount() as u32),
            active_workers: session.ledger().active_badges(),
            company_name: Some(info.company.clone()),
            project_name: Some(info.project.clone()),
            line_leader_name: Some(info.line_leader.clone()),
            category: Some(info.category.clone()),
            project_size: Some(info.size.clone()),
            scan_history: session.log().scans().cloned().collect(),
            project_events: session.log().project_events().cloned().collect(),
            remote_command: None,
            command_timestamp: None,
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
