//! Wire types and validation shared by the kiosk daemon and its clients.
//!
//! Two surfaces live here to prevent schema drift:
//!
//! - The local IPC envelope (`Request`/`Response`/`Method`) spoken over the
//!   daemon's Unix socket by the scan CLI and on-floor UI.
//! - The shared **fleet document**: the flat last-writer-wins map mirrored
//!   to the remote store for one kiosk identity, carrying both session-state
//!   fields and the `remote_command`/`command_timestamp` pair written by an
//!   external controller.
//!
//! The daemon remains the authority on validation, but clients reuse the
//! same types to construct valid requests.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crewclock_core::{ProjectEvent, QcKind, ScanEvent};

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024; // 1MB

// ───────────────────────────── IPC envelope ─────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Method {
    GetHealth,
    GetStatus,
    Scan,
    StartSession,
    Pause,
    Resume,
    TakeLunch,
    ToggleQc,
    ToggleTechnician,
    SaveToQueue,
    ListQueue,
    StartFromQueue,
    Finish,
    Reset,
    EditWorkerMinutes,
    CancelBonus,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    pub protocol_version: u32,
    pub method: Method,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl Response {
    pub fn ok(id: Option<String>, data: Value) -> Self {
        Self {
            ok: true,
            id,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(id: Option<String>, code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(ErrorInfo::new(code, message)),
        }
    }

    pub fn error_with_info(id: Option<String>, error: ErrorInfo) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(error),
        }
    }
}

/// Decodes a method's params payload, reporting a typed validation failure
/// instead of crashing on malformed input.
pub fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, ErrorInfo> {
    let value = params.unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|err| {
        ErrorInfo::new(
            "invalid_params",
            format!("params payload is invalid: {}", err),
        )
    })
}

// ─────────────────────────── Method parameters ──────────────────────────

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanParams {
    pub badge_id: String,
}

impl ScanParams {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        require_non_empty(&self.badge_id, "badge_id")
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StartSessionParams {
    #[serde(default)]
    pub hours: u32,
    #[serde(default)]
    pub minutes: u32,
    #[serde(default)]
    pub seconds: u32,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub line_leader: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
}

impl StartSessionParams {
    pub fn total_seconds(&self) -> i64 {
        i64::from(self.hours) * 3600 + i64::from(self.minutes) * 60 + i64::from(self.seconds)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PauseParams {
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QcToggleParams {
    pub kind: QcKind,
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TechnicianToggleParams {
    pub code: String,
    #[serde(default)]
    pub line: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditMinutesParams {
    pub badge_id: String,
    pub minutes: f64,
}

impl EditMinutesParams {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        require_non_empty(&self.badge_id, "badge_id")?;
        if !self.minutes.is_finite() || self.minutes < 0.0 {
            return Err(ErrorInfo::new(
                "invalid_minutes",
                "minutes must be a non-negative number",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StartFromQueueParams {
    pub queue_id: String,
    #[serde(default)]
    pub line_leader: Option<String>,
}

impl StartFromQueueParams {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        require_non_empty(&self.queue_id, "queue_id")
    }
}

fn require_non_empty(value: &str, field: &str) -> Result<(), ErrorInfo> {
    if value.trim().is_empty() {
        return Err(ErrorInfo::new(
            "missing_field",
            format!("{} is required", field),
        ));
    }
    Ok(())
}

// ───────────────────────────── Fleet document ───────────────────────────

/// The shared remote document for one kiosk identity. Flat, all fields
/// optional: last-writer-wins merges mean any subset may be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetDocument {
    pub is_paused: Option<bool>,
    pub seconds_remaining: Option<i64>,
    pub original_seconds: Option<i64>,
    pub timer_text: Option<String>,
    pub worker_count: Option<u32>,
    pub active_workers: Vec<String>,
    pub company_name: Option<String>,
    pub project_name: Option<String>,
    pub line_leader_name: Option<String>,
    pub category: Option<String>,
    pub project_size: Option<String>,
    pub scan_history: Vec<ScanEvent>,
    pub project_events: Vec<ProjectEvent>,
    /// Pipe-delimited command written by an external controller; empty
    /// string means "none pending".
    pub remote_command: Option<String>,
    /// RFC3339. Commands apply only when strictly newer than the last one
    /// applied locally.
    pub command_timestamp: Option<String>,
}

impl FleetDocument {
    pub fn command_timestamp_parsed(&self) -> Option<DateTime<Utc>> {
        let raw = self.command_timestamp.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

// ───────────────────────────── Remote commands ──────────────────────────

/// An `H:M:S` triple carried by preload/reset/set-time commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hms {
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl Hms {
    pub fn total_seconds(&self) -> i64 {
        i64::from(self.hours) * 3600 + i64::from(self.minutes) * 60 + i64::from(self.seconds)
    }
}

fn parse_hms(raw: &str) -> Option<Hms> {
    let parts: Vec<&str> = raw.split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hours = parts[0].parse().ok()?;
    let minutes = parts[1].parse().ok()?;
    let seconds = parts[2].parse().ok()?;
    Some(Hms {
        hours,
        minutes,
        seconds,
    })
}

/// A command issued from the external controller, parsed from the
/// `remote_command` field (`ACTION` or `ACTION|ARG1|ARG2|...`).
///
/// Remote commands bypass credential checks by design; the controller is
/// itself the trusted authority.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCommand {
    /// Stage a pending job's budget for on-floor confirmation.
    Preload(Hms),
    /// Pause if running, resume if paused.
    Toggle,
    Lunch,
    SaveToQueue,
    /// Bare reset clears the session; with an argument it re-arms the timer.
    Reset(Option<Hms>),
    SetTime(Hms),
    Finish,
    ClockOut { badge_id: String },
    EditMinutes { badge_id: String, minutes: f64 },
    CancelBonus,
    QcCrew,
    QcComponent,
    Technician { line: Option<String> },
}

/// Parses a remote command string. Malformed input (unknown action, wrong
/// token count, non-numeric time parts) yields `None`; a bad command must
/// never crash or corrupt local state, so the caller just drops it.
pub fn parse_remote_command(raw: &str) -> Option<RemoteCommand> {
    let mut parts = raw.split('|').filter(|p| !p.is_empty());
    let action = parts.next()?;
    let args: Vec<&str> = parts.collect();

    match action {
        "PRELOAD" => Some(RemoteCommand::Preload(parse_hms(args.first()?)?)),
        "TOGGLE" if args.is_empty() => Some(RemoteCommand::Toggle),
        "LUNCH" if args.is_empty() => Some(RemoteCommand::Lunch),
        "SAVE" if args.is_empty() => Some(RemoteCommand::SaveToQueue),
        "RESET" => match args.first() {
            Some(raw) => Some(RemoteCommand::Reset(Some(parse_hms(raw)?))),
            None => Some(RemoteCommand::Reset(None)),
        },
        "SET_TIME" => Some(RemoteCommand::SetTime(parse_hms(args.first()?)?)),
        "FINISH" if args.is_empty() => Some(RemoteCommand::Finish),
        "CLOCK_OUT" => Some(RemoteCommand::ClockOut {
            badge_id: args.first()?.to_string(),
        }),
        "EDIT_MIN" => {
            if args.len() != 2 {
                return None;
            }
            let minutes: f64 = args[1].parse().ok()?;
            if !minutes.is_finite() || minutes < 0.0 {
                return None;
            }
            Some(RemoteCommand::EditMinutes {
                badge_id: args[0].to_string(),
                minutes,
            })
        }
        "CANCEL_BONUS" if args.is_empty() => Some(RemoteCommand::CancelBonus),
        "QC_CREW" if args.is_empty() => Some(RemoteCommand::QcCrew),
        "QC_COMPONENT" if args.is_empty() => Some(RemoteCommand::QcComponent),
        "TECH" => Some(RemoteCommand::Technician {
            line: args.first().map(|s| s.to_string()),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_actions() {
        assert_eq!(parse_remote_command("TOGGLE"), Some(RemoteCommand::Toggle));
        assert_eq!(parse_remote_command("LUNCH"), Some(RemoteCommand::Lunch));
        assert_eq!(
            parse_remote_command("SAVE"),
            Some(RemoteCommand::SaveToQueue)
        );
        assert_eq!(parse_remote_command("FINISH"), Some(RemoteCommand::Finish));
        assert_eq!(
            parse_remote_command("RESET"),
            Some(RemoteCommand::Reset(None))
        );
        assert_eq!(
            parse_remote_command("CANCEL_BONUS"),
            Some(RemoteCommand::CancelBonus)
        );
    }

    #[test]
    fn parses_time_arguments() {
        let expected = Hms {
            hours: 1,
            minutes: 30,
            seconds: 0,
        };
        assert_eq!(
            parse_remote_command("PRELOAD|1:30:0"),
            Some(RemoteCommand::Preload(expected))
        );
        assert_eq!(
            parse_remote_command("SET_TIME|1:30:0"),
            Some(RemoteCommand::SetTime(expected))
        );
        assert_eq!(
            parse_remote_command("RESET|1:30:0"),
            Some(RemoteCommand::Reset(Some(expected)))
        );
        assert_eq!(expected.total_seconds(), 5400);
    }

    #[test]
    fn parses_worker_commands() {
        assert_eq!(
            parse_remote_command("CLOCK_OUT|badge-7"),
            Some(RemoteCommand::ClockOut {
                badge_id: "badge-7".to_string()
            })
        );
        assert_eq!(
            parse_remote_command("EDIT_MIN|badge-7|95.5"),
            Some(RemoteCommand::EditMinutes {
                badge_id: "badge-7".to_string(),
                minutes: 95.5
            })
        );
    }

    #[test]
    fn parses_credential_less_pause_variants() {
        assert_eq!(parse_remote_command("QC_CREW"), Some(RemoteCommand::QcCrew));
        assert_eq!(
            parse_remote_command("QC_COMPONENT"),
            Some(RemoteCommand::QcComponent)
        );
        assert_eq!(
            parse_remote_command("TECH|Line 4"),
            Some(RemoteCommand::Technician {
                line: Some("Line 4".to_string())
            })
        );
        assert_eq!(
            parse_remote_command("TECH"),
            Some(RemoteCommand::Technician { line: None })
        );
    }

    #[test]
    fn malformed_commands_parse_as_none() {
        assert_eq!(parse_remote_command(""), None);
        assert_eq!(parse_remote_command("UNKNOWN"), None);
        assert_eq!(parse_remote_command("SET_TIME"), None);
        assert_eq!(parse_remote_command("SET_TIME|1:30"), None);
        assert_eq!(parse_remote_command("SET_TIME|a:b:c"), None);
        assert_eq!(parse_remote_command("PRELOAD|1:2:3:4"), None);
        assert_eq!(parse_remote_command("CLOCK_OUT"), None);
        assert_eq!(parse_remote_command("EDIT_MIN|badge-7"), None);
        assert_eq!(parse_remote_command("EDIT_MIN|badge-7|ninety"), None);
        assert_eq!(parse_remote_command("EDIT_MIN|badge-7|-5"), None);
        assert_eq!(parse_remote_command("TOGGLE|extra"), None);
    }

    #[test]
    fn empty_pipe_segments_are_skipped() {
        // Trailing or doubled pipes come from sloppy controllers.
        assert_eq!(parse_remote_command("TOGGLE|"), Some(RemoteCommand::Toggle));
        assert_eq!(
            parse_remote_command("CLOCK_OUT||badge-7"),
            Some(RemoteCommand::ClockOut {
                badge_id: "badge-7".to_string()
            })
        );
    }

    #[test]
    fn fleet_document_defaults_tolerate_sparse_json() {
        let doc: FleetDocument = serde_json::from_str(r#"{"seconds_remaining": 120}"#).unwrap();
        assert_eq!(doc.seconds_remaining, Some(120));
        assert!(doc.active_workers.is_empty());
        assert!(doc.remote_command.is_none());
        assert!(doc.command_timestamp_parsed().is_none());
    }

    #[test]
    fn command_timestamp_parses_rfc3339_only() {
        let mut doc = FleetDocument::default();
        doc.command_timestamp = Some("2026-08-01T12:00:00Z".to_string());
        assert!(doc.command_timestamp_parsed().is_some());

        doc.command_timestamp = Some("yesterday".to_string());
        assert!(doc.command_timestamp_parsed().is_none());
    }

    #[test]
    fn request_rejects_unknown_fields() {
        let raw = r#"{"protocol_version":1,"method":"scan","surprise":true}"#;
        assert!(serde_json::from_str::<Request>(raw).is_err());
    }

    #[test]
    fn params_validation_reports_typed_errors() {
        let scan = ScanParams {
            badge_id: "  ".to_string(),
        };
        assert!(scan.validate().is_err());

        let edit = EditMinutesParams {
            badge_id: "b".to_string(),
            minutes: f64::NAN,
        };
        assert!(edit.validate().is_err());

        let params: ScanParams =
            parse_params(Some(serde_json::json!({"badge_id": "A1"}))).unwrap();
        assert_eq!(params.badge_id, "A1");

        let missing: Result<ScanParams, _> = parse_params(None);
        assert!(missing.is_err());
    }

    #[test]
    fn start_session_params_compute_total_seconds() {
        let params: StartSessionParams =
            parse_params(Some(serde_json::json!({"hours": 2, "minutes": 30}))).unwrap();
        assert_eq!(params.total_seconds(), 9000);
    }
}
