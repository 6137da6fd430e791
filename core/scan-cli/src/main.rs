//! crewclock-scan: thin CLI for the kiosk daemon socket.
//!
//! RFID reader integrations invoke `crewclock-scan scan <BADGE>` on every
//! read; the remaining subcommands cover the operator actions a floor
//! terminal needs. Output is the daemon's JSON response; the exit code
//! reflects whether the request was accepted.

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};

use crewclock_fleet_protocol::{Method, Request, PROTOCOL_VERSION};

mod client;

#[derive(Parser)]
#[command(
    name = "crewclock-scan",
    about = "Forward badge scans and operator actions to the Crewclock kiosk daemon"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum QcKindArg {
    Crew,
    Component,
}

impl QcKindArg {
    fn as_str(self) -> &'static str {
        match self {
            QcKindArg::Crew => "crew",
            QcKindArg::Component => "component",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Forward a badge scan (clock in or out)
    Scan { badge_id: String },
    /// Print the current session status
    Status,
    /// Start a session with the given budget and optional metadata
    Start {
        #[arg(long, default_value_t = 0)]
        hours: u32,
        #[arg(long, default_value_t = 0)]
        minutes: u32,
        #[arg(long, default_value_t = 0)]
        seconds: u32,
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        leader: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        size: Option<String>,
    },
    /// Pause the countdown (requires the pause code)
    Pause {
        #[arg(long)]
        code: String,
    },
    /// Resume from a generically resumable pause
    Resume,
    /// Take the once-per-shift lunch break
    Lunch,
    /// Enter or exit a QC hold (requires the QC code)
    Qc {
        #[arg(value_enum)]
        kind: QcKindArg,
        #[arg(long)]
        code: String,
    },
    /// Enter or exit a technician hold (requires the technician code)
    Tech {
        #[arg(long)]
        code: String,
        /// Machine or line name tagged on the hold
        #[arg(long)]
        line: Option<String>,
    },
    /// Save the session to the shared queue
    Save,
    /// List queued jobs and any pending remote preload
    Queue,
    /// Finish the session and write the final report
    Finish,
    /// Reset the session to empty defaults
    Reset,
    /// Send a raw method with JSON params (for scripting)
    Raw {
        method: String,
        #[arg(long)]
        params: Option<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let (method, params) = match build_request(cli.command) {
        Ok(parts) => parts,
        Err(message) => {
            eprintln!("{}", message);
            std::process::exit(2);
        }
    };

    let request = Request {
        protocol_version: PROTOCOL_VERSION,
        method,
        id: Some(client::request_id()),
        params,
    };

    match client::send_request(&request) {
        Ok(response) => {
            match serde_json::to_string_pretty(&response) {
                Ok(rendered) => println!("{}", rendered),
                Err(err) => {
                    eprintln!("failed to render response: {}", err);
                    std::process::exit(1);
                }
            }
            if !response.ok {
                std::process::exit(1);
            }
        }
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    }
}

fn build_request(command: Commands) -> Result<(Method, Option<Value>), String> {
    let parts = match command {
        Commands::Scan { badge_id } => (Method::Scan, Some(json!({ "badge_id": badge_id }))),
        Commands::Status => (Method::GetStatus, None),
        Commands::Start {
            hours,
            minutes,
            seconds,
            company,
            project,
            leader,
            category,
            size,
        } => {
            let mut obj = serde_json::Map::new();
            obj.insert("hours".to_string(), json!(hours));
            obj.insert("minutes".to_string(), json!(minutes));
            obj.insert("seconds".to_string(), json!(seconds));
            if let Some(v) = company {
                obj.insert("company".to_string(), json!(v));
            }
            if let Some(v) = project {
                obj.insert("project".to_string(), json!(v));
            }
            if let Some(v) = leader {
                obj.insert("line_leader".to_string(), json!(v));
            }
            if let Some(v) = category {
                obj.insert("category".to_string(), json!(v));
            }
            if let Some(v) = size {
                obj.insert("size".to_string(), json!(v));
            }
            (Method::StartSession, Some(Value::Object(obj)))
        }
        Commands::Pause { code } => (Method::Pause, Some(json!({ "code": code }))),
        Commands::Resume => (Method::Resume, None),
        Commands::Lunch => (Method::TakeLunch, None),
        Commands::Qc { kind, code } => (
            Method::ToggleQc,
            Some(json!({ "kind": kind.as_str(), "code": code })),
        ),
        Commands::Tech { code, line } => (
            Method::ToggleTechnician,
            Some(json!({ "code": code, "line": line })),
        ),
        Commands::Save => (Method::SaveToQueue, None),
        Commands::Queue => (Method::ListQueue, None),
        Commands::Finish => (Method::Finish, None),
        Commands::Reset => (Method::Reset, None),
        Commands::Raw { method, params } => {
            let method: Method = serde_json::from_value(json!(method))
                .map_err(|err| format!("unknown method: {}", err))?;
            let params = match params {
                Some(raw) => Some(
                    serde_json::from_str(&raw)
                        .map_err(|err| format!("params is not valid JSON: {}", err))?,
                ),
                None => None,
            };
            (method, params)
        }
    };
    Ok(parts)
}
