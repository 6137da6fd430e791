//! Crewclock kiosk daemon entrypoint.
//!
//! A single-writer service that owns the work-session state machine: a
//! socket listener for scans and operator commands, a fleet-document poller
//! for remote commands and recovery, and one runtime thread driving the
//! 1 Hz countdown tick.

use fs_err as fs;
use std::env;
use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crewclock_core::{Session, SnapshotStore};

mod arbiter;
mod config;
mod fleet;
mod ipc;
mod notify;
mod queue_store;
mod report;
mod runtime;

use config::KioskConfig;
use fleet::{FileFleetStore, FleetPoller, FleetStore};
use notify::TracingNotifier;
use queue_store::QueueStore;
use runtime::{Runtime, RuntimeMsg};

const SOCKET_NAME: &str = "kiosk.sock";
const SOCKET_ENV: &str = "CREWCLOCK_SOCKET";
const FLEET_POLL_INTERVAL_SECS: u64 = 1;

fn main() {
    let _logging_guard = init_logging();

    let data_dir = match kiosk_data_dir() {
        Ok(dir) => dir,
        Err(err) => {
            error!(error = %err, "Failed to resolve kiosk data directory");
            std::process::exit(1);
        }
    };

    let config = match config::load_runtime_config(Some(data_dir.join("kiosk.toml"))) {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "Failed to load kiosk config; using defaults");
            KioskConfig::default()
        }
    };
    info!(
        fleet_id = %config.fleet_id,
        push_min_interval_secs = config.push_min_interval_secs,
        "Kiosk config loaded"
    );

    let socket_path = match socket_path(&data_dir) {
        Ok(path) => path,
        Err(err) => {
            error!(error = %err, "Failed to resolve kiosk socket path");
            std::process::exit(1);
        }
    };
    if let Err(err) = prepare_socket_dir(&socket_path) {
        error!(error = %err, "Failed to prepare kiosk socket directory");
        std::process::exit(1);
    }
    if let Err(err) = remove_existing_socket(&socket_path) {
        error!(error = %err, path = %socket_path.display(), "Failed to remove existing socket");
        std::process::exit(1);
    }
    let listener = match UnixListener::bind(&socket_path) {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, path = %socket_path.display(), "Failed to bind kiosk socket");
            std::process::exit(1);
        }
    };

    let snapshots = SnapshotStore::new(&data_dir.join("session.json"));
    let session = match snapshots.load() {
        Some(snapshot) => {
            info!("Restored session snapshot from disk");
            Session::from_snapshot(snapshot, config.session_config())
        }
        None => Session::new(config.session_config()),
    };
    let queue = QueueStore::new(&data_dir.join("queue.json"));

    let fleet_doc_path = if config.fleet_id.is_empty() {
        None
    } else {
        Some(
            data_dir
                .join("fleet")
                .join(format!("{}.json", config.fleet_id)),
        )
    };
    let fleet: Option<Box<dyn FleetStore>> = fleet_doc_path
        .as_deref()
        .map(|path| Box::new(FileFleetStore::new(path)) as Box<dyn FleetStore>);

    let (tx, rx) = mpsc::channel();

    if let Some(path) = fleet_doc_path {
        spawn_fleet_poller(FileFleetStore::new(&path), tx.clone());
    }
    ipc::spawn_listener(listener, tx);

    info!(path = %socket_path.display(), "Crewclock kiosk daemon started");

    let runtime = Runtime::new(
        session,
        snapshots,
        queue,
        fleet,
        Box::new(TracingNotifier),
        config.push_min_interval_secs,
        data_dir.join("reports"),
    );
    runtime.run(rx);
}

/// Delivers changed fleet documents into the runtime channel. The runtime
/// stays the single writer; this thread only observes.
fn spawn_fleet_poller(store: FileFleetStore, tx: mpsc::Sender<RuntimeMsg>) {
    thread::spawn(move || {
        let mut poller = FleetPoller::new(store);
        loop {
            match poller.poll_once() {
                Ok(Some(doc)) => {
                    if tx.send(RuntimeMsg::Fleet(doc)).is_err() {
                        return;
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(error = %err, "Fleet poll failed");
                }
            }
            thread::sleep(Duration::from_secs(FLEET_POLL_INTERVAL_SECS));
        }
    });
}

fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let debug_enabled = env::var("CREWCLOCK_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    if let Ok(dir) = kiosk_data_dir() {
        let log_dir = dir.join("logs");
        if fs::create_dir_all(&log_dir).is_ok() {
            let appender = tracing_appender::rolling::daily(log_dir, "kiosk.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            return Some(guard);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    None
}

fn kiosk_data_dir() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or_else(|| "Home directory not found".to_string())?;
    Ok(home.join(".crewclock"))
}

fn socket_path(data_dir: &Path) -> Result<PathBuf, String> {
    if let Ok(path) = env::var(SOCKET_ENV) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    Ok(data_dir.join(SOCKET_NAME))
}

fn prepare_socket_dir(socket_path: &Path) -> Result<(), String> {
    let parent = socket_path
        .parent()
        .ok_or_else(|| "Socket path has no parent".to_string())?;
    fs::create_dir_all(parent).map_err(|err| format!("Failed to create socket directory: {}", err))
}

fn remove_existing_socket(socket_path: &Path) -> Result<(), String> {
    if socket_path.exists() {
        fs::remove_file(socket_path)
            .map_err(|err| format!("Failed to remove existing socket: {}", err))?;
    }
    Ok(())
}
