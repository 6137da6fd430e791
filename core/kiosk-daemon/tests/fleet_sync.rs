//! End-to-end fleet-document reconciliation against a live daemon:
//! recovery adoption on startup, then a timestamp-gated remote command.

use chrono::Utc;
use crewclock_fleet_protocol::{FleetDocument, Method, Request, Response, PROTOCOL_VERSION};
use serde_json::Value;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const FLEET_ID: &str = "test-kiosk";

struct DaemonGuard {
    child: Child,
}

impl Drop for DaemonGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn spawn_daemon(home: &Path) -> Child {
    Command::new(env!("CARGO_BIN_EXE_crewclock-kiosk"))
        .env("HOME", home)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn crewclock-kiosk")
}

fn socket_path(home: &Path) -> PathBuf {
    home.join(".crewclock").join("kiosk.sock")
}

fn fleet_doc_path(home: &Path) -> PathBuf {
    home.join(".crewclock")
        .join("fleet")
        .join(format!("{}.json", FLEET_ID))
}

fn wait_for_socket(path: &Path, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if path.exists() {
            return;
        }
        sleep(Duration::from_millis(25));
    }
    panic!("Timed out waiting for kiosk socket at {}", path.display());
}

fn send_request(socket: &Path, request: Request) -> Response {
    let mut stream = UnixStream::connect(socket).expect("Failed to connect to kiosk socket");
    serde_json::to_writer(&mut stream, &request).expect("Failed to serialize request");
    stream.write_all(b"\n").expect("Failed to write request");
    stream.flush().ok();

    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).expect("Failed to read response");
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if chunk[..n].contains(&b'\n') {
            break;
        }
    }
    let newline_index = buffer.iter().position(|b| *b == b'\n');
    let response_bytes = match newline_index {
        Some(index) => &buffer[..index],
        None => buffer.as_slice(),
    };
    serde_json::from_slice(response_bytes).expect("Failed to parse response JSON")
}

fn get_status(socket: &Path) -> Value {
    let response = send_request(
        socket,
        Request {
            protocol_version: PROTOCOL_VERSION,
            method: Method::GetStatus,
            id: Some("status".to_string()),
            params: None,
        },
    );
    assert!(response.ok, "status response was not ok");
    response.data.expect("status payload")
}

/// Polls status until the predicate holds; the poller and tick both run at
/// 1 Hz, so a few seconds of patience covers the round trip.
fn wait_for_status(socket: &Path, timeout: Duration, predicate: impl Fn(&Value) -> bool) -> Value {
    let deadline = Instant::now() + timeout;
    let mut last = Value::Null;
    while Instant::now() < deadline {
        last = get_status(socket);
        if predicate(&last) {
            return last;
        }
        sleep(Duration::from_millis(200));
    }
    panic!("Timed out waiting for status condition; last status: {last}");
}

/// Atomic write, so the daemon's poller never reads a torn document.
fn write_fleet_doc(home: &Path, doc: &FleetDocument) {
    let path = fleet_doc_path(home);
    std::fs::create_dir_all(path.parent().unwrap()).expect("create fleet dir");
    let temp = path.with_extension("json.test-tmp");
    std::fs::write(&temp, serde_json::to_string_pretty(doc).unwrap()).expect("write fleet doc");
    std::fs::rename(&temp, &path).expect("replace fleet doc");
}

fn read_fleet_doc(home: &Path) -> FleetDocument {
    let content = std::fs::read_to_string(fleet_doc_path(home)).expect("read fleet doc");
    serde_json::from_str(&content).expect("parse fleet doc")
}

#[test]
fn adopts_remote_session_then_applies_fresh_command() {
    let home = TempDir::new().expect("Failed to create temp HOME");
    let data_dir = home.path().join(".crewclock");
    std::fs::create_dir_all(&data_dir).expect("create data dir");
    // Empty window lists keep auto-lunch out of the picture regardless of
    // the wall-clock time the test runs at.
    std::fs::write(
        data_dir.join("kiosk.toml"),
        format!(
            "fleet_id = \"{}\"\nlunch_windows = []\nshift_starts = []\n",
            FLEET_ID
        ),
    )
    .expect("write kiosk config");

    // A crashed kiosk left an active session on the shared document.
    write_fleet_doc(
        home.path(),
        &FleetDocument {
            seconds_remaining: Some(120),
            original_seconds: Some(300),
            company_name: Some("Acme".to_string()),
            project_name: Some("Relabel".to_string()),
            active_workers: vec!["badge-1".to_string()],
            ..FleetDocument::default()
        },
    );

    let socket = socket_path(home.path());
    let child = spawn_daemon(home.path());
    let _guard = DaemonGuard { child };
    wait_for_socket(&socket, Duration::from_secs(2));

    // Recovery adoption: restored paused, never running.
    let status = wait_for_status(&socket, Duration::from_secs(5), |status| {
        status["seconds_remaining"] == 120
    });
    assert_eq!(status["pause_state"], "manual_pause");
    assert_eq!(status["counting"], false);
    assert_eq!(status["headcount"], 1);
    assert_eq!(status["project_name"], "Relabel");

    // A controller issues a fresh re-arm command.
    let mut doc = read_fleet_doc(home.path());
    doc.remote_command = Some("SET_TIME|0:10:0".to_string());
    doc.command_timestamp = Some(Utc::now().to_rfc3339());
    write_fleet_doc(home.path(), &doc);

    let status = wait_for_status(&socket, Duration::from_secs(5), |status| {
        status["counting"] == true
    });
    assert_eq!(status["pause_state"], "running");
    let remaining = status["seconds_remaining"].as_i64().expect("remaining");
    assert!((595..=600).contains(&remaining), "remaining: {remaining}");

    // The applied command is blanked on the document so controllers see it
    // was consumed, and the kiosk's echo carries its own state.
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let doc = read_fleet_doc(home.path());
        if doc.remote_command.as_deref() == Some("") {
            assert!(doc.timer_text.is_some());
            break;
        }
        if Instant::now() >= deadline {
            panic!("remote command was never cleared: {:?}", doc.remote_command);
        }
        sleep(Duration::from_millis(200));
    }

    // Replaying the same command timestamp is a no-op: the budget keeps
    // draining only under the ticking rules, it is never re-armed.
    let mut doc = read_fleet_doc(home.path());
    doc.remote_command = Some("RESET".to_string());
    // Reuse an older timestamp than the applied SET_TIME.
    doc.command_timestamp = Some((Utc::now() - chrono::Duration::seconds(120)).to_rfc3339());
    write_fleet_doc(home.path(), &doc);
    sleep(Duration::from_secs(2));
    let status = get_status(&socket);
    assert!(
        status["seconds_remaining"].as_i64().expect("remaining") > 0,
        "stale RESET must not clear the session"
    );
}
