use crewclock_fleet_protocol::{Method, Request, Response, PROTOCOL_VERSION};
use serde_json::{json, Value};
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tempfile::TempDir;

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

/// Disables lunch windows and shift clears so the test behaves the same no
/// matter what wall-clock time it runs at.
fn write_test_config(home: &Path) {
    let dir = home.join(".crewclock");
    std::fs::create_dir_all(&dir).expect("create data dir");
    std::fs::write(dir.join("kiosk.toml"), "lunch_windows = []\nshift_starts = []\n")
        .expect("write kiosk config");
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
    read_response(&mut stream)
}

fn read_response(stream: &mut UnixStream) -> Response {
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

fn call(socket: &Path, method: Method, id: &str, params: Option<Value>) -> Response {
    send_request(
        socket,
        Request {
            protocol_version: PROTOCOL_VERSION,
            method,
            id: Some(id.to_string()),
            params,
        },
    )
}

fn data_str<'a>(data: &'a Value, key: &str) -> &'a str {
    data.get(key).and_then(Value::as_str).unwrap_or("missing")
}

#[test]
fn kiosk_session_lifecycle_smoke() {
    let home = TempDir::new().expect("Failed to create temp HOME");
    write_test_config(home.path());
    let socket = socket_path(home.path());
    let child = spawn_daemon(home.path());
    let _guard = DaemonGuard { child };

    wait_for_socket(&socket, Duration::from_secs(2));

    let health = call(&socket, Method::GetHealth, "health-check", None);
    assert!(health.ok, "health response was not ok");
    let status = health
        .data
        .as_ref()
        .and_then(|data| data.get("status"))
        .and_then(|value| value.as_str())
        .unwrap_or("missing");
    assert_eq!(status, "ok");

    // Arm a one-hour budget with project metadata.
    let started = call(
        &socket,
        Method::StartSession,
        "start",
        Some(json!({
            "hours": 1,
            "company": "Acme",
            "project": "Relabel",
            "line_leader": "Sam",
            "category": "Kitting",
            "size": "8oz",
        })),
    );
    assert!(started.ok, "start response was not ok");

    // First scan clocks the badge in.
    let scan_in = call(
        &socket,
        Method::Scan,
        "scan-1",
        Some(json!({ "badge_id": "badge-7" })),
    );
    assert!(scan_in.ok);
    assert_eq!(data_str(scan_in.data.as_ref().unwrap(), "result"), "clocked_in");

    let status = call(&socket, Method::GetStatus, "status-1", None);
    let data = status.data.expect("status payload");
    assert_eq!(data["headcount"], 1);
    assert_eq!(data["company_name"], "Acme");
    assert_eq!(data["pause_state"], "running");
    assert_eq!(data["counting"], true);
    assert_eq!(data["scan_count"], 1);

    // Second scan of the same badge clocks out.
    let scan_out = call(
        &socket,
        Method::Scan,
        "scan-2",
        Some(json!({ "badge_id": "badge-7" })),
    );
    assert_eq!(
        data_str(scan_out.data.as_ref().unwrap(), "result"),
        "clocked_out"
    );

    // Lunch needs at least one worker on the clock.
    let lunch = call(&socket, Method::TakeLunch, "lunch", None);
    assert!(lunch.ok);
    assert_eq!(
        data_str(lunch.data.as_ref().unwrap(), "result"),
        "ignored_no_workers"
    );

    // Save to queue, which empties the session.
    let saved = call(&socket, Method::SaveToQueue, "save", None);
    assert!(saved.ok);
    let saved_data = saved.data.expect("save payload");
    assert_eq!(data_str(&saved_data, "result"), "queued");
    let queue_id = data_str(&saved_data, "queue_id").to_string();
    assert!(queue_id.starts_with("q-"));

    let status = call(&socket, Method::GetStatus, "status-2", None);
    let data = status.data.expect("status payload");
    assert_eq!(data["project_name"], "");
    assert_eq!(data["seconds_remaining"], 0);

    let queue = call(&socket, Method::ListQueue, "queue", None);
    let items = queue.data.expect("queue payload");
    assert_eq!(items["items"].as_array().expect("items array").len(), 1);

    // The saved item carried a leader, so it starts unattended.
    let restarted = call(
        &socket,
        Method::StartFromQueue,
        "restart",
        Some(json!({ "queue_id": queue_id })),
    );
    assert!(restarted.ok);
    assert_eq!(
        data_str(restarted.data.as_ref().unwrap(), "result"),
        "started"
    );

    let queue = call(&socket, Method::ListQueue, "queue-2", None);
    let items = queue.data.expect("queue payload");
    assert!(items["items"].as_array().expect("items array").is_empty());

    let status = call(&socket, Method::GetStatus, "status-3", None);
    let data = status.data.expect("status payload");
    assert_eq!(data["project_name"], "Relabel");
    assert_eq!(data["line_leader_name"], "Sam");
    assert_eq!(data["counting"], true);

    // Finish freezes the session and writes the report.
    let finished = call(&socket, Method::Finish, "finish", None);
    assert!(finished.ok);

    let status = call(&socket, Method::GetStatus, "status-4", None);
    let data = status.data.expect("status payload");
    assert_eq!(data["finished"], true);

    let rejected = call(
        &socket,
        Method::Scan,
        "scan-3",
        Some(json!({ "badge_id": "badge-7" })),
    );
    assert_eq!(
        data_str(rejected.data.as_ref().unwrap(), "result"),
        "ignored_finished"
    );

    let reports_dir = home.path().join(".crewclock").join("reports");
    let report_count = std::fs::read_dir(&reports_dir)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(report_count, 1, "expected exactly one final report");
}

#[test]
fn pause_resume_round_trip_with_codes() {
    let home = TempDir::new().expect("Failed to create temp HOME");
    write_test_config(home.path());
    let socket = socket_path(home.path());
    let child = spawn_daemon(home.path());
    let _guard = DaemonGuard { child };

    wait_for_socket(&socket, Duration::from_secs(2));

    call(
        &socket,
        Method::StartSession,
        "start",
        Some(json!({ "minutes": 30 })),
    );

    let wrong = call(
        &socket,
        Method::Pause,
        "pause-wrong",
        Some(json!({ "code": "000000" })),
    );
    assert_eq!(data_str(wrong.data.as_ref().unwrap(), "result"), "wrong_code");

    let paused = call(
        &socket,
        Method::Pause,
        "pause",
        Some(json!({ "code": "340340" })),
    );
    assert_eq!(data_str(paused.data.as_ref().unwrap(), "result"), "paused");

    // QC holds reject the generic resume until toggled off with the code.
    let resumed = call(&socket, Method::Resume, "resume", None);
    assert_eq!(data_str(resumed.data.as_ref().unwrap(), "result"), "resumed");

    let qc = call(
        &socket,
        Method::ToggleQc,
        "qc-on",
        Some(json!({ "kind": "component", "code": "440440" })),
    );
    assert_eq!(data_str(qc.data.as_ref().unwrap(), "result"), "paused");

    let blocked = call(&socket, Method::Resume, "resume-blocked", None);
    assert_eq!(
        data_str(blocked.data.as_ref().unwrap(), "result"),
        "credential_gated"
    );

    let status = call(&socket, Method::GetStatus, "status", None);
    assert_eq!(status.data.expect("status payload")["pause_state"], "qc_component");

    let qc_off = call(
        &socket,
        Method::ToggleQc,
        "qc-off",
        Some(json!({ "kind": "component", "code": "440440" })),
    );
    assert_eq!(data_str(qc_off.data.as_ref().unwrap(), "result"), "resumed");
}
