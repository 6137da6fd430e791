//! Unix-socket IPC: newline-delimited JSON requests from the scan CLI and
//! the on-floor UI, answered with a single JSON response.
//!
//! Connections are read on short timeouts with a hard size cap; every
//! failure turns into a typed error response rather than a dropped socket.

use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::sync::mpsc::{channel, Sender};
use std::thread;
use std::time::Duration;

use tracing::warn;

use crewclock_fleet_protocol::{ErrorInfo, Request, Response, MAX_REQUEST_BYTES};

use crate::runtime::RuntimeMsg;

const READ_TIMEOUT_SECS: u64 = 2;
const READ_CHUNK_SIZE: usize = 4096;
const REPLY_TIMEOUT_SECS: u64 = 5;

/// Accepts connections forever, forwarding each request into the runtime
/// channel and writing the reply back.
pub fn spawn_listener(listener: UnixListener, tx: Sender<RuntimeMsg>) {
    thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let tx = tx.clone();
                    thread::spawn(move || handle_connection(stream, tx));
                }
                Err(err) => {
                    warn!(error = %err, "Failed to accept kiosk connection");
                }
            }
        }
    });
}

fn handle_connection(mut stream: UnixStream, tx: Sender<RuntimeMsg>) {
    let request = match read_request(&mut stream) {
        Ok(request) => request,
        Err(err) => {
            warn!(code = %err.code, message = %err.message, "Failed to read request");
            let _ = write_response(&mut stream, Response::error_with_info(None, err));
            return;
        }
    };

    let id = request.id.clone();
    tracing::debug!(method = ?request.method, id = ?id, "Kiosk request received");

    let (reply_tx, reply_rx) = channel();
    if tx
        .send(RuntimeMsg::Ipc {
            request,
            reply: reply_tx,
        })
        .is_err()
    {
        let _ = write_response(
            &mut stream,
            Response::error(id, "shutting_down", "daemon is shutting down"),
        );
        return;
    }

    let response = match reply_rx.recv_timeout(Duration::from_secs(REPLY_TIMEOUT_SECS)) {
        Ok(response) => response,
        Err(_) => Response::error(id, "reply_timeout", "daemon did not reply in time"),
    };
    let _ = write_response(&mut stream, response);
}

fn read_request(stream: &mut UnixStream) -> Result<Request, ErrorInfo> {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(READ_TIMEOUT_SECS)));

    let mut buffer = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > MAX_REQUEST_BYTES {
                    return Err(ErrorInfo::new(
                        "request_too_large",
                        "request exceeded maximum size",
                    ));
                }
                if chunk[..n].contains(&b'\n') {
                    break;
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                return Err(ErrorInfo::new("read_timeout", "request timed out"));
            }
            Err(err) => {
                return Err(ErrorInfo::new(
                    "read_error",
                    format!("failed to read request: {}", err),
                ));
            }
        }
    }

    let newline_index = buffer.iter().position(|b| *b == b'\n');
    let request_bytes = match newline_index {
        Some(index) => &buffer[..index],
        None => buffer.as_slice(),
    };

    serde_json::from_slice(request_bytes).map_err(|err| {
        ErrorInfo::new(
            "invalid_request",
            format!("request is not valid JSON: {}", err),
        )
    })
}

fn write_response(stream: &mut UnixStream, response: Response) -> std::io::Result<()> {
    let _ = stream.set_write_timeout(Some(Duration::from_secs(READ_TIMEOUT_SECS)));
    serde_json::to_writer(&mut *stream, &response)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
    stream.write_all(b"\n")?;
    stream.flush()
}
