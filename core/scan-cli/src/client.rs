//! Client helper for talking to the kiosk daemon socket.
//!
//! The daemon is the only writer. Failures surface to the caller as error
//! strings; the CLI decides the exit code.

use std::env;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

use rand::RngCore;

use crewclock_fleet_protocol::{Request, Response, MAX_REQUEST_BYTES};

const SOCKET_ENV: &str = "CREWCLOCK_SOCKET";
const SOCKET_NAME: &str = "kiosk.sock";
const READ_TIMEOUT_MS: u64 = 2_000;
const WRITE_TIMEOUT_MS: u64 = 600;

pub fn socket_path() -> Result<PathBuf, String> {
    if let Ok(path) = env::var(SOCKET_ENV) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    let home = dirs::home_dir().ok_or_else(|| "Home directory not found".to_string())?;
    Ok(home.join(".crewclock").join(SOCKET_NAME))
}

/// A short random id so responses can be correlated in the daemon log.
pub fn request_id() -> String {
    let mut bytes = [0u8; 6];
    rand::thread_rng().fill_bytes(&mut bytes);
    let mut id = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        id.push_str(&format!("{:02x}", byte));
    }
    id
}

pub fn send_request(request: &Request) -> Result<Response, String> {
    let path = socket_path()?;
    tracing::debug!(path = %path.display(), method = ?request.method, "Sending kiosk request");
    let mut stream = UnixStream::connect(&path)
        .map_err(|err| format!("failed to connect to {}: {}", path.display(), err))?;
    let _ = stream.set_read_timeout(Some(Duration::from_millis(READ_TIMEOUT_MS)));
    let _ = stream.set_write_timeout(Some(Duration::from_millis(WRITE_TIMEOUT_MS)));

    let payload =
        serde_json::to_vec(request).map_err(|err| format!("failed to encode request: {}", err))?;
    stream
        .write_all(&payload)
        .and_then(|_| stream.write_all(b"\n"))
        .map_err(|err| format!("failed to send request: {}", err))?;
    let _ = stream.flush();

    read_response(&mut stream)
}

fn read_response(stream: &mut UnixStream) -> Result<Response, String> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > MAX_REQUEST_BYTES {
                    return Err("response exceeded maximum size".to_string());
                }
                if chunk[..n].contains(&b'\n') {
                    break;
                }
            }
            Err(err) => return Err(format!("failed to read response: {}", err)),
        }
    }

    let newline_index = buffer.iter().position(|b| *b == b'\n');
    let response_bytes = match newline_index {
        Some(index) => &buffer[..index],
        None => buffer.as_slice(),
    };

    serde_json::from_slice(response_bytes)
        .map_err(|err| format!("failed to parse response: {}", err))
}
