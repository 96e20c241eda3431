//! Thin per-keystroke client.
//!
//! Usage: `cliflow-client '<REQUEST_JSON>'`. Sends the request line to the
//! daemon, prints the first response line verbatim and exits 0. Any failure
//! (no daemon, timeout, early close, missing argument) exits 1 with nothing
//! on stdout so the shell hook can simply ignore it.
//!
//! No async runtime and no logging: this runs on every keystroke.

use cliflow_core::Config;
use cliflow_core::config::default_socket_path;
use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

fn main() -> ExitCode {
    let Some(request) = std::env::args().nth(1) else {
        return ExitCode::FAILURE;
    };

    // A broken config must not break completion; fall back to defaults
    let config = Config::load().unwrap_or_default();
    let Ok(socket) = config.socket_path().or_else(|_| default_socket_path()) else {
        return ExitCode::FAILURE;
    };
    let wait = Duration::from_millis(config.client.timeout_ms);

    match exchange(&socket, &request, wait) {
        Ok(Some(line)) => {
            let mut stdout = io::stdout().lock();
            if stdout.write_all(line.as_bytes()).and_then(|()| stdout.flush()).is_err() {
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        },
        Ok(None) | Err(_) => ExitCode::FAILURE,
    }
}

/// Write one request line and read one response line, newline included.
fn exchange(socket: &Path, request: &str, wait: Duration) -> io::Result<Option<String>> {
    let mut stream = UnixStream::connect(socket)?;
    stream.set_read_timeout(Some(wait))?;
    stream.set_write_timeout(Some(wait))?;

    stream.write_all(request.trim_end().as_bytes())?;
    stream.write_all(b"\n")?;
    stream.flush()?;

    let mut line = String::new();
    BufReader::new(stream).read_line(&mut line)?;
    if line.trim().is_empty() {
        return Ok(None);
    }
    if !line.ends_with('\n') {
        line.push('\n');
    }
    Ok(Some(line))
}
