//! Async request/response exchange with a running daemon.

use crate::error::CliError;
use anyhow::{Result, anyhow};
use cliflow_core::{Request, RequestKind, Response};
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::time::timeout;

/// How long a liveness check waits for an answer.
const HEALTH_TIMEOUT: Duration = Duration::from_millis(500);

/// Send one request and wait up to `wait` for the response line.
///
/// Connection failures and an early close map to
/// [`ErrorCategory::DaemonUnavailable`](crate::error::ErrorCategory), an
/// expired wait to [`ErrorCategory::Timeout`](crate::error::ErrorCategory).
pub async fn send(socket: &Path, request: &Request, wait: Duration) -> Result<Response> {
    timeout(wait, exchange(socket, request))
        .await
        .map_err(|_| {
            CliError::timeout(anyhow!(
                "daemon did not answer within {}ms",
                wait.as_millis()
            ))
        })?
}

async fn exchange(socket: &Path, request: &Request) -> Result<Response> {
    let stream = UnixStream::connect(socket).await.map_err(|e| {
        CliError::daemon_unavailable(anyhow!("no daemon at {}: {e}", socket.display()))
    })?;
    let (read_half, mut write_half) = stream.into_split();

    write_half.write_all(request.to_line()?.as_bytes()).await?;
    write_half.flush().await?;

    let mut line = String::new();
    BufReader::new(read_half).read_line(&mut line).await?;
    if line.trim().is_empty() {
        return Err(CliError::daemon_unavailable(anyhow!(
            "daemon closed the connection without answering"
        ))
        .into());
    }
    Ok(Response::parse_line(&line)?)
}

/// Whether a daemon answers a health check on `socket`.
pub async fn is_running(socket: &Path) -> bool {
    send(socket, &Request::control(RequestKind::Health), HEALTH_TIMEOUT)
        .await
        .is_ok_and(|response| response.success)
}
