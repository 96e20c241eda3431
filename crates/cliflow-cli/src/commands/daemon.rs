//! `cliflow daemon run|start|stop|status`.

use anyhow::{Context, Result, anyhow};
use cliflow_core::{Config, DaemonStats, Request, RequestKind, Response, SpecRegistry};
use colored::Colorize;
use std::fs::OpenOptions;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::debug;

use crate::daemon::{self, Daemon};
use crate::error::CliError;

/// How long `start` waits for the new daemon and `stop` for the old one.
const READY_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const LOG_FILE: &str = "daemon.log";

/// Serve in the foreground.
pub async fn run(config: &Config) -> Result<()> {
    Daemon::from_config(config)?.run().await
}

/// Spawn `cliflow daemon run` detached from the terminal and wait until it
/// answers a health check.
// The spawned daemon outlives this process and is never waited on.
#[allow(clippy::zombie_processes)]
pub async fn start(config: &Config) -> Result<()> {
    let socket = config.socket_path()?;
    if daemon::is_running(&socket).await {
        println!("Daemon already running on {}", socket.display());
        return Ok(());
    }

    let home = cliflow_core::config::home_dir()?;
    std::fs::create_dir_all(&home)
        .with_context(|| format!("failed to create {}", home.display()))?;
    let log_path = home.join(LOG_FILE);
    let log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    let exe = std::env::current_exe().context("cannot locate the cliflow executable")?;
    let child = Command::new(exe)
        .args(["daemon", "run"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::from(log))
        .process_group(0)
        .spawn()
        .context("failed to spawn daemon")?;
    debug!(pid = child.id(), "daemon spawned");

    if wait_until(READY_TIMEOUT, || daemon::is_running(&socket)).await {
        println!(
            "{} Daemon started (pid {}) on {}",
            "✓".green(),
            child.id(),
            socket.display()
        );
        Ok(())
    } else {
        Err(CliError::daemon_unavailable(anyhow!(
            "daemon did not come up within {}s; see {}",
            READY_TIMEOUT.as_secs(),
            log_path.display()
        ))
        .into())
    }
}

/// Ask the daemon to shut down and wait for its socket to disappear.
pub async fn stop(config: &Config) -> Result<()> {
    let socket = config.socket_path()?;
    if !daemon::is_running(&socket).await {
        println!("Daemon is not running");
        return Ok(());
    }

    let wait = Duration::from_millis(config.client.timeout_ms);
    daemon::send(&socket, &Request::control(RequestKind::Shutdown), wait).await?;

    if wait_until(READY_TIMEOUT, || async { !socket.exists() }).await {
        println!("{} Daemon stopped", "✓".green());
        Ok(())
    } else {
        Err(CliError::timeout(anyhow!(
            "daemon acknowledged shutdown but {} is still present",
            socket.display()
        ))
        .into())
    }
}

/// Print socket, config and spec information, plus the daemon's own
/// counters when it answers; exits with the daemon-unavailable code when
/// nothing does.
pub async fn status(config: &Config) -> Result<()> {
    let socket = config.socket_path()?;
    let running = daemon::is_running(&socket).await;

    let state = if running {
        "running".green().bold()
    } else {
        "not running".yellow().bold()
    };
    println!("Daemon:   {state}");
    println!("Socket:   {}", describe_path(&socket));
    println!("Config:   {}", describe_path(&Config::config_path()?));

    let dirs = config.spec_dirs()?;
    for dir in &dirs {
        let count = SpecRegistry::load_dirs(std::slice::from_ref(dir)).len();
        println!("Specs:    {} ({count} specs)", describe_path(dir));
    }
    println!(
        "History:  {}",
        match (config.history.enabled, config.history_file()) {
            (false, _) => "disabled".to_string(),
            (true, Some(file)) => describe_path(&file),
            (true, None) => "no history file".to_string(),
        }
    );

    if !running {
        return Err(CliError::daemon_unavailable(anyhow!("daemon is not running")).into());
    }

    let wait = Duration::from_millis(config.client.timeout_ms);
    match daemon::send(&socket, &Request::control(RequestKind::Stats), wait).await {
        Ok(Response {
            stats: Some(stats), ..
        }) => print_stats(&stats),
        Ok(_) => debug!("daemon sent no stats"),
        Err(e) => debug!(error = %e, "stats request failed"),
    }
    Ok(())
}

fn print_stats(stats: &DaemonStats) {
    println!(
        "Uptime:   since {}",
        stats.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("Loaded:   {} specs", stats.specs);
    println!(
        "Cache:    {} entries, {} hits, {} misses, {} failures",
        stats.cache_entries, stats.cache_hits, stats.cache_misses, stats.cache_failures
    );
    println!("Indexed:  {} history commands", stats.history_commands);
}

fn describe_path(path: &Path) -> String {
    if path.exists() {
        path.display().to_string()
    } else {
        format!("{} {}", path.display(), "(missing)".bright_black())
    }
}

/// Poll `check` until it holds or `limit` passes.
async fn wait_until<F, Fut>(limit: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_wait_until_polls_until_true() {
        let calls = AtomicUsize::new(0);
        let ok = wait_until(Duration::from_secs(2), || async {
            calls.fetch_add(1, Ordering::SeqCst) >= 2
        })
        .await;
        assert!(ok);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_wait_until_gives_up() {
        let ok = wait_until(Duration::from_millis(150), || async { false }).await;
        assert!(!ok);
    }
}
