//! Unix socket server.
//!
//! Connection lifecycle: accept, read one request line (bounded by
//! `daemon.request_timeout_ms`), answer, close. Every connection runs in its
//! own task, and every resolution in a task of its own so a panic turns
//! into an error response instead of taking the daemon down.

use super::finalize;
use crate::error::CliError;
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use cliflow_core::{Config, DaemonStats, Request, RequestKind, Resolver, Response};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Request lines longer than this are cut off and rejected.
const MAX_REQUEST_BYTES: u64 = 1024 * 1024;

/// The answer to one request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Line written back to the client
    pub response: Response,
    /// Stop serving once the response is written
    pub shutdown: bool,
}

/// A completion daemon bound to one socket path.
#[derive(Debug)]
pub struct Daemon {
    resolver: Arc<Resolver>,
    socket_path: PathBuf,
    request_timeout: Duration,
    max_suggestions: usize,
    started_at: DateTime<Utc>,
}

impl Daemon {
    /// Daemon serving `resolver` on `socket_path` with default limits.
    pub fn new(resolver: Resolver, socket_path: impl Into<PathBuf>) -> Self {
        let defaults = Config::default();
        Self {
            resolver: Arc::new(resolver),
            socket_path: socket_path.into(),
            request_timeout: Duration::from_millis(defaults.daemon.request_timeout_ms),
            max_suggestions: defaults.daemon.max_suggestions,
            started_at: Utc::now(),
        }
    }

    /// Daemon configured entirely from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let resolver = super::build_resolver(config)?;
        Ok(Self::new(resolver, config.socket_path()?)
            .with_request_timeout(Duration::from_millis(config.daemon.request_timeout_ms))
            .with_max_suggestions(config.daemon.max_suggestions))
    }

    /// How long a connection may take to deliver its request line.
    #[must_use]
    pub const fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Upper bound on suggestions per response.
    #[must_use]
    pub const fn with_max_suggestions(mut self, max_suggestions: usize) -> Self {
        self.max_suggestions = max_suggestions;
        self
    }

    /// Socket this daemon listens on.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Bind the socket and serve until a `shutdown` request, SIGINT or
    /// SIGTERM. The socket file is removed on the way out.
    ///
    /// # Errors
    ///
    /// Fails only if the socket cannot be bound, including when another
    /// daemon already answers on it.
    pub async fn run(self) -> Result<()> {
        let listener = bind(&self.socket_path).await?;
        info!(
            socket = %self.socket_path.display(),
            specs = self.resolver.registry().len(),
            "daemon listening"
        );

        let daemon = Arc::new(self);
        let shutdown = Arc::new(Notify::new());
        let signal = shutdown_signal();
        tokio::pin!(signal);

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let daemon = Arc::clone(&daemon);
                        let shutdown = Arc::clone(&shutdown);
                        tokio::spawn(async move {
                            if let Err(e) = daemon.serve_connection(stream, &shutdown).await {
                                debug!(error = %e, "connection ended with error");
                            }
                        });
                    },
                    Err(e) => warn!(error = %e, "accept failed"),
                },
                () = shutdown.notified() => {
                    info!("shutdown requested");
                    break;
                },
                () = &mut signal => {
                    info!("signal received, shutting down");
                    break;
                },
            }
        }

        drop(listener);
        if let Err(e) = std::fs::remove_file(&daemon.socket_path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(error = %e, "failed to remove socket");
            }
        }
        info!("daemon stopped");
        Ok(())
    }

    async fn serve_connection(&self, stream: UnixStream, shutdown: &Notify) -> Result<()> {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half).take(MAX_REQUEST_BYTES);
        let mut raw = Vec::new();

        match timeout(self.request_timeout, reader.read_until(b'\n', &mut raw)).await {
            Err(_) => {
                debug!("no request line before timeout");
                return Ok(());
            },
            Ok(Err(e)) => return Err(e.into()),
            Ok(Ok(0)) => {
                debug!("client closed without a request");
                return Ok(());
            },
            Ok(Ok(_)) => {},
        }

        let reply = match String::from_utf8(raw) {
            Ok(line) => self.handle_line(&line).await,
            Err(_) => {
                debug!("rejecting request that is not UTF-8");
                Reply {
                    response: Response::error("invalid request: not UTF-8"),
                    shutdown: false,
                }
            },
        };
        write_half
            .write_all(reply.response.to_line()?.as_bytes())
            .await?;
        write_half.flush().await?;

        if reply.shutdown {
            shutdown.notify_one();
        }
        Ok(())
    }

    /// Answer one request line.
    pub async fn handle_line(&self, line: &str) -> Reply {
        let request = match Request::parse_line(line) {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, "rejecting request");
                return Reply {
                    response: Response::error(e.to_string()),
                    shutdown: false,
                };
            },
        };

        match request.kind {
            RequestKind::Health => Reply {
                response: Response::ok(Vec::new()),
                shutdown: false,
            },
            RequestKind::Shutdown => Reply {
                response: Response::ok(Vec::new()),
                shutdown: true,
            },
            RequestKind::Stats => Reply {
                response: Response::stats(self.stats().await),
                shutdown: false,
            },
            RequestKind::Complete => Reply {
                response: self.complete(request).await,
                shutdown: false,
            },
        }
    }

    async fn stats(&self) -> DaemonStats {
        let cache = self.resolver.executor().cache().stats().await;
        DaemonStats {
            started_at: self.started_at,
            specs: self.resolver.registry().len(),
            cache_entries: cache.entries,
            cache_hits: cache.hits,
            cache_misses: cache.misses,
            cache_failures: cache.failures,
            history_commands: self.resolver.history().stats().commands,
        }
    }

    async fn complete(&self, request: Request) -> Response {
        let default_cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        let ctx = request.into_context(default_cwd);
        debug!(line = %ctx.command_line, tokens = ctx.tokens.len(), "completing");

        let resolver = Arc::clone(&self.resolver);
        match tokio::spawn(async move { resolver.resolve(&ctx).await }).await {
            Ok(suggestions) => Response::ok(finalize(suggestions, self.max_suggestions)),
            Err(e) => {
                warn!(error = %e, "completion task failed");
                Response::error(format!("completion failed: {e}"))
            },
        }
    }
}

/// Bind `path`, clearing a stale socket file first.
async fn bind(path: &Path) -> Result<UnixListener> {
    if path.exists() {
        if UnixStream::connect(path).await.is_ok() {
            return Err(CliError::usage(anyhow!(
                "a daemon is already listening on {}",
                path.display()
            ))
            .into());
        }
        std::fs::remove_file(path)
            .with_context(|| format!("failed to remove stale socket {}", path.display()))?;
        info!(socket = %path.display(), "removed stale socket");
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    UnixListener::bind(path).with_context(|| format!("failed to bind {}", path.display()))
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::daemon::client::{is_running, send};
    use cliflow_core::{
        Argument, CachePolicy, CommandSpec, CompletionContext, Generator, GeneratorExecutor,
        Producer, SpecRegistry, Suggestion,
    };
    use tempfile::TempDir;

    fn git_resolver() -> Resolver {
        let mut registry = SpecRegistry::new();
        registry.register(
            CommandSpec::new("git")
                .with_subcommand(CommandSpec::new("checkout"))
                .with_subcommand(CommandSpec::new("cherry-pick"))
                .with_subcommand(CommandSpec::new("commit")),
        );
        Resolver::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn test_complete_request() {
        let daemon = Daemon::new(git_resolver(), "/unused.sock");
        let reply = daemon
            .handle_line(r#"{"commandLine":"git chec","cwd":"/tmp"}"#)
            .await;
        assert!(!reply.shutdown);
        assert!(reply.response.success);
        let first = &reply.response.suggestions[0];
        assert_eq!(first.name, "checkout");
        assert_eq!(first.icon.as_deref(), Some("⚡"));
    }

    #[tokio::test]
    async fn test_max_suggestions() {
        let daemon = Daemon::new(git_resolver(), "/unused.sock").with_max_suggestions(1);
        let reply = daemon
            .handle_line(r#"{"commandLine":"git c","cwd":"/tmp"}"#)
            .await;
        assert_eq!(reply.response.suggestions.len(), 1);
    }

    #[tokio::test]
    async fn test_bad_request_is_error_response() {
        let daemon = Daemon::new(git_resolver(), "/unused.sock");
        let reply = daemon.handle_line("{oops").await;
        assert!(!reply.response.success);
        assert!(reply.response.suggestions.is_empty());
        assert!(
            reply
                .response
                .error
                .as_deref()
                .is_some_and(|e| e.contains("invalid request"))
        );
    }

    #[tokio::test]
    async fn test_control_requests() {
        let daemon = Daemon::new(git_resolver(), "/unused.sock");
        let health = daemon.handle_line(r#"{"type":"health"}"#).await;
        assert_eq!(health.response, Response::ok(Vec::new()));
        assert!(!health.shutdown);

        let shutdown = daemon.handle_line(r#"{"type":"shutdown"}"#).await;
        assert!(shutdown.response.success);
        assert!(shutdown.shutdown);
    }

    #[tokio::test]
    async fn test_stats_request_counts_cache_use() {
        let mut registry = SpecRegistry::new();
        registry.register(CommandSpec::new("say").with_arg(
            Argument::new("word").with_generator(Generator::script("printf 'hi\\nho\\n'")),
        ));
        let daemon = Daemon::new(Resolver::new(Arc::new(registry)), "/unused.sock");

        for _ in 0..2 {
            let reply = daemon.handle_line(r#"{"commandLine":"say ","cwd":"/tmp"}"#).await;
            assert_eq!(reply.response.suggestions.len(), 2);
        }

        let reply = daemon.handle_line(r#"{"type":"stats"}"#).await;
        assert!(reply.response.suggestions.is_empty());
        let stats = reply.response.stats.unwrap();
        assert_eq!(stats.specs, 1);
        assert_eq!(stats.cache_entries, 1);
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.cache_hits, 1);
        assert!(stats.started_at <= Utc::now());
    }

    struct Exploding;

    #[async_trait::async_trait]
    impl Producer for Exploding {
        async fn produce(&self, _ctx: &CompletionContext) -> cliflow_core::Result<Vec<Suggestion>> {
            panic!("producer exploded");
        }
    }

    #[tokio::test]
    async fn test_panicking_producer_only_empties_its_slot() {
        let mut registry = SpecRegistry::new();
        registry.register(
            CommandSpec::new("boom").with_arg(
                Argument::new("x")
                    .with_suggestions(["safe"])
                    .with_generator(Generator::custom("explode").with_cache(CachePolicy::DISABLED)),
            ),
        );
        let mut executor = GeneratorExecutor::default();
        executor.register("explode", Arc::new(Exploding));
        let resolver = Resolver::new(Arc::new(registry)).with_executor(executor);

        let daemon = Daemon::new(resolver, "/unused.sock");
        let reply = daemon.handle_line(r#"{"commandLine":"boom ","cwd":"/tmp"}"#).await;
        assert!(reply.response.success);
        let names: Vec<_> = reply.response.suggestions.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["safe"]);

        // The daemon keeps answering afterwards
        let reply = daemon.handle_line(r#"{"type":"health"}"#).await;
        assert!(reply.response.success);
    }

    #[tokio::test]
    async fn test_socket_round_trip_and_shutdown() {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("cliflow.sock");
        let daemon = Daemon::new(git_resolver(), &socket);
        let server = tokio::spawn(daemon.run());

        let mut up = false;
        for _ in 0..50 {
            if is_running(&socket).await {
                up = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(up, "daemon never answered");

        let response = send(
            &socket,
            &Request::complete("git chec", dir.path()),
            Duration::from_secs(3),
        )
        .await
        .unwrap();
        assert_eq!(response.suggestions[0].name, "checkout");

        // A second daemon on the same path refuses to start
        let second = Daemon::new(git_resolver(), &socket).run().await;
        assert!(second.is_err());

        let response = send(
            &socket,
            &Request::control(RequestKind::Shutdown),
            Duration::from_secs(3),
        )
        .await
        .unwrap();
        assert!(response.success);

        timeout(Duration::from_secs(3), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(!socket.exists());
    }

    #[tokio::test]
    async fn test_stale_socket_is_replaced() {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("cliflow.sock");
        drop(std::os::unix::net::UnixListener::bind(&socket).unwrap());
        assert!(socket.exists());

        let listener = bind(&socket).await.unwrap();
        drop(listener);
    }

    #[tokio::test]
    async fn test_silent_client_is_dropped() {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("cliflow.sock");
        let daemon = Daemon::new(git_resolver(), &socket)
            .with_request_timeout(Duration::from_millis(50));
        let server = tokio::spawn(daemon.run());
        for _ in 0..50 {
            if socket.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let stream = UnixStream::connect(&socket).await.unwrap();
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        let read = timeout(Duration::from_secs(2), reader.read_line(&mut line))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read, 0);

        assert!(is_running(&socket).await);
        server.abort();
    }

    struct Slow;

    #[async_trait::async_trait]
    impl Producer for Slow {
        async fn produce(&self, _ctx: &CompletionContext) -> cliflow_core::Result<Vec<Suggestion>> {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Ok(vec![Suggestion::new("late", cliflow_core::SuggestionKind::Argument)])
        }
    }

    async fn start(daemon: Daemon) -> (tokio::task::JoinHandle<Result<()>>, PathBuf) {
        let socket = daemon.socket_path().to_path_buf();
        let server = tokio::spawn(daemon.run());
        for _ in 0..50 {
            if is_running(&socket).await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        (server, socket)
    }

    #[tokio::test]
    async fn test_slow_request_does_not_block_others() {
        let dir = TempDir::new().unwrap();
        let mut registry = SpecRegistry::new();
        registry.register(
            CommandSpec::new("slow").with_arg(
                Argument::new("x")
                    .with_generator(Generator::custom("slow").with_cache(CachePolicy::DISABLED)),
            ),
        );
        let mut executor = GeneratorExecutor::default();
        executor.register("slow", Arc::new(Slow));
        let resolver = Resolver::new(Arc::new(registry)).with_executor(executor);
        let (server, socket) = start(Daemon::new(resolver, dir.path().join("cliflow.sock"))).await;

        let slow_socket = socket.clone();
        let slow = tokio::spawn(async move {
            send(
                &slow_socket,
                &Request::complete("slow ", "/tmp"),
                Duration::from_secs(5),
            )
            .await
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = std::time::Instant::now();
        let health = send(
            &socket,
            &Request::control(RequestKind::Health),
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        assert!(health.success);
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!slow.is_finished());

        let slow = slow.await.unwrap().unwrap();
        assert_eq!(slow.suggestions[0].name, "late");
        server.abort();
    }

    #[tokio::test]
    async fn test_non_utf8_request_gets_error_line() {
        let dir = TempDir::new().unwrap();
        let (server, socket) =
            start(Daemon::new(git_resolver(), dir.path().join("cliflow.sock"))).await;

        let mut stream = UnixStream::connect(&socket).await.unwrap();
        stream
            .write_all(b"{\"commandLine\":\"git \xff\"}\n")
            .await
            .unwrap();
        let mut line = String::new();
        timeout(Duration::from_secs(2), BufReader::new(stream).read_line(&mut line))
            .await
            .unwrap()
            .unwrap();

        let response = Response::parse_line(&line).unwrap();
        assert!(!response.success);
        assert!(
            response
                .error
                .as_deref()
                .is_some_and(|e| e.contains("not UTF-8"))
        );
        server.abort();
    }
}
