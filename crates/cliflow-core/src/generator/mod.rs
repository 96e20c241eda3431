//! Dynamic suggestions from external commands and in-process producers.
//!
//! [`GeneratorExecutor::run`] is the single entry point: it renders the
//! generator against the request, consults the shared [`GeneratorCache`],
//! executes on a miss, and post-processes the output. It never fails; a
//! generator that errors, times out, or exits non-zero contributes nothing.

pub mod builtin;
pub mod cache;
pub mod postprocess;

pub use cache::{CacheKey, CacheStats, GeneratorCache};

use crate::config::GeneratorConfig;
use crate::git;
use crate::spec::{CacheStrategy, Generator, GeneratorKind, ScriptCommand};
use crate::types::{CompletionContext, Suggestion};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// Stdout beyond this many bytes is discarded.
pub const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// In-process suggestion source referenced by `"custom": "<id>"`.
#[async_trait]
pub trait Producer: Send + Sync {
    /// Produce suggestions for the request.
    async fn produce(&self, ctx: &CompletionContext) -> Result<Vec<Suggestion>>;
}

/// Settings shared by every generator run.
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    /// Shell used for string scripts
    pub shell: String,
    /// Timeout when the generator sets none
    pub default_timeout: Duration,
    /// Cache lifetime when the generator sets none
    pub default_ttl: Duration,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self::from(&GeneratorConfig::default())
    }
}

impl From<&GeneratorConfig> for ExecutorSettings {
    fn from(config: &GeneratorConfig) -> Self {
        Self {
            shell: config.shell.clone(),
            default_timeout: config.default_timeout(),
            default_ttl: config.default_ttl(),
        }
    }
}

/// Runs generators with caching.
#[derive(Clone)]
pub struct GeneratorExecutor {
    settings: ExecutorSettings,
    producers: HashMap<String, Arc<dyn Producer>>,
    cache: Arc<GeneratorCache>,
}

impl fmt::Debug for GeneratorExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut producers: Vec<_> = self.producers.keys().collect();
        producers.sort();
        f.debug_struct("GeneratorExecutor")
            .field("settings", &self.settings)
            .field("producers", &producers)
            .finish_non_exhaustive()
    }
}

impl Default for GeneratorExecutor {
    fn default() -> Self {
        Self::new(ExecutorSettings::default())
    }
}

impl GeneratorExecutor {
    /// Executor with the built-in producers and a fresh cache.
    #[must_use]
    pub fn new(settings: ExecutorSettings) -> Self {
        let mut executor = Self {
            settings,
            producers: HashMap::new(),
            cache: Arc::new(GeneratorCache::new()),
        };
        executor.register("env-vars", Arc::new(builtin::EnvVars));
        executor.register("ports", Arc::new(builtin::Ports));
        executor.register("npm-scripts", Arc::new(builtin::PackageJson::Scripts));
        executor.register("npm-dependencies", Arc::new(builtin::PackageJson::Dependencies));
        executor
    }

    /// Share an existing cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<GeneratorCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Register (or replace) a producer.
    pub fn register(&mut self, id: impl Into<String>, producer: Arc<dyn Producer>) {
        self.producers.insert(id.into(), producer);
    }

    /// The cache backing this executor.
    #[must_use]
    pub const fn cache(&self) -> &Arc<GeneratorCache> {
        &self.cache
    }

    /// Produce suggestions for `generator` in `ctx`. Never fails.
    #[instrument(level = "debug", skip_all, fields(generator = ?generator.kind))]
    pub async fn run(&self, generator: &Generator, ctx: &CompletionContext) -> Vec<Suggestion> {
        let rendered = match &generator.kind {
            GeneratorKind::Script(command) => Some(render_command(command, ctx)),
            GeneratorKind::Custom(_) => None,
        };

        if !generator.cache.enabled {
            return self
                .execute(generator, rendered.as_ref(), ctx)
                .await
                .unwrap_or_else(|e| {
                    log_failure(&e);
                    Vec::new()
                });
        }

        let identity = match (&generator.kind, &rendered) {
            (_, Some(ScriptCommand::Shell(script))) => format!("sh:{script}"),
            (_, Some(ScriptCommand::Argv(argv))) => format!("argv:{}", argv.join("\u{1f}")),
            (GeneratorKind::Custom(id), None) => format!("custom:{id}"),
            (GeneratorKind::Script(_), None) => return Vec::new(),
        };
        let scope = self.scope(generator.cache.strategy, ctx).await;
        let ttl = generator
            .cache
            .ttl_ms
            .map_or(self.settings.default_ttl, Duration::from_millis);

        let cached = self
            .cache
            .get_or_compute(CacheKey::new(identity, scope), ttl, || async {
                if let Some(ms) = generator.debounce_ms {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                }
                self.execute(generator, rendered.as_ref(), ctx).await
            })
            .await;
        cached.as_ref().clone()
    }

    async fn scope(&self, strategy: CacheStrategy, ctx: &CompletionContext) -> String {
        match strategy {
            CacheStrategy::Ttl => String::new(),
            CacheStrategy::DirectoryChange => ctx.cwd.display().to_string(),
            CacheStrategy::GitStatusChange => match git::fingerprint(&ctx.cwd, &ctx.git).await {
                Some(fingerprint) => fingerprint,
                None => format!("nogit:{}", ctx.cwd.display()),
            },
        }
    }

    async fn execute(
        &self,
        generator: &Generator,
        rendered: Option<&ScriptCommand>,
        ctx: &CompletionContext,
    ) -> Result<Vec<Suggestion>> {
        match (&generator.kind, rendered) {
            (GeneratorKind::Script(_), Some(command)) => {
                let timeout = generator
                    .timeout_ms
                    .map_or(self.settings.default_timeout, Duration::from_millis);
                let output = self.run_command(command, ctx, timeout).await?;
                Ok(postprocess::apply(&generator.post_process, &output))
            },
            (GeneratorKind::Custom(id), _) => {
                let producer = Arc::clone(
                    self.producers
                        .get(id)
                        .ok_or_else(|| Error::NotFound(format!("producer '{id}'")))?,
                );
                // A panicking producer must only cost its own slot
                let ctx = ctx.clone();
                tokio::spawn(async move { producer.produce(&ctx).await })
                    .await
                    .map_err(|e| Error::Generator(format!("producer '{id}' failed: {e}")))?
            },
            (GeneratorKind::Script(_), None) => Ok(Vec::new()),
        }
    }

    /// Run an already-rendered command and return its stdout.
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] when `timeout` elapses (the child is killed), and
    /// [`Error::Generator`] when it cannot start or exits non-zero.
    pub async fn run_command(
        &self,
        command: &ScriptCommand,
        ctx: &CompletionContext,
        timeout: Duration,
    ) -> Result<String> {
        let mut child = match command {
            ScriptCommand::Shell(script) => {
                let mut c = Command::new(&self.settings.shell);
                c.arg("-c").arg(script);
                c
            },
            ScriptCommand::Argv(argv) => {
                let (program, args) = argv
                    .split_first()
                    .ok_or_else(|| Error::Generator("empty argv".into()))?;
                let mut c = Command::new(program);
                c.args(args);
                c
            },
        };

        if ctx.cwd.is_dir() {
            child.current_dir(&ctx.cwd);
        }
        child
            .envs(&ctx.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(timeout, child.output())
            .await
            .map_err(|_| {
                warn!(?command, ?timeout, "generator timed out");
                Error::Timeout(format!("generator exceeded {}ms", timeout.as_millis()))
            })?
            .map_err(|e| Error::Generator(format!("failed to start: {e}")))?;

        if !output.status.success() {
            return Err(Error::Generator(format!("exited with {}", output.status)));
        }

        let stdout = &output.stdout[..output.stdout.len().min(MAX_OUTPUT_BYTES)];
        Ok(String::from_utf8_lossy(stdout).into_owned())
    }
}

/// Timeouts and failing commands are routine; anything else hints at a
/// broken spec or producer.
fn log_failure(error: &Error) {
    if error.is_recoverable() {
        debug!(category = error.category(), error = %error, "generator produced nothing");
    } else {
        warn!(category = error.category(), error = %error, "generator produced nothing");
    }
}

/// Substitute `{cwd}`, `{token}`, `{tokens}` and `{N}` in a command.
///
/// Shell scripts get single-quoted values; argv entries are substituted
/// verbatim. Any other braces are left alone, so `{{.Names}}` survives.
#[must_use]
pub fn render_command(command: &ScriptCommand, ctx: &CompletionContext) -> ScriptCommand {
    match command {
        ScriptCommand::Shell(script) => ScriptCommand::Shell(render(script, ctx, true)),
        ScriptCommand::Argv(argv) => {
            ScriptCommand::Argv(argv.iter().map(|a| render(a, ctx, false)).collect())
        },
    }
}

fn render(template: &str, ctx: &CompletionContext, quote: bool) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}');
        let value = close.and_then(|close| placeholder(&after[..close], ctx));

        match (close, value) {
            (Some(close), Some(value)) => {
                if quote {
                    out.push_str(&shell_quote(&value));
                } else {
                    out.push_str(&value);
                }
                rest = &after[close + 1..];
            },
            _ => {
                out.push('{');
                rest = after;
            },
        }
    }
    out.push_str(rest);
    out
}

fn placeholder(name: &str, ctx: &CompletionContext) -> Option<String> {
    match name {
        "cwd" => Some(ctx.cwd.display().to_string()),
        "token" => Some(ctx.current_token().to_string()),
        "tokens" => Some(ctx.tokens.join(" ")),
        _ if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) => {
            let index: usize = name.parse().ok()?;
            Some(ctx.tokens.get(index).cloned().unwrap_or_default())
        },
        _ => None,
    }
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::spec::{CachePolicy, PostProcess};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Producer for Counting {
        async fn produce(&self, _ctx: &CompletionContext) -> Result<Vec<Suggestion>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Suggestion::new(
                format!("call-{n}"),
                crate::types::SuggestionKind::Custom,
            )])
        }
    }

    fn executor_with_counter() -> (GeneratorExecutor, Arc<Counting>) {
        let counter = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let mut executor = GeneratorExecutor::default();
        executor.register("count", Arc::clone(&counter) as Arc<dyn Producer>);
        (executor, counter)
    }

    fn ctx(line: &str) -> CompletionContext {
        CompletionContext::at_end(line, std::env::temp_dir())
    }

    #[tokio::test]
    async fn test_producer_runs_once_within_ttl() {
        let (executor, counter) = executor_with_counter();
        let generator = Generator::custom("count")
            .with_cache(CachePolicy::new(CacheStrategy::Ttl, Some(60_000)));

        let first = executor.run(&generator, &ctx("x ")).await;
        let second = executor.run(&generator, &ctx("x y")).await;

        assert_eq!(first, second);
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_producer_runs_again_after_ttl() {
        let (executor, counter) = executor_with_counter();
        let generator = Generator::custom("count")
            .with_cache(CachePolicy::new(CacheStrategy::Ttl, Some(30)));

        executor.run(&generator, &ctx("x ")).await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        let again = executor.run(&generator, &ctx("x ")).await;

        assert_eq!(counter.calls.load(Ordering::SeqCst), 2);
        assert_eq!(again[0].name, "call-1");
    }

    #[tokio::test]
    async fn test_disabled_cache_always_runs() {
        let (executor, counter) = executor_with_counter();
        let generator = Generator::custom("count").with_cache(CachePolicy::DISABLED);

        executor.run(&generator, &ctx("x ")).await;
        executor.run(&generator, &ctx("x ")).await;

        assert_eq!(counter.calls.load(Ordering::SeqCst), 2);
        assert!(executor.cache().is_empty().await);
    }

    #[tokio::test]
    async fn test_directory_change_scopes_by_cwd() {
        let (executor, counter) = executor_with_counter();
        let generator = Generator::custom("count")
            .with_cache(CachePolicy::new(CacheStrategy::DirectoryChange, None));
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();

        executor.run(&generator, &CompletionContext::at_end("x ", a.path())).await;
        executor.run(&generator, &CompletionContext::at_end("x ", a.path())).await;
        executor.run(&generator, &CompletionContext::at_end("x ", b.path())).await;

        assert_eq!(counter.calls.load(Ordering::SeqCst), 2);
    }

    struct Panicking;

    #[async_trait]
    impl Producer for Panicking {
        async fn produce(&self, _ctx: &CompletionContext) -> Result<Vec<Suggestion>> {
            panic!("producer bug");
        }
    }

    #[tokio::test]
    async fn test_panicking_producer_is_empty() {
        let mut executor = GeneratorExecutor::default();
        executor.register("panics", Arc::new(Panicking));
        let cached = Generator::custom("panics");
        let uncached = Generator::custom("panics").with_cache(CachePolicy::DISABLED);

        assert!(executor.run(&cached, &ctx("x ")).await.is_empty());
        assert!(executor.run(&uncached, &ctx("x ")).await.is_empty());
        assert!(executor.cache().is_empty().await);
    }

    #[tokio::test]
    async fn test_git_status_change_reruns_after_repo_changes() {
        let repo = TempDir::new().unwrap();
        let git = repo.path().join(".git");
        std::fs::create_dir_all(git.join("refs/heads")).unwrap();
        std::fs::create_dir_all(git.join("objects")).unwrap();
        std::fs::write(git.join("HEAD"), "ref: refs/heads/main\n").unwrap();

        let (executor, counter) = executor_with_counter();
        let generator = Generator::custom("count")
            .with_cache(CachePolicy::new(CacheStrategy::GitStatusChange, Some(60_000)));
        let request = || CompletionContext::at_end("git checkout ", repo.path()).detect_git();

        executor.run(&generator, &request()).await;
        executor.run(&generator, &request()).await;
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);

        std::fs::write(git.join("HEAD"), "ref: refs/heads/feature\n").unwrap();
        let after = executor.run(&generator, &request()).await;
        assert_eq!(counter.calls.load(Ordering::SeqCst), 2);
        assert_eq!(after[0].name, "call-1");
    }

    #[tokio::test]
    async fn test_unknown_producer_is_empty() {
        let executor = GeneratorExecutor::default();
        assert!(executor.run(&Generator::custom("nope"), &ctx("x ")).await.is_empty());
    }

    #[tokio::test]
    async fn test_script_lines() {
        let executor = GeneratorExecutor::default();
        let generator = Generator::script("printf 'alpha\\nbeta\\n\\n'");
        let out = executor.run(&generator, &ctx("x ")).await;
        let names: Vec<_> = out.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
    }

    #[tokio::test]
    async fn test_script_runs_in_cwd() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let executor = GeneratorExecutor::default();
        let generator = Generator::script("ls").with_cache(CachePolicy::DISABLED);
        let out = executor
            .run(&generator, &CompletionContext::at_end("x ", dir.path()))
            .await;
        assert!(out.iter().any(|s| s.name == "marker.txt"));
    }

    #[tokio::test]
    async fn test_script_non_zero_exit_is_empty() {
        let executor = GeneratorExecutor::default();
        let generator = Generator::script("echo partial; exit 3");
        assert!(executor.run(&generator, &ctx("x ")).await.is_empty());
    }

    #[tokio::test]
    async fn test_script_timeout_is_empty() {
        let executor = GeneratorExecutor::default();
        let generator = Generator::script("sleep 5; echo late").with_timeout_ms(100);
        let started = std::time::Instant::now();
        assert!(executor.run(&generator, &ctx("x ")).await.is_empty());
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_argv_script_with_split() {
        let executor = GeneratorExecutor::default();
        let generator = Generator {
            kind: GeneratorKind::Script(ScriptCommand::Argv(vec![
                "printf".into(),
                "a:first\\nb:second\\n".into(),
            ])),
            ..Generator::script("")
        }
        .with_post_process(PostProcess::Split {
            delimiter: ":".into(),
            name_field: 0,
            description_field: Some(1),
            skip_lines: 0,
        });
        let out = executor.run(&generator, &ctx("x ")).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].description.as_deref(), Some("second"));
    }

    #[test]
    fn test_render_placeholders() {
        let ctx = CompletionContext::at_end("git checkout fe", "/repo");
        let rendered = render_command(
            &ScriptCommand::Shell("git branch --list {token}* # {0} in {cwd}".into()),
            &ctx,
        );
        assert_eq!(
            rendered,
            ScriptCommand::Shell("git branch --list 'fe'* # 'git' in '/repo'".into())
        );
    }

    #[test]
    fn test_render_leaves_templates_alone() {
        let ctx = CompletionContext::at_end("docker exec ", "/");
        let rendered = render_command(
            &ScriptCommand::Shell("docker ps --format '{{.Names}}' {unknown}".into()),
            &ctx,
        );
        assert_eq!(
            rendered,
            ScriptCommand::Shell("docker ps --format '{{.Names}}' {unknown}".into())
        );
    }

    #[test]
    fn test_render_quotes_single_quotes() {
        let ctx = CompletionContext::at_end("echo \"it's", "/");
        let rendered = render_command(&ScriptCommand::Shell("echo {token}".into()), &ctx);
        assert_eq!(rendered, ScriptCommand::Shell(r"echo 'it'\''s'".into()));
    }

    #[test]
    fn test_render_argv_is_verbatim() {
        let ctx = CompletionContext::at_end("kubectl get pods -n ", "/");
        let rendered = render_command(
            &ScriptCommand::Argv(vec!["kubectl".into(), "{1}".into(), "{9}".into()]),
            &ctx,
        );
        assert_eq!(
            rendered,
            ScriptCommand::Argv(vec!["kubectl".into(), "get".into(), String::new()])
        );
    }
}
