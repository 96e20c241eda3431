//! Line-delimited JSON messages between the client and the daemon.
//!
//! Each connection carries exactly one request line and one response line.

use crate::types::{CompletionContext, Suggestion};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// What the client wants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    /// Suggestions for a command line
    #[default]
    Complete,
    /// Liveness check
    Health,
    /// Stop the daemon
    Shutdown,
    /// Report [`DaemonStats`]
    Stats,
}

/// One request line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Request type; `complete` when absent
    #[serde(default, rename = "type")]
    pub kind: RequestKind,
    /// The full command line
    #[serde(default)]
    pub command_line: String,
    /// Cursor offset in characters; end of line when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor_position: Option<usize>,
    /// Working directory of the shell
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    /// Shell name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
    /// Environment snapshot for generators
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, String>>,
}

impl Request {
    /// A completion request with the cursor at the end of `command_line`.
    pub fn complete(command_line: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            command_line: command_line.into(),
            cwd: Some(cwd.into()),
            ..Self::default()
        }
    }

    /// A request of `kind` with no payload.
    #[must_use]
    pub fn control(kind: RequestKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// Parse one request line.
    pub fn parse_line(line: &str) -> Result<Self> {
        let line = line.trim();
        if line.is_empty() {
            return Err(Error::Protocol("empty request".into()));
        }
        serde_json::from_str(line).map_err(|e| Error::Protocol(format!("invalid request: {e}")))
    }

    /// Serialize as a single line, newline included.
    pub fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Build the completion context. A missing `cwd` falls back to
    /// `default_cwd`; git state is detected from the resulting directory.
    #[must_use]
    pub fn into_context(self, default_cwd: PathBuf) -> CompletionContext {
        let cwd = self.cwd.unwrap_or(default_cwd);
        let cursor = self
            .cursor_position
            .unwrap_or_else(|| self.command_line.chars().count());
        let mut ctx = CompletionContext::new(self.command_line, cursor, cwd);
        if let Some(shell) = self.shell {
            ctx = ctx.with_shell(shell);
        }
        if let Some(env) = self.env {
            ctx = ctx.with_env(env);
        }
        ctx.detect_git()
    }
}

/// What a running daemon reports for a `stats` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonStats {
    /// When the daemon started serving
    pub started_at: DateTime<Utc>,
    /// Root specs loaded
    pub specs: usize,
    /// Generator results currently cached
    pub cache_entries: usize,
    /// Generator lookups answered from the cache
    pub cache_hits: u64,
    /// Generator lookups that ran the generator
    pub cache_misses: u64,
    /// Generator runs that failed
    pub cache_failures: u64,
    /// Commands in the indexed shell history
    pub history_commands: usize,
}

/// One response line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Whether the request was handled
    pub success: bool,
    /// Suggestions, best first; empty on error
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
    /// What went wrong
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Present only in answers to `stats`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<DaemonStats>,
}

impl Response {
    /// A successful response.
    #[must_use]
    pub const fn ok(suggestions: Vec<Suggestion>) -> Self {
        Self {
            success: true,
            suggestions,
            error: None,
            stats: None,
        }
    }

    /// A successful answer to a `stats` request.
    #[must_use]
    pub const fn stats(stats: DaemonStats) -> Self {
        Self {
            success: true,
            suggestions: Vec::new(),
            error: None,
            stats: Some(stats),
        }
    }

    /// An error response with no suggestions.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            suggestions: Vec::new(),
            error: Some(message.into()),
            stats: None,
        }
    }

    /// Parse one response line.
    pub fn parse_line(line: &str) -> Result<Self> {
        serde_json::from_str(line.trim())
            .map_err(|e| Error::Protocol(format!("invalid response: {e}")))
    }

    /// Serialize as a single line, newline included.
    pub fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}
