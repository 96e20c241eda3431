//! Suggestions and the per-request completion context.

use crate::git::GitState;
use crate::tokenize::tokenize;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Priority given to suggestions that do not carry one.
pub const DEFAULT_PRIORITY: i32 = 50;

/// Display category of a suggestion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionKind {
    /// A child command
    Subcommand,
    /// A flag
    Option,
    /// A positional value
    #[default]
    Argument,
    /// A file path
    File,
    /// A directory path
    Folder,
    /// A command line recalled from shell history
    History,
    /// Anything produced by a custom generator
    Custom,
}

impl SuggestionKind {
    /// Icon used by the terminal UI when a suggestion does not bring its own.
    #[must_use]
    pub const fn default_icon(self) -> &'static str {
        match self {
            Self::Subcommand => "⚡",
            Self::Option => "🔧",
            Self::Argument => "📝",
            Self::File => "📄",
            Self::Folder => "📁",
            Self::History => "🕘",
            Self::Custom => "✨",
        }
    }
}

/// One completion candidate.
///
/// Serialized with camelCase keys; `kind` travels as `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    /// Text shown and matched against the partial token
    pub name: String,
    /// Short help text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Display icon
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Higher sorts first within a category
    #[serde(default = "default_priority")]
    pub priority: i32,
    /// Literal text to insert instead of `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert_value: Option<String>,
    /// Display category
    #[serde(rename = "type", default)]
    pub kind: SuggestionKind,
}

const fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

impl Suggestion {
    /// Create a suggestion with the default priority.
    pub fn new(name: impl Into<String>, kind: SuggestionKind) -> Self {
        Self {
            name: name.into(),
            description: None,
            icon: None,
            priority: DEFAULT_PRIORITY,
            insert_value: None,
            kind,
        }
    }

    /// Set the description; empty strings are dropped.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description = (!description.is_empty()).then_some(description);
        self
    }

    /// Set the description from an optional value.
    #[must_use]
    pub fn with_optional_description(self, description: Option<&str>) -> Self {
        match description {
            Some(d) => self.with_description(d),
            None => self,
        }
    }

    /// Set the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the literal insertion text.
    #[must_use]
    pub fn with_insert_value(mut self, insert: impl Into<String>) -> Self {
        self.insert_value = Some(insert.into());
        self
    }

    /// Set the icon.
    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Text the shell should insert when this suggestion is accepted.
    #[must_use]
    pub fn insertion(&self) -> &str {
        self.insert_value.as_deref().unwrap_or(&self.name)
    }
}

/// Everything the resolver and generators know about one request.
#[derive(Debug, Clone, Default)]
pub struct CompletionContext {
    /// Working directory of the shell
    pub cwd: PathBuf,
    /// Full command line as typed
    pub command_line: String,
    /// Tokens of the line up to the cursor; the last one is in progress
    pub tokens: Vec<String>,
    /// Cursor offset in characters
    pub cursor: usize,
    /// Environment snapshot passed to generator scripts
    pub env: HashMap<String, String>,
    /// Active shell name (`zsh`, `bash`, ...)
    pub shell: String,
    /// Git repository state of `cwd`
    pub git: GitState,
}

impl CompletionContext {
    /// Build a context for `command_line` with the cursor at `cursor`
    /// (a character offset, clamped to the line length).
    ///
    /// Only the text before the cursor is tokenized. The environment is
    /// empty and git state is undetected; see [`Self::with_env`] and
    /// [`Self::detect_git`].
    pub fn new(command_line: impl Into<String>, cursor: usize, cwd: impl Into<PathBuf>) -> Self {
        let command_line = command_line.into();
        let char_count = command_line.chars().count();
        let cursor = cursor.min(char_count);
        let byte_end = command_line
            .char_indices()
            .nth(cursor)
            .map_or(command_line.len(), |(i, _)| i);
        let tokens = tokenize(&command_line[..byte_end]);

        Self {
            cwd: cwd.into(),
            command_line,
            tokens,
            cursor,
            env: HashMap::new(),
            shell: "zsh".to_string(),
            git: GitState::default(),
        }
    }

    /// Build a context with the cursor at the end of the line.
    pub fn at_end(command_line: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        let command_line = command_line.into();
        let cursor = command_line.chars().count();
        Self::new(command_line, cursor, cwd)
    }

    /// Attach an environment snapshot.
    #[must_use]
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Set the shell name.
    #[must_use]
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Detect whether `cwd` is inside a git repository.
    #[must_use]
    pub fn detect_git(mut self) -> Self {
        self.git = GitState::detect(&self.cwd);
        self
    }

    /// The in-progress token (possibly empty).
    #[must_use]
    pub fn current_token(&self) -> &str {
        self.tokens.last().map_or("", String::as_str)
    }

    /// Tokens that are already complete.
    #[must_use]
    pub fn previous_tokens(&self) -> &[String] {
        match self.tokens.split_last() {
            Some((_, rest)) => rest,
            None => &[],
        }
    }

    /// Whether nothing but whitespace has been typed.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.tokens.iter().all(String::is_empty)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_suggestion_wire_shape() {
        let suggestion = Suggestion::new("checkout", SuggestionKind::Subcommand)
            .with_description("Switch branches")
            .with_priority(100);

        let json = serde_json::to_value(&suggestion).unwrap();
        assert_eq!(json["name"], "checkout");
        assert_eq!(json["type"], "subcommand");
        assert_eq!(json["priority"], 100);
        assert!(json.get("insertValue").is_none());
        assert!(json.get("icon").is_none());
    }

    #[test]
    fn test_suggestion_defaults_when_deserialized() {
        let suggestion: Suggestion = serde_json::from_str(r#"{"name":"main"}"#).unwrap();
        assert_eq!(suggestion.priority, DEFAULT_PRIORITY);
        assert_eq!(suggestion.kind, SuggestionKind::Argument);
        assert_eq!(suggestion.insertion(), "main");
    }

    #[test]
    fn test_empty_description_is_dropped() {
        let suggestion = Suggestion::new("x", SuggestionKind::Argument).with_description("");
        assert!(suggestion.description.is_none());
    }

    #[test]
    fn test_context_tokenizes_up_to_cursor() {
        let ctx = CompletionContext::new("git checkout main", 6, "/tmp");
        assert_eq!(ctx.tokens, vec!["git", "ch"]);
        assert_eq!(ctx.current_token(), "ch");
        assert_eq!(ctx.previous_tokens(), ["git".to_string()]);
    }

    #[test]
    fn test_context_cursor_is_clamped() {
        let ctx = CompletionContext::new("ls ", 99, "/tmp");
        assert_eq!(ctx.cursor, 3);
        assert_eq!(ctx.tokens, vec!["ls", ""]);
    }

    #[test]
    fn test_context_cursor_counts_characters() {
        let ctx = CompletionContext::new("echo héllo wörld", 10, "/tmp");
        assert_eq!(ctx.tokens, vec!["echo", "héllo"]);
    }

    #[test]
    fn test_blank_line() {
        assert!(CompletionContext::at_end("   ", "/").is_blank());
        assert!(CompletionContext::at_end("", "/").is_blank());
        assert!(!CompletionContext::at_end("g", "/").is_blank());
    }
}
