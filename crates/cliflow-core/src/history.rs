//! Shell history index.
//!
//! It backs the `history` argument template, offers whole commands while the
//! command name or first subcommand is typed, and lifts the priority of spec
//! suggestions the user types often.
//!
//! The history file is parsed into command prefixes of one to three words
//! (`git`, `git commit`, `git commit --amend` is cut at the flag). Each prefix
//! records how often and how recently it was used. The file is re-parsed only
//! when its modification time changes.
//!
//! Both zsh extended history (`: 1700000000:0;git status`) and plain
//! one-command-per-line files are understood.

use crate::types::{Suggestion, SuggestionKind};
use crate::Result;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};
use std::time::SystemTime;
use tracing::{debug, info};

/// Base priority of history suggestions; usage count is added on top.
pub const HISTORY_PRIORITY: i32 = 150;
/// Upper bound of [`HistoryIndex::frequency_boost`].
pub const MAX_FREQUENCY_BOOST: i32 = 50;

/// Usage of one command prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// The prefix, words joined by single spaces
    pub command: String,
    /// Number of history lines starting with it
    pub count: u32,
    /// Index of the most recent line that used it
    pub last_used: usize,
}

/// Parsed prefixes plus the number of commands seen.
#[derive(Debug, Clone, Default)]
pub struct ParsedHistory {
    /// Prefix → usage
    pub entries: HashMap<String, HistoryEntry>,
    /// Commands parsed
    pub total: usize,
}

/// Counters reported by `cliflow daemon status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryStats {
    /// Commands parsed
    pub commands: usize,
    /// Distinct prefixes
    pub prefixes: usize,
}

#[derive(Debug, Default)]
struct IndexState {
    mtime: Option<SystemTime>,
    parsed: ParsedHistory,
}

/// Frequency index over a shell history file.
#[derive(Debug, Default)]
pub struct HistoryIndex {
    path: Option<PathBuf>,
    state: RwLock<IndexState>,
}

impl HistoryIndex {
    /// Index `path`; nothing is read until [`Self::refresh`].
    #[must_use]
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            state: RwLock::default(),
        }
    }

    /// An index that never suggests anything.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Re-parse the history file if it changed. Returns whether it did.
    ///
    /// A missing file leaves the index empty and is not an error.
    pub fn refresh(&self) -> Result<bool> {
        let Some(path) = &self.path else {
            return Ok(false);
        };
        let Ok(metadata) = std::fs::metadata(path) else {
            debug!(path = %path.display(), "no history file");
            return Ok(false);
        };
        let mtime = metadata.modified().ok();

        {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            if mtime.is_some() && state.mtime == mtime {
                return Ok(false);
            }
        }

        let bytes = std::fs::read(path)?;
        let parsed = parse_history(&String::from_utf8_lossy(&bytes));
        info!(
            commands = parsed.total,
            prefixes = parsed.entries.len(),
            "history indexed"
        );

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.mtime = mtime;
        state.parsed = parsed;
        Ok(true)
    }

    /// Suggestions continuing `input` (the words typed so far, the last one
    /// possibly partial), best first.
    ///
    /// Each suggestion names only the words after those already complete:
    /// typing `git c` offers `commit`, `checkout`...
    #[must_use]
    pub fn suggestions(&self, input: &str, limit: usize) -> Vec<Suggestion> {
        let input = input.trim_start();
        if input.trim().is_empty() {
            return Vec::new();
        }
        let typed: Vec<&str> = input.split_whitespace().collect();
        let ends_with_space = input.ends_with(char::is_whitespace);
        let complete_words = if ends_with_space {
            typed.len()
        } else {
            typed.len().saturating_sub(1)
        };
        let needle = input.to_lowercase();

        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let total = state.parsed.total.max(1);

        let mut matches: Vec<(&HistoryEntry, f64)> = state
            .parsed
            .entries
            .values()
            .filter(|e| e.command.to_lowercase().starts_with(&needle))
            .filter(|e| e.command.split(' ').count() > complete_words)
            .map(|e| {
                let frequency = f64::from(e.count.min(100)) / 100.0;
                #[allow(clippy::cast_precision_loss)]
                let recency = e.last_used as f64 / total as f64;
                (e, frequency.mul_add(0.7, recency * 0.3))
            })
            .collect();
        matches.sort_by(|(a, sa), (b, sb)| {
            sb.total_cmp(sa).then_with(|| a.command.cmp(&b.command))
        });

        matches
            .into_iter()
            .take(limit)
            .filter_map(|(entry, _)| {
                let remaining: Vec<&str> = entry.command.split(' ').skip(complete_words).collect();
                let name = remaining.join(" ");
                if name.is_empty() {
                    return None;
                }
                #[allow(clippy::cast_possible_wrap)]
                let bonus = entry.count.min(50) as i32;
                Some(
                    Suggestion::new(name.clone(), SuggestionKind::History)
                        .with_description(format!("{} ({}x)", entry.command, entry.count))
                        .with_priority(HISTORY_PRIORITY + bonus)
                        .with_insert_value(name),
                )
            })
            .collect()
    }

    /// Priority bonus for an exact prefix: `5 * log2(count + 1)`, capped at
    /// [`MAX_FREQUENCY_BOOST`]. Zero for prefixes never used.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn frequency_boost(&self, prefix: &str) -> i32 {
        let count = {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            state.parsed.entries.get(prefix).map_or(0, |e| e.count)
        };
        if count == 0 {
            return 0;
        }
        let boost = (f64::from(count) + 1.0).log2() * 5.0;
        boost.min(f64::from(MAX_FREQUENCY_BOOST)) as i32
    }

    /// Counters for reporting.
    #[must_use]
    pub fn stats(&self) -> HistoryStats {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        HistoryStats {
            commands: state.parsed.total,
            prefixes: state.parsed.entries.len(),
        }
    }
}

/// Parse history file contents.
#[must_use]
pub fn parse_history(content: &str) -> ParsedHistory {
    let mut parsed = ParsedHistory::default();

    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let Some(command) = strip_extended_header(line) else {
            continue;
        };
        let command = command.trim();
        if command.chars().count() < 2 {
            continue;
        }

        for prefix in prefixes(command) {
            let entry = parsed
                .entries
                .entry(prefix.clone())
                .or_insert_with(|| HistoryEntry {
                    command: prefix,
                    count: 0,
                    last_used: 0,
                });
            entry.count += 1;
            entry.last_used = parsed.total;
        }
        parsed.total += 1;
    }

    parsed
}

/// `: <ts>:<duration>;<command>` → `<command>`; plain lines pass through.
fn strip_extended_header(line: &str) -> Option<&str> {
    let Some(rest) = line.strip_prefix(':') else {
        return Some(line);
    };
    let (header, command) = rest.split_once(';')?;
    let (ts, duration) = header.trim_start().split_once(':')?;
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    (numeric(ts) && numeric(duration)).then_some(command)
}

fn prefixes(command: &str) -> Vec<String> {
    let words = split_words(command);
    let mut out = Vec::with_capacity(3);
    let Some(first) = words.first() else {
        return out;
    };
    out.push(first.clone());

    let mut prefix = first.clone();
    for word in words.iter().skip(1).take(2) {
        if word.starts_with('-') {
            break;
        }
        prefix.push(' ');
        prefix.push_str(word);
        out.push(prefix.clone());
    }
    out
}

/// Whitespace split that keeps quoted sections (quotes included) together.
fn split_words(command: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in command.chars() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            },
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                current.push(c);
            },
            None if c.is_whitespace() => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            },
            None => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}
