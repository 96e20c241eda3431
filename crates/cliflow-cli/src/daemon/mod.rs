//! The long-lived completion daemon and the async client used to talk to it.
//!
//! The daemon owns a single [`Resolver`] (and with it the generator cache)
//! for its whole lifetime. Each connection carries one request line and one
//! response line; see [`cliflow_core::protocol`].

pub mod client;
pub mod server;

pub use client::{is_running, send};
pub use server::{Daemon, Reply};

use anyhow::Result;
use cliflow_core::{
    Config, ExecutorSettings, GeneratorExecutor, HistoryIndex, Resolver, SpecRegistry, Suggestion,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Build the resolver described by `config`: specs from every configured
/// directory, generator settings, the history index and matching switches.
pub fn build_resolver(config: &Config) -> Result<Resolver> {
    let dirs = config.spec_dirs()?;
    let registry = SpecRegistry::load_dirs(&dirs);
    info!(specs = registry.len(), dirs = dirs.len(), "specs loaded");

    let executor = GeneratorExecutor::new(ExecutorSettings::from(&config.generators));
    let history = if config.history.enabled {
        let file = config.history_file();
        debug!(file = ?file, "history enabled");
        HistoryIndex::new(file)
    } else {
        HistoryIndex::disabled()
    };

    Ok(Resolver::new(Arc::new(registry))
        .with_executor(executor)
        .with_history(Arc::new(history))
        .with_matching(config.matching.clone()))
}

/// Trim a resolved list to `max` entries and give every entry an icon.
pub fn finalize(mut suggestions: Vec<Suggestion>, max: usize) -> Vec<Suggestion> {
    suggestions.truncate(max);
    for suggestion in &mut suggestions {
        if suggestion.icon.is_none() {
            suggestion.icon = Some(suggestion.kind.default_icon().to_string());
        }
    }
    suggestions
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use cliflow_core::SuggestionKind;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_finalize_truncates_and_fills_icons() {
        let suggestions = vec![
            Suggestion::new("checkout", SuggestionKind::Subcommand),
            Suggestion::new("--verbose", SuggestionKind::Option).with_icon("*"),
            Suggestion::new("main", SuggestionKind::Argument),
        ];
        let out = finalize(suggestions, 2);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].icon.as_deref(), Some("⚡"));
        assert_eq!(out[1].icon.as_deref(), Some("*"));
    }

    #[test]
    fn test_build_resolver_reads_configured_dirs() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("git.json"),
            r#"{"name":"git","subcommands":[{"name":"checkout"}]}"#,
        )
        .unwrap();

        let mut config = Config::default();
        config.specs.dirs = vec![dir.path().to_path_buf()];
        config.history.enabled = false;

        let resolver = build_resolver(&config).unwrap();
        assert_eq!(resolver.registry().len(), 1);
        assert!(resolver.registry().get("git").is_some());
    }
}
