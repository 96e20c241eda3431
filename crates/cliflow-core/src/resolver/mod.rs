//! Resolution of a partial command line into ranked suggestions.
//!
//! The first token selects a root spec from the [`SpecRegistry`]. Every
//! following complete token is matched, in order, as a subcommand of the
//! active node, an option (own or inherited persistent, with its values), or
//! the next positional value. The final token is the query: candidate
//! groups for where the walk stopped (argument values, then options, then
//! subcommands) are each ranked against it and concatenated.
//!
//! Resolution never fails. Unknown roots give no suggestions, unknown flags
//! are skipped, and generators that break contribute nothing.

mod candidates;
mod node;
mod walk;

use crate::config::MatchingConfig;
use crate::generator::GeneratorExecutor;
use crate::history::HistoryIndex;
use crate::registry::SpecRegistry;
use crate::types::{CompletionContext, Suggestion};
use candidates::{merge_history, ranked};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Whole commands from history offered while the command name is typed.
const ROOT_HISTORY_LIMIT: usize = 3;

pub use node::MAX_LOAD_DEPTH;
pub use walk::is_flag;

/// Turns a [`CompletionContext`] into ordered suggestions.
#[derive(Debug, Clone)]
pub struct Resolver {
    registry: Arc<SpecRegistry>,
    executor: GeneratorExecutor,
    history: Arc<HistoryIndex>,
    matching: MatchingConfig,
}

impl Resolver {
    /// Resolver over `registry` with default executor settings and no
    /// history.
    #[must_use]
    pub fn new(registry: Arc<SpecRegistry>) -> Self {
        Self {
            registry,
            executor: GeneratorExecutor::default(),
            history: Arc::new(HistoryIndex::disabled()),
            matching: MatchingConfig::default(),
        }
    }

    /// Use `executor` (and its cache) for generators.
    #[must_use]
    pub fn with_executor(mut self, executor: GeneratorExecutor) -> Self {
        self.executor = executor;
        self
    }

    /// Use `history` for the `history` template and frequency boosts.
    #[must_use]
    pub fn with_history(mut self, history: Arc<HistoryIndex>) -> Self {
        self.history = history;
        self
    }

    /// Option matching rules.
    #[must_use]
    pub const fn with_matching(mut self, matching: MatchingConfig) -> Self {
        self.matching = matching;
        self
    }

    /// The specs this resolver walks.
    #[must_use]
    pub const fn registry(&self) -> &Arc<SpecRegistry> {
        &self.registry
    }

    /// The generator executor.
    #[must_use]
    pub const fn executor(&self) -> &GeneratorExecutor {
        &self.executor
    }

    /// The history index.
    #[must_use]
    pub const fn history(&self) -> &Arc<HistoryIndex> {
        &self.history
    }

    /// Suggestions for the token under the cursor, best first.
    #[instrument(level = "debug", skip_all, fields(line = %ctx.command_line))]
    pub async fn resolve(&self, ctx: &CompletionContext) -> Vec<Suggestion> {
        if let Err(e) = self.history.refresh() {
            debug!(error = %e, "history refresh failed");
        }

        if ctx.tokens.len() <= 1 {
            return self.root_suggestions(ctx);
        }

        let command = &ctx.tokens[0];
        let Some(root) = self.registry.get(command) else {
            debug!(command = %command, "no spec for command");
            return Vec::new();
        };

        let state = self.walk(root, ctx).await;
        let suggestions = self.candidates(&state, ctx).await;
        debug!(
            node = state.node.name(),
            count = suggestions.len(),
            "resolved"
        );
        suggestions
    }

    fn root_suggestions(&self, ctx: &CompletionContext) -> Vec<Suggestion> {
        let query = ctx.current_token();
        let mut roots: Vec<Suggestion> = self
            .registry
            .roots()
            .filter(|spec| !spec.hidden && !spec.name.is_empty())
            .map(|spec| spec.to_suggestion())
            .collect();
        self.boost_from_history(&mut roots, ctx);

        if !query.is_empty() && !query.contains('/') {
            let typed = self.history.suggestions(query, ROOT_HISTORY_LIMIT);
            merge_history(&mut roots, typed);
        }
        ranked(roots, query)
    }
}
