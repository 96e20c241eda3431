//! Candidate groups for the final token.

use super::Resolver;
use super::walk::WalkState;
use crate::fuzzy::rank;
use crate::spec::{Argument, OPTION_PRIORITY, OptionSpec, Template};
use crate::templates::list_paths;
use crate::types::{CompletionContext, Suggestion, SuggestionKind};
use futures::future::join_all;
use std::cmp::Reverse;

/// How many history continuations one argument slot may offer.
const HISTORY_LIMIT: usize = 20;
/// History continuations offered while the first subcommand is typed.
const SUBCOMMAND_HISTORY_LIMIT: usize = 2;

impl Resolver {
    /// Ranked suggestions for the final token once the walk has stopped.
    pub(super) async fn candidates(
        &self,
        state: &WalkState<'_>,
        ctx: &CompletionContext,
    ) -> Vec<Suggestion> {
        let current = ctx.current_token();

        if let Some(pending) = &state.pending {
            if let Some(arg) = pending.current_arg() {
                let mut out = self.argument_values(arg, current, ctx).await;
                if pending.may_end() {
                    out.extend(self.groups(state, current, ctx).await);
                }
                return out;
            }
        }

        if !state.terminated && current.starts_with('-') {
            if self.matching.allow_equals_separator {
                if let Some((flag, partial)) = current.split_once('=') {
                    return self.option_values(state, flag, partial, ctx).await;
                }
            }
            return self.option_group(state, current);
        }

        self.groups(state, current, ctx).await
    }

    /// Arguments, then options, then subcommands.
    async fn groups(
        &self,
        state: &WalkState<'_>,
        current: &str,
        ctx: &CompletionContext,
    ) -> Vec<Suggestion> {
        let mut out = self.positional_group(state, current, ctx).await;
        if !state.terminated {
            out.extend(self.option_group(state, current));
            if !state.positional_seen {
                out.extend(self.subcommand_group(state, current, ctx));
            }
        }
        out
    }

    async fn positional_group(
        &self,
        state: &WalkState<'_>,
        current: &str,
        ctx: &CompletionContext,
    ) -> Vec<Suggestion> {
        let mut slots: Vec<&Argument> = Vec::new();
        for (index, arg) in state.node.args().iter().enumerate().skip(state.arg_index) {
            slots.push(arg);
            let filled_variadic =
                index == state.arg_index && arg.is_variadic && state.variadic_filled > 0;
            if !arg.is_optional && !filled_variadic {
                break;
            }
        }

        join_all(slots.into_iter().map(|arg| self.argument_values(arg, current, ctx)))
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    /// Values for one slot: static suggestions and generator output ranked
    /// against `query`, then template entries.
    async fn argument_values(
        &self,
        arg: &Argument,
        query: &str,
        ctx: &CompletionContext,
    ) -> Vec<Suggestion> {
        let mut values: Vec<Suggestion> = arg
            .suggestions
            .iter()
            .map(|s| s.to_suggestion(SuggestionKind::Argument))
            .collect();
        let generated = join_all(arg.generators.iter().map(|g| self.executor.run(g, ctx))).await;
        values.extend(generated.into_iter().flatten());
        self.boost_from_history(&mut values, ctx);
        let mut out = ranked(values, query);

        for template in &arg.template {
            match template {
                Template::Filepaths | Template::Folders => {
                    let files = *template == Template::Filepaths;
                    let listing = list_paths(query, &ctx.cwd, files, true);
                    out.extend(ranked(listing.suggestions, &listing.fragment));
                },
                Template::History => {
                    let typed = ctx.tokens.join(" ");
                    out.extend(ranked(self.history.suggestions(&typed, HISTORY_LIMIT), query));
                },
                Template::Unknown => {},
            }
        }
        out
    }

    /// Values of `--flag=partial`, inserted with the flag attached.
    async fn option_values(
        &self,
        state: &WalkState<'_>,
        flag: &str,
        partial: &str,
        ctx: &CompletionContext,
    ) -> Vec<Suggestion> {
        let Some(arg) = state
            .find_option(flag, self.matching.case_sensitive_options)
            .and_then(|option| option.args.first())
        else {
            return Vec::new();
        };
        self.argument_values(arg, partial, ctx)
            .await
            .into_iter()
            .map(|s| {
                let insert = format!("{flag}={}", s.insertion());
                s.with_insert_value(insert)
            })
            .collect()
    }

    fn option_group(&self, state: &WalkState<'_>, current: &str) -> Vec<Suggestion> {
        let used_names = state.used_names();
        let excluded_by_used: Vec<String> = state
            .used
            .iter()
            .flat_map(|option| option.exclusive_on.iter().cloned())
            .collect();

        let suggestions = state
            .visible_options()
            .into_iter()
            .filter(|option| !option.hidden)
            .filter(|option| {
                option.is_repeatable || !state.used.iter().any(|used| used.same_as(option))
            })
            .filter(|option| !option.named_in(&excluded_by_used))
            .filter(|option| !option.exclusive_on.iter().any(|n| used_names.contains(n)))
            .filter(|option| option.depends_on.iter().all(|n| used_names.contains(n)))
            .flat_map(option_suggestions)
            .collect();
        ranked(suggestions, current)
    }

    fn subcommand_group(
        &self,
        state: &WalkState<'_>,
        current: &str,
        ctx: &CompletionContext,
    ) -> Vec<Suggestion> {
        let mut suggestions: Vec<Suggestion> = state
            .node
            .subcommands()
            .filter(|sub| !sub.hidden)
            .map(crate::spec::CommandSpec::to_suggestion)
            .chain(
                state
                    .node
                    .additional_suggestions()
                    .map(|s| s.to_suggestion(SuggestionKind::Subcommand)),
            )
            .collect();
        self.boost_from_history(&mut suggestions, ctx);

        let offers_history = ctx.tokens.len() == 2 && !suggestions.is_empty();
        if offers_history && !current.is_empty() && !current.contains('/') {
            let typed = format!("{} {current}", ctx.tokens[0]);
            merge_history(
                &mut suggestions,
                self.history.suggestions(&typed, SUBCOMMAND_HISTORY_LIMIT),
            );
        }
        ranked(suggestions, current)
    }

    /// Raise each priority by how often `<complete tokens> <name>` was run.
    pub(super) fn boost_from_history(&self, suggestions: &mut [Suggestion], ctx: &CompletionContext) {
        let typed = ctx.previous_tokens().join(" ");
        for suggestion in suggestions {
            let prefix = if typed.is_empty() {
                suggestion.name.clone()
            } else {
                format!("{typed} {}", suggestion.name)
            };
            suggestion.priority += self.history.frequency_boost(&prefix);
        }
    }
}

/// Add history entries whose name no spec suggestion already uses.
pub(super) fn merge_history(suggestions: &mut Vec<Suggestion>, history: Vec<Suggestion>) {
    for entry in history {
        if !suggestions.iter().any(|s| s.name == entry.name) {
            suggestions.push(entry);
        }
    }
}

/// One suggestion per spelling.
fn option_suggestions(option: &OptionSpec) -> impl Iterator<Item = Suggestion> + '_ {
    option.name.iter().map(|name| {
        Suggestion::new(name.clone(), SuggestionKind::Option)
            .with_optional_description(option.description.as_deref())
            .with_priority(option.priority.unwrap_or(OPTION_PRIORITY))
    })
}

/// Priority order (stable, so ties keep declaration order), then fuzzy rank.
pub(super) fn ranked(mut suggestions: Vec<Suggestion>, query: &str) -> Vec<Suggestion> {
    suggestions.sort_by_key(|s| Reverse(s.priority));
    rank(suggestions, query, |s| s.name.as_str())
}
