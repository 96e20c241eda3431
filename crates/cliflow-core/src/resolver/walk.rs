//! Walking the already-typed tokens down the spec tree.

use super::Resolver;
use super::node::{MAX_LOAD_DEPTH, Node, load_spec_of};
use crate::spec::{Argument, CommandSpec, LoadSpec, OptionSpec};
use crate::types::CompletionContext;
use futures::future::join_all;
use std::borrow::Cow;
use tracing::debug;

/// An option that has been typed and still expects values.
#[derive(Debug, Clone)]
pub struct PendingOption {
    pub option: OptionSpec,
    /// Values supplied so far
    pub consumed: usize,
}

impl PendingOption {
    /// The slot the next value fills, if any.
    pub fn current_arg(&self) -> Option<&Argument> {
        let args = &self.option.args;
        args.get(self.consumed)
            .or_else(|| args.last().filter(|last| last.is_variadic))
    }

    /// Whether the option is satisfied without another value.
    pub fn may_end(&self) -> bool {
        self.consumed >= self.option.args.len()
            || self.current_arg().is_some_and(|arg| arg.is_optional)
    }
}

/// Where the walk stopped: everything needed to build candidates for the
/// final token.
#[derive(Debug)]
pub struct WalkState<'a> {
    pub node: Node<'a>,
    /// Persistent options of every ancestor on the path
    pub inherited: Vec<OptionSpec>,
    /// Options typed at the active node
    pub used: Vec<OptionSpec>,
    /// Next positional slot of the active node
    pub arg_index: usize,
    /// Values given to the current slot when it is variadic
    pub variadic_filled: usize,
    /// A positional value was given at the active node
    pub positional_seen: bool,
    /// `--` was typed
    pub terminated: bool,
    pub pending: Option<PendingOption>,
}

impl<'a> WalkState<'a> {
    fn new(node: Node<'a>) -> Self {
        Self {
            node,
            inherited: Vec::new(),
            used: Vec::new(),
            arg_index: 0,
            variadic_filled: 0,
            positional_seen: false,
            terminated: false,
            pending: None,
        }
    }

    /// Option spelled `token` among the active node's own options and the
    /// inherited persistent ones.
    pub fn find_option(&self, token: &str, case_sensitive: bool) -> Option<&OptionSpec> {
        self.node
            .options()
            .chain(self.inherited.iter())
            .find(|option| option.matches(token, case_sensitive))
    }

    /// Own options first, then inherited ones not shadowed by an own option.
    pub fn visible_options(&self) -> Vec<&OptionSpec> {
        let own: Vec<&OptionSpec> = self.node.options().collect();
        let inherited = self
            .inherited
            .iter()
            .filter(|option| !own.iter().any(|o| o.same_as(option)));
        own.iter().copied().chain(inherited).collect()
    }

    /// Every spelling of every used option.
    pub fn used_names(&self) -> Vec<String> {
        self.used
            .iter()
            .flat_map(|option| option.name.iter().cloned())
            .collect()
    }

    fn in_variadic_run(&self) -> bool {
        self.variadic_filled > 0
            && self
                .node
                .args()
                .get(self.arg_index)
                .is_some_and(|arg| arg.is_variadic)
    }

    /// Make `node` active. Persistent options of the old node are kept
    /// when `inherit` is set; otherwise the new node starts clean.
    fn enter(&mut self, node: Node<'a>, inherit: bool) {
        if inherit {
            let persistent: Vec<OptionSpec> = self
                .node
                .options()
                .filter(|option| option.is_persistent)
                .cloned()
                .collect();
            for option in persistent {
                self.inherited.retain(|o| !o.same_as(&option));
                self.inherited.push(option);
            }
        } else {
            self.inherited.clear();
        }
        self.node = node;
        self.used.clear();
        self.arg_index = 0;
        self.variadic_filled = 0;
        self.positional_seen = false;
        self.pending = None;
    }

    fn use_option(&mut self, option: OptionSpec, values: usize) {
        let pending = PendingOption {
            option: option.clone(),
            consumed: values,
        };
        self.used.push(option);
        if pending.current_arg().is_some() {
            self.pending = Some(pending);
        }
    }
}

/// Whether a typed token looks like a flag. A lone `-` is a value.
pub fn is_flag(token: &str) -> bool {
    token.starts_with('-') && token.len() > 1
}

impl Resolver {
    /// Walk every complete token after the root command.
    pub(super) async fn walk<'a>(
        &'a self,
        root: &'a CommandSpec,
        ctx: &CompletionContext,
    ) -> WalkState<'a> {
        let node = self.enter_node(Cow::Borrowed(root), ctx).await;
        let mut state = WalkState::new(node);

        for token in ctx.previous_tokens().iter().skip(1) {
            if let Some(pending) = state.pending.as_mut() {
                let breaks = !state.terminated && is_flag(token) && pending.may_end();
                if !breaks {
                    pending.consumed += 1;
                    if pending.current_arg().is_none() {
                        state.pending = None;
                    }
                    continue;
                }
                state.pending = None;
            }

            if !state.terminated && token == "--" {
                state.terminated = true;
                continue;
            }

            if !state.terminated && !state.positional_seen {
                if let Some(sub) = state.node.find_subcommand(token) {
                    debug!(from = state.node.name(), to = sub.primary_name(), "descend");
                    let node = self.enter_node(sub, ctx).await;
                    state.enter(node, true);
                    continue;
                }
            }

            if !state.terminated && is_flag(token) {
                let variadic_holds =
                    state.in_variadic_run() && !state.node.options_can_break_variadic_arg();
                if !variadic_holds {
                    if state.in_variadic_run() && state.arg_index + 1 < state.node.args().len() {
                        state.arg_index += 1;
                        state.variadic_filled = 0;
                    }
                    self.apply_flag(&mut state, token);
                    continue;
                }
            }

            self.apply_positional(&mut state, token, ctx).await;
        }

        state
    }

    fn apply_flag(&self, state: &mut WalkState<'_>, token: &str) {
        let case_sensitive = self.matching.case_sensitive_options;

        if self.matching.allow_equals_separator {
            if let Some((flag, _value)) = token.split_once('=') {
                if let Some(option) = state.find_option(flag, case_sensitive).cloned() {
                    state.use_option(option, 1);
                    return;
                }
            }
        }

        if let Some(option) = state.find_option(token, case_sensitive).cloned() {
            state.use_option(option, 0);
            return;
        }

        // -abc as -a -b -c
        if !token.starts_with("--") && token.chars().count() > 2 {
            let chained: Option<Vec<OptionSpec>> = token
                .chars()
                .skip(1)
                .map(|c| state.find_option(&format!("-{c}"), case_sensitive).cloned())
                .collect();
            if let Some((last, rest)) = chained.as_deref().and_then(<[OptionSpec]>::split_last) {
                if rest.iter().all(|o| !o.takes_args()) {
                    state.used.extend(rest.iter().cloned());
                    state.use_option(last.clone(), 0);
                    return;
                }
            }
        }

        debug!(token, node = state.node.name(), "unknown option skipped");
    }

    async fn apply_positional<'a>(
        &'a self,
        state: &mut WalkState<'a>,
        token: &str,
        ctx: &CompletionContext,
    ) {
        state.positional_seen = true;
        let Some(arg) = state.node.args().get(state.arg_index).cloned() else {
            debug!(token, node = state.node.name(), "extra positional value");
            return;
        };

        if arg.is_command {
            if let Some(spec) = self.registry.get(token) {
                debug!(command = token, "descend into command argument");
                let node = self.enter_node(Cow::Borrowed(spec.as_ref()), ctx).await;
                state.enter(node, false);
                return;
            }
        }

        if let Some(load) = arg.load_spec {
            if let Some(spec) = self.load(Cow::Owned(load)) {
                debug!(to = spec.primary_name(), "argument loads spec");
                let node = self.enter_node(spec, ctx).await;
                state.enter(node, true);
                return;
            }
            debug!(token, "argument loadSpec unresolved");
        }

        if arg.is_variadic {
            state.variadic_filled += 1;
        } else {
            state.arg_index += 1;
            state.variadic_filled = 0;
        }
    }

    /// Build the node for `spec`, attaching its `loadSpec` chain and any
    /// generated subcommands.
    pub(super) async fn enter_node<'a>(
        &'a self,
        spec: Cow<'a, CommandSpec>,
        ctx: &CompletionContext,
    ) -> Node<'a> {
        let mut queue: Vec<Cow<'a, LoadSpec>> = load_spec_of(&spec).into_iter().collect();
        let mut node = Node::new(spec);

        let mut depth = 0;
        while let Some(load) = queue.pop() {
            if depth == MAX_LOAD_DEPTH {
                debug!(node = node.name(), "loadSpec chain too deep");
                break;
            }
            depth += 1;
            match self.load(load) {
                Some(layer) => {
                    queue.extend(load_spec_of(&layer));
                    node.push_layer(layer);
                },
                None => debug!(node = node.name(), "loadSpec unresolved"),
            }
        }

        let generators: Vec<_> = node.generate_spec().cloned().collect();
        if !generators.is_empty() {
            let outputs = join_all(generators.iter().map(|g| self.executor.run(g, ctx))).await;
            let subcommands = outputs
                .into_iter()
                .flatten()
                .map(|suggestion| CommandSpec {
                    name: vec![suggestion.name],
                    description: suggestion.description,
                    priority: Some(suggestion.priority),
                    ..CommandSpec::default()
                })
                .collect();
            node.push_layer(Cow::Owned(CommandSpec {
                subcommands,
                ..CommandSpec::default()
            }));
        }

        node
    }

    fn load<'a>(&'a self, load: Cow<'a, LoadSpec>) -> Option<Cow<'a, CommandSpec>> {
        match load {
            Cow::Borrowed(LoadSpec::Named(name)) => {
                self.registry.get(name).map(|spec| Cow::Borrowed(spec.as_ref()))
            },
            Cow::Borrowed(LoadSpec::Inline(spec)) => Some(Cow::Borrowed(spec.as_ref())),
            Cow::Owned(LoadSpec::Named(name)) => {
                self.registry.get(&name).map(|spec| Cow::Borrowed(spec.as_ref()))
            },
            Cow::Owned(LoadSpec::Inline(spec)) => Some(Cow::Owned(*spec)),
        }
    }
}
