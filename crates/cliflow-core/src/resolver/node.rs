//! The active command node, seen through every layer attached to it.
//!
//! A node starts as one [`CommandSpec`] from the registry. `loadSpec`
//! references add further layers whose subcommands and options merge with
//! the base, and `generateSpec` output adds a layer of generated
//! subcommands. Layers borrow from the registry where they can; generated
//! pieces are owned.

use crate::spec::{Argument, CommandSpec, Generator, LoadSpec, OptionSpec, StaticSuggestion};
use std::borrow::Cow;

/// Limit on nested `loadSpec` expansion from a single node.
pub const MAX_LOAD_DEPTH: usize = 8;

#[derive(Debug, Clone)]
pub struct Node<'a> {
    layers: Vec<Cow<'a, CommandSpec>>,
}

impl<'a> Node<'a> {
    pub fn new(spec: Cow<'a, CommandSpec>) -> Self {
        Self { layers: vec![spec] }
    }

    pub fn push_layer(&mut self, layer: Cow<'a, CommandSpec>) {
        self.layers.push(layer);
    }

    /// Name of the base spec, for logging.
    pub fn name(&self) -> &str {
        self.layers.first().map_or("", |l| l.primary_name())
    }

    /// Child matching `token` by name or alias. Children without a name
    /// are never matched.
    pub fn find_subcommand(&self, token: &str) -> Option<Cow<'a, CommandSpec>> {
        self.layers.iter().find_map(|layer| match layer {
            Cow::Borrowed(spec) => {
                let spec: &'a CommandSpec = *spec;
                spec.subcommands
                    .iter()
                    .find(|sub| !sub.name.is_empty() && sub.matches_name(token))
                    .map(Cow::Borrowed)
            },
            Cow::Owned(spec) => spec
                .subcommands
                .iter()
                .find(|sub| !sub.name.is_empty() && sub.matches_name(token))
                .cloned()
                .map(Cow::Owned),
        })
    }

    pub fn subcommands(&self) -> impl Iterator<Item = &CommandSpec> {
        self.layers
            .iter()
            .flat_map(|layer| layer.subcommands.iter())
            .filter(|sub| !sub.name.is_empty())
    }

    pub fn options(&self) -> impl Iterator<Item = &OptionSpec> {
        self.layers
            .iter()
            .flat_map(|layer| layer.options.iter())
            .filter(|option| !option.name.is_empty())
    }

    /// Positional slots: those of the first layer that declares any.
    pub fn args(&self) -> &[Argument] {
        self.layers
            .iter()
            .map(|layer| layer.args.as_slice())
            .find(|args| !args.is_empty())
            .unwrap_or_default()
    }

    pub fn additional_suggestions(&self) -> impl Iterator<Item = &StaticSuggestion> {
        self.layers
            .iter()
            .flat_map(|layer| layer.additional_suggestions.iter())
    }

    pub fn generate_spec(&self) -> impl Iterator<Item = &Generator> {
        self.layers.iter().flat_map(|layer| layer.generate_spec.iter())
    }

    pub fn options_can_break_variadic_arg(&self) -> bool {
        self.layers
            .first()
            .is_none_or(|base| base.options_can_break_variadic_arg)
    }
}

/// The `loadSpec` of one layer, borrowed for as long as the layer is.
pub fn load_spec_of<'a>(layer: &Cow<'a, CommandSpec>) -> Option<Cow<'a, LoadSpec>> {
    match layer {
        Cow::Borrowed(spec) => {
            let spec: &'a CommandSpec = *spec;
            spec.load_spec.as_ref().map(Cow::Borrowed)
        },
        Cow::Owned(spec) => spec.load_spec.clone().map(Cow::Owned),
    }
}
