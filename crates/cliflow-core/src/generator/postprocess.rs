//! Turning raw generator output into suggestions.

use crate::spec::PostProcess;
use crate::types::{Suggestion, SuggestionKind};
use regex::Regex;
use std::collections::HashSet;
use tracing::warn;

/// Priority given to generated suggestions that do not set one.
pub const GENERATED_PRIORITY: i32 = 75;

/// Apply `post` to the stdout of a generator.
#[must_use]
pub fn apply(post: &PostProcess, output: &str) -> Vec<Suggestion> {
    match post {
        PostProcess::Lines { dedupe } => lines(output, *dedupe),
        PostProcess::Map(mapper) => non_empty_lines(output).filter_map(|l| mapper(l)).collect(),
        PostProcess::Split {
            delimiter,
            name_field,
            description_field,
            skip_lines,
        } => split(output, delimiter, *name_field, *description_field, *skip_lines),
        PostProcess::Regex {
            pattern,
            name_group,
            description_group,
        } => extract(output, pattern, name_group, description_group.as_deref()),
    }
}

fn non_empty_lines(output: &str) -> impl Iterator<Item = &str> {
    output.lines().map(str::trim).filter(|l| !l.is_empty())
}

fn generated(name: &str) -> Suggestion {
    Suggestion::new(name, SuggestionKind::Argument).with_priority(GENERATED_PRIORITY)
}

fn lines(output: &str, dedupe: bool) -> Vec<Suggestion> {
    let mut seen = HashSet::new();
    non_empty_lines(output)
        .filter(|l| !dedupe || seen.insert(*l))
        .map(generated)
        .collect()
}

fn split(
    output: &str,
    delimiter: &str,
    name_field: usize,
    description_field: Option<usize>,
    skip_lines: usize,
) -> Vec<Suggestion> {
    output
        .lines()
        .skip(skip_lines)
        .filter(|l| !l.trim().is_empty())
        .filter_map(|line| {
            let fields: Vec<&str> = if delimiter.is_empty() {
                line.split_whitespace().collect()
            } else {
                line.split(delimiter).map(str::trim).collect()
            };
            let name = fields.get(name_field).filter(|n| !n.is_empty())?;
            let description = description_field.and_then(|i| fields.get(i)).copied();
            Some(generated(name).with_optional_description(description))
        })
        .collect()
}

fn extract(
    output: &str,
    pattern: &str,
    name_group: &str,
    description_group: Option<&str>,
) -> Vec<Suggestion> {
    let regex = match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(e) => {
            warn!(pattern, error = %e, "invalid post-process pattern");
            return Vec::new();
        },
    };

    output
        .lines()
        .filter_map(|line| {
            let captures = regex.captures(line)?;
            let name = group(&captures, name_group)?.trim();
            if name.is_empty() {
                return None;
            }
            let description = description_group
                .and_then(|g| group(&captures, g))
                .map(str::trim);
            Some(generated(name).with_optional_description(description))
        })
        .collect()
}

fn group<'h>(captures: &regex::Captures<'h>, group: &str) -> Option<&'h str> {
    let m = match group.parse::<usize>() {
        Ok(index) => captures.get(index),
        Err(_) => captures.name(group),
    };
    m.map(|m| m.as_str())
}
