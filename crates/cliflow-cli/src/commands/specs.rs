//! `cliflow specs`: list or fuzzy-search the specs the daemon would load.

use anyhow::Result;
use cliflow_core::{CommandSpec, Config, SpecRegistry};
use colored::Colorize;
use serde::Serialize;

use crate::cli::OutputFormat;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpecSummary<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    aliases: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    subcommands: usize,
    score: i64,
    matched: &'static str,
}

/// Execute the specs command.
pub fn execute(config: &Config, query: Option<&str>, format: OutputFormat) -> Result<()> {
    let dirs = config.spec_dirs()?;
    let registry = SpecRegistry::load_dirs(&dirs);
    let results = registry.search(query.unwrap_or(""));

    let summaries: Vec<SpecSummary<'_>> = results
        .iter()
        .map(|result| summarize(&result.spec, result.score, result.match_field))
        .collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summaries)?),
        OutputFormat::Text => {
            if registry.is_empty() {
                let listed: Vec<String> = dirs.iter().map(|d| d.display().to_string()).collect();
                println!(
                    "No specs found. Add JSON spec files to: {}",
                    listed.join(", ")
                );
                return Ok(());
            }
            if summaries.is_empty() {
                println!("No specs match '{}'", query.unwrap_or_default());
                return Ok(());
            }
            for summary in &summaries {
                print_summary(summary);
            }
            println!(
                "\n{} of {} specs",
                summaries.len().to_string().bold(),
                registry.len()
            );
        },
    }
    Ok(())
}

fn summarize<'a>(spec: &'a CommandSpec, score: i64, matched: &'static str) -> SpecSummary<'a> {
    SpecSummary {
        name: spec.primary_name(),
        aliases: spec
            .name
            .iter()
            .skip(1)
            .chain(&spec.aliases)
            .map(String::as_str)
            .collect(),
        description: spec.description.as_deref(),
        subcommands: spec.subcommands.len(),
        score,
        matched,
    }
}

fn print_summary(summary: &SpecSummary<'_>) {
    let mut line = summary.name.green().bold().to_string();
    if !summary.aliases.is_empty() {
        line.push_str(&format!(" ({})", summary.aliases.join(", ")));
    }
    if let Some(description) = summary.description {
        line.push_str(&format!(" - {}", description.bright_black()));
    }
    println!("{line}");
}
