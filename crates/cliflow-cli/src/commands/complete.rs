//! `cliflow complete`: resolve one command line and print the suggestions.

use anyhow::{Result, anyhow};
use cliflow_core::{Config, Request, Response, Suggestion};
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::OutputFormat;
use crate::daemon::{self, build_resolver, finalize};
use crate::error::CliError;

/// Execute the complete command.
///
/// With `local` the line is resolved in this process from the configured
/// specs; otherwise the running daemon answers it.
pub async fn execute(
    config: &Config,
    line: String,
    cwd: Option<PathBuf>,
    local: bool,
    format: OutputFormat,
) -> Result<()> {
    let cwd = match cwd {
        Some(cwd) if !cwd.is_dir() => {
            return Err(CliError::not_found(anyhow!(
                "working directory {} does not exist",
                cwd.display()
            ))
            .into());
        },
        Some(cwd) => cwd,
        None => std::env::current_dir()?,
    };
    let request = Request::complete(line, cwd.clone());

    let response = if local {
        let resolver = build_resolver(config)?;
        let ctx = request.into_context(cwd);
        Response::ok(finalize(
            resolver.resolve(&ctx).await,
            config.daemon.max_suggestions,
        ))
    } else {
        let wait = Duration::from_millis(config.client.timeout_ms);
        daemon::send(&config.socket_path()?, &request, wait).await?
    };

    match format {
        OutputFormat::Json => print!("{}", response.to_line()?),
        OutputFormat::Text => print_text(&response),
    }
    Ok(())
}

fn print_text(response: &Response) {
    if let Some(error) = &response.error {
        eprintln!("{} {error}", "daemon error:".red());
        return;
    }
    if response.suggestions.is_empty() {
        println!("{}", "No suggestions".bright_black());
        return;
    }
    let width = response
        .suggestions
        .iter()
        .map(|s| s.name.chars().count())
        .max()
        .unwrap_or(0)
        .min(32);
    for suggestion in &response.suggestions {
        println!("{}", format_line(suggestion, width));
    }
}

fn format_line(suggestion: &Suggestion, width: usize) -> String {
    let icon = suggestion
        .icon
        .as_deref()
        .unwrap_or_else(|| suggestion.kind.default_icon());
    let name = format!("{:<width$}", suggestion.name);
    let mut line = format!("{icon} {}", name.bold());
    if let Some(description) = &suggestion.description {
        line.push_str(&format!("  {}", description.bright_black()));
    }
    if let Some(insert) = &suggestion.insert_value {
        if insert != &suggestion.name {
            line.push_str(&format!("  {}", format!("-> {insert}").cyan()));
        }
    }
    line
}
