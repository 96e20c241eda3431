//! cliflow CLI - completion daemon, control commands and the thin client.
//!
//! The `cliflow` binary is a thin wrapper around [`run`]. The per-keystroke
//! `cliflow-client` binary only uses the socket path helpers from
//! `cliflow-core` so that it starts in a few milliseconds.

use anyhow::Result;
use clap::Parser;
use cliflow_core::Config;

pub mod cli;
mod commands;
pub mod daemon;
pub mod error;
mod utils;

use crate::cli::{Cli, Commands, ConfigCommands, DaemonCommands};
use crate::error::{ErrorCategory, IntoCliError};
use crate::utils::initialize_logging;

/// Execute the cliflow CLI with the current arguments and environment.
///
/// # Errors
///
/// Returns an error if logging cannot be initialized, the configuration is
/// malformed, or the selected command fails.
pub async fn run() -> Result<()> {
    // Convert Broken pipe panics into a clean exit
    std::panic::set_hook(Box::new(|info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe") || msg.contains("broken pipe") {
            std::process::exit(0);
        }
        eprintln!("{msg}");
    }));

    let cli = Cli::parse();
    initialize_logging(&cli)?;

    execute_command(cli).await
}

async fn execute_command(cli: Cli) -> Result<()> {
    // Config commands must work even when the file is malformed
    let command = match cli.command {
        Commands::Config { command } => {
            return match command {
                ConfigCommands::Init { force } => commands::config_init(force),
                ConfigCommands::Path => commands::config_path(),
            };
        },
        other => other,
    };

    let config = Config::load().map_err(|e| e.with_category(ErrorCategory::Usage))?;

    match command {
        Commands::Daemon { command } => match command {
            DaemonCommands::Run => commands::daemon_run(&config).await,
            DaemonCommands::Start => commands::daemon_start(&config).await,
            DaemonCommands::Stop => commands::daemon_stop(&config).await,
            DaemonCommands::Status => commands::daemon_status(&config).await,
        },
        Commands::Complete {
            line,
            cwd,
            local,
            format,
        } => commands::complete(&config, line, cwd, local, format).await,
        Commands::Specs { query, format } => {
            commands::list_specs(&config, query.as_deref(), format)
        },
        // Handled before loading the config
        Commands::Config { .. } => Ok(()),
    }
}
