//! Command-line interface definitions for cliflow.
//!
//! The `cliflow` binary manages the completion daemon and offers a few
//! diagnostic commands. Per-keystroke completion goes through the separate
//! `cliflow-client` binary, which does not use this module at all.
//!
//! # Examples
//!
//! ```bash
//! # Run the daemon in the foreground with lifecycle logs
//! cliflow daemon run
//!
//! # Start it in the background and check on it
//! cliflow daemon start
//! cliflow daemon status
//!
//! # Ask the running daemon, or resolve in-process without one
//! cliflow complete "git che"
//! cliflow complete "git che" --local --format json
//!
//! # Browse loaded specs
//! cliflow specs dock
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Top-level parser for the `cliflow` binary.
#[derive(Parser, Clone, Debug)]
#[command(name = "cliflow")]
#[command(version)]
#[command(about = "cliflow - fast shell completions from a warm daemon", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Show debug logs
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Suppress informational messages (only show errors)
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable all ANSI colors in output (also respects `NO_COLOR` env)
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
}

/// Available subcommands.
#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Control the completion daemon
    Daemon {
        #[command(subcommand)]
        command: DaemonCommands,
    },

    /// Print completions for a command line
    Complete {
        /// The command line, cursor at the end
        line: String,

        /// Working directory for path and generator suggestions
        #[arg(long, value_name = "DIR")]
        cwd: Option<PathBuf>,

        /// Resolve in this process instead of asking the daemon
        #[arg(long)]
        local: bool,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List or search loaded completion specs
    Specs {
        /// Fuzzy filter over names, aliases and descriptions
        query: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// `cliflow daemon ...`
#[derive(Subcommand, Clone, Debug)]
pub enum DaemonCommands {
    /// Serve in the foreground until interrupted or asked to shut down
    Run,
    /// Spawn a background daemon and wait until it answers
    Start,
    /// Ask the running daemon to shut down
    Stop,
    /// Report whether a daemon answers on the socket
    Status,
}

/// `cliflow config ...`
#[derive(Subcommand, Clone, Debug)]
pub enum ConfigCommands {
    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the config file location
    Path,
}

/// Output format for human-facing commands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Colored, aligned text
    #[default]
    Text,
    /// A single JSON document
    Json,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_complete() {
        let cli = Cli::try_parse_from(["cliflow", "complete", "git ch", "--local", "--format", "json"])
            .unwrap_or_else(|e| panic!("{e}"));
        match cli.command {
            Commands::Complete {
                line,
                local,
                format,
                cwd,
            } => {
                assert_eq!(line, "git ch");
                assert!(local);
                assert_eq!(format, OutputFormat::Json);
                assert!(cwd.is_none());
            },
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["cliflow", "daemon", "status", "-v"])
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Daemon {
                command: DaemonCommands::Status
            }
        ));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["cliflow", "-q", "-v", "specs"]).is_err());
    }
}
