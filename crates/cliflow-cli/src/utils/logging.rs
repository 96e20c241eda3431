//! Logging initialization and configuration.
//!
//! Sets up the tracing subscriber and color control from CLI flags and
//! environment variables. Logs always go to stderr so command output on
//! stdout stays machine-readable.

use anyhow::Result;
use colored::control as color_control;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::cli::{Cli, Commands, DaemonCommands, OutputFormat};

/// Environment variable holding the default log level (`error` to `trace`).
pub const LOG_ENV: &str = "CLIFLOW_LOG";

/// Initialize the logging subsystem based on CLI flags.
///
/// `-v` selects DEBUG and `-q` ERROR. Otherwise `CLIFLOW_LOG` decides, with
/// WARN as the fallback, except for `daemon run`, whose lifecycle messages
/// are logged at INFO.
///
/// # Errors
///
/// Returns an error if the global tracing subscriber cannot be set.
pub fn initialize_logging(cli: &Cli) -> Result<()> {
    let level = select_level(cli, std::env::var(LOG_ENV).ok().as_deref());

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // Color control: disable when requested, NO_COLOR is set, or when emitting JSON
    let env_no_color = std::env::var_os("NO_COLOR").is_some();
    if cli.no_color || env_no_color || machine_output(&cli.command) {
        color_control::set_override(false);
    }
    Ok(())
}

fn select_level(cli: &Cli, env_level: Option<&str>) -> Level {
    if cli.verbose {
        return Level::DEBUG;
    }
    if cli.quiet {
        return Level::ERROR;
    }
    if let Some(level) = env_level.and_then(|v| v.trim().parse::<Level>().ok()) {
        return level;
    }
    match cli.command {
        Commands::Daemon {
            command: DaemonCommands::Run,
        } => Level::INFO,
        _ => Level::WARN,
    }
}

const fn machine_output(command: &Commands) -> bool {
    matches!(
        command,
        Commands::Complete {
            format: OutputFormat::Json,
            ..
        } | Commands::Specs {
            format: OutputFormat::Json,
            ..
        }
    )
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap_or_else(|e| panic!("{e}"))
    }

    #[test]
    fn test_flags_win_over_env() {
        let cli = parse(&["cliflow", "-v", "specs"]);
        assert_eq!(select_level(&cli, Some("error")), Level::DEBUG);

        let cli = parse(&["cliflow", "-q", "daemon", "run"]);
        assert_eq!(select_level(&cli, Some("trace")), Level::ERROR);
    }

    #[test]
    fn test_env_level() {
        let cli = parse(&["cliflow", "specs"]);
        assert_eq!(select_level(&cli, Some("debug")), Level::DEBUG);
        assert_eq!(select_level(&cli, Some("nonsense")), Level::WARN);
        assert_eq!(select_level(&cli, None), Level::WARN);
    }

    #[test]
    fn test_daemon_run_defaults_to_info() {
        let cli = parse(&["cliflow", "daemon", "run"]);
        assert_eq!(select_level(&cli, None), Level::INFO);

        let cli = parse(&["cliflow", "daemon", "status"]);
        assert_eq!(select_level(&cli, None), Level::WARN);
    }

    #[test]
    fn test_machine_output() {
        assert!(machine_output(&parse(&["cliflow", "specs", "--format", "json"]).command));
        assert!(!machine_output(&parse(&["cliflow", "complete", "git "]).command));
    }
}
