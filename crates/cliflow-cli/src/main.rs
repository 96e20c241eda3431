//! cliflow - fast shell completions from a warm daemon.

use colored::Colorize;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match cliflow_cli::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::from(cliflow_cli::error::exit_code_from_error(&err))
        },
    }
}
