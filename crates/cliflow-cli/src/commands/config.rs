//! `cliflow config`: locate or create `config.toml`.

use anyhow::{Result, anyhow};
use cliflow_core::Config;
use colored::Colorize;

use crate::error::CliError;

/// Write a default config file, refusing to overwrite unless `force`.
pub fn init(force: bool) -> Result<()> {
    let path = Config::config_path()?;
    if path.exists() && !force {
        return Err(CliError::usage(anyhow!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ))
        .into());
    }
    Config::default().save_to(&path)?;
    println!("{} Wrote {}", "✓".green(), path.display());
    Ok(())
}

/// Print where the config file lives, whether or not it exists.
pub fn path() -> Result<()> {
    println!("{}", Config::config_path()?.display());
    Ok(())
}
