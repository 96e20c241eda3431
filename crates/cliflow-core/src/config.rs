//! Configuration for the completion daemon and client.
//!
//! Everything lives under a single dotfile directory, `~/.cliflow` by default:
//!
//! ```text
//! ~/.cliflow/
//!   config.toml     optional settings (this module)
//!   cliflow.sock    daemon socket
//!   specs/          default spec directory
//! ```
//!
//! `CLIFLOW_HOME` relocates the whole directory and `CLIFLOW_SOCKET` overrides
//! just the socket path. A missing `config.toml` means defaults; a malformed one
//! is an error.
//!
//! ## Example Configuration File
//!
//! ```toml
//! [daemon]
//! max_suggestions = 50
//! request_timeout_ms = 2000
//!
//! [generators]
//! shell = "/bin/sh"
//! default_timeout_ms = 1500
//! default_ttl_ms = 5000
//!
//! [specs]
//! dirs = ["~/.cliflow/specs", "/usr/share/cliflow/specs"]
//!
//! [history]
//! enabled = true
//! file = "~/.zsh_history"
//!
//! [matching]
//! case_sensitive_options = true
//! allow_equals_separator = true
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that relocates the cliflow home directory.
pub const HOME_ENV: &str = "CLIFLOW_HOME";
/// Environment variable that overrides the daemon socket path.
pub const SOCKET_ENV: &str = "CLIFLOW_SOCKET";

const DIR_NAME: &str = ".cliflow";
const CONFIG_FILE: &str = "config.toml";
const SOCKET_FILE: &str = "cliflow.sock";

/// Top-level configuration, one field per `config.toml` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Daemon socket and request handling
    pub daemon: DaemonConfig,
    /// External command execution and caching
    pub generators: GeneratorConfig,
    /// Where completion specs are loaded from
    pub specs: SpecsConfig,
    /// Shell history suggestions
    pub history: HistoryConfig,
    /// Thin client behavior
    pub client: ClientConfig,
    /// Token matching rules used by the resolver
    pub matching: MatchingConfig,
}

/// `[daemon]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Socket path; `None` means `<home>/cliflow.sock`.
    pub socket_path: Option<PathBuf>,
    /// How long a connection may take to deliver its request line.
    pub request_timeout_ms: u64,
    /// Maximum number of suggestions returned per request.
    pub max_suggestions: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            request_timeout_ms: 2_000,
            max_suggestions: 50,
        }
    }
}

/// `[generators]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Shell used to run generator scripts (`<shell> -c <script>`).
    pub shell: String,
    /// Timeout applied when a generator does not set its own.
    pub default_timeout_ms: u64,
    /// Cache lifetime applied when a generator does not set its own.
    pub default_ttl_ms: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            shell: "/bin/sh".to_string(),
            default_timeout_ms: 1_500,
            default_ttl_ms: 5_000,
        }
    }
}

impl GeneratorConfig {
    /// Default generator timeout as a [`Duration`].
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Default cache lifetime as a [`Duration`].
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }
}

/// `[specs]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecsConfig {
    /// Directories scanned for `*.json` spec files, in order. Empty means
    /// `<home>/specs`.
    pub dirs: Vec<PathBuf>,
}

/// `[history]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Whether the `history` argument template produces anything.
    pub enabled: bool,
    /// History file; `None` means `$HISTFILE`, then `~/.zsh_history`.
    pub file: Option<PathBuf>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file: None,
        }
    }
}

/// `[client]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// How long the client waits for the first response line.
    pub timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { timeout_ms: 3_000 }
    }
}

/// `[matching]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Compare typed flags against option spellings case-sensitively.
    pub case_sensitive_options: bool,
    /// Accept `--flag=value` as a flag plus its first argument.
    pub allow_equals_separator: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            case_sensitive_options: true,
            allow_equals_separator: true,
        }
    }
}

impl Config {
    /// Load configuration from `<home>/config.toml`, or defaults if absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the home directory cannot be determined or
    /// the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, or defaults if absent.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {e}")))?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("Failed to parse config: {e}")))
    }

    /// Save the configuration to `<home>/config.toml`.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save the configuration to an explicit path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| Error::Config("Invalid config path".into()))?;

        fs::create_dir_all(parent)
            .map_err(|e| Error::Config(format!("Failed to create config directory: {e}")))?;

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

        fs::write(path, content).map_err(|e| Error::Config(format!("Failed to write config: {e}")))
    }

    /// Path of the configuration file.
    pub fn config_path() -> Result<PathBuf> {
        Ok(home_dir()?.join(CONFIG_FILE))
    }

    /// Resolve the daemon socket path.
    ///
    /// Precedence: `CLIFLOW_SOCKET`, then `daemon.socket_path`, then
    /// `<home>/cliflow.sock`.
    pub fn socket_path(&self) -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(SOCKET_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(path));
        }
        if let Some(path) = &self.daemon.socket_path {
            return Ok(expand_tilde(path));
        }
        default_socket_path()
    }

    /// Directories to scan for spec files.
    pub fn spec_dirs(&self) -> Result<Vec<PathBuf>> {
        if self.specs.dirs.is_empty() {
            return Ok(vec![home_dir()?.join("specs")]);
        }
        Ok(self.specs.dirs.iter().map(|d| expand_tilde(d)).collect())
    }

    /// History file to index, if one can be determined.
    #[must_use]
    pub fn history_file(&self) -> Option<PathBuf> {
        if let Some(file) = &self.history.file {
            return Some(expand_tilde(file));
        }
        if let Some(file) = std::env::var_os("HISTFILE").filter(|v| !v.is_empty()) {
            return Some(PathBuf::from(file));
        }
        directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(".zsh_history"))
    }
}

/// The cliflow home directory: `$CLIFLOW_HOME` or `~/.cliflow`.
pub fn home_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(DIR_NAME))
        .ok_or_else(|| Error::Config("Failed to determine home directory".into()))
}

/// Socket path derived from the environment alone, without reading
/// `config.toml`.
///
/// The thin client falls back to this when `config.toml` cannot be read.
pub fn default_socket_path() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(SOCKET_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    Ok(home_dir()?.join(SOCKET_FILE))
}

/// Expand a leading `~` to the user's home directory.
#[must_use]
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    directories::BaseDirs::new().map_or_else(
        || path.to_path_buf(),
        |dirs| dirs.home_dir().join(rest),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.daemon.max_suggestions, 50);
        assert_eq!(config.generators.default_timeout(), Duration::from_millis(1500));
        assert_eq!(config.generators.default_ttl(), Duration::from_secs(5));
        assert_eq!(config.client.timeout_ms, 3000);
        assert!(config.matching.case_sensitive_options);
        assert!(config.matching.allow_equals_separator);
        assert!(config.history.enabled);
    }

    #[test]
    fn test_missing_file_yields_defaults() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = Config::load_from(&temp_dir.path().join("config.toml"))?;
        assert_eq!(config, Config::default());
        Ok(())
    }

    #[test]
    fn test_partial_file_fills_defaults() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            "[daemon]\nmax_suggestions = 10\n\n[matching]\ncase_sensitive_options = false\n",
        )?;

        let config = Config::load_from(&path)?;
        assert_eq!(config.daemon.max_suggestions, 10);
        assert_eq!(config.daemon.request_timeout_ms, 2_000);
        assert!(!config.matching.case_sensitive_options);
        assert!(config.matching.allow_equals_separator);
        assert_eq!(config.generators, GeneratorConfig::default());
        Ok(())
    }

    #[test]
    fn test_malformed_file_is_config_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[daemon\nmax_suggestions = ")?;

        match Config::load_from(&path) {
            Err(Error::Config(msg)) => assert!(msg.contains("Failed to parse config")),
            other => panic!("expected config error, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_save_creates_parent_directories() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.specs.dirs = vec![PathBuf::from("/opt/specs")];
        config.save_to(&path)?;

        let loaded = Config::load_from(&path)?;
        assert_eq!(loaded.specs.dirs, vec![PathBuf::from("/opt/specs")]);
        Ok(())
    }

    #[test]
    fn test_explicit_spec_dirs_are_kept_in_order() -> Result<()> {
        let mut config = Config::default();
        config.specs.dirs = vec![PathBuf::from("/a"), PathBuf::from("/b")];
        assert_eq!(
            config.spec_dirs()?,
            vec![PathBuf::from("/a"), PathBuf::from("/b")]
        );
        Ok(())
    }

    #[test]
    fn test_expand_tilde_leaves_absolute_paths() {
        assert_eq!(
            expand_tilde(Path::new("/tmp/specs")),
            PathBuf::from("/tmp/specs")
        );
        assert_eq!(expand_tilde(Path::new("relative")), PathBuf::from("relative"));
    }

    proptest! {
        #[test]
        fn test_generator_durations(timeout in 0u64..100_000, ttl in 0u64..100_000) {
            let config = GeneratorConfig {
                shell: "/bin/sh".into(),
                default_timeout_ms: timeout,
                default_ttl_ms: ttl,
            };
            prop_assert_eq!(config.default_timeout().as_millis(), u128::from(timeout));
            prop_assert_eq!(config.default_ttl().as_millis(), u128::from(ttl));
        }
    }
}
