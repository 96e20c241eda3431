//! Error types and handling for cliflow-core operations.
//!
//! Most of the completion pipeline is deliberately forgiving: a broken spec node
//! is skipped, a failing generator contributes nothing, and a cache problem is a
//! miss. The error type here covers the places where a failure must surface to
//! the caller: loading configuration, loading spec files, decoding protocol
//! messages, and starting the daemon.
//!
//! ## Error Categories
//!
//! - **I/O Errors**: file system and socket operations
//! - **Serialization Errors**: JSON and TOML decoding
//! - **Configuration Errors**: invalid settings or config files
//! - **Spec Errors**: malformed completion spec files
//! - **Generator Errors**: external command failures (normally swallowed)
//! - **Protocol Errors**: malformed IPC requests
//!
//! ```rust
//! use cliflow_core::{Error, Result};
//!
//! fn handle(result: Result<()>) {
//!     match result {
//!         Err(e) if e.is_recoverable() => eprintln!("transient: {e}"),
//!         Err(e) => eprintln!("{} error: {e}", e.category()),
//!         Ok(()) => {},
//!     }
//! }
//! # handle(Ok(()));
//! ```

use thiserror::Error;

/// The main error type for cliflow-core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation failed.
    ///
    /// Covers reading spec directories, history files, and socket traffic.
    /// Timeouts and interruptions are treated as recoverable.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON or TOML (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration is invalid or inaccessible.
    ///
    /// ## Common Causes
    ///
    /// - Invalid TOML syntax in `config.toml`
    /// - Home directory cannot be determined
    /// - Config directory creation failures
    #[error("Configuration error: {0}")]
    Config(String),

    /// A completion spec could not be loaded.
    ///
    /// Raised per file by the registry loader, which logs it and moves on to
    /// the next file.
    #[error("Spec error: {0}")]
    Spec(String),

    /// A generator's external command failed to start or exited non-zero.
    ///
    /// The executor converts this into an empty suggestion list; it is only
    /// returned from the lower-level script runner.
    #[error("Generator error: {0}")]
    Generator(String),

    /// Operation timed out.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// An IPC message was malformed or of an unexpected shape.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Requested resource was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic error for uncategorized failures.
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl Error {
    /// Check if the error might go away if the operation is retried.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cliflow_core::Error;
    ///
    /// assert!(Error::Timeout("git status".into()).is_recoverable());
    /// assert!(!Error::Config("bad toml".into()).is_recoverable());
    /// ```
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Generator(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }

    /// Get the error category as a string identifier for logging.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Config(_) => "config",
            Self::Spec(_) => "spec",
            Self::Generator(_) => "generator",
            Self::Timeout(_) => "timeout",
            Self::Protocol(_) => "protocol",
            Self::NotFound(_) => "not_found",
            Self::Other(_) => "other",
        }
    }
}

/// Convenience type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
