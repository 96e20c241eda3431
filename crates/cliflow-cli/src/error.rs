//! CLI error handling with semantic exit codes.
//!
//! Errors are categorized so that shell hooks and scripts can tell a missing
//! daemon apart from a bad invocation without parsing stderr.
//!
//! # Exit Code Categories
//!
//! | Code | Category | Description |
//! |------|----------|-------------|
//! | 0 | Success | Command completed successfully |
//! | 1 | `Internal` | Unexpected/internal error |
//! | 2 | `Usage` | Invalid arguments or configuration |
//! | 3 | `NotFound` | Requested spec or file not found |
//! | 5 | `DaemonUnavailable` | No daemon answering on the socket |
//! | 6 | `Timeout` | The daemon did not answer in time |
//!
//! # Usage
//!
//! ```bash
//! cliflow complete "git ch"
//! case $? in
//!     0) ;;
//!     5) cliflow daemon start ;;
//!     *) echo "completion failed" ;;
//! esac
//! ```

use std::fmt;

/// Semantic error category determining the exit code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCategory {
    /// Unexpected or internal error (exit code 1).
    Internal = 1,

    /// Invalid arguments or configuration (exit code 2).
    ///
    /// Includes malformed `config.toml` and bad request JSON.
    Usage = 2,

    /// Requested resource not found (exit code 3).
    NotFound = 3,

    /// No daemon is listening on the socket (exit code 5).
    ///
    /// Use when connecting to the socket fails, or when `daemon start` gives
    /// up waiting for a freshly spawned daemon.
    DaemonUnavailable = 5,

    /// Operation timed out (exit code 6).
    Timeout = 6,
}

impl ErrorCategory {
    /// Get the exit code for this category.
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        self as u8
    }

    /// Get a short description of this error category.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Internal => "internal error",
            Self::Usage => "usage error",
            Self::NotFound => "not found",
            Self::DaemonUnavailable => "daemon unavailable",
            Self::Timeout => "timeout",
        }
    }

    /// Infer the error category from an error message.
    ///
    /// Fallback for errors that were never explicitly categorized.
    #[must_use]
    pub fn infer_from_message(msg: &str) -> Self {
        let msg_lower = msg.to_lowercase();

        // Before the daemon check so "connection timed out" is a timeout
        if msg_lower.contains("timeout") || msg_lower.contains("timed out") {
            return Self::Timeout;
        }

        if msg_lower.contains("connection refused")
            || msg_lower.contains("daemon is not running")
            || msg_lower.contains("no daemon")
        {
            return Self::DaemonUnavailable;
        }

        if msg_lower.contains("not found")
            || msg_lower.contains("no such")
            || msg_lower.contains("does not exist")
            || msg_lower.contains("no spec for")
        {
            return Self::NotFound;
        }

        if msg_lower.contains("configuration error")
            || msg_lower.contains("invalid argument")
            || msg_lower.contains("invalid request")
            || msg_lower.contains("invalid value")
        {
            return Self::Usage;
        }

        Self::Internal
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// A CLI error with a semantic category for exit code mapping.
///
/// Wraps an `anyhow::Error` so the full context chain survives while the
/// category decides the exit code.
///
/// ```rust,ignore
/// use cliflow_cli::error::CliError;
///
/// let err = CliError::daemon_unavailable(anyhow::anyhow!("no daemon at /tmp/x.sock"));
/// assert_eq!(err.exit_code(), 5);
/// ```
#[derive(Debug)]
pub struct CliError {
    /// The semantic category of this error.
    pub category: ErrorCategory,
    /// The underlying error with full context.
    pub source: anyhow::Error,
}

impl CliError {
    /// Create a new CLI error with explicit category.
    pub fn new(category: ErrorCategory, source: impl Into<anyhow::Error>) -> Self {
        Self {
            category,
            source: source.into(),
        }
    }

    /// Create a usage error.
    pub fn usage(source: impl Into<anyhow::Error>) -> Self {
        Self::new(ErrorCategory::Usage, source)
    }

    /// Create a not-found error.
    pub fn not_found(source: impl Into<anyhow::Error>) -> Self {
        Self::new(ErrorCategory::NotFound, source)
    }

    /// Create a daemon-unavailable error.
    pub fn daemon_unavailable(source: impl Into<anyhow::Error>) -> Self {
        Self::new(ErrorCategory::DaemonUnavailable, source)
    }

    /// Create a timeout error.
    pub fn timeout(source: impl Into<anyhow::Error>) -> Self {
        Self::new(ErrorCategory::Timeout, source)
    }

    /// Get the exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.category.exit_code()
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Extension trait for converting errors to `CliError`.
pub trait IntoCliError {
    /// Convert to a `CliError` with an explicit category.
    fn with_category(self, category: ErrorCategory) -> CliError;
}

impl<E: Into<anyhow::Error>> IntoCliError for E {
    fn with_category(self, category: ErrorCategory) -> CliError {
        CliError::new(category, self)
    }
}

/// Determine the exit code from an `anyhow::Error`.
///
/// A `CliError` anywhere in the chain wins; otherwise the category is
/// inferred from the message.
#[must_use]
pub fn exit_code_from_error(err: &anyhow::Error) -> u8 {
    if let Some(cli_err) = err.chain().find_map(|e| e.downcast_ref::<CliError>()) {
        return cli_err.exit_code();
    }

    ErrorCategory::infer_from_message(&err.to_string()).exit_code()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::{Context, anyhow};

    mod error_category {
        use super::*;

        #[test]
        fn test_exit_codes() {
            assert_eq!(ErrorCategory::Internal.exit_code(), 1);
            assert_eq!(ErrorCategory::Usage.exit_code(), 2);
            assert_eq!(ErrorCategory::NotFound.exit_code(), 3);
            assert_eq!(ErrorCategory::DaemonUnavailable.exit_code(), 5);
            assert_eq!(ErrorCategory::Timeout.exit_code(), 6);
        }

        #[test]
        fn test_infer_timeout_before_daemon() {
            assert_eq!(
                ErrorCategory::infer_from_message("connection timed out"),
                ErrorCategory::Timeout
            );
            assert_eq!(
                ErrorCategory::infer_from_message("request timeout after 3000ms"),
                ErrorCategory::Timeout
            );
        }

        #[test]
        fn test_infer_daemon_unavailable() {
            assert_eq!(
                ErrorCategory::infer_from_message("Connection refused (os error 111)"),
                ErrorCategory::DaemonUnavailable
            );
            assert_eq!(
                ErrorCategory::infer_from_message("daemon is not running"),
                ErrorCategory::DaemonUnavailable
            );
        }

        #[test]
        fn test_infer_not_found_and_usage() {
            assert_eq!(
                ErrorCategory::infer_from_message("Not found: no spec for 'kubectl'"),
                ErrorCategory::NotFound
            );
            assert_eq!(
                ErrorCategory::infer_from_message("Configuration error: Failed to parse config"),
                ErrorCategory::Usage
            );
        }

        #[test]
        fn test_infer_default() {
            assert_eq!(
                ErrorCategory::infer_from_message("something odd"),
                ErrorCategory::Internal
            );
        }

        #[test]
        fn test_display() {
            assert_eq!(
                ErrorCategory::DaemonUnavailable.to_string(),
                "daemon unavailable"
            );
        }
    }

    mod cli_error {
        use super::*;

        #[test]
        fn test_constructors() {
            assert_eq!(
                CliError::new(ErrorCategory::Internal, anyhow!("e")).category,
                ErrorCategory::Internal
            );
            assert_eq!(CliError::usage(anyhow!("e")).category, ErrorCategory::Usage);
            assert_eq!(
                CliError::not_found(anyhow!("e")).category,
                ErrorCategory::NotFound
            );
            assert_eq!(
                CliError::daemon_unavailable(anyhow!("e")).category,
                ErrorCategory::DaemonUnavailable
            );
            assert_eq!(
                CliError::timeout(anyhow!("e")).category,
                ErrorCategory::Timeout
            );
        }

        #[test]
        fn test_display_is_source() {
            let err = CliError::not_found(anyhow!("no spec for 'kubectl'"));
            assert_eq!(err.to_string(), "no spec for 'kubectl'");
        }
    }

    mod exit_code_from_error {
        use super::*;

        #[test]
        fn test_cli_error() {
            let err: anyhow::Error = CliError::daemon_unavailable(anyhow!("gone")).into();
            assert_eq!(exit_code_from_error(&err), 5);
        }

        #[test]
        fn test_cli_error_under_context() {
            let err = Err::<(), _>(CliError::timeout(anyhow!("slow")))
                .context("status check failed")
                .unwrap_err();
            assert_eq!(exit_code_from_error(&err), 6);
        }

        #[test]
        fn test_uncategorized_message_is_inferred() {
            assert_eq!(exit_code_from_error(&anyhow!("no daemon at /tmp/cliflow.sock")), 5);
            assert_eq!(exit_code_from_error(&anyhow!("file does not exist")), 3);
        }

        #[test]
        fn test_regular_error() {
            assert_eq!(exit_code_from_error(&anyhow!("Operation timed out")), 6);
            assert_eq!(exit_code_from_error(&anyhow!("boom")), 1);
        }
    }

    mod with_category {
        use super::*;

        #[test]
        fn test_with_category() {
            let err = anyhow!("bad").with_category(ErrorCategory::Usage);
            assert_eq!(err.category, ErrorCategory::Usage);
        }
    }
}
