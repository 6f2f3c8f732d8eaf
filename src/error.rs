//! Error taxonomy shared by every component.
//!
//! Library code returns [`Error`]; the session layer turns each variant into a
//! status message so that no failure ever ends an interactive session.

use std::time::Duration;

use thiserror::Error;

/// Convenience alias used across the library.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Why a request to the package index did not produce a usable response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkErrorKind {
    /// HTTP 404
    NotFound,
    /// HTTP 429, or a 403 that mentions a rate limit
    RateLimited,
    /// Any other 4xx
    Client(u16),
    /// Any 5xx
    Server(u16),
    /// Connection refused, DNS failure, timeout, TLS error...
    Unreachable,
}

#[derive(Debug, Error)]
pub enum Error {
    /// The package index could not be reached or answered with a non-200 status.
    #[error("{message}")]
    Network {
        kind: NetworkErrorKind,
        message: String,
    },

    /// Malformed HTML/JSON from the index, or a source file with invalid syntax.
    #[error("Parse error: {0}")]
    Parse(String),

    /// pip exited with a non-zero status. The captured output is kept for display.
    #[error("{command} failed with exit code {}", .exit_code.map_or_else(|| "(none)".to_string(), |c| c.to_string()))]
    Process {
        command: String,
        exit_code: Option<i32>,
        output: String,
    },

    /// A child process did not finish in time and was killed.
    #[error("{command} timed out after {}s", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    /// A required user selection or argument is missing or unusable.
    #[error("{0}")]
    Input(String),
}

impl Error {
    pub fn network(kind: NetworkErrorKind, message: impl Into<String>) -> Self {
        Error::Network {
            kind,
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Error::Parse(message.into())
    }

    pub fn input(message: impl Into<String>) -> Self {
        Error::Input(message.into())
    }

    /// True when the index answered 404 for the requested resource.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::Network {
                kind: NetworkErrorKind::NotFound,
                ..
            }
        )
    }
}
