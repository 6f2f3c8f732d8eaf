//! Maps HTTP failures onto [`NetworkErrorKind`](crate::error::NetworkErrorKind).
//!
//! Requests are never retried; the classification only decides how the
//! failure is worded for the user.

use reqwest::StatusCode;

use crate::error::{Error, NetworkErrorKind};

/// Classifies a non-success status code.
pub fn classify_status(status: StatusCode, body_hint: &str) -> NetworkErrorKind {
    match status {
        StatusCode::NOT_FOUND => NetworkErrorKind::NotFound,
        StatusCode::TOO_MANY_REQUESTS => NetworkErrorKind::RateLimited,
        StatusCode::FORBIDDEN if body_hint.to_lowercase().contains("rate limit") => {
            NetworkErrorKind::RateLimited
        }
        s if s.is_server_error() => NetworkErrorKind::Server(s.as_u16()),
        s => NetworkErrorKind::Client(s.as_u16()),
    }
}

fn describe(kind: &NetworkErrorKind, url: &str) -> String {
    match kind {
        NetworkErrorKind::NotFound => format!("Not found: {}", url),
        NetworkErrorKind::RateLimited => {
            format!("Rate limit exceeded for {}. Try again later.", url)
        }
        NetworkErrorKind::Client(code) => format!("Request to {} failed: HTTP {}", url, code),
        NetworkErrorKind::Server(code) => {
            format!("Package index error for {}: HTTP {}", url, code)
        }
        NetworkErrorKind::Unreachable => format!("Could not reach {}", url),
    }
}

/// Builds a network error for a response that came back with `status`.
pub(crate) fn status_error(status: StatusCode, url: &str, body_hint: &str) -> Error {
    let kind = classify_status(status, body_hint);
    let message = describe(&kind, url);
    Error::network(kind, message)
}

/// Converts a transport-level reqwest error (no response at all, or a body
/// that could not be read) into a network error.
pub fn from_reqwest(error: reqwest::Error, url: &str) -> Error {
    if let Some(status) = error.status() {
        return status_error(status, url, &error.to_string());
    }
    Error::network(
        NetworkErrorKind::Unreachable,
        format!("{}: {}", describe(&NetworkErrorKind::Unreachable, url), error),
    )
}
