//! Status reporting.
//!
//! Components never print. Anything the user should see is a [`Status`]
//! handed to the [`StatusReporter`] the caller passed in.

use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{info, warn};

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Info(String),
    Warning(String),
    Error(String),
}

impl Status {
    pub fn info(message: impl Into<String>) -> Self {
        Status::Info(message.into())
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Status::Warning(message.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Status::Error(message.into())
    }

    pub fn message(&self) -> &str {
        match self {
            Status::Info(m) | Status::Warning(m) | Status::Error(m) => m,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Status::Error(_))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Info(m) => write!(f, "{}", m),
            Status::Warning(m) => write!(f, "Warning: {}", m),
            Status::Error(m) => write!(f, "Error: {}", m),
        }
    }
}

impl From<&Error> for Status {
    /// Process failures keep their captured output below the summary line.
    fn from(error: &Error) -> Self {
        match error {
            Error::Process { output, .. } if !output.trim().is_empty() => {
                Status::Error(format!("{}\n{}", error, output.trim_end()))
            }
            _ => Status::Error(error.to_string()),
        }
    }
}

/// Receives status messages from a session.
pub trait StatusReporter: Send + Sync {
    fn report(&self, status: Status);
}

/// Forwards statuses to the `log` facade.
#[derive(Debug, Default)]
pub struct LogReporter;

impl StatusReporter for LogReporter {
    fn report(&self, status: Status) {
        match status {
            Status::Info(m) => info!("{}", m),
            Status::Warning(m) => warn!("{}", m),
            Status::Error(m) => log::error!("{}", m),
        }
    }
}

/// Prints statuses to stderr so stdout stays clean for results.
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    errors: AtomicUsize,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Error statuses printed so far; the CLI exit code depends on it.
    pub fn error_count(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }
}

impl StatusReporter for ConsoleReporter {
    fn report(&self, status: Status) {
        if status.is_error() {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
        eprintln!("{}", status);
    }
}

/// Keeps every status in memory.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    statuses: Mutex<Vec<Status>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statuses(&self) -> Vec<Status> {
        self.statuses
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<Status> {
        self.statuses.lock().ok().and_then(|s| s.last().cloned())
    }
}

impl StatusReporter for MemoryReporter {
    fn report(&self, status: Status) {
        if let Ok(mut statuses) = self.statuses.lock() {
            statuses.push(status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Status::info("Found 2 packages.").to_string(), "Found 2 packages.");
        assert_eq!(Status::warning("slow").to_string(), "Warning: slow");
        assert_eq!(Status::error("boom").to_string(), "Error: boom");
    }

    #[test]
    fn test_process_error_keeps_output() {
        let error = Error::Process {
            command: "pip install nope".into(),
            exit_code: Some(1),
            output: "ERROR: No matching distribution\n".into(),
        };
        let status = Status::from(&error);
        assert!(status.is_error());
        assert_eq!(
            status.message(),
            "pip install nope failed with exit code 1\nERROR: No matching distribution"
        );
    }

    #[test]
    fn test_console_reporter_counts_errors() {
        let reporter = ConsoleReporter::new();
        reporter.report(Status::info("fine"));
        reporter.report(Status::warning("meh"));
        assert_eq!(reporter.error_count(), 0);
        reporter.report(Status::error("bad"));
        assert_eq!(reporter.error_count(), 1);
    }

    #[test]
    fn test_memory_reporter() {
        let reporter = MemoryReporter::new();
        reporter.report(Status::info("one"));
        reporter.report(Status::error("two"));
        assert_eq!(reporter.statuses().len(), 2);
        assert_eq!(reporter.last(), Some(Status::error("two")));
    }
}
