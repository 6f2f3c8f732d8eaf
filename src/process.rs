//! Child process execution.
//!
//! Every pip invocation goes through [`ProcessRunner`]. The real runner
//! enforces a timeout and kills the child when its future is dropped, so a
//! hung pip never outlives a timed-out or cancelled task.

use std::fmt;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};

use crate::error::{Error, Result};

/// A program and its arguments, exactly as they will be executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// True when `flag` appears verbatim among the arguments.
    pub fn has_arg(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) || arg.is_empty() {
                write!(f, " {:?}", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// What a finished child process produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout followed by stderr, for display.
    pub fn combined(&self) -> String {
        match (self.stdout.trim_end(), self.stderr.trim_end()) {
            ("", err) => err.to_string(),
            (out, "") => out.to_string(),
            (out, err) => format!("{}\n{}", out, err),
        }
    }
}

/// Runs child processes to completion.
///
/// Returns `Ok` for any process that ran, whatever its exit code. `Err` means
/// the process could not be started ([`Error::Process`] with no exit code) or
/// was killed after the timeout ([`Error::Timeout`]).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, command: &CommandLine) -> Result<ProcessOutput>;
}

/// Runs commands with tokio, capturing stdout and stderr.
#[derive(Debug, Clone)]
pub struct TokioProcessRunner {
    timeout: Option<Duration>,
}

impl TokioProcessRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    #[tracing::instrument(skip(self, command), fields(command = %command))]
    async fn run(&self, command: &CommandLine) -> Result<ProcessOutput> {
        debug!("Executing {}", command);

        let child = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Process {
                command: command.to_string(),
                exit_code: None,
                output: format!("Failed to start {}: {}", command.program, e),
            })?;

        let wait = child.wait_with_output();
        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(result) => result,
                Err(_) => {
                    // Dropping the wait future kills the child.
                    warn!("{} timed out after {:?}, killing it", command, limit);
                    return Err(Error::Timeout {
                        command: command.to_string(),
                        timeout: limit,
                    });
                }
            },
            None => wait.await,
        }
        .map_err(|e| Error::Process {
            command: command.to_string(),
            exit_code: None,
            output: format!("Failed to collect output: {}", e),
        })?;

        let output = ProcessOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!("{} exited with {:?}", command, output.exit_code);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_display_quotes_spaces() {
        let cmd = CommandLine::new("pip")
            .arg("install")
            .arg("requests; python_version < '3.8'");
        assert_eq!(
            cmd.to_string(),
            "pip install \"requests; python_version < '3.8'\""
        );
    }

    #[test]
    fn test_has_arg() {
        let cmd = CommandLine::new("pip").args(["uninstall", "-y", "six"]);
        assert!(cmd.has_arg("-y"));
        assert!(!cmd.has_arg("--yes"));
    }

    #[test]
    fn test_combined_output() {
        let output = ProcessOutput {
            exit_code: Some(1),
            stdout: "Collecting foo\n".into(),
            stderr: "ERROR: no such package\n".into(),
        };
        assert_eq!(output.combined(), "Collecting foo\nERROR: no such package");
        assert!(!output.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_captures_output_and_exit_code() {
        let runner = TokioProcessRunner::new(Some(Duration::from_secs(10)));
        let cmd = CommandLine::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]);

        let output = runner.run(&cmd).await.unwrap();

        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_times_out() {
        let runner = TokioProcessRunner::new(Some(Duration::from_millis(200)));
        let cmd = CommandLine::new("sleep").arg("5");

        let started = std::time::Instant::now();
        let err = runner.run(&cmd).await.unwrap_err();

        assert!(matches!(err, Error::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_missing_program_is_process_error() {
        let runner = TokioProcessRunner::new(None);
        let cmd = CommandLine::new("pipsearch-no-such-program-here");

        let err = runner.run(&cmd).await.unwrap_err();
        assert!(matches!(err, Error::Process { exit_code: None, .. }));
    }
}
