use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use super::{InstallRequest, PipLauncher};
use crate::error::{Error, Result};
use crate::process::{CommandLine, ProcessRunner};
use crate::runtime::Runtime;
use crate::tasks::{TaskQueue, TaskResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Install,
    Reinstall,
    Uninstall,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Install => write!(f, "install"),
            Action::Reinstall => write!(f, "reinstall"),
            Action::Uninstall => write!(f, "uninstall"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    Success,
    /// pip ran and exited non-zero, or could not be started (`exit_code` is `None`).
    Failure { exit_code: Option<i32> },
    /// pip was killed after running longer than the configured timeout.
    TimedOut(Duration),
    Cancelled,
}

/// Result of one pip invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub action: Action,
    /// The requirement passed to pip, e.g. `requests==2.31.0`.
    pub package: String,
    pub status: OutcomeStatus,
    /// Captured stdout and stderr.
    pub output: String,
    pub command: String,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }

    /// One-line summary for the status line.
    pub fn message(&self) -> String {
        let done = match self.action {
            Action::Install => "installed",
            Action::Reinstall => "reinstalled",
            Action::Uninstall => "uninstalled",
        };
        match &self.status {
            OutcomeStatus::Success => format!("Successfully {} {}", done, self.package),
            OutcomeStatus::Failure {
                exit_code: Some(code),
            } => format!(
                "Failed to {} {} (exit code {})",
                self.action, self.package, code
            ),
            OutcomeStatus::Failure { exit_code: None } => {
                format!("Failed to {} {}", self.action, self.package)
            }
            OutcomeStatus::TimedOut(limit) => format!(
                "Timed out after {}s trying to {} {}",
                limit.as_secs(),
                self.action,
                self.package
            ),
            OutcomeStatus::Cancelled => format!("Cancelled {} of {}", self.action, self.package),
        }
    }

    fn cancelled(action: Action, package: &str) -> Self {
        Self {
            action,
            package: package.to_string(),
            status: OutcomeStatus::Cancelled,
            output: String::new(),
            command: String::new(),
        }
    }
}

/// Drives pip install/uninstall through a [`ProcessRunner`].
#[derive(Clone)]
pub struct Installer {
    runner: Arc<dyn ProcessRunner>,
    launcher: PipLauncher,
}

impl Installer {
    pub fn new(runner: Arc<dyn ProcessRunner>, launcher: PipLauncher) -> Self {
        Self { runner, launcher }
    }

    pub fn launcher(&self) -> &PipLauncher {
        &self.launcher
    }

    /// Installs one package. `Err` only for an unusable request; pip failures
    /// are reported through the outcome.
    #[tracing::instrument(skip(self))]
    pub async fn install(&self, request: &InstallRequest) -> Result<Outcome> {
        request.validate()?;
        let action = if request.force_reinstall {
            Action::Reinstall
        } else {
            Action::Install
        };
        let command = self.launcher.install_command(request);
        Ok(self.execute(action, &request.requirement(), command).await)
    }

    /// Forces a reinstall even when the package is already satisfied.
    pub async fn reinstall(&self, name: &str) -> Result<Outcome> {
        self.install(&InstallRequest::new(name).force_reinstall())
            .await
    }

    /// Uninstalls without asking; pip always gets `-y`.
    #[tracing::instrument(skip(self))]
    pub async fn uninstall(&self, name: &str) -> Result<Outcome> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::input("Please select a package."));
        }
        let command = self.launcher.uninstall_command(name);
        Ok(self.execute(Action::Uninstall, name, command).await)
    }

    /// Installs every name as an independent pip invocation on `queue`.
    ///
    /// Outcomes come back in the order of `names`. A failing, timed-out or
    /// cancelled install never affects the others.
    pub async fn install_all(
        &self,
        queue: &TaskQueue,
        names: &[String],
        target: Option<&Path>,
    ) -> Vec<Outcome> {
        info!(
            "Installing {} package(s), at most {} at a time",
            names.len(),
            queue.limit()
        );
        let target: Option<PathBuf> = target.map(Path::to_path_buf);

        let handles: Vec<_> = names
            .iter()
            .map(|name| {
                let installer = self.clone();
                let mut request = InstallRequest::new(name.clone());
                if let Some(dir) = &target {
                    request = request.target(dir.clone());
                }
                let handle = queue.spawn(async move { installer.install(&request).await });
                (name.clone(), handle)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (name, handle) in handles {
            let outcome = match handle.join().await {
                TaskResult::Completed(Ok(outcome)) => outcome,
                TaskResult::Completed(Err(e)) => Outcome {
                    action: Action::Install,
                    package: name,
                    status: OutcomeStatus::Failure { exit_code: None },
                    output: e.to_string(),
                    command: String::new(),
                },
                TaskResult::Cancelled => Outcome::cancelled(Action::Install, &name),
                TaskResult::Panicked(message) => {
                    warn!("Install task for {} panicked: {}", name, message);
                    Outcome {
                        action: Action::Install,
                        package: name,
                        status: OutcomeStatus::Failure { exit_code: None },
                        output: message,
                        command: String::new(),
                    }
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn execute(&self, action: Action, package: &str, command: CommandLine) -> Outcome {
        debug!("Running {} for {}", command, package);
        let (status, output) = match self.runner.run(&command).await {
            Ok(output) if output.success() => (OutcomeStatus::Success, output.combined()),
            Ok(output) => (
                OutcomeStatus::Failure {
                    exit_code: output.exit_code,
                },
                output.combined(),
            ),
            Err(Error::Timeout { timeout, .. }) => (OutcomeStatus::TimedOut(timeout), String::new()),
            Err(Error::Process { output, .. }) => (OutcomeStatus::Failure { exit_code: None }, output),
            Err(e) => (OutcomeStatus::Failure { exit_code: None }, e.to_string()),
        };

        let outcome = Outcome {
            action,
            package: package.to_string(),
            status,
            output,
            command: command.to_string(),
        };
        if outcome.is_success() {
            info!("{}", outcome.message());
        } else {
            warn!("{}", outcome.message());
        }
        outcome
    }
}

/// Makes sure an install target directory exists, creating it when missing.
pub fn prepare_target<R: Runtime + ?Sized>(runtime: &R, dir: &Path) -> Result<()> {
    if runtime.is_dir(dir) {
        return Ok(());
    }
    if runtime.exists(dir) {
        return Err(Error::input(format!(
            "Target {} exists and is not a directory.",
            dir.display()
        )));
    }
    debug!("Creating target directory {}", dir.display());
    runtime
        .create_dir_all(dir)
        .map_err(|e| Error::input(format!("{:#}", e)))
}
