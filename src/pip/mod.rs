//! pip as a child process.
//!
//! [`PipLauncher`] knows how to start pip and builds every command line;
//! [`Installer`] runs install/uninstall commands and reports outcomes;
//! [`list_installed`] reads the installed-package inventory.

mod installer;
mod inventory;

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::process::CommandLine;

pub use installer::{Action, Installer, Outcome, OutcomeStatus, prepare_target};
pub use inventory::{Inventory, list_installed};

/// Launcher used when nothing else is configured.
pub const DEFAULT_PIP: &str = "pip";

/// How pip is started, e.g. `pip` or `python3 -m pip`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipLauncher {
    program: String,
    prefix_args: Vec<String>,
}

impl Default for PipLauncher {
    fn default() -> Self {
        Self {
            program: DEFAULT_PIP.to_string(),
            prefix_args: Vec::new(),
        }
    }
}

impl PipLauncher {
    /// Parses a whitespace-separated launcher such as `python3 -m pip`.
    pub fn parse(launcher: &str) -> Result<Self> {
        let mut parts = launcher.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| Error::input("The pip launcher must not be empty."))?;
        Ok(Self {
            program,
            prefix_args: parts.collect(),
        })
    }

    fn base(&self) -> CommandLine {
        CommandLine::new(&self.program)
            .args(self.prefix_args.iter().cloned())
            // Keeps pip's own upgrade nag out of captured output.
            .arg("--disable-pip-version-check")
    }

    /// `pip install name[==version] [--target DIR] [--force-reinstall]`
    pub fn install_command(&self, request: &InstallRequest) -> CommandLine {
        let mut cmd = self.base().arg("install").arg(request.requirement());
        if let Some(target) = &request.target {
            cmd = cmd.arg("--target").arg(target.display().to_string());
        }
        if request.force_reinstall {
            cmd = cmd.arg("--force-reinstall");
        }
        cmd
    }

    /// `pip uninstall -y name`
    pub fn uninstall_command(&self, name: &str) -> CommandLine {
        self.base().args(["uninstall", "-y", name])
    }

    /// `pip list --verbose --format=json`; verbose output carries the location.
    pub fn list_command(&self) -> CommandLine {
        self.base().args(["list", "--verbose", "--format=json"])
    }
}

/// What to install and where.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallRequest {
    pub name: String,
    pub version: Option<String>,
    pub target: Option<PathBuf>,
    pub force_reinstall: bool,
}

impl InstallRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Pins the install to `name==version`. Blank versions are ignored.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        let version = version.into();
        let version = version.trim();
        self.version = (!version.is_empty()).then(|| version.to_string());
        self
    }

    /// Installs into `dir` instead of the active environment.
    pub fn target(mut self, dir: impl Into<PathBuf>) -> Self {
        self.target = Some(dir.into());
        self
    }

    pub fn force_reinstall(mut self) -> Self {
        self.force_reinstall = true;
        self
    }

    /// The requirement handed to pip.
    pub fn requirement(&self) -> String {
        match &self.version {
            Some(version) => format!("{}=={}", self.name.trim(), version),
            None => self.name.trim().to_string(),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(Error::input("Please select a package."));
        }
        if self.version.is_some() && name.contains(['=', '<', '>', '!', '~', ';', '@']) {
            return Err(Error::input(format!(
                "{} already carries a version constraint; drop --version or the constraint.",
                name
            )));
        }
        Ok(())
    }
}
