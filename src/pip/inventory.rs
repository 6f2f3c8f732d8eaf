use std::collections::BTreeMap;
use std::path::PathBuf;

use log::{debug, warn};
use serde::Deserialize;

use super::PipLauncher;
use crate::error::{Error, Result};
use crate::package::{InstalledPackage, normalize_name};
use crate::process::ProcessRunner;

/// One entry of `pip list --verbose --format=json`.
#[derive(Deserialize, Debug)]
struct ListEntry {
    name: String,
    version: String,
    #[serde(default)]
    location: Option<PathBuf>,
    #[serde(default)]
    installer: Option<String>,
}

/// Installed packages at the time [`list_installed`] ran.
///
/// Never updated in place: observe an install or uninstall by listing again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    packages: BTreeMap<String, InstalledPackage>,
}

impl Inventory {
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Looks a package up ignoring case and `-`/`_`/`.` differences.
    pub fn find(&self, name: &str) -> Option<&InstalledPackage> {
        self.packages.get(&normalize_name(name))
    }

    /// Names whose lower-case form contains `substring` lower-cased.
    ///
    /// Sorted case-insensitively. An empty substring matches everything.
    pub fn search(&self, substring: &str) -> Vec<String> {
        let needle = substring.to_lowercase();
        let mut names: Vec<String> = self
            .packages
            .values()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .map(|p| p.name.clone())
            .collect();
        names.sort_by_key(|n| n.to_lowercase());
        names
    }

    /// Display names of every package, sorted case-insensitively.
    pub fn names(&self) -> Vec<String> {
        self.search("")
    }

    /// Packages ordered by normalized name.
    pub fn iter(&self) -> impl Iterator<Item = &InstalledPackage> {
        self.packages.values()
    }

    fn insert(&mut self, package: InstalledPackage) {
        self.packages.insert(normalize_name(&package.name), package);
    }
}

impl FromIterator<InstalledPackage> for Inventory {
    fn from_iter<I: IntoIterator<Item = InstalledPackage>>(iter: I) -> Self {
        let mut inventory = Inventory::default();
        for package in iter {
            inventory.insert(package);
        }
        inventory
    }
}

/// Parses the JSON printed by `pip list --verbose --format=json`.
///
/// Entries without a version or location are skipped with a warning.
pub fn parse_pip_list(json: &str) -> Result<Inventory> {
    let entries: Vec<ListEntry> = serde_json::from_str(json)
        .map_err(|e| Error::parse(format!("Unexpected pip list output: {}", e)))?;

    let inventory: Inventory = entries
        .into_iter()
        .filter_map(|entry| match entry.location {
            Some(location) if !entry.version.is_empty() => Some(InstalledPackage {
                name: entry.name,
                version: entry.version,
                location,
                installer: entry.installer.filter(|i| !i.is_empty()),
            }),
            _ => {
                warn!("Skipping {}: pip reported no version or location", entry.name);
                None
            }
        })
        .collect();
    Ok(inventory)
}

/// Runs pip and returns the installed-package inventory.
#[tracing::instrument(skip(runner, launcher))]
pub async fn list_installed(runner: &dyn ProcessRunner, launcher: &PipLauncher) -> Result<Inventory> {
    let command = launcher.list_command();
    let output = runner.run(&command).await?;
    if !output.success() {
        return Err(Error::Process {
            command: command.to_string(),
            exit_code: output.exit_code,
            output: output.combined(),
        });
    }

    let inventory = parse_pip_list(&output.stdout)?;
    debug!("{} installed package(s)", inventory.len());
    Ok(inventory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{MockProcessRunner, ProcessOutput};

    const PIP_LIST: &str = r#"[
        {"name": "requests", "version": "2.31.0", "location": "/venv/lib/python3.12/site-packages", "installer": "pip"},
        {"name": "typing_extensions", "version": "4.9.0", "location": "/venv/lib/python3.12/site-packages", "installer": "pip"},
        {"name": "PyYAML", "version": "6.0.1", "location": "/venv/lib/python3.12/site-packages", "installer": ""},
        {"name": "Requests-OAuthlib", "version": "1.3.1", "location": "/venv/lib/python3.12/site-packages"},
        {"name": "broken", "version": "0.1"}
    ]"#;

    fn inventory() -> Inventory {
        parse_pip_list(PIP_LIST).unwrap()
    }

    #[test]
    fn test_every_listed_package_has_version_and_location() {
        let inventory = inventory();
        assert_eq!(inventory.len(), 4);
        for name in inventory.names() {
            let package = inventory.find(&name).unwrap();
            assert!(!package.version.is_empty());
            assert!(!package.location.as_os_str().is_empty());
        }
    }

    #[test]
    fn test_find_ignores_case_and_separators() {
        let inventory = inventory();
        assert_eq!(inventory.find("pyyaml").unwrap().version, "6.0.1");
        assert_eq!(inventory.find("typing-extensions").unwrap().name, "typing_extensions");
        assert!(inventory.find("numpy").is_none());
        assert!(inventory.find("broken").is_none());
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let inventory = inventory();
        assert_eq!(inventory.search("REQUEST"), vec!["requests", "Requests-OAuthlib"]);
        assert_eq!(inventory.search("yam"), vec!["PyYAML"]);
        assert_eq!(inventory.search("oauth"), vec!["Requests-OAuthlib"]);
        assert!(inventory.search("zzz").is_empty());
    }

    #[test]
    fn test_empty_installer_dropped() {
        let inventory = inventory();
        assert_eq!(inventory.find("requests").unwrap().installer.as_deref(), Some("pip"));
        assert_eq!(inventory.find("pyyaml").unwrap().installer, None);
    }

    #[test]
    fn test_malformed_output_is_parse_error() {
        let err = parse_pip_list("Usage: pip <command>").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[tokio::test]
    async fn test_list_installed_runs_pip_list() {
        let mut runner = MockProcessRunner::new();
        runner
            .expect_run()
            .withf(|cmd| cmd.has_arg("list") && cmd.has_arg("--format=json") && cmd.has_arg("--verbose"))
            .times(1)
            .returning(|_| {
                Ok(ProcessOutput {
                    exit_code: Some(0),
                    stdout: PIP_LIST.to_string(),
                    stderr: String::new(),
                })
            });

        let inventory = list_installed(&runner, &PipLauncher::default()).await.unwrap();
        assert_eq!(inventory.len(), 4);
    }

    #[tokio::test]
    async fn test_list_installed_failure_is_process_error() {
        let mut runner = MockProcessRunner::new();
        runner.expect_run().returning(|_| {
            Ok(ProcessOutput {
                exit_code: Some(2),
                stdout: String::new(),
                stderr: "pip: broken environment".into(),
            })
        });

        let err = list_installed(&runner, &PipLauncher::default()).await.unwrap_err();
        match err {
            Error::Process { exit_code, output, .. } => {
                assert_eq!(exit_code, Some(2));
                assert!(output.contains("broken environment"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
