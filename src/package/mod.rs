//! Package records.
//!
//! Installed packages come from the local environment, remote packages from
//! the package index. Names compare case-insensitively everywhere.

mod version;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use version::{compare_versions, sort_versions_desc};

/// Summary shown when the index gives none.
pub const NO_SUMMARY: &str = "No summary available";

/// A package present in the current Python environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
    pub location: PathBuf,
    /// Tool that installed the package (usually "pip"), when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installer: Option<String>,
}

impl fmt::Display for InstalledPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// A search hit from the package index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePackage {
    pub name: String,
    pub summary: String,
    pub detail_url: String,
}

/// Everything one metadata fetch tells us about a project.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub name: String,
    pub summary: Option<String>,
    pub detail_url: String,
    /// Newest first.
    pub versions: Vec<String>,
    /// Raw `requires_dist` entries, unparsed.
    pub dependencies: Vec<String>,
}

impl ProjectMetadata {
    pub fn latest_version(&self) -> Option<&str> {
        self.versions.first().map(String::as_str)
    }

    /// Converts the metadata into a search hit.
    pub fn to_remote(&self) -> RemotePackage {
        RemotePackage {
            name: self.name.clone(),
            summary: self
                .summary
                .clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| NO_SUMMARY.to_string()),
            detail_url: self.detail_url.clone(),
        }
    }
}

/// Canonical form used as a lookup key: lower-case with `_` and `.` folded to `-`.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_sep = false;
    for c in name.trim().chars() {
        if matches!(c, '-' | '_' | '.') {
            if !last_sep {
                out.push('-');
            }
            last_sep = true;
        } else {
            out.extend(c.to_lowercase());
            last_sep = false;
        }
    }
    out
}

/// Leading distribution name of a requirement string.
///
/// `"requests[socks]>=2.0; python_version < '3.8'"` yields `"requests"`.
/// Version constraints, extras and markers are dropped, not interpreted.
pub fn requirement_name(requirement: &str) -> &str {
    let trimmed = requirement.trim_start();
    let end = trimmed
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        .unwrap_or(trimmed.len());
    &trimmed[..end]
}
