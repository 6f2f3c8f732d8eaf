//! Package index abstraction.
//!
//! This module provides the remote half of the discovery workflow: searching
//! the index for candidate packages and fetching per-package metadata
//! (available versions and declared dependencies).

mod pypi;
pub mod search_page;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use futures_util::future::join_all;
use log::{debug, info};

use crate::error::{Error, Result};
use crate::package::{ProjectMetadata, RemotePackage};

pub use pypi::{DEFAULT_INDEX_URL, PyPiIndex};

/// How a search term is turned into candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchStrategy {
    /// Treat the term as an exact project name and ask the metadata endpoint.
    Exact,
    /// Submit the term to the search page and parse the results.
    #[default]
    Scrape,
}

impl fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchStrategy::Exact => write!(f, "exact"),
            SearchStrategy::Scrape => write!(f, "scrape"),
        }
    }
}

impl FromStr for SearchStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact" => Ok(SearchStrategy::Exact),
            "scrape" | "page" => Ok(SearchStrategy::Scrape),
            _ => anyhow::bail!("Unknown search strategy: {}. Expected exact or scrape.", s),
        }
    }
}

/// How a remote search ended. Never an error: the caller decides how to show it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchStatus {
    Found(usize),
    NoneFound,
    /// The index could not be queried or its answer could not be read.
    Unavailable(String),
}

impl fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchStatus::Found(1) => write!(f, "Found 1 package."),
            SearchStatus::Found(n) => write!(f, "Found {} packages.", n),
            SearchStatus::NoneFound => write!(f, "No packages found."),
            SearchStatus::Unavailable(reason) => write!(f, "Search unavailable: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResults {
    pub packages: Vec<RemotePackage>,
    pub status: SearchStatus,
}

impl SearchResults {
    fn found(packages: Vec<RemotePackage>) -> Self {
        let status = if packages.is_empty() {
            SearchStatus::NoneFound
        } else {
            SearchStatus::Found(packages.len())
        };
        Self { packages, status }
    }

    fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            packages: Vec::new(),
            status: SearchStatus::Unavailable(reason.into()),
        }
    }
}

/// Trait for package indexes.
///
/// Implementations make a single attempt per call; there is no retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PackageIndex: Send + Sync {
    /// Base URL of the index (no trailing slash).
    fn base_url(&self) -> &str;

    /// Fetch the JSON metadata of one project.
    async fn project(&self, name: &str) -> Result<ProjectMetadata>;

    /// Fetch the JSON metadata of one release of a project. Its dependencies
    /// are the ones declared by that release; its version list may be empty.
    async fn release(&self, name: &str, version: &str) -> Result<ProjectMetadata>;

    /// Run a search through the HTML search page.
    async fn search_page(&self, term: &str) -> Result<Vec<RemotePackage>>;
}

/// Resolves a search term to candidate packages.
///
/// Index failures degrade to an empty result with an
/// [`Unavailable`](SearchStatus::Unavailable) status. Only an empty term is
/// rejected, as an input error.
#[tracing::instrument(skip(index))]
pub async fn search_remote(
    index: &dyn PackageIndex,
    term: &str,
    strategy: SearchStrategy,
) -> Result<SearchResults> {
    let term = term.trim();
    if term.is_empty() {
        return Err(Error::input("Please enter a package name."));
    }

    let results = match strategy {
        SearchStrategy::Exact => match index.project(term).await {
            Ok(meta) => SearchResults::found(vec![meta.to_remote()]),
            Err(e) if e.is_not_found() => SearchResults::found(Vec::new()),
            Err(e) => SearchResults::unavailable(e.to_string()),
        },
        SearchStrategy::Scrape => match index.search_page(term).await {
            Ok(packages) => SearchResults::found(packages),
            Err(e) => SearchResults::unavailable(e.to_string()),
        },
    };

    info!("Search for {:?} ({}): {}", term, strategy, results.status);
    Ok(results)
}

/// Available versions of a project, newest first.
pub async fn get_versions(index: &dyn PackageIndex, name: &str) -> Result<Vec<String>> {
    Ok(index.project(name).await?.versions)
}

/// Raw requirement strings declared by a project. Empty when it declares none.
pub async fn get_dependencies(index: &dyn PackageIndex, name: &str) -> Result<Vec<String>> {
    Ok(index.project(name).await?.dependencies)
}

/// Fetches the dependency lists of several projects concurrently.
///
/// Results keep the order of `names`; each entry succeeds or fails on its own.
pub async fn dependency_fan_out(
    index: &dyn PackageIndex,
    names: &[String],
) -> Vec<(String, Result<Vec<String>>)> {
    debug!("Fetching dependencies of {} project(s)", names.len());
    let fetches = names.iter().map(|name| async move {
        let deps = get_dependencies(index, name).await;
        (name.clone(), deps)
    });
    join_all(fetches).await
}
