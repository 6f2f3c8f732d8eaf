//! PyPI implementation of [`PackageIndex`].

use async_trait::async_trait;
use log::debug;
#[cfg(test)]
use reqwest::Client;
use reqwest::Url;

use super::{PackageIndex, search_page};
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::package::{ProjectMetadata, RemotePackage, sort_versions_desc};

/// Default package index.
pub const DEFAULT_INDEX_URL: &str = "https://pypi.org";

/// PyPI JSON API response types (internal).
mod api {
    use std::collections::BTreeMap;

    use serde::Deserialize;

    #[derive(Deserialize, Debug)]
    pub struct Project {
        pub info: Info,
        /// Version -> release files. Only the keys matter here.
        #[serde(default)]
        pub releases: BTreeMap<String, serde_json::Value>,
    }

    #[derive(Deserialize, Debug)]
    pub struct Info {
        pub name: String,
        #[serde(default)]
        pub summary: Option<String>,
        /// `null` for projects that declare no dependencies.
        #[serde(default)]
        pub requires_dist: Option<Vec<String>>,
        #[serde(default)]
        pub package_url: Option<String>,
        #[serde(default)]
        pub project_url: Option<String>,
    }
}

pub struct PyPiIndex {
    http_client: HttpClient,
    base_url: String,
}

impl PyPiIndex {
    /// Create an index client against pypi.org.
    /// Used primarily for testing.
    #[cfg(test)]
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, DEFAULT_INDEX_URL)
    }

    /// Create an index client against a custom base URL.
    /// Used primarily for testing.
    #[cfg(test)]
    pub fn with_base_url(client: Client, base_url: &str) -> Self {
        Self::from_http_client(HttpClient::new(client), base_url)
    }

    /// Create from an existing HttpClient.
    pub fn from_http_client(http_client: HttpClient, base_url: &str) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// `{base}/pypi/{segments...}/json`, each segment percent-encoded so a
    /// name can never reach into the query or fragment.
    fn api_url(&self, segments: &[&str]) -> Result<String> {
        let invalid = || Error::input(format!("Invalid index URL: {}", self.base_url));
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .push("pypi")
            .extend(segments.iter().map(|s| s.trim()))
            .push("json");
        Ok(url.to_string())
    }

    fn detail_url(&self, name: &str) -> String {
        format!("{}/project/{}/", self.base_url, name)
    }

    fn into_metadata(&self, project: api::Project) -> ProjectMetadata {
        let mut versions: Vec<String> = project.releases.into_keys().collect();
        sort_versions_desc(&mut versions);

        let detail_url = project
            .info
            .package_url
            .or(project.info.project_url)
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| self.detail_url(&project.info.name));

        ProjectMetadata {
            detail_url,
            name: project.info.name,
            summary: project.info.summary,
            versions,
            dependencies: project.info.requires_dist.unwrap_or_default(),
        }
    }
}

#[async_trait]
impl PackageIndex for PyPiIndex {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn project(&self, name: &str) -> Result<ProjectMetadata> {
        let url = self.api_url(&[name])?;
        debug!("Fetching project metadata from {}...", url);
        let project: api::Project = self.http_client.get_json(&url).await?;
        Ok(self.into_metadata(project))
    }

    async fn release(&self, name: &str, version: &str) -> Result<ProjectMetadata> {
        let url = self.api_url(&[name, version])?;
        debug!("Fetching release metadata from {}...", url);
        let project: api::Project = self.http_client.get_json(&url).await?;
        Ok(self.into_metadata(project))
    }

    async fn search_page(&self, term: &str) -> Result<Vec<RemotePackage>> {
        let url = format!("{}/pypi", self.base_url);
        debug!("Searching {} for {:?}...", url, term);
        let html = self
            .http_client
            .get_text_with_query(
                &url,
                &[(":action", "search"), ("term", term), ("submit", "search")],
            )
            .await?;
        search_page::parse_search_results(&html, &self.base_url)
    }
}
