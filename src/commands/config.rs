use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::debug;
use reqwest::Client;

use crate::{
    http::HttpClient,
    index::{DEFAULT_INDEX_URL, PyPiIndex},
    pip::{DEFAULT_PIP, PipLauncher},
    process::TokioProcessRunner,
    runtime::Runtime,
    session::Session,
    status::StatusReporter,
    tasks::TaskQueue,
};

/// Index requests give up after this long.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// pip is killed after this long unless configured otherwise.
pub const DEFAULT_PIP_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_JOBS: usize = 4;

/// Settings gathered from flags and environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigOptions {
    pub index_url: String,
    pub pip: String,
    /// Seconds; 0 disables the timeout.
    pub timeout_secs: u64,
    pub jobs: usize,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            index_url: DEFAULT_INDEX_URL.to_string(),
            pip: DEFAULT_PIP.to_string(),
            timeout_secs: DEFAULT_PIP_TIMEOUT_SECS,
            jobs: DEFAULT_JOBS,
        }
    }
}

pub struct Config<R: Runtime> {
    pub runtime: R,
    pub index: PyPiIndex,
    pub runner: TokioProcessRunner,
    pub launcher: PipLauncher,
    pub jobs: usize,
}

impl<R: Runtime> Config<R> {
    pub fn new(runtime: R, options: &ConfigOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent())
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        let index_url = options.index_url.trim();
        anyhow::ensure!(!index_url.is_empty(), "The index URL must not be empty.");
        let index = PyPiIndex::from_http_client(HttpClient::new(client), index_url);

        let launcher = PipLauncher::parse(&options.pip)?;
        let timeout = (options.timeout_secs > 0).then(|| Duration::from_secs(options.timeout_secs));
        let runner = TokioProcessRunner::new(timeout);

        debug!(
            "Using index {}, pip launcher {:?}, timeout {:?}, {} job(s)",
            index_url, options.pip, timeout, options.jobs
        );

        Ok(Self {
            runtime,
            index,
            runner,
            launcher,
            jobs: options.jobs.max(1),
        })
    }

    pub fn into_session(self, reporter: Arc<dyn StatusReporter>) -> Session<R> {
        Session::new(
            self.runtime,
            Arc::new(self.index),
            Arc::new(self.runner),
            self.launcher,
            TaskQueue::new(self.jobs),
            reporter,
        )
    }
}

fn user_agent() -> String {
    format!("pipsearch/{}", env!("PIPSEARCH_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::PackageIndex;
    use crate::runtime::MockRuntime;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn test_config_sends_user_agent() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/pypi/six/json")
            .match_header("user-agent", Matcher::Regex("^pipsearch/".to_string()))
            .with_status(200)
            .with_body(r#"{"info": {"name": "six"}, "releases": {}}"#)
            .create_async()
            .await;

        let options = ConfigOptions {
            index_url: format!("{}/", server.url()),
            ..Default::default()
        };
        let config = Config::new(MockRuntime::new(), &options).unwrap();
        assert_eq!(config.index.base_url(), server.url());

        config.index.project("six").await.unwrap();
        mock.assert_async().await;
    }

    #[test]
    fn test_config_launcher_and_jobs() {
        let options = ConfigOptions {
            pip: "python3 -m pip".into(),
            jobs: 0,
            ..Default::default()
        };
        let config = Config::new(MockRuntime::new(), &options).unwrap();
        assert_eq!(config.launcher, PipLauncher::parse("python3 -m pip").unwrap());
        assert_eq!(config.jobs, 1);
        assert_eq!(
            config.runner.timeout(),
            Some(Duration::from_secs(DEFAULT_PIP_TIMEOUT_SECS))
        );
    }

    #[test]
    fn test_zero_timeout_disables_it() {
        let options = ConfigOptions {
            timeout_secs: 0,
            ..Default::default()
        };
        let config = Config::new(MockRuntime::new(), &options).unwrap();
        assert_eq!(config.runner.timeout(), None);
    }

    #[test]
    fn test_empty_pip_is_rejected() {
        let options = ConfigOptions {
            pip: "  ".into(),
            ..Default::default()
        };
        assert!(Config::new(MockRuntime::new(), &options).is_err());
    }
}
