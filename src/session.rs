//! Interactive session.
//!
//! A [`Session`] is what a front end talks to. Every long-running operation
//! is dispatched onto the session's [`TaskQueue`], every failure becomes a
//! [`Status`] on the session's reporter, and the results of the latest
//! operations are kept in an immutable [`SessionState`] snapshot.

use std::future::Future;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::imports::{self, ImportSet};
use crate::index::{self, PackageIndex, SearchStatus, SearchStrategy};
use crate::package::{InstalledPackage, ProjectMetadata, RemotePackage};
use crate::pip::{self, InstallRequest, Installer, Inventory, Outcome, PipLauncher};
use crate::process::ProcessRunner;
use crate::runtime::Runtime;
use crate::status::{Status, StatusReporter};
use crate::tasks::{TaskQueue, TaskResult};

/// Results of the most recent operations. Replaced wholesale, never mutated
/// while shared.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub inventory: Option<Inventory>,
    pub hits: Vec<RemotePackage>,
    pub metadata: Option<ProjectMetadata>,
    pub imports: Option<ImportSet>,
}

pub struct Session<R: Runtime> {
    runtime: R,
    index: Arc<dyn PackageIndex>,
    runner: Arc<dyn ProcessRunner>,
    installer: Installer,
    queue: TaskQueue,
    reporter: Arc<dyn StatusReporter>,
    state: RwLock<Arc<SessionState>>,
}

impl<R: Runtime> Session<R> {
    pub fn new(
        runtime: R,
        index: Arc<dyn PackageIndex>,
        runner: Arc<dyn ProcessRunner>,
        launcher: PipLauncher,
        queue: TaskQueue,
        reporter: Arc<dyn StatusReporter>,
    ) -> Self {
        let installer = Installer::new(Arc::clone(&runner), launcher);
        Self {
            runtime,
            index,
            runner,
            installer,
            queue,
            reporter,
            state: RwLock::new(Arc::new(SessionState::default())),
        }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Current state snapshot. Cheap; later operations never change it.
    pub fn snapshot(&self) -> Arc<SessionState> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&state)
    }

    /// Operations queued or running.
    pub fn in_flight(&self) -> usize {
        self.queue.in_flight()
    }

    /// Changes every time [`cancel_all`](Self::cancel_all) is called.
    pub fn generation(&self) -> u64 {
        self.queue.generation()
    }

    /// True when [`cancel_all`](Self::cancel_all) was called after `generation`
    /// was read.
    pub fn cancelled_since(&self, generation: u64) -> bool {
        self.queue.generation() != generation
    }

    /// Cancels every queued or running operation; running pip processes are killed.
    pub fn cancel_all(&self) {
        self.queue.cancel_all();
        self.report(Status::warning("Cancelled all running operations."));
    }

    // --- Installed packages ---

    /// Lists installed packages afresh and stores the inventory.
    pub async fn refresh_inventory(&self) -> Option<Inventory> {
        let runner = Arc::clone(&self.runner);
        let launcher = self.installer.launcher().clone();
        let result = self
            .dispatch("Listing installed packages", async move {
                pip::list_installed(runner.as_ref(), &launcher).await
            })
            .await?;

        match result {
            Ok(inventory) => {
                self.report(Status::info(format!(
                    "{} installed package(s).",
                    inventory.len()
                )));
                self.update(|state| state.inventory = Some(inventory.clone()));
                Some(inventory)
            }
            Err(e) => {
                self.report_error(&e);
                None
            }
        }
    }

    /// Installed record for `name`, listing packages first when nothing is
    /// stored yet.
    pub async fn find_installed(&self, name: &str) -> Option<InstalledPackage> {
        let inventory = self.inventory().await?;
        let found = inventory.find(name).cloned();
        if found.is_none() {
            self.report(Status::error(format!("{} is not installed.", name.trim())));
        }
        found
    }

    /// Installed names containing `substring`, ignoring case.
    pub async fn search_installed(&self, substring: &str) -> Vec<String> {
        let Some(inventory) = self.inventory().await else {
            return Vec::new();
        };
        let names = inventory.search(substring.trim());
        if names.is_empty() {
            self.report(Status::info(format!(
                "No installed packages match {}.",
                substring.trim()
            )));
        } else {
            self.report(Status::info(format!("{} match(es).", names.len())));
        }
        names
    }

    async fn inventory(&self) -> Option<Inventory> {
        let stored = self.snapshot().inventory.clone();
        match stored {
            Some(inventory) => Some(inventory),
            None => self.refresh_inventory().await,
        }
    }

    // --- Package index ---

    /// Searches the index. Zero hits or an unreachable index leave an empty
    /// list and a status, never an error.
    pub async fn search(&self, term: &str, strategy: SearchStrategy) -> Vec<RemotePackage> {
        let index = Arc::clone(&self.index);
        let term = term.to_string();
        let Some(result) = self
            .dispatch("Search", async move {
                index::search_remote(index.as_ref(), &term, strategy).await
            })
            .await
        else {
            return Vec::new();
        };

        match result {
            Ok(results) => {
                let status = match &results.status {
                    SearchStatus::Unavailable(_) => Status::warning(results.status.to_string()),
                    other => Status::info(other.to_string()),
                };
                self.report(status);
                self.update(|state| state.hits = results.packages.clone());
                results.packages
            }
            Err(e) => {
                self.report_error(&e);
                Vec::new()
            }
        }
    }

    /// Versions and dependencies of one project, from a single fetch.
    pub async fn metadata(&self, name: &str) -> Option<ProjectMetadata> {
        self.fetch_metadata(name, None).await
    }

    /// Metadata of one release, or of the latest when `version` is `None`.
    async fn fetch_metadata(&self, name: &str, version: Option<&str>) -> Option<ProjectMetadata> {
        let name = name.trim().to_string();
        if name.is_empty() {
            self.report_error(&Error::input("Please select a package."));
            return None;
        }

        let index = Arc::clone(&self.index);
        let fetch_name = name.clone();
        let fetch_version = version.map(str::to_string);
        let result = self
            .dispatch("Fetching package information", async move {
                match fetch_version {
                    Some(version) => index.release(&fetch_name, &version).await,
                    None => index.project(&fetch_name).await,
                }
            })
            .await?;

        match result {
            Ok(meta) => {
                self.update(|state| state.metadata = Some(meta.clone()));
                Some(meta)
            }
            Err(e) => {
                let label = match version {
                    Some(version) => format!("{}=={}", name, version),
                    None => name,
                };
                self.report(Status::error(format!(
                    "Information for {} unavailable: {}",
                    label, e
                )));
                None
            }
        }
    }

    /// Available versions, newest first. Empty when unavailable.
    pub async fn versions(&self, name: &str) -> Vec<String> {
        let Some(meta) = self.metadata(name).await else {
            return Vec::new();
        };
        if meta.versions.is_empty() {
            self.report(Status::info(format!("{} has no released versions.", meta.name)));
        }
        meta.versions
    }

    /// Declared requirement strings. Empty when there are none or when unavailable.
    pub async fn dependencies(&self, name: &str) -> Vec<String> {
        self.release_dependencies(name, None).await
    }

    /// Requirement strings declared by one release; the latest when `version`
    /// is `None`.
    pub async fn release_dependencies(&self, name: &str, version: Option<&str>) -> Vec<String> {
        let Some(meta) = self.fetch_metadata(name, version).await else {
            return Vec::new();
        };
        if meta.dependencies.is_empty() {
            self.report(Status::info(format!("{} declares no dependencies.", meta.name)));
        }
        meta.dependencies
    }

    /// Dependency lists of several projects, fetched concurrently.
    ///
    /// Entries keep the order of `names`; a failed fetch is `None` and reported.
    pub async fn dependency_lists(&self, names: &[String]) -> Vec<(String, Option<Vec<String>>)> {
        let index = Arc::clone(&self.index);
        let fetch: Vec<String> = names.to_vec();
        let Some(results) = self
            .dispatch("Fetching dependencies", async move {
                Ok::<_, Error>(index::dependency_fan_out(index.as_ref(), &fetch).await)
            })
            .await
            .and_then(Result::ok)
        else {
            return names.iter().map(|n| (n.clone(), None)).collect();
        };

        results
            .into_iter()
            .map(|(name, deps)| match deps {
                Ok(deps) => (name, Some(deps)),
                Err(e) => {
                    self.report(Status::error(format!(
                        "Dependencies of {} unavailable: {}",
                        name, e
                    )));
                    (name, None)
                }
            })
            .collect()
    }

    // --- Local source files ---

    /// Scans a Python file for imported modules.
    pub fn scan_imports(&self, path: &Path) -> Option<ImportSet> {
        match imports::scan_imports(&self.runtime, path) {
            Ok(found) => {
                self.report(Status::info(format!(
                    "{} module(s) imported by {}.",
                    found.len(),
                    path.display()
                )));
                self.update(|state| state.imports = Some(found.clone()));
                Some(found)
            }
            Err(e) => {
                self.report_error(&e);
                None
            }
        }
    }

    // --- pip ---

    pub async fn install(&self, request: InstallRequest) -> Option<Outcome> {
        if let Some(dir) = &request.target {
            if let Err(e) = pip::prepare_target(&self.runtime, dir) {
                self.report_error(&e);
                return None;
            }
        }

        let installer = self.installer.clone();
        let result = self
            .dispatch("Install", async move { installer.install(&request).await })
            .await?;
        self.finish(result)
    }

    pub async fn reinstall(&self, name: &str) -> Option<Outcome> {
        self.install(InstallRequest::new(name).force_reinstall())
            .await
    }

    pub async fn uninstall(&self, name: &str) -> Option<Outcome> {
        let installer = self.installer.clone();
        let name = name.to_string();
        let result = self
            .dispatch("Uninstall", async move { installer.uninstall(&name).await })
            .await?;
        self.finish(result)
    }

    /// Installs each name independently; outcomes follow the order of `names`.
    pub async fn install_all(&self, names: &[String], target: Option<&Path>) -> Vec<Outcome> {
        if names.is_empty() {
            self.report(Status::info("Nothing to install."));
            return Vec::new();
        }
        if let Some(dir) = target {
            if let Err(e) = pip::prepare_target(&self.runtime, dir) {
                self.report_error(&e);
                return Vec::new();
            }
        }

        let outcomes = self.installer.install_all(&self.queue, names, target).await;
        for outcome in &outcomes {
            self.report_outcome(outcome);
        }
        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        let summary = format!(
            "{} of {} installation(s) succeeded.",
            outcomes.len() - failed,
            outcomes.len()
        );
        self.report(if failed == 0 {
            Status::info(summary)
        } else {
            Status::warning(summary)
        });
        self.invalidate_inventory();
        outcomes
    }

    /// Installs a package, then every requirement it declares.
    ///
    /// The first outcome is the package itself. Dependencies are only
    /// attempted when it installed successfully, and are the ones declared by
    /// the pinned version when there is one.
    pub async fn install_with_dependencies(&self, request: InstallRequest) -> Vec<Outcome> {
        let name = request.name.clone();
        let version = request.version.clone();
        let target = request.target.clone();
        let Some(first) = self.install(request).await else {
            return Vec::new();
        };
        if !first.is_success() {
            return vec![first];
        }

        let deps = self.release_dependencies(&name, version.as_deref()).await;
        let mut outcomes = vec![first];
        if !deps.is_empty() {
            debug!("Installing {} declared dependencies of {}", deps.len(), name);
            outcomes.extend(self.install_all(&deps, target.as_deref()).await);
        }
        outcomes
    }

    // --- internals ---

    /// Runs `task` on the queue. `None` when it was cancelled or panicked;
    /// both are reported here.
    async fn dispatch<T, F>(&self, label: &str, task: F) -> Option<Result<T>>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        match self.queue.spawn(task).join().await {
            TaskResult::Completed(result) => Some(result),
            TaskResult::Cancelled => {
                self.report(Status::warning(format!("{} cancelled.", label)));
                None
            }
            TaskResult::Panicked(message) => {
                warn!("{} panicked: {}", label, message);
                self.report(Status::error(format!("{} failed unexpectedly.", label)));
                None
            }
        }
    }

    fn finish(&self, result: Result<Outcome>) -> Option<Outcome> {
        match result {
            Ok(outcome) => {
                self.report_outcome(&outcome);
                self.invalidate_inventory();
                Some(outcome)
            }
            Err(e) => {
                self.report_error(&e);
                None
            }
        }
    }

    fn report_outcome(&self, outcome: &Outcome) {
        if outcome.is_success() {
            self.report(Status::info(outcome.message()));
        } else if outcome.output.trim().is_empty() {
            self.report(Status::error(outcome.message()));
        } else {
            self.report(Status::error(format!(
                "{}\n{}",
                outcome.message(),
                outcome.output.trim_end()
            )));
        }
    }

    /// Installs and uninstalls are only observed by listing again.
    fn invalidate_inventory(&self) {
        self.update(|state| state.inventory = None);
    }

    fn update(&self, change: impl FnOnce(&mut SessionState)) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = SessionState::clone(&guard);
        change(&mut next);
        *guard = Arc::new(next);
    }

    fn report(&self, status: Status) {
        self.reporter.report(status);
    }

    fn report_error(&self, error: &Error) {
        self.reporter.report(Status::from(error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NetworkErrorKind;
    use crate::index::MockPackageIndex;
    use crate::pip::OutcomeStatus;
    use crate::process::{MockProcessRunner, ProcessOutput};
    use crate::runtime::MockRuntime;
    use crate::status::MemoryReporter;
    use mockall::predicate::eq;

    const PIP_LIST: &str = r#"[
        {"name": "requests", "version": "2.31.0", "location": "/venv/site-packages"},
        {"name": "urllib3", "version": "2.1.0", "location": "/venv/site-packages"}
    ]"#;

    fn ok(stdout: &str) -> ProcessOutput {
        ProcessOutput {
            exit_code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    fn meta(name: &str, deps: &[&str]) -> ProjectMetadata {
        ProjectMetadata {
            name: name.to_string(),
            summary: None,
            detail_url: format!("https://pypi.org/project/{}/", name),
            versions: vec!["2.0".into(), "1.0".into()],
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
        }
    }

    fn session(
        runtime: MockRuntime,
        index: MockPackageIndex,
        runner: MockProcessRunner,
    ) -> (Session<MockRuntime>, Arc<MemoryReporter>) {
        let reporter = Arc::new(MemoryReporter::new());
        let session = Session::new(
            runtime,
            Arc::new(index),
            Arc::new(runner),
            PipLauncher::default(),
            TaskQueue::new(2),
            reporter.clone(),
        );
        (session, reporter)
    }

    #[test_log::test(tokio::test)]
    async fn test_inventory_is_cached_until_a_mutation() {
        let mut runner = MockProcessRunner::new();
        runner
            .expect_run()
            .withf(|cmd| cmd.has_arg("list"))
            .times(2)
            .returning(|_| Ok(ok(PIP_LIST)));
        runner
            .expect_run()
            .withf(|cmd| cmd.has_arg("uninstall"))
            .times(1)
            .returning(|_| Ok(ok("")));

        let (session, _) = session(MockRuntime::new(), MockPackageIndex::new(), runner);

        assert_eq!(session.search_installed("URL").await, vec!["urllib3"]);
        assert!(session.find_installed("Requests").await.is_some());
        session.uninstall("urllib3").await.unwrap();
        assert!(session.snapshot().inventory.is_none());
        // Listed again after the uninstall.
        assert!(session.find_installed("requests").await.is_some());
    }

    #[tokio::test]
    async fn test_find_missing_package_reports_error() {
        let mut runner = MockProcessRunner::new();
        runner.expect_run().returning(|_| Ok(ok(PIP_LIST)));

        let (session, reporter) = session(MockRuntime::new(), MockPackageIndex::new(), runner);

        assert!(session.find_installed("numpy").await.is_none());
        assert_eq!(reporter.last(), Some(Status::error("numpy is not installed.")));
    }

    #[tokio::test]
    async fn test_search_zero_hits_is_info() {
        let mut index = MockPackageIndex::new();
        index.expect_search_page().returning(|_| Ok(Vec::new()));

        let (session, reporter) = session(MockRuntime::new(), index, MockProcessRunner::new());

        let hits = session.search("zzzz", SearchStrategy::Scrape).await;
        assert!(hits.is_empty());
        assert_eq!(reporter.last(), Some(Status::info("No packages found.")));
    }

    #[tokio::test]
    async fn test_search_stores_hits() {
        let mut index = MockPackageIndex::new();
        index
            .expect_project()
            .returning(|_| Ok(meta("flask", &[])));

        let (session, _) = session(MockRuntime::new(), index, MockProcessRunner::new());

        let hits = session.search("flask", SearchStrategy::Exact).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(session.snapshot().hits, hits);
    }

    #[tokio::test]
    async fn test_empty_search_term_is_reported() {
        let (session, reporter) =
            session(MockRuntime::new(), MockPackageIndex::new(), MockProcessRunner::new());

        assert!(session.search("  ", SearchStrategy::Scrape).await.is_empty());
        assert!(reporter.last().unwrap().is_error());
    }

    #[tokio::test]
    async fn test_metadata_unavailable_is_status() {
        let mut index = MockPackageIndex::new();
        index.expect_project().returning(|_| {
            Err(Error::network(NetworkErrorKind::Server(502), "Package index error"))
        });

        let (session, reporter) = session(MockRuntime::new(), index, MockProcessRunner::new());

        assert!(session.versions("flask").await.is_empty());
        let last = reporter.last().unwrap();
        assert!(last.is_error());
        assert!(last.message().contains("unavailable"));
    }

    #[tokio::test]
    async fn test_dependency_lists_keep_order() {
        let mut index = MockPackageIndex::new();
        index
            .expect_project()
            .returning(|name| match name {
                "b" => Err(Error::network(NetworkErrorKind::NotFound, "Not found")),
                other => Ok(meta(other, &["dep"])),
            });

        let (session, _) = session(MockRuntime::new(), index, MockProcessRunner::new());

        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let lists = session.dependency_lists(&names).await;
        assert_eq!(lists[0], ("a".to_string(), Some(vec!["dep".to_string()])));
        assert_eq!(lists[1], ("b".to_string(), None));
        assert_eq!(lists[2].0, "c");
    }

    #[tokio::test]
    async fn test_install_creates_target_dir() {
        let mut runtime = MockRuntime::new();
        runtime.expect_is_dir().returning(|_| false);
        runtime.expect_exists().returning(|_| false);
        runtime
            .expect_create_dir_all()
            .times(1)
            .returning(|_| Ok(()));

        let mut runner = MockProcessRunner::new();
        runner
            .expect_run()
            .withf(|cmd| cmd.has_arg("--target") && cmd.has_arg("/tmp/libs"))
            .returning(|_| Ok(ok("")));

        let (session, _) = session(runtime, MockPackageIndex::new(), runner);

        let outcome = session
            .install(InstallRequest::new("six").target("/tmp/libs"))
            .await
            .unwrap();
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_install_failure_reports_output() {
        let mut runner = MockProcessRunner::new();
        runner.expect_run().returning(|_| {
            Ok(ProcessOutput {
                exit_code: Some(1),
                stdout: String::new(),
                stderr: "ERROR: nope".into(),
            })
        });

        let (session, reporter) = session(MockRuntime::new(), MockPackageIndex::new(), runner);

        let outcome = session.install(InstallRequest::new("nope")).await.unwrap();
        assert!(!outcome.is_success());
        let last = reporter.last().unwrap();
        assert!(last.is_error());
        assert!(last.message().contains("ERROR: nope"));
    }

    #[test_log::test(tokio::test)]
    async fn test_install_with_dependencies() {
        let mut index = MockPackageIndex::new();
        index
            .expect_project()
            .returning(|_| Ok(meta("flask", &["Werkzeug>=3.0", "click>=8.1"])));

        let mut runner = MockProcessRunner::new();
        runner.expect_run().times(3).returning(|_| Ok(ok("")));

        let (session, _) = session(MockRuntime::new(), index, runner);

        let outcomes = session
            .install_with_dependencies(InstallRequest::new("flask"))
            .await;
        let packages: Vec<_> = outcomes.iter().map(|o| o.package.as_str()).collect();
        assert_eq!(packages, vec!["flask", "Werkzeug>=3.0", "click>=8.1"]);
    }

    #[tokio::test]
    async fn test_install_with_dependencies_of_pinned_version() {
        let mut index = MockPackageIndex::new();
        index
            .expect_release()
            .with(eq("flask"), eq("2.0.0"))
            .times(1)
            .returning(|_, _| Ok(meta("flask", &["Werkzeug>=2.0"])));
        index.expect_project().times(0);

        let mut runner = MockProcessRunner::new();
        runner.expect_run().times(2).returning(|_| Ok(ok("")));

        let (session, _) = session(MockRuntime::new(), index, runner);

        let outcomes = session
            .install_with_dependencies(InstallRequest::new("flask").version("2.0.0"))
            .await;
        let packages: Vec<_> = outcomes.iter().map(|o| o.package.as_str()).collect();
        assert_eq!(packages, vec!["flask==2.0.0", "Werkzeug>=2.0"]);
    }

    #[tokio::test]
    async fn test_pinned_release_unavailable_names_version() {
        let mut index = MockPackageIndex::new();
        index
            .expect_release()
            .returning(|_, _| Err(Error::network(NetworkErrorKind::NotFound, "Not found")));

        let (session, reporter) = session(MockRuntime::new(), index, MockProcessRunner::new());

        assert!(session.release_dependencies("flask", Some("9.9")).await.is_empty());
        assert!(reporter.last().unwrap().message().contains("flask==9.9 unavailable"));
    }

    #[tokio::test]
    async fn test_install_with_dependencies_stops_on_failure() {
        let mut runner = MockProcessRunner::new();
        runner.expect_run().times(1).returning(|_| {
            Ok(ProcessOutput {
                exit_code: Some(1),
                ..Default::default()
            })
        });

        // No metadata fetch happens.
        let (session, _) = session(MockRuntime::new(), MockPackageIndex::new(), runner);

        let outcomes = session
            .install_with_dependencies(InstallRequest::new("flask"))
            .await;
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].is_success());
    }

    #[test]
    fn test_scan_imports_parse_error_is_reported() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_read_to_string()
            .returning(|_| Ok("def broken(:\n".into()));

        let (session, reporter) = session(runtime, MockPackageIndex::new(), MockProcessRunner::new());

        assert!(session.scan_imports(Path::new("bad.py")).is_none());
        assert!(reporter.last().unwrap().message().contains("Parse error"));
    }

    #[test]
    fn test_cancelled_since() {
        let (session, _) =
            session(MockRuntime::new(), MockPackageIndex::new(), MockProcessRunner::new());

        let generation = session.generation();
        assert!(!session.cancelled_since(generation));
        session.cancel_all();
        assert!(session.cancelled_since(generation));
        assert!(!session.cancelled_since(session.generation()));
    }

    #[tokio::test]
    async fn test_cancel_all_leaves_later_operations_alone() {
        let mut runner = MockProcessRunner::new();
        runner.expect_run().returning(|_| Ok(ok("")));

        let (session, reporter) = session(MockRuntime::new(), MockPackageIndex::new(), runner);

        session.cancel_all();
        assert!(matches!(reporter.last(), Some(Status::Warning(_))));

        let outcome = session.install(InstallRequest::new("six")).await.unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Success);
        assert_eq!(session.in_flight(), 0);
    }
}
