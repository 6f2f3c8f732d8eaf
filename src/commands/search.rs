use std::collections::HashSet;

use anyhow::Result;
use log::debug;

use crate::{
    index::SearchStrategy,
    package::{RemotePackage, normalize_name, requirement_name},
    runtime::Runtime,
    session::Session,
};

/// Search the package index
#[tracing::instrument(skip(session))]
pub async fn search<R: Runtime>(
    session: &Session<R>,
    term: &str,
    strategy: SearchStrategy,
) -> Result<()> {
    for hit in session.search(term, strategy).await {
        print_hit(&hit);
    }
    Ok(())
}

/// Print available versions, newest first
#[tracing::instrument(skip(session))]
pub async fn versions<R: Runtime>(session: &Session<R>, name: &str) -> Result<()> {
    for version in session.versions(name).await {
        println!("{}", version);
    }
    Ok(())
}

/// Print declared dependencies of one or more packages.
///
/// With `search_each`, every dependency's distribution name is looked up
/// on the index as an exact search.
#[tracing::instrument(skip(session))]
pub async fn deps<R: Runtime>(session: &Session<R>, names: &[String], search_each: bool) -> Result<()> {
    let generation = session.generation();
    let lists = match names {
        [single] => vec![(single.clone(), Some(session.dependencies(single).await))],
        _ => session.dependency_lists(names).await,
    };
    let grouped = lists.len() > 1;

    for (name, deps) in lists {
        let Some(deps) = deps else { continue };
        if grouped {
            println!("{}:", name);
        }
        for requirement in &deps {
            if grouped {
                println!("  {}", requirement);
            } else {
                println!("{}", requirement);
            }
        }
        if search_each {
            search_dependencies(session, &deps, generation).await;
        }
    }
    Ok(())
}

/// Looks up each dependency in turn, stopping once the session has been
/// cancelled after `generation`.
async fn search_dependencies<R: Runtime>(
    session: &Session<R>,
    requirements: &[String],
    generation: u64,
) {
    let mut seen = HashSet::new();
    for requirement in requirements {
        if session.cancelled_since(generation) {
            debug!("Dependency lookups cancelled");
            return;
        }
        let name = requirement_name(requirement);
        if name.is_empty() || !seen.insert(normalize_name(name)) {
            continue;
        }
        debug!("Looking up dependency {}", name);
        for hit in session.search(name, SearchStrategy::Exact).await {
            print_hit(&hit);
        }
    }
}

fn print_hit(hit: &RemotePackage) {
    println!("{} - {}", hit.name, hit.summary);
    println!("    {}", hit.detail_url);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::index::MockPackageIndex;
    use crate::package::ProjectMetadata;
    use crate::pip::PipLauncher;
    use crate::process::MockProcessRunner;
    use crate::runtime::MockRuntime;
    use crate::status::MemoryReporter;
    use crate::tasks::TaskQueue;

    fn counting_session(lookups: Arc<AtomicUsize>) -> Session<MockRuntime> {
        let mut index = MockPackageIndex::new();
        index.expect_project().returning(move |name| {
            lookups.fetch_add(1, Ordering::SeqCst);
            Ok(ProjectMetadata {
                name: name.to_string(),
                summary: None,
                detail_url: format!("https://pypi.org/project/{}/", name),
                versions: Vec::new(),
                dependencies: Vec::new(),
            })
        });
        Session::new(
            MockRuntime::new(),
            Arc::new(index),
            Arc::new(MockProcessRunner::new()),
            PipLauncher::default(),
            TaskQueue::new(2),
            Arc::new(MemoryReporter::new()),
        )
    }

    fn requirements() -> Vec<String> {
        vec![
            "Werkzeug>=3.0".to_string(),
            "click>=8.1".to_string(),
            "Click[extra]>=8.1".to_string(),
        ]
    }

    #[tokio::test]
    async fn test_search_dependencies_looks_up_each_name_once() {
        let lookups = Arc::new(AtomicUsize::new(0));
        let session = counting_session(Arc::clone(&lookups));

        search_dependencies(&session, &requirements(), session.generation()).await;

        assert_eq!(lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_search_dependencies_stops_after_cancel() {
        let lookups = Arc::new(AtomicUsize::new(0));
        let session = counting_session(Arc::clone(&lookups));

        let generation = session.generation();
        session.cancel_all();
        search_dependencies(&session, &requirements(), generation).await;

        assert_eq!(lookups.load(Ordering::SeqCst), 0);
    }
}
