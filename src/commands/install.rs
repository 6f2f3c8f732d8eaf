use std::path::{Path, PathBuf};

use anyhow::Result;
use log::{debug, info};

use crate::{
    imports,
    pip::{InstallRequest, Outcome},
    runtime::Runtime,
    session::Session,
};

/// Install a package, optionally followed by its declared dependencies
#[tracing::instrument(skip(session))]
pub async fn install<R: Runtime>(
    session: &Session<R>,
    name: &str,
    version: Option<String>,
    target: Option<PathBuf>,
    with_deps: bool,
) -> Result<()> {
    let mut request = InstallRequest::new(name);
    if let Some(version) = version {
        request = request.version(version);
    }
    if let Some(target) = target {
        request = request.target(target);
    }

    if with_deps {
        for outcome in session.install_with_dependencies(request).await {
            print_output(&outcome);
        }
    } else if let Some(outcome) = session.install(request).await {
        print_output(&outcome);
    }
    Ok(())
}

/// Force a reinstall of a package
#[tracing::instrument(skip(session))]
pub async fn reinstall<R: Runtime>(session: &Session<R>, name: &str) -> Result<()> {
    if let Some(outcome) = session.reinstall(name).await {
        print_output(&outcome);
    }
    Ok(())
}

/// Uninstall a package, asking first unless `yes` is set
#[tracing::instrument(skip(session))]
pub async fn uninstall<R: Runtime>(session: &Session<R>, name: &str, yes: bool) -> Result<()> {
    if !yes && !session.runtime().confirm(&format!("Uninstall {}?", name))? {
        println!("Uninstall cancelled.");
        return Ok(());
    }
    if let Some(outcome) = session.uninstall(name).await {
        print_output(&outcome);
    }
    Ok(())
}

/// Install several packages, each as its own pip run.
///
/// With `from_file`, the top-level modules imported by that Python file are
/// added to `names`, except those from the standard library.
#[tracing::instrument(skip(session))]
pub async fn install_all<R: Runtime>(
    session: &Session<R>,
    names: &[String],
    from_file: Option<&Path>,
    target: Option<&Path>,
) -> Result<()> {
    let mut all: Vec<String> = names.to_vec();
    if let Some(path) = from_file {
        let Some(found) = session.scan_imports(path) else {
            return Ok(());
        };
        let skipped: Vec<String> = found
            .top_level()
            .into_iter()
            .filter(|m| imports::is_stdlib(m))
            .collect();
        if !skipped.is_empty() {
            info!("Skipping standard library modules: {}", skipped.join(", "));
        }
        for module in found.third_party() {
            if !all.contains(&module) {
                all.push(module);
            }
        }
    }
    debug!("Installing {:?}", all);

    for outcome in session.install_all(&all, target).await {
        print_output(&outcome);
    }
    Ok(())
}

fn print_output(outcome: &Outcome) {
    let output = outcome.output.trim_end();
    if outcome.is_success() && !output.is_empty() {
        println!("{}", output);
    }
}
