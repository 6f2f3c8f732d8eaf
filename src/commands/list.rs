use anyhow::Result;
use log::debug;

use crate::{runtime::Runtime, session::Session};

/// List all installed packages
#[tracing::instrument(skip(session))]
pub async fn list<R: Runtime>(session: &Session<R>) -> Result<()> {
    let Some(inventory) = session.refresh_inventory().await else {
        return Ok(());
    };
    if inventory.is_empty() {
        println!("No packages installed.");
        return Ok(());
    }

    debug!("Found {} package(s)", inventory.len());
    for package in inventory.iter() {
        println!("{}", package);
    }
    Ok(())
}

/// Print installed package names containing `substring`
#[tracing::instrument(skip(session))]
pub async fn find<R: Runtime>(session: &Session<R>, substring: &str) -> Result<()> {
    for name in session.search_installed(substring).await {
        println!("{}", name);
    }
    Ok(())
}
