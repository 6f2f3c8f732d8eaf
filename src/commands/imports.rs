use std::path::Path;

use anyhow::Result;

use crate::{runtime::Runtime, session::Session};

/// Print the modules a Python source file imports
#[tracing::instrument(skip(session))]
pub fn imports<R: Runtime>(session: &Session<R>, path: &Path, top_level: bool) -> Result<()> {
    let Some(found) = session.scan_imports(path) else {
        return Ok(());
    };
    if top_level {
        for module in found.top_level() {
            println!("{}", module);
        }
    } else {
        for module in found.iter() {
            println!("{}", module);
        }
    }
    Ok(())
}
