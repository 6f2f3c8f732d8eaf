use std::future::Future;

use anyhow::Result;
use log::warn;

use crate::{runtime::Runtime, session::Session};

pub mod config;
mod imports;
mod install;
mod list;
mod search;
mod show;

pub use imports::imports;
pub use install::{install, install_all, reinstall, uninstall};
pub use list::{find, list};
pub use search::{deps, search, versions};
pub use show::show;

/// Runs `work`, cancelling every queued operation on Ctrl-C.
///
/// Cancelled operations still finish through `work`, which reports them.
pub async fn with_interrupt<R, F>(session: &Session<R>, work: F) -> Result<()>
where
    R: Runtime,
    F: Future<Output = Result<()>>,
{
    tokio::pin!(work);
    tokio::select! {
        result = &mut work => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cancelling {} operation(s)", session.in_flight());
            session.cancel_all();
            work.await
        }
    }
}
