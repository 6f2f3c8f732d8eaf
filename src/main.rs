use anyhow::Result;
use clap::Parser;
use pipsearch::commands::{self, config::Config, config::ConfigOptions};
use pipsearch::index::SearchStrategy;
use pipsearch::status::ConsoleReporter;
use std::path::PathBuf;
use std::sync::Arc;

/// pipsearch - search PyPI and manage installed Python packages
///
/// Lists and searches installed packages, searches the package index,
/// shows versions and dependencies, scans Python files for imports and
/// drives pip to install or uninstall packages.
///
/// Examples:
///   pipsearch search flask            # Search the index
///   pipsearch install requests -V 2.31.0
///   pipsearch install-all --from-file app.py
#[derive(Parser, Debug)]
#[command(author, version = env!("PIPSEARCH_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Package index base URL (also via PIPSEARCH_INDEX_URL)
    #[arg(
        long = "index-url",
        env = "PIPSEARCH_INDEX_URL",
        value_name = "URL",
        default_value = pipsearch::index::DEFAULT_INDEX_URL,
        global = true
    )]
    pub index_url: String,

    /// How to start pip, e.g. "python3 -m pip" (also via PIPSEARCH_PIP)
    #[arg(
        long = "pip",
        env = "PIPSEARCH_PIP",
        value_name = "COMMAND",
        default_value = pipsearch::pip::DEFAULT_PIP,
        global = true
    )]
    pub pip: String,

    /// Seconds before a pip run is killed, 0 for no limit (also via PIPSEARCH_TIMEOUT)
    #[arg(
        long = "timeout",
        env = "PIPSEARCH_TIMEOUT",
        value_name = "SECONDS",
        default_value_t = commands::config::DEFAULT_PIP_TIMEOUT_SECS,
        global = true
    )]
    pub timeout: u64,

    /// Maximum number of concurrent operations (also via PIPSEARCH_JOBS)
    #[arg(
        long = "jobs",
        short = 'j',
        env = "PIPSEARCH_JOBS",
        value_name = "N",
        default_value_t = commands::config::DEFAULT_JOBS,
        global = true
    )]
    pub jobs: usize,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// List installed packages
    List,

    /// Find installed packages whose name contains a substring
    Find(FindArgs),

    /// Show details of an installed package
    Show(NameArgs),

    /// Search the package index
    Search(SearchArgs),

    /// List available versions of a package, newest first
    Versions(NameArgs),

    /// List declared dependencies of one or more packages
    Deps(DepsArgs),

    /// List modules imported by a Python source file
    Imports(ImportsArgs),

    /// Install a package
    Install(InstallArgs),

    /// Reinstall a package even if it is already installed
    Reinstall(NameArgs),

    /// Uninstall a package
    Uninstall(UninstallArgs),

    /// Install several packages, each with its own pip run
    InstallAll(InstallAllArgs),
}

#[derive(clap::Args, Debug)]
pub struct NameArgs {
    /// Package name
    pub name: String,
}

#[derive(clap::Args, Debug)]
pub struct FindArgs {
    /// Case-insensitive substring to look for
    pub substring: String,
}

#[derive(clap::Args, Debug)]
pub struct SearchArgs {
    /// Search term
    pub term: String,

    /// Treat the term as an exact package name instead of using the search page
    #[arg(long)]
    pub exact: bool,
}

#[derive(clap::Args, Debug)]
pub struct DepsArgs {
    /// Package names
    #[arg(required = true)]
    pub names: Vec<String>,

    /// Also look up every dependency on the index
    #[arg(long)]
    pub search: bool,
}

#[derive(clap::Args, Debug)]
pub struct ImportsArgs {
    /// Python source file
    pub file: PathBuf,

    /// Print only the first component of each module (`os` for `os.path`)
    #[arg(long)]
    pub top_level: bool,
}

#[derive(clap::Args, Debug)]
pub struct InstallArgs {
    /// Package name
    pub name: String,

    /// Install exactly this version
    #[arg(long = "version", short = 'V', value_name = "VERSION")]
    pub pin: Option<String>,

    /// Install into this directory instead of the active environment
    #[arg(long, short = 't', value_name = "DIR")]
    pub target: Option<PathBuf>,

    /// Also install the dependencies the package declares
    #[arg(long)]
    pub with_deps: bool,
}

#[derive(clap::Args, Debug)]
pub struct UninstallArgs {
    /// Package name
    pub name: String,

    /// Skip confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

#[derive(clap::Args, Debug)]
pub struct InstallAllArgs {
    /// Package names
    pub names: Vec<String>,

    /// Also install the top-level modules imported by this Python file
    #[arg(long, short = 'f', value_name = "FILE")]
    pub from_file: Option<PathBuf>,

    /// Install into this directory instead of the active environment
    #[arg(long, short = 't', value_name = "DIR")]
    pub target: Option<PathBuf>,
}

impl Cli {
    fn options(&self) -> ConfigOptions {
        ConfigOptions {
            index_url: self.index_url.clone(),
            pip: self.pip.clone(),
            timeout_secs: self.timeout,
            jobs: self.jobs,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = pipsearch::runtime::RealRuntime;

    let config = Config::new(runtime, &cli.options())?;
    let reporter = Arc::new(ConsoleReporter::new());
    let session = config.into_session(reporter.clone());

    let work = async {
        match &cli.command {
            Commands::List => commands::list(&session).await,
            Commands::Find(args) => commands::find(&session, &args.substring).await,
            Commands::Show(args) => commands::show(&session, &args.name).await,
            Commands::Search(args) => {
                let strategy = if args.exact {
                    SearchStrategy::Exact
                } else {
                    SearchStrategy::Scrape
                };
                commands::search(&session, &args.term, strategy).await
            }
            Commands::Versions(args) => commands::versions(&session, &args.name).await,
            Commands::Deps(args) => commands::deps(&session, &args.names, args.search).await,
            Commands::Imports(args) => commands::imports(&session, &args.file, args.top_level),
            Commands::Install(args) => {
                commands::install(
                    &session,
                    &args.name,
                    args.pin.clone(),
                    args.target.clone(),
                    args.with_deps,
                )
                .await
            }
            Commands::Reinstall(args) => commands::reinstall(&session, &args.name).await,
            Commands::Uninstall(args) => commands::uninstall(&session, &args.name, args.yes).await,
            Commands::InstallAll(args) => {
                commands::install_all(
                    &session,
                    &args.names,
                    args.from_file.as_deref(),
                    args.target.as_deref(),
                )
                .await
            }
        }
    };
    commands::with_interrupt(&session, work).await?;

    if reporter.error_count() > 0 {
        std::process::exit(1);
    }
    Ok(())
}
