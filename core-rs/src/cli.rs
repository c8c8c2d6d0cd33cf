//! Command-line front end of the `check` command
//!
//! The crate ships no spiders, so there is no binary of its own: a project's
//! binary parses [`CheckArgs`] and hands them to a [`CheckRunner`] together
//! with its spider registry.
//!
//! ```no_run
//! use clap::Parser;
//! use spider_check::cli::{CheckArgs, CheckRunner};
//! use spider_check::contracts::ContractRegistry;
//! use spider_check::spider::SpiderLoader;
//!
//! #[tokio::main]
//! async fn main() -> std::process::ExitCode {
//!     let spiders = SpiderLoader::new();
//!     let contracts = ContractRegistry::with_builtins();
//!     let runner = CheckRunner::new(&spiders, &contracts);
//!     runner.run(CheckArgs::parse()).await
//! }
//! ```

use clap::Parser;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::check::{CheckCommand, CheckOptions, ResultAggregator, Verbosity};
use crate::contracts::ContractRegistry;
use crate::errors::CheckError;
use crate::crawl::{Fetcher, HttpFetcher, LocalCrawler};
use crate::settings::Settings;
use crate::spider::SpiderRegistry;

/// Exit code of configuration and spider-load errors
pub const EXIT_FATAL: u8 = 2;

/// Exit code of an error that ends a run already under way
pub const EXIT_FAILURE: u8 = 1;

/// Process exit code for an error returned by [`CheckRunner::execute`].
///
/// Discovery errors and errors from outside the crate (settings file I/O,
/// client setup) are fatal; any other [`CheckError`] ended a started run.
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<CheckError>() {
        Some(e) if !e.is_discovery_error() => EXIT_FAILURE,
        _ => EXIT_FATAL,
    }
}

#[derive(Parser, Debug, Clone, Default, PartialEq, Eq)]
#[command(name = "check")]
#[command(version)]
#[command(about = "Check spider contracts", long_about = None)]
pub struct CheckArgs {
    /// Only list contracts, without checking them
    #[arg(short, long)]
    pub list: bool,

    /// Print contract results for each spider (with --list: also spiders without contracts)
    #[arg(short, long)]
    pub verbose: bool,

    /// Settings file [default: spidercheck.yaml when present]
    #[arg(long, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Override a setting (may be repeated)
    #[arg(short = 's', long = "set", value_name = "NAME=VALUE")]
    pub set: Vec<String>,

    /// Spiders to check; all registered spiders when omitted
    pub spiders: Vec<String>,
}

impl CheckArgs {
    pub fn options(&self) -> CheckOptions {
        CheckOptions {
            list: self.list,
            verbose: self.verbose,
            spiders: self.spiders.clone(),
        }
    }

    /// Settings file (or the working directory's `spidercheck.yaml`) plus `--set` overrides.
    ///
    /// Every failure is reported as [`CheckError::Settings`].
    pub fn load_settings(&self) -> crate::errors::Result<Settings> {
        let load = || -> crate::errors::Result<Settings> {
            let settings = match &self.settings {
                Some(path) => Settings::load(path)?,
                None => Settings::load_from_dir(std::env::current_dir()?)?,
            };
            settings.with_overrides(&self.set)
        };

        load().map_err(|e| match e {
            CheckError::Settings(_) => e,
            other => CheckError::Settings(other.to_string()),
        })
    }
}

/// Install a stderr `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `--verbose` means debug, `log_enabled`
/// means info and logging stays off by default. Repeated calls are no-ops.
pub fn init_logging(verbose: bool, log_enabled: bool) {
    let default_level = if verbose {
        "debug"
    } else if log_enabled {
        "info"
    } else {
        "off"
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

pub struct CheckRunner<'a> {
    spiders: &'a dyn SpiderRegistry,
    contracts: &'a ContractRegistry,
    fetcher: Option<Arc<dyn Fetcher>>,
}

impl<'a> CheckRunner<'a> {
    pub fn new(spiders: &'a dyn SpiderRegistry, contracts: &'a ContractRegistry) -> Self {
        CheckRunner {
            spiders,
            contracts,
            fetcher: None,
        }
    }

    /// Fetch through `fetcher` instead of an `HttpFetcher` built from settings
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Run and map the result to a process exit code
    pub async fn run(&self, args: CheckArgs) -> ExitCode {
        match self.execute(&args).await {
            Ok(code) => ExitCode::from(code),
            Err(e) => {
                eprintln!("Error: {:#}", e);
                ExitCode::from(exit_code_for(&e))
            }
        }
    }

    /// Run writing listings to stdout and the report to stderr.
    ///
    /// Returns 0 or 1; errors are returned as `Err`, see [`exit_code_for`].
    pub async fn execute(&self, args: &CheckArgs) -> anyhow::Result<u8> {
        let settings = args.load_settings()?;
        init_logging(args.verbose, settings.log_enabled);

        let fetcher: Arc<dyn Fetcher> = match &self.fetcher {
            Some(fetcher) => fetcher.clone(),
            None => Arc::new(HttpFetcher::new(&settings)?),
        };
        let mut engine = LocalCrawler::from_settings(fetcher, &settings);

        let verbosity = if args.verbose {
            Verbosity::Detailed
        } else {
            Verbosity::Dots
        };
        let results = Arc::new(ResultAggregator::with_progress(
            Box::new(io::stderr()),
            verbosity,
        ));

        let mut command = CheckCommand::new(self.spiders, self.contracts, settings.contract_identifiers())
            .with_results(results);

        let mut out = io::stdout();
        let mut report = io::stderr();
        let outcome = command
            .run(&args.options(), &mut engine, &mut out, &mut report)
            .await?;

        Ok(outcome.exit_code as u8)
    }
}

impl std::fmt::Debug for CheckRunner<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckRunner")
            .field("spiders", &"<SpiderRegistry>")
            .field("contracts", self.contracts)
            .field("fetcher", &self.fetcher.as_ref().map(|_| "<Fetcher>"))
            .finish()
    }
}
